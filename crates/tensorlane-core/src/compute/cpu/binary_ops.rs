//! Pluggable two-argument operators over lane groups.
//!
//! The broadcast executors are generic over [`BinaryOperator`]. Argument
//! order matters: `apply(lhs, rhs)` always receives the operands in the order
//! the caller listed them, even when an executor reorders buffers internally.

use super::simd::{Float4, SimdLane};
use std::fmt;

/// A binary elementwise operator on lane groups.
pub trait BinaryOperator: Send + Sync {
    /// Combine two lane groups.
    fn apply(&self, lhs: Float4, rhs: Float4) -> Float4;

    /// Combine two scalars. Defaults to lane 0 of the vector form.
    fn apply_scalar(&self, lhs: f32, rhs: f32) -> f32 {
        self.apply(Float4::splat(lhs), Float4::splat(rhs)).to_lanes()[0]
    }

    /// Operator name for logs.
    fn name(&self) -> &'static str;
}

impl<O: BinaryOperator + ?Sized> BinaryOperator for &O {
    #[inline(always)]
    fn apply(&self, lhs: Float4, rhs: Float4) -> Float4 {
        (**self).apply(lhs, rhs)
    }

    fn apply_scalar(&self, lhs: f32, rhs: f32) -> f32 {
        (**self).apply_scalar(lhs, rhs)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

macro_rules! binary_operator {
    ($(#[$doc:meta])* $name:ident, $label:literal, |$l:ident, $r:ident| $vector:expr, $scalar:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl BinaryOperator for $name {
            #[inline(always)]
            fn apply(&self, $l: Float4, $r: Float4) -> Float4 {
                $vector
            }

            #[inline(always)]
            fn apply_scalar(&self, $l: f32, $r: f32) -> f32 {
                $scalar
            }

            fn name(&self) -> &'static str {
                $label
            }
        }
    };
}

binary_operator!(
    /// `lhs + rhs`
    Add, "add", |l, r| l + r, l + r
);
binary_operator!(
    /// `lhs - rhs`
    Sub, "sub", |l, r| l - r, l - r
);
binary_operator!(
    /// `lhs * rhs`
    Mul, "mul", |l, r| l * r, l * r
);
binary_operator!(
    /// `lhs / rhs`
    Div, "div", |l, r| l / r, l / r
);
binary_operator!(
    /// Lane-wise maximum
    Max, "max", |l, r| SimdLane::max(l, r), l.max(r)
);
binary_operator!(
    /// Lane-wise minimum
    Min, "min", |l, r| SimdLane::min(l, r), l.min(r)
);

/// Closed set of built-in operators, chosen once when a layer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinaryOpKind {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Maximum
    Max,
    /// Minimum
    Min,
}

impl BinaryOpKind {
    /// Whether swapping the operands leaves the result unchanged.
    pub fn is_commutative(self) -> bool {
        !matches!(self, BinaryOpKind::Sub | BinaryOpKind::Div)
    }
}

impl BinaryOperator for BinaryOpKind {
    #[inline(always)]
    fn apply(&self, lhs: Float4, rhs: Float4) -> Float4 {
        match self {
            BinaryOpKind::Add => Add.apply(lhs, rhs),
            BinaryOpKind::Sub => Sub.apply(lhs, rhs),
            BinaryOpKind::Mul => Mul.apply(lhs, rhs),
            BinaryOpKind::Div => Div.apply(lhs, rhs),
            BinaryOpKind::Max => Max.apply(lhs, rhs),
            BinaryOpKind::Min => Min.apply(lhs, rhs),
        }
    }

    fn apply_scalar(&self, lhs: f32, rhs: f32) -> f32 {
        match self {
            BinaryOpKind::Add => Add.apply_scalar(lhs, rhs),
            BinaryOpKind::Sub => Sub.apply_scalar(lhs, rhs),
            BinaryOpKind::Mul => Mul.apply_scalar(lhs, rhs),
            BinaryOpKind::Div => Div.apply_scalar(lhs, rhs),
            BinaryOpKind::Max => Max.apply_scalar(lhs, rhs),
            BinaryOpKind::Min => Min.apply_scalar(lhs, rhs),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BinaryOpKind::Add => Add.name(),
            BinaryOpKind::Sub => Sub.name(),
            BinaryOpKind::Mul => Mul.name(),
            BinaryOpKind::Div => Div.name(),
            BinaryOpKind::Max => Max.name(),
            BinaryOpKind::Min => Min.name(),
        }
    }
}

impl fmt::Display for BinaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

//! Blocked SGEMM against nalgebra.

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use proptest::prelude::*;
use tensorlane_core::config::KernelConfigBuilder;
use tensorlane_core::utils::test_utils::{max_abs_diff, random_vec};
use tensorlane_kernels::microkernel::{KernelCache, MicrokernelGenerator};
use tensorlane_kernels::{sgemm, Activation, GemmEpilogue, MatRef, MicrokernelDescriptor, Sgemm};

/// `act(A * B + bias)` with nalgebra, column-major.
fn nalgebra_gemm(
    m: usize,
    n: usize,
    k: usize,
    a: &[f32],
    b: &[f32],
    bias: Option<&[f32]>,
    activation: Activation,
) -> Vec<f32> {
    let a = DMatrix::from_column_slice(m, k, a);
    let b = DMatrix::from_column_slice(k, n, b);
    let mut c = &a * &b;
    if let Some(bias) = bias {
        for j in 0..n {
            c.column_mut(j).add_scalar_mut(bias[j]);
        }
    }
    c.apply(|x| {
        *x = match activation {
            Activation::None => *x,
            Activation::Relu => x.max(0.0),
            Activation::Relu6 => x.max(0.0).min(6.0),
        }
    });
    c.as_slice().to_vec()
}

fn driver(row_block: usize, col_block: usize, simd: bool) -> Sgemm {
    let cache = KernelCache::new(MicrokernelGenerator::new(simd));
    Sgemm::new(
        cache
            .get_or_generate(&MicrokernelDescriptor::new(row_block, col_block))
            .unwrap(),
    )
}

#[test]
fn test_global_sgemm_with_bias() {
    let (m, n, k) = (33, 17, 12);
    let a = random_vec(m * k, 1);
    let b = random_vec(k * n, 2);
    let bias = random_vec(n, 3);
    let mut c = vec![0.0; m * n];

    sgemm(
        m,
        n,
        k,
        MatRef::new(&a, m),
        MatRef::new(&b, k),
        &mut c,
        m,
        &GemmEpilogue {
            bias: Some(&bias),
            ..Default::default()
        },
    )
    .unwrap();

    let expected = nalgebra_gemm(m, n, k, &a, &b, Some(&bias), Activation::None);
    assert!(max_abs_diff(&c, &expected) < 1e-4);
}

#[test]
fn test_padded_leading_dimension() {
    let (m, n, k) = (6, 5, 4);
    let ldc = 9;
    let a = random_vec(m * k, 4);
    let b = random_vec(k * n, 5);
    let mut c = vec![-7.0; ldc * n];

    driver(4, 3, true)
        .run(
            m,
            n,
            k,
            MatRef::new(&a, m),
            MatRef::new(&b, k),
            &mut c,
            ldc,
            &GemmEpilogue::default(),
        )
        .unwrap();

    let expected = nalgebra_gemm(m, n, k, &a, &b, None, Activation::None);
    for j in 0..n {
        for i in 0..m {
            assert_relative_eq!(c[j * ldc + i], expected[j * m + i], epsilon = 1e-4);
        }
        // rows past m are left alone
        assert!(c[j * ldc + m..j * ldc + ldc].iter().all(|&v| v == -7.0));
    }
}

#[test]
fn test_configured_driver() {
    let config = KernelConfigBuilder::new().gemm_block(16, 4).build();
    let cache = KernelCache::from_config(&config);
    let sgemm = Sgemm::from_config(&cache, &config).unwrap();
    assert_eq!(sgemm.routine().descriptor(), MicrokernelDescriptor::new(16, 4));

    let bad = KernelConfigBuilder::new().gemm_block(5, 4).build();
    assert!(Sgemm::from_config(&cache, &bad).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_sgemm_matches_nalgebra(
        m in 1usize..40,
        n in 1usize..20,
        k in 0usize..16,
        block in 0usize..6,
        act in 0i32..3,
        simd in any::<bool>(),
        with_bias in any::<bool>(),
    ) {
        let (row_block, col_block) = [(4, 1), (4, 8), (8, 6), (8, 3), (16, 2), (16, 8)][block];
        let activation = Activation::from_raw(act).unwrap();
        let a = random_vec(m * k, 10);
        let b = random_vec(k * n, 11);
        let bias = random_vec(n, 12);
        let bias = with_bias.then_some(&bias[..]);
        let mut c = vec![0.0; m * n];

        driver(row_block, col_block, simd)
            .run(
                m,
                n,
                k,
                MatRef::new(&a, m),
                MatRef::new(&b, k.max(1)),
                &mut c,
                m,
                &GemmEpilogue { bias, accumulate: false, activation },
            )
            .unwrap();

        let expected = nalgebra_gemm(m, n, k, &a, &b, bias, activation);
        for (x, y) in c.iter().zip(&expected) {
            prop_assert!((x - y).abs() <= 1e-4 * (1.0 + y.abs()), "{} vs {}", x, y);
        }
    }
}

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_driver_matches_nalgebra() {
    let (m, n, k) = (50, 64, 20);
    let a = random_vec(m * k, 20);
    let b = random_vec(k * n, 21);
    let mut c = vec![0.0; m * n];

    tensorlane_kernels::par_sgemm(
        m,
        n,
        k,
        MatRef::new(&a, m),
        MatRef::new(&b, k),
        &mut c,
        m,
        &GemmEpilogue {
            activation: Activation::Relu6,
            ..Default::default()
        },
    )
    .unwrap();

    let expected = nalgebra_gemm(m, n, k, &a, &b, None, Activation::Relu6);
    for (x, y) in c.iter().zip(&expected) {
        assert_relative_eq!(x, y, epsilon = 1e-4);
    }
}

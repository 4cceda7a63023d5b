//! Conversion between linear and lane-blocked tensor layouts.
//!
//! The linear layout is `[batch][channel][spatial]`. The blocked layout pads
//! the channel axis to a multiple of [`LANE_WIDTH`] and interleaves four
//! channels per spatial position: `[batch][channel / 4][spatial][4]`.
//!
//! Padding lanes written by [`to_blocked`] are zero.

use crate::error::{KernelError, Result};
use crate::types::{PackedGeometry, LANE_WIDTH};

/// Unpack a blocked buffer into linear layout.
///
/// `linear` must hold at least `batch * channel * spatial` elements and
/// `blocked` at least the padded blocked length.
pub fn to_linear(
    blocked: &[f32],
    linear: &mut [f32],
    batch: usize,
    channel: usize,
    spatial: usize,
) -> Result<()> {
    let geometry = PackedGeometry::new(batch, channel, spatial);
    KernelError::check_len("blocked", geometry.blocked_len(), blocked.len())?;
    KernelError::check_len("linear", geometry.linear_len(), linear.len())?;

    let plane = spatial * LANE_WIDTH;
    for b in 0..batch {
        for cb in 0..geometry.channel_blocks {
            let src = &blocked[(b * geometry.channel_blocks + cb) * plane..][..plane];
            let lanes = (channel - cb * LANE_WIDTH).min(LANE_WIDTH);
            for lane in 0..lanes {
                let c = cb * LANE_WIDTH + lane;
                let dst = &mut linear[(b * channel + c) * spatial..][..spatial];
                for (s, value) in dst.iter_mut().enumerate() {
                    *value = src[s * LANE_WIDTH + lane];
                }
            }
        }
    }
    Ok(())
}

/// Pack a linear buffer into blocked layout, zeroing the padding lanes.
pub fn to_blocked(
    linear: &[f32],
    blocked: &mut [f32],
    batch: usize,
    channel: usize,
    spatial: usize,
) -> Result<()> {
    let geometry = PackedGeometry::new(batch, channel, spatial);
    KernelError::check_len("linear", geometry.linear_len(), linear.len())?;
    KernelError::check_len("blocked", geometry.blocked_len(), blocked.len())?;

    let plane = spatial * LANE_WIDTH;
    for b in 0..batch {
        for cb in 0..geometry.channel_blocks {
            let dst = &mut blocked[(b * geometry.channel_blocks + cb) * plane..][..plane];
            let lanes = (channel - cb * LANE_WIDTH).min(LANE_WIDTH);
            if lanes < LANE_WIDTH {
                dst.fill(0.0);
            }
            for lane in 0..lanes {
                let c = cb * LANE_WIDTH + lane;
                let src = &linear[(b * channel + c) * spatial..][..spatial];
                for (s, &value) in src.iter().enumerate() {
                    dst[s * LANE_WIDTH + lane] = value;
                }
            }
        }
    }
    Ok(())
}

/// Pack into a freshly allocated blocked buffer.
pub fn pack(linear: &[f32], geometry: PackedGeometry) -> Result<Vec<f32>> {
    let mut blocked = vec![0.0; geometry.blocked_len()];
    to_blocked(
        linear,
        &mut blocked,
        geometry.batch,
        geometry.channel,
        geometry.spatial,
    )?;
    Ok(blocked)
}

/// Unpack into a freshly allocated linear buffer.
pub fn unpack(blocked: &[f32], geometry: PackedGeometry) -> Result<Vec<f32>> {
    let mut linear = vec![0.0; geometry.linear_len()];
    to_linear(
        blocked,
        &mut linear,
        geometry.batch,
        geometry.channel,
        geometry.spatial,
    )?;
    Ok(linear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_blocked_index_layout() {
        // batch 1, 5 channels, 2 spatial positions
        let linear: Vec<f32> = (0..10).map(|x| x as f32).collect();
        let mut blocked = vec![-1.0; 16];
        to_blocked(&linear, &mut blocked, 1, 5, 2).unwrap();
        assert_eq!(
            blocked,
            vec![
                0.0, 2.0, 4.0, 6.0, // s0, c0..c3
                1.0, 3.0, 5.0, 7.0, // s1, c0..c3
                8.0, 0.0, 0.0, 0.0, // s0, c4 + padding
                9.0, 0.0, 0.0, 0.0, // s1, c4 + padding
            ]
        );
    }

    #[test]
    fn test_short_buffers_rejected() {
        let linear = vec![0.0; 8];
        let mut blocked = vec![0.0; 4];
        let err = to_blocked(&linear, &mut blocked, 1, 2, 4).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "blocked", .. }));

        let mut short = vec![0.0; 3];
        let err = to_linear(&[0.0; 16], &mut short, 1, 2, 2).unwrap_err();
        assert!(matches!(err, KernelError::BufferTooSmall { name: "linear", .. }));
    }

    proptest! {
        #[test]
        fn prop_round_trip(batch in 1usize..3, channel in 1usize..11, spatial in 1usize..7) {
            let geometry = PackedGeometry::new(batch, channel, spatial);
            let linear: Vec<f32> = (0..geometry.linear_len()).map(|i| i as f32 * 0.5 - 3.0).collect();
            let blocked = pack(&linear, geometry).unwrap();
            prop_assert_eq!(blocked.len(), geometry.blocked_len());
            let back = unpack(&blocked, geometry).unwrap();
            prop_assert_eq!(back, linear);
        }
    }
}

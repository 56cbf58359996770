//! The mock envelope kernel: a cheap deterministic closed form.

use crate::model::{Direction, Envelope};

pub const MOCK_KERNEL_VERSION: &str = "mock_v1";

/// `make_mock_envelope(direction, confidence, vetoed, size)` (spec §4.2).
///
/// `p_flat = clamp(0.65 - 0.50*c, 0, 1)`; the remaining mass routes to
/// `p_long`/`p_short` by direction. A `Flat` direction collapses to
/// `p_flat = 1`. Size band half-width is `(0.20 + 0.60*(1-c)) * |size|`.
pub fn make_mock_envelope(direction: Direction, confidence: f64, vetoed: bool, size: f64) -> Envelope {
    if vetoed {
        return Envelope::vetoed("mock", MOCK_KERNEL_VERSION);
    }

    let c = confidence.clamp(0.0, 1.0);
    let p_flat = (0.65 - 0.50 * c).clamp(0.0, 1.0);
    let p_dir = 1.0 - p_flat;

    let (p_flat, p_long, p_short) = match direction {
        Direction::Flat => (1.0, 0.0, 0.0),
        Direction::Long => (p_flat, p_dir, 0.0),
        Direction::Short => (p_flat, 0.0, p_dir),
    };

    let half_width = (0.20 + 0.60 * (1.0 - c)) * size.abs();
    let size_min = (size - half_width).max(0.0);
    let size_max = size + half_width;

    Envelope {
        p_flat,
        p_long,
        p_short,
        p_vetoed: 0.0,
        size_min,
        size_max,
        kernel: "mock".to_string(),
        version: MOCK_KERNEL_VERSION.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vetoed_collapses() {
        let env = make_mock_envelope(Direction::Long, 0.8, true, 0.5);
        assert_eq!(env.p_vetoed, 1.0);
        assert_eq!(env.p_flat, 0.0);
        assert_eq!(env.size_min, 0.0);
        assert_eq!(env.size_max, 0.0);
    }

    #[test]
    fn flat_direction_is_all_flat() {
        let env = make_mock_envelope(Direction::Flat, 0.5, false, 0.0);
        assert_eq!(env.p_flat, 1.0);
        assert_eq!(env.p_long, 0.0);
        assert_eq!(env.p_short, 0.0);
    }

    #[test]
    fn long_direction_routes_to_p_long() {
        let env = make_mock_envelope(Direction::Long, 0.7, false, 0.07);
        let expected_flat = (0.65 - 0.50 * 0.7f64).clamp(0.0, 1.0);
        assert!((env.p_flat - expected_flat).abs() < 1e-9);
        assert!((env.p_long - (1.0 - expected_flat)).abs() < 1e-9);
        assert_eq!(env.p_short, 0.0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        for c in [0.0, 0.2, 0.5, 0.9, 1.0] {
            let env = make_mock_envelope(Direction::Short, c, false, 0.1);
            let sum = env.p_flat + env.p_long + env.p_short + env.p_vetoed;
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn size_band_widens_with_lower_confidence() {
        let tight = make_mock_envelope(Direction::Long, 0.9, false, 1.0);
        let wide = make_mock_envelope(Direction::Long, 0.1, false, 1.0);
        let tight_width = tight.size_max - tight.size_min;
        let wide_width = wide.size_max - wide.size_min;
        assert!(wide_width > tight_width);
    }
}

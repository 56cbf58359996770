//! The local Monte Carlo envelope kernel: hash-seeded, no RNG state, no
//! wall-clock. Byte-identical across runs and platforms given identical
//! inputs (spec §4.2, §5 "Replay determinism").

use sha2::{Digest, Sha256};
use std::f64::consts::PI;

use crate::model::{Direction, Envelope};

pub const MC_KERNEL_VERSION: &str = "mc_local_v0.2.1";

/// Number of horizon steps.
const H: usize = 16;
/// Simulations per horizon step.
const N_SIMS: usize = 64;
/// Epsilon-smoothing applied to the initial one-hot direction distribution.
const EPSILON: f64 = 0.01;
/// Shrinkage applied when reducing per-sim spread into a size band.
const SHRINK_K: f64 = 0.5;

/// `[1, 5, 9, ..., 61]` minutes.
const HORIZON_GRID_MINUTES: [u32; H] = [
    1, 5, 9, 13, 17, 21, 25, 29, 33, 37, 41, 45, 49, 53, 57, 61,
];

/// First 8 bytes of `sha256(s)`, little-endian, as a `u64`.
fn u64_from_sha256(s: &str) -> u64 {
    let digest = Sha256::digest(s.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(buf)
}

/// `u(seed, s, h, j) = (u64(sha256("{seed}|s={s}|h={h}|j={j}")) + 0.5) / 2^64`.
fn hash_to_uniform(seed: u64, s: usize, h: usize, j: usize) -> f64 {
    let material = format!("{seed}|s={s}|h={h}|j={j}");
    (u64_from_sha256(&material) as f64 + 0.5) / (u64::MAX as f64 + 1.0)
}

/// Box-Muller normal sample drawn from two hash-derived uniforms.
fn hash_to_normal(seed: u64, s: usize, h: usize, j: usize) -> f64 {
    let u1 = hash_to_uniform(seed, s, h, j).max(f64::MIN_POSITIVE);
    let u2 = hash_to_uniform(seed, s, h, j + 1);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-9, 1.0 - 1e-9);
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over a fixed 3-channel vector `[flat, long, short]`.
fn softmax3(logits: [f64; 3]) -> [f64; 3] {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    [exps[0] / sum, exps[1] / sum, exps[2] / sum]
}

/// Confidence-sharpened one-hot direction distribution with
/// epsilon-smoothing (spec §4.2): blends a one-hot vector at `direction`
/// with a uniform prior by `confidence`, then smooths by `EPSILON`.
fn initial_direction_logits(direction: Direction, confidence: f64) -> [f64; 3] {
    let one_hot = match direction {
        Direction::Flat => [1.0, 0.0, 0.0],
        Direction::Long => [0.0, 1.0, 0.0],
        Direction::Short => [0.0, 0.0, 1.0],
    };
    let uniform = [1.0 / 3.0; 3];
    let mut probs = [0.0; 3];
    for i in 0..3 {
        let blended = confidence * one_hot[i] + (1.0 - confidence) * uniform[i];
        probs[i] = blended * (1.0 - EPSILON) + EPSILON / 3.0;
    }
    [logit(probs[0]), logit(probs[1]), logit(probs[2])]
}

struct ChannelAccumulator {
    p_flat: f64,
    p_long: f64,
    p_short: f64,
    p_vetoed: f64,
    survival: f64,
}

/// Runs `N_SIMS` simulations for a single horizon step, returning the
/// per-channel mean and the per-sim running-survival mean.
#[allow(clippy::too_many_arguments)]
fn run_mc_simulations(
    seed: u64,
    h: usize,
    t: f64,
    dir_logits0: [f64; 3],
    p_veto0: f64,
    running_survival: &mut [f64; N_SIMS],
) -> ChannelAccumulator {
    let sigma_dir = 0.05 + 0.30 * t;
    let sigma_veto = 0.05 + 0.20 * t;
    let alpha = (-0.5 * t).exp();
    let logit_veto0 = logit(p_veto0);

    let mut sum = ChannelAccumulator {
        p_flat: 0.0,
        p_long: 0.0,
        p_short: 0.0,
        p_vetoed: 0.0,
        survival: 0.0,
    };

    for s in 0..N_SIMS {
        let noisy_logits = [
            dir_logits0[0] * alpha + sigma_dir * hash_to_normal(seed, s, h, 0),
            dir_logits0[1] * alpha + sigma_dir * hash_to_normal(seed, s, h, 2),
            dir_logits0[2] * alpha + sigma_dir * hash_to_normal(seed, s, h, 4),
        ];
        let dir_probs = softmax3(noisy_logits);

        let noisy_veto_logit = logit_veto0 * alpha + sigma_veto * hash_to_normal(seed, s, h, 6);
        let p_veto = sigmoid(noisy_veto_logit);

        running_survival[s] *= 1.0 - p_veto;

        sum.p_flat += (1.0 - p_veto) * dir_probs[0];
        sum.p_long += (1.0 - p_veto) * dir_probs[1];
        sum.p_short += (1.0 - p_veto) * dir_probs[2];
        sum.p_vetoed += p_veto;
        sum.survival += running_survival[s];
    }

    let n = N_SIMS as f64;
    ChannelAccumulator {
        p_flat: sum.p_flat / n,
        p_long: sum.p_long / n,
        p_short: sum.p_short / n,
        p_vetoed: sum.p_vetoed / n,
        survival: sum.survival / n,
    }
}

/// `generate_mc_envelope(direction, confidence, vetoed, size, symbol,
/// slice_hash)` (spec §4.2). `slice_hash` is a caller-supplied digest of
/// whatever upstream state slice is driving this emission (the triggering
/// event's id is sufficient and is what the runtime loop passes).
pub fn generate_mc_envelope(
    direction: Direction,
    confidence: f64,
    vetoed: bool,
    size: f64,
    symbol: &str,
    slice_hash: &str,
) -> Envelope {
    if vetoed {
        return Envelope::vetoed("mc_local", MC_KERNEL_VERSION);
    }

    let c = confidence.clamp(0.0, 1.0);
    let seed = u64_from_sha256(&format!(
        "mc_local_v0.1|{slice_hash}|{symbol}|{MC_KERNEL_VERSION}"
    ));

    let dir_logits0 = initial_direction_logits(direction, c);
    let p_veto0 = 0.05 + 0.10 * (1.0 - c);

    let mut running_survival = [1.0f64; N_SIMS];
    let mut last = ChannelAccumulator {
        p_flat: 0.0,
        p_long: 0.0,
        p_short: 0.0,
        p_vetoed: 0.0,
        survival: 1.0,
    };

    for h in 0..H {
        let t = h as f64 / (H as f64 - 1.0);
        last = run_mc_simulations(seed, h, t, dir_logits0, p_veto0, &mut running_survival);
    }

    let uncertainty = (1.0 - last.survival).clamp(0.0, 1.0);
    let half_width = SHRINK_K * uncertainty * size.abs() + (1.0 - SHRINK_K) * 0.0;
    let size_min = (size - half_width).max(0.0);
    let size_max = size + half_width;

    Envelope {
        p_flat: last.p_flat,
        p_long: last.p_long,
        p_short: last.p_short,
        p_vetoed: last.p_vetoed,
        size_min,
        size_max,
        kernel: "mc_local".to_string(),
        version: MC_KERNEL_VERSION.to_string(),
    }
}

/// Convenience wrapper matching the allocator's output shape directly.
pub fn make_mc_envelope(
    direction: Direction,
    entropy_factor: f64,
    vetoed: bool,
    size: f64,
    symbol: &str,
    slice_hash: &str,
) -> Envelope {
    generate_mc_envelope(direction, entropy_factor, vetoed, size, symbol, slice_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizon_grid_matches_spec() {
        assert_eq!(HORIZON_GRID_MINUTES[0], 1);
        assert_eq!(HORIZON_GRID_MINUTES[H - 1], 61);
        assert_eq!(HORIZON_GRID_MINUTES.len(), 16);
    }

    #[test]
    fn vetoed_collapses() {
        let env = generate_mc_envelope(Direction::Long, 0.8, true, 0.5, "BTC", "hash");
        assert_eq!(env.p_vetoed, 1.0);
        assert_eq!(env.size_min, 0.0);
        assert_eq!(env.size_max, 0.0);
    }

    #[test]
    fn deterministic_given_identical_inputs() {
        let a = generate_mc_envelope(Direction::Long, 0.7, false, 0.07, "BTC", "slice-1");
        let b = generate_mc_envelope(Direction::Long, 0.7, false, 0.07, "BTC", "slice-1");
        assert_eq!(a, b);
    }

    #[test]
    fn different_symbols_diverge() {
        let a = generate_mc_envelope(Direction::Long, 0.7, false, 0.07, "BTC", "slice-1");
        let b = generate_mc_envelope(Direction::Long, 0.7, false, 0.07, "ETH", "slice-1");
        assert_ne!(a.p_long, b.p_long);
    }

    #[test]
    fn probabilities_sum_to_roughly_one() {
        let env = generate_mc_envelope(Direction::Short, 0.4, false, 1.0, "SOL", "slice-9");
        let sum = env.p_flat + env.p_long + env.p_short + env.p_vetoed;
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn u64_from_sha256_is_stable() {
        assert_eq!(u64_from_sha256("abc"), u64_from_sha256("abc"));
        assert_ne!(u64_from_sha256("abc"), u64_from_sha256("abd"));
    }
}

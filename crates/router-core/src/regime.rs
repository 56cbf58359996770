//! Regime classification from a free-form input string.

use crate::model::Regime;

/// Maps an input token to a closed [`Regime`] via a fixed synonym table.
/// Matching is case-insensitive; unrecognized tokens become [`Regime::Unknown`].
pub fn infer_regime(raw: &str) -> Regime {
    let token = raw.trim().to_ascii_lowercase();
    match token.as_str() {
        "chop" | "ranging" | "sideways" => Regime::Chop,
        "high_vol" | "volatile" | "high_volatility" => Regime::HighVol,
        "drift" | "trend" | "trending" => Regime::Drift,
        "breakout" | "momentum" | "break" => Regime::Breakout,
        _ => Regime::Unknown,
    }
}

//! PD to credit score mapping.
//!
//! score = round(600 + 50 * log2(odds / 20)), odds = (1 - PD) / PD,
//! clipped to [300, 900]. Higher PD always maps to a lower or equal score.

pub use cr_policy::{SCORE_MAX, SCORE_MIN};

/// Score at the base odds.
pub const BASE_SCORE: f64 = 600.0;
/// Points to double the odds.
pub const POINTS_TO_DOUBLE_ODDS: f64 = 50.0;
/// Good:bad odds at the base score.
pub const BASE_ODDS: f64 = 20.0;

const PD_CLIP: f64 = 1e-6;

/// Maps a probability of default to a bounded integer score.
pub fn score_from_pd(pd: f64) -> i32 {
    if !pd.is_finite() {
        return SCORE_MIN;
    }
    let pd = pd.clamp(PD_CLIP, 1.0 - PD_CLIP);
    let odds = (1.0 - pd) / pd;
    let raw = BASE_SCORE + POINTS_TO_DOUBLE_ODDS * (odds / BASE_ODDS).log2();
    (raw.round() as i32).clamp(SCORE_MIN, SCORE_MAX)
}

/// PD at which the unrounded score equals `score`.
pub fn pd_at_score(score: i32) -> f64 {
    let odds = BASE_ODDS * 2f64.powf((score as f64 - BASE_SCORE) / POINTS_TO_DOUBLE_ODDS);
    1.0 / (1.0 + odds)
}

//! Pure metric math for the performance tracker. Everything here is a
//! function of the trailing decision window plus the global median response
//! time; no clocks, no storage.

use crate::config::TrackerConfig;
use crate::domain::{DecisionSample, Outcome, RecognitionTier, RollingMetrics};

/// Per-decision EWMA weight for the configured half-life: after
/// `half_life_decisions` updates, an old observation contributes half.
pub fn ewma_alpha(half_life_decisions: u32) -> f64 {
    1.0 - 0.5_f64.powf(1.0 / half_life_decisions.max(1) as f64)
}

/// Normalize one response time against the global median: exactly the
/// median scores 0.5, instant scores toward 1.0, very slow toward 0.0.
pub fn speed_sample(global_median_secs: f64, response_secs: f64) -> f64 {
    if global_median_secs <= 0.0 {
        return 0.5;
    }
    global_median_secs / (global_median_secs + response_secs.max(0.0))
}

pub fn ewma_update(current: f64, sample: f64, alpha: f64) -> f64 {
    current + alpha * (sample - current)
}

/// Share of terminal outcomes that were approvals. Revision requests carry
/// no signal about content quality direction and are excluded.
pub fn approval_rate(samples: &[DecisionSample]) -> f64 {
    let approved = samples
        .iter()
        .filter(|s| s.outcome == Outcome::Approve)
        .count();
    let rejected = samples
        .iter()
        .filter(|s| s.outcome == Outcome::Reject)
        .count();
    let resolved = approved + rejected;
    if resolved == 0 {
        return 0.5;
    }
    approved as f64 / resolved as f64
}

/// Log-scaled activity: hits 1.0 at the configured target and grows no
/// further, so prolific reviewers cannot dominate on volume alone.
pub fn volume(window_count: usize, target: u32) -> f64 {
    if target == 0 {
        return 0.0;
    }
    let scaled = (1.0 + window_count as f64).ln() / (1.0 + target as f64).ln();
    scaled.clamp(0.0, 1.0)
}

/// One minus the coefficient of variation of window response times,
/// clamped to [0, 1]. A steady reviewer scores near 1.
pub fn consistency(samples: &[DecisionSample]) -> f64 {
    if samples.len() < 2 {
        return 1.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|s| s.response_secs).sum::<f64>() / n;
    if mean <= 0.0 {
        return 1.0;
    }
    let variance = samples
        .iter()
        .map(|s| (s.response_secs - mean).powi(2))
        .sum::<f64>()
        / n;
    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

pub fn performance_score(metrics: &RollingMetrics, cfg: &TrackerConfig) -> f64 {
    let score = cfg.speed_weight * metrics.speed
        + cfg.approval_weight * metrics.approval_rate
        + cfg.volume_weight * metrics.volume
        + cfg.consistency_weight * metrics.consistency;
    score.clamp(0.0, 1.0)
}

/// Observational tier from score plus window volume. Volume minimums keep
/// a lucky first week from minting a Diamond.
pub fn recognition_tier(score: f64, window_count: usize) -> RecognitionTier {
    match () {
        _ if score >= 0.95 && window_count >= 30 => RecognitionTier::Diamond,
        _ if score >= 0.90 && window_count >= 20 => RecognitionTier::Platinum,
        _ if score >= 0.80 && window_count >= 10 => RecognitionTier::Gold,
        _ if score >= 0.70 && window_count >= 5 => RecognitionTier::Silver,
        _ if score >= 0.60 && window_count >= 3 => RecognitionTier::Bronze,
        _ => RecognitionTier::Newcomer,
    }
}

//! Pure candidate scoring. No clock reads, no storage, no randomness:
//! given the same snapshot and submission, selection is fully deterministic,
//! which keeps contention outcomes reproducible in tests.

use crate::config::AssignmentConfig;
use crate::domain::{PriorityClass, ReviewerView, Submission};

/// Hard eligibility gate applied before any scoring.
pub fn is_eligible(view: &ReviewerView, submission: &Submission) -> bool {
    if !view.available || !view.has_capacity() {
        return false;
    }
    if submission.senior_only && !view.senior {
        return false;
    }
    // Reviewers never judge their own submissions.
    view.token != submission.contributor
}

/// Weighted suitability score in [0, 1].
pub fn score(view: &ReviewerView, submission: &Submission, cfg: &AssignmentConfig) -> f64 {
    let headroom = if view.workload_cap == 0 {
        0.0
    } else {
        1.0 - view.workload_current as f64 / view.workload_cap as f64
    };
    let category_match = if view.category_preferences.contains(&submission.category) {
        1.0
    } else {
        0.0
    };
    cfg.workload_weight * headroom
        + cfg.category_weight * category_match
        + cfg.performance_weight * view.performance_score.clamp(0.0, 1.0)
}

/// Speed threshold at the configured percentile of the candidate pool.
/// The rank rounds up so small pools still narrow: two candidates at the
/// 75th percentile keep only the faster one. A single candidate is its
/// own threshold.
fn speed_threshold(candidates: &[&ReviewerView], percentile: f64) -> f64 {
    let mut speeds: Vec<f64> = candidates.iter().map(|v| v.speed).collect();
    speeds.sort_by(|a, b| a.total_cmp(b));
    let rank = ((speeds.len() as f64 - 1.0) * percentile.clamp(0.0, 1.0)).ceil() as usize;
    speeds.get(rank).copied().unwrap_or(0.0)
}

/// Pick the best candidate for `submission` out of `pool`, or None when no
/// reviewer is eligible.
///
/// Urgent submissions are first narrowed to the fastest quartile of the
/// eligible pool; if that pool is empty the full eligible pool is used so
/// urgency never blocks assignment outright. Score ties break toward the
/// reviewer idle longest (never-assigned counts as idle forever).
pub fn select<'a>(
    pool: &'a [ReviewerView],
    submission: &Submission,
    cfg: &AssignmentConfig,
) -> Option<&'a ReviewerView> {
    let eligible: Vec<&ReviewerView> = pool
        .iter()
        .filter(|v| is_eligible(v, submission))
        .collect();
    if eligible.is_empty() {
        return None;
    }

    let candidates: Vec<&ReviewerView> = if submission.priority_class == PriorityClass::Urgent {
        let threshold = speed_threshold(&eligible, cfg.urgent_speed_percentile);
        let fast: Vec<&ReviewerView> = eligible
            .iter()
            .copied()
            .filter(|v| v.speed >= threshold)
            .collect();
        if fast.is_empty() {
            eligible
        } else {
            fast
        }
    } else {
        eligible
    };

    candidates.into_iter().max_by(|a, b| {
        score(a, submission, cfg)
            .total_cmp(&score(b, submission, cfg))
            // max_by keeps the later element on Equal, so order the idle
            // comparison to make the longest-idle reviewer win ties.
            .then_with(|| match (a.last_assigned_at, b.last_assigned_at) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a_at), Some(b_at)) => b_at.cmp(&a_at),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OpaqueToken;
    use chrono::{Duration, Utc};
    use std::collections::BTreeSet;

    fn view(token: &str) -> ReviewerView {
        ReviewerView {
            token: OpaqueToken::from(token),
            category_preferences: BTreeSet::new(),
            senior: false,
            available: true,
            workload_current: 0,
            workload_cap: 5,
            performance_score: 0.5,
            speed: 0.5,
            last_assigned_at: None,
        }
    }

    fn submission(category: &str, class: PriorityClass) -> Submission {
        Submission::new(OpaqueToken::from("contrib"), category, class, 0.5)
    }

    fn cfg() -> AssignmentConfig {
        AssignmentConfig {
            workload_weight: 0.4,
            category_weight: 0.3,
            performance_weight: 0.3,
            default_workload_cap: 5,
            urgent_speed_percentile: 0.75,
        }
    }

    #[test]
    fn full_reviewer_is_ineligible() {
        let mut v = view("rev-1");
        v.workload_current = 5;
        assert!(!is_eligible(&v, &submission("t", PriorityClass::Normal)));
    }

    #[test]
    fn contributor_cannot_review_own_submission() {
        let v = view("contrib");
        assert!(!is_eligible(&v, &submission("t", PriorityClass::Normal)));
    }

    #[test]
    fn senior_only_gates_to_senior_reviewers() {
        let mut sub = submission("t", PriorityClass::Normal);
        sub.senior_only = true;
        let junior = view("rev-j");
        let mut senior = view("rev-s");
        senior.senior = true;
        assert!(!is_eligible(&junior, &sub));
        assert!(is_eligible(&senior, &sub));
    }

    #[test]
    fn category_match_outweighs_small_performance_gap() {
        let sub = submission("endgames", PriorityClass::Normal);
        let mut matching = view("rev-m");
        matching.category_preferences.insert("endgames".to_string());
        let mut stronger = view("rev-s");
        stronger.performance_score = 0.9;

        let pool = vec![matching, stronger];
        let picked = select(&pool, &sub, &cfg()).unwrap();
        assert_eq!(picked.token, OpaqueToken::from("rev-m"));
    }

    #[test]
    fn lighter_workload_wins_between_equals() {
        let sub = submission("t", PriorityClass::Normal);
        let mut busy = view("rev-busy");
        busy.workload_current = 4;
        let idle = view("rev-idle");

        let pool = vec![busy, idle];
        let picked = select(&pool, &sub, &cfg()).unwrap();
        assert_eq!(picked.token, OpaqueToken::from("rev-idle"));
    }

    #[test]
    fn ties_break_to_longest_idle() {
        let sub = submission("t", PriorityClass::Normal);
        let now = Utc::now();
        let mut recent = view("rev-recent");
        recent.last_assigned_at = Some(now);
        let mut stale = view("rev-stale");
        stale.last_assigned_at = Some(now - Duration::hours(6));
        let never = view("rev-never");

        let pool = vec![recent.clone(), stale.clone()];
        assert_eq!(
            select(&pool, &sub, &cfg()).unwrap().token,
            OpaqueToken::from("rev-stale")
        );

        let pool = vec![recent, stale, never];
        assert_eq!(
            select(&pool, &sub, &cfg()).unwrap().token,
            OpaqueToken::from("rev-never")
        );
    }

    #[test]
    fn urgent_narrows_to_fast_pool() {
        let mut sub = submission("t", PriorityClass::Urgent);
        sub.priority_class = PriorityClass::Urgent;
        let mut slow = view("rev-slow");
        slow.speed = 0.2;
        // Slow reviewer is otherwise far more attractive.
        slow.performance_score = 1.0;
        let mut fast = view("rev-fast");
        fast.speed = 0.9;

        let pool = vec![slow, fast];
        let picked = select(&pool, &sub, &cfg()).unwrap();
        assert_eq!(picked.token, OpaqueToken::from("rev-fast"));
    }

    #[test]
    fn urgent_quartile_keeps_only_the_fastest_of_four() {
        let sub = submission("t", PriorityClass::Urgent);
        let mut pool = Vec::new();
        for (i, speed) in [0.2, 0.4, 0.6, 0.9].into_iter().enumerate() {
            let mut v = view(&format!("rev-{i}"));
            v.speed = speed;
            // Slower reviewers score better so the speed gate must do
            // the narrowing.
            v.performance_score = 1.0 - speed;
            pool.push(v);
        }
        let picked = select(&pool, &sub, &cfg()).unwrap();
        assert_eq!(picked.token, OpaqueToken::from("rev-3"));
    }

    #[test]
    fn urgent_falls_back_when_pool_is_uniform() {
        let sub = submission("t", PriorityClass::Urgent);
        let a = view("rev-a");
        let b = view("rev-b");
        let pool = vec![a, b];
        assert!(select(&pool, &sub, &cfg()).is_some());
    }
}

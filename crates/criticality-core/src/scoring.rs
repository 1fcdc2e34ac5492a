use crate::constants::SCORE_DECIMALS;
use crate::metric::{Metric, MetricVector};
use crate::weights::{ExtraParam, WeightConfig};

/// Log-scaled contribution of one signal.
///
/// `weight * ln(1 + value) / ln(1 + max(value, threshold))`. Zero maps to
/// zero, and once `value` reaches `threshold` the contribution is exactly
/// `weight`.
pub fn log_score(value: f64, threshold: f64, weight: f64) -> f64 {
    let value = if value.is_nan() { 0.0 } else { value.max(0.0) };
    let denominator = value.max(threshold).ln_1p();
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    weight * value.ln_1p() / denominator
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let m = 10f64.powi(decimals);
    (value * m).round() / m
}

/// Weighted mean of the per-metric log scores, clamped to `[0, 1]` and
/// rounded to five decimals.
///
/// `updated_since` carries a negative weight: fewer months since the last
/// commit lowers a negative term and so raises the final score.
#[allow(clippy::cast_precision_loss)]
pub fn criticality_score(vector: &MetricVector, weights: &WeightConfig, extras: &[ExtraParam]) -> f64 {
    let mut total_weight = 0.0;
    let mut total = 0.0;

    for metric in Metric::ALL {
        let w = weights.get(metric);
        total_weight += w.weight;
        total += log_score(vector.get(metric).as_f64(), w.threshold, w.weight);
    }
    for extra in extras {
        total_weight += extra.weight as f64;
        total += log_score(
            extra.value as f64,
            extra.threshold as f64,
            extra.weight as f64,
        );
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    let raw = total / total_weight;
    if !raw.is_finite() {
        return 0.0;
    }
    round_to(raw.clamp(0.0, 1.0), SCORE_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::MetricWeight;

    #[test]
    fn zero_value_contributes_nothing() {
        for threshold in [0.5, 1.0, 26.0, 500_000.0] {
            for weight in [-1.0, 0.5, 2.0] {
                assert!(log_score(0.0, threshold, weight).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn log_score_is_monotonic_and_capped_at_weight() {
        let mut prev = 0.0;
        for v in 0..2000 {
            let s = log_score(f64::from(v), 120.0, 1.0);
            assert!(s >= prev, "decreased at {v}");
            assert!(s <= 1.0 + 1e-12);
            prev = s;
        }
        assert!((log_score(120.0, 120.0, 2.0) - 2.0).abs() < 1e-12);
        assert!((log_score(1e12, 120.0, 2.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn score_stays_within_unit_interval_for_extreme_inputs() {
        let huge = MetricVector {
            created_since: u64::MAX,
            updated_since: 0,
            contributor_count: u64::MAX,
            org_count: u64::MAX,
            commit_frequency: f64::MAX,
            recent_releases_count: u64::MAX,
            updated_issues_count: u64::MAX,
            closed_issues_count: u64::MAX,
            comment_frequency: f64::INFINITY,
            dependents_count: u64::MAX,
        };
        let stale = MetricVector {
            updated_since: u64::MAX,
            ..MetricVector::default()
        };
        let weights = WeightConfig::default();
        for vector in [huge, stale, MetricVector::default()] {
            let s = criticality_score(&vector, &weights, &[]);
            assert!((0.0..=1.0).contains(&s), "score {s} out of range");
        }

        let skewed = WeightConfig::with_overrides([
            ("created_since", MetricWeight::new(-50.0, 1.0)),
            ("org_count", MetricWeight::new(0.0, 1.0)),
        ])
        .expect("weights");
        let extras = [ExtraParam {
            value: i64::MAX,
            weight: -3,
            threshold: 1,
        }];
        let s = criticality_score(&huge, &skewed, &extras);
        assert!((0.0..=1.0).contains(&s), "score {s} out of range");
    }

    #[test]
    fn recent_activity_raises_score() {
        let weights = WeightConfig::default();
        let base = MetricVector {
            created_since: 24,
            contributor_count: 40,
            ..MetricVector::default()
        };
        let fresh = MetricVector {
            updated_since: 0,
            ..base
        };
        let stale = MetricVector {
            updated_since: 60,
            ..base
        };
        assert!(criticality_score(&fresh, &weights, &[]) > criticality_score(&stale, &weights, &[]));
    }

    #[test]
    fn rounds_to_five_decimals() {
        assert!((round_to(0.123_456_789, 5) - 0.12346).abs() < 1e-12);
    }
}

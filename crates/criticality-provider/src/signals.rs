//! Platform-independent arithmetic shared by the adapters.

use chrono::{DateTime, Utc};

/// Whole months (30-day units, ties to even) between `earlier` and `now`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn months_since(earlier: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let days = (now - earlier).num_days().max(0);
    (days as f64 / 30.0).round_ties_even() as u64
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Collapses trivial variants of a company name to one key.
pub fn normalize_org_name(raw: &str) -> String {
    raw.to_lowercase()
        .replace("inc.", "")
        .replace("llc", "")
        .replace('@', "")
        .replace(char::is_whitespace, "")
        .trim_end_matches(',')
        .to_string()
}

/// Release count estimated from the overall tag history, prorated to the
/// lookback window.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn extrapolate_releases(total_tags: u64, days_since_creation: u64, lookback_days: i64) -> u64 {
    if days_since_creation == 0 {
        return 0;
    }
    let per_day = total_tags as f64 / days_since_creation as f64;
    (per_day * lookback_days as f64).round_ties_even().max(0.0) as u64
}

/// Mean comments per issue; zero when there are no issues.
#[allow(clippy::cast_precision_loss)]
pub fn comment_frequency(comments: u64, issues: u64) -> f64 {
    if issues == 0 {
        return 0.0;
    }
    round1(comments as f64 / issues as f64)
}

/// Mean commits per week over a year of activity.
#[allow(clippy::cast_precision_loss)]
pub fn weekly_commit_frequency(commits_in_year: u64) -> f64 {
    round1(commits_in_year as f64 / 52.0)
}

//! Default weights, thresholds and lookback windows.

pub const CREATED_SINCE_WEIGHT: f64 = 1.0;
pub const UPDATED_SINCE_WEIGHT: f64 = -1.0;
pub const CONTRIBUTOR_COUNT_WEIGHT: f64 = 2.0;
pub const ORG_COUNT_WEIGHT: f64 = 1.0;
pub const COMMIT_FREQUENCY_WEIGHT: f64 = 1.0;
pub const RECENT_RELEASES_WEIGHT: f64 = 0.5;
pub const CLOSED_ISSUES_WEIGHT: f64 = 0.5;
pub const UPDATED_ISSUES_WEIGHT: f64 = 0.5;
pub const COMMENT_FREQUENCY_WEIGHT: f64 = 1.0;
pub const DEPENDENTS_COUNT_WEIGHT: f64 = 2.0;

pub const CREATED_SINCE_THRESHOLD: f64 = 120.0;
pub const UPDATED_SINCE_THRESHOLD: f64 = 120.0;
pub const CONTRIBUTOR_COUNT_THRESHOLD: f64 = 5000.0;
pub const ORG_COUNT_THRESHOLD: f64 = 10.0;
pub const COMMIT_FREQUENCY_THRESHOLD: f64 = 1000.0;
pub const RECENT_RELEASES_THRESHOLD: f64 = 26.0;
pub const CLOSED_ISSUES_THRESHOLD: f64 = 5000.0;
pub const UPDATED_ISSUES_THRESHOLD: f64 = 5000.0;
pub const COMMENT_FREQUENCY_THRESHOLD: f64 = 15.0;
pub const DEPENDENTS_COUNT_THRESHOLD: f64 = 500_000.0;

pub const TOP_CONTRIBUTOR_COUNT: usize = 15;
pub const ISSUE_LOOKBACK_DAYS: i64 = 90;
pub const RELEASE_LOOKBACK_DAYS: i64 = 365;

/// Contributor listings beyond this size are refused by the platform.
pub const MAX_CONTRIBUTOR_COUNT: u64 = 5000;
/// Org count reported when contributors cannot be enumerated.
pub const TOO_MANY_CONTRIBUTORS_ORG_COUNT: u64 = 10;
pub const MAX_ISSUES_COUNT: u64 = 5000;
/// Release estimate used when tags cannot be enumerated.
pub const RECENT_RELEASES_CAP: u64 = 26;

pub const SCORE_DECIMALS: i32 = 5;

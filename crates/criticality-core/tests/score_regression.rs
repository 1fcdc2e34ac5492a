use criticality_core::{
    criticality_score, parse_csv, parse_extra_params, render_csv, MetricVector, ScoreResult,
    WeightConfig,
};

fn synthetic() -> MetricVector {
    MetricVector {
        created_since: 12,
        updated_since: 1,
        contributor_count: 50,
        org_count: 3,
        commit_frequency: 10.0,
        recent_releases_count: 4,
        updated_issues_count: 20,
        closed_issues_count: 15,
        comment_frequency: 2.0,
        dependents_count: 100,
    }
}

#[test]
fn synthetic_repository_score_is_pinned() {
    let score = criticality_score(&synthetic(), &WeightConfig::default(), &[]);
    assert!((score - 0.46165).abs() < 1e-12, "score drifted: {score}");
}

#[test]
fn extra_params_join_the_total_weight() {
    let extras = parse_extra_params(["7:2:10"]).expect("extras");
    let score = criticality_score(&synthetic(), &WeightConfig::default(), &extras);
    assert!((score - 0.5389).abs() < 1e-12, "score drifted: {score}");

    // A zero-valued extra only dilutes the canonical metrics.
    let extras = parse_extra_params(["0:1:10"]).expect("extras");
    let diluted = criticality_score(&synthetic(), &WeightConfig::default(), &extras);
    assert!(diluted < 0.46165);
}

#[test]
fn csv_round_trip_preserves_metric_vector() {
    let metrics = synthetic();
    let result = ScoreResult {
        name: "widget".to_string(),
        url: "https://github.com/acme/widget".to_string(),
        language: Some("Go".to_string()),
        metrics,
        criticality_score: criticality_score(&metrics, &WeightConfig::default(), &[]),
    };
    let doc = render_csv(std::slice::from_ref(&result));
    let parsed = parse_csv(&doc).expect("parse csv");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].metrics, metrics);
    assert!((parsed[0].criticality_score - result.criticality_score).abs() < 1e-9);
}

use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_criticality_score"))
        .args(args)
        .env_remove("GITHUB_AUTH_TOKEN")
        .env_remove("GITHUB_TOKEN")
        .env_remove("GITLAB_AUTH_TOKEN")
        .env("RUST_LOG", "off")
        .output()
        .expect("spawn criticality_score")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).to_string()
}

#[test]
fn help_lists_the_flags() {
    let out = run(&["--help"]);
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for flag in ["--repo", "--format", "--params", "--weights", "--verbose"] {
        assert!(text.contains(flag), "missing {flag}");
    }
}

#[test]
fn malformed_params_fail_before_any_request() {
    let out = run(&["--repo", "github.com/acme/widget", "--params", "1:2"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("--params"));
}

#[test]
fn unsupported_host_is_fatal() {
    let out = run(&["--repo", "bitbucket.org/acme/widget"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("unsupported platform"));
}

#[test]
fn github_without_token_is_fatal() {
    let out = run(&["--repo", "github.com/acme/widget"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("GITHUB_AUTH_TOKEN"));
    assert!(out.stdout.is_empty());
}

#[test]
fn missing_weights_file_is_fatal() {
    let out = run(&[
        "--repo",
        "github.com/acme/widget",
        "--weights",
        "/nonexistent/criticality-weights.toml",
    ]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("weights file"));
}

#[test]
fn repo_flag_is_required() {
    let out = run(&[]);
    assert!(!out.status.success());
}

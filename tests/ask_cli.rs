#![cfg(unix)]

mod common;

use common::{stdout_json, MockResponses, TestEnv};

#[test]
fn approved_answer_is_reported_as_json() {
    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let output = env
        .ask(&["--json", "What is the capital of France?"])
        .expect("run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let outcome = stdout_json(&output).expect("json");
    assert_eq!(outcome["status"], "approved");
    assert_eq!(outcome["role"], "General Knowledge Expert");
    assert_eq!(outcome["judge_verdict"], true);
    assert_eq!(outcome["retry_count"], 0);
    assert_eq!(outcome["answer"], "Paris is the capital of France.");
    assert_eq!(outcome["answer_history"].as_array().map(Vec::len), Some(1));
}

#[test]
fn human_output_shows_role_status_and_answer() {
    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let output = env
        .ask(&["--direct", "What is the capital of France?"])
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Role: General Knowledge Expert"));
    assert!(stdout.contains("Status: approved"));
    assert!(stdout.contains("Paris is the capital of France."));
}

#[test]
fn exhausted_retries_return_best_effort() {
    let responses = MockResponses {
        verdict: r#"{"judge": false, "reason": "lacks sources"}"#.to_string(),
        ..MockResponses::default()
    };
    let env = TestEnv::new(&responses).expect("env");
    let log = env.path("calls.jsonl");
    let output = env
        .ask(&[
            "--json",
            "--max-retries",
            "1",
            "--log",
            log.to_str().expect("utf8 path"),
            "Why is the sky blue?",
        ])
        .expect("run");
    assert!(output.status.success());

    let outcome = stdout_json(&output).expect("json");
    assert_eq!(outcome["status"], "best_effort");
    assert_eq!(outcome["judge_verdict"], false);
    assert_eq!(outcome["judge_reason"], "lacks sources");
    assert_eq!(outcome["retry_count"], 1);
    assert_eq!(outcome["answer_history"].as_array().map(Vec::len), Some(2));

    let summary = env
        .ranswer()
        .args(["log", "--json"])
        .arg(&log)
        .output()
        .expect("log");
    assert!(summary.status.success());
    let summary = stdout_json(&summary).expect("json");
    assert_eq!(summary["by_kind"]["answer"], 2);
    assert_eq!(summary["by_kind"]["quality_check"], 2);
    assert_eq!(summary["by_kind"]["role_selection"], 1);
    assert_eq!(summary["failed"], 0);
}

#[test]
fn scripted_answers_feed_clarification_context() {
    let responses = MockResponses {
        clarification: r#"{"need": true, "reasons": ["destination unknown"], "questions": ["Which city?"]}"#
            .to_string(),
        ..MockResponses::default()
    };
    let env = TestEnv::new(&responses).expect("env");
    let output = env
        .ask(&["--json", "--answer", "Kyoto", "Plan a weekend trip"])
        .expect("run");
    assert!(output.status.success());

    let outcome = stdout_json(&output).expect("json");
    assert_eq!(outcome["extra_context"], "Which city? => Kyoto");
}

#[test]
fn human_output_includes_clarification_context() {
    let responses = MockResponses {
        clarification: r#"{"need": true, "reasons": [], "questions": ["Which city?"]}"#
            .to_string(),
        ..MockResponses::default()
    };
    let env = TestEnv::new(&responses).expect("env");
    let output = env
        .ask(&["--answer", "Kyoto", "Plan a weekend trip"])
        .expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Additional context:"));
    assert!(stdout.contains("Which city? => Kyoto"));
}

#[test]
fn human_output_omits_empty_context() {
    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let output = env.ask(&["--direct", "What is the capital of France?"]).expect("run");
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Additional context:"));
}

#[test]
fn query_is_read_from_stdin_when_omitted() {
    use std::io::Write;
    use std::process::Stdio;

    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let mut child = env
        .ranswer()
        .args(["ask", "--direct", "--json", "--lm", env.lm_command.as_str()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"What is the capital of France?\n")
        .expect("write");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output).expect("json")["status"], "approved");
}

#[test]
fn failing_lm_aborts_with_error_kind() {
    let env = TestEnv::failing().expect("env");
    let output = env.ask(&["--json", "anything"]).expect("run");
    assert!(!output.status.success());

    let report = stdout_json(&output).expect("json");
    assert_eq!(report["kind"], "remote_call_error");
    assert_eq!(report["transient"], true);
    assert!(report["last_completed"].is_null());
    assert!(String::from_utf8_lossy(&output.stderr).contains("upstream unavailable"));
}

#[test]
fn missing_lm_command_is_a_usage_error() {
    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let output = env
        .ranswer()
        .args(["ask", "question"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("RANSWER_LM_COMMAND"));
}

#[test]
fn lm_command_can_come_from_environment() {
    let env = TestEnv::new(&MockResponses::default()).expect("env");
    let output = env
        .ranswer()
        .env("RANSWER_LM_COMMAND", &env.lm_command)
        .args(["ask", "--direct", "--json", "What is the capital of France?"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output).expect("json")["status"], "approved");
}

//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hm2eval() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("hm2eval").unwrap();
    cmd.env_remove("HM2EVAL_PARALLELISM");
    cmd
}

const QUERY_RESULTS: &str = r#"[
  {
    "prompt_idx": 0,
    "model_name": "demo-model",
    "response": "The total energy is $\\boxed{\\frac{1}{2} k A^2}$.",
    "prompt": "Find the energy of the oscillator.",
    "solution": "E",
    "parameters": "k = 20, A = 0.1, E = k A^2 / 2",
    "type": "mechanics"
  },
  {
    "prompt_idx": 1,
    "model_name": "demo-model",
    "response": "So the answer is \\boxed{7}.",
    "prompt": "Add three and five.",
    "solution": "8",
    "parameters": "",
    "type": "arithmetic"
  },
  {
    "prompt_idx": 2,
    "model_name": "demo-model",
    "response": null,
    "error": "rate limited",
    "prompt": "Square it.",
    "solution": "f(x) = x^2",
    "parameters": null,
    "type": "functions"
  }
]"#;

fn write_query_results(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("demo_model_1017120000.json");
    std::fs::write(&path, QUERY_RESULTS).unwrap();
    path
}

#[test]
fn check_equivalent_answer() {
    let output = hm2eval()
        .args(["check", "--response", r"\boxed{x+1}", "--solution", "1+x"])
        .args(["--parameters", "x=3"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["is_equivalent"], true);
    assert!(json["error_message"].is_null());
}

#[test]
fn check_wrong_answer() {
    let output = hm2eval()
        .args(["check", "--response", r"\boxed{5}", "--solution", "4"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["is_equivalent"], false);
}

#[test]
fn check_reads_response_from_file() {
    let tmp = TempDir::new().unwrap();
    let response = tmp.path().join("response.txt");
    std::fs::write(&response, "Therefore $f(x) = x \\cdot x$.").unwrap();

    hm2eval()
        .arg("check")
        .arg("--response")
        .arg(format!("@{}", response.display()))
        .args(["--solution", "f(x)=x^2", "--kind", "functional"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""is_equivalent": true"#));
}

#[test]
fn check_reports_failure_kind() {
    hm2eval()
        .args(["check", "--response", r"\boxed{\frac{1}{x-2}}", "--solution", "1"])
        .args(["--parameters", "x=2", "--kind", "symbolic"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""success": false"#))
        .stdout(predicate::str::contains("domain_failure"));
}

#[test]
fn check_unknown_kind_fails() {
    hm2eval()
        .args(["check", "--response", "1", "--solution", "1", "--kind", "matrix"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown answer kind"));
}

#[test]
fn evaluate_writes_report() {
    let tmp = TempDir::new().unwrap();
    let input = write_query_results(tmp.path());
    let out = tmp.path().join("eval_results");

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("evaluate")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .args(["--parallelism", "2"])
        .assert()
        .success()
        .stderr(predicate::str::contains("demo-model"))
        .stderr(predicate::str::contains("Report saved to"));

    let dirs: Vec<_> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(dirs.len(), 1);

    let success: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dirs[0].join("success_results.json")).unwrap())
            .unwrap();
    let failed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dirs[0].join("failed_results.json")).unwrap())
            .unwrap();

    let passed = success["demo-model"].as_array().unwrap();
    assert_eq!(passed.len(), 2);
    assert_eq!(passed[0]["is_equivalent"], true);
    assert_eq!(passed[1]["is_equivalent"], false);
    assert_eq!(passed[0]["type"], "mechanics");

    let failures = failed["demo-model"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["success"], false);
    assert_eq!(failures[0]["failure"], "extraction_failure");
}

#[test]
fn evaluate_directory_input() {
    let tmp = TempDir::new().unwrap();
    let queries = tmp.path().join("queries");
    std::fs::create_dir_all(&queries).unwrap();
    write_query_results(&queries);
    std::fs::write(queries.join("broken.json"), "{ not json").unwrap();

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("evaluate")
        .arg("--input")
        .arg(&queries)
        .arg("--output")
        .arg(tmp.path().join("out"))
        .assert()
        .success();
}

#[test]
fn evaluate_selected_models_from_config() {
    let tmp = TempDir::new().unwrap();
    let queries = tmp.path().join("query_results");
    std::fs::create_dir_all(&queries).unwrap();
    write_query_results(&queries);
    std::fs::write(
        tmp.path().join("hm2eval.toml"),
        "query_results_dir = \"./query_results\"\n\
         eval_results_dir = \"./eval_results\"\n\
         parallelism = 1\n\
         [models]\n\
         \"demo-model\" = \"latest\"\n",
    )
    .unwrap();

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("evaluate")
        .assert()
        .success();

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .args(["summarize", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""model": "demo-model""#))
        .stdout(predicate::str::contains(r#""parse_rate": 66.7"#))
        .stdout(predicate::str::contains(r#""pass_at_1": 50.0"#));
}

#[test]
fn evaluate_missing_input_fails() {
    hm2eval()
        .args(["evaluate", "--input", "/nonexistent/queries.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn summarize_text_report() {
    let tmp = TempDir::new().unwrap();
    let input = write_query_results(tmp.path());
    let out = tmp.path().join("eval_results");

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("evaluate")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let report = std::fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    hm2eval()
        .arg("summarize")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report:"))
        .stderr(predicate::str::contains("Pass@1"))
        .stderr(predicate::str::contains("mechanics"));
}

#[test]
fn summarize_without_reports_fails() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("eval_results")).unwrap();

    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("summarize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no evaluation reports"));
}

#[test]
fn summarize_unknown_format_fails() {
    let tmp = TempDir::new().unwrap();
    let input = write_query_results(tmp.path());
    let out = tmp.path().join("eval_results");
    hm2eval()
        .current_dir(tmp.path())
        .env("HOME", tmp.path())
        .arg("evaluate")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success();

    let report = std::fs::read_dir(&out).unwrap().next().unwrap().unwrap().path();
    hm2eval()
        .arg("summarize")
        .arg("--report")
        .arg(&report)
        .args(["--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn init_creates_config() {
    let tmp = TempDir::new().unwrap();

    hm2eval()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created hm2eval.toml"));

    assert!(tmp.path().join("hm2eval.toml").exists());
    assert!(tmp.path().join("query_results").is_dir());

    hm2eval()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn help_lists_commands() {
    hm2eval()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("evaluate"))
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("init"));
}

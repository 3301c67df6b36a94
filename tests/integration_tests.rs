//! Integration test harness
//!
//! Runs whole conversations through the binary with the offline mock
//! provider.

mod common;

use std::fs;
use std::time::Duration;

use predicates::prelude::*;

use common::{read_json, TestEnvironment};

const RUN_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment with Alice and Bob saved and "coffee" as the topic
fn coffee_chat() -> TestEnvironment {
    let env = TestEnvironment::new();
    env.add_persona("Alice", "Barista who loves espresso");
    env.add_persona("Bob", "Tea drinker and coffee skeptic");
    env.cmd().args(["topic", "set", "coffee"]).assert().success();
    env
}

fn speakers(transcript: &serde_json::Value) -> Vec<String> {
    transcript["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["personaName"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// End-to-End Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_two_personas_alternate_until_cap() {
    let env = coffee_chat();
    let out = env.path("transcript.json");

    env.cmd()
        .args(["run", "--transcript"])
        .arg(&out)
        .timeout(RUN_TIMEOUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Topic: coffee"))
        .stdout(predicate::str::contains("Iteration: 1 / 4"))
        .stdout(predicate::str::contains("Iteration: 4 / 4"))
        .stdout(predicate::str::contains("Iteration: 5").not())
        .stdout(predicate::str::contains("scripted message number 1."));

    let transcript = read_json(&out);
    assert_eq!(transcript["topic"], "coffee");
    assert_eq!(transcript["iterations"], 4);
    assert_eq!(transcript["personas"].as_array().unwrap().len(), 2);

    let names = speakers(&transcript);
    assert_eq!(names.len(), 4);
    assert_ne!(names[0], names[1]);
    assert_eq!(names[0], names[2]);
    assert_eq!(names[1], names[3]);

    let first = &transcript["messages"][0];
    assert_eq!(first["role"], "assistant");
    assert!(first["id"].as_str().unwrap().starts_with("msg-"));
    assert!(first["personaId"].as_str().unwrap().starts_with("persona-"));
}

#[test]
fn test_iterations_override() {
    let env = coffee_chat();
    let out = env.path("short.json");

    env.cmd()
        .args(["run", "-n", "2", "--transcript"])
        .arg(&out)
        .timeout(RUN_TIMEOUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Iteration: 2 / 2"))
        .stdout(predicate::str::contains("Iteration: 3").not());

    assert_eq!(speakers(&read_json(&out)).len(), 2);
}

#[test]
fn test_topic_override_is_not_saved() {
    let env = coffee_chat();
    let out = env.path("tea.json");

    env.cmd()
        .args(["run", "-n", "1", "--topic", "tea", "--transcript"])
        .arg(&out)
        .timeout(RUN_TIMEOUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Topic: tea"));

    assert_eq!(read_json(&out)["topic"], "tea");
    assert_eq!(env.settings()["topic"], "coffee");
}

#[test]
fn test_three_personas_never_repeat_speaker() {
    let env = coffee_chat();
    env.add_persona("Carol", "Night owl programmer");
    let out = env.path("group.json");

    env.cmd()
        .args(["run", "-n", "6", "--transcript"])
        .arg(&out)
        .timeout(RUN_TIMEOUT)
        .assert()
        .success();

    let names = speakers(&read_json(&out));
    assert_eq!(names.len(), 6);
    for pair in names.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn test_provider_override_runs_offline() {
    let env = coffee_chat();
    env.write_config(&env.default_config().replace("provider = \"mock\"", "provider = \"openai\""));

    env.cmd()
        .args(["run", "-n", "1", "--provider", "mock"])
        .timeout(RUN_TIMEOUT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Iteration: 1 / 1"));
}

#[test]
fn test_prompt_log_records_prompts() {
    let env = coffee_chat();
    let prompt_log = env.path("logs/prompts.txt");
    env.write_config(&format!(
        "{}\n[logging]\nprompt_log = \"{}\"\n",
        env.default_config().replace("[logging]\nlevel = \"warn\"\n", ""),
        prompt_log.display()
    ));

    env.cmd()
        .args(["run", "-n", "2"])
        .timeout(RUN_TIMEOUT)
        .assert()
        .success();

    let content = fs::read_to_string(&prompt_log).unwrap();
    assert!(content.contains("[selection]"));
    assert!(content.contains("Choose the best person to start the conversation based on the topic \"coffee\"."));
    assert!(content.contains("[generation]"));
    assert!(content.contains("You are writing a message as"));
    assert!(content.contains("There are only you and one other person in the chat."));
}

#[test]
fn test_log_file_creation() {
    let env = coffee_chat();
    let log_dir = env.path("logs");
    env.write_config(&format!(
        "{}\n[logging]\nlevel = \"info\"\nfile = \"{}\"\n",
        env.default_config().replace("[logging]\nlevel = \"warn\"\n", ""),
        log_dir.join("bottalk.log").display()
    ));

    env.cmd()
        .args(["run", "-n", "1"])
        .timeout(RUN_TIMEOUT)
        .assert()
        .success();

    let entries = fs::read_dir(&log_dir).unwrap().count();
    assert!(entries > 0, "expected a log file in {}", log_dir.display());
}

// ─────────────────────────────────────────────────────────────────
// Failure Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_requires_two_personas() {
    let env = TestEnvironment::new();
    env.add_persona("Alice", "Barista");

    env.cmd()
        .arg("run")
        .timeout(RUN_TIMEOUT)
        .assert()
        .code(50)
        .stderr(predicate::str::contains("At least 2 personas"))
        .stderr(predicate::str::contains("persona add"));
}

#[test]
fn test_run_with_no_saved_settings() {
    TestEnvironment::new()
        .cmd()
        .arg("run")
        .timeout(RUN_TIMEOUT)
        .assert()
        .code(50);
}

#[test]
fn test_run_with_missing_config() {
    TestEnvironment::new()
        .bare_cmd()
        .args(["run", "--config", "/nonexistent/config.toml"])
        .timeout(RUN_TIMEOUT)
        .assert()
        .code(10);
}

#[test]
fn test_run_rejects_zero_iterations() {
    let env = coffee_chat();
    env.cmd()
        .args(["run", "-n", "0"])
        .timeout(RUN_TIMEOUT)
        .assert()
        .code(10)
        .stderr(predicate::str::contains("max_iterations"));
}

#[test]
fn test_malformed_settings_are_ignored() {
    let env = TestEnvironment::new();
    fs::write(&env.settings_path, "{ definitely not json").unwrap();

    env.cmd()
        .args(["persona", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No personas saved"));
}

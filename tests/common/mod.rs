//! Common test utilities and fixtures
//!
//! Every test gets its own temporary home, working directory, config file
//! and settings file, so nothing leaks in from the developer's machine.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// Environment variables that would change how the binary behaves
const ISOLATED_VARS: &[&str] = &[
    "BOTTALK_CONFIG",
    "BOTTALK_PROVIDER",
    "BOTTALK_BASE_URL",
    "BOTTALK_API_KEY",
    "BOTTALK_MODEL",
    "BOTTALK_MAX_ITERATIONS",
    "BOTTALK_STEP_DELAY_MS",
    "BOTTALK_LOG_LEVEL",
    "BOTTALK_LOG_FILE",
    "BOTTALK_LOG_JSON",
    "BOTTALK_PROMPT_LOG",
    "BOTTALK_DATA_DIR",
    "BOTTALK_SETTINGS_FILE",
    "OPENAI_API_KEY",
    "RUST_LOG",
];

/// Isolated test environment with its own config and settings file
pub struct TestEnvironment {
    pub root: TempDir,
    pub config_path: PathBuf,
    pub settings_path: PathBuf,
    pub data_dir: PathBuf,
}

impl TestEnvironment {
    /// Create an environment whose config uses the offline mock provider
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp directory");
        let data_dir = root.path().join("data");
        let config_path = root.path().join("config.toml");
        let settings_path = data_dir.join("settings.json");

        fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        let env = Self {
            root,
            config_path,
            settings_path,
            data_dir,
        };
        env.write_config(&env.default_config());
        env
    }

    pub fn default_config(&self) -> String {
        format!(
            r#"
[llm]
provider = "mock"

[simulation]
max_iterations = 4
step_delay_ms = 0

[logging]
level = "warn"

[storage]
data_dir = "{}"
"#,
            self.data_dir.display()
        )
    }

    pub fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    pub fn config_arg(&self) -> &str {
        self.config_path.to_str().expect("Config path is not UTF-8")
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// A `bottalk` command sandboxed to this environment (no `--config` added)
    pub fn bare_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bottalk").expect("Binary not built");
        for var in ISOLATED_VARS {
            cmd.env_remove(var);
        }
        cmd.current_dir(self.root.path())
            .env("HOME", self.root.path())
            .env("XDG_CONFIG_HOME", self.root.path().join(".config"));
        cmd
    }

    /// A `bottalk` command using this environment's config file
    pub fn cmd(&self) -> Command {
        let mut cmd = self.bare_cmd();
        cmd.arg("--config").arg(self.config_arg());
        cmd
    }

    /// Add a persona through the CLI
    pub fn add_persona(&self, name: &str, description: &str) {
        self.cmd()
            .args(["persona", "add", name, description])
            .assert()
            .success();
    }

    pub fn settings(&self) -> serde_json::Value {
        read_json(&self.settings_path)
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let content = fs::read_to_string(path).expect("Failed to read JSON file");
    serde_json::from_str(&content).expect("Invalid JSON")
}

//! Build script for BotTalk
//!
//! Embeds git and toolchain details so `bottalk version` can report
//! exactly which build is running.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = run("git", &["rev-parse", "--short=8", "HEAD"]);
    let git_branch = run("git", &["rev-parse", "--abbrev-ref", "HEAD"]);
    let git_dirty = match Command::new("git").args(["status", "--porcelain"]).output() {
        Ok(out) if out.status.success() => (!out.stdout.is_empty()).to_string(),
        _ => "unknown".to_string(),
    };

    let vars = [
        ("BOTTALK_GIT_HASH", git_hash),
        ("BOTTALK_GIT_BRANCH", git_branch),
        ("BOTTALK_GIT_DIRTY", git_dirty),
        (
            "BOTTALK_BUILD_TIMESTAMP",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
        ("BOTTALK_TARGET", cargo_var("TARGET")),
        ("BOTTALK_PROFILE", cargo_var("PROFILE")),
        ("BOTTALK_HOST", cargo_var("HOST")),
        ("BOTTALK_RUSTC_VERSION", run("rustc", &["--version"])),
    ];

    for (key, value) in vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
}

/// Run a command and return its trimmed stdout, or "unknown"
fn run(program: &str, args: &[&str]) -> String {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn cargo_var(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| "unknown".to_string())
}

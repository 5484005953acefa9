//! Build script to stamp the bridge binaries with a version and git SHA.
//!
//! - AUDAC_VERSION: version string (defaults to CARGO_PKG_VERSION)
//! - AUDAC_GIT_SHA: short commit SHA (defaults to GITHUB_SHA, then `git rev-parse`)

use std::process::Command;

fn main() {
    let version = std::env::var("AUDAC_VERSION").unwrap_or_else(|_| {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into())
    });
    println!("cargo:rustc-env=AUDAC_VERSION={}", version);

    let git_sha = std::env::var("AUDAC_GIT_SHA")
        .or_else(|_| {
            std::env::var("GITHUB_SHA").map(|s| s.get(..7).unwrap_or(&s).to_string())
        })
        .unwrap_or_else(|_| short_sha_from_git());
    println!("cargo:rustc-env=AUDAC_GIT_SHA={}", git_sha);

    println!("cargo:rerun-if-env-changed=AUDAC_VERSION");
    println!("cargo:rerun-if-env-changed=AUDAC_GIT_SHA");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
}

fn short_sha_from_git() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}

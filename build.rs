//! Build script injecting the version and git revision reported as accessory metadata.
//!
//! Environment variables (set by CI or fall back to defaults):
//! - FPC_VERSION: Version string (defaults to CARGO_PKG_VERSION)
//! - FPC_GIT_SHA: Git commit SHA (defaults to GITHUB_SHA, then git rev-parse, then "unknown")

use std::process::Command;

fn main() {
    let version = std::env::var("FPC_VERSION").unwrap_or_else(|_| {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "unknown".into())
    });
    println!("cargo:rustc-env=FPC_VERSION={}", version);

    let git_sha = std::env::var("FPC_GIT_SHA")
        .ok()
        .or_else(|| {
            std::env::var("GITHUB_SHA")
                .ok()
                .map(|s| s.get(..7).unwrap_or(&s).to_string())
        })
        .unwrap_or_else(get_git_sha);
    println!("cargo:rustc-env=FPC_GIT_SHA={}", git_sha);

    println!("cargo:rerun-if-env-changed=FPC_VERSION");
    println!("cargo:rerun-if-env-changed=FPC_GIT_SHA");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");
}

fn get_git_sha() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".into())
}

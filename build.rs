use std::process::Command;

// Exposes the source revision as MVPA_GIT_SHA; an explicit value wins (release tarballs have no .git).
fn main() {
    println!("cargo:rerun-if-env-changed=MVPA_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let revision = std::env::var("MVPA_GIT_SHA")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(describe_head);

    if let Some(revision) = revision {
        println!("cargo:rustc-env=MVPA_GIT_SHA={}", revision.trim());
    }
}

fn describe_head() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=7"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

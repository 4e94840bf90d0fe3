#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

pub const ME: &str = "me@example.com";

pub fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// Runs git in `dir` with fixed author and committer dates, returning stdout.
pub fn git_at(dir: &Path, when: Option<&str>, args: &[&str]) -> String {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    if let Some(when) = when {
        cmd.env("GIT_AUTHOR_DATE", when).env("GIT_COMMITTER_DATE", when);
    }
    let out = cmd.output().unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

pub fn git(dir: &Path, args: &[&str]) -> String {
    git_at(dir, None, args)
}

pub fn init_git_repo(dir: &Path, email: &str) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["config", "core.autocrlf", "false"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "user.email", email]);
    git(dir, &["config", "user.name", "Test Author"]);
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

pub fn lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i}\n")).collect()
}

/// Stages everything and commits at `when` (RFC 3339). Returns the new sha.
pub fn commit_all(dir: &Path, when: &str, message: &str) -> String {
    git(dir, &["add", "-A"]);
    git_at(dir, Some(when), &["commit", "-q", "--allow-empty", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

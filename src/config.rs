use crate::classify::{BootstrapThresholds, OutlierLimits};
use crate::error::{GtallyError, Result};
use crate::identity::{normalize_email, normalize_github_username, normalize_name};
use glob::Pattern;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_TOP_COMMITS: usize = 50;

const DEFAULT_EXCLUDE_DIRNAMES: &[&str] = &[
    ".git",
    ".venv",
    "reports",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "target",
    ".idea",
    ".pytest_cache",
    "__pycache__",
];

/// Raw JSON configuration. Every key is optional; [`FileConfig::validate`]
/// turns it into the immutable [`Settings`] the engine runs on.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub me_emails: Vec<String>,
    pub me_names: Vec<String>,
    pub me_email_globs: Vec<String>,
    pub me_name_globs: Vec<String>,
    pub me_github_usernames: Vec<String>,
    pub github_username: Option<String>,

    pub exclude_dirnames: Vec<String>,
    pub include_remote_prefixes: Vec<String>,
    pub remote_name_priority: Vec<String>,
    pub remote_filter_mode: String,
    pub exclude_forks: bool,
    pub fork_remote_names: Vec<String>,
    pub excluded_repos: Vec<String>,
    pub dedupe: String,

    pub exclude_path_prefixes: Vec<String>,
    pub exclude_path_globs: Vec<String>,

    pub bootstrap_changed_threshold: i64,
    pub bootstrap_files_threshold: i64,
    pub bootstrap_addition_ratio: f64,
    pub bootstrap_outlier_changed_multiplier: i64,
    pub bootstrap_outlier_files_multiplier: i64,
    pub bootstrap_exclude_shas: Vec<String>,
    pub exclude_commits: Vec<String>,

    pub include_merges: bool,
    pub top_commits: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        let bootstrap = BootstrapThresholds::default();
        let outliers = OutlierLimits::default();
        Self {
            me_emails: Vec::new(),
            me_names: Vec::new(),
            me_email_globs: Vec::new(),
            me_name_globs: Vec::new(),
            me_github_usernames: Vec::new(),
            github_username: None,
            exclude_dirnames: DEFAULT_EXCLUDE_DIRNAMES.iter().map(|s| s.to_string()).collect(),
            include_remote_prefixes: Vec::new(),
            remote_name_priority: vec!["origin".to_string(), "upstream".to_string()],
            remote_filter_mode: "any".to_string(),
            exclude_forks: false,
            fork_remote_names: vec!["upstream".to_string()],
            excluded_repos: Vec::new(),
            dedupe: "remote".to_string(),
            exclude_path_prefixes: Vec::new(),
            exclude_path_globs: Vec::new(),
            bootstrap_changed_threshold: bootstrap.changed as i64,
            bootstrap_files_threshold: bootstrap.files as i64,
            bootstrap_addition_ratio: bootstrap.addition_ratio,
            bootstrap_outlier_changed_multiplier: outliers.changed_multiplier as i64,
            bootstrap_outlier_files_multiplier: outliers.files_multiplier as i64,
            bootstrap_exclude_shas: Vec::new(),
            exclude_commits: Vec::new(),
            include_merges: false,
            top_commits: DEFAULT_TOP_COMMITS,
        }
    }
}

impl FileConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| GtallyError::config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| GtallyError::config(format!("{}: {e}", path.display())))
    }

    pub fn has_identity(&self) -> bool {
        !(self.me_emails.is_empty()
            && self.me_names.is_empty()
            && self.me_email_globs.is_empty()
            && self.me_name_globs.is_empty()
            && self.me_github_usernames.is_empty()
            && self.github_username.as_deref().map_or(true, |u| u.trim().is_empty()))
    }

    /// Fills an empty identity from the global git config.
    pub fn with_inferred_identity(mut self) -> Self {
        if self.has_identity() {
            return self;
        }
        if let Some(email) = git_global_config("user.email") {
            self.me_emails.push(email);
        }
        if let Some(name) = git_global_config("user.name") {
            self.me_names.push(name);
        }
        self
    }

    pub fn validate(&self) -> Result<Settings> {
        if self.bootstrap_changed_threshold < 0 {
            return Err(GtallyError::config(format!(
                "bootstrap_changed_threshold must be >= 0, got {}",
                self.bootstrap_changed_threshold
            )));
        }
        if self.bootstrap_files_threshold < 0 {
            return Err(GtallyError::config(format!(
                "bootstrap_files_threshold must be >= 0, got {}",
                self.bootstrap_files_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.bootstrap_addition_ratio) {
            return Err(GtallyError::config(format!(
                "bootstrap_addition_ratio must be within [0, 1], got {}",
                self.bootstrap_addition_ratio
            )));
        }
        if self.bootstrap_outlier_changed_multiplier < 1 || self.bootstrap_outlier_files_multiplier < 1 {
            return Err(GtallyError::config("bootstrap outlier multipliers must be >= 1"));
        }

        let remote_filter_mode = match self.remote_filter_mode.trim().to_ascii_lowercase().as_str() {
            "" | "any" => RemoteFilterMode::Any,
            "primary" => RemoteFilterMode::Primary,
            other => {
                return Err(GtallyError::config(format!(
                    "remote_filter_mode must be 'any' or 'primary', got '{other}'"
                )))
            }
        };
        let dedupe = match self.dedupe.trim().to_ascii_lowercase().as_str() {
            "" | "remote" => DedupeMode::Remote,
            "path" => DedupeMode::Path,
            other => {
                return Err(GtallyError::config(format!(
                    "dedupe must be 'remote' or 'path', got '{other}'"
                )))
            }
        };

        let mut github_usernames = self.me_github_usernames.clone();
        if github_usernames.is_empty() {
            github_usernames.extend(self.github_username.iter().cloned());
        }

        let identity = IdentityRules {
            emails: normalized(&self.me_emails, normalize_email),
            names: normalized(&self.me_names, normalize_name),
            email_globs: compile_globs(&normalized_vec(&self.me_email_globs, normalize_email), "me_email_globs")?,
            name_globs: compile_globs(&normalized_vec(&self.me_name_globs, normalize_name), "me_name_globs")?,
            github_usernames: normalized(&github_usernames, normalize_github_username),
        };

        let repos = RepoRules {
            exclude_dirnames: self.exclude_dirnames.iter().cloned().collect(),
            include_remote_prefixes: self
                .include_remote_prefixes
                .iter()
                .filter(|p| !p.trim().is_empty())
                .cloned()
                .collect(),
            remote_name_priority: self.remote_name_priority.clone(),
            remote_filter_mode,
            exclude_forks: self.exclude_forks,
            fork_remote_names: self.fork_remote_names.clone(),
            excluded_repos: compile_globs(&self.excluded_repos, "excluded_repos")?,
            dedupe,
        };

        let paths = PathRules {
            prefixes: self
                .exclude_path_prefixes
                .iter()
                .map(|p| normalize_rel_path(p))
                .filter(|p| !p.is_empty())
                .map(|p| if p.ends_with('/') { p } else { format!("{p}/") })
                .collect(),
            globs: compile_globs(&self.exclude_path_globs, "exclude_path_globs")?,
        };

        Ok(Settings {
            identity,
            repos,
            paths,
            bootstrap: BootstrapThresholds {
                changed: self.bootstrap_changed_threshold as u64,
                files: self.bootstrap_files_threshold as u64,
                addition_ratio: self.bootstrap_addition_ratio,
            },
            outliers: OutlierLimits {
                changed_multiplier: self.bootstrap_outlier_changed_multiplier as u64,
                files_multiplier: self.bootstrap_outlier_files_multiplier as u64,
            },
            bootstrap_exclude_shas: normalized(&self.bootstrap_exclude_shas, normalize_sha),
            exclude_commits: normalized(&self.exclude_commits, normalize_sha),
            include_merges: self.include_merges,
            top_commits: self.top_commits,
        })
    }
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub identity: IdentityRules,
    pub repos: RepoRules,
    pub paths: PathRules,
    pub bootstrap: BootstrapThresholds,
    pub outliers: OutlierLimits,
    pub bootstrap_exclude_shas: BTreeSet<String>,
    pub exclude_commits: BTreeSet<String>,
    pub include_merges: bool,
    pub top_commits: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IdentityRules {
    pub emails: BTreeSet<String>,
    pub names: BTreeSet<String>,
    pub email_globs: Vec<Pattern>,
    pub name_globs: Vec<Pattern>,
    pub github_usernames: BTreeSet<String>,
}

impl IdentityRules {
    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.names.is_empty()
            && self.email_globs.is_empty()
            && self.name_globs.is_empty()
            && self.github_usernames.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFilterMode {
    /// Any configured remote may match the allowed prefixes.
    Any,
    /// The selected remote itself must match.
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeMode {
    Remote,
    Path,
}

#[derive(Debug, Clone)]
pub struct RepoRules {
    pub exclude_dirnames: BTreeSet<String>,
    pub include_remote_prefixes: Vec<String>,
    pub remote_name_priority: Vec<String>,
    pub remote_filter_mode: RemoteFilterMode,
    pub exclude_forks: bool,
    pub fork_remote_names: Vec<String>,
    pub excluded_repos: Vec<Pattern>,
    pub dedupe: DedupeMode,
}

/// Paths excluded from line and language totals.
#[derive(Debug, Clone, Default)]
pub struct PathRules {
    pub prefixes: Vec<String>,
    pub globs: Vec<Pattern>,
}

impl PathRules {
    pub fn excludes(&self, path: &str) -> bool {
        let p = normalize_rel_path(path);
        if self
            .prefixes
            .iter()
            .any(|prefix| p.starts_with(prefix.as_str()) || p.contains(&format!("/{prefix}")))
        {
            return true;
        }
        self.globs.iter().any(|g| g.matches(&p))
    }
}

fn normalize_rel_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .trim_start_matches(|c| c == '.' || c == '/')
        .to_string()
}

fn normalize_sha(sha: &str) -> String {
    sha.trim().to_ascii_lowercase()
}

fn normalized(values: &[String], f: fn(&str) -> String) -> BTreeSet<String> {
    values.iter().map(|v| f(v)).filter(|v| !v.is_empty()).collect()
}

fn normalized_vec(values: &[String], f: fn(&str) -> String) -> Vec<String> {
    values.iter().map(|v| f(v)).filter(|v| !v.is_empty()).collect()
}

fn compile_globs(patterns: &[String], key: &str) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .filter(|p| !p.trim().is_empty())
        .map(|p| {
            Pattern::new(p.trim())
                .map_err(|e| GtallyError::config(format!("{key}: invalid glob '{p}': {e}")))
        })
        .collect()
}

fn git_global_config(key: &str) -> Option<String> {
    let output = Command::new("git")
        .args(["config", "--global", "--get", key])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

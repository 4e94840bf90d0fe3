use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const SCHEMA_VERSION: u32 = 1;

/// One selected repository. Immutable once discovery hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoDescriptor {
    pub path: PathBuf,
    pub remote_name: Option<String>,
    pub remote_url: Option<String>,
    pub canonical_remote: Option<String>,
    /// sha256 of the canonical remote, or of the absolute path for local-only repos.
    pub dedupe_key: String,
    pub is_fork: bool,
    pub fork_parent: Option<String>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub duplicates: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStatus {
    Included,
    Duplicate,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    Selected,
    KeptClone { kept: PathBuf },
    NotARepository { error: String },
    RemoteUnreadable { error: String },
    ExcludedPath { pattern: String },
    ExcludedFork { parent: String },
    RemoteFilterNoMatch,
    PrimaryRemoteNotIncluded,
}

/// Per-candidate selection decision, for selection-debug reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionRow {
    pub candidate_path: PathBuf,
    pub status: SelectionStatus,
    pub reason: SelectionReason,
    pub dedupe_key: Option<String>,
    pub remote_name: Option<String>,
    pub canonical_remote: Option<String>,
    pub remotes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub insertions: u64,
    pub deletions: u64,
    pub binary: bool,
    pub language: &'static str,
}

impl FileDiff {
    pub fn changed(&self) -> u64 {
        self.insertions + self.deletions
    }
}

/// Lines dropped by path exclusion rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExcludedLines {
    pub files: u64,
    pub insertions: u64,
    pub deletions: u64,
}

impl ExcludedLines {
    pub fn add(&mut self, other: &ExcludedLines) {
        self.files += other.files;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    pub parent_count: usize,
    pub subject: String,
    pub files: Vec<FileDiff>,
    pub excluded: ExcludedLines,
    /// Stat lines that were not valid numstat output.
    pub malformed_stats: Vec<String>,
}

impl CommitRecord {
    pub fn insertions(&self) -> u64 {
        self.files.iter().map(|f| f.insertions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.files.iter().map(|f| f.deletions).sum()
    }

    pub fn changed(&self) -> u64 {
        self.insertions() + self.deletions()
    }

    pub fn files_touched(&self) -> u64 {
        self.files.len() as u64
    }

    pub fn is_merge(&self) -> bool {
        self.parent_count > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationLabel {
    Normal,
    Bootstrap,
    ForcedExcluded,
}

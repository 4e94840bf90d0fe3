use super::bucket::{Breakdown, LineTotals, Split, WeeklyBucket};
use crate::classify::{BootstrapRule, Classification};
use crate::model::{ClassificationLabel, CommitRecord, ExcludedLines, RepoDescriptor};
use crate::period::Period;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-period headline numbers, summed from that period's weekly buckets.
/// `me` is the bootstrap-excluding "me" scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearTotals {
    pub me: LineTotals,
    pub others: LineTotals,
    pub me_bootstrap: LineTotals,
    pub others_bootstrap: LineTotals,
    pub repos_total: usize,
    /// Repositories with any normal commit in the period.
    pub repos_with_commits: usize,
    /// Repositories with a normal "me" commit in the period.
    pub repos_active: usize,
    pub repos_new: usize,
    pub repos_new_by_me: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekReport {
    #[serde(flatten)]
    pub bucket: WeeklyBucket,
    pub repo_activity_top1_share_changed: f64,
    pub repo_activity_top3_share_changed: f64,
}

impl WeekReport {
    pub fn new(bucket: WeeklyBucket) -> Self {
        Self {
            repo_activity_top1_share_changed: bucket.top_share(1),
            repo_activity_top3_share_changed: bucket.top_share(3),
            bucket,
        }
    }
}

/// Totals for one author, keyed by normalized email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorTotals {
    pub email: String,
    pub name: String,
    pub is_me: bool,
    pub totals: Split,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: Period,
    pub totals: YearTotals,
    pub weeks: Vec<WeekReport>,
    pub authors: Vec<AuthorTotals>,
    pub languages: BTreeMap<String, Breakdown>,
    /// Keyed by top-level directory.
    pub directories: BTreeMap<String, Breakdown>,
    /// "me" commits keyed by UTC month (`YYYY-MM`).
    pub me_monthly: BTreeMap<String, Split>,
    /// Every bootstrap commit of the period, oldest first.
    pub bootstrap_commits: Vec<TopCommit>,
    pub excluded: ExcludedLines,
}

/// One commit as listed in reports: the largest commits of a run and the
/// bootstrap commits of a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCommit {
    pub repo: PathBuf,
    pub repo_key: String,
    pub sha: String,
    pub authored_at: DateTime<Utc>,
    pub author_name: String,
    pub author_email: String,
    pub is_me: bool,
    pub label: ClassificationLabel,
    pub rule: Option<BootstrapRule>,
    pub subject: String,
    pub files_touched: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub changed: u64,
}

impl TopCommit {
    pub fn new(repo: &RepoDescriptor, commit: &CommitRecord, classification: Classification, is_me: bool) -> Self {
        Self {
            repo: repo.path.clone(),
            repo_key: repo.dedupe_key.clone(),
            sha: commit.sha.clone(),
            authored_at: commit.authored_at,
            author_name: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            is_me,
            label: classification.label(),
            rule: classification.rule(),
            subject: commit.subject.clone(),
            files_touched: commit.files_touched(),
            insertions: commit.insertions(),
            deletions: commit.deletions(),
            changed: commit.changed(),
        }
    }
}

/// Largest first; repository path and sha break ties.
pub(crate) fn rank_top_commits(commits: &mut Vec<TopCommit>, limit: usize) {
    commits.sort_by(|a, b| {
        b.changed
            .cmp(&a.changed)
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.sha.cmp(&b.sha))
    });
    commits.dedup_by(|a, b| a.repo_key == b.repo_key && a.sha == b.sha);
    commits.truncate(limit);
}

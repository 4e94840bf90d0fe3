use crate::model::CommitRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Commit and line counters. All fields only ever grow by addition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineTotals {
    pub commits: u64,
    pub insertions: u64,
    pub deletions: u64,
    pub changed: u64,
}

impl LineTotals {
    pub fn add_lines(&mut self, insertions: u64, deletions: u64) {
        self.commits += 1;
        self.insertions += insertions;
        self.deletions += deletions;
        self.changed += insertions + deletions;
    }

    pub fn add_commit(&mut self, commit: &CommitRecord) {
        self.add_lines(commit.insertions(), commit.deletions());
    }

    pub fn merge(&mut self, other: &LineTotals) {
        self.commits += other.commits;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
        self.changed += other.changed;
    }
}

/// Normal and bootstrap counters side by side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Split {
    pub normal: LineTotals,
    pub bootstrap: LineTotals,
}

impl Split {
    pub fn side(&mut self, bootstrap: bool) -> &mut LineTotals {
        if bootstrap {
            &mut self.bootstrap
        } else {
            &mut self.normal
        }
    }

    pub fn merge(&mut self, other: &Split) {
        self.normal.merge(&other.normal);
        self.bootstrap.merge(&other.bootstrap);
    }
}

/// "me" versus everyone else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Breakdown {
    pub me: Split,
    pub others: Split,
}

impl Breakdown {
    pub fn scope(&mut self, is_me: bool) -> &mut Split {
        if is_me {
            &mut self.me
        } else {
            &mut self.others
        }
    }

    pub fn merge(&mut self, other: &Breakdown) {
        self.me.merge(&other.me);
        self.others.merge(&other.others);
    }
}

/// One Monday-anchored week of one period.
///
/// `repos_changed` holds "me" normal changed lines per repository key, so its
/// values always sum to `totals.me.normal.changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyBucket {
    pub week_start: DateTime<Utc>,
    pub totals: Breakdown,
    pub languages_me: BTreeMap<String, u64>,
    pub languages_others: BTreeMap<String, u64>,
    pub repos_changed: BTreeMap<String, u64>,
    pub repos_active: BTreeSet<String>,
    pub repos_new: BTreeSet<String>,
}

impl WeeklyBucket {
    pub fn new(week_start: DateTime<Utc>) -> Self {
        Self {
            week_start,
            totals: Breakdown::default(),
            languages_me: BTreeMap::new(),
            languages_others: BTreeMap::new(),
            repos_changed: BTreeMap::new(),
            repos_active: BTreeSet::new(),
            repos_new: BTreeSet::new(),
        }
    }

    pub fn fold(&mut self, repo_key: &str, commit: &CommitRecord, bootstrap: bool, is_me: bool) {
        self.totals.scope(is_me).side(bootstrap).add_commit(commit);
        if bootstrap {
            return;
        }

        let languages = if is_me {
            &mut self.languages_me
        } else {
            &mut self.languages_others
        };
        for file in &commit.files {
            *languages.entry(file.language.to_string()).or_default() += file.changed();
        }

        if is_me {
            *self.repos_changed.entry(repo_key.to_string()).or_default() += commit.changed();
            self.repos_active.insert(repo_key.to_string());
        }
    }

    pub fn merge(&mut self, other: &WeeklyBucket) {
        self.totals.merge(&other.totals);
        merge_counts(&mut self.languages_me, &other.languages_me);
        merge_counts(&mut self.languages_others, &other.languages_others);
        merge_counts(&mut self.repos_changed, &other.repos_changed);
        self.repos_active.extend(other.repos_active.iter().cloned());
        self.repos_new.extend(other.repos_new.iter().cloned());
    }

    /// Share of this week's "me" normal churn held by the `n` most active
    /// repositories. `0.0` for a week without churn.
    pub fn top_share(&self, n: usize) -> f64 {
        let total = self.totals.me.normal.changed;
        if total == 0 {
            return 0.0;
        }
        let mut per_repo: Vec<u64> = self.repos_changed.values().copied().collect();
        per_repo.sort_unstable_by(|a, b| b.cmp(a));
        let top: u64 = per_repo.into_iter().take(n).sum();
        (top as f64 / total as f64).clamp(0.0, 1.0)
    }
}

pub(crate) fn merge_counts(dst: &mut BTreeMap<String, u64>, src: &BTreeMap<String, u64>) {
    for (key, value) in src {
        *dst.entry(key.clone()).or_default() += value;
    }
}

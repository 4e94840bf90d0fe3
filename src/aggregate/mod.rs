//! Folding of classified commits into weekly buckets and period totals.
//!
//! Every fold step is a sum or a set union keyed by week start, month,
//! repository key, language, directory or author, so the result of [`Aggregator::merge`] does not
//! depend on the order in which per-repository results arrive.

pub mod bucket;
pub mod report;

pub use bucket::{Breakdown, LineTotals, Split, WeeklyBucket};
pub use report::{AuthorTotals, PeriodReport, TopCommit, WeekReport, YearTotals};

use crate::classify::Classification;
use crate::identity::{normalize_email, normalize_name};
use crate::history::directory_key;
use crate::model::{ClassificationLabel, CommitRecord, ExcludedLines, FileDiff, RepoDescriptor};
use crate::period::{week_start, Period};
use chrono::{DateTime, Utc};
use report::rank_top_commits;
use std::collections::{BTreeMap, BTreeSet};

/// The earliest commit of a repository over its whole history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstCommit {
    pub authored_at: DateTime<Utc>,
    pub is_me: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PeriodAccumulator {
    weeks: BTreeMap<DateTime<Utc>, WeeklyBucket>,
    authors: BTreeMap<String, AuthorTotals>,
    languages: BTreeMap<String, Breakdown>,
    directories: BTreeMap<String, Breakdown>,
    me_monthly: BTreeMap<String, Split>,
    bootstrap_commits: Vec<TopCommit>,
    excluded: ExcludedLines,
    repos_with_commits: BTreeSet<String>,
    new_by_me: BTreeSet<String>,
}

impl PeriodAccumulator {
    fn week(&mut self, at: &DateTime<Utc>) -> &mut WeeklyBucket {
        let start = week_start(at);
        self.weeks.entry(start).or_insert_with(|| WeeklyBucket::new(start))
    }

    fn fold(&mut self, repo_key: &str, commit: &CommitRecord, row: &TopCommit) {
        let bootstrap = row.label == ClassificationLabel::Bootstrap;
        let is_me = row.is_me;
        self.week(&commit.authored_at).fold(repo_key, commit, bootstrap, is_me);
        self.excluded.add(&commit.excluded);
        if bootstrap {
            self.bootstrap_commits.push(row.clone());
        } else {
            self.repos_with_commits.insert(repo_key.to_string());
        }
        if is_me {
            let month = commit.authored_at.format("%Y-%m").to_string();
            self.me_monthly.entry(month).or_default().side(bootstrap).add_commit(commit);
        }

        fold_keyed(&mut self.languages, commit, |f| f.language, bootstrap, is_me);
        fold_keyed(&mut self.directories, commit, |f| directory_key(&f.path), bootstrap, is_me);

        let email = normalize_email(&commit.author_email);
        let key = if email.is_empty() {
            normalize_name(&commit.author_name)
        } else {
            email.clone()
        };
        let author = self.authors.entry(key).or_insert_with(|| AuthorTotals {
            email,
            name: String::new(),
            is_me: false,
            totals: Split::default(),
        });
        absorb_author(author, commit.author_name.trim(), is_me, &Split::default());
        author.totals.side(bootstrap).add_commit(commit);
    }

    fn merge(&mut self, other: PeriodAccumulator) {
        for (start, bucket) in other.weeks {
            match self.weeks.get_mut(&start) {
                Some(existing) => existing.merge(&bucket),
                None => {
                    self.weeks.insert(start, bucket);
                }
            }
        }
        for (key, author) in other.authors {
            match self.authors.get_mut(&key) {
                Some(existing) => absorb_author(existing, &author.name, author.is_me, &author.totals),
                None => {
                    self.authors.insert(key, author);
                }
            }
        }
        for (language, breakdown) in other.languages {
            self.languages.entry(language).or_default().merge(&breakdown);
        }
        for (dir, breakdown) in other.directories {
            self.directories.entry(dir).or_default().merge(&breakdown);
        }
        for (month, split) in other.me_monthly {
            self.me_monthly.entry(month).or_default().merge(&split);
        }
        self.bootstrap_commits.extend(other.bootstrap_commits);
        self.excluded.add(&other.excluded);
        self.repos_with_commits.extend(other.repos_with_commits);
        self.new_by_me.extend(other.new_by_me);
    }

    fn report(&self, period: &Period, repos_total: usize) -> PeriodReport {
        let mut totals = YearTotals {
            repos_total,
            repos_with_commits: self.repos_with_commits.len(),
            repos_new_by_me: self.new_by_me.len(),
            ..YearTotals::default()
        };
        let mut active = BTreeSet::new();
        let mut new = BTreeSet::new();
        for bucket in self.weeks.values() {
            totals.me.merge(&bucket.totals.me.normal);
            totals.others.merge(&bucket.totals.others.normal);
            totals.me_bootstrap.merge(&bucket.totals.me.bootstrap);
            totals.others_bootstrap.merge(&bucket.totals.others.bootstrap);
            active.extend(bucket.repos_active.iter());
            new.extend(bucket.repos_new.iter());
        }
        totals.repos_active = active.len();
        totals.repos_new = new.len();

        let mut authors: Vec<AuthorTotals> = self.authors.values().cloned().collect();
        authors.sort_by(|a, b| {
            b.totals
                .normal
                .changed
                .cmp(&a.totals.normal.changed)
                .then_with(|| a.email.cmp(&b.email))
        });

        let mut bootstrap_commits = self.bootstrap_commits.clone();
        bootstrap_commits.sort_by(|a, b| {
            a.authored_at
                .cmp(&b.authored_at)
                .then_with(|| a.repo.cmp(&b.repo))
                .then_with(|| a.sha.cmp(&b.sha))
        });

        PeriodReport {
            period: period.clone(),
            totals,
            weeks: self.weeks.values().cloned().map(WeekReport::new).collect(),
            authors,
            languages: self.languages.clone(),
            directories: self.directories.clone(),
            me_monthly: self.me_monthly.clone(),
            bootstrap_commits,
            excluded: self.excluded,
        }
    }
}

/// Sums each commit's lines per key, so a commit counts once for every key
/// it touches.
fn fold_keyed<'a>(
    target: &mut BTreeMap<String, Breakdown>,
    commit: &'a CommitRecord,
    key: impl Fn(&'a FileDiff) -> &'a str,
    bootstrap: bool,
    is_me: bool,
) {
    let mut per_key: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for file in &commit.files {
        let entry = per_key.entry(key(file)).or_default();
        entry.0 += file.insertions;
        entry.1 += file.deletions;
    }
    for (k, (insertions, deletions)) in per_key {
        target
            .entry(k.to_string())
            .or_default()
            .scope(is_me)
            .side(bootstrap)
            .add_lines(insertions, deletions);
    }
}

/// Order-independent author merge: the smallest non-empty display name wins
/// and `is_me` is sticky.
fn absorb_author(author: &mut AuthorTotals, name: &str, is_me: bool, totals: &Split) {
    if !name.is_empty() && (author.name.is_empty() || name < author.name.as_str()) {
        author.name = name.to_string();
    }
    author.is_me |= is_me;
    author.totals.merge(totals);
}

/// Read-only result of an aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub periods: Vec<PeriodReport>,
    pub top_commits: Vec<TopCommit>,
}

/// Owns all buckets and totals of a run. Workers fill their own instance for
/// one repository; the coordinator merges them into one.
#[derive(Debug, Clone)]
pub struct Aggregator {
    periods: Vec<Period>,
    accumulators: Vec<PeriodAccumulator>,
    repos: BTreeSet<String>,
    top_commits: Vec<TopCommit>,
    top_limit: usize,
}

impl Aggregator {
    pub fn new(periods: Vec<Period>, top_limit: usize) -> Self {
        Self {
            accumulators: vec![PeriodAccumulator::default(); periods.len()],
            periods,
            repos: BTreeSet::new(),
            top_commits: Vec::new(),
            top_limit,
        }
    }

    /// An empty aggregator over the same periods.
    pub fn fresh(&self) -> Self {
        Self::new(self.periods.clone(), self.top_limit)
    }

    /// Adds one classified commit to every period containing its authored time.
    /// Forced-excluded commits contribute nothing.
    pub fn fold_commit(
        &mut self,
        repo: &RepoDescriptor,
        commit: &CommitRecord,
        classification: Classification,
        is_me: bool,
    ) {
        if classification == Classification::ForcedExcluded {
            return;
        }
        let row = TopCommit::new(repo, commit, classification, is_me);

        let mut in_any = false;
        for (period, acc) in self.periods.iter().zip(self.accumulators.iter_mut()) {
            if period.contains(&commit.authored_at) {
                acc.fold(&repo.dedupe_key, commit, &row);
                in_any = true;
            }
        }
        if !in_any || self.top_limit == 0 {
            return;
        }

        self.top_commits.push(row);
        if self.top_commits.len() >= self.top_limit.saturating_mul(2) {
            rank_top_commits(&mut self.top_commits, self.top_limit);
        }
    }

    /// Registers a selected repository. Its earliest commit marks it as new in
    /// the week holding that commit, if a period contains it.
    pub fn mark_repo(&mut self, repo_key: &str, first: Option<FirstCommit>) {
        self.repos.insert(repo_key.to_string());
        let Some(first) = first else {
            return;
        };
        for (period, acc) in self.periods.iter().zip(self.accumulators.iter_mut()) {
            if period.contains(&first.authored_at) {
                acc.week(&first.authored_at).repos_new.insert(repo_key.to_string());
                if first.is_me {
                    acc.new_by_me.insert(repo_key.to_string());
                }
            }
        }
    }

    pub fn merge(&mut self, other: Aggregator) {
        debug_assert_eq!(self.periods, other.periods);
        for (acc, theirs) in self.accumulators.iter_mut().zip(other.accumulators) {
            acc.merge(theirs);
        }
        self.repos.extend(other.repos);
        self.top_commits.extend(other.top_commits);
        rank_top_commits(&mut self.top_commits, self.top_limit);
    }

    pub fn snapshot(&self) -> Snapshot {
        let periods = self
            .periods
            .iter()
            .zip(&self.accumulators)
            .map(|(period, acc)| acc.report(period, self.repos.len()))
            .collect();
        let mut top_commits = self.top_commits.clone();
        rank_top_commits(&mut top_commits, self.top_limit);
        Snapshot {
            periods,
            top_commits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::BootstrapRule;
    use crate::git::dedupe_key;
    use crate::model::{ClassificationLabel, FileDiff};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn repo(name: &str) -> RepoDescriptor {
        RepoDescriptor {
            path: PathBuf::from(format!("/w/{name}")),
            remote_name: None,
            remote_url: None,
            canonical_remote: None,
            dedupe_key: dedupe_key(name),
            is_fork: false,
            fork_parent: None,
            last_commit_at: None,
            duplicates: Vec::new(),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn commit(sha: &str, when: DateTime<Utc>, files: &[(&str, u64, u64)]) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            author_name: "Me".to_string(),
            author_email: "me@example.com".to_string(),
            authored_at: when,
            parent_count: 1,
            subject: format!("commit {sha}"),
            files: files
                .iter()
                .map(|(path, ins, del)| FileDiff {
                    path: path.to_string(),
                    insertions: *ins,
                    deletions: *del,
                    binary: false,
                    language: crate::history::language_for_path(path),
                })
                .collect(),
            excluded: ExcludedLines::default(),
            malformed_stats: Vec::new(),
        }
    }

    fn year(y: i32) -> Vec<Period> {
        vec![Period::year(y).unwrap()]
    }

    #[test]
    fn bootstrap_commit_does_not_dilute_weekly_share() {
        let (a, b) = (repo("a"), repo("b"));
        let mut agg = Aggregator::new(year(2025), 10);
        agg.fold_commit(&a, &commit("a1", at(2025, 3, 4), &[("src/a.rs", 100, 0)]), Classification::Normal, true);
        let files: Vec<(String, u64, u64)> = (0..250).map(|i| (format!("gen/f{i}.rs"), 240, 4)).collect();
        let files: Vec<(&str, u64, u64)> = files.iter().map(|(p, i, d)| (p.as_str(), *i, *d)).collect();
        agg.fold_commit(
            &b,
            &commit("b1", at(2025, 3, 5), &files),
            Classification::Bootstrap(BootstrapRule::Shape),
            true,
        );

        let snap = agg.snapshot();
        let report = &snap.periods[0];
        assert_eq!(report.weeks.len(), 1);
        let week = &report.weeks[0];
        assert_eq!(week.bucket.week_start, Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap());
        assert_eq!(week.bucket.totals.me.normal.changed, 100);
        assert_eq!(week.bucket.totals.me.bootstrap.changed, 61_000);
        assert_eq!(week.repo_activity_top1_share_changed, 1.0);
        assert_eq!(report.totals.me.changed, 100);
        assert_eq!(report.totals.me_bootstrap.commits, 1);
        assert_eq!(week.bucket.repos_active.len(), 1);

        assert_eq!(snap.top_commits[0].sha, "b1");
        assert_eq!(snap.top_commits[0].label, ClassificationLabel::Bootstrap);
        assert_eq!(snap.top_commits[0].rule, Some(BootstrapRule::Shape));
    }

    #[test]
    fn empty_commit_counts_without_changing_lines() {
        let mut agg = Aggregator::new(year(2025), 10);
        agg.fold_commit(&repo("a"), &commit("e1", at(2025, 6, 1), &[]), Classification::Normal, true);
        let totals = &agg.snapshot().periods[0].totals;
        assert_eq!(totals.me.commits, 1);
        assert_eq!(totals.me.changed, 0);
        assert_eq!(agg.snapshot().periods[0].weeks[0].repo_activity_top1_share_changed, 0.0);
    }

    #[test]
    fn forced_excluded_commits_leave_no_trace() {
        let mut agg = Aggregator::new(year(2025), 10);
        agg.fold_commit(
            &repo("a"),
            &commit("x1", at(2025, 6, 1), &[("a.rs", 5, 5)]),
            Classification::ForcedExcluded,
            true,
        );
        let snap = agg.snapshot();
        assert!(snap.periods[0].weeks.is_empty());
        assert!(snap.periods[0].authors.is_empty());
        assert!(snap.top_commits.is_empty());
    }

    #[test]
    fn period_boundaries_are_half_open() {
        let period = Period::year(2025).unwrap();
        let mut agg = Aggregator::new(vec![period.clone()], 10);
        let r = repo("a");
        agg.fold_commit(&r, &commit("s", period.start, &[("a.rs", 1, 0)]), Classification::Normal, true);
        agg.fold_commit(&r, &commit("e", period.end, &[("a.rs", 7, 0)]), Classification::Normal, true);
        let snap = agg.snapshot();
        assert_eq!(snap.periods[0].totals.me.commits, 1);
        assert_eq!(snap.periods[0].totals.me.insertions, 1);
        assert_eq!(snap.top_commits.len(), 1);
    }

    #[test]
    fn repos_new_only_counts_first_commit_in_history() {
        let mut agg = Aggregator::new(year(2025), 10);
        let old = repo("old");
        agg.mark_repo(
            &old.dedupe_key,
            Some(FirstCommit {
                authored_at: at(2023, 5, 1),
                is_me: true,
            }),
        );
        agg.fold_commit(&old, &commit("o1", at(2025, 2, 3), &[("a.rs", 3, 0)]), Classification::Normal, true);

        let fresh = repo("fresh");
        agg.mark_repo(
            &fresh.dedupe_key,
            Some(FirstCommit {
                authored_at: at(2025, 8, 20),
                is_me: false,
            }),
        );
        agg.mark_repo(&repo("empty").dedupe_key, None);

        let totals = &agg.snapshot().periods[0].totals;
        assert_eq!(totals.repos_total, 3);
        assert_eq!(totals.repos_new, 1);
        assert_eq!(totals.repos_new_by_me, 0);
        assert_eq!(totals.repos_active, 1);
    }

    #[test]
    fn concentration_shares_are_bounded_and_ordered() {
        let mut agg = Aggregator::new(year(2025), 10);
        for (i, lines) in [40u64, 30, 20, 10].iter().enumerate() {
            let r = repo(&format!("r{i}"));
            agg.fold_commit(&r, &commit(&format!("c{i}"), at(2025, 4, 8), &[("x.py", *lines, 0)]), Classification::Normal, true);
        }
        let snap = agg.snapshot();
        let week = &snap.periods[0].weeks[0];
        assert_eq!(week.repo_activity_top1_share_changed, 0.4);
        assert_eq!(week.repo_activity_top3_share_changed, 0.9);
        assert!(week.repo_activity_top3_share_changed >= week.repo_activity_top1_share_changed);
        let sum: u64 = week.bucket.repos_changed.values().sum();
        assert_eq!(sum, week.bucket.totals.me.normal.changed);
    }

    #[test]
    fn period_lists_every_bootstrap_commit_and_splits_by_directory_and_month() {
        let mut agg = Aggregator::new(year(2025), 1);
        let r = repo("a");
        agg.fold_commit(&r, &commit("n1", at(2025, 1, 20), &[("src/a.rs", 9000, 0)]), Classification::Normal, true);
        for (sha, month) in [("b2", 3), ("b1", 2)] {
            agg.fold_commit(
                &r,
                &commit(sha, at(2025, month, 4), &[("vendor/x.js", 500, 0), ("README.md", 5, 0)]),
                Classification::Bootstrap(BootstrapRule::Shape),
                true,
            );
        }
        let mut theirs = commit("o1", at(2025, 2, 5), &[("src/b.rs", 7, 3)]);
        theirs.author_email = "other@example.com".to_string();
        agg.fold_commit(&r, &theirs, Classification::Normal, false);

        let snap = agg.snapshot();
        assert_eq!(snap.top_commits.len(), 1);
        let report = &snap.periods[0];
        let shas: Vec<&str> = report.bootstrap_commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["b1", "b2"]);

        let src = &report.directories["src"];
        assert_eq!(src.me.normal.changed, 9000);
        assert_eq!(src.others.normal, LineTotals { commits: 1, insertions: 7, deletions: 3, changed: 10 });
        assert_eq!(report.directories["vendor"].me.bootstrap.commits, 2);
        assert_eq!(report.directories[crate::history::ROOT_DIRECTORY].me.bootstrap.insertions, 10);

        let months: Vec<&str> = report.me_monthly.keys().map(String::as_str).collect();
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(report.me_monthly["2025-01"].normal.changed, 9000);
        assert_eq!(report.me_monthly["2025-02"].normal.commits, 0);
        assert_eq!(report.me_monthly["2025-02"].bootstrap.changed, 505);
    }

    #[test]
    fn merge_order_does_not_change_output() {
        let periods = vec![Period::year(2024).unwrap(), Period::parse("2025H1").unwrap()];
        let parts: Vec<Aggregator> = (0..4)
            .map(|i| {
                let r = repo(&format!("r{i}"));
                let mut part = Aggregator::new(periods.clone(), 3);
                for j in 0..5u64 {
                    let mut c = commit(&format!("{i}{j}"), at(2024 + (j % 2) as i32, 1 + j as u32, 10), &[("lib.rs", j * 10 + i, j)]);
                    c.author_name = format!("Dev {i}");
                    c.author_email = if j % 2 == 0 { "me@example.com".into() } else { format!("dev{i}@example.com") };
                    part.fold_commit(&r, &c, Classification::Normal, j % 2 == 0);
                }
                part.mark_repo(&r.dedupe_key, Some(FirstCommit { authored_at: at(2024, 1, 10), is_me: i == 0 }));
                part
            })
            .collect();

        let mut forward = Aggregator::new(periods.clone(), 3);
        for part in parts.iter().cloned() {
            forward.merge(part);
        }
        let mut backward = Aggregator::new(periods, 3);
        for part in parts.into_iter().rev() {
            backward.merge(part);
        }

        let a = serde_json::to_string(&forward.snapshot().periods).unwrap();
        let b = serde_json::to_string(&backward.snapshot().periods).unwrap();
        assert_eq!(a, b);
        assert_eq!(forward.snapshot().top_commits, backward.snapshot().top_commits);
        assert_eq!(forward.snapshot().top_commits.len(), 3);
        // Shared author name resolves to the smallest one seen.
        let me = &forward.snapshot().periods[0].authors.iter().find(|a| a.email == "me@example.com").cloned().unwrap();
        assert_eq!(me.name, "Dev 0");
        assert!(me.is_me);
    }
}

use crate::aggregate::{Aggregator, FirstCommit, PeriodReport, TopCommit};
use crate::classify::Classifier;
use crate::config::Settings;
use crate::error::{Failure, FailureKind, GtallyError, Result};
use crate::git::{Locator, Selection};
use crate::history::{parse_commit, HistoryExtractor, RawCommit};
use crate::identity::MeMatcher;
use crate::model::{RepoDescriptor, SelectionRow, SCHEMA_VERSION};
use crate::period::{Period, Window};
use chrono::{DateTime, Utc};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a scan produces: selection diagnostics, per-period aggregates,
/// the largest commits and every recovered failure.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub root: PathBuf,
    pub candidates: usize,
    pub selection: Vec<SelectionRow>,
    pub repos: Vec<RepoDescriptor>,
    pub periods: Vec<PeriodReport>,
    pub top_commits: Vec<TopCommit>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub periods: Vec<Period>,
    /// Worker count; `0` lets the pool pick one per core.
    pub jobs: usize,
    pub progress: bool,
}

/// `jobs == 0` lets rayon pick one thread per core.
fn worker_pool(jobs: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| GtallyError::config(format!("cannot build worker pool: {e}")))
}

struct RepoOutcome {
    aggregator: Aggregator,
    failures: Vec<Failure>,
}

/// Runs one extract, parse, classify pipeline per repository on a bounded
/// pool and merges the per-repository aggregates.
pub struct Coordinator {
    settings: Settings,
    matcher: MeMatcher,
    classifier: Classifier,
    extractor: HistoryExtractor,
}

impl Coordinator {
    pub fn new(settings: Settings) -> Self {
        let matcher = MeMatcher::new(settings.identity.clone());
        if matcher.is_empty() {
            warn!("no identity configured; every commit is attributed to others");
        }
        Self {
            classifier: Classifier::new(&settings),
            matcher,
            settings,
            extractor: HistoryExtractor::new(),
        }
    }

    pub fn locate(&self, root: &Path) -> Selection {
        Locator::new(self.settings.repos.clone()).locate(root)
    }

    pub fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let window = Window::covering(&options.periods)
            .ok_or_else(|| GtallyError::config("at least one period is required"))?;
        let pool = worker_pool(options.jobs)?;

        // Probing and extraction both run on the bounded pool.
        let selection = pool.install(|| self.locate(&options.root));
        let template = Aggregator::new(options.periods.clone(), self.settings.top_commits);

        let bar = if options.progress {
            let bar = ProgressBar::new(selection.repos.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} repositories")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Vec<RepoOutcome> = pool.install(|| {
            selection
                .repos
                .par_iter()
                .progress_with(bar.clone())
                .map(|repo| self.process_repo(repo, &template, window))
                .collect()
        });
        bar.finish_and_clear();

        // Single writer: each repository's result is merged whole.
        let mut aggregator = template;
        let mut failures = selection.failures;
        for outcome in outcomes {
            aggregator.merge(outcome.aggregator);
            failures.extend(outcome.failures);
        }
        failures.sort();

        let snapshot = aggregator.snapshot();
        info!(
            repos = selection.repos.len(),
            failures = failures.len(),
            "scan complete"
        );

        Ok(RunReport {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now(),
            root: options.root.clone(),
            candidates: selection.candidates,
            selection: selection.rows,
            repos: selection.repos,
            periods: snapshot.periods,
            top_commits: snapshot.top_commits,
            failures,
        })
    }

    /// A failing repository is registered with no commits at all.
    fn process_repo(&self, repo: &RepoDescriptor, template: &Aggregator, window: Window) -> RepoOutcome {
        let mut part = template.fresh();
        let mut failures = Vec::new();
        match self.scan_history(repo, &mut part, window, &mut failures) {
            Ok(first) => {
                part.mark_repo(&repo.dedupe_key, first);
                RepoOutcome {
                    aggregator: part,
                    failures,
                }
            }
            Err(e) => {
                warn!(repo = %repo.path.display(), error = %e, "repository skipped");
                let mut empty = template.fresh();
                empty.mark_repo(&repo.dedupe_key, None);
                failures.push(Failure::from_error(&repo.path, &e));
                RepoOutcome {
                    aggregator: empty,
                    failures,
                }
            }
        }
    }

    fn scan_history(
        &self,
        repo: &RepoDescriptor,
        part: &mut Aggregator,
        window: Window,
        failures: &mut Vec<Failure>,
    ) -> Result<Option<FirstCommit>> {
        let mut stream = self.extractor.stream(&repo.path)?;
        let first = self.fold_history(repo, &mut stream, part, window, failures)?;
        stream.finish()?;
        Ok(first)
    }

    /// Folds a stream of commit blocks into `part` and returns the
    /// repository's earliest commit. Merges are skipped unless configured, but
    /// still count for the earliest commit. Malformed stat lines are recorded
    /// as parse failures and their commit still counts; a block whose header
    /// cannot be parsed fails the whole repository.
    fn fold_history(
        &self,
        repo: &RepoDescriptor,
        blocks: impl Iterator<Item = io::Result<RawCommit>>,
        part: &mut Aggregator,
        window: Window,
        failures: &mut Vec<Failure>,
    ) -> Result<Option<FirstCommit>> {
        let mut earliest: Option<(DateTime<Utc>, String, bool)> = None;
        let mut folded = 0usize;

        for raw in blocks {
            let raw = raw.map_err(|e| GtallyError::extraction(&repo.path, format!("reading git output: {e}")))?;
            let commit = parse_commit(&raw, &self.settings.paths)
                .map_err(|e| GtallyError::extraction(&repo.path, format!("unparseable commit block: {e}")))?;
            if let Some(line) = commit.malformed_stats.first() {
                failures.push(Failure::new(
                    &repo.path,
                    FailureKind::Parse,
                    format!(
                        "{}: skipped {} malformed numstat line(s), first '{line}'",
                        commit.sha,
                        commit.malformed_stats.len()
                    ),
                ));
            }

            let is_earlier = earliest
                .as_ref()
                .map_or(true, |(at, sha, _)| (commit.authored_at, &commit.sha) < (*at, sha));
            let is_me = self.matcher.matches(&commit.author_name, &commit.author_email);
            if is_earlier {
                earliest = Some((commit.authored_at, commit.sha.clone(), is_me));
            }

            if commit.is_merge() && !self.settings.include_merges {
                continue;
            }
            if !window.contains(&commit.authored_at) {
                continue;
            }

            let classification = self.classifier.classify(&commit);
            part.fold_commit(repo, &commit, classification, is_me);
            folded += 1;
        }

        debug!(repo = %repo.path.display(), commits = folded, "history folded");
        Ok(earliest.map(|(authored_at, _, is_me)| FirstCommit { authored_at, is_me }))
    }
}

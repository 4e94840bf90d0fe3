use super::remote::{canonicalize_remote, detect_fork, remote_included, select_remote};
use super::repo::GitRepo;
use crate::config::{DedupeMode, RemoteFilterMode, RepoRules};
use crate::error::{Failure, FailureKind, GtallyError};
use crate::model::{RepoDescriptor, SelectionReason, SelectionRow, SelectionStatus};
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What probing a candidate directory found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Repository {
        remotes: BTreeMap<String, String>,
        last_commit_at: Option<DateTime<Utc>>,
    },
    NotARepository(String),
    RemoteUnreadable(String),
}

/// A directory holding a `.git` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub probe: Probe,
}

impl Candidate {
    pub fn inspect(dir: &Path) -> Self {
        let repo = match GitRepo::open(dir) {
            Ok(repo) => repo,
            Err(e) => {
                return Self {
                    path: dir.to_path_buf(),
                    probe: Probe::NotARepository(e.to_string()),
                }
            }
        };
        let path = repo.path().to_path_buf();

        let remotes = match repo.remote_urls() {
            Ok(remotes) => remotes,
            Err(e) => {
                return Self {
                    path,
                    probe: Probe::RemoteUnreadable(e.to_string()),
                }
            }
        };

        let last_commit_at = repo.last_commit_time().unwrap_or_else(|e| {
            debug!(repo = %path.display(), error = %e, "could not resolve last commit");
            None
        });

        Self {
            path,
            probe: Probe::Repository {
                remotes,
                last_commit_at,
            },
        }
    }
}

/// The filesystem entry a walk error refers to, when it carries one.
fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::Loop { child, .. } => Some(child),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => walk_error_path(err),
        ignore::Error::Partial(errs) => errs.iter().find_map(walk_error_path),
        _ => None,
    }
}

/// Outcome of discovery: the surviving repositories plus one row per candidate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Selection {
    pub candidates: usize,
    pub repos: Vec<RepoDescriptor>,
    pub rows: Vec<SelectionRow>,
    pub failures: Vec<Failure>,
}

/// Finds, filters and deduplicates repositories under a root directory.
pub struct Locator {
    rules: RepoRules,
}

impl Locator {
    pub fn new(rules: RepoRules) -> Self {
        Self { rules }
    }

    pub fn locate(&self, root: &Path) -> Selection {
        let (dirs, walk_failures) = self.walk(root);
        info!(root = %root.display(), candidates = dirs.len(), "discovery walk complete");

        let candidates: Vec<Candidate> = dirs.par_iter().map(|dir| Candidate::inspect(dir)).collect();
        let mut selection = self.select(candidates);
        selection.failures.extend(walk_failures);
        selection.failures.sort();
        info!(selected = selection.repos.len(), "repository selection complete");
        selection
    }

    /// Directories containing a `.git` entry, in path order. Nested
    /// repositories are found too; only `.git` itself and the configured
    /// directory names are pruned.
    fn walk(&self, root: &Path) -> (Vec<PathBuf>, Vec<Failure>) {
        let skip = self.rules.exclude_dirnames.clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                if !is_dir || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                name != ".git" && !skip.contains(&*name)
            })
            .build();

        let mut dirs = Vec::new();
        let mut failures = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|t| t.is_dir()) && entry.path().join(".git").exists() {
                        dirs.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = walk_error_path(&e).unwrap_or(root).to_path_buf();
                    warn!(path = %path.display(), error = %e, "skipping unreadable path during discovery");
                    let err = GtallyError::discovery(&path, e.to_string());
                    failures.push(Failure::from_error(&path, &err));
                }
            }
        }
        (dirs, failures)
    }

    /// Applies the inclusion rules and freshest-clone dedupe to probed
    /// candidates. The result depends only on the candidate set, not on
    /// its order.
    pub fn select(&self, mut candidates: Vec<Candidate>) -> Selection {
        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        candidates.dedup_by(|a, b| a.path == b.path);

        let mut selection = Selection {
            candidates: candidates.len(),
            ..Selection::default()
        };
        let mut by_key: BTreeMap<String, Vec<RepoDescriptor>> = BTreeMap::new();

        for candidate in candidates {
            let mut row = SelectionRow {
                candidate_path: candidate.path.clone(),
                status: SelectionStatus::Skipped,
                reason: SelectionReason::Selected,
                dedupe_key: None,
                remote_name: None,
                canonical_remote: None,
                remotes: BTreeMap::new(),
            };

            let (remotes, last_commit_at) = match candidate.probe {
                Probe::Repository {
                    remotes,
                    last_commit_at,
                } => (remotes, last_commit_at),
                Probe::NotARepository(error) => {
                    selection
                        .failures
                        .push(Failure::new(&candidate.path, FailureKind::Discovery, error.clone()));
                    row.reason = SelectionReason::NotARepository { error };
                    selection.rows.push(row);
                    continue;
                }
                Probe::RemoteUnreadable(error) => {
                    selection
                        .failures
                        .push(Failure::new(&candidate.path, FailureKind::Discovery, error.clone()));
                    row.reason = SelectionReason::RemoteUnreadable { error };
                    selection.rows.push(row);
                    continue;
                }
            };
            row.remotes = remotes
                .iter()
                .map(|(name, url)| (name.clone(), canonicalize_remote(url)))
                .collect();

            match self.admit(&candidate.path, &remotes, last_commit_at) {
                Ok(descriptor) => {
                    row.dedupe_key = Some(descriptor.dedupe_key.clone());
                    row.remote_name = descriptor.remote_name.clone();
                    row.canonical_remote = descriptor.canonical_remote.clone();
                    by_key
                        .entry(descriptor.dedupe_key.clone())
                        .or_default()
                        .push(descriptor);
                }
                Err(reason) => {
                    debug!(path = %candidate.path.display(), ?reason, "candidate skipped");
                    row.reason = reason;
                }
            }
            selection.rows.push(row);
        }

        let mut kept: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for (_, group) in by_key {
            let Some(mut winner) = freshest(&group).cloned() else {
                continue;
            };
            winner.duplicates = group
                .iter()
                .map(|d| d.path.clone())
                .filter(|p| *p != winner.path)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            for dup in &winner.duplicates {
                kept.insert(dup.clone(), winner.path.clone());
            }
            kept.insert(winner.path.clone(), winner.path.clone());
            selection.repos.push(winner);
        }

        for row in selection.rows.iter_mut().filter(|r| r.dedupe_key.is_some()) {
            match kept.get(&row.candidate_path) {
                Some(survivor) if *survivor == row.candidate_path => {
                    row.status = SelectionStatus::Included;
                    row.reason = SelectionReason::Selected;
                }
                Some(survivor) => {
                    row.status = SelectionStatus::Duplicate;
                    row.reason = SelectionReason::KeptClone {
                        kept: survivor.clone(),
                    };
                }
                None => {}
            }
        }

        selection.repos.sort_by(|a, b| a.path.cmp(&b.path));
        selection
    }

    /// Runs one repository through the path, fork and remote filters.
    fn admit(
        &self,
        path: &Path,
        remotes: &BTreeMap<String, String>,
        last_commit_at: Option<DateTime<Utc>>,
    ) -> Result<RepoDescriptor, SelectionReason> {
        let rules = &self.rules;
        let path_text = path.to_string_lossy();
        if let Some(pattern) = rules.excluded_repos.iter().find(|p| p.matches(&path_text)) {
            return Err(SelectionReason::ExcludedPath {
                pattern: pattern.as_str().to_string(),
            });
        }

        let fork_parent = detect_fork(remotes, &rules.fork_remote_names);
        if rules.exclude_forks {
            if let Some(parent) = fork_parent.clone() {
                return Err(SelectionReason::ExcludedFork { parent });
            }
        }

        let prefixes = &rules.include_remote_prefixes;
        if !prefixes.is_empty() && !remotes.values().any(|url| remote_included(url, prefixes)) {
            return Err(SelectionReason::RemoteFilterNoMatch);
        }

        let selected = select_remote(remotes, prefixes, &rules.remote_name_priority);
        if rules.remote_filter_mode == RemoteFilterMode::Primary
            && !prefixes.is_empty()
            && !selected
                .as_ref()
                .is_some_and(|s| remote_included(&s.url, prefixes))
        {
            return Err(SelectionReason::PrimaryRemoteNotIncluded);
        }

        let canonical = selected
            .as_ref()
            .map(|s| s.canonical.clone())
            .filter(|c| !c.is_empty());
        let key_source = match (rules.dedupe, canonical.as_deref()) {
            (DedupeMode::Remote, Some(canonical)) => canonical.to_string(),
            _ => path.to_string_lossy().into_owned(),
        };

        Ok(RepoDescriptor {
            path: path.to_path_buf(),
            remote_name: selected.as_ref().map(|s| s.name.clone()),
            remote_url: selected.as_ref().map(|s| s.url.clone()),
            canonical_remote: canonical,
            dedupe_key: dedupe_key(&key_source),
            is_fork: fork_parent.is_some(),
            fork_parent,
            last_commit_at,
            duplicates: Vec::new(),
        })
    }
}

/// sha256 (hex) of the canonical remote or absolute path.
pub fn dedupe_key(source: &str) -> String {
    hex::encode(Sha256::digest(source.trim().as_bytes()))
}

/// The clone with the newest reachable commit; on a tie, the smaller path.
fn freshest(group: &[RepoDescriptor]) -> Option<&RepoDescriptor> {
    group.iter().min_by(|a, b| match b.last_commit_at.cmp(&a.last_commit_at) {
        Ordering::Equal => a.path.cmp(&b.path),
        other => other,
    })
}

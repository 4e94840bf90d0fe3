use crate::error::{GtallyError, Result};
use chrono::{DateTime, Utc};
use gix::Repository;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read-only view of a working copy, used during discovery.
pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Open the repository whose working copy (or bare directory) is `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = gix::open(path.as_ref())?;
        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        let path = std::fs::canonicalize(&root).unwrap_or(root);
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured remotes and their fetch URLs, by remote name.
    pub fn remote_urls(&self) -> Result<BTreeMap<String, String>> {
        let mut remotes = BTreeMap::new();
        for name in self.repo.remote_names() {
            let remote = self
                .repo
                .find_remote(&*name)
                .map_err(|e| GtallyError::GitRepo(format!("remote '{name}': {e}")))?;
            if let Some(url) = remote.url(gix::remote::Direction::Fetch) {
                let url = url.to_bstring().to_string();
                if !url.trim().is_empty() {
                    remotes.insert(name.to_string(), url.trim().to_string());
                }
            }
        }
        Ok(remotes)
    }

    /// Newest commit time over all reference tips, i.e. the most recent
    /// reachable commit. `None` for a repository without commits.
    pub fn last_commit_time(&self) -> Result<Option<DateTime<Utc>>> {
        let references = self
            .repo
            .references()
            .map_err(|e| GtallyError::GitRepo(e.to_string()))?;
        let all = references
            .all()
            .map_err(|e| GtallyError::GitRepo(e.to_string()))?;

        let mut newest: Option<i64> = None;
        for reference in all {
            let Ok(mut reference) = reference else {
                continue;
            };
            let Ok(id) = reference.peel_to_id_in_place() else {
                continue;
            };
            let Ok(object) = id.object() else {
                continue;
            };
            let Ok(commit) = object.try_into_commit() else {
                continue;
            };
            match commit.time() {
                Ok(time) => newest = Some(newest.map_or(time.seconds, |n| n.max(time.seconds))),
                Err(e) => debug!(repo = %self.path.display(), error = %e, "unreadable commit time"),
            }
        }

        Ok(newest.and_then(|secs| DateTime::from_timestamp(secs, 0)))
    }
}

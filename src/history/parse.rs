use super::extract::RawCommit;
use super::language::language_for_path;
use super::{FIELD_SEPARATOR, HEADER_MARKER};
use crate::config::PathRules;
use crate::error::{GtallyError, Result};
use crate::model::{CommitRecord, ExcludedLines, FileDiff};
use chrono::DateTime;

/// Collapses git's rename notation (`src/{old => new}/f.rs`, `old.rs => new.rs`)
/// to the destination path.
pub fn normalize_numstat_path(path: &str) -> String {
    let p = path.trim();
    if !p.contains(" => ") {
        return p.to_string();
    }

    if let (Some(open), Some(close)) = (p.find('{'), p.rfind('}')) {
        if open < close {
            let inner = &p[open + 1..close];
            let new_part = inner.rsplit(" => ").next().unwrap_or(inner);
            let joined = format!("{}{}{}", &p[..open], new_part, &p[close + 1..]);
            return joined.replace("//", "/");
        }
    }
    p.rsplit(" => ").next().unwrap_or(p).trim().to_string()
}

/// Label for files at the top level of a repository.
pub const ROOT_DIRECTORY: &str = "(root)";

/// First path component of a repository-relative path, or [`ROOT_DIRECTORY`]
/// for top-level files.
pub fn directory_key(path: &str) -> &str {
    let p = path.trim_start_matches("./").trim_start_matches('/');
    match p.split_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir,
        _ => ROOT_DIRECTORY,
    }
}

/// Parses one numstat line. Binary files (`-\t-\tpath`) count as zero lines.
fn parse_numstat_line(line: &str) -> Option<FileDiff> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?;
    let deleted = parts.next()?;
    let path = normalize_numstat_path(parts.next()?);
    if path.is_empty() {
        return None;
    }

    let (insertions, deletions, binary) = if added == "-" || deleted == "-" {
        (0, 0, true)
    } else {
        (added.parse().ok()?, deleted.parse().ok()?, false)
    };

    Some(FileDiff {
        language: language_for_path(&path),
        path,
        insertions,
        deletions,
        binary,
    })
}

/// Converts one raw block into a [`CommitRecord`]. Files matched by
/// `exclusions` are counted in `excluded` instead of `files`.
pub fn parse_commit(raw: &RawCommit, exclusions: &PathRules) -> Result<CommitRecord> {
    let body = raw
        .header
        .strip_prefix(HEADER_MARKER)
        .ok_or_else(|| GtallyError::Parse(format!("missing commit header in '{}'", truncate(&raw.header))))?;

    let fields: Vec<&str> = body.splitn(6, FIELD_SEPARATOR).collect();
    if fields.len() < 5 {
        return Err(GtallyError::Parse(format!(
            "expected at least 5 header fields, got {} in '{}'",
            fields.len(),
            truncate(&raw.header)
        )));
    }

    let sha = fields[0].trim();
    if sha.is_empty() || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GtallyError::Parse(format!("invalid commit id '{sha}'")));
    }
    let secs: i64 = fields[4]
        .trim()
        .parse()
        .map_err(|_| GtallyError::Parse(format!("invalid author time '{}' for {sha}", fields[4])))?;
    let authored_at = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| GtallyError::Parse(format!("author time out of range: {secs}")))?;

    let mut files = Vec::with_capacity(raw.stats.len());
    let mut excluded = ExcludedLines::default();
    let mut malformed_stats = Vec::new();
    for line in &raw.stats {
        let Some(diff) = parse_numstat_line(line) else {
            malformed_stats.push(truncate(line));
            continue;
        };
        if exclusions.excludes(&diff.path) {
            excluded.files += 1;
            excluded.insertions += diff.insertions;
            excluded.deletions += diff.deletions;
            continue;
        }
        files.push(diff);
    }

    Ok(CommitRecord {
        sha: sha.to_ascii_lowercase(),
        parent_count: fields[1].split_whitespace().count(),
        author_name: fields[2].to_string(),
        author_email: fields[3].to_string(),
        authored_at,
        subject: fields.get(5).map(|s| s.to_string()).unwrap_or_default(),
        files,
        excluded,
        malformed_stats,
    })
}

fn truncate(s: &str) -> String {
    s.chars().take(80).collect()
}

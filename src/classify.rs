use crate::config::Settings;
use crate::model::{ClassificationLabel, CommitRecord};
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_BOOTSTRAP_CHANGED: u64 = 50_000;
pub const DEFAULT_BOOTSTRAP_FILES: u64 = 200;
pub const DEFAULT_BOOTSTRAP_RATIO: f64 = 0.90;

/// Extreme churn: `changed >= changed_threshold * this`, one-sided, any file count.
pub const DEFAULT_OUTLIER_CHANGED_MULTIPLIER: u64 = 10;
/// Extreme sweep: `files >= files_threshold * this`, any one-sidedness.
pub const DEFAULT_OUTLIER_FILES_MULTIPLIER: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapThresholds {
    pub changed: u64,
    pub files: u64,
    pub addition_ratio: f64,
}

impl Default for BootstrapThresholds {
    fn default() -> Self {
        Self {
            changed: DEFAULT_BOOTSTRAP_CHANGED,
            files: DEFAULT_BOOTSTRAP_FILES,
            addition_ratio: DEFAULT_BOOTSTRAP_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierLimits {
    pub changed_multiplier: u64,
    pub files_multiplier: u64,
}

impl Default for OutlierLimits {
    fn default() -> Self {
        Self {
            changed_multiplier: DEFAULT_OUTLIER_CHANGED_MULTIPLIER,
            files_multiplier: DEFAULT_OUTLIER_FILES_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapRule {
    Shape,
    ExtremeChurn,
    ExtremeFileSweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    Bootstrap(BootstrapRule),
    ForcedExcluded,
}

impl Classification {
    pub fn label(&self) -> ClassificationLabel {
        match self {
            Classification::Normal => ClassificationLabel::Normal,
            Classification::Bootstrap(_) => ClassificationLabel::Bootstrap,
            Classification::ForcedExcluded => ClassificationLabel::ForcedExcluded,
        }
    }

    pub fn rule(&self) -> Option<BootstrapRule> {
        match self {
            Classification::Bootstrap(rule) => Some(*rule),
            _ => None,
        }
    }
}

/// The numeric shape of a commit, which is all the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitShape {
    pub insertions: u64,
    pub deletions: u64,
    pub files: u64,
}

impl CommitShape {
    pub fn of(commit: &CommitRecord) -> Self {
        Self {
            insertions: commit.insertions(),
            deletions: commit.deletions(),
            files: commit.files_touched(),
        }
    }

    pub fn changed(&self) -> u64 {
        self.insertions + self.deletions
    }

    /// `max(insertions, deletions) / changed`, or `None` for an empty diff.
    pub fn one_sided_ratio(&self) -> Option<f64> {
        let changed = self.changed();
        if changed == 0 {
            return None;
        }
        Some(self.insertions.max(self.deletions) as f64 / changed as f64)
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    thresholds: BootstrapThresholds,
    outliers: OutlierLimits,
    exclude_commits: BTreeSet<String>,
    never_bootstrap: BTreeSet<String>,
}

impl Classifier {
    pub fn new(settings: &Settings) -> Self {
        Self {
            thresholds: settings.bootstrap,
            outliers: settings.outliers,
            exclude_commits: settings.exclude_commits.clone(),
            never_bootstrap: settings.bootstrap_exclude_shas.clone(),
        }
    }

    pub fn classify(&self, commit: &CommitRecord) -> Classification {
        self.classify_shape(&commit.sha, CommitShape::of(commit))
    }

    /// Precedence: exclude list, then the never-bootstrap list, then the shape
    /// test, then the extreme-outlier tests.
    pub fn classify_shape(&self, sha: &str, shape: CommitShape) -> Classification {
        let sha = sha.to_ascii_lowercase();
        if self.exclude_commits.contains(&sha) {
            return Classification::ForcedExcluded;
        }
        if self.never_bootstrap.contains(&sha) {
            return Classification::Normal;
        }
        match self.bootstrap_rule(shape) {
            Some(rule) => Classification::Bootstrap(rule),
            None => Classification::Normal,
        }
    }

    fn bootstrap_rule(&self, shape: CommitShape) -> Option<BootstrapRule> {
        let t = &self.thresholds;
        // An empty diff is never a bootstrap, whatever the thresholds say.
        let ratio = shape.one_sided_ratio()?;
        let changed = shape.changed();

        if changed >= t.changed && shape.files >= t.files && ratio >= t.addition_ratio {
            return Some(BootstrapRule::Shape);
        }
        if changed >= t.changed.saturating_mul(self.outliers.changed_multiplier) && ratio >= t.addition_ratio {
            return Some(BootstrapRule::ExtremeChurn);
        }
        if shape.files >= t.files.saturating_mul(self.outliers.files_multiplier) && changed >= t.changed {
            return Some(BootstrapRule::ExtremeFileSweep);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;

    fn classifier(json: &str) -> Classifier {
        let cfg: FileConfig = serde_json::from_str(json).unwrap();
        Classifier::new(&cfg.validate().unwrap())
    }

    fn shape(insertions: u64, deletions: u64, files: u64) -> CommitShape {
        CommitShape { insertions, deletions, files }
    }

    const SMALL: &str = r#"{"bootstrap_changed_threshold": 10, "bootstrap_files_threshold": 3, "bootstrap_addition_ratio": 0.9}"#;

    #[test]
    fn large_one_sided_import_is_bootstrap() {
        let c = classifier("{}");
        assert_eq!(
            c.classify_shape("b", shape(60_000, 1_000, 250)),
            Classification::Bootstrap(BootstrapRule::Shape)
        );
        assert_eq!(c.classify_shape("a", shape(100, 0, 1)), Classification::Normal);
    }

    #[test]
    fn deletion_dominant_commit_matches_shape() {
        let c = classifier(SMALL);
        assert_eq!(
            c.classify_shape("d", shape(0, 15, 3)),
            Classification::Bootstrap(BootstrapRule::Shape)
        );
    }

    #[test]
    fn balanced_commit_below_outlier_limits_is_normal() {
        let c = classifier(SMALL);
        assert_eq!(c.classify_shape("x", shape(30, 30, 4)), Classification::Normal);
    }

    #[test]
    fn extreme_churn_in_few_files() {
        let c = classifier(SMALL);
        assert_eq!(
            c.classify_shape("x", shape(100, 0, 1)),
            Classification::Bootstrap(BootstrapRule::ExtremeChurn)
        );
        assert_eq!(c.classify_shape("x", shape(99, 0, 1)), Classification::Normal);
    }

    #[test]
    fn extreme_balanced_file_sweep() {
        let c = classifier(SMALL);
        assert_eq!(
            c.classify_shape("x", shape(20, 20, 20)),
            Classification::Bootstrap(BootstrapRule::ExtremeFileSweep)
        );
        assert_eq!(c.classify_shape("x", shape(7, 7, 14)), Classification::Normal);
    }

    #[test]
    fn zero_changed_is_normal_even_with_zero_thresholds() {
        let c = classifier(
            r#"{"bootstrap_changed_threshold": 0, "bootstrap_files_threshold": 0, "bootstrap_addition_ratio": 0.0}"#,
        );
        assert_eq!(c.classify_shape("e", shape(0, 0, 0)), Classification::Normal);
        assert_eq!(c.classify_shape("e", shape(0, 0, 5)), Classification::Normal);
    }

    #[test]
    fn exclude_list_beats_bootstrap_shape() {
        let c = classifier(
            r#"{"exclude_commits": ["ABC123"], "bootstrap_exclude_shas": ["abc123", "def456"]}"#,
        );
        assert_eq!(c.classify_shape("abc123", shape(60_000, 0, 300)), Classification::ForcedExcluded);
        assert_eq!(c.classify_shape("abc123", shape(1, 0, 1)), Classification::ForcedExcluded);
        assert_eq!(c.classify_shape("DEF456", shape(60_000, 0, 300)), Classification::Normal);
    }

    #[test]
    fn labels() {
        assert_eq!(Classification::Normal.label(), ClassificationLabel::Normal);
        assert_eq!(
            Classification::Bootstrap(BootstrapRule::ExtremeChurn).label(),
            ClassificationLabel::Bootstrap
        );
        assert_eq!(Classification::ForcedExcluded.label(), ClassificationLabel::ForcedExcluded);
        assert_eq!(Classification::Normal.rule(), None);
    }
}

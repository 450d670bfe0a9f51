use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Patch identifiers ──────────────────────────────────────────────

/// Opaque patch key: a commit hash or a mailing-list message id.
///
/// The clustering core never interprets the contents; only equality,
/// ordering, and hashing are used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchId(pub String);

impl PatchId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PatchId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── Patch content ──────────────────────────────────────────────────

/// Lines added and removed by one hunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    #[serde(default)]
    pub insertions: Vec<String>,
    #[serde(default)]
    pub deletions: Vec<String>,
}

impl Hunk {
    pub fn changed_lines(&self) -> usize {
        self.insertions.len() + self.deletions.len()
    }
}

/// Structured diff: file path → hunk heading → hunk.
///
/// Produced by an external diff parser. Files that were renamed are keyed
/// by their post-image path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diff {
    pub files: BTreeMap<String, BTreeMap<String, Hunk>>,
}

impl Diff {
    /// Total number of inserted plus deleted lines over all hunks.
    pub fn changed_lines(&self) -> usize {
        self.files
            .values()
            .flat_map(BTreeMap::values)
            .map(Hunk::changed_lines)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.values().all(BTreeMap::is_empty)
    }

    /// Insert a hunk, creating the file entry if needed.
    pub fn add_hunk(&mut self, file: &str, heading: &str, hunk: Hunk) {
        self.files
            .entry(file.to_string())
            .or_default()
            .insert(heading.to_string(), hunk);
    }
}

/// Everything the core needs to know about a single patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    /// Commit message or mail body, one entry per line.
    pub message: Vec<String>,
    #[serde(default)]
    pub diff: Diff,
    pub author_date: DateTime<Utc>,
    #[serde(default)]
    pub is_revert: bool,
    /// Files touched by the patch. Defaults to the diff's file keys.
    #[serde(default)]
    pub affected_files: BTreeSet<String>,
}

impl Patch {
    /// Build a patch, deriving `affected_files` from the diff and
    /// `is_revert` from the subject line.
    pub fn new(message: Vec<String>, diff: Diff, author_date: DateTime<Utc>) -> Self {
        let affected_files = diff.files.keys().cloned().collect();
        let is_revert = message
            .first()
            .is_some_and(|subject| subject.trim_start().starts_with("Revert "));
        Self {
            message,
            diff,
            author_date,
            is_revert,
            affected_files,
        }
    }

    /// The message as a single newline-joined string.
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    pub fn subject(&self) -> &str {
        self.message.first().map_or("", String::as_str)
    }

    /// Fill `affected_files` from the diff when a snapshot left it empty.
    pub(crate) fn normalize(&mut self) {
        if self.affected_files.is_empty() {
            self.affected_files = self.diff.files.keys().cloned().collect();
        }
    }
}

// ── Similarity rating ──────────────────────────────────────────────

/// Result of comparing two patches. All three components lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimRating {
    /// Similarity of the commit messages.
    pub msg: f64,
    /// Similarity of the diffs.
    pub diff: f64,
    /// `min(changed lines) / max(changed lines)` of the pair.
    pub diff_lines_ratio: f64,
}

impl SimRating {
    pub fn new(msg: f64, diff: f64, diff_lines_ratio: f64) -> Self {
        Self {
            msg,
            diff,
            diff_lines_ratio,
        }
    }

    /// Rejected by the size-ratio gate: only the ratio is known.
    pub fn zero(diff_lines_ratio: f64) -> Self {
        Self::new(0.0, 0.0, diff_lines_ratio)
    }

    pub fn perfect() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    /// Unweighted sum used to rank candidate lists best-first.
    pub fn rank(&self) -> f64 {
        self.msg + self.diff
    }

    /// `weight * msg + (1 - weight) * diff`.
    pub fn combined(&self, weight: f64) -> f64 {
        weight * self.msg + (1.0 - weight) * self.diff
    }

    /// Total order on [`rank`](Self::rank), higher first when used with `sort_by`.
    pub fn cmp_best_first(&self, other: &Self) -> Ordering {
        other.rank().total_cmp(&self.rank())
    }
}

impl std::fmt::Display for SimRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "msg={:.3} diff={:.3} lines={:.3}",
            self.msg, self.diff, self.diff_lines_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn patch_id_borrows_as_str() {
        let mut set = BTreeSet::new();
        set.insert(PatchId::from("abc"));
        assert!(set.contains("abc"));
        assert_eq!(PatchId::from("abc").to_string(), "abc");
    }

    #[test]
    fn patch_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PatchId::from("deadbeef")).unwrap();
        assert_eq!(json, "\"deadbeef\"");
    }

    #[test]
    fn diff_counts_changed_lines() {
        let mut diff = Diff::default();
        diff.add_hunk(
            "a.c",
            "@@ fn a",
            Hunk {
                insertions: vec!["x".into(), "y".into()],
                deletions: vec!["z".into()],
            },
        );
        diff.add_hunk(
            "b.c",
            "@@ fn b",
            Hunk {
                insertions: vec!["w".into()],
                deletions: vec![],
            },
        );
        assert_eq!(diff.changed_lines(), 4);
        assert!(!diff.is_empty());
        assert!(Diff::default().is_empty());
    }

    #[test]
    fn patch_new_detects_revert_and_files() {
        let mut diff = Diff::default();
        diff.add_hunk("kernel/sched.c", "@@", Hunk::default());
        let patch = Patch::new(vec!["Revert \"sched: foo\"".into()], diff, date());
        assert!(patch.is_revert);
        assert!(patch.affected_files.contains("kernel/sched.c"));

        let plain = Patch::new(vec!["sched: foo".into()], Diff::default(), date());
        assert!(!plain.is_revert);
        assert_eq!(plain.subject(), "sched: foo");
    }

    #[test]
    fn rating_orders_best_first() {
        let mut ratings = [
            SimRating::new(0.1, 0.2, 1.0),
            SimRating::new(0.9, 0.9, 1.0),
            SimRating::new(0.5, 0.5, 1.0),
        ];
        ratings.sort_by(SimRating::cmp_best_first);
        assert!((ratings[0].rank() - 1.8).abs() < f64::EPSILON);
        assert!((ratings[2].rank() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn combined_weights_message_and_diff() {
        let r = SimRating::new(1.0, 0.0, 1.0);
        assert!((r.combined(0.3) - 0.3).abs() < 1e-12);
        assert!((r.combined(1.0) - 1.0).abs() < 1e-12);
    }
}

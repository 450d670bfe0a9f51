// Pairwise patch similarity: message and diff axes plus a size-ratio gate.
//
// Ratios intentionally cast line counts to float.
#![allow(clippy::cast_precision_loss)]

pub mod mapping;
pub mod scorer;

use std::collections::BTreeMap;

use crate::config::Thresholds;
use crate::types::{Diff, Hunk, Patch, SimRating};

pub use mapping::best_effort_mapping;
pub use scorer::{StringScorer, TokenSortRatio, similarity};

/// Rate how similar two patches are.
///
/// When the diff sizes differ by more than `thresholds.diff_lines_ratio`
/// allows, no string comparison runs and a zero rating carrying the ratio
/// is returned.
pub fn rate(
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    lhs: &Patch,
    rhs: &Patch,
) -> SimRating {
    let ratio = diff_lines_ratio(&lhs.diff, &rhs.diff);
    if ratio < thresholds.diff_lines_ratio {
        return SimRating::zero(ratio);
    }

    let msg = similarity(scorer, &lhs.message_text(), &rhs.message_text());
    let diff = diff_similarity(thresholds, scorer, &lhs.diff, &rhs.diff);
    SimRating::new(msg, diff, ratio)
}

/// `min / max` of the two diffs' changed-line counts.
///
/// Two empty diffs have ratio `1.0`; one empty diff against a non-empty one
/// has ratio `0.0`.
pub fn diff_lines_ratio(lhs: &Diff, rhs: &Diff) -> f64 {
    let (l, r) = (lhs.changed_lines(), rhs.changed_lines());
    let max = l.max(r);
    if max == 0 {
        return 1.0;
    }
    l.min(r) as f64 / max as f64
}

/// Average hunk similarity over fuzzily paired files and headings.
///
/// Returns `0.0` when nothing could be paired.
pub fn diff_similarity(
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    lhs: &Diff,
    rhs: &Diff,
) -> f64 {
    let left_files = keys(&lhs.files);
    let right_files = keys(&rhs.files);
    let file_pairs = best_effort_mapping(scorer, thresholds.filename, &left_files, &right_files);

    let per_file: Vec<f64> = file_pairs
        .into_iter()
        .filter_map(|(l_file, r_file)| {
            let scores = file_scores(thresholds, scorer, &lhs.files[l_file], &rhs.files[r_file]);
            mean(&scores)
        })
        .collect();

    mean(&per_file).unwrap_or(0.0)
}

fn file_scores(
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    lhs: &BTreeMap<String, Hunk>,
    rhs: &BTreeMap<String, Hunk>,
) -> Vec<f64> {
    let headings = best_effort_mapping(scorer, thresholds.heading, &keys(lhs), &keys(rhs));

    let mut scores = Vec::new();
    for (l_heading, r_heading) in headings {
        let (l, r) = (&lhs[l_heading], &rhs[r_heading]);
        if !l.deletions.is_empty() && !r.deletions.is_empty() {
            scores.push(similarity(
                scorer,
                &l.deletions.join("\n"),
                &r.deletions.join("\n"),
            ));
        }
        if !l.insertions.is_empty() && !r.insertions.is_empty() {
            scores.push(similarity(
                scorer,
                &l.insertions.join("\n"),
                &r.insertions.join("\n"),
            ));
        }
    }
    scores
}

fn keys<V>(map: &BTreeMap<String, V>) -> Vec<&str> {
    map.keys().map(String::as_str).collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

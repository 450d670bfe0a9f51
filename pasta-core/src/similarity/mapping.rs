// Best-effort fuzzy pairing of names (file paths, hunk headings) across two
// patches, used to follow renames in either direction.

use std::collections::BTreeSet;

use super::scorer::{StringScorer, similarity};

/// Pair names from `lhs` and `rhs` whose similarity reaches `threshold`.
///
/// Every name keeps only its best partner (first one wins on ties). Best
/// matches found scanning left→right and right→left are unioned, so a
/// rename is found from whichever side scores it higher. A threshold of
/// `1.0` or more only pairs identical names.
pub fn best_effort_mapping<'a>(
    scorer: &dyn StringScorer,
    threshold: f64,
    lhs: &[&'a str],
    rhs: &[&'a str],
) -> BTreeSet<(&'a str, &'a str)> {
    let mut pairs = BTreeSet::new();

    if threshold >= 1.0 {
        let right: BTreeSet<&str> = rhs.iter().copied().collect();
        for &name in lhs {
            if right.contains(name) {
                pairs.insert((name, name));
            }
        }
        return pairs;
    }

    for &l in lhs {
        if let Some(r) = best_match(scorer, threshold, l, rhs) {
            pairs.insert((l, r));
        }
    }
    for &r in rhs {
        if let Some(l) = best_match(scorer, threshold, r, lhs) {
            pairs.insert((l, r));
        }
    }
    pairs
}

fn best_match<'a>(
    scorer: &dyn StringScorer,
    threshold: f64,
    name: &str,
    others: &[&'a str],
) -> Option<&'a str> {
    let mut best: Option<(&'a str, f64)> = None;
    for &other in others {
        let score = similarity(scorer, name, other);
        if score < threshold {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((other, score));
            if score >= 1.0 {
                break;
            }
        }
    }
    best.map(|(other, _)| other)
}

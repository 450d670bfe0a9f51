// Candidate pre-selection: cut the N×M comparison space down to pairs that
// touch the same (or similarly named) files before any expensive scoring.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::Thresholds;
use crate::corpus::PatchProvider;
use crate::progress::ProgressReporter;
use crate::similarity::{StringScorer, best_effort_mapping};
use crate::types::PatchId;

/// Original id → plausible candidate ids.
pub type Candidates = BTreeMap<PatchId, BTreeSet<PatchId>>;

/// Affected file name → ids of the patches touching it.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    by_file: HashMap<String, BTreeSet<PatchId>>,
}

impl FileIndex {
    /// Index `ids` by their affected files. Ids without content are skipped.
    pub fn build(provider: &dyn PatchProvider, ids: &[PatchId]) -> Self {
        let mut by_file: HashMap<String, BTreeSet<PatchId>> = HashMap::new();
        for id in ids {
            let Some(patch) = provider.patch(id.as_str()) else {
                warn!(id = %id, "No content for patch, leaving it out of the file index");
                continue;
            };
            for file in &patch.affected_files {
                by_file.entry(file.clone()).or_default().insert(id.clone());
            }
        }
        Self { by_file }
    }

    pub fn get(&self, file: &str) -> Option<&BTreeSet<PatchId>> {
        self.by_file.get(file)
    }

    /// All indexed file names, sorted.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = self.by_file.keys().map(String::as_str).collect();
        files.sort_unstable();
        files
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

/// Keep each unordered pair once, as `original < candidate`.
///
/// For selections where both sides are the same set of ids.
pub fn retain_forward_pairs(selected: &mut Candidates) {
    for (original, found) in selected.iter_mut() {
        found.retain(|candidate| candidate > original);
    }
    selected.retain(|_, found| !found.is_empty());
}

/// Find plausible candidates for every original.
///
/// With `thresholds.filename >= 1.0` candidates must share an affected file
/// and, if `author_date_interval` is set, be authored within that many days.
/// Below `1.0` file names are paired fuzzily and reverts are only paired
/// with reverts.
pub fn preselect(
    provider: &dyn PatchProvider,
    originals: &[PatchId],
    candidates: &[PatchId],
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    progress: &dyn ProgressReporter,
) -> Candidates {
    let start = Instant::now();
    let candidate_index = FileIndex::build(provider, candidates);

    let result = if thresholds.filename >= 1.0 {
        preselect_exact(provider, originals, &candidate_index, thresholds, progress)
    } else {
        let original_index = FileIndex::build(provider, originals);
        preselect_fuzzy(
            provider,
            &original_index,
            &candidate_index,
            thresholds,
            scorer,
            progress,
        )
    };

    info!(
        originals = originals.len(),
        with_candidates = result.len(),
        pairs = result.values().map(BTreeSet::len).sum::<usize>(),
        duration = ?start.elapsed(),
        "Pre-selection complete"
    );
    result
}

fn preselect_exact(
    provider: &dyn PatchProvider,
    originals: &[PatchId],
    candidate_index: &FileIndex,
    thresholds: &Thresholds,
    progress: &dyn ProgressReporter,
) -> Candidates {
    progress.start("Pre-selecting candidates", originals.len() as u64);
    let interval = i64::from(thresholds.author_date_interval);

    let result = originals
        .par_iter()
        .filter_map(|original| {
            progress.advance(1);
            let Some(patch) = provider.patch(original.as_str()) else {
                warn!(id = %original, "No content for original, skipping");
                return None;
            };

            let mut found: BTreeSet<PatchId> = patch
                .affected_files
                .iter()
                .filter_map(|file| candidate_index.get(file))
                .flatten()
                .filter(|candidate| *candidate != original)
                .cloned()
                .collect();

            if interval > 0 {
                found.retain(|candidate| {
                    provider.patch(candidate.as_str()).is_some_and(|other| {
                        within_days(patch.author_date, other.author_date, interval)
                    })
                });
            }

            (!found.is_empty()).then(|| (original.clone(), found))
        })
        .collect();

    progress.finish();
    result
}

fn preselect_fuzzy(
    provider: &dyn PatchProvider,
    original_index: &FileIndex,
    candidate_index: &FileIndex,
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    progress: &dyn ProgressReporter,
) -> Candidates {
    let left_files = original_index.files();
    let right_files = candidate_index.files();
    progress.start("Matching file names", left_files.len() as u64);

    let mut pairs: Vec<(PatchId, PatchId)> = left_files
        .par_iter()
        .flat_map_iter(|&left| {
            progress.advance(1);
            let mapping = best_effort_mapping(scorer, thresholds.filename, &[left], &right_files);
            let mut out = Vec::new();
            for (l_file, r_file) in mapping {
                let (Some(lhs), Some(rhs)) = (original_index.get(l_file), candidate_index.get(r_file))
                else {
                    continue;
                };
                for original in lhs {
                    for candidate in rhs {
                        if original != candidate && same_revert_kind(provider, original, candidate) {
                            out.push((original.clone(), candidate.clone()));
                        }
                    }
                }
            }
            out
        })
        .collect();
    progress.finish();

    pairs.sort_unstable();
    pairs.dedup();

    let mut result = Candidates::new();
    let mut mirrored = 0usize;
    for (original, candidate) in pairs {
        let already = result
            .get(&candidate)
            .is_some_and(|found| found.contains(&original));
        if already {
            mirrored += 1;
            continue;
        }
        result.entry(original).or_default().insert(candidate);
    }
    debug!(mirrored, "Dropped symmetric duplicate pairs");
    result
}

fn same_revert_kind(provider: &dyn PatchProvider, a: &PatchId, b: &PatchId) -> bool {
    match (provider.patch(a.as_str()), provider.patch(b.as_str())) {
        (Some(a), Some(b)) => a.is_revert == b.is_revert,
        _ => false,
    }
}

fn within_days(a: DateTime<Utc>, b: DateTime<Utc>, days: i64) -> bool {
    (a - b).num_days().abs() <= days
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::corpus::PatchSnapshot;
    use crate::progress::NoopReporter;
    use crate::similarity::TokenSortRatio;
    use crate::types::{Diff, Hunk, Patch};

    fn base_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
    }

    fn add(snapshot: &mut PatchSnapshot, id: &str, subject: &str, files: &[&str], days: i64) {
        let mut diff = Diff::default();
        for file in files {
            diff.add_hunk(
                file,
                "@@",
                Hunk {
                    insertions: vec![format!("+{id}")],
                    deletions: vec![],
                },
            );
        }
        snapshot.insert(
            id,
            Patch::new(vec![subject.to_string()], diff, base_date() + Duration::days(days)),
        );
    }

    fn ids(names: &[&str]) -> Vec<PatchId> {
        names.iter().map(|n| PatchId::from(*n)).collect()
    }

    fn corpus() -> PatchSnapshot {
        let mut s = PatchSnapshot::default();
        add(&mut s, "o1", "fix a", &["a.c"], 0);
        add(&mut s, "o2", "fix b", &["b.c", "x.c"], 0);
        add(&mut s, "c1", "fix a again", &["a.c"], 10);
        add(&mut s, "c2", "fix b later", &["b.c"], 400);
        add(&mut s, "c3", "other", &["z.c"], 0);
        add(&mut s, "c4", "Revert \"fix b\"", &["b2.c"], 0);
        add(&mut s, "c5", "fix b renamed", &["b2.c"], 0);
        s
    }

    fn run(snapshot: &PatchSnapshot, originals: &[&str], candidates: &[&str], t: &Thresholds) -> Candidates {
        preselect(
            snapshot,
            &ids(originals),
            &ids(candidates),
            t,
            &TokenSortRatio::default(),
            &NoopReporter,
        )
    }

    fn names(c: &Candidates, key: &str) -> Vec<String> {
        c.get(key)
            .map(|s| s.iter().map(|i| i.0.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn exact_path_shares_files() {
        let snapshot = corpus();
        let result = run(&snapshot, &["o1", "o2"], &["c1", "c2", "c3"], &Thresholds::default());
        assert_eq!(names(&result, "o1"), ["c1"]);
        assert_eq!(names(&result, "o2"), ["c2"]);
        assert!(!result.values().any(|s| s.contains("c3")));
    }

    #[test]
    fn exact_path_discards_self() {
        let snapshot = corpus();
        let result = run(&snapshot, &["o1", "c1"], &["o1", "c1"], &Thresholds::default());
        assert_eq!(names(&result, "o1"), ["c1"]);
        assert_eq!(names(&result, "c1"), ["o1"]);
    }

    #[test]
    fn exact_path_respects_date_window() {
        let snapshot = corpus();
        let t = Thresholds {
            author_date_interval: 30,
            ..Thresholds::default()
        };
        let result = run(&snapshot, &["o1", "o2"], &["c1", "c2"], &t);
        assert_eq!(names(&result, "o1"), ["c1"]);
        assert!(!result.contains_key("o2"));
    }

    #[test]
    fn fuzzy_path_follows_renames_and_skips_revert_mismatch() {
        let snapshot = corpus();
        let t = Thresholds {
            filename: 0.6,
            ..Thresholds::default()
        };
        let result = run(&snapshot, &["o2"], &["c4", "c5"], &t);
        assert_eq!(names(&result, "o2"), ["c5"]);
    }

    #[test]
    fn fuzzy_path_drops_mirrored_pairs() {
        let snapshot = corpus();
        let t = Thresholds {
            filename: 0.6,
            ..Thresholds::default()
        };
        let result = run(&snapshot, &["o1", "c1"], &["o1", "c1"], &t);
        let total: usize = result.values().map(BTreeSet::len).sum();
        assert_eq!(total, 1);
        assert_eq!(names(&result, "c1"), ["o1"]);
    }

    #[test]
    fn file_index_groups_ids() {
        let snapshot = corpus();
        let index = FileIndex::build(&snapshot, &ids(&["o2", "c2", "missing"]));
        assert_eq!(index.files(), ["b.c", "x.c"]);
        assert_eq!(index.get("b.c").map(BTreeSet::len), Some(2));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn forward_pairs_keep_one_direction() {
        let mut selected: Candidates = BTreeMap::new();
        selected.insert(PatchId::from("a"), ids(&["a", "b", "c"]).into_iter().collect());
        selected.insert(PatchId::from("b"), ids(&["a"]).into_iter().collect());
        selected.insert(PatchId::from("c"), ids(&["a", "b"]).into_iter().collect());
        retain_forward_pairs(&mut selected);

        assert_eq!(names(&selected, "a"), ["b", "c"]);
        assert!(!selected.contains_key("b"));
        assert!(!selected.contains_key("c"));
    }
}

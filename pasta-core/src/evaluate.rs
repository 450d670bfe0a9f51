// Evaluation: score pre-selected candidate pairs in parallel and collect
// the ratings into a persisted, mergeable result.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cluster::ClusterStore;
use crate::config::Thresholds;
use crate::corpus::{PatchProvider, PatchSnapshot};
use crate::error::EvaluationError;
use crate::preselect::{Candidates, preselect, retain_forward_pairs};
use crate::progress::ProgressReporter;
use crate::similarity::{StringScorer, rate};
use crate::types::{PatchId, SimRating};

/// What kind of corpora were compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationType {
    /// Downstream stacks against each other.
    #[default]
    PatchStack,
    /// Downstream patches against landed upstream patches.
    Upstream,
    /// Mailing-list submissions against commits.
    MailingList,
}

impl EvaluationType {
    /// Whether accepted candidates are marked upstream.
    pub fn marks_upstream(self) -> bool {
        self == Self::Upstream
    }
}

impl std::fmt::Display for EvaluationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatchStack => write!(f, "patch-stack"),
            Self::Upstream => write!(f, "upstream"),
            Self::MailingList => write!(f, "mailing-list"),
        }
    }
}

/// Candidates of one original with their ratings, best first.
pub type CandidateList = Vec<(PatchId, SimRating)>;

/// Ratings of every evaluated pair, grouped by original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub eval_type: EvaluationType,
    pub entries: BTreeMap<PatchId, CandidateList>,
}

impl EvaluationResult {
    pub fn new(eval_type: EvaluationType) -> Self {
        Self {
            eval_type,
            entries: BTreeMap::new(),
        }
    }

    /// Record a rating. A candidate already listed for `original` keeps the
    /// better of the two ratings.
    pub fn push(&mut self, original: PatchId, candidate: PatchId, rating: SimRating) {
        let list = self.entries.entry(original).or_default();
        match list.iter_mut().find(|(id, _)| *id == candidate) {
            Some((_, existing)) => {
                if rating.rank() > existing.rank() {
                    *existing = rating;
                }
            }
            None => list.push((candidate, rating)),
        }
    }

    /// Fold a partial result into this one and restore best-first order.
    pub fn merge(&mut self, other: EvaluationResult) {
        if other.eval_type != self.eval_type {
            warn!(
                ours = %self.eval_type,
                theirs = %other.eval_type,
                "Merging evaluation results of different types"
            );
        }
        for (original, list) in other.entries {
            for (candidate, rating) in list {
                self.push(original.clone(), candidate, rating);
            }
        }
        self.sort();
    }

    /// Sort every candidate list best-first. Ties keep their current order.
    pub fn sort(&mut self) {
        for list in self.entries.values_mut() {
            list.sort_by(|a, b| a.1.cmp_best_first(&b.1));
        }
    }

    pub fn get(&self, original: &str) -> Option<&CandidateList> {
        self.entries.get(original)
    }

    /// Number of originals with at least one candidate.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of rated pairs.
    pub fn candidate_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Every pair ordered by rating, best first. Equal ratings keep
    /// insertion order: originals by id, then each candidate list in order.
    pub fn ranked_pairs(&self) -> Vec<(&PatchId, &PatchId, SimRating)> {
        let mut pairs: Vec<(&PatchId, &PatchId, SimRating)> = self
            .entries
            .iter()
            .flat_map(|(original, list)| {
                list.iter()
                    .map(move |(candidate, rating)| (original, candidate, *rating))
            })
            .collect();
        pairs.sort_by(|a, b| a.2.cmp_best_first(&b.2));
        pairs
    }

    pub fn save(&self, path: &Path) -> Result<(), EvaluationError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), pairs = self.candidate_count(), "Saved evaluation result");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, EvaluationError> {
        if !path.exists() {
            return Err(EvaluationError::NotFound(path.display().to_string()));
        }
        let mut result: Self = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        result.sort();
        Ok(result)
    }
}

// ── Scoring ────────────────────────────────────────────────────────

/// Rate a single pair. Identical ids rate perfect without looking at
/// content; pairs with missing content yield `None`.
pub fn evaluate_pair(
    provider: &dyn PatchProvider,
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    original: &PatchId,
    candidate: &PatchId,
) -> Option<SimRating> {
    if original == candidate {
        return Some(SimRating::perfect());
    }
    let (Some(lhs), Some(rhs)) = (
        provider.patch(original.as_str()),
        provider.patch(candidate.as_str()),
    ) else {
        warn!(%original, %candidate, "Missing patch content, dropping pair");
        return None;
    };
    Some(rate(thresholds, scorer, lhs, rhs))
}

/// Rate every pre-selected pair on the rayon pool.
pub fn evaluate(
    provider: &dyn PatchProvider,
    candidates: &Candidates,
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    eval_type: EvaluationType,
    progress: &dyn ProgressReporter,
) -> EvaluationResult {
    let start = Instant::now();
    let pairs: Vec<(&PatchId, &PatchId)> = candidates
        .iter()
        .flat_map(|(original, found)| found.iter().map(move |candidate| (original, candidate)))
        .collect();

    progress.start("Evaluating candidates", pairs.len() as u64);
    let rated: Vec<(PatchId, PatchId, SimRating)> = pairs
        .par_iter()
        .filter_map(|&(original, candidate)| {
            progress.advance(1);
            evaluate_pair(provider, thresholds, scorer, original, candidate)
                .map(|rating| (original.clone(), candidate.clone(), rating))
        })
        .collect();
    progress.finish();

    let dropped = pairs.len() - rated.len();
    let mut result = EvaluationResult::new(eval_type);
    for (original, candidate, rating) in rated {
        result.push(original, candidate, rating);
    }
    result.sort();

    info!(
        eval_type = %eval_type,
        pairs = result.candidate_count(),
        dropped,
        duration = ?start.elapsed(),
        "Evaluation complete"
    );
    result
}

// ── Analysis modes ─────────────────────────────────────────────────

/// Which originals are compared against which candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Every stack against its successor.
    Succ,
    /// Downstream cluster representatives against each other.
    Rep,
    /// Downstream representatives against upstream patches.
    Upstream,
}

impl AnalysisMode {
    pub fn eval_type(self) -> EvaluationType {
        match self {
            Self::Succ | Self::Rep => EvaluationType::PatchStack,
            Self::Upstream => EvaluationType::Upstream,
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succ => write!(f, "succ"),
            Self::Rep => write!(f, "rep"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

/// `(originals, candidates)` id sets the mode compares.
pub fn comparison_sets(
    mode: AnalysisMode,
    snapshot: &PatchSnapshot,
    store: &ClusterStore,
) -> Vec<(Vec<PatchId>, Vec<PatchId>)> {
    match mode {
        AnalysisMode::Succ => snapshot
            .stacks()
            .windows(2)
            .map(|pair| (pair[0].patches.clone(), pair[1].patches.clone()))
            .collect(),
        AnalysisMode::Rep => {
            let reps = downstream_representatives(store);
            vec![(reps.clone(), reps)]
        }
        AnalysisMode::Upstream => {
            vec![(downstream_representatives(store), snapshot.upstream_ids().to_vec())]
        }
    }
}

fn downstream_representatives(store: &ClusterStore) -> Vec<PatchId> {
    store
        .get_representative_system(|_, _| false)
        .into_iter()
        .collect()
}

/// Pre-select and evaluate everything `mode` compares.
pub fn analyse(
    mode: AnalysisMode,
    snapshot: &PatchSnapshot,
    store: &ClusterStore,
    thresholds: &Thresholds,
    scorer: &dyn StringScorer,
    progress: &dyn ProgressReporter,
) -> EvaluationResult {
    let mut result = EvaluationResult::new(mode.eval_type());
    for (originals, candidates) in comparison_sets(mode, snapshot, store) {
        let mut selected = preselect(snapshot, &originals, &candidates, thresholds, scorer, progress);
        if mode == AnalysisMode::Rep {
            retain_forward_pairs(&mut selected);
        }
        let partial = evaluate(snapshot, &selected, thresholds, scorer, mode.eval_type(), progress);
        result.merge(partial);
    }
    info!(
        mode = %mode,
        originals = result.len(),
        pairs = result.candidate_count(),
        "Analysis complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::corpus::Stack;
    use crate::progress::NoopReporter;
    use crate::similarity::TokenSortRatio;
    use crate::types::{Diff, Hunk, Patch};

    fn patch(subject: &str, file: &str, line: &str) -> Patch {
        let mut diff = Diff::default();
        diff.add_hunk(
            file,
            "@@ fn",
            Hunk {
                insertions: vec![line.to_string()],
                deletions: vec![],
            },
        );
        Patch::new(
            vec![subject.to_string()],
            diff,
            Utc.with_ymd_and_hms(2022, 2, 2, 0, 0, 0).unwrap(),
        )
    }

    fn id(s: &str) -> PatchId {
        PatchId::from(s)
    }

    fn snapshot() -> PatchSnapshot {
        let mut s = PatchSnapshot::default();
        s.insert("a1", patch("net: fix race", "net/core.c", "spin_lock(&x);"));
        s.insert("a2", patch("net: fix race", "net/core.c", "spin_lock(&x);"));
        s.insert("b1", patch("mm: tidy", "mm/page.c", "return 0;"));
        s.insert("u1", patch("net: fix race", "net/core.c", "spin_lock(&x);"));
        s.stacks = vec![
            Stack {
                name: "v1".into(),
                patches: vec![id("a1"), id("b1")],
            },
            Stack {
                name: "v2".into(),
                patches: vec![id("a2")],
            },
        ];
        s.upstream = vec![id("u1")];
        s
    }

    #[test]
    fn identical_ids_rate_perfect_without_content() {
        let empty = PatchSnapshot::default();
        let rating = evaluate_pair(
            &empty,
            &Thresholds::default(),
            &TokenSortRatio::default(),
            &id("x"),
            &id("x"),
        );
        assert_eq!(rating, Some(SimRating::perfect()));
    }

    #[test]
    fn missing_content_drops_pair() {
        let s = snapshot();
        let candidates = Candidates::from([(id("a1"), BTreeSet::from([id("ghost"), id("a2")]))]);
        let result = evaluate(
            &s,
            &candidates,
            &Thresholds::default(),
            &TokenSortRatio::default(),
            EvaluationType::PatchStack,
            &NoopReporter,
        );
        assert_eq!(result.candidate_count(), 1);
        assert_eq!(result.get("a1").unwrap()[0].0, id("a2"));
    }

    #[test]
    fn lists_are_sorted_best_first() {
        let mut result = EvaluationResult::new(EvaluationType::PatchStack);
        result.push(id("o"), id("weak"), SimRating::new(0.1, 0.1, 1.0));
        result.push(id("o"), id("strong"), SimRating::new(0.9, 0.9, 1.0));
        result.push(id("o"), id("weak"), SimRating::new(0.2, 0.2, 1.0));
        result.sort();
        let order: Vec<&str> = result.get("o").unwrap().iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(order, ["strong", "weak"]);
        assert_eq!(result.get("o").unwrap()[1].1, SimRating::new(0.2, 0.2, 1.0));
    }

    #[test]
    fn ranked_pairs_ties_keep_insertion_order() {
        let mut result = EvaluationResult::new(EvaluationType::PatchStack);
        let tie = SimRating::new(0.5, 0.5, 1.0);
        result.push(id("b"), id("y"), tie);
        result.push(id("a"), id("x"), tie);
        result.push(id("a"), id("z"), SimRating::perfect());
        let pairs: Vec<(&str, &str)> = result
            .ranked_pairs()
            .into_iter()
            .map(|(o, c, _)| (o.as_str(), c.as_str()))
            .collect();
        assert_eq!(pairs, [("a", "z"), ("a", "x"), ("b", "y")]);
    }

    #[test]
    fn merge_combines_partial_results() {
        let mut left = EvaluationResult::new(EvaluationType::Upstream);
        left.push(id("o1"), id("c1"), SimRating::new(0.3, 0.3, 1.0));
        let mut right = EvaluationResult::new(EvaluationType::Upstream);
        right.push(id("o1"), id("c2"), SimRating::new(0.6, 0.6, 1.0));
        right.push(id("o2"), id("c3"), SimRating::new(0.6, 0.6, 1.0));

        left.merge(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.candidate_count(), 3);
        assert_eq!(left.get("o1").unwrap()[0].0, id("c2"));
    }

    #[test]
    fn save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("eval/result.json");
        assert!(matches!(
            EvaluationResult::load(&path),
            Err(EvaluationError::NotFound(_))
        ));

        let mut result = EvaluationResult::new(EvaluationType::MailingList);
        result.push(id("m1"), id("c1"), SimRating::new(0.25, 0.5, 0.75));
        result.save(&path).unwrap();
        assert_eq!(EvaluationResult::load(&path).unwrap(), result);
    }

    #[test]
    fn succ_mode_compares_neighbouring_stacks() {
        let s = snapshot();
        let sets = comparison_sets(AnalysisMode::Succ, &s, &ClusterStore::new());
        assert_eq!(sets, vec![(vec![id("a1"), id("b1")], vec![id("a2")])]);

        let result = analyse(
            AnalysisMode::Succ,
            &s,
            &ClusterStore::new(),
            &Thresholds::default(),
            &TokenSortRatio::default(),
            &NoopReporter,
        );
        assert_eq!(result.eval_type, EvaluationType::PatchStack);
        assert_eq!(result.get("a1").unwrap()[0], (id("a2"), SimRating::perfect()));
        assert!(result.get("b1").is_none());
    }

    #[test]
    fn rep_mode_scores_each_pair_once() {
        let s = snapshot();
        let mut store = ClusterStore::new();
        s.seed_store(&mut store);
        let result = analyse(
            AnalysisMode::Rep,
            &s,
            &store,
            &Thresholds::default(),
            &TokenSortRatio::default(),
            &NoopReporter,
        );
        assert_eq!(result.candidate_count(), 1);
        assert_eq!(result.get("a1").unwrap()[0].0, id("a2"));
    }

    #[test]
    fn upstream_mode_targets_upstream_ids() {
        let s = snapshot();
        let mut store = ClusterStore::new();
        s.seed_store(&mut store);
        let result = analyse(
            AnalysisMode::Upstream,
            &s,
            &store,
            &Thresholds::default(),
            &TokenSortRatio::default(),
            &NoopReporter,
        );
        assert_eq!(result.eval_type, EvaluationType::Upstream);
        let targets: BTreeSet<&str> = result
            .entries
            .values()
            .flatten()
            .map(|(c, _)| c.as_str())
            .collect();
        assert_eq!(targets, BTreeSet::from(["u1"]));
        assert_eq!(result.len(), 2);
    }
}

//! Rating driver: turns an [`EvaluationResult`] into cluster merges.
//!
//! Pairs are visited best-first. Each pair runs through a fixed chain of
//! rules; the first rule that matches decides its [`Outcome`]:
//!
//! 1. size ratio below `thresholds.diff_lines_ratio` → skipped
//! 2. original equals candidate → ignored
//! 3. already in one cluster → skipped as duplicate
//! 4. declined before → skipped as false positive
//! 5. original authored after candidate (only with `check_commit_date`) → skipped
//! 6. combined rating ≥ `thresholds.autoaccept` → merged
//! 7. combined rating < `thresholds.interactive` → declined
//! 8. otherwise → queued for a [`DecisionSource`]
//!
//! Pairs are decided one at a time in rank order, whether the decision is
//! automatic or comes from a human, so rules 3 and 4 always see every
//! earlier answer. All store mutation happens on the calling thread.

mod decision;

pub use decision::{
    ConsoleDecisions, Decision, DecisionSource, ReviewRequest, ScriptedDecisions,
    render_side_by_side,
};

use std::fmt;
use std::ops::ControlFlow;

use tracing::{debug, info};

use crate::cluster::{ClusterStore, FalsePositives};
use crate::config::Thresholds;
use crate::corpus::PatchProvider;
use crate::error::RatingError;
use crate::evaluate::{EvaluationResult, EvaluationType};
use crate::types::{PatchId, SimRating};

/// Final state of one candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AutoAccepted,
    AutoDeclined,
    SkippedRatio,
    SkippedDuplicate,
    SkippedFalsePositive,
    SkippedDate,
    /// Self-pair, never acted on.
    Ignored,
    Accepted,
    Declined,
    Skipped,
    /// Not yet decided when the session was halted.
    Unreviewed,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every queued pair was answered or skipped.
    Completed,
    /// Stopped early; decisions so far are kept.
    Halted,
    /// Stopped early; the store and false positives were restored.
    Discarded,
}

impl SessionEnd {
    /// Whether the caller should write the store and false positives back.
    pub fn should_persist(self) -> bool {
        self != Self::Discarded
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Halted => write!(f, "halted, decisions saved"),
            Self::Discarded => write!(f, "halted, decisions discarded"),
        }
    }
}

/// Per-outcome counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingSummary {
    pub auto_accepted: usize,
    pub auto_declined: usize,
    pub skipped_ratio: usize,
    pub skipped_duplicate: usize,
    pub skipped_false_positive: usize,
    pub skipped_date: usize,
    pub ignored: usize,
    pub accepted: usize,
    pub declined: usize,
    pub skipped: usize,
    pub unreviewed: usize,
}

impl RatingSummary {
    pub fn record(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::AutoAccepted => &mut self.auto_accepted,
            Outcome::AutoDeclined => &mut self.auto_declined,
            Outcome::SkippedRatio => &mut self.skipped_ratio,
            Outcome::SkippedDuplicate => &mut self.skipped_duplicate,
            Outcome::SkippedFalsePositive => &mut self.skipped_false_positive,
            Outcome::SkippedDate => &mut self.skipped_date,
            Outcome::Ignored => &mut self.ignored,
            Outcome::Accepted => &mut self.accepted,
            Outcome::Declined => &mut self.declined,
            Outcome::Skipped => &mut self.skipped,
            Outcome::Unreviewed => &mut self.unreviewed,
        };
        *counter += 1;
    }

    /// Number of pairs seen.
    pub fn total(&self) -> usize {
        self.auto_accepted
            + self.auto_declined
            + self.skipped_ratio
            + self.skipped_duplicate
            + self.skipped_false_positive
            + self.skipped_date
            + self.ignored
            + self.accepted
            + self.declined
            + self.skipped
            + self.unreviewed
    }

    /// Number of pairs that ended up merged.
    pub fn merged(&self) -> usize {
        self.auto_accepted + self.accepted
    }
}

impl fmt::Display for RatingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("auto-accepted", self.auto_accepted),
            ("auto-declined", self.auto_declined),
            ("skipped (diff size ratio)", self.skipped_ratio),
            ("skipped (already related)", self.skipped_duplicate),
            ("skipped (false positive)", self.skipped_false_positive),
            ("skipped (commit date)", self.skipped_date),
            ("ignored (self pair)", self.ignored),
            ("accepted", self.accepted),
            ("declined", self.declined),
            ("skipped", self.skipped),
            ("not reviewed", self.unreviewed),
        ];
        writeln!(f, "Rated {} pairs:", self.total())?;
        for (label, count) in rows {
            writeln!(f, "  {label:<28}{count:>8}")?;
        }
        Ok(())
    }
}

/// What a finished session hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub summary: RatingSummary,
}

/// One rating pass over an evaluation result.
///
/// Borrows the store and false-positive memory mutably for its lifetime;
/// persisting them afterwards is up to the caller.
pub struct RatingSession<'a> {
    store: &'a mut ClusterStore,
    false_positives: &'a mut FalsePositives,
    provider: &'a dyn PatchProvider,
    thresholds: Thresholds,
    check_commit_date: bool,
}

impl fmt::Debug for RatingSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatingSession")
            .field("clusters", &self.store.len())
            .field("false_positives", &self.false_positives.len())
            .field("thresholds", &self.thresholds)
            .field("check_commit_date", &self.check_commit_date)
            .finish_non_exhaustive()
    }
}

struct Queued<'r> {
    original: &'r PatchId,
    candidate: &'r PatchId,
    rating: SimRating,
    combined: f64,
}

/// Position of the current pair among all ranked pairs.
#[derive(Clone, Copy)]
struct Progress {
    position: usize,
    total: usize,
}

impl<'a> RatingSession<'a> {
    pub fn new(
        store: &'a mut ClusterStore,
        false_positives: &'a mut FalsePositives,
        provider: &'a dyn PatchProvider,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            store,
            false_positives,
            provider,
            thresholds,
            check_commit_date: false,
        }
    }

    #[must_use]
    pub fn check_commit_date(mut self, enabled: bool) -> Self {
        self.check_commit_date = enabled;
        self
    }

    /// Decide every pair of `result` in rank order, asking `decisions`
    /// about the ones that need a human.
    ///
    /// The store is optimized before returning unless the session was
    /// discarded, in which case both the store and the false positives are
    /// back in their state from before the call.
    pub fn run(
        mut self,
        result: &EvaluationResult,
        decisions: &mut dyn DecisionSource,
    ) -> Result<SessionReport, RatingError> {
        let backup = (self.store.clone(), self.false_positives.clone());
        let mut summary = RatingSummary::default();
        let pairs = result.ranked_pairs();
        let total = pairs.len();
        let mut end = SessionEnd::Completed;

        for (idx, (original, candidate, rating)) in pairs.into_iter().enumerate() {
            let queued = match self.classify(original, candidate, rating) {
                Ok(queued) => queued,
                Err(outcome) => {
                    if outcome == Outcome::AutoAccepted {
                        self.accept(original, candidate, result.eval_type);
                    }
                    summary.record(outcome);
                    continue;
                }
            };

            let progress = Progress {
                position: idx + 1,
                total,
            };
            match self.review(&queued, progress, result.eval_type, decisions)? {
                ControlFlow::Continue(outcome) => summary.record(outcome),
                ControlFlow::Break(halt) => {
                    end = halt;
                    summary.unreviewed += total - idx;
                    break;
                }
            }
        }

        if end == SessionEnd::Discarded {
            *self.store = backup.0;
            *self.false_positives = backup.1;
        } else {
            self.store.optimize();
        }

        info!(
            end = %end,
            merged = summary.merged(),
            declined = summary.auto_declined + summary.declined,
            asked = summary.accepted + summary.declined + summary.skipped,
            "Rating session finished"
        );
        Ok(SessionReport { end, summary })
    }

    /// Rules 1 to 7. `Ok` means the pair needs a human.
    fn classify<'r>(
        &self,
        original: &'r PatchId,
        candidate: &'r PatchId,
        rating: SimRating,
    ) -> Result<Queued<'r>, Outcome> {
        if rating.diff_lines_ratio < self.thresholds.diff_lines_ratio {
            return Err(Outcome::SkippedRatio);
        }
        if original == candidate {
            debug!(%original, "Pair compares a patch with itself, ignoring");
            return Err(Outcome::Ignored);
        }
        self.check_known(original, candidate)?;
        if self.check_commit_date && self.authored_after(original, candidate) {
            return Err(Outcome::SkippedDate);
        }

        let combined = rating.combined(self.thresholds.message_diff_weight);
        if combined >= self.thresholds.autoaccept {
            return Err(Outcome::AutoAccepted);
        }
        if combined < self.thresholds.interactive {
            return Err(Outcome::AutoDeclined);
        }
        Ok(Queued {
            original,
            candidate,
            rating,
            combined,
        })
    }

    /// Rules 3 and 4, which depend on earlier decisions.
    fn check_known(&self, original: &PatchId, candidate: &PatchId) -> Result<(), Outcome> {
        if self.store.is_related([original, candidate]) {
            return Err(Outcome::SkippedDuplicate);
        }
        if self
            .false_positives
            .is_false_positive(self.store, original.as_str(), candidate.as_str())
        {
            return Err(Outcome::SkippedFalsePositive);
        }
        Ok(())
    }

    fn authored_after(&self, original: &PatchId, candidate: &PatchId) -> bool {
        match (
            self.provider.patch(original.as_str()),
            self.provider.patch(candidate.as_str()),
        ) {
            (Some(o), Some(c)) => o.author_date > c.author_date,
            _ => false,
        }
    }

    fn accept(&mut self, original: &PatchId, candidate: &PatchId, eval_type: EvaluationType) {
        self.store.insert([original, candidate]);
        if eval_type.marks_upstream() {
            self.store.mark_upstream(candidate.as_str(), true);
        }
    }

    /// Ask about one queued pair. `Break` carries how the session halted.
    fn review(
        &mut self,
        item: &Queued<'_>,
        progress: Progress,
        eval_type: EvaluationType,
        decisions: &mut dyn DecisionSource,
    ) -> Result<ControlFlow<SessionEnd, Outcome>, RatingError> {
        let request = ReviewRequest {
            original: item.original,
            candidate: item.candidate,
            rating: item.rating,
            combined: item.combined,
            original_patch: self.provider.patch(item.original.as_str()),
            candidate_patch: self.provider.patch(item.candidate.as_str()),
            position: progress.position,
            queue_len: progress.total,
        };
        let outcome = match decisions.decide(&request)? {
            Decision::Accept => {
                self.accept(item.original, item.candidate, eval_type);
                Outcome::Accepted
            }
            Decision::Decline => {
                self.false_positives.mark(
                    self.store,
                    item.original.as_str(),
                    item.candidate.as_str(),
                );
                Outcome::Declined
            }
            Decision::Skip => Outcome::Skipped,
            Decision::HaltAndSave => return Ok(ControlFlow::Break(SessionEnd::Halted)),
            Decision::HaltAndDiscard => return Ok(ControlFlow::Break(SessionEnd::Discarded)),
        };
        debug!(original = %item.original, candidate = %item.candidate, ?outcome, "Pair reviewed");
        Ok(ControlFlow::Continue(outcome))
    }
}

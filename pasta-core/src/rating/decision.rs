use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::{BufRead, Write};

use crate::error::RatingError;
use crate::types::{Patch, PatchId, SimRating};

/// A human verdict on a queued pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Merge the pair.
    Accept,
    /// Remember the pair as a false positive.
    Decline,
    /// Leave the pair undecided.
    Skip,
    /// Stop asking and keep everything decided so far.
    HaltAndSave,
    /// Stop asking and throw away this session's changes.
    HaltAndDiscard,
}

impl Decision {
    /// Map a console answer to a decision.
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Self::Accept),
            "n" | "no" => Some(Self::Decline),
            "s" | "skip" => Some(Self::Skip),
            "q" | "quit" => Some(Self::HaltAndSave),
            "d" | "discard" => Some(Self::HaltAndDiscard),
            _ => None,
        }
    }
}

/// A pair waiting for a human, with the content needed to judge it.
#[derive(Debug, Clone)]
pub struct ReviewRequest<'a> {
    pub original: &'a PatchId,
    pub candidate: &'a PatchId,
    pub rating: SimRating,
    /// Weighted rating the thresholds were applied to.
    pub combined: f64,
    pub original_patch: Option<&'a Patch>,
    pub candidate_patch: Option<&'a Patch>,
    /// 1-based position among the session's ranked pairs.
    pub position: usize,
    pub queue_len: usize,
}

/// Where verdicts on queued pairs come from.
pub trait DecisionSource {
    fn decide(&mut self, request: &ReviewRequest<'_>) -> Result<Decision, RatingError>;
}

// ── Console ────────────────────────────────────────────────────────

const COLUMN_WIDTH: usize = 60;

/// Prompts on `output` and reads one answer per line from `input`.
///
/// End of input counts as halt-and-save.
#[derive(Debug)]
pub struct ConsoleDecisions<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleDecisions<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: BufRead, W: Write> DecisionSource for ConsoleDecisions<R, W> {
    fn decide(&mut self, request: &ReviewRequest<'_>) -> Result<Decision, RatingError> {
        write!(self.output, "{}", render_side_by_side(request))?;
        loop {
            write!(
                self.output,
                "Same change? [y]es [n]o [s]kip [q]uit and save [d]iscard: "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(Decision::HaltAndSave);
            }
            if let Some(decision) = Decision::from_answer(&line) {
                return Ok(decision);
            }
            writeln!(self.output, "Please answer y, n, s, q or d.")?;
        }
    }
}

/// Two-column view of a pair: header, message lines, then each file with
/// its hunks.
pub fn render_side_by_side(request: &ReviewRequest<'_>) -> String {
    let left = describe(request.original, request.original_patch);
    let right = describe(request.candidate, request.candidate_patch);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n[{}/{}] {}  combined={:.3}",
        request.position, request.queue_len, request.rating, request.combined
    );
    let _ = writeln!(out, "{}", "─".repeat(COLUMN_WIDTH * 2 + 3));
    for i in 0..left.len().max(right.len()) {
        let l = left.get(i).map_or("", String::as_str);
        let r = right.get(i).map_or("", String::as_str);
        let _ = writeln!(out, "{:<width$} │ {}", clip(l), clip(r), width = COLUMN_WIDTH);
    }
    out
}

fn describe(id: &PatchId, patch: Option<&Patch>) -> Vec<String> {
    let mut lines = vec![id.to_string()];
    let Some(patch) = patch else {
        lines.push("<no content>".to_string());
        return lines;
    };
    lines.push(patch.author_date.format("%Y-%m-%d %H:%M").to_string());
    lines.push(String::new());
    lines.extend(patch.message.iter().cloned());
    lines.push(String::new());
    for (file, hunks) in &patch.diff.files {
        let (ins, del) = hunks.values().fold((0, 0), |(i, d), h| {
            (i + h.insertions.len(), d + h.deletions.len())
        });
        lines.push(format!("{file} +{ins} -{del}"));
        for (heading, hunk) in hunks {
            lines.push(heading.clone());
            lines.extend(hunk.deletions.iter().map(|l| format!("-{}", l.replace('\t', "    "))));
            lines.extend(hunk.insertions.iter().map(|l| format!("+{}", l.replace('\t', "    "))));
        }
    }
    lines
}

fn clip(s: &str) -> String {
    if s.chars().count() <= COLUMN_WIDTH {
        s.to_string()
    } else {
        let mut clipped: String = s.chars().take(COLUMN_WIDTH - 1).collect();
        clipped.push('…');
        clipped
    }
}

// ── Scripted ───────────────────────────────────────────────────────

/// Replays a fixed list of decisions, then skips everything else.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    decisions: VecDeque<Decision>,
    /// Every pair that was presented, in order.
    pub asked: Vec<(PatchId, PatchId)>,
}

impl ScriptedDecisions {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            asked: Vec::new(),
        }
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(&mut self, request: &ReviewRequest<'_>) -> Result<Decision, RatingError> {
        self.asked
            .push((request.original.clone(), request.candidate.clone()));
        Ok(self.decisions.pop_front().unwrap_or(Decision::Skip))
    }
}

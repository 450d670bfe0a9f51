// Integration test utilities and synthetic corpus fixtures for PaStA.

use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};

use pasta_core::cluster::{ClusterStore, FalsePositives};
use pasta_core::config::{PastaConfig, Thresholds};
use pasta_core::corpus::{PatchSnapshot, Stack};
use pasta_core::evaluate::{AnalysisMode, EvaluationResult, analyse};
use pasta_core::progress::NoopReporter;
use pasta_core::rating::{DecisionSource, RatingSession, SessionReport};
use pasta_core::similarity::TokenSortRatio;
use pasta_core::types::{Diff, Hunk, Patch, PatchId};

// ── Corpus builder ───────────────────────────────────────────────

/// Builds a [`PatchSnapshot`] one patch at a time. Each patch is authored
/// one day after the previous one.
#[derive(Debug)]
pub struct CorpusBuilder {
    snapshot: PatchSnapshot,
    next_date: DateTime<Utc>,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self {
            snapshot: PatchSnapshot::default(),
            next_date: Utc
                .with_ymd_and_hms(2016, 1, 1, 0, 0, 0)
                .single()
                .expect("valid date"),
        }
    }

    /// Add a patch changing one hunk of `file`.
    pub fn patch(mut self, id: &str, subject: &str, file: &str, added: &[&str], removed: &[&str]) -> Self {
        let mut diff = Diff::default();
        diff.add_hunk(
            file,
            "@@ -10,6 +10,7 @@",
            Hunk {
                insertions: added.iter().map(|l| (*l).to_string()).collect(),
                deletions: removed.iter().map(|l| (*l).to_string()).collect(),
            },
        );
        let patch = Patch::new(vec![subject.to_string()], diff, self.next_date);
        self.snapshot.insert(id, patch);
        self.next_date += Duration::days(1);
        self
    }

    pub fn stack(mut self, name: &str, ids: &[&str]) -> Self {
        self.snapshot.stacks.push(Stack {
            name: name.to_string(),
            patches: ids.iter().map(|id| PatchId::from(*id)).collect(),
        });
        self
    }

    pub fn upstream(mut self, ids: &[&str]) -> Self {
        self.snapshot
            .upstream
            .extend(ids.iter().map(|id| PatchId::from(*id)));
        self
    }

    pub fn build(self) -> PatchSnapshot {
        self.snapshot
    }
}

/// Two releases of a downstream tree plus upstream history.
///
/// - `fix1` / `fix1b` / `up1`: the same fix, byte for byte
/// - `feat1` / `feat1b`: same diff, reworded subject
/// - `misc1` / `misc2` / `up2`: unrelated changes to other files
pub fn kernel_like() -> PatchSnapshot {
    let fix_added = ["\tdev_put(dev);", "\treturn err;"];
    let fix_removed = ["\treturn err;"];
    let feat_added = ["\tif (dl_task(p))", "\t\treturn p->dl.deadline;"];

    CorpusBuilder::new()
        .patch("fix1", "net: fix refcount leak in probe", "net/core/dev.c", &fix_added, &fix_removed)
        .patch("feat1", "sched: add deadline helper", "kernel/sched/core.c", &feat_added, &[])
        .patch("misc1", "mm: account slab pages", "mm/slab.c", &["\tnr_slab++;"], &[])
        .patch("up1", "net: fix refcount leak in probe", "net/core/dev.c", &fix_added, &fix_removed)
        .patch("fix1b", "net: fix refcount leak in probe", "net/core/dev.c", &fix_added, &fix_removed)
        .patch(
            "feat1b",
            "sched/core: introduce helper for deadline tasks",
            "kernel/sched/core.c",
            &feat_added,
            &[],
        )
        .patch("misc2", "mm: drop unused gfp flag", "mm/page_alloc.c", &[], &["\tgfp |= __GFP_COLD;"])
        .patch("up2", "Documentation: fix typo", "Documentation/README", &["the"], &["teh"])
        .stack("v4.4-rt1", &["fix1", "feat1", "misc1"])
        .stack("v4.4-rt2", &["fix1b", "feat1b", "misc2"])
        .upstream(&["up1", "up2"])
        .build()
}

// ── Pipeline fixture ─────────────────────────────────────────────

/// A temporary project directory holding the snapshot, the cluster file,
/// the false-positive memory and the evaluation result.
#[derive(Debug)]
pub struct Pipeline {
    pub dir: tempfile::TempDir,
    pub snapshot: PatchSnapshot,
    pub config: PastaConfig,
}

impl Pipeline {
    pub fn new(snapshot: PatchSnapshot) -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        let mut config = PastaConfig::default();
        config.paths = config.paths.resolve(dir.path());
        snapshot
            .save(&config.paths.snapshot)
            .expect("write snapshot");
        Self {
            dir,
            snapshot,
            config,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Persisted store, seeded with every snapshot id.
    pub fn load_store(&self) -> ClusterStore {
        let mut store =
            ClusterStore::from_file(&self.config.paths.clusters, false).expect("load clusters");
        self.snapshot.seed_store(&mut store);
        store
    }

    pub fn load_false_positives(&self) -> FalsePositives {
        FalsePositives::load(&self.config.paths.false_positives, false).expect("load false positives")
    }

    /// Analyse against the persisted store and save the result.
    pub fn analyse(&self, mode: AnalysisMode) -> EvaluationResult {
        let store = self.load_store();
        let result = analyse(
            mode,
            &self.snapshot,
            &store,
            &self.config.thresholds,
            &TokenSortRatio::default(),
            &NoopReporter,
        );
        result
            .save(&self.config.paths.evaluation)
            .expect("save evaluation");
        result
    }

    /// Rate `result` against the persisted state and write it back unless
    /// the session was discarded.
    pub fn rate(&self, result: &EvaluationResult, decisions: &mut dyn DecisionSource) -> SessionReport {
        let mut store = self.load_store();
        let mut false_positives = self.load_false_positives();
        let report = RatingSession::new(
            &mut store,
            &mut false_positives,
            &self.snapshot,
            self.config.thresholds,
        )
        .check_commit_date(self.config.analysis.check_commit_date)
        .run(result, decisions)
        .expect("rating session");

        if report.end.should_persist() {
            store
                .to_file(&self.config.paths.clusters)
                .expect("write clusters");
            false_positives
                .save(&self.config.paths.false_positives)
                .expect("write false positives");
        }
        report
    }

    pub fn clusters_text(&self) -> String {
        std::fs::read_to_string(&self.config.paths.clusters).unwrap_or_default()
    }
}

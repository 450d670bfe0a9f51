// Patch corpus: the content provider and id enumeration the core works over.
//
// A snapshot is loaded once, before any parallel pass, and only read from
// then on, so it can be shared across rayon workers without locking.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cluster::ClusterStore;
use crate::error::CorpusError;
use crate::types::{Patch, PatchId};

/// Lookup of patch content by identifier.
pub trait PatchProvider: Sync {
    fn patch(&self, id: &str) -> Option<&Patch>;

    /// Like [`patch`](Self::patch) but reports unknown ids as an error.
    fn require(&self, id: &str) -> Result<&Patch, CorpusError> {
        self.patch(id)
            .ok_or_else(|| CorpusError::UnknownPatch(id.to_string()))
    }
}

/// A named, ordered list of patches: one branch, release, or mailbox window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stack {
    pub name: String,
    pub patches: Vec<PatchId>,
}

/// Immutable in-memory corpus produced by an external ingestion step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchSnapshot {
    #[serde(default)]
    pub patches: HashMap<PatchId, Patch>,
    #[serde(default)]
    pub stacks: Vec<Stack>,
    /// Landed patches, e.g. commits on the mainline branch.
    #[serde(default)]
    pub upstream: Vec<PatchId>,
}

impl PatchProvider for PatchSnapshot {
    fn patch(&self, id: &str) -> Option<&Patch> {
        self.patches.get(id)
    }
}

impl PatchSnapshot {
    pub fn from_json(text: &str) -> Result<Self, CorpusError> {
        let mut snapshot: Self = serde_json::from_str(text)?;
        for patch in snapshot.patches.values_mut() {
            patch.normalize();
        }
        Ok(snapshot)
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::NotFound(path.display().to_string()));
        }
        let snapshot = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            patches = snapshot.patches.len(),
            stacks = snapshot.stacks.len(),
            upstream = snapshot.upstream.len(),
            "Loaded patch snapshot"
        );
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<(), CorpusError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn insert(&mut self, id: &str, mut patch: Patch) {
        patch.normalize();
        self.patches.insert(PatchId::from(id), patch);
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Every id that appears on a stack, in stack order, without repeats.
    pub fn downstream_ids(&self) -> Vec<PatchId> {
        let mut seen = BTreeSet::new();
        self.stacks
            .iter()
            .flat_map(|stack| stack.patches.iter())
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    pub fn upstream_ids(&self) -> &[PatchId] {
        &self.upstream
    }

    /// Every downstream and upstream id: the universe to seed the store with.
    pub fn all_ids(&self) -> Vec<PatchId> {
        let mut ids = self.downstream_ids();
        let known: BTreeSet<PatchId> = ids.iter().cloned().collect();
        ids.extend(self.upstream.iter().filter(|id| !known.contains(*id)).cloned());
        ids
    }

    /// Track every id as at least a singleton and mark the upstream ones.
    /// Returns how many ids were not tracked before.
    pub fn seed_store(&self, store: &mut ClusterStore) -> usize {
        let before = store.id_count();
        for id in self.downstream_ids() {
            store.insert_single(id.as_str());
        }
        for id in &self.upstream {
            store.mark_upstream(id.as_str(), true);
        }
        store.id_count() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "patches": {
            "c1": {
                "message": ["mm: fix leak"],
                "diff": {"mm/slab.c": {"@@ kfree": {"insertions": ["+x"], "deletions": ["-y"]}}},
                "author_date": "2020-05-01T10:00:00Z"
            },
            "u1": {
                "message": ["Revert \"mm: fix leak\""],
                "author_date": "2020-06-01T10:00:00Z",
                "is_revert": true,
                "affected_files": ["mm/slab.c"]
            }
        },
        "stacks": [
            {"name": "v1", "patches": ["c1"]},
            {"name": "v2", "patches": ["c1", "c2"]}
        ],
        "upstream": ["u1", "c2"]
    }"#;

    #[test]
    fn parses_and_normalizes() {
        let snapshot = PatchSnapshot::from_json(SNAPSHOT).unwrap();
        let c1 = snapshot.patch("c1").unwrap();
        assert!(c1.affected_files.contains("mm/slab.c"));
        assert_eq!(c1.diff.changed_lines(), 2);
        assert!(snapshot.patch("u1").unwrap().is_revert);
        assert!(snapshot.patch("nope").is_none());
        assert!(matches!(
            snapshot.require("nope"),
            Err(CorpusError::UnknownPatch(_))
        ));
    }

    #[test]
    fn enumerates_ids() {
        let snapshot = PatchSnapshot::from_json(SNAPSHOT).unwrap();
        let down: Vec<String> = snapshot.downstream_ids().into_iter().map(|i| i.0).collect();
        assert_eq!(down, ["c1", "c2"]);
        let all: Vec<String> = snapshot.all_ids().into_iter().map(|i| i.0).collect();
        assert_eq!(all, ["c1", "c2", "u1"]);
    }

    #[test]
    fn seeds_store_with_upstream_marks() {
        let snapshot = PatchSnapshot::from_json(SNAPSHOT).unwrap();
        let mut store = ClusterStore::new();
        store.insert(["c1", "old"]);
        assert_eq!(snapshot.seed_store(&mut store), 2);
        assert!(store.is_upstream("u1"));
        assert!(store.is_upstream("c2"));
        assert!(store.is_related(["c1", "old"]));
        assert_eq!(snapshot.seed_store(&mut store), 0);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = PatchSnapshot::load(&tmp.path().join("p.json")).unwrap_err();
        assert!(matches!(err, CorpusError::NotFound(_)));
    }

    #[test]
    fn bad_json_is_parse_error() {
        assert!(matches!(
            PatchSnapshot::from_json("{\"patches\": 3}"),
            Err(CorpusError::Parse(_))
        ));
    }

    #[test]
    fn save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("p.json");
        let snapshot = PatchSnapshot::from_json(SNAPSHOT).unwrap();
        snapshot.save(&path).unwrap();
        let loaded = PatchSnapshot::load(&path).unwrap();
        assert_eq!(loaded.patches.len(), 2);
        assert_eq!(loaded.all_ids(), snapshot.all_ids());
    }
}

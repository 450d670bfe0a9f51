use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::error::ClusterError;
use crate::types::PatchId;

use super::ClusterStore;

/// Pairs a human declined, keyed by the original's cluster representative.
///
/// Lookups expand both sides to their current clusters, so an entry keeps
/// suppressing a pair after either side has been merged with other patches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FalsePositives {
    entries: BTreeMap<PatchId, BTreeSet<PatchId>>,
}

impl FalsePositives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `original` and `candidate` must never be auto-merged.
    pub fn mark(&mut self, store: &ClusterStore, original: &str, candidate: &str) {
        let key = store
            .representative(original)
            .cloned()
            .unwrap_or_else(|| PatchId::from(original));
        self.entries
            .entry(key)
            .or_default()
            .insert(PatchId::from(candidate));
    }

    /// Whether any member of `a`'s cluster was declined against any member
    /// of `b`'s cluster, in either direction.
    pub fn is_false_positive(&self, store: &ClusterStore, a: &str, b: &str) -> bool {
        let side_a = members(store, a);
        let side_b = members(store, b);
        self.any_entry(&side_a, &side_b) || self.any_entry(&side_b, &side_a)
    }

    fn any_entry(&self, keys: &BTreeSet<PatchId>, values: &BTreeSet<PatchId>) -> bool {
        keys.iter().any(|key| {
            self.entries
                .get(key)
                .is_some_and(|declined| !declined.is_disjoint(values))
        })
    }

    /// Number of recorded pairs.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, declined) in &self.entries {
            if declined.is_empty() {
                continue;
            }
            out.push_str(key.as_str());
            for id in declined {
                out.push(' ');
                out.push_str(id.as_str());
            }
            out.push('\n');
        }
        out
    }

    /// Parse `<representative> <declined ids...>` lines.
    pub fn from_text(text: &str) -> Self {
        let mut memory = Self::new();
        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let declined: BTreeSet<PatchId> = tokens.map(PatchId::from).collect();
            if declined.is_empty() {
                continue;
            }
            memory
                .entries
                .entry(PatchId::from(key))
                .or_default()
                .extend(declined);
        }
        memory
    }

    pub fn load(path: &Path, must_exist: bool) -> Result<Self, ClusterError> {
        if !path.exists() {
            if must_exist {
                return Err(ClusterError::NotFound(path.display().to_string()));
            }
            warn!(path = %path.display(), "False-positive file not found, starting empty");
            return Ok(Self::new());
        }
        let memory = Self::from_text(&std::fs::read_to_string(path)?);
        debug!(path = %path.display(), pairs = memory.len(), "Loaded false positives");
        Ok(memory)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClusterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

fn members(store: &ClusterStore, id: &str) -> BTreeSet<PatchId> {
    store
        .cluster_of(id)
        .cloned()
        .unwrap_or_else(|| BTreeSet::from([PatchId::from(id)]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_pair_is_symmetric() {
        let mut store = ClusterStore::new();
        store.insert_single("a");
        store.insert_single("b");
        let mut fp = FalsePositives::new();
        fp.mark(&store, "a", "b");

        assert!(fp.is_false_positive(&store, "a", "b"));
        assert!(fp.is_false_positive(&store, "b", "a"));
        assert!(!fp.is_false_positive(&store, "a", "c"));
    }

    #[test]
    fn survives_merges_on_either_side() {
        let mut store = ClusterStore::new();
        store.insert_single("orig");
        store.insert_single("cand");
        let mut fp = FalsePositives::new();
        fp.mark(&store, "orig", "cand");

        store.insert(["orig", "orig-v2"]);
        store.insert(["cand", "cand-v2"]);
        assert!(fp.is_false_positive(&store, "orig-v2", "cand-v2"));
        assert!(fp.is_false_positive(&store, "cand-v2", "orig"));
    }

    #[test]
    fn keyed_by_representative() {
        let mut store = ClusterStore::new();
        store.insert(["b", "a"]);
        let mut fp = FalsePositives::new();
        fp.mark(&store, "b", "z");
        assert_eq!(fp.to_text(), "a z\n");
    }

    #[test]
    fn text_round_trip_and_merge_lines() {
        let fp = FalsePositives::from_text("a x y\nlonely\n\na z\n");
        assert_eq!(fp.len(), 3);
        assert_eq!(fp.to_text(), "a x y z\n");
    }

    #[test]
    fn file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fp");
        assert!(FalsePositives::load(&path, false).unwrap().is_empty());
        assert!(FalsePositives::load(&path, true).is_err());

        let store = ClusterStore::new();
        let mut fp = FalsePositives::new();
        fp.mark(&store, "m1", "m2");
        fp.save(&path).unwrap();
        assert_eq!(FalsePositives::load(&path, true).unwrap(), fp);
    }
}

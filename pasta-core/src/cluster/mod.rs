// Disjoint-set clustering of patch identities with upstream marking.
//
// Clusters live in an arena of slots indexed by `usize`. Merges move members
// into the lowest involved slot and leave the other slots empty; `optimize`
// compacts the arena and rebuilds the lookup table.

mod false_positive;
mod persist;

pub use false_positive::FalsePositives;

use std::collections::{BTreeSet, HashMap};

use crate::types::PatchId;

/// Partition of all tracked patch ids into clusters of "the same" change.
///
/// Every tracked id belongs to exactly one cluster. Upstream marking is a
/// separate set over tracked ids and survives moves between clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterStore {
    clusters: Vec<BTreeSet<PatchId>>,
    lookup: HashMap<PatchId, usize>,
    upstream: BTreeSet<PatchId>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Insertion and merging ──────────────────────────────────────

    /// Track `id` as a singleton cluster. Returns the existing slot if
    /// `id` is already tracked.
    pub fn insert_single(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.lookup.get(id) {
            return idx;
        }
        let idx = self.clusters.len();
        let id = PatchId::from(id);
        self.clusters.push(BTreeSet::from([id.clone()]));
        self.lookup.insert(id, idx);
        idx
    }

    /// Track every id and merge their clusters into one.
    ///
    /// The merge target is the lowest involved slot, which keeps the slot
    /// order reproducible. Returns `None` for an empty id list.
    pub fn insert<I, S>(&mut self, ids: I) -> Option<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: BTreeSet<usize> = ids
            .into_iter()
            .map(|id| self.insert_single(id.as_ref()))
            .collect();
        let target = slots.pop_first()?;

        for idx in slots {
            let members = std::mem::take(&mut self.clusters[idx]);
            for member in &members {
                self.lookup.insert(member.clone(), target);
            }
            self.clusters[target].extend(members);
        }
        self.trim_tail();
        Some(target)
    }

    /// True iff every id is tracked and all share one cluster.
    pub fn is_related<I, S>(&self, ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slot = None;
        for id in ids {
            let Some(&idx) = self.lookup.get(id.as_ref()) else {
                return false;
            };
            match slot {
                None => slot = Some(idx),
                Some(prev) if prev != idx => return false,
                Some(_) => {}
            }
        }
        slot.is_some()
    }

    // ── Removal and rip-up ─────────────────────────────────────────

    /// Stop tracking `id` and clear its upstream mark. The remaining members
    /// of its cluster stay together. Returns whether `id` was tracked.
    pub fn remove_element(&mut self, id: &str) -> bool {
        self.upstream.remove(id);
        let Some(idx) = self.lookup.remove(id) else {
            return false;
        };
        self.clusters[idx].remove(id);
        self.trim_tail();
        true
    }

    /// Dissolve the cluster containing `representative` into singletons.
    ///
    /// Returns the former members so the caller can re-evaluate them.
    /// Upstream marks are kept. Untracked ids yield an empty set.
    pub fn ripup_cluster(&mut self, representative: &str) -> BTreeSet<PatchId> {
        let Some(&idx) = self.lookup.get(representative) else {
            return BTreeSet::new();
        };
        let members = std::mem::take(&mut self.clusters[idx]);
        for member in &members {
            self.lookup.remove(member);
        }
        for member in &members {
            self.insert_single(member.as_str());
        }
        members
    }

    // ── Upstream marking ───────────────────────────────────────────

    /// Add (`flag = true`) or remove `id` from the upstream marking.
    ///
    /// Marking an untracked id starts tracking it as a singleton.
    pub fn mark_upstream(&mut self, id: &str, flag: bool) {
        if flag {
            self.insert_single(id);
            self.upstream.insert(PatchId::from(id));
        } else {
            self.upstream.remove(id);
        }
    }

    pub fn is_upstream(&self, id: &str) -> bool {
        self.upstream.contains(id)
    }

    /// Upstream members of `id`'s cluster, or every upstream id for `None`.
    pub fn get_upstream(&self, id: Option<&str>) -> BTreeSet<PatchId> {
        match id {
            Some(id) => self
                .cluster_of(id)
                .map(|cluster| cluster.intersection(&self.upstream).cloned().collect())
                .unwrap_or_default(),
            None => self.upstream.clone(),
        }
    }

    /// Downstream members of `id`'s cluster, or every tracked id that is not
    /// upstream for `None`.
    pub fn get_downstream(&self, id: Option<&str>) -> BTreeSet<PatchId> {
        match id {
            Some(id) => self
                .cluster_of(id)
                .map(|cluster| cluster.difference(&self.upstream).cloned().collect())
                .unwrap_or_default(),
            None => self
                .lookup
                .keys()
                .filter(|id| !self.upstream.contains(*id))
                .cloned()
                .collect(),
        }
    }

    // ── Enumeration ────────────────────────────────────────────────

    /// `(downstream, upstream)` members of every non-empty cluster, each
    /// half in sorted order. Calling again restarts the enumeration.
    pub fn iter_split(&self) -> impl Iterator<Item = (Vec<&PatchId>, Vec<&PatchId>)> + '_ {
        self.clusters
            .iter()
            .filter(|cluster| !cluster.is_empty())
            .map(|cluster| {
                let (downstream, upstream): (Vec<&PatchId>, Vec<&PatchId>) = cluster
                    .iter()
                    .partition(|id| !self.upstream.contains(id.as_str()));
                (downstream, upstream)
            })
    }

    /// Non-empty clusters in slot order.
    pub fn clusters(&self) -> impl Iterator<Item = &BTreeSet<PatchId>> + '_ {
        self.clusters.iter().filter(|cluster| !cluster.is_empty())
    }

    /// Every tracked id, unordered.
    pub fn ids(&self) -> impl Iterator<Item = &PatchId> + '_ {
        self.lookup.keys()
    }

    pub fn cluster_of(&self, id: &str) -> Option<&BTreeSet<PatchId>> {
        self.lookup.get(id).map(|&idx| &self.clusters[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    /// Lexicographically smallest member of `id`'s cluster.
    pub fn representative(&self, id: &str) -> Option<&PatchId> {
        self.cluster_of(id).and_then(|cluster| cluster.first())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lookup.contains_key(id)
    }

    /// Number of non-empty clusters.
    pub fn len(&self) -> usize {
        self.clusters().count()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Number of tracked ids.
    pub fn id_count(&self) -> usize {
        self.lookup.len()
    }

    /// Pick one downstream representative per cluster.
    ///
    /// Members are folded in sorted order; `prefer(candidate, current)`
    /// returning true replaces the current pick, so ties keep the first
    /// element. Clusters without downstream members contribute nothing.
    pub fn get_representative_system<F>(&self, prefer: F) -> BTreeSet<PatchId>
    where
        F: Fn(&PatchId, &PatchId) -> bool,
    {
        self.iter_split()
            .filter_map(|(downstream, _)| {
                let mut members = downstream.into_iter();
                let first = members.next()?;
                Some(members.fold(first, |current, candidate| {
                    if prefer(candidate, current) {
                        candidate
                    } else {
                        current
                    }
                }))
            })
            .cloned()
            .collect()
    }

    // ── Maintenance ────────────────────────────────────────────────

    /// Drop empty slots and rebuild the lookup table from scratch.
    ///
    /// Idempotent. Panics if an id sits in more than one cluster, since
    /// that means the partition has been corrupted.
    pub fn optimize(&mut self) {
        let clusters: Vec<BTreeSet<PatchId>> = std::mem::take(&mut self.clusters)
            .into_iter()
            .filter(|cluster| !cluster.is_empty())
            .collect();

        let mut lookup = HashMap::with_capacity(self.lookup.len());
        for (idx, cluster) in clusters.iter().enumerate() {
            for id in cluster {
                let previous = lookup.insert(id.clone(), idx);
                assert!(
                    previous.is_none(),
                    "partition invariant violated: {id} appears in more than one cluster"
                );
            }
        }

        self.clusters = clusters;
        self.lookup = lookup;
        self.upstream.retain(|id| self.lookup.contains_key(id));
    }

    /// Number of allocated slots, including empty ones.
    pub fn slot_count(&self) -> usize {
        self.clusters.len()
    }

    fn trim_tail(&mut self) {
        while self.clusters.last().is_some_and(BTreeSet::is_empty) {
            self.clusters.pop();
        }
    }
}

// Line-oriented text format for the cluster store.
//
//   <downstream ids...> [=> <upstream ids...>]
//
// One cluster per line. Lines with downstream members come first, sorted by
// their downstream id list; pure-upstream lines follow, sorted likewise.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::ClusterError;
use crate::types::PatchId;

use super::ClusterStore;

/// Separator between the downstream and upstream halves of a line.
pub const SEPARATOR: &str = "=>";

impl ClusterStore {
    /// Render every non-empty cluster in the canonical sorted text form.
    pub fn to_text(&self) -> String {
        let (mut mixed, mut pure_upstream): (Vec<_>, Vec<_>) = self
            .iter_split()
            .partition(|(downstream, _)| !downstream.is_empty());
        mixed.sort();
        pure_upstream.sort();

        let mut out = String::new();
        for (downstream, upstream) in mixed.iter().chain(pure_upstream.iter()) {
            out.push_str(&format_line(downstream, upstream));
            out.push('\n');
        }
        out
    }

    /// Parse the text form. Every line becomes one cluster; ids right of the
    /// separator are additionally marked upstream.
    pub fn from_text(text: &str) -> Result<Self, ClusterError> {
        let mut store = Self::new();
        for (n, line) in text.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            let separators = tokens.iter().filter(|t| **t == SEPARATOR).count();
            let (downstream, upstream) = match separators {
                0 => (tokens.as_slice(), &[][..]),
                1 => {
                    let pos = tokens
                        .iter()
                        .position(|t| *t == SEPARATOR)
                        .unwrap_or(tokens.len());
                    (&tokens[..pos], &tokens[pos + 1..])
                }
                _ => {
                    return Err(ClusterError::Malformed {
                        line: n + 1,
                        content: line.to_string(),
                    });
                }
            };

            store.insert(downstream.iter().chain(upstream));
            for id in upstream {
                store.mark_upstream(id, true);
            }
        }
        store.optimize();
        Ok(store)
    }

    /// Load a cluster file.
    ///
    /// A missing file gives an empty store with a warning unless
    /// `must_exist`, in which case it is an error.
    pub fn from_file(path: &Path, must_exist: bool) -> Result<Self, ClusterError> {
        if !path.exists() {
            if must_exist {
                return Err(ClusterError::NotFound(path.display().to_string()));
            }
            warn!(path = %path.display(), "Cluster file not found, starting empty");
            return Ok(Self::new());
        }
        let text = std::fs::read_to_string(path)?;
        let store = Self::from_text(&text)?;
        debug!(
            path = %path.display(),
            clusters = store.len(),
            ids = store.id_count(),
            "Loaded clusters"
        );
        Ok(store)
    }

    /// Optimize, then write the canonical text form to `path`.
    pub fn to_file(&mut self, path: &Path) -> Result<(), ClusterError> {
        self.optimize();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_text())?;
        debug!(path = %path.display(), clusters = self.len(), "Saved clusters");
        Ok(())
    }
}

fn format_line(downstream: &[&PatchId], upstream: &[&PatchId]) -> String {
    let join = |ids: &[&PatchId]| {
        ids.iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };
    match (downstream.is_empty(), upstream.is_empty()) {
        (_, true) => join(downstream),
        (true, false) => format!("{SEPARATOR} {}", join(upstream)),
        (false, false) => format!("{} {SEPARATOR} {}", join(downstream), join(upstream)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn partition(store: &ClusterStore) -> BTreeSet<BTreeSet<PatchId>> {
        store.clusters().cloned().collect()
    }

    #[test]
    fn mixed_and_pure_upstream_lines() {
        let mut store = ClusterStore::new();
        store.insert(["p2", "p1", "u1"]);
        store.mark_upstream("u1", true);
        store.mark_upstream("u2", true);

        insta::assert_snapshot!(store.to_text().trim_end(), @r"
        p1 p2 => u1
        => u2
        ");
    }

    #[test]
    fn lines_sorted_by_downstream_list() {
        let mut store = ClusterStore::new();
        store.mark_upstream("z-up", true);
        store.insert(["m1", "m2"]);
        store.insert_single("b");
        store.insert(["a9", "up"]);
        store.mark_upstream("up", true);
        store.mark_upstream("a-up", true);

        insta::assert_snapshot!(store.to_text().trim_end(), @r"
        a9 => up
        b
        m1 m2
        => a-up
        => z-up
        ");
    }

    #[test]
    fn parse_marks_right_half_upstream() {
        let store = ClusterStore::from_text("a b => c d\n\n=> e\nf\n").unwrap();
        assert!(store.is_related(["a", "b", "c", "d"]));
        assert!(store.is_upstream("c"));
        assert!(store.is_upstream("e"));
        assert!(!store.is_upstream("a"));
        assert!(!store.is_upstream("f"));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn double_separator_is_malformed() {
        let err = ClusterStore::from_text("a\nb => c => d\n").unwrap_err();
        match err {
            ClusterError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/patch-groups");

        let mut store = ClusterStore::new();
        store.insert(["x1", "x2"]);
        store.insert(["y1", "y2", "y3"]);
        store.insert_single("lonely");
        store.mark_upstream("y3", true);
        store.remove_element("x2");
        store.to_file(&path).unwrap();

        let loaded = ClusterStore::from_file(&path, true).unwrap();
        assert_eq!(partition(&loaded), partition(&store));
        assert_eq!(loaded.get_upstream(None), store.get_upstream(None));
    }

    #[test]
    fn missing_file_soft_and_hard() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("absent");
        assert!(ClusterStore::from_file(&path, false).unwrap().is_empty());
        assert!(matches!(
            ClusterStore::from_file(&path, true),
            Err(ClusterError::NotFound(_))
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn text_round_trip(
                groups in proptest::collection::vec(
                    proptest::collection::vec("[a-f0-9]{1,8}", 1..5),
                    0..12,
                ),
                upstream in proptest::collection::vec("[a-f0-9]{1,8}", 0..6),
            ) {
                let mut store = ClusterStore::new();
                for group in &groups {
                    store.insert(group);
                }
                for id in &upstream {
                    store.mark_upstream(id, true);
                }

                let text = store.to_text();
                let loaded = ClusterStore::from_text(&text).unwrap();
                prop_assert_eq!(partition(&loaded), partition(&store));
                prop_assert_eq!(loaded.get_upstream(None), store.get_upstream(None));
                prop_assert_eq!(loaded.to_text(), text);
            }
        }
    }
}

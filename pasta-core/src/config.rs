use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Top-level PaStA configuration, matching `pasta.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PastaConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub paths: PathsSection,
}

/// Heuristic gates for pre-selection, rating, and the interactive driver.
///
/// The numeric defaults are empirical and meant to be tuned per project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Combined rating at or above which a pair merges without asking.
    pub autoaccept: f64,
    /// Combined rating below which a pair is declined without asking.
    pub interactive: f64,
    /// Minimum size ratio of the two diffs before any scoring happens.
    pub diff_lines_ratio: f64,
    /// Minimum similarity for two hunk headings to be paired.
    pub heading: f64,
    /// Minimum similarity for two file names to be paired. `1.0` means exact.
    pub filename: f64,
    /// Weight of the message similarity in the combined rating.
    pub message_diff_weight: f64,
    /// Maximum author-date distance in days for exact pre-selection. `0` = unbounded.
    pub author_date_interval: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            autoaccept: 0.82,
            interactive: 0.75,
            diff_lines_ratio: 0.3,
            heading: 0.86,
            filename: 1.0,
            message_diff_weight: 0.3,
            author_date_interval: 0,
        }
    }
}

impl Thresholds {
    /// Reject values outside `[0, 1]` and an inverted accept/decline band.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounded = [
            ("autoaccept", self.autoaccept),
            ("interactive", self.interactive),
            ("diff_lines_ratio", self.diff_lines_ratio),
            ("heading", self.heading),
            ("filename", self.filename),
            ("message_diff_weight", self.message_diff_weight),
        ];
        for (name, value) in bounded {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "thresholds.{name} = {value} is outside [0, 1]"
                )));
            }
        }
        if self.interactive > self.autoaccept {
            return Err(ConfigError::Invalid(format!(
                "thresholds.interactive ({}) exceeds thresholds.autoaccept ({})",
                self.interactive, self.autoaccept
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Worker threads for scoring passes. `0` lets rayon decide.
    pub workers: usize,
    /// Skip pairs whose original was authored after the candidate.
    pub check_commit_date: bool,
    /// Upper bound for a single fuzzy string comparison.
    pub scorer_timeout_ms: u64,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            workers: 0,
            check_commit_date: false,
            scorer_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub snapshot: PathBuf,
    pub clusters: PathBuf,
    pub false_positives: PathBuf,
    pub evaluation: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            snapshot: "patches.json".into(),
            clusters: "patch-groups".into(),
            false_positives: "false-positives".into(),
            evaluation: "evaluation.json".into(),
        }
    }
}

impl PathsSection {
    /// Resolve relative paths against `base` (the config file's directory).
    pub fn resolve(&self, base: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };
        Self {
            snapshot: join(&self.snapshot),
            clusters: join(&self.clusters),
            false_positives: join(&self.false_positives),
            evaluation: join(&self.evaluation),
        }
    }
}

impl PastaConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.thresholds.validate()?;
        Ok(config)
    }

    /// Load the config at `path`, resolving its `[paths]` against the file's
    /// directory.
    ///
    /// A missing file yields defaults with a warning, unless `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        if !path.exists() {
            if required {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            warn!(path = %path.display(), "Config file not found, using defaults");
            let mut config = Self::default();
            config.paths = config.paths.resolve(base);
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        config.paths = config.paths.resolve(base);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = PastaConfig::from_toml_str("").unwrap();
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(!config.analysis.check_commit_date);
        assert_eq!(config.paths.clusters, PathBuf::from("patch-groups"));
    }

    #[test]
    fn partial_thresholds_keep_other_defaults() {
        let config = PastaConfig::from_toml_str(
            "[thresholds]\nautoaccept = 0.9\nfilename = 0.8\n",
        )
        .unwrap();
        assert!((config.thresholds.autoaccept - 0.9).abs() < f64::EPSILON);
        assert!((config.thresholds.filename - 0.8).abs() < f64::EPSILON);
        assert!((config.thresholds.interactive - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_band_is_rejected() {
        let err = PastaConfig::from_toml_str("[thresholds]\nautoaccept = 0.5\ninteractive = 0.6\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = PastaConfig::from_toml_str("[thresholds]\nheading = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("heading"));
    }

    #[test]
    fn bad_syntax_is_parse_error() {
        let err = PastaConfig::from_toml_str("[thresholds\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_soft_and_hard() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pasta.toml");

        let config = PastaConfig::load(&path, false).unwrap();
        assert_eq!(config.paths.clusters, tmp.path().join("patch-groups"));

        let err = PastaConfig::load(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn paths_resolve_relative_to_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pasta.toml");
        std::fs::write(&path, "[paths]\nclusters = \"out/groups\"\nsnapshot = \"/abs/p.json\"\n")
            .unwrap();
        let config = PastaConfig::load(&path, true).unwrap();
        assert_eq!(config.paths.clusters, tmp.path().join("out/groups"));
        assert_eq!(config.paths.snapshot, PathBuf::from("/abs/p.json"));
    }
}

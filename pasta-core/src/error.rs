/// Top-level PaStA error type.
///
/// All fallible operations in `pasta-core` return [`Result<T, PastaError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum PastaError {
    /// Error reading or writing the cluster store or false-positive memory.
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Error loading the patch corpus snapshot.
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error persisting or loading evaluation results.
    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Error during an interactive rating session.
    #[error("Rating error: {0}")]
    Rating(#[from] RatingError),
}

/// Errors from the cluster store's persisted text format.
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    /// The cluster file was required but does not exist.
    #[error("Cluster file not found: {0}")]
    NotFound(String),

    /// A line carries more than one `=>` separator.
    #[error("Malformed cluster line {line}: {content:?}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// Raw line content.
        content: String,
    },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors loading the patch corpus.
#[derive(thiserror::Error, Debug)]
pub enum CorpusError {
    /// The snapshot file does not exist.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// The snapshot could not be decoded.
    #[error("Snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An identifier has no patch content in the snapshot.
    #[error("Unknown patch: {0}")]
    UnknownPatch(String),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors in PaStA configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors persisting evaluation results.
#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    /// The evaluation result file does not exist.
    #[error("Evaluation result not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while driving an interactive rating session.
#[derive(thiserror::Error, Debug)]
pub enum RatingError {
    /// The decision source failed to read or write.
    #[error("Decision input error: {0}")]
    Input(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, PastaError>`.
pub type Result<T> = std::result::Result<T, PastaError>;

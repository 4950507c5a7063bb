//! Error types for the command-line tool.

use std::path::PathBuf;

/// Errors that can occur while running a command.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// IO error while reading or writing a file.
    #[error("IO error on '{path}': {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("Invalid config file '{path}': {source}")]
    Config {
        /// Path to the config file.
        path: PathBuf,
        /// Parse error.
        source: toml::de::Error,
    },

    /// A config value is out of range.
    #[error("Invalid value for `{key}`: {message}")]
    InvalidSetting {
        /// Setting name.
        key: &'static str,
        /// What was wrong.
        message: String,
    },

    /// No declared schema file was configured.
    #[error("No schema file given; pass --schema or set `schema` in ddlshift.toml")]
    MissingSchema,

    /// The journal and the requested dialect disagree.
    #[error("Migrations in '{path}' were generated for {found}, not {expected}")]
    DialectMismatch {
        /// Migrations folder.
        path: PathBuf,
        /// Dialect requested.
        expected: String,
        /// Dialect recorded in the journal.
        found: String,
    },

    /// A journal entry has no snapshot file.
    #[error("Snapshot for journal entry '{0}' is missing")]
    MissingSnapshot(String),

    /// Strict mode found statements that may lose data.
    #[error("Refusing to write destructive statements without --force:\n{}", .0.iter().map(|s| format!("  - {s}")).collect::<Vec<_>>().join("\n"))]
    Destructive(Vec<String>),

    /// `check` found problems with the migration history.
    #[error("Migration history is inconsistent:\n{}", .0.iter().map(|s| format!("  - {s}")).collect::<Vec<_>>().join("\n"))]
    Inconsistent(Vec<String>),

    /// Error from the diff engine or snapshot codec.
    #[error(transparent)]
    Core(#[from] ddlshift_core::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

//! Error types for schema building, diffing and snapshot handling.

use std::fmt;

use crate::ddl::{EntityKey, EntityKind};

/// A natural-key collision reported by [`Collection::push`](crate::ddl::Collection::push).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} `{key}` already exists")]
pub struct Conflict {
    /// Kind of the rejected entity.
    pub kind: EntityKind,
    /// Natural key shared by the existing and the rejected entity.
    pub key: EntityKey,
}

/// A single problem found while turning an interim schema into a DDL store.
///
/// The builder collects every one of these before returning, so callers can
/// report all naming conflicts in one pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two schemas share a name.
    #[error("schema `{name}` is declared more than once")]
    SchemaNameDuplicate {
        /// Schema name.
        name: String,
    },

    /// Two enums share a name inside one schema.
    #[error("enum `{schema}.{name}` is declared more than once")]
    EnumNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Enum name.
        name: String,
    },

    /// Two sequences share a name inside one schema.
    #[error("sequence `{schema}.{name}` is declared more than once")]
    SequenceNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Sequence name.
        name: String,
    },

    /// Two roles share a name.
    #[error("role `{name}` is declared more than once")]
    RoleDuplicate {
        /// Role name.
        name: String,
    },

    /// Two tables share a name inside one schema.
    #[error("table `{schema}.{name}` is declared more than once")]
    TableNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Table name.
        name: String,
    },

    /// Two columns share a name inside one table.
    #[error("column `{name}` is declared more than once in table `{schema}.{table}`")]
    ColumnNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
        /// Column name.
        name: String,
    },

    /// Two constraints share a name inside one table.
    #[error("constraint `{name}` is declared more than once in table `{schema}.{table}`")]
    ConstraintNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// A table ended up with more than one primary key.
    #[error("table `{schema}.{table}` declares more than one primary key")]
    PrimaryKeyDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Table name.
        table: String,
    },

    /// Two indexes share a name inside one table.
    #[error("index `{name}` is declared more than once in table `{schema}.{table}`")]
    IndexNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
        /// Index name.
        name: String,
    },

    /// An index built only from expressions has no name to fall back on.
    #[error("index on `{schema}.{table}` is built from expressions only and needs an explicit name")]
    IndexWithoutName {
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
    },

    /// Two views share a name inside one schema.
    #[error("view `{schema}.{name}` is declared more than once")]
    ViewNameDuplicate {
        /// Enclosing schema.
        schema: String,
        /// View name.
        name: String,
    },

    /// Two policies share a name on one table.
    #[error("policy `{name}` is declared more than once on table `{schema}.{table}`")]
    PolicyDuplicate {
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
        /// Policy name.
        name: String,
    },

    /// A policy points at a table that does not exist.
    #[error("policy `{name}` is not linked to an existing table (`{schema}.{table}`)")]
    PolicyNotLinked {
        /// Schema the policy names.
        schema: String,
        /// Table the policy names.
        table: String,
        /// Policy name.
        name: String,
    },

    /// A column, constraint or index points at a table that does not exist.
    #[error("{kind} `{name}` refers to unknown table `{schema}.{table}`")]
    UnknownTable {
        /// Kind of the orphaned entity.
        kind: EntityKind,
        /// Schema the entity names.
        schema: String,
        /// Table the entity names.
        table: String,
        /// Entity name.
        name: String,
    },
}

/// An alteration the active dialect cannot express.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedOperation {
    /// Display name of the dialect, e.g. `DSQL`.
    pub dialect: String,
    /// The refused operation, e.g. `ALTER COLUMN TYPE`.
    pub operation: String,
    /// Entity the operation was computed for.
    pub target: String,
}

impl fmt::Display for UnsupportedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} does not support {} (needed for `{}`)",
            self.dialect, self.operation, self.target
        )
    }
}

/// Errors raised while decoding or upgrading a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot carries a version this build does not know.
    #[error("unsupported snapshot version `{0}`")]
    UnsupportedVersion(String),

    /// The JSON does not have the shape its version promises.
    #[error("malformed version {version} snapshot: {detail}")]
    Malformed {
        /// Version being decoded or upgraded when the problem was found.
        version: String,
        /// What was wrong.
        detail: String,
    },

    /// The snapshot belongs to a different dialect than requested.
    #[error("snapshot dialect `{found}` does not match `{expected}`")]
    DialectMismatch {
        /// Dialect the caller asked for.
        expected: String,
        /// Dialect recorded in the snapshot.
        found: String,
    },

    /// Two snapshots in one folder share an id.
    #[error("snapshot id `{0}` appears more than once")]
    DuplicateId(String),

    /// A `prevIds` entry names no known snapshot.
    #[error("snapshot `{id}` points to unknown predecessor `{prev_id}`")]
    UnknownPredecessor {
        /// The snapshot holding the dangling reference.
        id: String,
        /// The id that could not be found.
        prev_id: String,
    },
}

/// Errors that can occur in the core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more interim-schema problems.
    #[error("Schema has {} error(s):\n{}", .0.len(), .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Schema(Vec<SchemaError>),

    /// An entity failed its structural shape check.
    #[error("{kind} failed validation: {detail}")]
    Validation {
        /// Kind of the offending entity.
        kind: EntityKind,
        /// What was wrong.
        detail: String,
    },

    /// Two entities collided on their natural key.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// `one()` found several matches where at most one was expected.
    #[error("expected at most one {kind} matching {filter}, found {count}")]
    AmbiguousLookup {
        /// Kind that was searched.
        kind: EntityKind,
        /// Rendered filter.
        filter: String,
        /// Number of matches.
        count: usize,
    },

    /// The dialect cannot express one or more required operations.
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Unsupported(Vec<UnsupportedOperation>),

    /// A resolver declined to answer; nothing was generated.
    #[error("rename resolution for {kind} was aborted: {reason}")]
    Aborted {
        /// Kind whose resolver call failed.
        kind: EntityKind,
        /// Resolver-provided reason.
        reason: String,
    },

    /// A rename hint is not of the form `old->new`.
    #[error("invalid rename hint `{0}`, expected `old->new`")]
    InvalidRenameHint(String),

    /// Snapshot decoding or upgrading failed.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

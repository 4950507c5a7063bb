//! Persisted schema state.
//!
//! A snapshot is the DDL store of one migration, serialized as a flat entity
//! list together with its id, the ids it descends from, and the renames that
//! produced it. Older on-disk formats are upgraded on load (see [`upgrade`]).

pub mod journal;
pub mod lineage;
pub mod upgrade;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::ddl::{validate_entity, Ddl, Entity};
use crate::dialect::DialectKind;
use crate::error::{Result, SnapshotError};

pub use journal::{Journal, JournalEntry};
pub use upgrade::{Hint, CURRENT_VERSION};

/// The id every first snapshot descends from.
pub const ORIGIN_ID: &str = "00000000-0000-0000-0000-000000000000";

/// One persisted schema state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: String,
    pub dialect: DialectKind,
    pub id: String,
    pub prev_ids: Vec<String>,
    pub ddl: Vec<Entity>,
    /// `from->to` pairs chosen while generating this snapshot.
    #[serde(default)]
    pub renames: Vec<String>,
}

impl Snapshot {
    /// Captures `ddl` under a fresh id.
    #[must_use]
    pub fn new(dialect: DialectKind, ddl: &Ddl, prev_ids: Vec<String>, renames: Vec<String>) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            dialect,
            id: Uuid::new_v4().to_string(),
            prev_ids,
            ddl: ddl.entities(),
            renames,
        }
    }

    /// The empty state a migrations folder starts from.
    #[must_use]
    pub fn origin(dialect: DialectKind) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            dialect,
            id: ORIGIN_ID.to_string(),
            prev_ids: Vec::new(),
            ddl: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot of any known version, upgrading it to the current
    /// one. Hints from the upgrade are returned alongside.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON, or for the reasons listed on
    /// [`Snapshot::from_value`].
    pub fn from_json(json: &str) -> Result<(Self, Vec<Hint>)> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Same as [`Snapshot::from_json`], for an already parsed document.
    ///
    /// # Errors
    ///
    /// Fails when the version is unknown, an upgrade step does not understand
    /// the document, or an entity does not have the current shape.
    pub fn from_value(value: Value) -> Result<(Self, Vec<Hint>)> {
        let (value, hints) = upgrade::upgrade(value)?;

        if let Some(entities) = value.get("ddl").and_then(Value::as_array) {
            for (i, entity) in entities.iter().enumerate() {
                if !validate_entity(entity) {
                    return Err(SnapshotError::Malformed {
                        version: CURRENT_VERSION.to_string(),
                        detail: format!("ddl entry #{i} does not match the shape of its entity type"),
                    }
                    .into());
                }
            }
        }

        let snapshot: Self = serde_json::from_value(value).map_err(|e| SnapshotError::Malformed {
            version: CURRENT_VERSION.to_string(),
            detail: e.to_string(),
        })?;
        debug!(
            id = %snapshot.id,
            dialect = %snapshot.dialect,
            entities = snapshot.ddl.len(),
            hints = hints.len(),
            "loaded snapshot"
        );
        Ok((snapshot, hints))
    }

    /// Rebuilds the DDL store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`](crate::error::Error::Conflict) when two
    /// entities share a natural key.
    pub fn to_ddl(&self) -> Result<Ddl> {
        Ddl::from_entities(self.ddl.iter().cloned())
    }

    /// Fails unless the snapshot was written for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::DialectMismatch`] for any other dialect.
    pub fn expect_dialect(&self, dialect: DialectKind) -> Result<()> {
        if self.dialect == dialect {
            Ok(())
        } else {
            Err(SnapshotError::DialectMismatch {
                expected: dialect.to_string(),
                found: self.dialect.to_string(),
            }
            .into())
        }
    }
}

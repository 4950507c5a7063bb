//! The migrations journal (`meta/_journal.json`).

use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;
use crate::error::Result;

/// Journal format version.
pub const JOURNAL_VERSION: &str = "7";

/// Ordered list of generated migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub version: String,
    pub dialect: DialectKind,
    pub entries: Vec<JournalEntry>,
}

/// One migration in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Position, starting at 0.
    pub idx: u32,
    /// File stem shared by the SQL and snapshot files, e.g. `0003_add_posts`.
    pub tag: String,
    /// Creation time in milliseconds since the epoch.
    pub when: i64,
    pub snapshot_id: String,
    /// Whether statements are separated by breakpoint markers.
    pub breakpoints: bool,
}

impl Journal {
    #[must_use]
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            version: JOURNAL_VERSION.to_string(),
            dialect,
            entries: Vec::new(),
        }
    }

    /// Index the next entry will get.
    #[must_use]
    pub fn next_idx(&self) -> u32 {
        self.entries.last().map_or(0, |e| e.idx + 1)
    }

    /// `NNNN_<name>` for the next entry.
    #[must_use]
    pub fn next_tag(&self, name: &str) -> String {
        format!("{:04}_{}", self.next_idx(), name)
    }

    #[must_use]
    pub fn last(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }

    /// Appends an entry for a freshly written migration.
    pub fn push(&mut self, name: &str, when: i64, snapshot_id: impl Into<String>, breakpoints: bool) -> &JournalEntry {
        let entry = JournalEntry {
            idx: self.next_idx(),
            tag: self.next_tag(name),
            when,
            snapshot_id: snapshot_id.into(),
            breakpoints,
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a journal.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or a journal of another shape.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

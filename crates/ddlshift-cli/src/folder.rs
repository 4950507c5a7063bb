//! The on-disk migrations folder.
//!
//! ```text
//! migrations/
//!   0000_init.sql
//!   0001_add_posts.sql
//!   meta/
//!     _journal.json
//!     0000_snapshot.json
//!     0001_snapshot.json
//! ```

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use ddlshift_core::snapshot::upgrade::{version_of, CURRENT_VERSION};
use ddlshift_core::snapshot::{Hint, Journal, JournalEntry, Snapshot};
use ddlshift_core::DialectKind;

use crate::error::{CliError, Result};

/// Separates statements in a SQL file so they can be run one at a time.
pub const BREAKPOINT: &str = "--> statement-breakpoint";

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    /// Journal tag it belongs to.
    pub tag: String,
    pub snapshot: Snapshot,
    /// Remarks from upgrading an older file.
    pub hints: Vec<Hint>,
}

/// A snapshot file rewritten by [`MigrationsFolder::upgrade_in_place`].
#[derive(Debug, Clone)]
pub struct UpgradedSnapshot {
    pub tag: String,
    /// Version the file had before.
    pub from_version: u32,
    pub hints: Vec<Hint>,
}

/// A migrations folder and its journal.
#[derive(Debug)]
pub struct MigrationsFolder {
    root: PathBuf,
    journal: Journal,
}

impl MigrationsFolder {
    /// Opens `root`, starting an empty journal when none exists yet.
    ///
    /// Fails if the existing journal belongs to another dialect.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, an unreadable journal, or a journal written for
    /// another dialect.
    pub fn open(root: impl Into<PathBuf>, dialect: DialectKind) -> Result<Self> {
        let root = root.into();
        let path = journal_path(&root);
        let journal = if path.is_file() {
            let text = std::fs::read_to_string(&path).map_err(CliError::io(&path))?;
            Journal::from_json(&text)?
        } else {
            Journal::new(dialect)
        };
        if journal.dialect != dialect {
            return Err(CliError::DialectMismatch {
                path: root,
                expected: dialect.to_string(),
                found: journal.dialect.to_string(),
            });
        }
        debug!(root = %root.display(), entries = journal.entries.len(), "opened migrations folder");
        Ok(Self { root, journal })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn journal(&self) -> &Journal {
        &self.journal
    }

    fn snapshot_path(&self, entry: &JournalEntry) -> PathBuf {
        self.root.join("meta").join(format!("{:04}_snapshot.json", entry.idx))
    }

    fn read_snapshot_json(&self, entry: &JournalEntry) -> Result<Value> {
        let path = self.snapshot_path(entry);
        if !path.is_file() {
            return Err(CliError::MissingSnapshot(entry.tag.clone()));
        }
        let text = std::fs::read_to_string(&path).map_err(CliError::io(&path))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Reads and upgrades the snapshot of one journal entry.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or its version cannot be upgraded.
    pub fn read_snapshot(&self, entry: &JournalEntry) -> Result<LoadedSnapshot> {
        let (snapshot, hints) = Snapshot::from_value(self.read_snapshot_json(entry)?)?;
        Ok(LoadedSnapshot {
            tag: entry.tag.clone(),
            snapshot,
            hints,
        })
    }

    /// The state the next migration starts from.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot of the last journal entry cannot be loaded.
    pub fn latest(&self) -> Result<Snapshot> {
        match self.journal.last() {
            Some(entry) => Ok(self.read_snapshot(entry)?.snapshot),
            None => Ok(Snapshot::origin(self.journal.dialect)),
        }
    }

    /// Writes the SQL file and the snapshot of a new migration and appends it
    /// to the journal.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors. Files written before the
    /// failure are left in place.
    pub fn write_migration(
        &mut self,
        name: &str,
        sql: &[String],
        snapshot: &Snapshot,
        breakpoints: bool,
        when: i64,
    ) -> Result<JournalEntry> {
        let meta = self.root.join("meta");
        std::fs::create_dir_all(&meta).map_err(CliError::io(&meta))?;

        let entry = self
            .journal
            .push(name, when, snapshot.id.clone(), breakpoints)
            .clone();

        let sql_path = self.root.join(format!("{}.sql", entry.tag));
        std::fs::write(&sql_path, render_sql(sql, breakpoints)).map_err(CliError::io(&sql_path))?;

        let snapshot_path = self.snapshot_path(&entry);
        std::fs::write(&snapshot_path, snapshot.to_json()?).map_err(CliError::io(&snapshot_path))?;

        self.save_journal()?;
        info!(tag = %entry.tag, path = %sql_path.display(), "wrote migration");
        Ok(entry)
    }

    fn save_journal(&self) -> Result<()> {
        let path = journal_path(&self.root);
        std::fs::write(&path, self.journal.to_json()?).map_err(CliError::io(&path))
    }

    /// Rewrites every snapshot older than the current version.
    ///
    /// # Errors
    ///
    /// Fails when a snapshot cannot be read, upgraded or written back.
    pub fn upgrade_in_place(&self) -> Result<Vec<UpgradedSnapshot>> {
        let mut upgraded = Vec::new();
        for entry in &self.journal.entries {
            let raw = self.read_snapshot_json(entry)?;
            let from_version = version_of(&raw).map_err(ddlshift_core::Error::from)?;
            if from_version == CURRENT_VERSION {
                continue;
            }
            let (snapshot, hints) = Snapshot::from_value(raw)?;
            let path = self.snapshot_path(entry);
            std::fs::write(&path, snapshot.to_json()?).map_err(CliError::io(&path))?;
            info!(tag = %entry.tag, from_version, "upgraded snapshot");
            upgraded.push(UpgradedSnapshot {
                tag: entry.tag.clone(),
                from_version,
                hints,
            });
        }
        Ok(upgraded)
    }
}

fn journal_path(root: &Path) -> PathBuf {
    root.join("meta").join("_journal.json")
}

/// Joins statements into the text of a SQL file.
#[must_use]
pub fn render_sql(statements: &[String], breakpoints: bool) -> String {
    let separator = if breakpoints {
        format!("\n{BREAKPOINT}\n")
    } else {
        "\n\n".to_string()
    };
    let mut text = statements
        .iter()
        .map(|s| format!("{s};"))
        .collect::<Vec<_>>()
        .join(&separator);
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddlshift_core::Ddl;

    #[test]
    fn breakpoints_separate_statements() {
        let sql = vec!["CREATE TABLE a ()".to_string(), "CREATE TABLE b ()".to_string()];
        assert_eq!(
            render_sql(&sql, true),
            "CREATE TABLE a ();\n--> statement-breakpoint\nCREATE TABLE b ();\n"
        );
        assert_eq!(render_sql(&sql, false), "CREATE TABLE a ();\n\nCREATE TABLE b ();\n");
    }

    #[test]
    fn empty_folder_starts_from_origin() {
        let dir = tempfile::tempdir().unwrap();
        let folder = MigrationsFolder::open(dir.path().join("migrations"), DialectKind::Sqlite).unwrap();
        assert!(folder.journal().entries.is_empty());
        let latest = folder.latest().unwrap();
        assert_eq!(latest.id, ddlshift_core::snapshot::ORIGIN_ID);
        assert!(latest.ddl.is_empty());
    }

    #[test]
    fn written_migration_is_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut folder = MigrationsFolder::open(dir.path(), DialectKind::Postgresql).unwrap();
        let snapshot = Snapshot::new(DialectKind::Postgresql, &Ddl::new(), vec![], vec![]);
        let entry = folder
            .write_migration("init", &["SELECT 1".to_string()], &snapshot, true, 42)
            .unwrap();
        assert_eq!(entry.tag, "0000_init");
        assert!(dir.path().join("0000_init.sql").is_file());

        let reopened = MigrationsFolder::open(dir.path(), DialectKind::Postgresql).unwrap();
        assert_eq!(reopened.journal().entries.len(), 1);
        assert_eq!(reopened.latest().unwrap().id, snapshot.id);

        let err = MigrationsFolder::open(dir.path(), DialectKind::Mysql).unwrap_err();
        assert!(matches!(err, CliError::DialectMismatch { .. }));
    }
}

//! The `generate`, `export`, `check` and `up` verbs.
//!
//! Each verb takes a resolved [`Config`] and returns a report; printing is
//! left to the binary.

use chrono::Utc;
use tracing::{info, warn};

use ddlshift_core::diff::{HintResolver, NoRenames};
use ddlshift_core::interim::{build, BuildOptions, InterimSchema};
use ddlshift_core::snapshot::lineage;
use ddlshift_core::statements::partition;
use ddlshift_core::{ddl_diff, dialect_for, Ddl, Dialect, DiffMode, DiffOptions, DiffOutput};

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::folder::{MigrationsFolder, UpgradedSnapshot};

/// Tag suffix used when `--name` is not given.
pub const DEFAULT_MIGRATION_NAME: &str = "migration";

/// Per-invocation options of `generate`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub name: Option<String>,
    /// `old->new` rename hints.
    pub renames: Vec<String>,
    /// Write destructive statements even in strict mode.
    pub force: bool,
}

/// What `generate` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// The declared schema matches the latest snapshot.
    NoChanges,
    /// A migration was written.
    Written {
        tag: String,
        statements: usize,
        destructive: usize,
        renames: Vec<String>,
    },
}

/// Result of a successful `check`.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub migrations: usize,
    /// Upgrade hints, prefixed with the migration tag.
    pub hints: Vec<String>,
}

/// Reads and builds the declared schema.
///
/// # Errors
///
/// Fails when the schema file cannot be read or parsed, or when the
/// declared schema has conflicts.
pub fn load_declared(config: &Config, dialect: &dyn Dialect) -> Result<Ddl> {
    let path = config.schema_path()?;
    let text = std::fs::read_to_string(path).map_err(CliError::io(path))?;
    let interim = InterimSchema::from_json(&text)?;
    let options = BuildOptions::for_dialect(dialect).casing(config.casing);
    Ok(build(&interim, &options)?.into_ddl()?)
}

/// Diffs the latest snapshot against the declared schema and writes a new
/// migration when they differ.
///
/// # Errors
///
/// Fails when the schema or the history cannot be loaded, when a rename
/// hint is malformed, or when the dialect cannot express a change. In
/// strict mode, destructive statements without `force` are refused with
/// [`CliError::Destructive`].
pub async fn generate(config: &Config, options: &GenerateOptions) -> Result<GenerateOutcome> {
    let dialect = dialect_for(config.dialect);
    let to = load_declared(config, dialect.as_ref())?;

    let mut folder = MigrationsFolder::open(&config.out, config.dialect)?;
    let latest = folder.latest()?;
    latest.expect_dialect(config.dialect)?;
    let from = latest.to_ddl()?;

    let mut resolver = HintResolver::new(&options.renames)?;
    let out = ddl_diff(
        &from,
        &to,
        &mut resolver,
        dialect.as_ref(),
        &DiffOptions::new(DiffMode::Generate),
    )
    .await?;

    if out.is_empty() {
        info!("no schema changes, nothing to write");
        return Ok(GenerateOutcome::NoChanges);
    }

    let split = partition(&out.statements);
    if config.strict && !options.force && !split.destructive.is_empty() {
        let hazards = split
            .destructive
            .iter()
            .map(|(statement, hazard)| format!("{hazard}: {}", statement.target()))
            .collect();
        return Err(CliError::Destructive(hazards));
    }

    let snapshot = ddlshift_core::Snapshot::new(
        config.dialect,
        &to,
        vec![latest.id.clone()],
        out.renames.clone(),
    );
    let name = options.name.as_deref().unwrap_or(DEFAULT_MIGRATION_NAME);
    let entry = folder.write_migration(
        name,
        &out.sql_statements,
        &snapshot,
        config.breakpoints,
        Utc::now().timestamp_millis(),
    )?;

    Ok(GenerateOutcome::Written {
        tag: entry.tag,
        statements: out.statements.len(),
        destructive: split.destructive.len(),
        renames: out.renames,
    })
}

/// The SQL that creates the declared schema on an empty database.
///
/// # Errors
///
/// Fails when the schema cannot be loaded or the dialect cannot express
/// one of its entities.
pub async fn export(config: &Config) -> Result<DiffOutput> {
    let dialect = dialect_for(config.dialect);
    let to = load_declared(config, dialect.as_ref())?;
    Ok(ddl_diff(
        &Ddl::new(),
        &to,
        &mut NoRenames,
        dialect.as_ref(),
        &DiffOptions::default(),
    )
    .await?)
}

/// Verifies that the migration history can be loaded and is linear.
///
/// # Errors
///
/// Returns [`CliError::Inconsistent`] with every problem found when a
/// snapshot cannot be loaded, does not match its journal entry, or the
/// history is not linear.
pub fn check(config: &Config) -> Result<CheckReport> {
    let folder = MigrationsFolder::open(&config.out, config.dialect)?;
    let mut problems = Vec::new();
    let mut report = CheckReport::default();
    let mut snapshots = Vec::new();

    for entry in &folder.journal().entries {
        match folder.read_snapshot(entry) {
            Ok(loaded) => {
                report
                    .hints
                    .extend(loaded.hints.iter().map(|h| format!("{}: {h}", loaded.tag)));
                if loaded.snapshot.dialect != config.dialect {
                    problems.push(format!(
                        "{}: snapshot is for {}, expected {}",
                        loaded.tag, loaded.snapshot.dialect, config.dialect
                    ));
                }
                if loaded.snapshot.id != entry.snapshot_id {
                    problems.push(format!(
                        "{}: journal expects snapshot {} but the file has {}",
                        loaded.tag, entry.snapshot_id, loaded.snapshot.id
                    ));
                }
                snapshots.push(loaded.snapshot);
            }
            Err(err) => problems.push(format!("{}: {err}", entry.tag)),
        }
    }

    if let Err(err) = lineage::validate(&snapshots) {
        problems.push(err.to_string());
    }
    let heads = lineage::heads(&snapshots);
    if heads.len() > 1 {
        let ids: Vec<&str> = heads.iter().map(|s| s.id.as_str()).collect();
        problems.push(format!("history has diverged into {} heads: {}", ids.len(), ids.join(", ")));
    }

    for hint in &report.hints {
        warn!(%hint, "snapshot needs upgrading");
    }
    if !problems.is_empty() {
        return Err(CliError::Inconsistent(problems));
    }
    report.migrations = snapshots.len();
    info!(migrations = report.migrations, "migration history is consistent");
    Ok(report)
}

/// Rewrites outdated snapshots with the current format.
///
/// # Errors
///
/// Fails when a snapshot cannot be read, upgraded or written back.
pub fn up(config: &Config) -> Result<Vec<UpgradedSnapshot>> {
    let folder = MigrationsFolder::open(&config.out, config.dialect)?;
    let upgraded = folder.upgrade_in_place()?;
    if upgraded.is_empty() {
        info!("all snapshots are up to date");
    }
    Ok(upgraded)
}

//! Migration folder management for `ddlshift`.
//!
//! This crate backs the `ddlshift` binary:
//! - **config** - `ddlshift.toml` loading and flag precedence
//! - **folder** - SQL files, snapshots and the journal on disk
//! - **commands** - The `generate`, `export`, `check` and `up` verbs
//!
//! # CLI Usage
//!
//! ```bash
//! # Write a migration for the changes in schema.json
//! ddlshift generate --dialect postgresql --schema schema.json --name add_posts
//!
//! # Treat a column as renamed instead of dropped and re-added
//! ddlshift generate --rename public.users.email->public.users.email_address
//!
//! # Print the SQL for the whole schema
//! ddlshift export --schema schema.json
//!
//! # Validate the history and upgrade old snapshots
//! ddlshift check
//! ddlshift up
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod folder;

pub use commands::{check, export, generate, up, CheckReport, GenerateOptions, GenerateOutcome};
pub use config::{Config, FileConfig, Overrides};
pub use error::{CliError, Result};
pub use folder::MigrationsFolder;

//! Schema diffing and migration generation for SQL databases.
//!
//! `ddlshift-core` turns a declared schema into the SQL needed to move a
//! database from its previous state to the new one:
//! - An interim schema (what the user declared) is normalized into a
//!   [`Ddl`] store of flat, keyed entities
//! - Two stores are diffed kind by kind; ambiguous drop/create pairs are
//!   handed to a [`Resolver`] which decides what is a rename
//! - The resulting statements are ordered, grouped and rendered by a
//!   per-database [`Dialect`]
//! - Each generated state is persisted as a versioned [`Snapshot`]
//!
//! # Architecture
//!
//! - **ddl** - Entity records, the keyed store and default constraint names
//! - **interim** - Declared schema input and the builder that validates it
//! - **diff** - The diff engine, rename resolvers and similarity scoring
//! - **statements** - Statement variants, phase ordering and grouping
//! - **dialect** - SQL rendering and capability flags per database
//! - **snapshot** - Snapshot JSON, the version-upgrade chain, journal and lineage
//!
//! # Example
//!
//! ```rust,ignore
//! use ddlshift_core::prelude::*;
//!
//! let dialect = PostgresDialect::new();
//! let interim = InterimSchema::from_json(&std::fs::read_to_string("schema.json")?)?;
//! let to = build(&interim, &BuildOptions::for_dialect(&dialect))?.into_ddl()?;
//!
//! let out = ddl_diff(&Ddl::new(), &to, &mut NoRenames, &dialect, &DiffOptions::default()).await?;
//! for sql in &out.sql_statements {
//!     println!("{sql};");
//! }
//! ```

pub mod ddl;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod interim;
pub mod snapshot;
pub mod statements;

pub use ddl::{Ddl, Entity, EntityKey, EntityKind};
pub use dialect::{dialect_for, Dialect, DialectKind};
pub use diff::{ddl_diff, DiffMode, DiffOptions, DiffOutput};
pub use error::{Error, Result};
pub use interim::{build, BuildOptions, InterimSchema};
pub use snapshot::Snapshot;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::ddl::{
        Check, Column, ColumnDefault, Ddl, Entity, EntityKey, EntityKind, Enum, Filter,
        ForeignKey, ForeignKeyAction, Index, IndexColumn, Policy, PrimaryKey, Role, Schema,
        Sequence, Table, Unique, View,
    };
    pub use crate::dialect::{
        dialect_for, Capabilities, Dialect, DialectKind, DsqlDialect, MssqlDialect, MysqlDialect,
        PostgresDialect, SqliteDialect,
    };
    pub use crate::diff::{
        ddl_diff, CandidateResolver, DiffMode, DiffOptions, DiffOutput, HintResolver, NoRenames,
        Resolver, ResolverError, ResolverInput, ResolverOutput, StructuralSimilarity,
    };
    pub use crate::error::{Error, Result, SchemaError, SnapshotError};
    pub use crate::interim::{build, BuildOptions, BuildOutput, Casing, InterimSchema};
    pub use crate::snapshot::{lineage, Hint, Journal, JournalEntry, Snapshot};
    pub use crate::statements::{classify, Hazard, Safety, Statement, StatementGroup};
}

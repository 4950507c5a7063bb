//! Dialect-specific capabilities and SQL generation.
//!
//! Different databases support different subsets of DDL and spell the same
//! change differently. The [`Dialect`] trait exposes both: capability flags
//! that the diff engine consults before emitting a statement, and SQL
//! rendering for every [`Statement`]. The trait's default rendering methods
//! produce PostgreSQL-style SQL; each dialect overrides what it spells
//! differently.

mod dsql;
mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use dsql::DsqlDialect;
pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ddl::{
    Check, Column, ColumnDefault, EntityKind, Enum, ForeignKey, ForeignKeyAction, Identity,
    IdentityKind, Index, IndexColumn, Policy, PolicyAs, PolicyFor, PrimaryKey, Role, Schema,
    Sequence, Table, Unique, View, GeneratedKind,
};
use crate::diff::delta::{ColumnDelta, PolicyDelta, RoleDelta, SequenceDelta, ViewDelta};
use crate::error::{Error, Result, UnsupportedOperation};
use crate::statements::Statement;

/// The supported database families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// PostgreSQL.
    Postgresql,
    /// PostgreSQL-compatible DSQL with reduced DDL.
    Dsql,
    /// MySQL.
    Mysql,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    Mssql,
}

impl DialectKind {
    /// All dialects.
    pub const ALL: [Self; 5] = [
        Self::Postgresql,
        Self::Dsql,
        Self::Mysql,
        Self::Sqlite,
        Self::Mssql,
    ];

    /// Identifier used in config files and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgresql => "postgresql",
            Self::Dsql => "dsql",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
        }
    }

    /// Human-facing name used in error messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Postgresql => "PostgreSQL",
            Self::Dsql => "DSQL",
            Self::Mysql => "MySQL",
            Self::Sqlite => "SQLite",
            Self::Mssql => "MSSQL",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dialect name that matches none of the supported databases.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dialect `{0}` (expected postgresql, dsql, mysql, sqlite or mssql)")]
pub struct UnknownDialect(pub String);

impl FromStr for DialectKind {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Self::Postgresql),
            "dsql" => Ok(Self::Dsql),
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::Mssql),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

/// Returns the adapter for a dialect.
#[must_use]
pub fn dialect_for(kind: DialectKind) -> Box<dyn Dialect> {
    match kind {
        DialectKind::Postgresql => Box::new(PostgresDialect::new()),
        DialectKind::Dsql => Box::new(DsqlDialect::new()),
        DialectKind::Mysql => Box::new(MysqlDialect::new()),
        DialectKind::Sqlite => Box::new(SqliteDialect::new()),
        DialectKind::Mssql => Box::new(MssqlDialect::new()),
    }
}

/// What a dialect can express.
///
/// Every flag names a class of DDL. The diff engine refuses to emit a
/// statement whose class is switched off, except that dialects with
/// `recreate_table` rebuild the table instead of altering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// `CREATE SCHEMA` / `DROP SCHEMA`.
    pub schemas: bool,
    /// `ALTER SCHEMA ... RENAME`.
    pub rename_schema: bool,
    /// Enumerated types.
    pub enums: bool,
    /// Standalone sequences.
    pub sequences: bool,
    /// Roles.
    pub roles: bool,
    /// Row-level security policies.
    pub policies: bool,
    /// `ENABLE ROW LEVEL SECURITY`.
    pub row_level_security: bool,
    /// Views.
    pub views: bool,
    /// Materialized views.
    pub materialized_views: bool,
    /// Foreign keys.
    pub foreign_keys: bool,
    /// Check constraints.
    pub check_constraints: bool,
    /// Identity (auto-increment) columns.
    pub identity_columns: bool,
    /// Generated columns.
    pub generated_columns: bool,
    /// Changing a column's type in place.
    pub alter_column_type: bool,
    /// Toggling `NOT NULL` in place.
    pub alter_column_nullability: bool,
    /// Setting or dropping a default in place.
    pub alter_column_default: bool,
    /// Changing a column's identity in place.
    pub alter_column_identity: bool,
    /// `DROP COLUMN`.
    pub drop_column: bool,
    /// `RENAME COLUMN`.
    pub rename_column: bool,
    /// `RENAME TABLE`.
    pub rename_table: bool,
    /// Moving a table, enum, sequence or view to another schema.
    pub move_to_schema: bool,
    /// Adding constraints to an existing table.
    pub add_constraint: bool,
    /// Dropping constraints from an existing table.
    pub drop_constraint: bool,
    /// `RENAME CONSTRAINT`.
    pub rename_constraint: bool,
    /// Renaming an index.
    pub rename_index: bool,
    /// Rebuilding a table to apply alterations it cannot do in place.
    pub recreate_table: bool,
    /// `CREATE INDEX CONCURRENTLY`.
    pub concurrent_index: bool,
}

impl Capabilities {
    /// Operation names the statement needs but the dialect lacks.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn violations(&self, statement: &Statement) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut need = |flag: bool, operation: &'static str| {
            if !flag && !out.contains(&operation) {
                out.push(operation);
            }
        };

        match statement {
            Statement::CreateSchema { .. } => need(self.schemas, "CREATE SCHEMA"),
            Statement::DropSchema { .. } => need(self.schemas, "DROP SCHEMA"),
            Statement::RenameSchema { .. } => {
                need(self.schemas, "CREATE SCHEMA");
                need(self.rename_schema, "RENAME SCHEMA");
            }
            Statement::CreateEnum { .. }
            | Statement::DropEnum { .. }
            | Statement::AlterEnumAddValue { .. }
            | Statement::RecreateEnum { .. } => need(self.enums, "ENUM TYPES"),
            Statement::RenameEnum { from, to } => {
                need(self.enums, "ENUM TYPES");
                need(self.move_to_schema || from.schema == to.schema, "SET SCHEMA");
            }
            Statement::CreateSequence { .. }
            | Statement::DropSequence { .. }
            | Statement::AlterSequence { .. } => need(self.sequences, "SEQUENCES"),
            Statement::RenameSequence { from, to } => {
                need(self.sequences, "SEQUENCES");
                need(self.move_to_schema || from.schema == to.schema, "SET SCHEMA");
            }
            Statement::CreateRole { .. }
            | Statement::DropRole { .. }
            | Statement::RenameRole { .. }
            | Statement::AlterRole { .. } => need(self.roles, "ROLES"),
            Statement::CreateTable {
                table,
                columns,
                checks,
                fks,
                ..
            }
            | Statement::RecreateTable {
                table,
                columns,
                checks,
                fks,
                ..
            } => {
                for column in columns {
                    self.column_needs(column, &mut need);
                }
                if !checks.is_empty() {
                    need(self.check_constraints, "CHECK CONSTRAINTS");
                }
                if !fks.is_empty() {
                    need(self.foreign_keys, "FOREIGN KEYS");
                }
                if table.is_rls_enabled {
                    need(self.row_level_security, "ROW LEVEL SECURITY");
                }
                if matches!(statement, Statement::RecreateTable { .. }) {
                    need(self.recreate_table, "RECREATE TABLE");
                }
            }
            Statement::DropTable { .. } => {}
            Statement::RenameTable { from, to } => {
                if from.name != to.name {
                    need(self.rename_table, "RENAME TABLE");
                }
                if from.schema != to.schema {
                    need(self.move_to_schema, "SET SCHEMA");
                }
            }
            Statement::AlterRls { .. } => need(self.row_level_security, "ROW LEVEL SECURITY"),
            Statement::AddColumn { column } => self.column_needs(column, &mut need),
            Statement::DropColumn { .. } => need(self.drop_column, "DROP COLUMN"),
            Statement::RenameColumn { .. } => need(self.rename_column, "RENAME COLUMN"),
            Statement::AlterColumn { to, delta, .. } => {
                if delta.sql_type || delta.dimensions {
                    need(self.alter_column_type, "ALTER COLUMN TYPE");
                }
                if delta.not_null {
                    need(
                        self.alter_column_nullability,
                        if to.not_null {
                            "ALTER COLUMN SET NOT NULL"
                        } else {
                            "ALTER COLUMN DROP NOT NULL"
                        },
                    );
                }
                if delta.default {
                    need(
                        self.alter_column_default,
                        if to.default.is_some() {
                            "ALTER COLUMN SET DEFAULT"
                        } else {
                            "ALTER COLUMN DROP DEFAULT"
                        },
                    );
                }
                if delta.identity {
                    need(self.identity_columns, "IDENTITY COLUMNS");
                    need(self.alter_column_identity, "ALTER COLUMN IDENTITY");
                }
            }
            Statement::AddPrimaryKey { .. } | Statement::AddUnique { .. } => {
                need(self.add_constraint, "ADD CONSTRAINT");
            }
            Statement::AddForeignKey { .. } => {
                need(self.foreign_keys, "FOREIGN KEYS");
                need(self.add_constraint, "ADD CONSTRAINT");
            }
            Statement::AddCheck { .. } => {
                need(self.check_constraints, "CHECK CONSTRAINTS");
                need(self.add_constraint, "ADD CONSTRAINT");
            }
            Statement::DropPrimaryKey { .. }
            | Statement::DropUnique { .. }
            | Statement::DropCheck { .. } => need(self.drop_constraint, "DROP CONSTRAINT"),
            Statement::DropForeignKey { .. } => {
                need(self.foreign_keys, "FOREIGN KEYS");
                need(self.drop_constraint, "DROP CONSTRAINT");
            }
            Statement::RenameConstraint { .. } => {
                need(self.rename_constraint, "RENAME CONSTRAINT");
            }
            Statement::CreateIndex { .. } | Statement::DropIndex { .. } => {}
            Statement::RenameIndex { .. } => need(self.rename_index, "RENAME INDEX"),
            Statement::CreateView { view } | Statement::DropView { view } => {
                need(self.views, "VIEWS");
                if view.materialized {
                    need(self.materialized_views, "MATERIALIZED VIEWS");
                }
            }
            Statement::RenameView { from, to } => {
                need(self.views, "VIEWS");
                if to.materialized {
                    need(self.materialized_views, "MATERIALIZED VIEWS");
                }
                if from.schema != to.schema {
                    need(self.move_to_schema, "SET SCHEMA");
                }
            }
            Statement::AlterView { to, .. } => {
                need(self.views, "VIEWS");
                if to.materialized {
                    need(self.materialized_views, "MATERIALIZED VIEWS");
                }
            }
            Statement::CreatePolicy { .. }
            | Statement::DropPolicy { .. }
            | Statement::RenamePolicy { .. }
            | Statement::AlterPolicy { .. } => need(self.policies, "POLICIES"),
        }
        out
    }

    fn column_needs(&self, column: &Column, need: &mut impl FnMut(bool, &'static str)) {
        if column.identity.is_some() {
            need(self.identity_columns, "IDENTITY COLUMNS");
        }
        if column.generated.is_some() {
            need(self.generated_columns, "GENERATED COLUMNS");
        }
    }
}

/// Per-database capability flags and SQL rendering.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Which database family this is.
    fn kind(&self) -> DialectKind;

    /// Display name used in error messages.
    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// What the dialect can express.
    fn capabilities(&self) -> Capabilities;

    /// Schema that unqualified names live in; empty for schemaless dialects.
    fn default_schema(&self) -> &'static str {
        "public"
    }

    /// Canonical spelling of a column type, used to compare types without
    /// reporting alias changes (`int4` vs `integer`) as alterations.
    fn normalize_type(&self, sql_type: &str) -> String;

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a schema-qualified name, leaving out the default schema.
    fn qualified(&self, schema: &str, name: &str) -> String {
        if schema.is_empty() || schema == self.default_schema() {
            self.quote_identifier(name)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            )
        }
    }

    /// Renders a string literal.
    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Renders SQL for a statement, refusing statements the dialect cannot
    /// express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] when the statement needs a capability
    /// the dialect lacks.
    fn generate_sql(&self, statement: &Statement) -> Result<Vec<String>> {
        let violations = self.capabilities().violations(statement);
        if !violations.is_empty() {
            let target = statement.target();
            return Err(Error::Unsupported(
                violations
                    .into_iter()
                    .map(|operation| UnsupportedOperation {
                        dialect: self.name().to_string(),
                        operation: operation.to_string(),
                        target: target.clone(),
                    })
                    .collect(),
            ));
        }
        Ok(self.render_statement(statement))
    }

    /// Dispatches a statement to its rendering method.
    #[allow(clippy::too_many_lines)]
    fn render_statement(&self, statement: &Statement) -> Vec<String> {
        match statement {
            Statement::CreateSchema { schema } => vec![self.create_schema(schema)],
            Statement::DropSchema { schema } => vec![self.drop_schema(schema)],
            Statement::RenameSchema { from, to } => vec![self.rename_schema(from, to)],
            Statement::CreateEnum { enum_type } => vec![self.create_enum(enum_type)],
            Statement::DropEnum { enum_type } => vec![self.drop_enum(enum_type)],
            Statement::RenameEnum { from, to } => {
                self.rename_in_schema("TYPE", &from.schema, &from.name, &to.schema, &to.name)
            }
            Statement::AlterEnumAddValue {
                enum_type,
                value,
                before,
            } => vec![self.alter_enum_add_value(enum_type, value, before.as_deref())],
            Statement::RecreateEnum { from, to, columns } => {
                self.recreate_enum(from, to, columns)
            }
            Statement::CreateSequence { sequence } => vec![self.create_sequence(sequence)],
            Statement::DropSequence { sequence } => vec![self.drop_sequence(sequence)],
            Statement::RenameSequence { from, to } => self.rename_in_schema(
                "SEQUENCE",
                &from.schema,
                &from.name,
                &to.schema,
                &to.name,
            ),
            Statement::AlterSequence { from, to, delta } => {
                self.alter_sequence(from, to, delta).into_iter().collect()
            }
            Statement::CreateRole { role } => vec![self.create_role(role)],
            Statement::DropRole { role } => vec![self.drop_role(role)],
            Statement::RenameRole { from, to } => vec![self.rename_role(from, to)],
            Statement::AlterRole { from, to, delta } => {
                self.alter_role(from, to, delta).into_iter().collect()
            }
            Statement::CreateTable {
                table,
                columns,
                pk,
                uniques,
                checks,
                fks,
            } => self.create_table(table, columns, pk.as_ref(), uniques, checks, fks),
            Statement::DropTable { table } => vec![self.drop_table(table)],
            Statement::RenameTable { from, to } => self.rename_table(from, to),
            Statement::AlterRls { table } => vec![self.alter_rls(table)],
            Statement::RecreateTable {
                table,
                columns,
                pk,
                uniques,
                checks,
                fks,
                indexes,
                copy_columns,
            } => self.recreate_table(
                table,
                columns,
                pk.as_ref(),
                uniques,
                checks,
                fks,
                indexes,
                copy_columns,
            ),
            Statement::AddColumn { column } => vec![self.add_column(column)],
            Statement::DropColumn { column } => self.drop_column(column),
            Statement::RenameColumn { from, to } => vec![self.rename_column(from, to)],
            Statement::AlterColumn { from, to, delta } => self.alter_column(from, to, delta),
            Statement::AddPrimaryKey { pk } => vec![self.add_primary_key(pk)],
            Statement::AddUnique { unique } => vec![self.add_unique(unique)],
            Statement::AddForeignKey { fk } => vec![self.add_foreign_key(fk)],
            Statement::AddCheck { check } => vec![self.add_check(check)],
            Statement::DropPrimaryKey { pk } => vec![self.drop_constraint(
                EntityKind::PrimaryKey,
                &pk.schema,
                &pk.table,
                &pk.name,
            )],
            Statement::DropUnique { unique } => vec![self.drop_constraint(
                EntityKind::Unique,
                &unique.schema,
                &unique.table,
                &unique.name,
            )],
            Statement::DropForeignKey { fk } => vec![self.drop_constraint(
                EntityKind::ForeignKey,
                &fk.schema,
                &fk.table,
                &fk.name,
            )],
            Statement::DropCheck { check } => vec![self.drop_constraint(
                EntityKind::Check,
                &check.schema,
                &check.table,
                &check.name,
            )],
            Statement::RenameConstraint {
                kind,
                schema,
                table,
                from,
                to,
            } => vec![self.rename_constraint(*kind, schema, table, from, to)],
            Statement::CreateIndex { index } => vec![self.create_index(index)],
            Statement::DropIndex { index } => vec![self.drop_index(index)],
            Statement::RenameIndex {
                schema,
                table,
                from,
                to,
            } => vec![self.rename_index(schema, table, from, to)],
            Statement::CreateView { view } => self.create_view(view).into_iter().collect(),
            Statement::DropView { view } => vec![self.drop_view(view)],
            Statement::RenameView { from, to } => self.rename_view(from, to),
            Statement::AlterView { from, to, delta } => self.alter_view(from, to, delta),
            Statement::CreatePolicy { policy } => vec![self.create_policy(policy)],
            Statement::DropPolicy { policy } => vec![self.drop_policy(policy)],
            Statement::RenamePolicy { from, to } => vec![self.rename_policy(from, to)],
            Statement::AlterPolicy { from, to, delta } => {
                self.alter_policy(from, to, delta).into_iter().collect()
            }
        }
    }

    // ================================================================
    // Schemas
    // ================================================================

    /// Generates SQL for CREATE SCHEMA.
    fn create_schema(&self, schema: &Schema) -> String {
        format!("CREATE SCHEMA {}", self.quote_identifier(&schema.name))
    }

    /// Generates SQL for DROP SCHEMA.
    fn drop_schema(&self, schema: &Schema) -> String {
        format!("DROP SCHEMA {}", self.quote_identifier(&schema.name))
    }

    /// Generates SQL for renaming a schema.
    fn rename_schema(&self, from: &Schema, to: &Schema) -> String {
        format!(
            "ALTER SCHEMA {} RENAME TO {}",
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )
    }

    /// Moves and/or renames a schema-scoped object (`TYPE`, `SEQUENCE`,
    /// `TABLE`, `VIEW`, ...).
    fn rename_in_schema(
        &self,
        object: &str,
        from_schema: &str,
        from_name: &str,
        to_schema: &str,
        to_name: &str,
    ) -> Vec<String> {
        let mut sql = Vec::new();
        if from_schema != to_schema {
            let target = if to_schema.is_empty() {
                self.default_schema()
            } else {
                to_schema
            };
            sql.push(format!(
                "ALTER {object} {} SET SCHEMA {}",
                self.qualified(from_schema, from_name),
                self.quote_identifier(target)
            ));
        }
        if from_name != to_name {
            sql.push(format!(
                "ALTER {object} {} RENAME TO {}",
                self.qualified(to_schema, from_name),
                self.quote_identifier(to_name)
            ));
        }
        sql
    }

    // ================================================================
    // Enums
    // ================================================================

    /// Generates SQL for CREATE TYPE ... AS ENUM.
    fn create_enum(&self, enum_type: &Enum) -> String {
        let labels: Vec<String> = enum_type
            .values
            .iter()
            .map(|v| self.string_literal(v))
            .collect();
        format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.qualified(&enum_type.schema, &enum_type.name),
            labels.join(", ")
        )
    }

    /// Generates SQL for DROP TYPE.
    fn drop_enum(&self, enum_type: &Enum) -> String {
        format!(
            "DROP TYPE {}",
            self.qualified(&enum_type.schema, &enum_type.name)
        )
    }

    /// Generates SQL for ALTER TYPE ... ADD VALUE.
    fn alter_enum_add_value(&self, enum_type: &Enum, value: &str, before: Option<&str>) -> String {
        let mut sql = format!(
            "ALTER TYPE {} ADD VALUE {}",
            self.qualified(&enum_type.schema, &enum_type.name),
            self.string_literal(value)
        );
        if let Some(anchor) = before {
            sql.push_str(" BEFORE ");
            sql.push_str(&self.string_literal(anchor));
        }
        sql
    }

    /// Rebuilds an enum: columns go through `text` while the type is
    /// dropped and created again.
    fn recreate_enum(&self, from: &Enum, to: &Enum, columns: &[Column]) -> Vec<String> {
        let mut sql = Vec::new();
        for column in columns {
            sql.push(format!(
                "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE text",
                self.qualified(&column.schema, &column.table),
                self.quote_identifier(&column.name)
            ));
        }
        sql.push(self.drop_enum(from));
        sql.push(self.create_enum(to));
        let type_name = self.qualified(&to.schema, &to.name);
        for column in columns {
            let column_name = self.quote_identifier(&column.name);
            sql.push(format!(
                "ALTER TABLE {} ALTER COLUMN {column_name} SET DATA TYPE {type_name}{dims} USING {column_name}::{type_name}{dims}",
                self.qualified(&column.schema, &column.table),
                dims = "[]".repeat(column.dimensions as usize),
            ));
        }
        sql
    }

    // ================================================================
    // Sequences
    // ================================================================

    /// Renders the option clauses of a sequence or identity.
    fn sequence_options(
        &self,
        increment_by: Option<&str>,
        min_value: Option<&str>,
        max_value: Option<&str>,
        start_with: Option<&str>,
        cache: Option<i64>,
        cycle: bool,
    ) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(v) = increment_by {
            parts.push(format!("INCREMENT BY {v}"));
        }
        if let Some(v) = min_value {
            parts.push(format!("MINVALUE {v}"));
        }
        if let Some(v) = max_value {
            parts.push(format!("MAXVALUE {v}"));
        }
        if let Some(v) = start_with {
            parts.push(format!("START WITH {v}"));
        }
        if let Some(v) = cache {
            parts.push(format!("CACHE {v}"));
        }
        if cycle {
            parts.push("CYCLE".to_string());
        }
        parts
    }

    /// Generates SQL for CREATE SEQUENCE.
    fn create_sequence(&self, sequence: &Sequence) -> String {
        let mut sql = format!(
            "CREATE SEQUENCE {}",
            self.qualified(&sequence.schema, &sequence.name)
        );
        for option in self.sequence_options(
            sequence.increment_by.as_deref(),
            sequence.min_value.as_deref(),
            sequence.max_value.as_deref(),
            sequence.start_with.as_deref(),
            sequence.cache,
            sequence.cycle,
        ) {
            sql.push(' ');
            sql.push_str(&option);
        }
        sql
    }

    /// Generates SQL for DROP SEQUENCE.
    fn drop_sequence(&self, sequence: &Sequence) -> String {
        format!(
            "DROP SEQUENCE {}",
            self.qualified(&sequence.schema, &sequence.name)
        )
    }

    /// Generates SQL for ALTER SEQUENCE.
    fn alter_sequence(&self, _from: &Sequence, to: &Sequence, delta: &SequenceDelta) -> Option<String> {
        let mut parts = Vec::new();
        if delta.increment_by {
            parts.push(format!(
                "INCREMENT BY {}",
                to.increment_by.as_deref().unwrap_or("1")
            ));
        }
        if delta.min_value {
            parts.push(
                to.min_value
                    .as_ref()
                    .map_or_else(|| "NO MINVALUE".to_string(), |v| format!("MINVALUE {v}")),
            );
        }
        if delta.max_value {
            parts.push(
                to.max_value
                    .as_ref()
                    .map_or_else(|| "NO MAXVALUE".to_string(), |v| format!("MAXVALUE {v}")),
            );
        }
        if delta.start_with {
            if let Some(v) = &to.start_with {
                parts.push(format!("START WITH {v}"));
            }
        }
        if delta.cache {
            parts.push(format!("CACHE {}", to.cache.unwrap_or(1)));
        }
        if delta.cycle {
            parts.push(if to.cycle { "CYCLE" } else { "NO CYCLE" }.to_string());
        }
        if parts.is_empty() {
            return None;
        }
        Some(format!(
            "ALTER SEQUENCE {} {}",
            self.qualified(&to.schema, &to.name),
            parts.join(" ")
        ))
    }

    // ================================================================
    // Roles
    // ================================================================

    /// Generates SQL for CREATE ROLE.
    fn create_role(&self, role: &Role) -> String {
        let mut options = Vec::new();
        if role.superuser {
            options.push("SUPERUSER".to_string());
        }
        if role.create_db {
            options.push("CREATEDB".to_string());
        }
        if role.create_role {
            options.push("CREATEROLE".to_string());
        }
        if !role.inherit {
            options.push("NOINHERIT".to_string());
        }
        if role.can_login {
            options.push("LOGIN".to_string());
        }
        if role.replication {
            options.push("REPLICATION".to_string());
        }
        if role.bypass_rls {
            options.push("BYPASSRLS".to_string());
        }
        if let Some(limit) = role.conn_limit {
            options.push(format!("CONNECTION LIMIT {limit}"));
        }
        if let Some(password) = &role.password {
            options.push(format!("PASSWORD {}", self.string_literal(password)));
        }
        if let Some(until) = &role.valid_until {
            options.push(format!("VALID UNTIL {}", self.string_literal(until)));
        }

        let mut sql = format!("CREATE ROLE {}", self.quote_identifier(&role.name));
        if !options.is_empty() {
            sql.push_str(" WITH ");
            sql.push_str(&options.join(" "));
        }
        sql
    }

    /// Generates SQL for DROP ROLE.
    fn drop_role(&self, role: &Role) -> String {
        format!("DROP ROLE {}", self.quote_identifier(&role.name))
    }

    /// Generates SQL for renaming a role.
    fn rename_role(&self, from: &Role, to: &Role) -> String {
        format!(
            "ALTER ROLE {} RENAME TO {}",
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )
    }

    /// Generates SQL for ALTER ROLE.
    fn alter_role(&self, _from: &Role, to: &Role, delta: &RoleDelta) -> Option<String> {
        let flag = |on: bool, yes: &str, no: &str| if on { yes } else { no }.to_string();
        let mut options = Vec::new();
        if delta.superuser {
            options.push(flag(to.superuser, "SUPERUSER", "NOSUPERUSER"));
        }
        if delta.create_db {
            options.push(flag(to.create_db, "CREATEDB", "NOCREATEDB"));
        }
        if delta.create_role {
            options.push(flag(to.create_role, "CREATEROLE", "NOCREATEROLE"));
        }
        if delta.inherit {
            options.push(flag(to.inherit, "INHERIT", "NOINHERIT"));
        }
        if delta.can_login {
            options.push(flag(to.can_login, "LOGIN", "NOLOGIN"));
        }
        if delta.replication {
            options.push(flag(to.replication, "REPLICATION", "NOREPLICATION"));
        }
        if delta.bypass_rls {
            options.push(flag(to.bypass_rls, "BYPASSRLS", "NOBYPASSRLS"));
        }
        if delta.conn_limit {
            options.push(format!("CONNECTION LIMIT {}", to.conn_limit.unwrap_or(-1)));
        }
        if delta.password {
            options.push(to.password.as_ref().map_or_else(
                || "PASSWORD NULL".to_string(),
                |p| format!("PASSWORD {}", self.string_literal(p)),
            ));
        }
        if delta.valid_until {
            let until = to.valid_until.as_deref().unwrap_or("infinity");
            options.push(format!("VALID UNTIL {}", self.string_literal(until)));
        }
        if options.is_empty() {
            return None;
        }
        Some(format!(
            "ALTER ROLE {} WITH {}",
            self.quote_identifier(&to.name),
            options.join(" ")
        ))
    }

    // ================================================================
    // Tables
    // ================================================================

    /// Generates SQL for CREATE TABLE, followed by RLS enablement when set.
    fn create_table(
        &self,
        table: &Table,
        columns: &[Column],
        pk: Option<&PrimaryKey>,
        uniques: &[Unique],
        checks: &[Check],
        fks: &[ForeignKey],
    ) -> Vec<String> {
        let mut lines: Vec<String> = columns
            .iter()
            .map(|c| format!("\t{}", self.column_definition(c)))
            .collect();
        if let Some(pk) = pk {
            lines.push(format!("\t{}", self.primary_key_clause(pk)));
        }
        for unique in uniques {
            lines.push(format!("\t{}", self.unique_clause(unique)));
        }
        for fk in fks {
            lines.push(format!(
                "\tCONSTRAINT {} {}",
                self.quote_identifier(&fk.name),
                self.foreign_key_clause(fk)
            ));
        }
        for check in checks {
            lines.push(format!("\t{}", self.check_clause(check)));
        }

        let mut sql = vec![format!(
            "CREATE TABLE {} (\n{}\n)",
            self.qualified(&table.schema, &table.name),
            lines.join(",\n")
        )];
        if table.is_rls_enabled {
            sql.push(self.alter_rls(table));
        }
        sql
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &Table) -> String {
        format!("DROP TABLE {}", self.qualified(&table.schema, &table.name))
    }

    /// Generates SQL for renaming and/or moving a table.
    fn rename_table(&self, from: &Table, to: &Table) -> Vec<String> {
        self.rename_in_schema("TABLE", &from.schema, &from.name, &to.schema, &to.name)
    }

    /// Generates SQL for toggling row-level security.
    fn alter_rls(&self, table: &Table) -> String {
        format!(
            "ALTER TABLE {} {} ROW LEVEL SECURITY",
            self.qualified(&table.schema, &table.name),
            if table.is_rls_enabled {
                "ENABLE"
            } else {
                "DISABLE"
            }
        )
    }

    /// Rebuilds a table: create a replacement, copy the surviving columns,
    /// swap it in and restore its indexes.
    #[allow(clippy::too_many_arguments)]
    fn recreate_table(
        &self,
        table: &Table,
        columns: &[Column],
        pk: Option<&PrimaryKey>,
        uniques: &[Unique],
        checks: &[Check],
        fks: &[ForeignKey],
        indexes: &[Index],
        copy_columns: &[String],
    ) -> Vec<String> {
        let temp = Table {
            name: format!("__new_{}", table.name),
            ..table.clone()
        };
        let mut sql = self.create_table(&temp, columns, pk, uniques, checks, fks);
        if !copy_columns.is_empty() {
            let list: Vec<String> = copy_columns
                .iter()
                .map(|c| self.quote_identifier(c))
                .collect();
            let list = list.join(", ");
            sql.push(format!(
                "INSERT INTO {}({list}) SELECT {list} FROM {}",
                self.qualified(&temp.schema, &temp.name),
                self.qualified(&table.schema, &table.name)
            ));
        }
        sql.push(self.drop_table(table));
        sql.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.qualified(&temp.schema, &temp.name),
            self.quote_identifier(&table.name)
        ));
        for index in indexes {
            sql.push(self.create_index(index));
        }
        sql
    }

    // ================================================================
    // Columns
    // ================================================================

    /// Renders a column's type including array dimensions.
    fn column_type(&self, column: &Column) -> String {
        let base = column.type_schema.as_ref().map_or_else(
            || column.sql_type.clone(),
            |schema| self.qualified(schema, &column.sql_type),
        );
        format!("{base}{}", "[]".repeat(column.dimensions as usize))
    }

    /// Renders a default value.
    fn default_sql(&self, default: &ColumnDefault) -> String {
        if default.expression {
            default.value.clone()
        } else {
            self.string_literal(&default.value)
        }
    }

    /// Renders an identity clause.
    fn identity_clause(&self, identity: &Identity) -> String {
        let mut sql = match identity.kind {
            IdentityKind::Always => "GENERATED ALWAYS AS IDENTITY".to_string(),
            IdentityKind::ByDefault => "GENERATED BY DEFAULT AS IDENTITY".to_string(),
        };
        let options = self.sequence_options(
            identity.increment_by.as_deref(),
            identity.min_value.as_deref(),
            identity.max_value.as_deref(),
            identity.start_with.as_deref(),
            identity.cache,
            identity.cycle,
        );
        if !options.is_empty() {
            let _ = write!(sql, " ({})", options.join(" "));
        }
        sql
    }

    /// Generates a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)
        );
        if let Some(generated) = &column.generated {
            let _ = write!(sql, " GENERATED ALWAYS AS ({})", generated.expression);
            sql.push_str(match generated.kind {
                GeneratedKind::Stored => " STORED",
                GeneratedKind::Virtual => " VIRTUAL",
            });
        } else if let Some(identity) = &column.identity {
            sql.push(' ');
            sql.push_str(&self.identity_clause(identity));
        } else if let Some(default) = &column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.default_sql(default));
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    /// Generates SQL for ADD COLUMN.
    fn add_column(&self, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualified(&column.schema, &column.table),
            self.column_definition(column)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, column: &Column) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualified(&column.schema, &column.table),
            self.quote_identifier(&column.name)
        )]
    }

    /// Generates SQL for RENAME COLUMN.
    fn rename_column(&self, from: &Column, to: &Column) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.qualified(&to.schema, &to.table),
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )
    }

    /// Generates SQL for altering a column in place.
    fn alter_column(&self, from: &Column, to: &Column, delta: &ColumnDelta) -> Vec<String> {
        let table = self.qualified(&to.schema, &to.table);
        let column = self.quote_identifier(&to.name);
        let prefix = format!("ALTER TABLE {table} ALTER COLUMN {column}");
        let mut sql = Vec::new();

        if delta.default && from.default.is_some() {
            sql.push(format!("{prefix} DROP DEFAULT"));
        }
        if delta.sql_type || delta.dimensions {
            let new_type = self.column_type(to);
            sql.push(format!(
                "{prefix} SET DATA TYPE {new_type} USING {column}::{new_type}"
            ));
        }
        if delta.default {
            if let Some(default) = &to.default {
                sql.push(format!("{prefix} SET DEFAULT {}", self.default_sql(default)));
            }
        }
        if delta.not_null {
            sql.push(format!(
                "{prefix} {} NOT NULL",
                if to.not_null { "SET" } else { "DROP" }
            ));
        }
        if delta.identity {
            if from.identity.is_some() {
                sql.push(format!("{prefix} DROP IDENTITY"));
            }
            if let Some(identity) = &to.identity {
                sql.push(format!("{prefix} ADD {}", self.identity_clause(identity)));
            }
        }
        sql
    }

    // ================================================================
    // Constraints
    // ================================================================

    /// Renders a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `CONSTRAINT "name" PRIMARY KEY (...)`.
    fn primary_key_clause(&self, pk: &PrimaryKey) -> String {
        format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            self.quote_identifier(&pk.name),
            self.column_list(&pk.columns)
        )
    }

    /// `CONSTRAINT "name" UNIQUE (...)`.
    fn unique_clause(&self, unique: &Unique) -> String {
        format!(
            "CONSTRAINT {} UNIQUE{} ({})",
            self.quote_identifier(&unique.name),
            if unique.nulls_not_distinct {
                " NULLS NOT DISTINCT"
            } else {
                ""
            },
            self.column_list(&unique.columns)
        )
    }

    /// `CONSTRAINT "name" CHECK (...)`.
    fn check_clause(&self, check: &Check) -> String {
        format!(
            "CONSTRAINT {} CHECK ({})",
            self.quote_identifier(&check.name),
            check.value
        )
    }

    /// Renders a referential action.
    fn foreign_key_action(&self, action: ForeignKeyAction) -> &'static str {
        action.as_sql()
    }

    /// `FOREIGN KEY (...) REFERENCES ... (...)` with its actions.
    fn foreign_key_clause(&self, fk: &ForeignKey) -> String {
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            self.column_list(&fk.columns),
            self.qualified(&fk.schema_to, &fk.table_to),
            self.column_list(&fk.columns_to)
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(self.foreign_key_action(fk.on_delete));
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(self.foreign_key_action(fk.on_update));
        }
        sql
    }

    /// Generates SQL for adding a primary key.
    fn add_primary_key(&self, pk: &PrimaryKey) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.qualified(&pk.schema, &pk.table),
            self.primary_key_clause(pk)
        )
    }

    /// Generates SQL for adding a unique constraint.
    fn add_unique(&self, unique: &Unique) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.qualified(&unique.schema, &unique.table),
            self.unique_clause(unique)
        )
    }

    /// Generates SQL for adding a foreign key.
    fn add_foreign_key(&self, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.qualified(&fk.schema, &fk.table),
            self.quote_identifier(&fk.name),
            self.foreign_key_clause(fk)
        )
    }

    /// Generates SQL for adding a check constraint.
    fn add_check(&self, check: &Check) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.qualified(&check.schema, &check.table),
            self.check_clause(check)
        )
    }

    /// Generates SQL for dropping a constraint of any kind.
    fn drop_constraint(&self, _kind: EntityKind, schema: &str, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.qualified(schema, table),
            self.quote_identifier(name)
        )
    }

    /// Generates SQL for renaming a constraint.
    fn rename_constraint(
        &self,
        _kind: EntityKind,
        schema: &str,
        table: &str,
        from: &str,
        to: &str,
    ) -> String {
        format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            self.qualified(schema, table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    // ================================================================
    // Indexes
    // ================================================================

    /// Renders one index key part.
    fn index_part(&self, part: &IndexColumn) -> String {
        let mut sql = if part.is_expression {
            format!("({})", part.value)
        } else {
            self.quote_identifier(&part.value)
        };
        if let Some(opclass) = &part.opclass {
            sql.push(' ');
            sql.push_str(opclass);
        }
        if !part.asc {
            sql.push_str(" DESC");
        }
        if part.asc && part.nulls_first {
            sql.push_str(" NULLS FIRST");
        } else if !part.asc && !part.nulls_first {
            sql.push_str(" NULLS LAST");
        }
        sql
    }

    /// Generates SQL for CREATE INDEX.
    fn create_index(&self, index: &Index) -> String {
        let mut sql = String::from("CREATE ");
        if index.is_unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        if index.concurrently && self.capabilities().concurrent_index {
            sql.push_str("CONCURRENTLY ");
        }
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.qualified(&index.schema, &index.table));
        if !index.method.is_empty() {
            sql.push_str(" USING ");
            sql.push_str(&index.method);
        }
        let parts: Vec<String> = index.columns.iter().map(|p| self.index_part(p)).collect();
        let _ = write!(sql, " ({})", parts.join(", "));
        if let Some(with) = &index.with {
            let _ = write!(sql, " WITH ({with})");
        }
        if let Some(predicate) = &index.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }

    /// Generates SQL for DROP INDEX.
    fn drop_index(&self, index: &Index) -> String {
        format!("DROP INDEX {}", self.qualified(&index.schema, &index.name))
    }

    /// Generates SQL for renaming an index.
    fn rename_index(&self, schema: &str, _table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER INDEX {} RENAME TO {}",
            self.qualified(schema, from),
            self.quote_identifier(to)
        )
    }

    // ================================================================
    // Views
    // ================================================================

    /// Renders `WITH (...)` view options.
    fn view_options(&self, view: &View) -> String {
        if view.with.is_empty() {
            return String::new();
        }
        let options: Vec<String> = view.with.iter().map(|(k, v)| format!("{k} = {v}")).collect();
        format!(" WITH ({})", options.join(", "))
    }

    /// Generates SQL for CREATE VIEW. Views without a definition are
    /// managed elsewhere and produce nothing.
    fn create_view(&self, view: &View) -> Option<String> {
        let definition = view.definition.as_ref()?;
        let mut sql = format!(
            "CREATE {}VIEW {}{} AS ({definition})",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.qualified(&view.schema, &view.name),
            self.view_options(view),
        );
        if view.materialized && view.with_no_data {
            sql.push_str(" WITH NO DATA");
        }
        Some(sql)
    }

    /// Generates SQL for DROP VIEW.
    fn drop_view(&self, view: &View) -> String {
        format!(
            "DROP {}VIEW {}",
            if view.materialized { "MATERIALIZED " } else { "" },
            self.qualified(&view.schema, &view.name)
        )
    }

    /// Generates SQL for renaming and/or moving a view.
    fn rename_view(&self, from: &View, to: &View) -> Vec<String> {
        let object = if to.materialized {
            "MATERIALIZED VIEW"
        } else {
            "VIEW"
        };
        self.rename_in_schema(object, &from.schema, &from.name, &to.schema, &to.name)
    }

    /// Generates SQL for redefining a view in place.
    fn alter_view(&self, from: &View, to: &View, delta: &ViewDelta) -> Vec<String> {
        let name = self.qualified(&to.schema, &to.name);
        if delta.definition {
            if let Some(definition) = &to.definition {
                return vec![format!(
                    "CREATE OR REPLACE VIEW {name}{} AS ({definition})",
                    self.view_options(to)
                )];
            }
        }
        let mut sql = Vec::new();
        if delta.with {
            let removed: Vec<&String> = from.with.keys().filter(|k| !to.with.contains_key(*k)).collect();
            if !removed.is_empty() {
                let keys: Vec<&str> = removed.iter().map(|k| k.as_str()).collect();
                sql.push(format!("ALTER VIEW {name} RESET ({})", keys.join(", ")));
            }
            let changed: Vec<String> = to
                .with
                .iter()
                .filter(|(k, v)| from.with.get(*k) != Some(*v))
                .map(|(k, v)| format!("{k} = {v}"))
                .collect();
            if !changed.is_empty() {
                sql.push(format!("ALTER VIEW {name} SET ({})", changed.join(", ")));
            }
        }
        sql
    }

    // ================================================================
    // Policies
    // ================================================================

    /// Renders a policy role list; `public` when empty.
    fn policy_roles(&self, policy: &Policy) -> String {
        if policy.roles.is_empty() {
            return "public".to_string();
        }
        policy
            .roles
            .iter()
            .map(|r| match r.as_str() {
                "public" | "current_role" | "current_user" | "session_user" => r.clone(),
                _ => self.quote_identifier(r),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for CREATE POLICY.
    fn create_policy(&self, policy: &Policy) -> String {
        let mut sql = format!(
            "CREATE POLICY {} ON {} AS {} FOR {} TO {}",
            self.quote_identifier(&policy.name),
            self.qualified(&policy.schema, &policy.table),
            match policy.as_clause {
                PolicyAs::Permissive => "PERMISSIVE",
                PolicyAs::Restrictive => "RESTRICTIVE",
            },
            match policy.for_clause {
                PolicyFor::All => "ALL",
                PolicyFor::Select => "SELECT",
                PolicyFor::Insert => "INSERT",
                PolicyFor::Update => "UPDATE",
                PolicyFor::Delete => "DELETE",
            },
            self.policy_roles(policy)
        );
        if let Some(using) = &policy.using {
            let _ = write!(sql, " USING ({using})");
        }
        if let Some(check) = &policy.with_check {
            let _ = write!(sql, " WITH CHECK ({check})");
        }
        sql
    }

    /// Generates SQL for DROP POLICY.
    fn drop_policy(&self, policy: &Policy) -> String {
        format!(
            "DROP POLICY {} ON {}",
            self.quote_identifier(&policy.name),
            self.qualified(&policy.schema, &policy.table)
        )
    }

    /// Generates SQL for renaming a policy.
    fn rename_policy(&self, from: &Policy, to: &Policy) -> String {
        format!(
            "ALTER POLICY {} ON {} RENAME TO {}",
            self.quote_identifier(&from.name),
            self.qualified(&to.schema, &to.table),
            self.quote_identifier(&to.name)
        )
    }

    /// Generates SQL for ALTER POLICY.
    fn alter_policy(&self, _from: &Policy, to: &Policy, delta: &PolicyDelta) -> Option<String> {
        let mut sql = format!(
            "ALTER POLICY {} ON {}",
            self.quote_identifier(&to.name),
            self.qualified(&to.schema, &to.table)
        );
        let before = sql.len();
        if delta.roles {
            let _ = write!(sql, " TO {}", self.policy_roles(to));
        }
        if delta.using {
            if let Some(using) = &to.using {
                let _ = write!(sql, " USING ({using})");
            }
        }
        if delta.with_check {
            if let Some(check) = &to.with_check {
                let _ = write!(sql, " WITH CHECK ({check})");
            }
        }
        (sql.len() > before).then_some(sql)
    }
}

/// Lowercases a type and collapses whitespace, including around
/// parentheses and commas, so spelling variants compare equal.
pub(crate) fn canonical_type(sql_type: &str) -> String {
    let lowered = sql_type.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_space = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        let tight = matches!(ch, '(' | ')' | ',' | '[' | ']');
        if pending_space && !tight && !out.is_empty() && !out.ends_with(['(', ',', '[']) {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

/// Splits a canonical type into its base name and the parenthesised
/// arguments plus any trailing words.
pub(crate) fn split_type(canonical: &str) -> (&str, &str) {
    canonical
        .find('(')
        .map_or((canonical, ""), |i| (canonical[..i].trim_end(), &canonical[i..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_names_parse() {
        assert_eq!("postgres".parse::<DialectKind>().unwrap(), DialectKind::Postgresql);
        assert_eq!("DSQL".parse::<DialectKind>().unwrap(), DialectKind::Dsql);
        assert!("oracle".parse::<DialectKind>().is_err());
        for kind in DialectKind::ALL {
            assert_eq!(kind.as_str().parse::<DialectKind>().unwrap(), kind);
            assert_eq!(dialect_for(kind).kind(), kind);
        }
    }

    #[test]
    fn canonical_type_collapses_spacing() {
        assert_eq!(canonical_type("  NUMERIC ( 10 , 2 ) "), "numeric(10,2)");
        assert_eq!(canonical_type("Double   Precision"), "double precision");
        assert_eq!(canonical_type("timestamp (3) with time zone"), "timestamp(3) with time zone");
        assert_eq!(canonical_type("text [ ]"), "text[]");
    }

    #[test]
    fn unsupported_statement_is_refused() {
        let dialect = SqliteDialect::new();
        let statement = Statement::CreateSchema {
            schema: Schema::new("auth"),
        };
        let err = dialect.generate_sql(&statement).unwrap_err();
        assert_eq!(err.to_string(), "SQLite does not support CREATE SCHEMA (needed for `auth`)");
    }
}

//! Microsoft SQL Server dialect.

use std::fmt::Write as _;

use super::{canonical_type, split_type, Capabilities, Dialect, DialectKind};
use crate::ddl::{Column, EntityKind, GeneratedKind, Index, Table, View};
use crate::diff::delta::{ColumnDelta, ViewDelta};

/// MSSQL dialect.
///
/// Column defaults are named constraints (`<table>_<column>_default`) so
/// they can be dropped again; renames go through `sp_rename`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    /// Creates a new MSSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capability flags of MSSQL.
    pub const CAPABILITIES: Capabilities = Capabilities {
        schemas: true,
        rename_schema: false,
        enums: false,
        sequences: true,
        roles: false,
        policies: false,
        row_level_security: false,
        views: true,
        materialized_views: false,
        foreign_keys: true,
        check_constraints: true,
        identity_columns: true,
        generated_columns: true,
        alter_column_type: true,
        alter_column_nullability: true,
        alter_column_default: true,
        alter_column_identity: false,
        drop_column: true,
        rename_column: true,
        rename_table: true,
        move_to_schema: true,
        add_constraint: true,
        drop_constraint: true,
        rename_constraint: true,
        rename_index: true,
        recreate_table: false,
        concurrent_index: false,
    };

    fn default_constraint_name(column: &Column) -> String {
        format!("{}_{}_default", column.table, column.name)
    }

    fn schema_or_default<'a>(&self, schema: &'a str) -> &'a str {
        if schema.is_empty() {
            "dbo"
        } else {
            schema
        }
    }

    /// `EXEC sp_rename 'schema.object', 'new'[, 'kind']`.
    fn sp_rename(&self, object: &str, to: &str, kind: Option<&str>) -> String {
        let mut sql = format!(
            "EXEC sp_rename {}, {}",
            self.string_literal(object),
            self.string_literal(to)
        );
        if let Some(kind) = kind {
            sql.push_str(", ");
            sql.push_str(&self.string_literal(kind));
        }
        sql
    }

    fn alter_type_and_nullability(&self, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {}",
            self.qualified(&column.schema, &column.table),
            self.quote_identifier(&column.name),
            self.column_type(column),
            if column.not_null { "NOT NULL" } else { "NULL" }
        )
    }
}

impl Dialect for MssqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mssql
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn default_schema(&self) -> &'static str {
        "dbo"
    }

    fn normalize_type(&self, sql_type: &str) -> String {
        let canonical = canonical_type(sql_type);
        let (base, rest) = split_type(&canonical);
        let base = match base {
            "integer" => "int",
            "character varying" => "varchar",
            "character" => "char",
            "double precision" => "float",
            "dec" | "numeric" => "decimal",
            "rowversion" => "timestamp",
            other => other,
        };
        format!("{base}{rest}")
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn column_type(&self, column: &Column) -> String {
        column.sql_type.clone()
    }

    fn column_definition(&self, column: &Column) -> String {
        let name = self.quote_identifier(&column.name);
        if let Some(generated) = &column.generated {
            let persisted = match generated.kind {
                GeneratedKind::Stored => " PERSISTED",
                GeneratedKind::Virtual => "",
            };
            return format!("{name} AS ({}){persisted}", generated.expression);
        }

        let mut sql = format!("{name} {}", self.column_type(column));
        if let Some(identity) = &column.identity {
            let _ = write!(
                sql,
                " IDENTITY({}, {})",
                identity.start_with.as_deref().unwrap_or("1"),
                identity.increment_by.as_deref().unwrap_or("1")
            );
        } else if let Some(default) = &column.default {
            let _ = write!(
                sql,
                " CONSTRAINT {} DEFAULT {}",
                self.quote_identifier(&Self::default_constraint_name(column)),
                self.default_sql(default)
            );
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }

    fn add_column(&self, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.qualified(&column.schema, &column.table),
            self.column_definition(column)
        )
    }

    fn drop_column(&self, column: &Column) -> Vec<String> {
        let table = self.qualified(&column.schema, &column.table);
        let mut sql = Vec::new();
        if column.default.is_some() && column.identity.is_none() && column.generated.is_none() {
            sql.push(format!(
                "ALTER TABLE {table} DROP CONSTRAINT {}",
                self.quote_identifier(&Self::default_constraint_name(column))
            ));
        }
        sql.push(format!(
            "ALTER TABLE {table} DROP COLUMN {}",
            self.quote_identifier(&column.name)
        ));
        sql
    }

    fn rename_column(&self, from: &Column, to: &Column) -> String {
        let object = format!(
            "{}.{}.{}",
            self.schema_or_default(&to.schema),
            to.table,
            from.name
        );
        self.sp_rename(&object, &to.name, Some("COLUMN"))
    }

    fn alter_column(&self, from: &Column, to: &Column, delta: &ColumnDelta) -> Vec<String> {
        let table = self.qualified(&to.schema, &to.table);
        let mut sql = Vec::new();
        if delta.default && from.default.is_some() {
            sql.push(format!(
                "ALTER TABLE {table} DROP CONSTRAINT {}",
                self.quote_identifier(&Self::default_constraint_name(from))
            ));
        }
        if delta.sql_type || delta.not_null {
            sql.push(self.alter_type_and_nullability(to));
        }
        if delta.default {
            if let Some(default) = &to.default {
                sql.push(format!(
                    "ALTER TABLE {table} ADD CONSTRAINT {} DEFAULT {} FOR {}",
                    self.quote_identifier(&Self::default_constraint_name(to)),
                    self.default_sql(default),
                    self.quote_identifier(&to.name)
                ));
            }
        }
        sql
    }

    fn rename_in_schema(
        &self,
        _object: &str,
        from_schema: &str,
        from_name: &str,
        to_schema: &str,
        to_name: &str,
    ) -> Vec<String> {
        let mut sql = Vec::new();
        if from_schema != to_schema {
            sql.push(format!(
                "ALTER SCHEMA {} TRANSFER {}.{}",
                self.quote_identifier(self.schema_or_default(to_schema)),
                self.quote_identifier(self.schema_or_default(from_schema)),
                self.quote_identifier(from_name)
            ));
        }
        if from_name != to_name {
            let object = format!("{}.{}", self.schema_or_default(to_schema), from_name);
            sql.push(self.sp_rename(&object, to_name, None));
        }
        sql
    }

    fn rename_table(&self, from: &Table, to: &Table) -> Vec<String> {
        self.rename_in_schema("TABLE", &from.schema, &from.name, &to.schema, &to.name)
    }

    fn rename_constraint(
        &self,
        _kind: EntityKind,
        schema: &str,
        _table: &str,
        from: &str,
        to: &str,
    ) -> String {
        let object = format!("{}.{}", self.schema_or_default(schema), from);
        self.sp_rename(&object, to, Some("OBJECT"))
    }

    fn create_index(&self, index: &Index) -> String {
        let parts: Vec<String> = index
            .columns
            .iter()
            .map(|p| {
                let mut part = self.quote_identifier(&p.value);
                if !p.asc {
                    part.push_str(" DESC");
                }
                part
            })
            .collect();
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.qualified(&index.schema, &index.table),
            parts.join(", ")
        );
        if let Some(predicate) = &index.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }

    fn drop_index(&self, index: &Index) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.name),
            self.qualified(&index.schema, &index.table)
        )
    }

    fn rename_index(&self, schema: &str, table: &str, from: &str, to: &str) -> String {
        let object = format!("{}.{table}.{from}", self.schema_or_default(schema));
        self.sp_rename(&object, to, Some("INDEX"))
    }

    fn create_view(&self, view: &View) -> Option<String> {
        let definition = view.definition.as_ref()?;
        Some(format!(
            "CREATE VIEW {} AS {definition}",
            self.qualified(&view.schema, &view.name)
        ))
    }

    fn alter_view(&self, _from: &View, to: &View, delta: &ViewDelta) -> Vec<String> {
        match (&to.definition, delta.definition) {
            (Some(definition), true) => vec![format!(
                "CREATE OR ALTER VIEW {} AS {definition}",
                self.qualified(&to.schema, &to.name)
            )],
            _ => Vec::new(),
        }
    }
}

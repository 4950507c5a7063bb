//! MySQL dialect.

use std::fmt::Write as _;

use super::{canonical_type, Capabilities, Dialect, DialectKind};
use crate::ddl::{Column, EntityKind, GeneratedKind, Index, Table, Unique, View};
use crate::diff::delta::{ColumnDelta, ViewDelta};

/// MySQL dialect. Schemas are databases in MySQL and are not managed here,
/// so every name is unqualified.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capability flags of MySQL.
    pub const CAPABILITIES: Capabilities = Capabilities {
        schemas: false,
        rename_schema: false,
        enums: false,
        sequences: false,
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
        alter_column_identity: true,
        drop_column: true,
        rename_column: true,
        rename_table: true,
        move_to_schema: false,
        add_constraint: true,
        drop_constraint: true,
        rename_constraint: false,
        rename_index: true,
        recreate_table: false,
        concurrent_index: false,
    };
}

impl Dialect for MysqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn default_schema(&self) -> &'static str {
        ""
    }

    fn normalize_type(&self, sql_type: &str) -> String {
        let canonical = canonical_type(sql_type)
            .replace("double precision", "double")
            .replace("character varying", "varchar");
        let (base, rest) = canonical
            .find(['(', ' '])
            .map_or((canonical.as_str(), ""), |i| {
                (&canonical[..i], &canonical[i..])
            });
        match base {
            // Display widths on integer types carry no meaning.
            "int" | "integer" | "bigint" | "smallint" | "mediumint" => {
                let base = if base == "integer" { "int" } else { base };
                let suffix = if rest.starts_with('(') {
                    rest.find(')').map_or("", |i| &rest[i + 1..])
                } else {
                    rest
                };
                let suffix = suffix.trim();
                if suffix.is_empty() {
                    base.to_string()
                } else {
                    format!("{base} {suffix}")
                }
            }
            "bool" | "boolean" => "tinyint(1)".to_string(),
            "numeric" | "dec" => format!("decimal{rest}"),
            _ => canonical.clone(),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn qualified(&self, _schema: &str, name: &str) -> String {
        self.quote_identifier(name)
    }

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
        }
        if column.not_null {
            sql.push_str(" NOT NULL");
        }
        if column.identity.is_some() {
            sql.push_str(" AUTO_INCREMENT");
        } else if let Some(default) = &column.default {
            if column.generated.is_none() {
                sql.push_str(" DEFAULT ");
                sql.push_str(&self.default_sql(default));
            }
        }
        sql
    }

    fn unique_clause(&self, unique: &Unique) -> String {
        format!(
            "CONSTRAINT {} UNIQUE ({})",
            self.quote_identifier(&unique.name),
            self.column_list(&unique.columns)
        )
    }

    fn rename_table(&self, from: &Table, to: &Table) -> Vec<String> {
        vec![format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )]
    }

    fn alter_column(&self, _from: &Column, to: &Column, _delta: &ColumnDelta) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(&to.table),
            self.column_definition(to)
        )]
    }

    fn drop_constraint(&self, kind: EntityKind, _schema: &str, table: &str, name: &str) -> String {
        let table = self.quote_identifier(table);
        let name = self.quote_identifier(name);
        match kind {
            EntityKind::PrimaryKey => format!("ALTER TABLE {table} DROP PRIMARY KEY"),
            EntityKind::Unique => format!("ALTER TABLE {table} DROP INDEX {name}"),
            EntityKind::ForeignKey => format!("ALTER TABLE {table} DROP FOREIGN KEY {name}"),
            EntityKind::Check => format!("ALTER TABLE {table} DROP CHECK {name}"),
            _ => format!("ALTER TABLE {table} DROP CONSTRAINT {name}"),
        }
    }

    fn create_index(&self, index: &Index) -> String {
        let parts: Vec<String> = index.columns.iter().map(|p| self.index_part(p)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            parts.join(", ")
        )
    }

    fn index_part(&self, part: &crate::ddl::IndexColumn) -> String {
        let mut sql = if part.is_expression {
            format!("({})", part.value)
        } else {
            self.quote_identifier(&part.value)
        };
        if !part.asc {
            sql.push_str(" DESC");
        }
        sql
    }

    fn drop_index(&self, index: &Index) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table)
        )
    }

    fn rename_index(&self, _schema: &str, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME INDEX {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    fn create_view(&self, view: &View) -> Option<String> {
        let definition = view.definition.as_ref()?;
        Some(format!(
            "CREATE VIEW {} AS ({definition})",
            self.quote_identifier(&view.name)
        ))
    }

    fn rename_view(&self, from: &View, to: &View) -> Vec<String> {
        vec![format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )]
    }

    fn alter_view(&self, _from: &View, to: &View, delta: &ViewDelta) -> Vec<String> {
        match (&to.definition, delta.definition) {
            (Some(definition), true) => vec![format!(
                "CREATE OR REPLACE VIEW {} AS ({definition})",
                self.quote_identifier(&to.name)
            )],
            _ => Vec::new(),
        }
    }
}

//! DSQL dialect: PostgreSQL-compatible with a reduced DDL surface.
//!
//! No enums, sequences, foreign keys, policies or materialized views, and no
//! in-place column alterations. Indexes are always built asynchronously.

use super::{postgres, Capabilities, Dialect, DialectKind};
use crate::ddl::Index;

/// DSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DsqlDialect;

impl DsqlDialect {
    /// Creates a new DSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capability flags of DSQL.
    pub const CAPABILITIES: Capabilities = Capabilities {
        schemas: true,
        rename_schema: false,
        enums: false,
        sequences: false,
        roles: true,
        policies: false,
        row_level_security: false,
        views: true,
        materialized_views: false,
        foreign_keys: false,
        check_constraints: true,
        identity_columns: false,
        generated_columns: false,
        alter_column_type: false,
        alter_column_nullability: false,
        alter_column_default: false,
        alter_column_identity: false,
        drop_column: false,
        rename_column: true,
        rename_table: true,
        move_to_schema: false,
        add_constraint: false,
        drop_constraint: false,
        rename_constraint: false,
        rename_index: false,
        recreate_table: false,
        concurrent_index: false,
    };
}

impl Dialect for DsqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Dsql
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn normalize_type(&self, sql_type: &str) -> String {
        postgres::normalize(sql_type)
    }

    fn create_index(&self, index: &Index) -> String {
        let parts: Vec<String> = index.columns.iter().map(|p| self.index_part(p)).collect();
        format!(
            "CREATE {}INDEX ASYNC {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.qualified(&index.schema, &index.table),
            parts.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, IndexColumn};
    use crate::diff::delta::ColumnDelta;
    use crate::error::Error;
    use crate::statements::Statement;

    #[test]
    fn index_is_async() {
        let index = Index {
            schema: "public".into(),
            table: "users".into(),
            name: "users_email_index".into(),
            name_explicit: false,
            columns: vec![IndexColumn::column("email")],
            is_unique: false,
            method: "btree".into(),
            where_clause: None,
            concurrently: true,
            with: None,
        };
        let out = DsqlDialect::new()
            .generate_sql(&Statement::CreateIndex { index })
            .unwrap();
        assert_eq!(
            out,
            ["CREATE INDEX ASYNC \"users_email_index\" ON \"users\" (\"email\")"]
        );
    }

    #[test]
    fn type_change_is_refused() {
        let from = Column::new("public", "users", "id", "integer");
        let to = Column::new("public", "users", "id", "bigint");
        let err = DsqlDialect::new()
            .generate_sql(&Statement::AlterColumn {
                from,
                to,
                delta: ColumnDelta {
                    sql_type: true,
                    ..ColumnDelta::default()
                },
            })
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported(ref ops) if ops.len() == 1));
        assert!(err.to_string().contains("DSQL does not support ALTER COLUMN TYPE"));
    }
}

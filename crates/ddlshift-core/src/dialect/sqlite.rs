//! SQLite dialect.
//!
//! SQLite's `ALTER TABLE` only renames tables and adds, drops or renames
//! columns. Everything else goes through table recreation.

use super::{canonical_type, Capabilities, Dialect, DialectKind};
use crate::ddl::{Check, Column, ForeignKey, Index, PrimaryKey, Table, Unique, View};
use crate::diff::delta::ViewDelta;

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capability flags of SQLite.
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
        identity_columns: false,
        generated_columns: true,
        alter_column_type: false,
        alter_column_nullability: false,
        alter_column_default: false,
        alter_column_identity: false,
        drop_column: true,
        rename_column: true,
        rename_table: true,
        move_to_schema: false,
        add_constraint: false,
        drop_constraint: false,
        rename_constraint: false,
        rename_index: false,
        recreate_table: true,
        concurrent_index: false,
    };
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn default_schema(&self) -> &'static str {
        ""
    }

    /// Reduces a declared type to its storage affinity, following SQLite's
    /// own column affinity rules.
    fn normalize_type(&self, sql_type: &str) -> String {
        let t = canonical_type(sql_type);
        let affinity = if t.contains("int") {
            "integer"
        } else if t.contains("char") || t.contains("clob") || t.contains("text") {
            "text"
        } else if t.is_empty() || t.contains("blob") {
            "blob"
        } else if t.contains("real") || t.contains("floa") || t.contains("doub") {
            "real"
        } else {
            "numeric"
        };
        affinity.to_string()
    }

    fn qualified(&self, _schema: &str, name: &str) -> String {
        self.quote_identifier(name)
    }

    fn rename_table(&self, from: &Table, to: &Table) -> Vec<String> {
        vec![format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(&from.name),
            self.quote_identifier(&to.name)
        )]
    }

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
        let temp = format!("__new_{}", table.name);
        let mut sql = vec!["PRAGMA foreign_keys=OFF".to_string()];
        sql.extend(self.create_table(
            &Table {
                name: temp.clone(),
                ..table.clone()
            },
            columns,
            pk,
            uniques,
            checks,
            fks,
        ));
        if !copy_columns.is_empty() {
            let list = self.column_list(copy_columns);
            sql.push(format!(
                "INSERT INTO {}({list}) SELECT {list} FROM {}",
                self.quote_identifier(&temp),
                self.quote_identifier(&table.name)
            ));
        }
        sql.push(self.drop_table(table));
        sql.push(format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(&temp),
            self.quote_identifier(&table.name)
        ));
        sql.push("PRAGMA foreign_keys=ON".to_string());
        for index in indexes {
            sql.push(self.create_index(index));
        }
        sql
    }

    fn create_index(&self, index: &Index) -> String {
        let parts: Vec<String> = index.columns.iter().map(|p| self.index_part(p)).collect();
        let mut sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.is_unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            parts.join(", ")
        );
        if let Some(predicate) = &index.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
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
        format!("DROP INDEX {}", self.quote_identifier(&index.name))
    }

    fn create_view(&self, view: &View) -> Option<String> {
        let definition = view.definition.as_ref()?;
        Some(format!(
            "CREATE VIEW {} AS {definition}",
            self.quote_identifier(&view.name)
        ))
    }

    fn rename_view(&self, from: &View, to: &View) -> Vec<String> {
        let mut sql = vec![self.drop_view(from)];
        sql.extend(self.create_view(to));
        sql
    }

    fn alter_view(&self, from: &View, to: &View, delta: &ViewDelta) -> Vec<String> {
        if !delta.definition {
            return Vec::new();
        }
        let mut sql = vec![self.drop_view(from)];
        sql.extend(self.create_view(to));
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::IndexColumn;
    use crate::statements::Statement;

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    #[test]
    fn test_type_affinity() {
        let d = dialect();
        assert_eq!(d.normalize_type("BIGINT"), "integer");
        assert_eq!(d.normalize_type("varchar(255)"), "text");
        assert_eq!(d.normalize_type("DOUBLE"), "real");
        assert_eq!(d.normalize_type(""), "blob");
        assert_eq!(d.normalize_type("decimal(10,2)"), "numeric");
    }

    #[test]
    fn test_create_table_with_inline_fk() {
        let fk = ForeignKey {
            schema: String::new(),
            table: "posts".into(),
            name: "posts_author_id_users_id_fk".into(),
            name_explicit: false,
            columns: vec!["author_id".into()],
            schema_to: String::new(),
            table_to: "users".into(),
            columns_to: vec!["id".into()],
            on_update: crate::ddl::ForeignKeyAction::NoAction,
            on_delete: crate::ddl::ForeignKeyAction::NoAction,
        };
        let out = dialect()
            .generate_sql(&Statement::CreateTable {
                table: Table::new("", "posts"),
                columns: vec![Column::new("", "posts", "author_id", "integer")],
                pk: None,
                uniques: vec![],
                checks: vec![],
                fks: vec![fk],
            })
            .unwrap();
        assert_eq!(
            out,
            ["CREATE TABLE \"posts\" (\n\t\"author_id\" integer,\n\tCONSTRAINT \"posts_author_id_users_id_fk\" FOREIGN KEY (\"author_id\") REFERENCES \"users\"(\"id\")\n)"]
        );
    }

    #[test]
    fn test_recreate_table() {
        let index = Index {
            schema: String::new(),
            table: "users".into(),
            name: "users_name_index".into(),
            name_explicit: false,
            columns: vec![IndexColumn::column("name")],
            is_unique: false,
            method: String::new(),
            where_clause: None,
            concurrently: false,
            with: None,
        };
        let out = dialect()
            .generate_sql(&Statement::RecreateTable {
                table: Table::new("", "users"),
                columns: vec![
                    Column::new("", "users", "id", "integer").not_null(),
                    Column::new("", "users", "name", "text").not_null(),
                ],
                pk: None,
                uniques: vec![],
                checks: vec![],
                fks: vec![],
                indexes: vec![index],
                copy_columns: vec!["id".into(), "name".into()],
            })
            .unwrap();
        assert_eq!(out.first().map(String::as_str), Some("PRAGMA foreign_keys=OFF"));
        assert!(out[1].starts_with("CREATE TABLE \"__new_users\""));
        assert_eq!(
            out[2],
            "INSERT INTO \"__new_users\"(\"id\", \"name\") SELECT \"id\", \"name\" FROM \"users\""
        );
        assert_eq!(out[3], "DROP TABLE \"users\"");
        assert_eq!(out[4], "ALTER TABLE \"__new_users\" RENAME TO \"users\"");
        assert_eq!(out[5], "PRAGMA foreign_keys=ON");
        assert_eq!(out[6], "CREATE INDEX \"users_name_index\" ON \"users\" (\"name\")");
    }

    #[test]
    fn test_schemas_are_not_supported() {
        let err = dialect()
            .generate_sql(&Statement::CreateSchema {
                schema: crate::ddl::Schema::new("x"),
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("SQLite does not support"));
    }
}

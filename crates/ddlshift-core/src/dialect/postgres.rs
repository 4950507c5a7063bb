//! PostgreSQL dialect.

use super::{canonical_type, split_type, Capabilities, Dialect, DialectKind};

/// PostgreSQL dialect: the full feature set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Capability flags of PostgreSQL.
    pub const CAPABILITIES: Capabilities = Capabilities {
        schemas: true,
        rename_schema: true,
        enums: true,
        sequences: true,
        roles: true,
        policies: true,
        row_level_security: true,
        views: true,
        materialized_views: true,
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
        move_to_schema: true,
        add_constraint: true,
        drop_constraint: true,
        rename_constraint: true,
        rename_index: true,
        recreate_table: false,
        concurrent_index: true,
    };
}

/// Maps PostgreSQL type aliases to one spelling.
pub(crate) fn normalize(sql_type: &str) -> String {
    let canonical = canonical_type(sql_type)
        .replace(" without time zone", "")
        .replace("timestamptz", "timestamp with time zone")
        .replace("timetz", "time with time zone");
    let (base, rest) = split_type(&canonical);
    let base = match base {
        "int" | "int4" => "integer",
        "int2" => "smallint",
        "int8" => "bigint",
        "serial4" => "serial",
        "serial8" => "bigserial",
        "serial2" => "smallserial",
        "bool" => "boolean",
        "float4" => "real",
        "float8" | "double" => "double precision",
        "decimal" => "numeric",
        "character varying" => "varchar",
        "character" => "char",
        other => other,
    };
    format!("{base}{rest}")
}

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgresql
    }

    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    fn normalize_type(&self, sql_type: &str) -> String {
        normalize(sql_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{
        Column, ColumnDefault, Enum, ForeignKey, ForeignKeyAction, Identity, IdentityKind, Index,
        IndexColumn, Policy, PolicyAs, PolicyFor, PrimaryKey, Table,
    };
    use crate::diff::delta::ColumnDelta;
    use crate::statements::Statement;

    fn dialect() -> PostgresDialect {
        PostgresDialect::new()
    }

    fn sql(statement: Statement) -> Vec<String> {
        dialect().generate_sql(&statement).unwrap()
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize("INT4"), "integer");
        assert_eq!(normalize("character varying(255)"), "varchar(255)");
        assert_eq!(normalize("timestamp(3) without time zone"), "timestamp(3)");
        assert_eq!(normalize("timestamptz"), "timestamp with time zone");
        assert_eq!(normalize("decimal(10, 2)"), "numeric(10,2)");
    }

    #[test]
    fn test_create_table_with_inline_pk() {
        let out = sql(Statement::CreateTable {
            table: Table::new("public", "users"),
            columns: vec![
                Column::new("public", "users", "id", "uuid").not_null(),
                Column::new("public", "users", "name", "text").not_null(),
            ],
            pk: Some(PrimaryKey {
                schema: "public".into(),
                table: "users".into(),
                name: "users_pk".into(),
                name_explicit: false,
                columns: vec!["id".into()],
            }),
            uniques: vec![],
            checks: vec![],
            fks: vec![],
        });
        assert_eq!(
            out,
            ["CREATE TABLE \"users\" (\n\t\"id\" uuid NOT NULL,\n\t\"name\" text NOT NULL,\n\tCONSTRAINT \"users_pk\" PRIMARY KEY (\"id\")\n)"]
        );
    }

    #[test]
    fn test_schema_qualified_names() {
        let out = sql(Statement::DropTable {
            table: Table::new("auth", "sessions"),
        });
        assert_eq!(out, ["DROP TABLE \"auth\".\"sessions\""]);
    }

    #[test]
    fn test_alter_column_type_and_default() {
        let from = Column::new("public", "t", "n", "integer")
            .default_value(ColumnDefault::expression("0"));
        let to = Column::new("public", "t", "n", "bigint")
            .default_value(ColumnDefault::expression("1"));
        let out = sql(Statement::AlterColumn {
            from,
            to,
            delta: ColumnDelta {
                sql_type: true,
                default: true,
                ..ColumnDelta::default()
            },
        });
        assert_eq!(
            out,
            [
                "ALTER TABLE \"t\" ALTER COLUMN \"n\" DROP DEFAULT",
                "ALTER TABLE \"t\" ALTER COLUMN \"n\" SET DATA TYPE bigint USING \"n\"::bigint",
                "ALTER TABLE \"t\" ALTER COLUMN \"n\" SET DEFAULT 1",
            ]
        );
    }

    #[test]
    fn test_identity_column() {
        let mut column = Column::new("public", "t", "id", "integer").not_null();
        column.identity = Some(Identity {
            start_with: Some("10".into()),
            ..Identity::new(IdentityKind::ByDefault)
        });
        let out = sql(Statement::AddColumn { column });
        assert_eq!(
            out,
            ["ALTER TABLE \"t\" ADD COLUMN \"id\" integer GENERATED BY DEFAULT AS IDENTITY (START WITH 10) NOT NULL"]
        );
    }

    #[test]
    fn test_enum_statements() {
        let mood = Enum {
            schema: "public".into(),
            name: "mood".into(),
            values: vec!["sad".into(), "happy".into()],
        };
        assert_eq!(
            sql(Statement::CreateEnum {
                enum_type: mood.clone()
            }),
            ["CREATE TYPE \"mood\" AS ENUM ('sad', 'happy')"]
        );
        assert_eq!(
            sql(Statement::AlterEnumAddValue {
                enum_type: mood,
                value: "ok".into(),
                before: Some("happy".into()),
            }),
            ["ALTER TYPE \"mood\" ADD VALUE 'ok' BEFORE 'happy'"]
        );
    }

    #[test]
    fn test_foreign_key_and_index() {
        let fk = ForeignKey {
            schema: "public".into(),
            table: "posts".into(),
            name: "posts_author_id_users_id_fk".into(),
            name_explicit: false,
            columns: vec!["author_id".into()],
            schema_to: "public".into(),
            table_to: "users".into(),
            columns_to: vec!["id".into()],
            on_update: ForeignKeyAction::NoAction,
            on_delete: ForeignKeyAction::Cascade,
        };
        assert_eq!(
            sql(Statement::AddForeignKey { fk }),
            ["ALTER TABLE \"posts\" ADD CONSTRAINT \"posts_author_id_users_id_fk\" FOREIGN KEY (\"author_id\") REFERENCES \"users\"(\"id\") ON DELETE CASCADE"]
        );

        let index = Index {
            schema: "public".into(),
            table: "users".into(),
            name: "users_email_index".into(),
            name_explicit: false,
            columns: vec![IndexColumn {
                asc: false,
                ..IndexColumn::column("email")
            }],
            is_unique: true,
            method: "btree".into(),
            where_clause: Some("deleted_at IS NULL".into()),
            concurrently: true,
            with: None,
        };
        assert_eq!(
            sql(Statement::CreateIndex { index }),
            ["CREATE UNIQUE INDEX CONCURRENTLY \"users_email_index\" ON \"users\" USING btree (\"email\" DESC NULLS LAST) WHERE deleted_at IS NULL"]
        );
    }

    #[test]
    fn test_policy() {
        let policy = Policy {
            schema: "public".into(),
            table: "docs".into(),
            name: "owner_only".into(),
            as_clause: PolicyAs::Permissive,
            for_clause: PolicyFor::Select,
            roles: vec!["app_user".into()],
            using: Some("owner = current_user".into()),
            with_check: None,
        };
        assert_eq!(
            sql(Statement::CreatePolicy { policy }),
            ["CREATE POLICY \"owner_only\" ON \"docs\" AS PERMISSIVE FOR SELECT TO \"app_user\" USING (owner = current_user)"]
        );
    }
}

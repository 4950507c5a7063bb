//! Catalog entity records and the typed store that holds them.
//!
//! Every catalog object is a plain record identified by a natural key
//! ([`EntityKey`]). Records of all kinds travel together as the [`Entity`]
//! sum type, which is also the JSON shape persisted in snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod naming;
mod store;

pub use store::{validate_entity, Collection, Ddl, Filter};

/// JSON field that carries the entity kind in serialized entities.
pub const ENTITY_TAG: &str = "entityType";

/// The kinds of catalog objects the store knows about.
///
/// [`EntityKind::ALL`] lists them in the order the diff engine visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Namespace (`CREATE SCHEMA`).
    Schema,
    /// Enumerated type.
    Enum,
    /// Standalone sequence.
    Sequence,
    /// Table.
    Table,
    /// Table column.
    Column,
    /// Primary key constraint.
    PrimaryKey,
    /// Unique constraint.
    Unique,
    /// Foreign key constraint.
    ForeignKey,
    /// Check constraint.
    Check,
    /// Index.
    Index,
    /// View or materialized view.
    View,
    /// Database role.
    Role,
    /// Row-level security policy.
    Policy,
}

impl EntityKind {
    /// All kinds, in diff order.
    pub const ALL: [Self; 13] = [
        Self::Schema,
        Self::Enum,
        Self::Sequence,
        Self::Table,
        Self::Column,
        Self::PrimaryKey,
        Self::Unique,
        Self::ForeignKey,
        Self::Check,
        Self::Index,
        Self::View,
        Self::Role,
        Self::Policy,
    ];

    /// Returns the tag used for this kind in serialized entities.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Enum => "enum",
            Self::Sequence => "sequence",
            Self::Table => "table",
            Self::Column => "column",
            Self::PrimaryKey => "primaryKey",
            Self::Unique => "unique",
            Self::ForeignKey => "foreignKey",
            Self::Check => "check",
            Self::Index => "index",
            Self::View => "view",
            Self::Role => "role",
            Self::Policy => "policy",
        }
    }

    /// Whether entities of this kind live inside a table.
    #[must_use]
    pub const fn table_scoped(self) -> bool {
        matches!(
            self,
            Self::Column
                | Self::PrimaryKey
                | Self::Unique
                | Self::ForeignKey
                | Self::Check
                | Self::Index
                | Self::Policy
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PrimaryKey => "primary key",
            Self::ForeignKey => "foreign key",
            Self::Unique => "unique constraint",
            Self::Check => "check constraint",
            other => other.tag(),
        };
        f.write_str(text)
    }
}

/// Natural key of an entity: `schema`, `table` and `name`, where the
/// enclosing parts are empty when the kind (or dialect) has no such scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct EntityKey {
    /// Enclosing schema, empty for unscoped kinds and schemaless dialects.
    pub schema: String,
    /// Enclosing table, empty for kinds that do not live inside a table.
    pub table: String,
    /// Entity name.
    pub name: String,
}

impl EntityKey {
    /// Key of an unscoped entity (schema, role).
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Key of a schema-scoped entity (table, enum, sequence, view).
    #[must_use]
    pub fn in_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: String::new(),
            name: name.into(),
        }
    }

    /// Key of a table-scoped entity (column, constraint, index, policy).
    #[must_use]
    pub fn in_table(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.schema, &self.table, &self.name]
            .into_iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        f.write_str(&parts.join("."))
    }
}

/// Implemented by every entity record so the store and the diff engine
/// can treat all kinds uniformly.
pub trait DdlEntity:
    Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Kind of this record.
    const KIND: EntityKind;

    /// Natural key.
    fn key(&self) -> EntityKey;

    /// Wraps the record in the [`Entity`] sum type.
    fn into_entity(self) -> Entity;

    /// Unwraps a record of this kind.
    fn from_entity(entity: Entity) -> Option<Self>;

    /// The collection of this kind inside a store.
    fn collection(ddl: &Ddl) -> &Collection<Self>;

    /// Mutable access to the collection of this kind inside a store.
    fn collection_mut(ddl: &mut Ddl) -> &mut Collection<Self>;
}

macro_rules! ddl_entity {
    ($ty:ident, $field:ident, |$e:ident| $key:expr) => {
        impl DdlEntity for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn key(&self) -> EntityKey {
                let $e = self;
                $key
            }

            fn into_entity(self) -> Entity {
                Entity::$ty(self)
            }

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn collection(ddl: &Ddl) -> &Collection<Self> {
                &ddl.$field
            }

            fn collection_mut(ddl: &mut Ddl) -> &mut Collection<Self> {
                &mut ddl.$field
            }
        }

        impl From<$ty> for Entity {
            fn from(value: $ty) -> Self {
                Entity::$ty(value)
            }
        }
    };
}

// ================================================================
// Entity records
// ================================================================

/// A namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Schema name.
    pub name: String,
}

impl Schema {
    /// Creates a schema record.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An enumerated type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enum {
    /// Enclosing schema.
    pub schema: String,
    /// Type name.
    pub name: String,
    /// Labels in declaration order.
    pub values: Vec<String>,
}

/// A standalone sequence. Numeric bounds are kept as text so 64-bit
/// extremes survive the JSON round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    /// Enclosing schema.
    pub schema: String,
    /// Sequence name.
    pub name: String,
    /// `INCREMENT BY`.
    pub increment_by: Option<String>,
    /// `MINVALUE`.
    pub min_value: Option<String>,
    /// `MAXVALUE`.
    pub max_value: Option<String>,
    /// `START WITH`.
    pub start_with: Option<String>,
    /// `CACHE`.
    pub cache: Option<i64>,
    /// `CYCLE`.
    pub cycle: bool,
}

/// A database role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Role {
    /// Role name.
    pub name: String,
    /// `SUPERUSER`.
    pub superuser: bool,
    /// `CREATEDB`.
    pub create_db: bool,
    /// `CREATEROLE`.
    pub create_role: bool,
    /// `INHERIT`.
    pub inherit: bool,
    /// `LOGIN`.
    pub can_login: bool,
    /// `REPLICATION`.
    pub replication: bool,
    /// `BYPASSRLS`.
    pub bypass_rls: bool,
    /// `CONNECTION LIMIT`.
    pub conn_limit: Option<i32>,
    /// `PASSWORD`.
    pub password: Option<String>,
    /// `VALID UNTIL`.
    pub valid_until: Option<String>,
}

impl Role {
    /// Creates a role with PostgreSQL's default attributes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superuser: false,
            create_db: false,
            create_role: false,
            inherit: true,
            can_login: false,
            replication: false,
            bypass_rls: false,
            conn_limit: None,
            password: None,
            valid_until: None,
        }
    }
}

/// A table. Columns and constraints are separate entities keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// Enclosing schema.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// Whether row-level security is enabled.
    pub is_rls_enabled: bool,
}

impl Table {
    /// Creates a table record.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            is_rls_enabled: false,
        }
    }
}

/// A column default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefault {
    /// SQL text of the default.
    pub value: String,
    /// Whether `value` is an expression (rendered verbatim) rather than a
    /// string literal (rendered quoted).
    pub expression: bool,
}

impl ColumnDefault {
    /// A default expression such as `now()`.
    #[must_use]
    pub fn expression(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expression: true,
        }
    }

    /// A string literal default.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expression: false,
        }
    }

    /// Renders the default as SQL.
    #[must_use]
    pub fn to_sql(&self) -> String {
        if self.expression {
            self.value.clone()
        } else {
            format!("'{}'", self.value.replace('\'', "''"))
        }
    }
}

/// Storage of a generated column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeneratedKind {
    /// Computed on write and stored.
    Stored,
    /// Computed on read.
    Virtual,
}

/// A generated (computed) column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    /// Generating expression.
    pub expression: String,
    /// Storage kind.
    pub kind: GeneratedKind,
}

/// `GENERATED ALWAYS` vs `GENERATED BY DEFAULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdentityKind {
    /// `GENERATED ALWAYS AS IDENTITY`.
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`.
    ByDefault,
}

/// An identity column definition with its implicit sequence parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Identity kind.
    pub kind: IdentityKind,
    /// `INCREMENT BY`.
    pub increment_by: Option<String>,
    /// `MINVALUE`.
    pub min_value: Option<String>,
    /// `MAXVALUE`.
    pub max_value: Option<String>,
    /// `START WITH`.
    pub start_with: Option<String>,
    /// `CACHE`.
    pub cache: Option<i64>,
    /// `CYCLE`.
    pub cycle: bool,
}

impl Identity {
    /// An identity with database defaults for every sequence parameter.
    #[must_use]
    pub const fn new(kind: IdentityKind) -> Self {
        Self {
            kind,
            increment_by: None,
            min_value: None,
            max_value: None,
            start_with: None,
            cache: None,
            cycle: false,
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Enclosing schema.
    pub schema: String,
    /// Enclosing table.
    pub table: String,
    /// Column name.
    pub name: String,
    /// SQL type as written, e.g. `varchar(255)` or an enum name.
    #[serde(rename = "type")]
    pub sql_type: String,
    /// Schema of a user-defined type (enum), if any.
    pub type_schema: Option<String>,
    /// Array dimensions (`0` for scalars).
    pub dimensions: u32,
    /// `NOT NULL`.
    pub not_null: bool,
    /// `DEFAULT`.
    pub default: Option<ColumnDefault>,
    /// `GENERATED ALWAYS AS (...)`.
    pub generated: Option<Generated>,
    /// `GENERATED ... AS IDENTITY`.
    pub identity: Option<Identity>,
}

impl Column {
    /// Creates a nullable column without default.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            type_schema: None,
            dimensions: 0,
            not_null: false,
            default: None,
            generated: None,
            identity: None,
        }
    }

    /// Marks the column `NOT NULL`.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Sets the default.
    #[must_use]
    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// Referential action for `ON UPDATE` / `ON DELETE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForeignKeyAction {
    /// `NO ACTION`.
    #[default]
    NoAction,
    /// `RESTRICT`.
    Restrict,
    /// `CASCADE`.
    Cascade,
    /// `SET NULL`.
    SetNull,
    /// `SET DEFAULT`.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKey {
    /// Enclosing schema.
    pub schema: String,
    /// Enclosing table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Whether `name` was chosen by the user rather than derived.
    pub name_explicit: bool,
    /// Member columns in key order.
    pub columns: Vec<String>,
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unique {
    /// Enclosing schema.
    pub schema: String,
    /// Enclosing table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Whether `name` was chosen by the user rather than derived.
    pub name_explicit: bool,
    /// Member columns.
    pub columns: Vec<String>,
    /// `NULLS NOT DISTINCT`.
    pub nulls_not_distinct: bool,
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
    /// Enclosing schema.
    pub schema: String,
    /// Referencing table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Whether `name` was chosen by the user rather than derived.
    pub name_explicit: bool,
    /// Referencing columns.
    pub columns: Vec<String>,
    /// Schema of the referenced table.
    pub schema_to: String,
    /// Referenced table.
    pub table_to: String,
    /// Referenced columns.
    pub columns_to: Vec<String>,
    /// `ON UPDATE`.
    pub on_update: ForeignKeyAction,
    /// `ON DELETE`.
    pub on_delete: ForeignKeyAction,
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    /// Enclosing schema.
    pub schema: String,
    /// Enclosing table.
    pub table: String,
    /// Constraint name.
    pub name: String,
    /// Whether `name` was chosen by the user rather than derived.
    pub name_explicit: bool,
    /// Check expression.
    pub value: String,
}

/// One key part of an index: a column reference or an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexColumn {
    /// Column name, or expression text when `is_expression` is set.
    pub value: String,
    /// Whether `value` is an expression.
    pub is_expression: bool,
    /// Ascending order.
    pub asc: bool,
    /// `NULLS FIRST`.
    pub nulls_first: bool,
    /// Operator class.
    pub opclass: Option<String>,
}

impl IndexColumn {
    /// An ascending column reference with default null ordering.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            value: name.into(),
            is_expression: false,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }

    /// An ascending expression key part.
    #[must_use]
    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            value: expr.into(),
            is_expression: true,
            asc: true,
            nulls_first: false,
            opclass: None,
        }
    }
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Enclosing schema.
    pub schema: String,
    /// Indexed table.
    pub table: String,
    /// Index name.
    pub name: String,
    /// Whether `name` was chosen by the user rather than derived.
    pub name_explicit: bool,
    /// Key parts in order.
    pub columns: Vec<IndexColumn>,
    /// `UNIQUE`.
    pub is_unique: bool,
    /// Access method, e.g. `btree`.
    pub method: String,
    /// Partial index predicate.
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// `CONCURRENTLY`.
    pub concurrently: bool,
    /// Storage parameters (`WITH (...)`).
    pub with: Option<String>,
}

/// `AS PERMISSIVE` / `AS RESTRICTIVE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyAs {
    /// Policies are OR-ed together.
    #[default]
    Permissive,
    /// Policies are AND-ed together.
    Restrictive,
}

/// The command a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyFor {
    /// Every command.
    #[default]
    All,
    /// `SELECT`.
    Select,
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
}

/// A row-level security policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Enclosing schema.
    pub schema: String,
    /// Protected table.
    pub table: String,
    /// Policy name.
    pub name: String,
    /// Permissive or restrictive.
    #[serde(rename = "as")]
    pub as_clause: PolicyAs,
    /// Command the policy applies to.
    #[serde(rename = "for")]
    pub for_clause: PolicyFor,
    /// Roles the policy applies to (`public` when empty).
    pub roles: Vec<String>,
    /// `USING` expression.
    pub using: Option<String>,
    /// `WITH CHECK` expression.
    pub with_check: Option<String>,
}

/// A view or materialized view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Enclosing schema.
    pub schema: String,
    /// View name.
    pub name: String,
    /// Query text. `None` for views managed outside the schema.
    pub definition: Option<String>,
    /// `MATERIALIZED`.
    pub materialized: bool,
    /// `WITH (...)` options, sorted by key.
    pub with: BTreeMap<String, String>,
    /// `WITH NO DATA` (materialized only).
    pub with_no_data: bool,
}

ddl_entity!(Schema, schemas, |e| EntityKey::root(&e.name));
ddl_entity!(Enum, enums, |e| EntityKey::in_schema(&e.schema, &e.name));
ddl_entity!(Sequence, sequences, |e| EntityKey::in_schema(&e.schema, &e.name));
ddl_entity!(Role, roles, |e| EntityKey::root(&e.name));
ddl_entity!(Table, tables, |e| EntityKey::in_schema(&e.schema, &e.name));
ddl_entity!(Column, columns, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(PrimaryKey, pks, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(Unique, uniques, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(ForeignKey, fks, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(Check, checks, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(Index, indexes, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));
ddl_entity!(View, views, |e| EntityKey::in_schema(&e.schema, &e.name));
ddl_entity!(Policy, policies, |e| EntityKey::in_table(
    &e.schema, &e.table, &e.name
));

/// Any catalog entity. Serialized with an `entityType` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entityType", rename_all = "camelCase")]
pub enum Entity {
    /// See [`Schema`].
    Schema(Schema),
    /// See [`Enum`].
    Enum(Enum),
    /// See [`Sequence`].
    Sequence(Sequence),
    /// See [`Table`].
    Table(Table),
    /// See [`Column`].
    Column(Column),
    /// See [`PrimaryKey`].
    PrimaryKey(PrimaryKey),
    /// See [`Unique`].
    Unique(Unique),
    /// See [`ForeignKey`].
    ForeignKey(ForeignKey),
    /// See [`Check`].
    Check(Check),
    /// See [`Index`].
    Index(Index),
    /// See [`View`].
    View(View),
    /// See [`Role`].
    Role(Role),
    /// See [`Policy`].
    Policy(Policy),
}

impl Entity {
    /// Kind of the wrapped record.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Schema(_) => EntityKind::Schema,
            Self::Enum(_) => EntityKind::Enum,
            Self::Sequence(_) => EntityKind::Sequence,
            Self::Table(_) => EntityKind::Table,
            Self::Column(_) => EntityKind::Column,
            Self::PrimaryKey(_) => EntityKind::PrimaryKey,
            Self::Unique(_) => EntityKind::Unique,
            Self::ForeignKey(_) => EntityKind::ForeignKey,
            Self::Check(_) => EntityKind::Check,
            Self::Index(_) => EntityKind::Index,
            Self::View(_) => EntityKind::View,
            Self::Role(_) => EntityKind::Role,
            Self::Policy(_) => EntityKind::Policy,
        }
    }

    /// Natural key of the wrapped record.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Schema(e) => e.key(),
            Self::Enum(e) => e.key(),
            Self::Sequence(e) => e.key(),
            Self::Table(e) => e.key(),
            Self::Column(e) => e.key(),
            Self::PrimaryKey(e) => e.key(),
            Self::Unique(e) => e.key(),
            Self::ForeignKey(e) => e.key(),
            Self::Check(e) => e.key(),
            Self::Index(e) => e.key(),
            Self::View(e) => e.key(),
            Self::Role(e) => e.key(),
            Self::Policy(e) => e.key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display_skips_empty_scopes() {
        assert_eq!(EntityKey::root("admin").to_string(), "admin");
        assert_eq!(EntityKey::in_schema("", "users").to_string(), "users");
        assert_eq!(
            EntityKey::in_table("public", "users", "email").to_string(),
            "public.users.email"
        );
    }

    #[test]
    fn entity_json_carries_kind_tag() {
        let entity = Entity::Column(Column::new("public", "users", "id", "uuid").not_null());
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json[ENTITY_TAG], "column");
        assert_eq!(json["type"], "uuid");
        assert_eq!(json["notNull"], true);

        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.kind(), EntityKind::Column);
    }

    #[test]
    fn kind_tags_match_serde_names() {
        for kind in EntityKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.tag());
        }
    }

    #[test]
    fn default_literal_is_quoted() {
        assert_eq!(ColumnDefault::literal("it's").to_sql(), "'it''s'");
        assert_eq!(ColumnDefault::expression("now()").to_sql(), "now()");
    }
}

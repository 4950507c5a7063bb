//! Interim schema: the flat, loosely specified input that the builder turns
//! into a validated [`Ddl`].
//!
//! Every field of the interim records has a default, so declared schemas can
//! be written by hand as JSON. Names of constraints and indexes are
//! optional; missing ones are synthesized with the default naming rules and
//! marked `nameExplicit = false`. Missing schemas fall back to
//! [`BuildOptions::default_schema`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use convert_case::{Case, Casing as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ddl::{
    naming, validate_entity, Check, Column, ColumnDefault, Ddl, EntityKey, EntityKind, Enum,
    Filter, ForeignKey, ForeignKeyAction, Generated, Identity, Index, IndexColumn, Policy,
    PolicyAs, PolicyFor, PrimaryKey, Role, Schema, Sequence, Table, Unique, View,
};
use crate::dialect::Dialect;
use crate::error::{Error, Result, SchemaError};

// ================================================================
// Options
// ================================================================

/// Identifier casing applied to column names that were not fixed
/// explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Casing {
    /// Keep names as declared.
    #[default]
    Preserve,
    /// `createdAt` becomes `created_at`.
    SnakeCase,
    /// `created_at` becomes `createdAt`.
    CamelCase,
}

impl Casing {
    /// Applies the casing to one identifier.
    #[must_use]
    pub fn apply(self, name: &str) -> String {
        match self {
            Self::Preserve => name.to_string(),
            Self::SnakeCase => name.to_case(Case::Snake),
            Self::CamelCase => name.to_case(Case::Camel),
        }
    }
}

impl fmt::Display for Casing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preserve => "preserve",
            Self::SnakeCase => "snake_case",
            Self::CamelCase => "camel_case",
        })
    }
}

impl FromStr for Casing {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "preserve" | "none" => Ok(Self::Preserve),
            "snake" | "snake_case" => Ok(Self::SnakeCase),
            "camel" | "camel_case" | "camelcase" => Ok(Self::CamelCase),
            other => Err(format!(
                "unknown casing `{other}`, expected preserve, snake_case or camel_case"
            )),
        }
    }
}

/// Options for [`build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Schema for entities that do not name one.
    pub default_schema: String,
    /// Column name casing.
    pub casing: Casing,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            default_schema: "public".to_string(),
            casing: Casing::Preserve,
        }
    }
}

impl BuildOptions {
    /// Options whose default schema is the dialect's.
    #[must_use]
    pub fn for_dialect(dialect: &dyn Dialect) -> Self {
        Self {
            default_schema: dialect.default_schema().to_string(),
            casing: Casing::Preserve,
        }
    }

    /// Sets the column name casing.
    #[must_use]
    pub const fn casing(mut self, casing: Casing) -> Self {
        self.casing = casing;
        self
    }
}

// ================================================================
// Interim records
// ================================================================

/// An enum type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimEnum {
    pub schema: Option<String>,
    pub name: String,
    pub values: Vec<String>,
}

/// A standalone sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimSequence {
    pub schema: Option<String>,
    pub name: String,
    pub increment_by: Option<String>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub start_with: Option<String>,
    pub cache: Option<i64>,
    pub cycle: bool,
}

/// A role. `inherit` defaults to `true`, everything else to off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct InterimRole {
    pub name: String,
    pub superuser: bool,
    pub create_db: bool,
    pub create_role: bool,
    pub inherit: bool,
    pub can_login: bool,
    pub replication: bool,
    pub bypass_rls: bool,
    pub conn_limit: Option<i32>,
    pub password: Option<String>,
    pub valid_until: Option<String>,
}

impl Default for InterimRole {
    fn default() -> Self {
        let role = Role::new("");
        Self {
            name: role.name,
            superuser: role.superuser,
            create_db: role.create_db,
            create_role: role.create_role,
            inherit: role.inherit,
            can_login: role.can_login,
            replication: role.replication,
            bypass_rls: role.bypass_rls,
            conn_limit: role.conn_limit,
            password: role.password,
            valid_until: role.valid_until,
        }
    }
}

/// A table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimTable {
    pub schema: Option<String>,
    pub name: String,
    pub is_rls_enabled: bool,
}

/// A column, with shorthand flags for single-column primary key and unique
/// constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct InterimColumn {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
    /// Whether `name` is final and must not be recased.
    pub name_explicit: bool,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub type_schema: Option<String>,
    pub dimensions: u32,
    pub not_null: bool,
    pub default: Option<ColumnDefault>,
    pub generated: Option<Generated>,
    pub identity: Option<Identity>,
    /// Column is the table's primary key.
    pub pk: bool,
    pub pk_name: Option<String>,
    /// Column carries a single-column unique constraint.
    pub unique: bool,
    pub unique_name: Option<String>,
    pub unique_nulls_not_distinct: bool,
}

/// A primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimPrimaryKey {
    pub schema: Option<String>,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// A unique constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimUnique {
    pub schema: Option<String>,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub nulls_not_distinct: bool,
}

/// A foreign key. `schemaTo` defaults to the owning table's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimForeignKey {
    pub schema: Option<String>,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub schema_to: Option<String>,
    pub table_to: String,
    pub columns_to: Vec<String>,
    pub on_update: ForeignKeyAction,
    pub on_delete: ForeignKeyAction,
}

/// A check constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimCheck {
    pub schema: Option<String>,
    pub table: String,
    pub name: Option<String>,
    pub value: String,
}

/// An index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimIndex {
    pub schema: Option<String>,
    pub table: String,
    pub name: Option<String>,
    pub columns: Vec<IndexColumn>,
    pub is_unique: bool,
    pub method: String,
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub concurrently: bool,
    pub with: Option<String>,
}

/// A view. Views without a definition are tracked but never created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimView {
    pub schema: Option<String>,
    pub name: String,
    pub definition: Option<String>,
    pub materialized: bool,
    pub with: BTreeMap<String, String>,
    pub with_no_data: bool,
}

/// A row-level security policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimPolicy {
    pub schema: Option<String>,
    pub table: String,
    pub name: String,
    #[serde(rename = "as")]
    pub as_clause: PolicyAs,
    #[serde(rename = "for")]
    pub for_clause: PolicyFor,
    pub roles: Vec<String>,
    pub using: Option<String>,
    pub with_check: Option<String>,
}

/// Flat entity lists, as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterimSchema {
    pub schemas: Vec<String>,
    pub enums: Vec<InterimEnum>,
    pub sequences: Vec<InterimSequence>,
    pub roles: Vec<InterimRole>,
    pub tables: Vec<InterimTable>,
    pub columns: Vec<InterimColumn>,
    pub pks: Vec<InterimPrimaryKey>,
    pub uniques: Vec<InterimUnique>,
    pub fks: Vec<InterimForeignKey>,
    pub checks: Vec<InterimCheck>,
    pub indexes: Vec<InterimIndex>,
    pub policies: Vec<InterimPolicy>,
    pub views: Vec<InterimView>,
}

impl InterimSchema {
    /// Parses an interim schema from JSON.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON or fields of the wrong type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// ================================================================
// Builder
// ================================================================

/// What [`build`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    /// Every entity that could be placed.
    pub ddl: Ddl,
    /// Every problem found, in discovery order.
    pub errors: Vec<SchemaError>,
}

impl BuildOutput {
    /// Whether the schema built without problems.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The store, or all schema errors at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] with every collected problem.
    pub fn into_ddl(self) -> Result<Ddl> {
        if self.errors.is_empty() {
            Ok(self.ddl)
        } else {
            Err(Error::Schema(self.errors))
        }
    }
}

/// Turns an interim schema into a store.
///
/// Naming problems do not stop the build: each one is recorded in
/// [`BuildOutput::errors`] and the offending entity is left out.
///
/// # Errors
///
/// Returns [`Error::Validation`] only if a built entity does not survive its
/// own JSON shape check.
pub fn build(interim: &InterimSchema, options: &BuildOptions) -> Result<BuildOutput> {
    let mut builder = Builder::new(options, interim);
    builder.namespaces(interim);
    builder.tables(interim);
    builder.column_constraints(interim);
    builder.constraints(interim);
    builder.indexes(interim);
    builder.policies(interim);
    builder.views(interim);

    let Builder { ddl, errors, .. } = builder;
    for entity in ddl.entities() {
        let value = serde_json::to_value(&entity)?;
        if !validate_entity(&value) {
            return Err(Error::Validation {
                kind: entity.kind(),
                detail: format!("`{}` does not match its JSON shape", entity.key()),
            });
        }
    }

    debug!(entities = ddl.len(), errors = errors.len(), "interim schema built");
    Ok(BuildOutput { ddl, errors })
}

type ColumnRef = (String, String, String);

struct Builder<'a> {
    options: &'a BuildOptions,
    ddl: Ddl,
    errors: Vec<SchemaError>,
    /// Recased column names, by `(schema, table, declared name)`.
    recased: HashMap<ColumnRef, String>,
    /// Constraint names taken on each table, across constraint kinds.
    constraint_names: HashSet<EntityKey>,
    /// Default-named checks seen so far on each table.
    check_ordinals: HashMap<(String, String), usize>,
}

impl<'a> Builder<'a> {
    fn new(options: &'a BuildOptions, interim: &InterimSchema) -> Self {
        let mut recased = HashMap::new();
        if options.casing != Casing::Preserve {
            for column in interim.columns.iter().filter(|c| !c.name_explicit) {
                let schema = column
                    .schema
                    .clone()
                    .unwrap_or_else(|| options.default_schema.clone());
                recased.insert(
                    (schema, column.table.clone(), column.name.clone()),
                    options.casing.apply(&column.name),
                );
            }
        }
        Self {
            options,
            ddl: Ddl::new(),
            errors: Vec::new(),
            recased,
            constraint_names: HashSet::new(),
            check_ordinals: HashMap::new(),
        }
    }

    fn schema(&self, schema: Option<&String>) -> String {
        schema
            .cloned()
            .unwrap_or_else(|| self.options.default_schema.clone())
    }

    fn column_name(&self, schema: &str, table: &str, name: &str) -> String {
        self.recased
            .get(&(schema.to_string(), table.to_string(), name.to_string()))
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn column_names(&self, schema: &str, table: &str, names: &[String]) -> Vec<String> {
        names
            .iter()
            .map(|name| self.column_name(schema, table, name))
            .collect()
    }

    fn has_table(&self, schema: &str, table: &str) -> bool {
        self.ddl.tables.contains(&EntityKey::in_schema(schema, table))
    }

    /// Checks that `table` exists, recording an error otherwise.
    fn require_table(&mut self, kind: EntityKind, schema: &str, table: &str, name: &str) -> bool {
        if self.has_table(schema, table) {
            return true;
        }
        self.errors.push(SchemaError::UnknownTable {
            kind,
            schema: schema.to_string(),
            table: table.to_string(),
            name: name.to_string(),
        });
        false
    }

    /// Reserves a constraint name on a table.
    fn claim_constraint(&mut self, schema: &str, table: &str, name: &str) -> bool {
        let fresh = self
            .constraint_names
            .insert(EntityKey::in_table(schema, table, name));
        if !fresh {
            self.errors.push(SchemaError::ConstraintNameDuplicate {
                schema: schema.to_string(),
                table: table.to_string(),
                name: name.to_string(),
            });
        }
        fresh
    }

    fn constraint_conflict(&mut self, key: EntityKey) {
        self.errors.push(SchemaError::ConstraintNameDuplicate {
            schema: key.schema,
            table: key.table,
            name: key.name,
        });
    }

    fn namespaces(&mut self, interim: &InterimSchema) {
        for name in &interim.schemas {
            if self.ddl.schemas.push(Schema::new(name)).is_err() {
                self.errors
                    .push(SchemaError::SchemaNameDuplicate { name: name.clone() });
            }
        }

        for e in &interim.enums {
            let schema = self.schema(e.schema.as_ref());
            let record = Enum {
                schema: schema.clone(),
                name: e.name.clone(),
                values: e.values.clone(),
            };
            if self.ddl.enums.push(record).is_err() {
                self.errors.push(SchemaError::EnumNameDuplicate {
                    schema,
                    name: e.name.clone(),
                });
            }
        }

        for s in &interim.sequences {
            let schema = self.schema(s.schema.as_ref());
            let record = Sequence {
                schema: schema.clone(),
                name: s.name.clone(),
                increment_by: s.increment_by.clone(),
                min_value: s.min_value.clone(),
                max_value: s.max_value.clone(),
                start_with: s.start_with.clone(),
                cache: s.cache,
                cycle: s.cycle,
            };
            if self.ddl.sequences.push(record).is_err() {
                self.errors.push(SchemaError::SequenceNameDuplicate {
                    schema,
                    name: s.name.clone(),
                });
            }
        }

        for r in &interim.roles {
            let record = Role {
                name: r.name.clone(),
                superuser: r.superuser,
                create_db: r.create_db,
                create_role: r.create_role,
                inherit: r.inherit,
                can_login: r.can_login,
                replication: r.replication,
                bypass_rls: r.bypass_rls,
                conn_limit: r.conn_limit,
                password: r.password.clone(),
                valid_until: r.valid_until.clone(),
            };
            if self.ddl.roles.push(record).is_err() {
                self.errors
                    .push(SchemaError::RoleDuplicate { name: r.name.clone() });
            }
        }
    }

    fn tables(&mut self, interim: &InterimSchema) {
        for t in &interim.tables {
            let schema = self.schema(t.schema.as_ref());
            let record = Table {
                schema: schema.clone(),
                name: t.name.clone(),
                is_rls_enabled: t.is_rls_enabled,
            };
            if self.ddl.tables.push(record).is_err() {
                self.errors.push(SchemaError::TableNameDuplicate {
                    schema,
                    name: t.name.clone(),
                });
            }
        }

        for c in &interim.columns {
            let schema = self.schema(c.schema.as_ref());
            let name = self.column_name(&schema, &c.table, &c.name);
            if !self.require_table(EntityKind::Column, &schema, &c.table, &name) {
                continue;
            }
            let record = Column {
                schema: schema.clone(),
                table: c.table.clone(),
                name: name.clone(),
                sql_type: c.sql_type.clone(),
                type_schema: c.type_schema.clone(),
                dimensions: c.dimensions,
                not_null: c.not_null,
                default: c.default.clone(),
                generated: c.generated.clone(),
                identity: c.identity.clone(),
            };
            if self.ddl.columns.push(record).is_err() {
                self.errors.push(SchemaError::ColumnNameDuplicate {
                    schema,
                    table: c.table.clone(),
                    name,
                });
            }
        }
    }

    fn push_pk(&mut self, pk: PrimaryKey) {
        let filter = Filter::any().schema(&pk.schema).table(&pk.table);
        if !self.ddl.pks.list(&filter).is_empty() {
            self.errors.push(SchemaError::PrimaryKeyDuplicate {
                schema: pk.schema,
                table: pk.table,
            });
            return;
        }
        if self.claim_constraint(&pk.schema, &pk.table, &pk.name) {
            if let Err(conflict) = self.ddl.pks.push(pk) {
                self.constraint_conflict(conflict.key);
            }
        }
    }

    fn push_unique(&mut self, unique: Unique) {
        if self.claim_constraint(&unique.schema, &unique.table, &unique.name) {
            if let Err(conflict) = self.ddl.uniques.push(unique) {
                self.constraint_conflict(conflict.key);
            }
        }
    }

    /// Single-column constraints declared through column flags.
    fn column_constraints(&mut self, interim: &InterimSchema) {
        for c in &interim.columns {
            let schema = self.schema(c.schema.as_ref());
            let name = self.column_name(&schema, &c.table, &c.name);
            if !self.ddl.columns.contains(&EntityKey::in_table(&schema, &c.table, &name)) {
                continue;
            }
            if c.pk {
                self.push_pk(PrimaryKey {
                    schema: schema.clone(),
                    table: c.table.clone(),
                    name: c
                        .pk_name
                        .clone()
                        .unwrap_or_else(|| naming::primary_key(&c.table)),
                    name_explicit: c.pk_name.is_some(),
                    columns: vec![name.clone()],
                });
            }
            if c.unique {
                let columns = vec![name];
                self.push_unique(Unique {
                    name: c
                        .unique_name
                        .clone()
                        .unwrap_or_else(|| naming::unique(&c.table, &columns)),
                    name_explicit: c.unique_name.is_some(),
                    schema,
                    table: c.table.clone(),
                    columns,
                    nulls_not_distinct: c.unique_nulls_not_distinct,
                });
            }
        }
    }

    fn constraints(&mut self, interim: &InterimSchema) {
        for pk in &interim.pks {
            let schema = self.schema(pk.schema.as_ref());
            let name = pk
                .name
                .clone()
                .unwrap_or_else(|| naming::primary_key(&pk.table));
            if !self.require_table(EntityKind::PrimaryKey, &schema, &pk.table, &name) {
                continue;
            }
            let columns = self.column_names(&schema, &pk.table, &pk.columns);
            self.push_pk(PrimaryKey {
                schema,
                table: pk.table.clone(),
                name,
                name_explicit: pk.name.is_some(),
                columns,
            });
        }

        for u in &interim.uniques {
            let schema = self.schema(u.schema.as_ref());
            let columns = self.column_names(&schema, &u.table, &u.columns);
            let name = u
                .name
                .clone()
                .unwrap_or_else(|| naming::unique(&u.table, &columns));
            if !self.require_table(EntityKind::Unique, &schema, &u.table, &name) {
                continue;
            }
            self.push_unique(Unique {
                schema,
                table: u.table.clone(),
                name,
                name_explicit: u.name.is_some(),
                columns,
                nulls_not_distinct: u.nulls_not_distinct,
            });
        }

        for fk in &interim.fks {
            let schema = self.schema(fk.schema.as_ref());
            let schema_to = fk.schema_to.clone().unwrap_or_else(|| schema.clone());
            let columns = self.column_names(&schema, &fk.table, &fk.columns);
            let columns_to = self.column_names(&schema_to, &fk.table_to, &fk.columns_to);
            let name = fk.name.clone().unwrap_or_else(|| {
                naming::foreign_key(&fk.table, &columns, &fk.table_to, &columns_to)
            });
            if !self.require_table(EntityKind::ForeignKey, &schema, &fk.table, &name) {
                continue;
            }
            if self.claim_constraint(&schema, &fk.table, &name) {
                let pushed = self.ddl.fks.push(ForeignKey {
                    schema,
                    table: fk.table.clone(),
                    name,
                    name_explicit: fk.name.is_some(),
                    columns,
                    schema_to,
                    table_to: fk.table_to.clone(),
                    columns_to,
                    on_update: fk.on_update,
                    on_delete: fk.on_delete,
                });
                if let Err(conflict) = pushed {
                    self.constraint_conflict(conflict.key);
                }
            }
        }

        for check in &interim.checks {
            let schema = self.schema(check.schema.as_ref());
            let name = match &check.name {
                Some(name) => name.clone(),
                None => {
                    let ordinal = self
                        .check_ordinals
                        .entry((schema.clone(), check.table.clone()))
                        .or_insert(0);
                    *ordinal += 1;
                    naming::check(&check.table, *ordinal)
                }
            };
            if !self.require_table(EntityKind::Check, &schema, &check.table, &name) {
                continue;
            }
            if self.claim_constraint(&schema, &check.table, &name) {
                let pushed = self.ddl.checks.push(Check {
                    schema,
                    table: check.table.clone(),
                    name,
                    name_explicit: check.name.is_some(),
                    value: check.value.clone(),
                });
                if let Err(conflict) = pushed {
                    self.constraint_conflict(conflict.key);
                }
            }
        }
    }

    fn indexes(&mut self, interim: &InterimSchema) {
        for index in &interim.indexes {
            let schema = self.schema(index.schema.as_ref());
            let columns: Vec<IndexColumn> = index
                .columns
                .iter()
                .map(|part| {
                    let mut part = part.clone();
                    if !part.is_expression {
                        part.value = self.column_name(&schema, &index.table, &part.value);
                    }
                    part
                })
                .collect();
            let name = match index.name.clone().or_else(|| naming::index(&index.table, &columns)) {
                Some(name) => name,
                None => {
                    self.errors.push(SchemaError::IndexWithoutName {
                        schema,
                        table: index.table.clone(),
                    });
                    continue;
                }
            };
            if !self.require_table(EntityKind::Index, &schema, &index.table, &name) {
                continue;
            }
            let record = Index {
                schema: schema.clone(),
                table: index.table.clone(),
                name: name.clone(),
                name_explicit: index.name.is_some(),
                columns,
                is_unique: index.is_unique,
                method: index.method.clone(),
                where_clause: index.where_clause.clone(),
                concurrently: index.concurrently,
                with: index.with.clone(),
            };
            if self.ddl.indexes.push(record).is_err() {
                self.errors.push(SchemaError::IndexNameDuplicate {
                    schema,
                    table: index.table.clone(),
                    name,
                });
            }
        }
    }

    fn policies(&mut self, interim: &InterimSchema) {
        for p in &interim.policies {
            let schema = self.schema(p.schema.as_ref());
            if !self.has_table(&schema, &p.table) {
                self.errors.push(SchemaError::PolicyNotLinked {
                    schema,
                    table: p.table.clone(),
                    name: p.name.clone(),
                });
                continue;
            }
            let record = Policy {
                schema: schema.clone(),
                table: p.table.clone(),
                name: p.name.clone(),
                as_clause: p.as_clause,
                for_clause: p.for_clause,
                roles: p.roles.clone(),
                using: p.using.clone(),
                with_check: p.with_check.clone(),
            };
            if self.ddl.policies.push(record).is_err() {
                self.errors.push(SchemaError::PolicyDuplicate {
                    schema,
                    table: p.table.clone(),
                    name: p.name.clone(),
                });
            }
        }
    }

    fn views(&mut self, interim: &InterimSchema) {
        for v in &interim.views {
            let schema = self.schema(v.schema.as_ref());
            let record = View {
                schema: schema.clone(),
                name: v.name.clone(),
                definition: v.definition.clone(),
                materialized: v.materialized,
                with: v.with.clone(),
                with_no_data: v.with_no_data,
            };
            if self.ddl.views.push(record).is_err() {
                self.errors.push(SchemaError::ViewNameDuplicate {
                    schema,
                    name: v.name.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(name: &str) -> InterimTable {
        InterimTable {
            name: name.into(),
            ..Default::default()
        }
    }

    fn column(table: &str, name: &str, sql_type: &str) -> InterimColumn {
        InterimColumn {
            table: table.into(),
            name: name.into(),
            sql_type: sql_type.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_column_flags_become_constraints() {
        let interim = InterimSchema {
            tables: vec![table("users")],
            columns: vec![
                InterimColumn {
                    pk: true,
                    ..column("users", "id", "integer")
                },
                InterimColumn {
                    unique: true,
                    ..column("users", "email", "text")
                },
            ],
            ..Default::default()
        };
        let ddl = build(&interim, &BuildOptions::default())
            .unwrap()
            .into_ddl()
            .unwrap();

        let pk = ddl.pks.iter().next().unwrap();
        assert_eq!(pk.name, "users_pk");
        assert!(!pk.name_explicit);
        assert_eq!(pk.columns, ["id"]);
        let unique = ddl.uniques.iter().next().unwrap();
        assert_eq!(unique.name, "users_email_unique");
        assert_eq!(unique.schema, "public");
    }

    #[test]
    fn test_duplicate_table_reports_once() {
        let interim = InterimSchema {
            tables: vec![table("users"), table("users")],
            ..Default::default()
        };
        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert_eq!(
            out.errors,
            [SchemaError::TableNameDuplicate {
                schema: "public".into(),
                name: "users".into(),
            }]
        );
        assert_eq!(out.ddl.tables.len(), 1);
    }

    #[test]
    fn test_two_pk_flags_conflict() {
        let interim = InterimSchema {
            tables: vec![table("t")],
            columns: vec![
                InterimColumn {
                    pk: true,
                    ..column("t", "a", "integer")
                },
                InterimColumn {
                    pk: true,
                    ..column("t", "b", "integer")
                },
            ],
            ..Default::default()
        };
        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert!(matches!(
            out.errors.as_slice(),
            [SchemaError::PrimaryKeyDuplicate { .. }]
        ));
    }

    #[test]
    fn test_errors_are_batched() {
        let interim = InterimSchema {
            tables: vec![table("t")],
            columns: vec![column("missing", "a", "integer")],
            indexes: vec![InterimIndex {
                table: "t".into(),
                columns: vec![IndexColumn::expression("lower(a)")],
                ..Default::default()
            }],
            policies: vec![InterimPolicy {
                table: "nowhere".into(),
                name: "p".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert_eq!(out.errors.len(), 3);
        assert!(matches!(
            out.errors[0],
            SchemaError::UnknownTable {
                kind: EntityKind::Column,
                ..
            }
        ));
        assert!(matches!(out.errors[1], SchemaError::IndexWithoutName { .. }));
        assert!(matches!(out.errors[2], SchemaError::PolicyNotLinked { .. }));

        let err = out.into_ddl().unwrap_err();
        assert!(err.to_string().starts_with("Schema has 3 error(s):"));
    }

    #[test]
    fn test_constraint_names_are_shared_across_kinds() {
        let interim = InterimSchema {
            tables: vec![table("t")],
            columns: vec![column("t", "a", "integer")],
            uniques: vec![InterimUnique {
                table: "t".into(),
                name: Some("t_rule".into()),
                columns: vec!["a".into()],
                ..Default::default()
            }],
            checks: vec![InterimCheck {
                table: "t".into(),
                name: Some("t_rule".into()),
                value: "a > 0".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert!(matches!(
            out.errors.as_slice(),
            [SchemaError::ConstraintNameDuplicate { .. }]
        ));
    }

    #[test]
    fn test_repeated_constraint_keeps_first_and_reports_once() {
        let fk = |columns_to: &str| InterimForeignKey {
            table: "t".into(),
            name: Some("t_parent_fk".into()),
            columns: vec!["a".into()],
            table_to: "parent".into(),
            columns_to: vec![columns_to.into()],
            ..Default::default()
        };
        let check = |value: &str| InterimCheck {
            table: "t".into(),
            name: Some("t_positive".into()),
            value: value.into(),
            ..Default::default()
        };
        let interim = InterimSchema {
            tables: vec![table("t"), table("parent")],
            columns: vec![
                column("t", "a", "integer"),
                column("parent", "id", "integer"),
                column("parent", "code", "integer"),
            ],
            fks: vec![fk("id"), fk("code")],
            checks: vec![check("a > 0"), check("a >= 0")],
            ..Default::default()
        };
        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert_eq!(
            out.errors,
            [
                SchemaError::ConstraintNameDuplicate {
                    schema: "public".into(),
                    table: "t".into(),
                    name: "t_parent_fk".into(),
                },
                SchemaError::ConstraintNameDuplicate {
                    schema: "public".into(),
                    table: "t".into(),
                    name: "t_positive".into(),
                },
            ]
        );
        assert_eq!(out.ddl.fks.len(), 1);
        assert_eq!(out.ddl.fks.iter().next().unwrap().columns_to, ["id"]);
        assert_eq!(out.ddl.checks.iter().next().unwrap().value, "a > 0");
    }

    #[test]
    fn test_default_check_names_are_numbered() {
        let check = |value: &str| InterimCheck {
            table: "t".into(),
            value: value.into(),
            ..Default::default()
        };
        let interim = InterimSchema {
            tables: vec![table("t")],
            checks: vec![check("a > 0"), check("b > 0")],
            ..Default::default()
        };
        let ddl = build(&interim, &BuildOptions::default())
            .unwrap()
            .into_ddl()
            .unwrap();
        let names: Vec<_> = ddl.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["t_check", "t_check_2"]);
    }

    #[test]
    fn test_casing_follows_references() {
        let interim = InterimSchema {
            tables: vec![table("users"), table("posts")],
            columns: vec![
                InterimColumn {
                    pk: true,
                    ..column("users", "userId", "integer")
                },
                column("posts", "authorId", "integer"),
                InterimColumn {
                    name_explicit: true,
                    ..column("posts", "keepMe", "text")
                },
            ],
            fks: vec![InterimForeignKey {
                table: "posts".into(),
                columns: vec!["authorId".into()],
                table_to: "users".into(),
                columns_to: vec!["userId".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let options = BuildOptions::default().casing(Casing::SnakeCase);
        let ddl = build(&interim, &options).unwrap().into_ddl().unwrap();

        let names: Vec<_> = ddl.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["user_id", "author_id", "keepMe"]);
        let fk = ddl.fks.iter().next().unwrap();
        assert_eq!(fk.columns, ["author_id"]);
        assert_eq!(fk.columns_to, ["user_id"]);
        assert_eq!(fk.name, "posts_author_id_users_user_id_fk");
        assert_eq!(ddl.pks.iter().next().unwrap().columns, ["user_id"]);
    }

    #[test]
    fn test_parses_sparse_json() {
        let interim = InterimSchema::from_json(
            &json!({
                "tables": [{ "name": "users" }],
                "columns": [{ "table": "users", "name": "id", "type": "integer", "pk": true }],
                "roles": [{ "name": "reader" }]
            })
            .to_string(),
        )
        .unwrap();
        assert!(interim.roles[0].inherit);

        let out = build(&interim, &BuildOptions::default()).unwrap();
        assert!(out.is_ok());
        assert_eq!(out.ddl.len(), 4);
    }

    #[test]
    fn test_casing_from_str() {
        assert_eq!("snake-case".parse::<Casing>().unwrap(), Casing::SnakeCase);
        assert_eq!("camel".parse::<Casing>().unwrap(), Casing::CamelCase);
        assert!("kebab".parse::<Casing>().is_err());
    }
}

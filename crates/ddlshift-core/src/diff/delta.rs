//! Field-level deltas between two versions of the same entity.

use serde::{Deserialize, Serialize};

use crate::ddl::{Check, Column, Enum, ForeignKey, Index, Policy, PrimaryKey, Role, Sequence, Unique, View};
use crate::dialect::Dialect;

/// Which column attributes changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct ColumnDelta {
    /// Type (after dialect normalisation).
    pub sql_type: bool,
    /// Array dimensions.
    pub dimensions: bool,
    /// `NOT NULL`.
    pub not_null: bool,
    /// `DEFAULT`.
    pub default: bool,
    /// Identity definition.
    pub identity: bool,
}

impl ColumnDelta {
    /// Whether nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.sql_type || self.dimensions || self.not_null || self.default || self.identity)
    }
}

/// Computes the in-place alterable changes between two column versions.
///
/// Generated-expression changes are not part of the delta; see
/// [`column_needs_replacement`].
#[must_use]
pub fn column_delta(from: &Column, to: &Column, dialect: &dyn Dialect) -> ColumnDelta {
    ColumnDelta {
        sql_type: dialect.normalize_type(&from.sql_type) != dialect.normalize_type(&to.sql_type)
            || from.type_schema != to.type_schema,
        dimensions: from.dimensions != to.dimensions,
        not_null: from.not_null != to.not_null,
        default: from.default != to.default,
        identity: from.identity != to.identity,
    }
}

/// A column whose generated expression appears, disappears or changes has to
/// be dropped and added again.
#[must_use]
pub fn column_needs_replacement(from: &Column, to: &Column) -> bool {
    from.generated != to.generated
}

/// Which sequence parameters changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct SequenceDelta {
    /// `INCREMENT BY`.
    pub increment_by: bool,
    /// `MINVALUE`.
    pub min_value: bool,
    /// `MAXVALUE`.
    pub max_value: bool,
    /// `START WITH`.
    pub start_with: bool,
    /// `CACHE`.
    pub cache: bool,
    /// `CYCLE`.
    pub cycle: bool,
}

impl SequenceDelta {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Compares two sequence versions.
#[must_use]
pub fn sequence_delta(from: &Sequence, to: &Sequence) -> SequenceDelta {
    SequenceDelta {
        increment_by: from.increment_by != to.increment_by,
        min_value: from.min_value != to.min_value,
        max_value: from.max_value != to.max_value,
        start_with: from.start_with != to.start_with,
        cache: from.cache != to.cache,
        cycle: from.cycle != to.cycle,
    }
}

/// Which role attributes changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct RoleDelta {
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
    pub conn_limit: bool,
    /// `PASSWORD`.
    pub password: bool,
    /// `VALID UNTIL`.
    pub valid_until: bool,
}

impl RoleDelta {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Compares two role versions.
#[must_use]
pub fn role_delta(from: &Role, to: &Role) -> RoleDelta {
    RoleDelta {
        superuser: from.superuser != to.superuser,
        create_db: from.create_db != to.create_db,
        create_role: from.create_role != to.create_role,
        inherit: from.inherit != to.inherit,
        can_login: from.can_login != to.can_login,
        replication: from.replication != to.replication,
        bypass_rls: from.bypass_rls != to.bypass_rls,
        conn_limit: from.conn_limit != to.conn_limit,
        password: from.password != to.password,
        valid_until: from.valid_until != to.valid_until,
    }
}

/// Which view attributes changed in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDelta {
    /// Query text.
    pub definition: bool,
    /// `WITH (...)` options.
    pub with: bool,
}

impl ViewDelta {
    /// Whether nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.definition || self.with)
    }
}

/// Compares two view versions.
#[must_use]
pub fn view_delta(from: &View, to: &View) -> ViewDelta {
    ViewDelta {
        definition: from.definition != to.definition,
        with: from.with != to.with,
    }
}

/// Materialized views cannot be redefined in place, and toggling
/// materialization changes the object type.
#[must_use]
pub fn view_needs_replacement(from: &View, to: &View) -> bool {
    from.materialized != to.materialized
        || (to.materialized && (from.definition != to.definition || from.with_no_data != to.with_no_data))
}

/// Which policy clauses changed in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDelta {
    /// `TO` role list.
    pub roles: bool,
    /// `USING`.
    pub using: bool,
    /// `WITH CHECK`.
    pub with_check: bool,
}

impl PolicyDelta {
    /// Whether nothing changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.roles || self.using || self.with_check)
    }
}

/// Compares two policy versions.
#[must_use]
pub fn policy_delta(from: &Policy, to: &Policy) -> PolicyDelta {
    PolicyDelta {
        roles: from.roles != to.roles,
        using: from.using != to.using,
        with_check: from.with_check != to.with_check,
    }
}

/// `AS` and `FOR` cannot be altered in place, and `ALTER POLICY` can only
/// replace `USING`/`WITH CHECK`, not remove them.
#[must_use]
pub fn policy_needs_replacement(from: &Policy, to: &Policy) -> bool {
    from.as_clause != to.as_clause
        || from.for_clause != to.for_clause
        || (from.using.is_some() && to.using.is_none())
        || (from.with_check.is_some() && to.with_check.is_none())
}

/// How an enum's label list changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumChange {
    /// Same labels in the same order.
    Unchanged,
    /// Only new labels were inserted; each comes with the existing label it
    /// goes before (`None` to append).
    Added(Vec<(String, Option<String>)>),
    /// Labels were removed or reordered; the type has to be rebuilt.
    Recreate,
}

/// Classifies the label changes between two enum versions.
#[must_use]
pub fn enum_change(from: &Enum, to: &Enum) -> EnumChange {
    if from.values == to.values {
        return EnumChange::Unchanged;
    }

    let kept: Vec<&String> = to.values.iter().filter(|v| from.values.contains(v)).collect();
    let still_ordered = kept.len() == from.values.len()
        && kept.iter().zip(&from.values).all(|(a, b)| *a == b);
    if !still_ordered {
        return EnumChange::Recreate;
    }

    let mut added = Vec::new();
    for (i, value) in to.values.iter().enumerate() {
        if from.values.contains(value) {
            continue;
        }
        let before = to.values[i + 1..]
            .iter()
            .find(|next| from.values.contains(next))
            .cloned();
        added.push((value.clone(), before));
    }
    EnumChange::Added(added)
}

/// Constraint and index comparisons ignore the name and whether it was
/// explicit; only the definition counts.
pub trait DefinitionEq {
    /// Whether both records define the same object.
    fn same_definition(&self, other: &Self) -> bool;
}

impl DefinitionEq for PrimaryKey {
    fn same_definition(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl DefinitionEq for Unique {
    fn same_definition(&self, other: &Self) -> bool {
        self.columns == other.columns && self.nulls_not_distinct == other.nulls_not_distinct
    }
}

impl DefinitionEq for ForeignKey {
    fn same_definition(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.schema_to == other.schema_to
            && self.table_to == other.table_to
            && self.columns_to == other.columns_to
            && self.on_update == other.on_update
            && self.on_delete == other.on_delete
    }
}

impl DefinitionEq for Check {
    fn same_definition(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl DefinitionEq for Index {
    fn same_definition(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.is_unique == other.is_unique
            && self.method == other.method
            && self.where_clause == other.where_clause
            && self.with == other.with
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};

    fn labels(values: &[&str]) -> Enum {
        Enum {
            schema: "public".into(),
            name: "mood".into(),
            values: values.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn enum_insertions_keep_anchor() {
        let change = enum_change(&labels(&["sad", "happy"]), &labels(&["sad", "ok", "happy", "great"]));
        assert_eq!(
            change,
            EnumChange::Added(vec![
                ("ok".into(), Some("happy".into())),
                ("great".into(), None),
            ])
        );
    }

    #[test]
    fn enum_removal_or_reorder_recreates() {
        assert_eq!(enum_change(&labels(&["a", "b"]), &labels(&["a"])), EnumChange::Recreate);
        assert_eq!(enum_change(&labels(&["a", "b"]), &labels(&["b", "a"])), EnumChange::Recreate);
        assert_eq!(enum_change(&labels(&["a"]), &labels(&["a"])), EnumChange::Unchanged);
    }

    #[test]
    fn type_aliases_are_not_changes() {
        let from = Column::new("public", "t", "c", "int4");
        let to = Column::new("public", "t", "c", "INTEGER");
        assert!(column_delta(&from, &to, &PostgresDialect::new()).is_empty());

        let to = Column::new("public", "t", "c", "bigint");
        assert!(column_delta(&from, &to, &PostgresDialect::new()).sql_type);
    }

    #[test]
    fn sqlite_compares_affinity() {
        let from = Column::new("", "t", "c", "varchar(20)");
        let to = Column::new("", "t", "c", "text");
        assert!(column_delta(&from, &to, &SqliteDialect::new()).is_empty());
    }
}

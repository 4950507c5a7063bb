//! Migration statements.
//!
//! This module defines every DDL action the diff engine can emit, the
//! execution phases they run in, and the ordering that keeps referential
//! dependencies satisfied when the statements are applied one after another.

mod classify;
mod group;

pub use classify::{classify, partition, Hazard, Partitioned, Safety};
pub use group::{group, render, GroupItem, StatementGroup};

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ddl::{
    Check, Column, EntityKey, EntityKind, Enum, ForeignKey, Index, Policy, PrimaryKey, Role,
    Schema, Sequence, Table, Unique, View,
};
use crate::diff::delta::{ColumnDelta, PolicyDelta, RoleDelta, SequenceDelta, ViewDelta};

/// A single DDL action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// Create a schema.
    CreateSchema {
        /// Schema to create.
        schema: Schema,
    },

    /// Drop a schema.
    DropSchema {
        /// Schema to drop.
        schema: Schema,
    },

    /// Rename a schema.
    RenameSchema {
        /// Old version.
        from: Schema,
        /// New version.
        to: Schema,
    },

    /// Create an enumerated type.
    CreateEnum {
        /// Type to create.
        #[serde(rename = "enum")]
        enum_type: Enum,
    },

    /// Drop an enumerated type.
    DropEnum {
        /// Type to drop.
        #[serde(rename = "enum")]
        enum_type: Enum,
    },

    /// Rename an enumerated type, or move it to another schema.
    RenameEnum {
        /// Old version.
        from: Enum,
        /// New version.
        to: Enum,
    },

    /// Insert a label into an existing enum.
    AlterEnumAddValue {
        /// The enum after the change.
        #[serde(rename = "enum")]
        enum_type: Enum,
        /// New label.
        value: String,
        /// Existing label the new one goes before; `None` appends.
        before: Option<String>,
    },

    /// Rebuild an enum whose labels were removed or reordered, converting
    /// the columns that use it.
    RecreateEnum {
        /// Old version.
        from: Enum,
        /// New version.
        to: Enum,
        /// Columns typed with the enum.
        columns: Vec<Column>,
    },

    /// Create a sequence.
    CreateSequence {
        /// Sequence to create.
        sequence: Sequence,
    },

    /// Drop a sequence.
    DropSequence {
        /// Sequence to drop.
        sequence: Sequence,
    },

    /// Rename a sequence, or move it to another schema.
    RenameSequence {
        /// Old version.
        from: Sequence,
        /// New version.
        to: Sequence,
    },

    /// Change sequence parameters.
    AlterSequence {
        /// Old version.
        from: Sequence,
        /// New version.
        to: Sequence,
        /// Changed parameters.
        delta: SequenceDelta,
    },

    /// Create a role.
    CreateRole {
        /// Role to create.
        role: Role,
    },

    /// Drop a role.
    DropRole {
        /// Role to drop.
        role: Role,
    },

    /// Rename a role.
    RenameRole {
        /// Old version.
        from: Role,
        /// New version.
        to: Role,
    },

    /// Change role attributes.
    AlterRole {
        /// Old version.
        from: Role,
        /// New version.
        to: Role,
        /// Changed attributes.
        delta: RoleDelta,
    },

    /// Create a table with its columns and inline constraints.
    CreateTable {
        /// Table to create.
        table: Table,
        /// Columns in declaration order.
        columns: Vec<Column>,
        /// Inline primary key.
        pk: Option<PrimaryKey>,
        /// Inline unique constraints.
        uniques: Vec<Unique>,
        /// Inline check constraints.
        checks: Vec<Check>,
        /// Inline foreign keys (only for dialects that cannot add them later).
        fks: Vec<ForeignKey>,
    },

    /// Drop a table.
    DropTable {
        /// Table to drop.
        table: Table,
    },

    /// Rename a table, or move it to another schema.
    RenameTable {
        /// Old version.
        from: Table,
        /// New version.
        to: Table,
    },

    /// Enable or disable row-level security.
    AlterRls {
        /// The table after the change.
        table: Table,
    },

    /// Rebuild a table under its new definition, copying the surviving
    /// columns over.
    RecreateTable {
        /// Table to rebuild.
        table: Table,
        /// New columns.
        columns: Vec<Column>,
        /// New primary key.
        pk: Option<PrimaryKey>,
        /// New unique constraints.
        uniques: Vec<Unique>,
        /// New check constraints.
        checks: Vec<Check>,
        /// New foreign keys.
        fks: Vec<ForeignKey>,
        /// Indexes to restore afterwards.
        indexes: Vec<Index>,
        /// Columns whose data is copied from the old table.
        copy_columns: Vec<String>,
    },

    /// Add a column to an existing table.
    AddColumn {
        /// Column to add.
        column: Column,
    },

    /// Drop a column.
    DropColumn {
        /// Column to drop.
        column: Column,
    },

    /// Rename a column.
    RenameColumn {
        /// Old version.
        from: Column,
        /// New version.
        to: Column,
    },

    /// Alter a column in place.
    AlterColumn {
        /// Old version.
        from: Column,
        /// New version.
        to: Column,
        /// Changed attributes.
        delta: ColumnDelta,
    },

    /// Add a primary key to an existing table.
    AddPrimaryKey {
        /// Constraint to add.
        pk: PrimaryKey,
    },

    /// Drop a primary key.
    DropPrimaryKey {
        /// Constraint to drop.
        pk: PrimaryKey,
    },

    /// Add a unique constraint to an existing table.
    AddUnique {
        /// Constraint to add.
        unique: Unique,
    },

    /// Drop a unique constraint.
    DropUnique {
        /// Constraint to drop.
        unique: Unique,
    },

    /// Add a foreign key.
    AddForeignKey {
        /// Constraint to add.
        fk: ForeignKey,
    },

    /// Drop a foreign key.
    DropForeignKey {
        /// Constraint to drop.
        fk: ForeignKey,
    },

    /// Add a check constraint to an existing table.
    AddCheck {
        /// Constraint to add.
        check: Check,
    },

    /// Drop a check constraint.
    DropCheck {
        /// Constraint to drop.
        check: Check,
    },

    /// Rename a constraint of any kind.
    RenameConstraint {
        /// Constraint kind.
        kind: EntityKind,
        /// Enclosing schema.
        schema: String,
        /// Enclosing table.
        table: String,
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },

    /// Create an index.
    CreateIndex {
        /// Index to create.
        index: Index,
    },

    /// Drop an index.
    DropIndex {
        /// Index to drop.
        index: Index,
    },

    /// Rename an index.
    RenameIndex {
        /// Enclosing schema.
        schema: String,
        /// Indexed table.
        table: String,
        /// Old name.
        from: String,
        /// New name.
        to: String,
    },

    /// Create a view.
    CreateView {
        /// View to create.
        view: View,
    },

    /// Drop a view.
    DropView {
        /// View to drop.
        view: View,
    },

    /// Rename a view, or move it to another schema.
    RenameView {
        /// Old version.
        from: View,
        /// New version.
        to: View,
    },

    /// Redefine a view in place.
    AlterView {
        /// Old version.
        from: View,
        /// New version.
        to: View,
        /// Changed attributes.
        delta: ViewDelta,
    },

    /// Create a row-level security policy.
    CreatePolicy {
        /// Policy to create.
        policy: Policy,
    },

    /// Drop a policy.
    DropPolicy {
        /// Policy to drop.
        policy: Policy,
    },

    /// Rename a policy.
    RenamePolicy {
        /// Old version.
        from: Policy,
        /// New version.
        to: Policy,
    },

    /// Change policy roles or expressions.
    AlterPolicy {
        /// Old version.
        from: Policy,
        /// New version.
        to: Policy,
        /// Changed clauses.
        delta: PolicyDelta,
    },
}

impl Statement {
    /// Phase the statement runs in when it is not part of a replacement.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::CreateSchema { .. }
            | Self::RenameSchema { .. }
            | Self::CreateEnum { .. }
            | Self::RenameEnum { .. }
            | Self::AlterEnumAddValue { .. }
            | Self::RecreateEnum { .. }
            | Self::CreateSequence { .. }
            | Self::RenameSequence { .. }
            | Self::AlterSequence { .. } => Phase::Namespaces,

            Self::CreateTable { .. }
            | Self::RenameTable { .. }
            | Self::RecreateTable { .. }
            | Self::AddColumn { .. }
            | Self::RenameColumn { .. }
            | Self::AlterColumn { .. } => Phase::Tables,

            Self::AddPrimaryKey { .. }
            | Self::AddUnique { .. }
            | Self::AddForeignKey { .. }
            | Self::AddCheck { .. }
            | Self::RenameConstraint { .. } => Phase::Constraints,

            Self::CreateIndex { .. } | Self::RenameIndex { .. } => Phase::Indexes,

            Self::CreateView { .. } | Self::RenameView { .. } | Self::AlterView { .. } => {
                Phase::Views
            }

            Self::CreateRole { .. }
            | Self::RenameRole { .. }
            | Self::AlterRole { .. }
            | Self::AlterRls { .. }
            | Self::CreatePolicy { .. }
            | Self::RenamePolicy { .. }
            | Self::AlterPolicy { .. } => Phase::Access,

            Self::DropSchema { .. }
            | Self::DropEnum { .. }
            | Self::DropSequence { .. }
            | Self::DropRole { .. }
            | Self::DropTable { .. }
            | Self::DropColumn { .. }
            | Self::DropPrimaryKey { .. }
            | Self::DropUnique { .. }
            | Self::DropForeignKey { .. }
            | Self::DropCheck { .. }
            | Self::DropIndex { .. }
            | Self::DropView { .. }
            | Self::DropPolicy { .. } => Phase::Drops,
        }
    }

    /// Position of a drop inside the drops phase: dependents first, owners
    /// last. `None` for statements that are not drops.
    #[must_use]
    pub const fn drop_rank(&self) -> Option<u8> {
        let rank = match self {
            Self::DropPolicy { .. } => 0,
            Self::DropView { .. } => 1,
            Self::DropIndex { .. } => 2,
            Self::DropForeignKey { .. } => 3,
            Self::DropCheck { .. } => 4,
            Self::DropUnique { .. } => 5,
            Self::DropPrimaryKey { .. } => 6,
            Self::DropColumn { .. } => 7,
            Self::DropTable { .. } => 8,
            Self::DropSequence { .. } => 9,
            Self::DropEnum { .. } => 10,
            Self::DropRole { .. } => 11,
            Self::DropSchema { .. } => 12,
            _ => return None,
        };
        Some(rank)
    }

    /// Whether the statement removes an object.
    #[must_use]
    pub const fn is_drop(&self) -> bool {
        self.drop_rank().is_some()
    }

    /// Key of the table the statement changes, for statements that act on
    /// one existing table.
    #[must_use]
    pub fn altered_table(&self) -> Option<EntityKey> {
        let (schema, table) = match self {
            Self::AddColumn { column } | Self::DropColumn { column } => {
                (&column.schema, &column.table)
            }
            Self::RenameColumn { to, .. } | Self::AlterColumn { to, .. } => (&to.schema, &to.table),
            Self::AddPrimaryKey { pk } | Self::DropPrimaryKey { pk } => (&pk.schema, &pk.table),
            Self::AddUnique { unique } | Self::DropUnique { unique } => {
                (&unique.schema, &unique.table)
            }
            Self::AddForeignKey { fk } | Self::DropForeignKey { fk } => (&fk.schema, &fk.table),
            Self::AddCheck { check } | Self::DropCheck { check } => (&check.schema, &check.table),
            Self::RenameConstraint { schema, table, .. }
            | Self::RenameIndex { schema, table, .. } => (schema, table),
            Self::CreateIndex { index } | Self::DropIndex { index } => {
                (&index.schema, &index.table)
            }
            Self::AlterRls { table } => (&table.schema, &table.name),
            _ => return None,
        };
        Some(EntityKey::in_schema(schema.clone(), table.clone()))
    }

    /// Display key of the entity the statement acts on.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::CreateSchema { schema } | Self::DropSchema { schema } => schema.name.clone(),
            Self::RenameSchema { from, .. } => from.name.clone(),
            Self::CreateEnum { enum_type }
            | Self::DropEnum { enum_type }
            | Self::AlterEnumAddValue { enum_type, .. } => qualified_key(&enum_type.schema, &enum_type.name),
            Self::RenameEnum { from, .. } | Self::RecreateEnum { from, .. } => {
                qualified_key(&from.schema, &from.name)
            }
            Self::CreateSequence { sequence } | Self::DropSequence { sequence } => {
                qualified_key(&sequence.schema, &sequence.name)
            }
            Self::RenameSequence { from, .. } | Self::AlterSequence { from, .. } => {
                qualified_key(&from.schema, &from.name)
            }
            Self::CreateRole { role } | Self::DropRole { role } => role.name.clone(),
            Self::RenameRole { from, .. } | Self::AlterRole { from, .. } => from.name.clone(),
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::AlterRls { table }
            | Self::RecreateTable { table, .. } => qualified_key(&table.schema, &table.name),
            Self::RenameTable { from, .. } => qualified_key(&from.schema, &from.name),
            Self::AddColumn { column } | Self::DropColumn { column } => {
                EntityKey::in_table(&column.schema, &column.table, &column.name).to_string()
            }
            Self::RenameColumn { from, .. } | Self::AlterColumn { from, .. } => {
                EntityKey::in_table(&from.schema, &from.table, &from.name).to_string()
            }
            Self::AddPrimaryKey { pk } | Self::DropPrimaryKey { pk } => {
                EntityKey::in_table(&pk.schema, &pk.table, &pk.name).to_string()
            }
            Self::AddUnique { unique } | Self::DropUnique { unique } => {
                EntityKey::in_table(&unique.schema, &unique.table, &unique.name).to_string()
            }
            Self::AddForeignKey { fk } | Self::DropForeignKey { fk } => {
                EntityKey::in_table(&fk.schema, &fk.table, &fk.name).to_string()
            }
            Self::AddCheck { check } | Self::DropCheck { check } => {
                EntityKey::in_table(&check.schema, &check.table, &check.name).to_string()
            }
            Self::RenameConstraint {
                schema, table, from, ..
            }
            | Self::RenameIndex {
                schema, table, from, ..
            } => EntityKey::in_table(schema, table, from).to_string(),
            Self::CreateIndex { index } | Self::DropIndex { index } => {
                EntityKey::in_table(&index.schema, &index.table, &index.name).to_string()
            }
            Self::CreateView { view } | Self::DropView { view } => {
                qualified_key(&view.schema, &view.name)
            }
            Self::RenameView { from, .. } | Self::AlterView { from, .. } => {
                qualified_key(&from.schema, &from.name)
            }
            Self::CreatePolicy { policy } | Self::DropPolicy { policy } => {
                EntityKey::in_table(&policy.schema, &policy.table, &policy.name).to_string()
            }
            Self::RenamePolicy { from, .. } | Self::AlterPolicy { from, .. } => {
                EntityKey::in_table(&from.schema, &from.table, &from.name).to_string()
            }
        }
    }
}

fn qualified_key(schema: &str, name: &str) -> String {
    EntityKey::in_schema(schema, name).to_string()
}

/// Execution phases, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Schemas, enums and sequences.
    Namespaces,
    /// Table and column creates, renames and alters.
    Tables,
    /// Added and renamed constraints.
    Constraints,
    /// Created and renamed indexes.
    Indexes,
    /// Views.
    Views,
    /// Roles, policies and row-level security.
    Access,
    /// Drops, dependents before owners.
    Drops,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Self; 7] = [
        Self::Namespaces,
        Self::Tables,
        Self::Constraints,
        Self::Indexes,
        Self::Views,
        Self::Access,
        Self::Drops,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Namespaces => "namespaces",
            Self::Tables => "tables",
            Self::Constraints => "constraints",
            Self::Indexes => "indexes",
            Self::Views => "views",
            Self::Access => "access",
            Self::Drops => "drops",
        };
        f.write_str(text)
    }
}

/// A statement with the phase it has been scheduled in.
///
/// A drop that is half of a replacement (drop then re-add of the same
/// object) is scheduled in the phase of its re-add, right before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planned {
    /// Scheduled phase.
    pub phase: Phase,
    /// The statement.
    pub statement: Statement,
}

impl Planned {
    /// Schedules a statement in its natural phase.
    #[must_use]
    pub const fn new(statement: Statement) -> Self {
        Self {
            phase: statement.phase(),
            statement,
        }
    }

    /// Schedules a statement in an explicit phase.
    #[must_use]
    pub const fn in_phase(statement: Statement, phase: Phase) -> Self {
        Self { phase, statement }
    }

    fn sort_key(&self) -> (Phase, u8) {
        let rank = if self.phase == Phase::Drops {
            self.statement.drop_rank().unwrap_or(0)
        } else {
            0
        };
        (self.phase, rank)
    }
}

impl From<Statement> for Planned {
    fn from(statement: Statement) -> Self {
        Self::new(statement)
    }
}

/// Orders statements by phase, and drops by dependency rank.
///
/// The sort is stable, so emission order is kept inside a phase. Replacement
/// pairs stay adjacent, and so does a drop that frees an index name a create
/// in the same plan takes.
#[must_use]
pub fn order(planned: Vec<Planned>) -> Vec<Planned> {
    let mut planned = free_reused_index_names(planned);
    planned.sort_by_key(Planned::sort_key);
    planned
}

/// Index names are unique per schema, so an index that moves to another
/// table must be dropped before it is created again.
fn free_reused_index_names(planned: Vec<Planned>) -> Vec<Planned> {
    let created: HashSet<(String, String)> = planned
        .iter()
        .filter_map(|p| match &p.statement {
            Statement::CreateIndex { index } => Some((index.schema.clone(), index.name.clone())),
            _ => None,
        })
        .collect();
    let (mut freeing, rest): (Vec<_>, Vec<_>) = planned.into_iter().partition(|p| {
        p.phase == Phase::Drops
            && matches!(&p.statement, Statement::DropIndex { index }
                if created.contains(&(index.schema.clone(), index.name.clone())))
    });
    if freeing.is_empty() {
        return rest;
    }

    let mut out = Vec::with_capacity(rest.len() + freeing.len());
    for p in rest {
        if let Statement::CreateIndex { index } = &p.statement {
            while let Some(at) = freeing.iter().position(|d| {
                matches!(&d.statement, Statement::DropIndex { index: dropped }
                    if dropped.schema == index.schema && dropped.name == index.name)
            }) {
                let mut drop = freeing.remove(at);
                drop.phase = p.phase;
                out.push(drop);
            }
        }
        out.push(p);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        Table::new("public", name)
    }

    #[test]
    fn drops_run_last_dependents_first() {
        let column = Column::new("public", "a", "x", "text");
        let planned = vec![
            Planned::new(Statement::DropTable { table: table("a") }),
            Planned::new(Statement::DropColumn {
                column: column.clone(),
            }),
            Planned::new(Statement::CreateTable {
                table: table("b"),
                columns: vec![],
                pk: None,
                uniques: vec![],
                checks: vec![],
                fks: vec![],
            }),
            Planned::new(Statement::CreateSchema {
                schema: Schema::new("auth"),
            }),
        ];

        let ordered: Vec<_> = order(planned)
            .into_iter()
            .map(|p| p.statement)
            .collect();
        assert!(matches!(ordered[0], Statement::CreateSchema { .. }));
        assert!(matches!(ordered[1], Statement::CreateTable { .. }));
        assert!(matches!(ordered[2], Statement::DropColumn { .. }));
        assert!(matches!(ordered[3], Statement::DropTable { .. }));
    }

    #[test]
    fn replacement_drop_stays_next_to_its_add() {
        let index = Index {
            schema: "public".into(),
            table: "a".into(),
            name: "a_x_index".into(),
            name_explicit: false,
            columns: vec![crate::ddl::IndexColumn::column("x")],
            is_unique: false,
            method: "btree".into(),
            where_clause: None,
            concurrently: false,
            with: None,
        };
        let planned = vec![
            Planned::new(Statement::DropTable { table: table("z") }),
            Planned::in_phase(
                Statement::DropIndex {
                    index: index.clone(),
                },
                Phase::Indexes,
            ),
            Planned::new(Statement::CreateIndex { index }),
        ];

        let ordered = order(planned);
        assert!(matches!(ordered[0].statement, Statement::DropIndex { .. }));
        assert!(matches!(ordered[1].statement, Statement::CreateIndex { .. }));
        assert_eq!(ordered[2].phase, Phase::Drops);
    }

    #[test]
    fn moved_index_name_is_freed_before_it_is_reused() {
        let index = |table: &str| Index {
            schema: "public".into(),
            table: table.into(),
            name: "created_idx".into(),
            name_explicit: true,
            columns: vec![crate::ddl::IndexColumn::column("created_at")],
            is_unique: false,
            method: "btree".into(),
            where_clause: None,
            concurrently: false,
            with: None,
        };
        let other = Index {
            name: "other_idx".into(),
            ..index("c")
        };
        let planned = vec![
            Planned::new(Statement::CreateIndex { index: index("b") }),
            Planned::new(Statement::DropIndex { index: index("a") }),
            Planned::new(Statement::DropIndex { index: other }),
        ];

        let ordered = order(planned);
        let targets: Vec<_> = ordered.iter().map(|p| p.statement.target()).collect();
        assert_eq!(
            targets,
            ["public.a.created_idx", "public.b.created_idx", "public.c.other_idx"]
        );
        assert_eq!(ordered[0].phase, Phase::Indexes);
        assert_eq!(ordered[2].phase, Phase::Drops);
    }

    #[test]
    fn statement_json_is_tagged() {
        let json = serde_json::to_value(Statement::DropTable { table: table("a") }).unwrap();
        assert_eq!(json["type"], "drop_table");
        assert_eq!(json["table"]["name"], "a");
    }
}

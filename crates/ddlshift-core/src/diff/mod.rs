//! Structural diff between two DDL stores.
//!
//! [`ddl_diff`] walks every entity kind in a fixed order. For each kind it
//! partitions entities into created, deleted and common by natural key, asks
//! the [`Resolver`] which created/deleted pairs are renames, cascades renames
//! into dependents, and compares the common entities field by field. The
//! resulting statements are checked against the dialect's capabilities,
//! ordered into phases and rendered.
//!
//! The engine never mutates its inputs: renames are applied to a private
//! copy of the source store so that later kinds see the renamed state.

pub mod delta;
mod resolver;
mod similarity;

pub use resolver::{
    CandidateResolver, HintResolver, NoRenames, RenameCandidate, Renamed, Resolver,
    ResolverError, ResolverInput, ResolverOutput,
};
pub use similarity::{
    jaccard, levenshtein, similarity, RenameSimilarity, SimilarityContext, StructuralSimilarity,
};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ddl::{
    naming, Check, Column, Ddl, DdlEntity, EntityKey, EntityKind, Enum, Filter, ForeignKey,
    Index, Policy, PrimaryKey, Role, Schema, Sequence, Table, Unique, View,
};
use crate::dialect::Dialect;
use crate::error::{Error, Result, UnsupportedOperation};
use crate::statements::{self, Phase, Planned, Safety, Statement, StatementGroup};
use delta::{
    column_delta, column_needs_replacement, enum_change, policy_delta, policy_needs_replacement,
    role_delta, sequence_delta, view_delta, view_needs_replacement, DefinitionEq, EnumChange,
};

/// How strictly the diff treats operations the dialect cannot express.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// Writing a migration file: every unsupported operation is reported.
    #[default]
    Generate,
    /// Applying to a live database: the first unsupported operation aborts.
    Push,
}

/// Options for [`ddl_diff`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Generate or push.
    pub mode: DiffMode,
    /// Rename candidate scoring.
    pub similarity: Arc<dyn RenameSimilarity>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::new(DiffMode::Generate)
    }
}

impl DiffOptions {
    /// Options for `mode` with the default similarity.
    #[must_use]
    pub fn new(mode: DiffMode) -> Self {
        Self {
            mode,
            similarity: Arc::new(StructuralSimilarity::default()),
        }
    }

    /// Replaces the rename candidate scoring.
    #[must_use]
    pub fn with_similarity(mut self, similarity: impl RenameSimilarity + 'static) -> Self {
        self.similarity = Arc::new(similarity);
        self
    }
}

/// Result of [`ddl_diff`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffOutput {
    /// Statements in execution order.
    pub statements: Vec<Statement>,
    /// Rendered SQL in execution order.
    pub sql_statements: Vec<String>,
    /// Accepted renames as `old->new` keys.
    pub renames: Vec<String>,
    /// Statements grouped by phase.
    pub groups: Vec<StatementGroup>,
}

impl DiffOutput {
    /// Whether the stores were equivalent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl fmt::Display for DiffOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return f.write_str("no changes");
        }
        let lines: Vec<String> = self.groups.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

/// Computes the statements that turn `from` into `to`.
///
/// # Errors
///
/// - [`Error::Aborted`] when the resolver declines or answers with entities
///   it was not offered
/// - [`Error::Unsupported`] when the dialect cannot express a required
///   operation; no statements are returned in that case
/// - [`Error::Conflict`] when a rename cascade makes two entities collide
pub async fn ddl_diff(
    from: &Ddl,
    to: &Ddl,
    resolver: &mut dyn Resolver,
    dialect: &dyn Dialect,
    options: &DiffOptions,
) -> Result<DiffOutput> {
    let mut engine = Engine {
        working: from.clone(),
        to,
        dialect,
        similarity: options.similarity.as_ref(),
        resolver,
        planned: Vec::new(),
        renames: Vec::new(),
    };

    engine.schemas().await?;
    engine.enums().await?;
    engine.sequences().await?;
    engine.tables().await?;
    engine.columns().await?;
    engine.constraints::<PrimaryKey>().await?;
    engine.constraints::<Unique>().await?;
    engine.constraints::<ForeignKey>().await?;
    engine.constraints::<Check>().await?;
    engine.indexes().await?;
    engine.views().await?;
    engine.roles().await?;
    engine.policies().await?;
    engine.gate(options.mode)?;

    let planned = statements::order(engine.planned);
    let groups = statements::group(&planned, dialect)?;
    let sql_statements = groups
        .iter()
        .flat_map(|g| g.items.iter())
        .flat_map(|i| i.sql.iter().cloned())
        .collect();
    for item in groups.iter().flat_map(|g| g.items.iter()) {
        if let Safety::Destructive(hazard) = statements::classify(&item.statement) {
            warn!(object = %item.statement.target(), %hazard, "destructive statement");
        }
    }
    let statements: Vec<Statement> = planned.into_iter().map(|p| p.statement).collect();

    info!(
        dialect = dialect.name(),
        statements = statements.len(),
        renames = engine.renames.len(),
        "diff complete"
    );

    Ok(DiffOutput {
        statements,
        sql_statements,
        renames: engine.renames,
        groups,
    })
}

/// Constraint kinds share one diff routine.
trait ConstraintEntity: DdlEntity + DefinitionEq {
    fn added(self) -> Statement;
    fn dropped(self) -> Statement;
}

impl ConstraintEntity for PrimaryKey {
    fn added(self) -> Statement {
        Statement::AddPrimaryKey { pk: self }
    }

    fn dropped(self) -> Statement {
        Statement::DropPrimaryKey { pk: self }
    }
}

impl ConstraintEntity for Unique {
    fn added(self) -> Statement {
        Statement::AddUnique { unique: self }
    }

    fn dropped(self) -> Statement {
        Statement::DropUnique { unique: self }
    }
}

impl ConstraintEntity for ForeignKey {
    fn added(self) -> Statement {
        Statement::AddForeignKey { fk: self }
    }

    fn dropped(self) -> Statement {
        Statement::DropForeignKey { fk: self }
    }
}

impl ConstraintEntity for Check {
    fn added(self) -> Statement {
        Statement::AddCheck { check: self }
    }

    fn dropped(self) -> Statement {
        Statement::DropCheck { check: self }
    }
}

/// Enclosing table of a table-scoped key; `None` for other kinds.
fn scope_of(kind: EntityKind, key: &EntityKey) -> Option<EntityKey> {
    kind.table_scoped()
        .then(|| EntityKey::in_schema(key.schema.clone(), key.table.clone()))
}

fn swap_member(columns: &mut [String], old: &str, new: &str) -> bool {
    let mut touched = false;
    for column in columns.iter_mut().filter(|c| c.as_str() == old) {
        *column = new.to_string();
        touched = true;
    }
    touched
}

fn uses_enum(column: &Column, e: &Enum, default_schema: &str) -> bool {
    column.sql_type == e.name && column.type_schema.as_deref().unwrap_or(default_schema) == e.schema
}

/// Statements that SQLite-style dialects express by rebuilding the table.
const fn recreatable(statement: &Statement) -> bool {
    matches!(
        statement,
        Statement::AlterColumn { .. }
            | Statement::DropColumn { .. }
            | Statement::AddPrimaryKey { .. }
            | Statement::DropPrimaryKey { .. }
            | Statement::AddUnique { .. }
            | Statement::DropUnique { .. }
            | Statement::AddForeignKey { .. }
            | Statement::DropForeignKey { .. }
            | Statement::AddCheck { .. }
            | Statement::DropCheck { .. }
            | Statement::RenameConstraint { .. }
    )
}

struct Engine<'a, R: Resolver + ?Sized> {
    /// The source store with every accepted rename applied.
    working: Ddl,
    to: &'a Ddl,
    dialect: &'a dyn Dialect,
    similarity: &'a dyn RenameSimilarity,
    resolver: &'a mut R,
    planned: Vec<Planned>,
    renames: Vec<String>,
}

impl<R: Resolver + ?Sized> Engine<'_, R> {
    fn emit(&mut self, statement: Statement) {
        self.planned.push(Planned::new(statement));
    }

    /// Drop and re-add of one object, kept together in the re-add's phase.
    fn replace(&mut self, drop: Statement, add: Statement) {
        let phase = add.phase();
        self.planned.push(Planned::in_phase(drop, phase));
        self.planned.push(Planned::new(add));
    }

    fn record_rename(&mut self, from: &EntityKey, to: &EntityKey) {
        debug!(%from, %to, "rename accepted");
        self.renames.push(format!("{from}->{to}"));
    }

    fn created<T: DdlEntity>(&self) -> Vec<T> {
        let working = self.working.collection::<T>();
        self.to
            .collection::<T>()
            .iter()
            .filter(|e| !working.contains(&e.key()))
            .cloned()
            .collect()
    }

    fn deleted<T: DdlEntity>(&self) -> Vec<T> {
        let to = self.to.collection::<T>();
        self.working
            .collection::<T>()
            .iter()
            .filter(|e| !to.contains(&e.key()))
            .cloned()
            .collect()
    }

    fn common<T: DdlEntity>(&self) -> Vec<(T, T)> {
        let working = self.working.collection::<T>();
        self.to
            .collection::<T>()
            .iter()
            .filter_map(|e| working.get(&e.key()).map(|w| (w.clone(), e.clone())))
            .collect()
    }

    /// Offers the created/deleted entities of `T` to the resolver, one call
    /// per enclosing table for table-scoped kinds, and returns the accepted
    /// `(old, new)` pairs.
    async fn resolve<T: DdlEntity>(&mut self) -> Result<Vec<(T, T)>> {
        let kind = T::KIND;
        let deleted = self.deleted::<T>();
        let created = self.created::<T>();
        debug!(%kind, deleted = deleted.len(), created = created.len(), "partitioned");
        if deleted.is_empty() || created.is_empty() {
            return Ok(Vec::new());
        }

        let mut scopes: Vec<Option<EntityKey>> = Vec::new();
        for entity in &deleted {
            let scope = scope_of(kind, &entity.key());
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }

        let mut accepted = Vec::new();
        for scope in scopes {
            let in_scope = |e: &&T| scope_of(kind, &e.key()) == scope;
            let group_deleted: Vec<_> = deleted
                .iter()
                .filter(in_scope)
                .cloned()
                .map(DdlEntity::into_entity)
                .collect();
            let group_created: Vec<_> = created
                .iter()
                .filter(in_scope)
                .cloned()
                .map(DdlEntity::into_entity)
                .collect();
            if group_created.is_empty() {
                continue;
            }

            let ctx = SimilarityContext {
                from: &self.working,
                to: self.to,
                dialect: self.dialect,
            };
            let mut candidates = Vec::new();
            for (d, old) in group_deleted.iter().enumerate() {
                for (c, new) in group_created.iter().enumerate() {
                    if let Some(score) = self.similarity.score(old, new, &ctx) {
                        candidates.push(RenameCandidate {
                            deleted: d,
                            created: c,
                            score,
                        });
                    }
                }
            }
            candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

            debug!(
                %kind,
                scope = ?scope.as_ref().map(ToString::to_string),
                candidates = candidates.len(),
                "resolving renames"
            );
            let offered_deleted: HashSet<EntityKey> =
                group_deleted.iter().map(|e| e.key()).collect();
            let offered_created: HashSet<EntityKey> =
                group_created.iter().map(|e| e.key()).collect();
            let input = ResolverInput {
                kind,
                scope,
                created: group_created,
                deleted: group_deleted,
                candidates,
            };
            let output = self
                .resolver
                .resolve(input)
                .await
                .map_err(|e| Error::Aborted {
                    kind,
                    reason: e.to_string(),
                })?;

            let mut used = HashSet::new();
            for Renamed { from, to } in output.renamed {
                let (from_key, to_key) = (from.key(), to.key());
                let valid = offered_deleted.contains(&from_key)
                    && offered_created.contains(&to_key)
                    && used.insert(from_key.clone())
                    && used.insert(to_key.clone());
                match (valid, T::from_entity(from), T::from_entity(to)) {
                    (true, Some(from), Some(to)) => accepted.push((from, to)),
                    _ => {
                        return Err(Error::Aborted {
                            kind,
                            reason: format!(
                                "resolver renamed `{from_key}` to `{to_key}`, which were not offered as a pair"
                            ),
                        })
                    }
                }
            }
        }
        Ok(accepted)
    }

    // ============================================================
    // Namespaces
    // ============================================================

    async fn schemas(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Schema>().await? {
            self.record_rename(&from.key(), &to.key());
            self.emit(Statement::RenameSchema {
                from: from.clone(),
                to: to.clone(),
            });
            self.move_schema(&from.name, &to.name)?;
            self.working.schemas.replace(&from.key(), to)?;
        }

        let default = self.dialect.default_schema();
        for schema in self.created::<Schema>() {
            if schema.name != default {
                self.emit(Statement::CreateSchema { schema });
            }
        }
        for schema in self.deleted::<Schema>() {
            if schema.name != default {
                self.emit(Statement::DropSchema { schema });
            }
        }
        Ok(())
    }

    /// Rewrites every schema-qualified entity from `old` into `new`.
    fn move_schema(&mut self, old: &str, new: &str) -> Result<()> {
        let mv = |schema: &mut String| {
            if schema.as_str() == old {
                *schema = new.to_string();
            }
        };
        let w = &mut self.working;
        w.enums.update_all(|e| mv(&mut e.schema))?;
        w.sequences.update_all(|e| mv(&mut e.schema))?;
        w.tables.update_all(|e| mv(&mut e.schema))?;
        w.columns.update_all(|e| {
            mv(&mut e.schema);
            if let Some(type_schema) = e.type_schema.as_mut() {
                mv(type_schema);
            }
        })?;
        w.pks.update_all(|e| mv(&mut e.schema))?;
        w.uniques.update_all(|e| mv(&mut e.schema))?;
        w.fks.update_all(|e| {
            mv(&mut e.schema);
            mv(&mut e.schema_to);
        })?;
        w.checks.update_all(|e| mv(&mut e.schema))?;
        w.indexes.update_all(|e| mv(&mut e.schema))?;
        w.views.update_all(|e| mv(&mut e.schema))?;
        w.policies.update_all(|e| mv(&mut e.schema))?;
        Ok(())
    }

    async fn enums(&mut self) -> Result<()> {
        let default = self.dialect.default_schema();
        for (from, to) in self.resolve::<Enum>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Enum {
                schema: to.schema.clone(),
                name: to.name.clone(),
                values: from.values.clone(),
            };
            self.emit(Statement::RenameEnum {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.working.columns.update_all(|c| {
                if uses_enum(c, &from, default) {
                    c.sql_type = renamed.name.clone();
                    if c.type_schema.is_some() || renamed.schema != default {
                        c.type_schema = Some(renamed.schema.clone());
                    }
                }
            })?;
            self.working.enums.replace(&from.key(), renamed)?;
        }

        for enum_type in self.created::<Enum>() {
            self.emit(Statement::CreateEnum { enum_type });
        }
        for enum_type in self.deleted::<Enum>() {
            self.emit(Statement::DropEnum { enum_type });
        }
        for (from, to) in self.common::<Enum>() {
            match enum_change(&from, &to) {
                EnumChange::Unchanged => {}
                EnumChange::Added(values) => {
                    for (value, before) in values {
                        self.emit(Statement::AlterEnumAddValue {
                            enum_type: to.clone(),
                            value,
                            before,
                        });
                    }
                }
                EnumChange::Recreate => {
                    let columns = self
                        .to
                        .columns
                        .iter()
                        .filter(|c| uses_enum(c, &to, default))
                        .cloned()
                        .collect();
                    self.emit(Statement::RecreateEnum { from, to, columns });
                }
            }
        }
        Ok(())
    }

    async fn sequences(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Sequence>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Sequence {
                schema: to.schema.clone(),
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenameSequence {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.working.sequences.replace(&from.key(), renamed)?;
        }

        for sequence in self.created::<Sequence>() {
            self.emit(Statement::CreateSequence { sequence });
        }
        for sequence in self.deleted::<Sequence>() {
            self.emit(Statement::DropSequence { sequence });
        }
        for (from, to) in self.common::<Sequence>() {
            let delta = sequence_delta(&from, &to);
            if !delta.is_empty() {
                self.emit(Statement::AlterSequence { from, to, delta });
            }
        }
        Ok(())
    }

    // ============================================================
    // Tables and columns
    // ============================================================

    async fn tables(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Table>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Table {
                schema: to.schema.clone(),
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenameTable {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.move_table(&from, &renamed)?;
            self.working.tables.replace(&from.key(), renamed)?;
        }

        for table in self.created::<Table>() {
            self.create_table(table)?;
        }
        for table in self.deleted::<Table>() {
            self.forget_table(&table);
            self.emit(Statement::DropTable { table });
        }
        for (from, to) in self.common::<Table>() {
            if from.is_rls_enabled != to.is_rls_enabled {
                self.emit(Statement::AlterRls { table: to });
            }
        }
        Ok(())
    }

    /// Emits `CREATE TABLE` with inline columns and constraints, then adopts
    /// the table's dependents so later kinds see them as unchanged.
    fn create_table(&mut self, table: Table) -> Result<()> {
        let filter = Filter::any().schema(&table.schema).table(&table.name);
        let columns: Vec<Column> = self.to.columns.list(&filter).into_iter().cloned().collect();
        let pk = self.to.pks.list(&filter).first().map(|pk| (*pk).clone());
        let uniques: Vec<Unique> = self.to.uniques.list(&filter).into_iter().cloned().collect();
        let checks: Vec<Check> = self.to.checks.list(&filter).into_iter().cloned().collect();
        let fks: Vec<ForeignKey> = self.to.fks.list(&filter).into_iter().cloned().collect();
        let indexes: Vec<Index> = self.to.indexes.list(&filter).into_iter().cloned().collect();

        let inline_fks = self.dialect.capabilities().recreate_table;
        self.emit(Statement::CreateTable {
            table: table.clone(),
            columns: columns.clone(),
            pk: pk.clone(),
            uniques: uniques.clone(),
            checks: checks.clone(),
            fks: if inline_fks { fks.clone() } else { Vec::new() },
        });
        if !inline_fks {
            for fk in &fks {
                self.emit(Statement::AddForeignKey { fk: fk.clone() });
            }
        }
        for index in &indexes {
            self.emit(Statement::CreateIndex {
                index: index.clone(),
            });
        }

        let w = &mut self.working;
        for column in columns {
            w.columns.push(column)?;
        }
        if let Some(pk) = pk {
            w.pks.push(pk)?;
        }
        for unique in uniques {
            w.uniques.push(unique)?;
        }
        for check in checks {
            w.checks.push(check)?;
        }
        for fk in fks {
            w.fks.push(fk)?;
        }
        for index in indexes {
            w.indexes.push(index)?;
        }
        w.tables.push(table)?;
        Ok(())
    }

    /// Drops the dependents of a dropped table from the working store so
    /// they are not dropped one by one.
    fn forget_table(&mut self, table: &Table) {
        let other = |schema: &str, name: &str| schema != table.schema || name != table.name;
        let w = &mut self.working;
        w.columns.retain(|e| other(&e.schema, &e.table));
        w.pks.retain(|e| other(&e.schema, &e.table));
        w.uniques.retain(|e| other(&e.schema, &e.table));
        w.fks.retain(|e| other(&e.schema, &e.table));
        w.checks.retain(|e| other(&e.schema, &e.table));
        w.indexes.retain(|e| other(&e.schema, &e.table));
        w.policies.retain(|e| other(&e.schema, &e.table));
    }

    /// Moves the dependents of a renamed table along with it. Default names
    /// are recomputed for the new table name.
    fn move_table(&mut self, from: &Table, to: &Table) -> Result<()> {
        let is_old = |schema: &str, table: &str| schema == from.schema && table == from.name;
        let w = &mut self.working;

        w.columns.update_all(|c| {
            if is_old(&c.schema, &c.table) {
                c.schema.clone_from(&to.schema);
                c.table.clone_from(&to.name);
            }
        })?;
        w.pks.update_all(|pk| {
            if is_old(&pk.schema, &pk.table) {
                pk.schema.clone_from(&to.schema);
                pk.table.clone_from(&to.name);
                if !pk.name_explicit {
                    pk.name = naming::default_primary_key(pk);
                }
            }
        })?;
        w.uniques.update_all(|u| {
            if is_old(&u.schema, &u.table) {
                u.schema.clone_from(&to.schema);
                u.table.clone_from(&to.name);
                if !u.name_explicit {
                    u.name = naming::default_unique(u);
                }
            }
        })?;
        w.fks.update_all(|fk| {
            let mut touched = false;
            if is_old(&fk.schema, &fk.table) {
                fk.schema.clone_from(&to.schema);
                fk.table.clone_from(&to.name);
                touched = true;
            }
            if is_old(&fk.schema_to, &fk.table_to) {
                fk.schema_to.clone_from(&to.schema);
                fk.table_to.clone_from(&to.name);
                touched = true;
            }
            if touched && !fk.name_explicit {
                fk.name = naming::default_foreign_key(fk);
            }
        })?;
        w.checks.update_all(|check| {
            if is_old(&check.schema, &check.table) {
                if !check.name_explicit && naming::is_default_check(&from.name, &check.name) {
                    check.name = naming::rebase_check(&check.name, &from.name, &to.name);
                }
                check.schema.clone_from(&to.schema);
                check.table.clone_from(&to.name);
            }
        })?;
        w.indexes.update_all(|index| {
            if is_old(&index.schema, &index.table) {
                index.schema.clone_from(&to.schema);
                index.table.clone_from(&to.name);
                if !index.name_explicit {
                    if let Some(name) = naming::default_index(index) {
                        index.name = name;
                    }
                }
            }
        })?;
        w.policies.update_all(|p| {
            if is_old(&p.schema, &p.table) {
                p.schema.clone_from(&to.schema);
                p.table.clone_from(&to.name);
            }
        })?;
        Ok(())
    }

    async fn columns(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Column>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Column {
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenameColumn {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.rename_column_refs(&from, &to.name)?;
            self.working.columns.replace(&from.key(), renamed)?;
        }

        for column in self.created::<Column>() {
            self.emit(Statement::AddColumn { column });
        }
        for column in self.deleted::<Column>() {
            self.emit(Statement::DropColumn { column });
        }
        for (from, to) in self.common::<Column>() {
            if column_needs_replacement(&from, &to) {
                self.replace(
                    Statement::DropColumn { column: from },
                    Statement::AddColumn { column: to },
                );
                continue;
            }
            let delta = column_delta(&from, &to, self.dialect);
            if !delta.is_empty() {
                self.emit(Statement::AlterColumn { from, to, delta });
            }
        }
        Ok(())
    }

    /// Rewrites member-column lists that mention a renamed column and
    /// recomputes the default names that depend on them.
    fn rename_column_refs(&mut self, column: &Column, new: &str) -> Result<()> {
        let old = column.name.as_str();
        let on_table = |schema: &str, table: &str| schema == column.schema && table == column.table;
        let w = &mut self.working;

        w.pks.update_all(|pk| {
            if on_table(&pk.schema, &pk.table) {
                swap_member(&mut pk.columns, old, new);
            }
        })?;
        w.uniques.update_all(|u| {
            if on_table(&u.schema, &u.table)
                && swap_member(&mut u.columns, old, new)
                && !u.name_explicit
            {
                u.name = naming::default_unique(u);
            }
        })?;
        w.fks.update_all(|fk| {
            let mut touched = false;
            if on_table(&fk.schema, &fk.table) {
                touched |= swap_member(&mut fk.columns, old, new);
            }
            if on_table(&fk.schema_to, &fk.table_to) {
                touched |= swap_member(&mut fk.columns_to, old, new);
            }
            if touched && !fk.name_explicit {
                fk.name = naming::default_foreign_key(fk);
            }
        })?;
        w.indexes.update_all(|index| {
            if !on_table(&index.schema, &index.table) {
                return;
            }
            let mut touched = false;
            for part in index
                .columns
                .iter_mut()
                .filter(|p| !p.is_expression && p.value == old)
            {
                part.value = new.to_string();
                touched = true;
            }
            if touched && !index.name_explicit {
                if let Some(name) = naming::default_index(index) {
                    index.name = name;
                }
            }
        })?;
        Ok(())
    }

    // ============================================================
    // Constraints and indexes
    // ============================================================

    async fn constraints<T: ConstraintEntity>(&mut self) -> Result<()> {
        let can_rename = self.dialect.capabilities().rename_constraint;
        for (from, to) in self.resolve::<T>().await? {
            let (from_key, to_key) = (from.key(), to.key());
            self.record_rename(&from_key, &to_key);
            if can_rename && from.same_definition(&to) {
                self.emit(Statement::RenameConstraint {
                    kind: T::KIND,
                    schema: from_key.schema.clone(),
                    table: from_key.table.clone(),
                    from: from_key.name.clone(),
                    to: to_key.name,
                });
            } else {
                self.replace(from.dropped(), to.clone().added());
            }
            T::collection_mut(&mut self.working).replace(&from_key, to)?;
        }

        let mut deleted = self.deleted::<T>();
        for created in self.created::<T>() {
            // A table has one primary key: a new one replaces the old one.
            let replaced = if T::KIND == EntityKind::PrimaryKey {
                let scope = scope_of(T::KIND, &created.key());
                deleted
                    .iter()
                    .position(|d| scope_of(T::KIND, &d.key()) == scope)
                    .map(|i| deleted.remove(i))
            } else {
                None
            };
            match replaced {
                Some(old) => self.replace(old.dropped(), created.added()),
                None => self.emit(created.added()),
            }
        }
        for old in deleted {
            self.emit(old.dropped());
        }
        for (from, to) in self.common::<T>() {
            if !from.same_definition(&to) {
                self.replace(from.dropped(), to.added());
            }
        }
        Ok(())
    }

    async fn indexes(&mut self) -> Result<()> {
        let can_rename = self.dialect.capabilities().rename_index;
        for (from, to) in self.resolve::<Index>().await? {
            self.record_rename(&from.key(), &to.key());
            if can_rename && from.same_definition(&to) {
                self.emit(Statement::RenameIndex {
                    schema: from.schema.clone(),
                    table: from.table.clone(),
                    from: from.name.clone(),
                    to: to.name.clone(),
                });
            } else {
                self.replace(
                    Statement::DropIndex {
                        index: from.clone(),
                    },
                    Statement::CreateIndex { index: to.clone() },
                );
            }
            self.working.indexes.replace(&from.key(), to)?;
        }

        for index in self.created::<Index>() {
            self.emit(Statement::CreateIndex { index });
        }
        for index in self.deleted::<Index>() {
            self.emit(Statement::DropIndex { index });
        }
        for (from, to) in self.common::<Index>() {
            if !from.same_definition(&to) {
                self.replace(
                    Statement::DropIndex { index: from },
                    Statement::CreateIndex { index: to },
                );
            }
        }
        Ok(())
    }

    // ============================================================
    // Views, roles and policies
    // ============================================================

    async fn views(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<View>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = View {
                schema: to.schema.clone(),
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenameView {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.working.views.replace(&from.key(), renamed)?;
        }

        for view in self.created::<View>() {
            if view.definition.is_some() {
                self.emit(Statement::CreateView { view });
            }
        }
        for view in self.deleted::<View>() {
            self.emit(Statement::DropView { view });
        }
        for (from, to) in self.common::<View>() {
            if to.definition.is_none() {
                continue;
            }
            if view_needs_replacement(&from, &to) {
                self.replace(
                    Statement::DropView { view: from },
                    Statement::CreateView { view: to },
                );
                continue;
            }
            let delta = view_delta(&from, &to);
            if !delta.is_empty() {
                self.emit(Statement::AlterView { from, to, delta });
            }
        }
        Ok(())
    }

    async fn roles(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Role>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Role {
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenameRole {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.working.policies.update_all(|p| {
                swap_member(&mut p.roles, &from.name, &renamed.name);
            })?;
            self.working.roles.replace(&from.key(), renamed)?;
        }

        for role in self.created::<Role>() {
            self.emit(Statement::CreateRole { role });
        }
        for role in self.deleted::<Role>() {
            self.emit(Statement::DropRole { role });
        }
        for (from, to) in self.common::<Role>() {
            let delta = role_delta(&from, &to);
            if !delta.is_empty() {
                self.emit(Statement::AlterRole { from, to, delta });
            }
        }
        Ok(())
    }

    async fn policies(&mut self) -> Result<()> {
        for (from, to) in self.resolve::<Policy>().await? {
            self.record_rename(&from.key(), &to.key());
            let renamed = Policy {
                name: to.name.clone(),
                ..from.clone()
            };
            self.emit(Statement::RenamePolicy {
                from: from.clone(),
                to: renamed.clone(),
            });
            self.working.policies.replace(&from.key(), renamed)?;
        }

        for policy in self.created::<Policy>() {
            self.emit(Statement::CreatePolicy { policy });
        }
        for policy in self.deleted::<Policy>() {
            self.emit(Statement::DropPolicy { policy });
        }
        for (from, to) in self.common::<Policy>() {
            if policy_needs_replacement(&from, &to) {
                self.replace(
                    Statement::DropPolicy { policy: from },
                    Statement::CreatePolicy { policy: to },
                );
                continue;
            }
            let delta = policy_delta(&from, &to);
            if !delta.is_empty() {
                self.emit(Statement::AlterPolicy { from, to, delta });
            }
        }
        Ok(())
    }

    // ============================================================
    // Capability gate
    // ============================================================

    /// Rewrites unsupported table alterations into table recreation where
    /// the dialect can do that, then reports whatever is still unsupported.
    fn gate(&mut self, mode: DiffMode) -> Result<()> {
        let caps = self.dialect.capabilities();
        if caps.recreate_table {
            self.recreate_tables();
        }

        let mut problems = Vec::new();
        for planned in &self.planned {
            for operation in caps.violations(&planned.statement) {
                problems.push(UnsupportedOperation {
                    dialect: self.dialect.name().to_string(),
                    operation: operation.to_string(),
                    target: planned.statement.target(),
                });
            }
        }
        if problems.is_empty() {
            return Ok(());
        }
        if mode == DiffMode::Push {
            problems.truncate(1);
        }
        for problem in &problems {
            warn!(%problem, "unsupported operation");
        }
        Err(Error::Unsupported(problems))
    }

    fn recreate_tables(&mut self) {
        let caps = self.dialect.capabilities();
        let mut tables: Vec<EntityKey> = Vec::new();
        for planned in &self.planned {
            if !recreatable(&planned.statement) || caps.violations(&planned.statement).is_empty() {
                continue;
            }
            if let Some(key) = planned.statement.altered_table() {
                if !tables.contains(&key) {
                    tables.push(key);
                }
            }
        }

        for key in tables {
            let Some(table) = self.to.tables.get(&key).cloned() else {
                continue;
            };
            let filter = Filter::any().schema(&table.schema).table(&table.name);
            let columns: Vec<Column> = self.to.columns.list(&filter).into_iter().cloned().collect();
            let copy_columns = columns
                .iter()
                .filter(|c| c.generated.is_none())
                .filter(|c| {
                    self.working
                        .columns
                        .get(&c.key())
                        .is_some_and(|old| old.generated.is_none())
                })
                .map(|c| c.name.clone())
                .collect();
            let statement = Statement::RecreateTable {
                table: table.clone(),
                columns,
                pk: self.to.pks.list(&filter).first().map(|pk| (*pk).clone()),
                uniques: self.to.uniques.list(&filter).into_iter().cloned().collect(),
                checks: self.to.checks.list(&filter).into_iter().cloned().collect(),
                fks: self.to.fks.list(&filter).into_iter().cloned().collect(),
                indexes: self.to.indexes.list(&filter).into_iter().cloned().collect(),
                copy_columns,
            };

            let mut kept = Vec::with_capacity(self.planned.len());
            let mut position = None;
            for planned in std::mem::take(&mut self.planned) {
                let absorbed = planned.statement.altered_table().as_ref() == Some(&key)
                    && !matches!(planned.statement, Statement::RenameColumn { .. });
                if absorbed {
                    position.get_or_insert(kept.len());
                } else {
                    kept.push(planned);
                }
            }
            let at = position.unwrap_or(kept.len());
            kept.insert(at, Planned::in_phase(statement, Phase::Tables));
            self.planned = kept;
            info!(table = %key, "table will be recreated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::Entity;
    use crate::dialect::{PostgresDialect, SqliteDialect};

    fn users(columns: &[(&str, &str)]) -> Ddl {
        let mut ddl = Ddl::new();
        ddl.push(Table::new("public", "users").into()).unwrap();
        for (name, sql_type) in columns {
            ddl.push(Column::new("public", "users", *name, *sql_type).into())
                .unwrap();
        }
        ddl
    }

    struct Decline;

    #[async_trait::async_trait]
    impl Resolver for Decline {
        async fn resolve(
            &mut self,
            _input: ResolverInput,
        ) -> std::result::Result<ResolverOutput, ResolverError> {
            Err(ResolverError::Declined)
        }
    }

    #[tokio::test]
    async fn identical_stores_produce_nothing() {
        let ddl = users(&[("id", "integer"), ("name", "text")]);
        let out = ddl_diff(
            &ddl,
            &ddl,
            &mut NoRenames,
            &PostgresDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap();
        assert!(out.is_empty());
        assert!(out.sql_statements.is_empty());
        assert_eq!(out.to_string(), "no changes");
    }

    #[tokio::test]
    async fn declined_resolver_aborts() {
        let from = users(&[("id", "integer"), ("email", "text")]);
        let to = users(&[("id", "integer"), ("mail", "text")]);
        let err = ddl_diff(
            &from,
            &to,
            &mut Decline,
            &PostgresDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Aborted {
                kind: EntityKind::Column,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn column_rename_recomputes_unique_name() {
        let unique = |column: &str| Unique {
            schema: "public".into(),
            table: "users".into(),
            name: naming::unique("users", &[column.to_string()]),
            name_explicit: false,
            columns: vec![column.to_string()],
            nulls_not_distinct: false,
        };
        let mut from = users(&[("email", "text")]);
        from.push(unique("email").into()).unwrap();
        let mut to = users(&[("mail", "text")]);
        to.push(unique("mail").into()).unwrap();

        let out = ddl_diff(
            &from,
            &to,
            &mut CandidateResolver::new(),
            &PostgresDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out.statements.len(), 1);
        assert!(matches!(out.statements[0], Statement::RenameColumn { .. }));
        assert_eq!(out.renames, ["public.users.email->public.users.mail"]);
    }

    #[tokio::test]
    async fn new_primary_key_replaces_old_one() {
        let pk = |name: &str, column: &str| -> Entity {
            PrimaryKey {
                schema: "public".into(),
                table: "users".into(),
                name: name.into(),
                name_explicit: true,
                columns: vec![column.into()],
            }
            .into()
        };
        let mut from = users(&[("id", "integer"), ("uuid", "uuid")]);
        from.push(pk("users_id_pkey", "id")).unwrap();
        let mut to = users(&[("id", "integer"), ("uuid", "uuid")]);
        to.push(pk("users_uuid_pkey", "uuid")).unwrap();

        let out = ddl_diff(
            &from,
            &to,
            &mut NoRenames,
            &PostgresDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap();
        assert!(matches!(out.statements[0], Statement::DropPrimaryKey { .. }));
        assert!(matches!(out.statements[1], Statement::AddPrimaryKey { .. }));
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].phase, Phase::Constraints);
    }

    #[tokio::test]
    async fn sqlite_recreates_for_type_changes() {
        let mut from = Ddl::new();
        from.push(Table::new("", "t").into()).unwrap();
        from.push(Column::new("", "t", "a", "integer").into()).unwrap();
        from.push(Column::new("", "t", "b", "text").into()).unwrap();
        let mut to = Ddl::new();
        to.push(Table::new("", "t").into()).unwrap();
        to.push(Column::new("", "t", "a", "integer").not_null().into())
            .unwrap();
        to.push(Column::new("", "t", "b", "text").into()).unwrap();

        let out = ddl_diff(
            &from,
            &to,
            &mut NoRenames,
            &SqliteDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out.statements.len(), 1);
        match &out.statements[0] {
            Statement::RecreateTable { copy_columns, .. } => {
                assert_eq!(copy_columns, &["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected RecreateTable, got {other:?}"),
        }
        assert_eq!(out.sql_statements[0], "PRAGMA foreign_keys=OFF");
    }

    #[tokio::test]
    async fn dropped_table_takes_dependents_along() {
        let mut from = users(&[("id", "integer")]);
        from.push(
            Index {
                schema: "public".into(),
                table: "users".into(),
                name: "users_id_index".into(),
                name_explicit: false,
                columns: vec![crate::ddl::IndexColumn::column("id")],
                is_unique: false,
                method: String::new(),
                where_clause: None,
                concurrently: false,
                with: None,
            }
            .into(),
        )
        .unwrap();
        let out = ddl_diff(
            &from,
            &Ddl::new(),
            &mut NoRenames,
            &PostgresDialect::new(),
            &DiffOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(out.statements.len(), 1);
        assert!(matches!(out.statements[0], Statement::DropTable { .. }));
    }
}

//! Conflict-detecting typed collections and the multi-kind [`Ddl`] store.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::{
    Check, Column, DdlEntity, Entity, EntityKey, EntityKind, Enum, ForeignKey, Index, Policy,
    PrimaryKey, Role, Schema, Sequence, Table, Unique, View, ENTITY_TAG,
};
use crate::error::{Conflict, Error, Result};

/// Partial natural key used by [`Collection::list`] and [`Collection::one`].
///
/// `None` parts match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Filter<'a> {
    /// Required schema.
    pub schema: Option<&'a str>,
    /// Required table.
    pub table: Option<&'a str>,
    /// Required name.
    pub name: Option<&'a str>,
}

impl<'a> Filter<'a> {
    /// A filter that matches every entity.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            schema: None,
            table: None,
            name: None,
        }
    }

    /// Restricts to one schema.
    #[must_use]
    pub const fn schema(mut self, schema: &'a str) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Restricts to one table.
    #[must_use]
    pub const fn table(mut self, table: &'a str) -> Self {
        self.table = Some(table);
        self
    }

    /// Restricts to one name.
    #[must_use]
    pub const fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Whether `key` satisfies every set part of the filter.
    #[must_use]
    pub fn matches(&self, key: &EntityKey) -> bool {
        self.schema.map_or(true, |s| s == key.schema)
            && self.table.map_or(true, |t| t == key.table)
            && self.name.map_or(true, |n| n == key.name)
    }
}

impl fmt::Display for Filter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |p: Option<&str>| p.unwrap_or("*").to_string();
        write!(
            f,
            "{}.{}.{}",
            part(self.schema),
            part(self.table),
            part(self.name)
        )
    }
}

/// All entities of one kind, in insertion order, indexed by natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<EntityKey, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: DdlEntity> Collection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `item`, refusing it when its natural key is already taken.
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] when the key is taken.
    pub fn push(&mut self, item: T) -> std::result::Result<(), Conflict> {
        let key = item.key();
        if self.index.contains_key(&key) {
            return Err(Conflict { kind: T::KIND, key });
        }
        self.index.insert(key, self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Entities matching `filter`, in insertion order.
    #[must_use]
    pub fn list(&self, filter: &Filter<'_>) -> Vec<&T> {
        self.items
            .iter()
            .filter(|item| filter.matches(&item.key()))
            .collect()
    }

    /// The single entity matching `filter`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AmbiguousLookup`] when more than one entity matches.
    pub fn one(&self, filter: &Filter<'_>) -> Result<Option<&T>> {
        let mut found = self.list(filter);
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => Err(Error::AmbiguousLookup {
                kind: T::KIND,
                filter: filter.to_string(),
                count,
            }),
        }
    }

    /// Looks an entity up by its exact natural key.
    #[must_use]
    pub fn get(&self, key: &EntityKey) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Whether an entity with `key` exists.
    #[must_use]
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Structural shape check for a serialized entity of this kind.
    ///
    /// The value must deserialize into `T` and serialize back to exactly the
    /// same JSON, so unknown fields, missing fields and mistyped fields all
    /// fail. An `entityType` tag, when present, must name this kind.
    #[must_use]
    pub fn validate(value: &Value) -> bool {
        let Value::Object(map) = value else {
            return false;
        };
        let mut map = map.clone();
        if let Some(tag) = map.remove(ENTITY_TAG) {
            if tag.as_str() != Some(T::KIND.tag()) {
                return false;
            }
        }
        let stripped = Value::Object(map);
        match serde_json::from_value::<T>(stripped.clone()) {
            Ok(parsed) => serde_json::to_value(&parsed).is_ok_and(|v| v == stripped),
            Err(_) => false,
        }
    }

    /// Puts `item` in place of the entity with `key`, keeping its position.
    /// Returns `false` when no entity has that key.
    pub(crate) fn replace(
        &mut self,
        key: &EntityKey,
        item: T,
    ) -> std::result::Result<bool, Conflict> {
        let Some(position) = self.index.get(key).copied() else {
            return Ok(false);
        };
        self.items[position] = item;
        self.reindex_checked()?;
        Ok(true)
    }

    /// Keeps only the entities for which `keep` returns `true`.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
        self.reindex();
    }

    /// Applies `f` to every entity and rebuilds the key index.
    ///
    /// When two entities end up sharing a key the collection is left as
    /// rewritten and the first collision is reported.
    pub(crate) fn update_all(
        &mut self,
        mut f: impl FnMut(&mut T),
    ) -> std::result::Result<(), Conflict> {
        for item in &mut self.items {
            f(item);
        }
        self.reindex_checked()
    }

    fn reindex(&mut self) {
        self.index = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.key(), i))
            .collect();
    }

    fn reindex_checked(&mut self) -> std::result::Result<(), Conflict> {
        self.index.clear();
        let mut conflict = None;
        for (i, item) in self.items.iter().enumerate() {
            let key = item.key();
            if self.index.contains_key(&key) {
                conflict.get_or_insert(Conflict { kind: T::KIND, key });
                continue;
            }
            self.index.insert(key, i);
        }
        conflict.map_or(Ok(()), Err)
    }
}

/// Shape check for a serialized [`Entity`]: the `entityType` tag must name a
/// known kind and the rest of the object must pass that kind's
/// [`Collection::validate`].
#[must_use]
pub fn validate_entity(value: &Value) -> bool {
    let Some(tag) = value.get(ENTITY_TAG).and_then(Value::as_str) else {
        return false;
    };
    let Some(kind) = EntityKind::ALL.into_iter().find(|k| k.tag() == tag) else {
        return false;
    };
    match kind {
        EntityKind::Schema => Collection::<Schema>::validate(value),
        EntityKind::Enum => Collection::<Enum>::validate(value),
        EntityKind::Sequence => Collection::<Sequence>::validate(value),
        EntityKind::Table => Collection::<Table>::validate(value),
        EntityKind::Column => Collection::<Column>::validate(value),
        EntityKind::PrimaryKey => Collection::<PrimaryKey>::validate(value),
        EntityKind::Unique => Collection::<Unique>::validate(value),
        EntityKind::ForeignKey => Collection::<ForeignKey>::validate(value),
        EntityKind::Check => Collection::<Check>::validate(value),
        EntityKind::Index => Collection::<Index>::validate(value),
        EntityKind::View => Collection::<View>::validate(value),
        EntityKind::Role => Collection::<Role>::validate(value),
        EntityKind::Policy => Collection::<Policy>::validate(value),
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A complete catalog: one [`Collection`] per entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ddl {
    /// Schemas.
    pub schemas: Collection<Schema>,
    /// Enumerated types.
    pub enums: Collection<Enum>,
    /// Sequences.
    pub sequences: Collection<Sequence>,
    /// Roles.
    pub roles: Collection<Role>,
    /// Tables.
    pub tables: Collection<Table>,
    /// Columns.
    pub columns: Collection<Column>,
    /// Primary keys.
    pub pks: Collection<PrimaryKey>,
    /// Unique constraints.
    pub uniques: Collection<Unique>,
    /// Foreign keys.
    pub fks: Collection<ForeignKey>,
    /// Check constraints.
    pub checks: Collection<Check>,
    /// Indexes.
    pub indexes: Collection<Index>,
    /// Views.
    pub views: Collection<View>,
    /// Policies.
    pub policies: Collection<Policy>,
}

impl Ddl {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from entities, failing on the first key collision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] for the first key collision.
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self> {
        let mut ddl = Self::new();
        for entity in entities {
            ddl.push(entity)?;
        }
        Ok(ddl)
    }

    /// The collection holding entities of type `T`.
    #[must_use]
    pub fn collection<T: DdlEntity>(&self) -> &Collection<T> {
        T::collection(self)
    }

    /// Inserts any entity into the collection of its kind.
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] when the key is taken.
    pub fn push(&mut self, entity: Entity) -> std::result::Result<(), Conflict> {
        match entity {
            Entity::Schema(e) => self.schemas.push(e),
            Entity::Enum(e) => self.enums.push(e),
            Entity::Sequence(e) => self.sequences.push(e),
            Entity::Role(e) => self.roles.push(e),
            Entity::Table(e) => self.tables.push(e),
            Entity::Column(e) => self.columns.push(e),
            Entity::PrimaryKey(e) => self.pks.push(e),
            Entity::Unique(e) => self.uniques.push(e),
            Entity::ForeignKey(e) => self.fks.push(e),
            Entity::Check(e) => self.checks.push(e),
            Entity::Index(e) => self.indexes.push(e),
            Entity::View(e) => self.views.push(e),
            Entity::Policy(e) => self.policies.push(e),
        }
    }

    /// Every entity, grouped by kind in diff order, insertion order within a
    /// kind.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        fn extend<T: DdlEntity>(out: &mut Vec<Entity>, items: &Collection<T>) {
            out.extend(items.iter().cloned().map(DdlEntity::into_entity));
        }

        let mut out = Vec::with_capacity(self.len());
        extend(&mut out, &self.schemas);
        extend(&mut out, &self.enums);
        extend(&mut out, &self.sequences);
        extend(&mut out, &self.tables);
        extend(&mut out, &self.columns);
        extend(&mut out, &self.pks);
        extend(&mut out, &self.uniques);
        extend(&mut out, &self.fks);
        extend(&mut out, &self.checks);
        extend(&mut out, &self.indexes);
        extend(&mut out, &self.views);
        extend(&mut out, &self.roles);
        extend(&mut out, &self.policies);
        out
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.enums.len()
            + self.sequences.len()
            + self.roles.len()
            + self.tables.len()
            + self.columns.len()
            + self.pks.len()
            + self.uniques.len()
            + self.fks.len()
            + self.checks.len()
            + self.indexes.len()
            + self.views.len()
            + self.policies.len()
    }

    /// Whether the store holds no entity at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_column(name: &str) -> Column {
        Column::new("public", "users", name, "text")
    }

    #[test]
    fn push_rejects_duplicate_key() {
        let mut columns = Collection::new();
        columns.push(users_column("email")).unwrap();

        let err = columns.push(users_column("email")).unwrap_err();
        assert_eq!(err.kind, crate::ddl::EntityKind::Column);
        assert_eq!(err.key.to_string(), "public.users.email");
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut columns = Collection::new();
        for name in ["zeta", "alpha", "mid"] {
            columns.push(users_column(name)).unwrap();
        }
        columns
            .push(Column::new("public", "posts", "alpha", "text"))
            .unwrap();

        let names: Vec<_> = columns
            .list(&Filter::any().table("users"))
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn one_reports_ambiguity() {
        let mut columns = Collection::new();
        columns.push(users_column("a")).unwrap();
        columns.push(users_column("b")).unwrap();

        assert!(columns.one(&Filter::any().name("a")).unwrap().is_some());
        assert!(columns.one(&Filter::any().name("zz")).unwrap().is_none());
        let err = columns.one(&Filter::any().table("users")).unwrap_err();
        assert!(matches!(err, Error::AmbiguousLookup { count: 2, .. }));
    }

    #[test]
    fn retain_reindexes() {
        let mut columns = Collection::new();
        columns.push(users_column("a")).unwrap();
        columns.push(users_column("b")).unwrap();
        columns.push(users_column("c")).unwrap();

        columns.retain(|c| c.name != "a");
        assert_eq!(columns.len(), 2);
        assert!(!columns.contains(&EntityKey::in_table("public", "users", "a")));
        assert_eq!(
            columns
                .get(&EntityKey::in_table("public", "users", "c"))
                .map(|c| c.name.as_str()),
            Some("c")
        );
    }

    #[test]
    fn update_all_detects_collisions() {
        let mut columns = Collection::new();
        columns.push(users_column("a")).unwrap();
        columns.push(users_column("b")).unwrap();

        let err = columns
            .update_all(|c| c.name = "same".to_string())
            .unwrap_err();
        assert_eq!(err.key.name, "same");
    }

    #[test]
    fn validate_checks_shape() {
        let good = serde_json::to_value(Table::new("public", "users")).unwrap();
        assert!(Collection::<Table>::validate(&good));

        let mut tagged = good.clone();
        tagged["entityType"] = json!("table");
        assert!(Collection::<Table>::validate(&tagged));
        tagged["entityType"] = json!("view");
        assert!(!Collection::<Table>::validate(&tagged));

        let mut extra = good.clone();
        extra["owner"] = json!("me");
        assert!(!Collection::<Table>::validate(&extra));

        let missing = json!({ "schema": "public", "name": "users" });
        assert!(!Collection::<Table>::validate(&missing));

        let wrong_type = json!({ "schema": "public", "name": "users", "isRlsEnabled": "yes" });
        assert!(!Collection::<Table>::validate(&wrong_type));
    }

    #[test]
    fn tagged_entities_validate_by_kind() {
        let column: Entity = users_column("email").into();
        let value = serde_json::to_value(&column).unwrap();
        assert!(validate_entity(&value));

        let mut untagged = value.clone();
        untagged.as_object_mut().unwrap().remove("entityType");
        assert!(!validate_entity(&untagged));

        let mut unknown = value;
        unknown["entityType"] = json!("trigger");
        assert!(!validate_entity(&unknown));
    }

    #[test]
    fn entities_are_grouped_by_kind() {
        let mut ddl = Ddl::new();
        ddl.push(users_column("id").into()).unwrap();
        ddl.push(Table::new("public", "users").into()).unwrap();
        ddl.push(Schema::new("public").into()).unwrap();

        let kinds: Vec<_> = ddl.entities().iter().map(Entity::kind).collect();
        assert_eq!(
            kinds,
            [
                crate::ddl::EntityKind::Schema,
                crate::ddl::EntityKind::Table,
                crate::ddl::EntityKind::Column
            ]
        );

        let rebuilt = Ddl::from_entities(ddl.entities()).unwrap();
        assert_eq!(rebuilt, ddl);
    }
}

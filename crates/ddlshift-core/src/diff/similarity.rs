//! Rename candidate scoring.
//!
//! Which dropped/created pairs look enough alike to be offered as rename
//! candidates is a heuristic, so it sits behind the [`RenameSimilarity`]
//! trait. [`StructuralSimilarity`] is the default.

use std::collections::HashSet;
use std::fmt;

use crate::ddl::{Ddl, Entity, Filter};
use crate::dialect::Dialect;

/// Computes the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let m = a.len();
    let n = b.len();
    let mut prev = (0..=n).collect::<Vec<_>>();
    let mut curr = vec![0; n + 1];
    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[n]
}

/// Returns a normalized similarity score in `[0.0, 1.0]`.
/// 1.0 means identical, 0.0 means completely different.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

/// Jaccard overlap of two sets of names.
#[must_use]
pub fn jaccard<'a>(a: impl IntoIterator<Item = &'a str>, b: impl IntoIterator<Item = &'a str>) -> f64 {
    let a: HashSet<&str> = a.into_iter().collect();
    let b: HashSet<&str> = b.into_iter().collect();
    let total = a.union(&b).count();
    if total == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / total as f64
}

/// What a similarity predicate may look at besides the pair itself.
#[derive(Clone, Copy)]
pub struct SimilarityContext<'a> {
    /// Store the deleted entity comes from.
    pub from: &'a Ddl,
    /// Store the created entity comes from.
    pub to: &'a Ddl,
    /// Active dialect, for type normalisation.
    pub dialect: &'a dyn Dialect,
}

/// Proposes rename candidates.
pub trait RenameSimilarity: fmt::Debug + Send + Sync {
    /// Scores a deleted/created pair of the same kind. `None` means the two
    /// are not compatible and must not be proposed; higher scores are
    /// better candidates.
    fn score(&self, deleted: &Entity, created: &Entity, ctx: &SimilarityContext<'_>) -> Option<f64>;
}

/// Default, shape-based candidate scoring.
///
/// - tables: Jaccard overlap of their column names, at least `table_threshold`
/// - columns: same normalized type, dimensions and nullability, with a name
///   similarity of at least `name_threshold`
/// - constraints and indexes: same member columns, ignoring order
/// - everything else: equal attributes apart from the name and schema
///
/// Compatible pairs other than tables are ranked by name similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructuralSimilarity {
    /// Minimum column-name overlap for two tables.
    pub table_threshold: f64,
    /// Minimum name similarity for two columns.
    pub name_threshold: f64,
}

impl Default for StructuralSimilarity {
    fn default() -> Self {
        Self {
            table_threshold: 0.5,
            name_threshold: 0.3,
        }
    }
}

impl StructuralSimilarity {
    /// Sets the table overlap threshold.
    #[must_use]
    pub const fn table_threshold(mut self, threshold: f64) -> Self {
        self.table_threshold = threshold;
        self
    }

    /// Sets the column name threshold.
    #[must_use]
    pub const fn name_threshold(mut self, threshold: f64) -> Self {
        self.name_threshold = threshold;
        self
    }
}

fn same_members(a: &[String], b: &[String]) -> bool {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    a == b
}

fn same_attributes(a: &Entity, b: &Entity) -> bool {
    let strip = |entity: &Entity| {
        let mut value = serde_json::to_value(entity).ok()?;
        let object = value.as_object_mut()?;
        object.remove("name");
        object.remove("schema");
        Some(value)
    };
    match (strip(a), strip(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl RenameSimilarity for StructuralSimilarity {
    fn score(&self, deleted: &Entity, created: &Entity, ctx: &SimilarityContext<'_>) -> Option<f64> {
        let name_score = similarity(&deleted.key().name, &created.key().name);
        match (deleted, created) {
            (Entity::Table(a), Entity::Table(b)) => {
                let a_cols = ctx
                    .from
                    .columns
                    .list(&Filter::any().schema(&a.schema).table(&a.name));
                let b_cols = ctx.to.columns.list(&Filter::any().schema(&b.schema).table(&b.name));
                let overlap = jaccard(
                    a_cols.iter().map(|c| c.name.as_str()),
                    b_cols.iter().map(|c| c.name.as_str()),
                );
                (overlap >= self.table_threshold).then_some(overlap)
            }
            (Entity::Column(a), Entity::Column(b)) => {
                let compatible = ctx.dialect.normalize_type(&a.sql_type)
                    == ctx.dialect.normalize_type(&b.sql_type)
                    && a.type_schema == b.type_schema
                    && a.dimensions == b.dimensions
                    && a.not_null == b.not_null;
                (compatible && name_score >= self.name_threshold).then_some(name_score)
            }
            (Entity::PrimaryKey(a), Entity::PrimaryKey(b)) => {
                same_members(&a.columns, &b.columns).then_some(name_score)
            }
            (Entity::Unique(a), Entity::Unique(b)) => {
                same_members(&a.columns, &b.columns).then_some(name_score)
            }
            (Entity::ForeignKey(a), Entity::ForeignKey(b)) => (same_members(&a.columns, &b.columns)
                && a.table_to == b.table_to)
                .then_some(name_score),
            (Entity::Check(a), Entity::Check(b)) => (a.value == b.value).then_some(name_score),
            (Entity::Index(a), Entity::Index(b)) => {
                let members = |index: &crate::ddl::Index| -> Vec<String> {
                    index.columns.iter().map(|c| c.value.clone()).collect()
                };
                (a.is_unique == b.is_unique && same_members(&members(a), &members(b)))
                    .then_some(name_score)
            }
            (a, b) if a.kind() == b.kind() => same_attributes(a, b).then_some(name_score),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::{Column, Schema, Table, Unique};
    use crate::dialect::PostgresDialect;

    fn ctx<'a>(from: &'a Ddl, to: &'a Ddl, dialect: &'a PostgresDialect) -> SimilarityContext<'a> {
        SimilarityContext { from, to, dialect }
    }

    #[test]
    fn levenshtein_basic() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn similarity_basic() {
        assert!((similarity("abc", "abc") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        let s = similarity("email", "email_address");
        assert!(s > 0.3 && s < 0.4, "sim={s}");
    }

    #[test]
    fn tables_compare_column_sets() {
        let mut from = Ddl::new();
        from.push(Table::new("public", "people").into()).unwrap();
        for name in ["id", "name", "email"] {
            from.push(Column::new("public", "people", name, "text").into())
                .unwrap();
        }
        let mut to = Ddl::new();
        to.push(Table::new("public", "users").into()).unwrap();
        for name in ["id", "name", "email", "bio"] {
            to.push(Column::new("public", "users", name, "text").into())
                .unwrap();
        }

        let dialect = PostgresDialect::new();
        let score = StructuralSimilarity::default().score(
            &Table::new("public", "people").into(),
            &Table::new("public", "users").into(),
            &ctx(&from, &to, &dialect),
        );
        assert_eq!(score, Some(0.75));

        let strict = StructuralSimilarity::default().table_threshold(0.9);
        assert_eq!(
            strict.score(
                &Table::new("public", "people").into(),
                &Table::new("public", "users").into(),
                &ctx(&from, &to, &dialect),
            ),
            None
        );
    }

    #[test]
    fn columns_need_the_same_shape() {
        let empty = Ddl::new();
        let dialect = PostgresDialect::new();
        let similarity = StructuralSimilarity::default();
        let email = Column::new("public", "users", "email", "varchar(255)");

        let renamed = Column::new("public", "users", "email_address", "character varying(255)");
        assert!(similarity
            .score(&email.clone().into(), &renamed.into(), &ctx(&empty, &empty, &dialect))
            .is_some());

        let retyped = Column::new("public", "users", "email_address", "integer");
        assert!(similarity
            .score(&email.into(), &retyped.into(), &ctx(&empty, &empty, &dialect))
            .is_none());
    }

    #[test]
    fn constraints_ignore_member_order() {
        let unique = |name: &str, columns: &[&str]| Unique {
            schema: "public".into(),
            table: "t".into(),
            name: name.into(),
            name_explicit: true,
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            nulls_not_distinct: false,
        };
        let empty = Ddl::new();
        let dialect = PostgresDialect::new();
        let score = StructuralSimilarity::default().score(
            &unique("a_b", &["a", "b"]).into(),
            &unique("b_a", &["b", "a"]).into(),
            &ctx(&empty, &empty, &dialect),
        );
        assert!(score.is_some());
    }

    #[test]
    fn kinds_never_mix() {
        let empty = Ddl::new();
        let dialect = PostgresDialect::new();
        let score = StructuralSimilarity::default().score(
            &Schema::new("users").into(),
            &Table::new("public", "users").into(),
            &ctx(&empty, &empty, &dialect),
        );
        assert_eq!(score, None);
    }
}

//! Rename resolution.
//!
//! When a diff finds entities of one kind that disappeared and others that
//! appeared, it cannot tell a rename from an unrelated drop and create. A
//! [`Resolver`] answers that question, interactively or from fixed hints.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Serialize;

use crate::ddl::{Entity, EntityKey, EntityKind};
use crate::error::{Error, Result};

/// A proposed rename, by position in [`ResolverInput::deleted`] and
/// [`ResolverInput::created`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenameCandidate {
    /// Index into `deleted`.
    pub deleted: usize,
    /// Index into `created`.
    pub created: usize,
    /// Similarity score; higher is more likely.
    pub score: f64,
}

/// One rename question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolverInput {
    /// Kind of all entities in this question.
    pub kind: EntityKind,
    /// Enclosing table for table-scoped kinds.
    pub scope: Option<EntityKey>,
    /// Entities only present in the target store.
    pub created: Vec<Entity>,
    /// Entities only present in the source store.
    pub deleted: Vec<Entity>,
    /// Pairs that look alike, best first.
    pub candidates: Vec<RenameCandidate>,
}

/// A confirmed rename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renamed {
    /// Entity as it was.
    pub from: Entity,
    /// Entity as it is now.
    pub to: Entity,
}

/// A resolver's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolverOutput {
    /// Entities that are really new.
    pub created: Vec<Entity>,
    /// Entities that are really gone.
    pub deleted: Vec<Entity>,
    /// Pairs that are the same entity under a new name.
    pub renamed: Vec<Renamed>,
}

impl ResolverOutput {
    /// An answer with no renames.
    #[must_use]
    pub fn unchanged(input: ResolverInput) -> Self {
        Self {
            created: input.created,
            deleted: input.deleted,
            renamed: Vec::new(),
        }
    }

    /// Builds an answer from selected `(deleted, created)` index pairs.
    fn from_pairs(input: ResolverInput, pairs: &[(usize, usize)]) -> Self {
        let gone: HashSet<usize> = pairs.iter().map(|(d, _)| *d).collect();
        let new: HashSet<usize> = pairs.iter().map(|(_, c)| *c).collect();
        let renamed = pairs
            .iter()
            .map(|&(d, c)| Renamed {
                from: input.deleted[d].clone(),
                to: input.created[c].clone(),
            })
            .collect();
        Self {
            created: input
                .created
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !new.contains(i))
                .map(|(_, e)| e)
                .collect(),
            deleted: input
                .deleted
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !gone.contains(i))
                .map(|(_, e)| e)
                .collect(),
            renamed,
        }
    }
}

/// Why a resolver did not answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    /// The user cancelled.
    #[error("declined by user")]
    Declined,
    /// The resolver could not produce an answer.
    #[error("{0}")]
    Failed(String),
}

/// Decides which dropped/created pairs are renames.
///
/// The diff engine calls this once per kind and enclosing table, in a fixed
/// order, and awaits each call before making the next one. It is only
/// called when both `created` and `deleted` are non-empty.
#[async_trait]
pub trait Resolver: Send {
    /// Answers one rename question.
    ///
    /// # Errors
    ///
    /// Returning an error aborts the whole diff.
    async fn resolve(
        &mut self,
        input: ResolverInput,
    ) -> std::result::Result<ResolverOutput, ResolverError>;
}

/// Never detects a rename.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenames;

#[async_trait]
impl Resolver for NoRenames {
    async fn resolve(
        &mut self,
        input: ResolverInput,
    ) -> std::result::Result<ResolverOutput, ResolverError> {
        Ok(ResolverOutput::unchanged(input))
    }
}

/// Resolves renames from `old->new` key hints, e.g.
/// `public.users.email->public.users.email_address`.
#[derive(Debug, Clone, Default)]
pub struct HintResolver {
    hints: Vec<(String, String)>,
}

impl HintResolver {
    /// Parses rename hints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRenameHint`] for a hint without `->` or with
    /// an empty side.
    pub fn new<I, S>(hints: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hints = hints
            .into_iter()
            .map(|hint| {
                let hint = hint.as_ref();
                match hint.split_once("->") {
                    Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                        Ok((from.trim().to_string(), to.trim().to_string()))
                    }
                    _ => Err(Error::InvalidRenameHint(hint.to_string())),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { hints })
    }

    /// Parsed hints as `(from, to)` pairs.
    #[must_use]
    pub fn hints(&self) -> &[(String, String)] {
        &self.hints
    }
}

#[async_trait]
impl Resolver for HintResolver {
    async fn resolve(
        &mut self,
        input: ResolverInput,
    ) -> std::result::Result<ResolverOutput, ResolverError> {
        let deleted_keys: Vec<String> = input.deleted.iter().map(|e| e.key().to_string()).collect();
        let created_keys: Vec<String> = input.created.iter().map(|e| e.key().to_string()).collect();

        let mut pairs = Vec::new();
        for (from, to) in &self.hints {
            let d = deleted_keys.iter().position(|k| k == from);
            let c = created_keys.iter().position(|k| k == to);
            if let (Some(d), Some(c)) = (d, c) {
                if !pairs.iter().any(|&(pd, pc)| pd == d || pc == c) {
                    pairs.push((d, c));
                }
            }
        }
        Ok(ResolverOutput::from_pairs(input, &pairs))
    }
}

/// Accepts the proposed candidates greedily, best score first, never using
/// an entity twice.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateResolver {
    min_score: f64,
}

impl CandidateResolver {
    /// Accepts every proposed candidate.
    #[must_use]
    pub const fn new() -> Self {
        Self { min_score: 0.0 }
    }

    /// Only accepts candidates scoring at least `min_score`.
    #[must_use]
    pub const fn min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl Resolver for CandidateResolver {
    async fn resolve(
        &mut self,
        input: ResolverInput,
    ) -> std::result::Result<ResolverOutput, ResolverError> {
        let mut candidates = input.candidates.clone();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut pairs: Vec<(usize, usize)> = Vec::new();
        for candidate in candidates {
            if candidate.score < self.min_score
                || candidate.deleted >= input.deleted.len()
                || candidate.created >= input.created.len()
            {
                continue;
            }
            if pairs
                .iter()
                .any(|&(d, c)| d == candidate.deleted || c == candidate.created)
            {
                continue;
            }
            pairs.push((candidate.deleted, candidate.created));
        }
        Ok(ResolverOutput::from_pairs(input, &pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::Column;

    fn column(name: &str) -> Entity {
        Column::new("public", "users", name, "text").into()
    }

    fn input(deleted: &[&str], created: &[&str]) -> ResolverInput {
        ResolverInput {
            kind: EntityKind::Column,
            scope: Some(EntityKey::in_schema("public", "users")),
            created: created.iter().map(|n| column(n)).collect(),
            deleted: deleted.iter().map(|n| column(n)).collect(),
            candidates: Vec::new(),
        }
    }

    #[tokio::test]
    async fn hints_pick_matching_keys() {
        let mut resolver =
            HintResolver::new(["public.users.email->public.users.email_address"]).unwrap();
        let out = resolver
            .resolve(input(&["email", "legacy"], &["email_address"]))
            .await
            .unwrap();
        assert_eq!(out.renamed.len(), 1);
        assert_eq!(out.renamed[0].from.key().name, "email");
        assert_eq!(out.renamed[0].to.key().name, "email_address");
        assert_eq!(out.deleted, vec![column("legacy")]);
        assert!(out.created.is_empty());
    }

    #[test]
    fn malformed_hints_are_rejected() {
        let err = HintResolver::new(["users.a users.b"]).unwrap_err();
        assert!(matches!(err, Error::InvalidRenameHint(_)));
        assert!(HintResolver::new(["->users.b"]).is_err());
    }

    #[tokio::test]
    async fn candidates_are_taken_best_first() {
        let mut question = input(&["a", "b"], &["x", "y"]);
        question.candidates = vec![
            RenameCandidate {
                deleted: 0,
                created: 0,
                score: 0.4,
            },
            RenameCandidate {
                deleted: 0,
                created: 1,
                score: 0.9,
            },
            RenameCandidate {
                deleted: 1,
                created: 1,
                score: 0.8,
            },
        ];
        let out = CandidateResolver::new().resolve(question).await.unwrap();
        let pairs: Vec<(String, String)> = out
            .renamed
            .iter()
            .map(|r| (r.from.key().name, r.to.key().name))
            .collect();
        assert_eq!(pairs, [("a".to_string(), "y".to_string())]);
        assert_eq!(out.deleted, vec![column("b")]);
        assert_eq!(out.created, vec![column("x")]);
    }

    #[tokio::test]
    async fn no_renames_passes_through() {
        let out = NoRenames.resolve(input(&["a"], &["b"])).await.unwrap();
        assert!(out.renamed.is_empty());
        assert_eq!(out.created.len(), 1);
        assert_eq!(out.deleted.len(), 1);
    }
}

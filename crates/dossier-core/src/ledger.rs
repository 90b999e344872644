//! The relation ledger: transactional, mirrored edge bookkeeping.
//!
//! Both directions of a relation are written in one call on the
//! repository, so there is no recursive re-entry between entities and a
//! partially applied edge can never be observed. All checks run before
//! the first mutation.

use crate::entity::{Actor, EntityId};
use crate::error::RepositoryError;
use crate::relation::{
    reverse_kind, DetailValue, Details, Relation, RelationTarget, DETAIL_REASON,
    DETAIL_SOURCE_FILES, REASON_SAME_DOCUMENT, REASON_SAME_NAME,
};
use crate::repository::Repository;
use tracing::debug;

impl Repository {
    fn expect(&self, id: EntityId) -> Result<&crate::Entity, RepositoryError> {
        self.get(id).ok_or(RepositoryError::NotFound(id))
    }

    /// Adds a relation of `kind` from one entity to a target, mirroring
    /// it with the reverse kind when the target is a live entity.
    ///
    /// Provenance is injected into the details: the union of both
    /// endpoints' source documents under `source_files`, and an inferred
    /// `reason` when none was given (shared document, or same name across
    /// different documents). Returns `Ok(false)` without changes when an
    /// identical (kind, target, details) relation already exists, or when
    /// the target is the entity itself.
    pub fn add_relation(
        &mut self,
        from: EntityId,
        kind: &str,
        target: RelationTarget,
        details: Details,
        actor: Actor,
    ) -> Result<bool, RepositoryError> {
        let mut details = details;

        let (sources, shared_document) = match &target {
            RelationTarget::Resolved(to) => {
                if *to == from {
                    return Ok(false);
                }
                let a = self.expect(from)?;
                let b = self.expect(*to)?;
                let union: Vec<String> = a.source_files.union(&b.source_files).cloned().collect();
                let shared = a.source_files.intersection(&b.source_files).next().is_some();

                if !details.contains_key(DETAIL_REASON) {
                    let reason = if shared {
                        REASON_SAME_DOCUMENT
                    } else {
                        REASON_SAME_NAME
                    };
                    details.insert(
                        DETAIL_REASON.to_string(),
                        DetailValue::Text(reason.to_string()),
                    );
                }
                (union, shared)
            }
            RelationTarget::Unresolved(_) => {
                let a = self.expect(from)?;
                (a.source_files.iter().cloned().collect(), false)
            }
        };

        if !sources.is_empty() {
            let mut all = sources;
            if let Some(existing) = details.get(DETAIL_SOURCE_FILES) {
                all.extend(existing.items());
            }
            details.insert(
                DETAIL_SOURCE_FILES.to_string(),
                DetailValue::sorted_list(all),
            );
        }

        let forward = Relation::new(kind, target.clone(), details.clone());
        {
            let entity = self
                .get_mut(from)
                .ok_or(RepositoryError::NotFound(from))?;
            if entity.relations.contains(&forward) {
                return Ok(false);
            }
            entity.relations.push(forward);
            entity.touch(actor);
        }

        if let RelationTarget::Resolved(to) = target {
            let mirror = Relation::new(
                reverse_kind(kind),
                RelationTarget::Resolved(from),
                details,
            );
            let counterpart = self.get_mut(to).ok_or(RepositoryError::NotFound(to))?;
            if !counterpart.relations.contains(&mirror) {
                counterpart.relations.push(mirror);
                counterpart.touch(actor);
            }
        }

        debug!(%from, kind, shared_document, "added relation");
        Ok(true)
    }

    /// Removes every relation matching (kind, target) regardless of
    /// details, mirroring the removal on a resolved target. Returns
    /// whether anything was removed.
    pub fn remove_relation(
        &mut self,
        from: EntityId,
        kind: &str,
        target: &RelationTarget,
        actor: Actor,
    ) -> Result<bool, RepositoryError> {
        self.expect(from)?;
        if let RelationTarget::Resolved(to) = target {
            self.expect(*to)?;
        }

        let entity = self
            .get_mut(from)
            .ok_or(RepositoryError::NotFound(from))?;
        let before = entity.relations.len();
        entity.relations.retain(|r| !r.matches(kind, target));
        let removed = entity.relations.len() != before;
        if removed {
            entity.touch(actor);
        }

        if let RelationTarget::Resolved(to) = target {
            let back_kind = reverse_kind(kind);
            let back = RelationTarget::Resolved(from);
            let counterpart = self.get_mut(*to).ok_or(RepositoryError::NotFound(*to))?;
            let before = counterpart.relations.len();
            counterpart.relations.retain(|r| !r.matches(&back_kind, &back));
            if counterpart.relations.len() != before {
                counterpart.touch(actor);
            }
        }

        debug!(%from, kind, removed, "removed relation");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::KIND_LINK;

    fn pair(repo: &mut Repository) -> (EntityId, EntityId) {
        let a = repo.get_or_create("Иванов Иван Иванович", None);
        let b = repo.get_or_create("Петрова Анна Сергеевна", None);
        (a, b)
    }

    #[test]
    fn test_mirrored_with_reverse_kind() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);

        let added = repo
            .add_relation(a, "муж", RelationTarget::Resolved(b), Details::new(), Actor::User)
            .unwrap();
        assert!(added);

        let wife = repo.get(b).unwrap();
        assert!(wife
            .relations
            .iter()
            .any(|r| r.kind == "жена" && r.targets(a)));
    }

    #[test]
    fn test_duplicate_add_is_a_noop() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);

        assert!(repo
            .add_relation(a, KIND_LINK, RelationTarget::Resolved(b), Details::new(), Actor::System)
            .unwrap());
        assert!(!repo
            .add_relation(a, KIND_LINK, RelationTarget::Resolved(b), Details::new(), Actor::System)
            .unwrap());
        assert_eq!(repo.get(a).unwrap().relations.len(), 1);
        assert_eq!(repo.get(b).unwrap().relations.len(), 1);
    }

    #[test]
    fn test_reason_inferred_from_shared_document() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);
        repo.get_mut(a).unwrap().source_files.insert("dossier1.txt".into());
        repo.get_mut(b).unwrap().source_files.insert("dossier1.txt".into());

        repo.add_relation(a, KIND_LINK, RelationTarget::Resolved(b), Details::new(), Actor::System)
            .unwrap();

        let rel = &repo.get(a).unwrap().relations[0];
        assert_eq!(
            rel.details.get(DETAIL_REASON),
            Some(&DetailValue::Text(REASON_SAME_DOCUMENT.to_string()))
        );
        assert_eq!(
            rel.details.get(DETAIL_SOURCE_FILES),
            Some(&DetailValue::List(vec!["dossier1.txt".to_string()]))
        );
    }

    #[test]
    fn test_reason_inferred_across_documents() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);
        repo.get_mut(a).unwrap().source_files.insert("one.txt".into());
        repo.get_mut(b).unwrap().source_files.insert("two.txt".into());

        repo.add_relation(a, KIND_LINK, RelationTarget::Resolved(b), Details::new(), Actor::System)
            .unwrap();

        let rel = &repo.get(a).unwrap().relations[0];
        assert_eq!(
            rel.details.get(DETAIL_REASON),
            Some(&DetailValue::Text(REASON_SAME_NAME.to_string()))
        );
        // both endpoints' documents are carried in both directions
        let mirror = &repo.get(b).unwrap().relations[0];
        assert_eq!(
            mirror.details.get(DETAIL_SOURCE_FILES),
            Some(&DetailValue::List(vec!["one.txt".into(), "two.txt".into()]))
        );
    }

    #[test]
    fn test_literal_target_gets_no_reason() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);

        repo.add_relation(
            a,
            "друг",
            RelationTarget::Unresolved("Неизвестный Человек".into()),
            Details::new(),
            Actor::User,
        )
        .unwrap();

        let rel = &repo.get(a).unwrap().relations[0];
        assert!(rel.details.get(DETAIL_REASON).is_none());
    }

    #[test]
    fn test_self_target_is_a_noop() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let added = repo
            .add_relation(a, KIND_LINK, RelationTarget::Resolved(a), Details::new(), Actor::User)
            .unwrap();
        assert!(!added);
        assert!(repo.get(a).unwrap().relations.is_empty());
    }

    #[test]
    fn test_missing_target_surfaces_error() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let ghost = EntityId::new();
        let err = repo.add_relation(
            a,
            KIND_LINK,
            RelationTarget::Resolved(ghost),
            Details::new(),
            Actor::User,
        );
        assert!(err.is_err());
        assert!(repo.get(a).unwrap().relations.is_empty());
    }

    #[test]
    fn test_distinct_details_are_distinct_relations() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);

        let mut d1 = Details::new();
        d1.insert(DETAIL_REASON.into(), DetailValue::Text("первая".into()));
        let mut d2 = Details::new();
        d2.insert(DETAIL_REASON.into(), DetailValue::Text("вторая".into()));

        assert!(repo
            .add_relation(a, KIND_LINK, RelationTarget::Resolved(b), d1, Actor::User)
            .unwrap());
        assert!(repo
            .add_relation(a, KIND_LINK, RelationTarget::Resolved(b), d2, Actor::User)
            .unwrap());
        assert_eq!(repo.get(a).unwrap().relations.len(), 2);
    }

    #[test]
    fn test_remove_ignores_details_and_mirrors() {
        let mut repo = Repository::new();
        let (a, b) = pair(&mut repo);

        let mut d = Details::new();
        d.insert(DETAIL_REASON.into(), DetailValue::Text("x".into()));
        repo.add_relation(a, "муж", RelationTarget::Resolved(b), d, Actor::User)
            .unwrap();

        let removed = repo
            .remove_relation(a, "муж", &RelationTarget::Resolved(b), Actor::User)
            .unwrap();
        assert!(removed);
        assert!(repo.get(a).unwrap().relations.is_empty());
        assert!(repo.get(b).unwrap().relations.is_empty());

        let removed_again = repo
            .remove_relation(a, "муж", &RelationTarget::Resolved(b), Actor::User)
            .unwrap();
        assert!(!removed_again);
    }
}

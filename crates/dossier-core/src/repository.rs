//! The entity repository: owned storage, keyed identity, merge and delete.

use crate::entity::{Actor, Entity, EntityId};
use crate::error::RepositoryError;
use crate::name::normalize;
use crate::relation::{Relation, RelationTarget};
use std::collections::HashMap;
use tracing::{debug, info};

/// Identity key deciding whether two mentions denote the same person:
/// the normalized name lowercased, plus the birth date when known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    name: String,
    birth_date: Option<String>,
}

impl IdentityKey {
    /// Builds the key for an already-normalized canonical name.
    pub fn new(canonical_name: &str, birth_date: Option<&str>) -> Self {
        Self {
            name: canonical_name.to_lowercase(),
            birth_date: birth_date.map(str::to_string),
        }
    }
}

/// Owns all entities and their identity keys.
///
/// Entities are stored once, by [`EntityId`]; the identity-key index maps
/// (name, birth date) onto ids. Single-threaded by contract: no internal
/// locking, callers never mutate one repository concurrently.
#[derive(Debug, Default)]
pub struct Repository {
    entities: HashMap<EntityId, Entity>,
    keys: HashMap<IdentityKey, EntityId>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entity for the given identity, creating it if the
    /// identity key is new. Two calls with names differing only in
    /// whitespace or case return the same id.
    pub fn get_or_create(&mut self, raw_name: &str, birth_date: Option<&str>) -> EntityId {
        let canonical = normalize(raw_name);
        let key = IdentityKey::new(&canonical, birth_date);

        if let Some(&id) = self.keys.get(&key) {
            return id;
        }

        let entity = Entity::new(canonical, birth_date.map(str::to_string));
        let id = entity.id;
        debug!(%id, name = %entity.full_name, "created entity");
        self.entities.insert(id, entity);
        self.keys.insert(key, id);
        id
    }

    /// Registers a reconstructed entity under its recorded id and
    /// identity key. Used by the persistence codec.
    pub fn insert_restored(&mut self, entity: Entity) {
        let key = IdentityKey::new(&entity.full_name, entity.birth_date.as_deref());
        self.keys.insert(key, entity.id);
        self.entities.insert(entity.id, entity);
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Looks up an identity key directly.
    pub fn resolve_key(&self, key: &IdentityKey) -> Option<EntityId> {
        self.keys.get(key).copied()
    }

    /// All entities whose canonical name matches exactly, in stable order.
    pub fn find_by_name(&self, canonical_name: &str) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.full_name == canonical_name)
            .map(|e| e.id)
            .collect();
        found.sort();
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over all entities in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Entity ids sorted by (canonical name, id): the stable iteration
    /// order used by linker passes, snapshots and listings.
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_by(|a, b| {
            let na = &self.entities[a].full_name;
            let nb = &self.entities[b].full_name;
            na.cmp(nb).then(a.cmp(b))
        });
        ids
    }

    /// Absorbs `secondary` into `primary`: unions every multi-valued
    /// attribute set, records `secondary`'s name as an alias, unions
    /// relation sets (skipping self-loops and (kind, target) duplicates),
    /// then removes `secondary` and rewrites inbound relations held by
    /// other entities to point at `primary`.
    pub fn merge(&mut self, primary: EntityId, secondary: EntityId) -> Result<(), RepositoryError> {
        if primary == secondary {
            return Err(RepositoryError::MergeSelf);
        }
        if !self.entities.contains_key(&primary) {
            return Err(RepositoryError::NotFound(primary));
        }
        let sec = self
            .entities
            .remove(&secondary)
            .ok_or(RepositoryError::NotFound(secondary))?;
        self.keys
            .remove(&IdentityKey::new(&sec.full_name, sec.birth_date.as_deref()));

        let prim = match self.entities.get_mut(&primary) {
            Some(p) => p,
            None => return Err(RepositoryError::NotFound(primary)),
        };

        prim.phones.extend(sec.phones);
        prim.emails.extend(sec.emails);
        prim.addresses.extend(sec.addresses);
        prim.passports.extend(sec.passports);
        prim.cars.extend(sec.cars);
        prim.jobs.extend(sec.jobs);
        prim.bank_accounts.extend(sec.bank_accounts);
        prim.source_files.extend(sec.source_files);
        for (platform, urls) in sec.social_media {
            prim.social_media.entry(platform).or_default().extend(urls);
        }
        if prim.driver_license.is_none() {
            prim.driver_license = sec.driver_license;
        }
        if prim.snils.is_none() {
            prim.snils = sec.snils;
        }
        if prim.inn.is_none() {
            prim.inn = sec.inn;
        }
        prim.aliases.insert(sec.full_name.clone());
        prim.aliases.extend(sec.aliases);

        for rel in sec.relations {
            if rel.targets(primary) {
                continue;
            }
            let duplicate = prim
                .relations
                .iter()
                .any(|r| r.kind == rel.kind && r.target == rel.target);
            if !duplicate {
                prim.relations.push(rel);
            }
        }
        prim.touch(Actor::User);

        self.redirect_relations(secondary, primary);

        info!(%primary, absorbed = %sec.full_name, "merged entities");
        Ok(())
    }

    /// Rewrites every relation targeting `from` so it targets `to`,
    /// dropping self-loops and duplicates produced by the rewrite. A
    /// rewritten relation is checked against every surviving relation,
    /// including ones that already pointed at `to` before the rewrite.
    fn redirect_relations(&mut self, from: EntityId, to: EntityId) {
        for (&holder, entity) in self.entities.iter_mut() {
            if !entity.relations.iter().any(|r| r.targets(from)) {
                continue;
            }
            let old = std::mem::take(&mut entity.relations);
            let (rewritten, mut kept): (Vec<Relation>, Vec<Relation>) =
                old.into_iter().partition(|r| r.targets(from));
            for mut rel in rewritten {
                if holder == to {
                    continue;
                }
                rel.target = RelationTarget::Resolved(to);
                let duplicate = kept
                    .iter()
                    .any(|r| r.kind == rel.kind && r.target == rel.target);
                if !duplicate {
                    kept.push(rel);
                }
            }
            entity.relations = kept;
        }
    }

    /// Deletes an entity, removing its identity key and every relation on
    /// other entities that targets it. The deleted entity's own relation
    /// list is discarded with it.
    pub fn delete(&mut self, id: EntityId) -> Result<Entity, RepositoryError> {
        let entity = self
            .entities
            .remove(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        self.keys.remove(&IdentityKey::new(
            &entity.full_name,
            entity.birth_date.as_deref(),
        ));

        for other in self.entities.values_mut() {
            other.relations.retain(|r| !r.targets(id));
        }

        info!(%id, name = %entity.full_name, "deleted entity");
        Ok(entity)
    }
}

//! The entity model: one deduplicated record per real-world person.

use crate::relation::Relation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Stable opaque identifier for an entity.
///
/// Assigned once at creation and never reused; all cross-references
/// (relations, graph nodes, cluster labels) go through this id so merge
/// and delete only rewrite identifier mappings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who performed a mutation, for audit metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// Ingestion, auto-linking and other machine-driven mutations.
    System,
    /// An explicit user-initiated edit.
    User,
}

/// A person record.
///
/// All multi-valued attributes are ordered sets: they only ever grow
/// (ingestion and merge union into them) until the entity is deleted,
/// and ordered storage keeps snapshots and iteration deterministic.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    /// Canonical full name, already normalized.
    pub full_name: String,
    /// Birth date in `DD.MM.YYYY` form, when known.
    pub birth_date: Option<String>,
    pub phones: BTreeSet<String>,
    pub emails: BTreeSet<String>,
    pub addresses: BTreeSet<String>,
    pub passports: BTreeSet<String>,
    /// Vehicle plates.
    pub cars: BTreeSet<String>,
    pub driver_license: Option<String>,
    /// National insurance number.
    pub snils: Option<String>,
    /// Tax number.
    pub inn: Option<String>,
    pub jobs: BTreeSet<String>,
    /// Platform tag ("vk", "ok") to profile URLs.
    pub social_media: BTreeMap<String, BTreeSet<String>>,
    pub bank_accounts: BTreeSet<String>,
    /// Canonical names this entity has absorbed through merges.
    pub aliases: BTreeSet<String>,
    /// Documents this entity was mentioned in. Monotonically
    /// non-decreasing except on deletion.
    pub source_files: BTreeSet<String>,
    pub relations: Vec<Relation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Actor,
    pub updated_by: Actor,
}

impl Entity {
    /// Creates a new entity. `full_name` must already be normalized;
    /// the repository is the only expected caller.
    pub(crate) fn new(full_name: String, birth_date: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            full_name,
            birth_date,
            phones: BTreeSet::new(),
            emails: BTreeSet::new(),
            addresses: BTreeSet::new(),
            passports: BTreeSet::new(),
            cars: BTreeSet::new(),
            driver_license: None,
            snils: None,
            inn: None,
            jobs: BTreeSet::new(),
            social_media: BTreeMap::new(),
            bank_accounts: BTreeSet::new(),
            aliases: BTreeSet::new(),
            source_files: BTreeSet::new(),
            relations: Vec::new(),
            created_at: now,
            updated_at: now,
            created_by: Actor::System,
            updated_by: Actor::System,
        }
    }

    /// Rebuilds an entity under a previously assigned id, for
    /// persistence reconstruction. Attribute sets start empty; the codec
    /// fills the public fields from the snapshot record.
    pub fn with_id(id: EntityId, full_name: String, birth_date: Option<String>) -> Self {
        Self {
            id,
            ..Self::new(full_name, birth_date)
        }
    }

    /// Marks the entity as updated by the given actor.
    pub fn touch(&mut self, actor: Actor) {
        self.updated_at = Utc::now();
        self.updated_by = actor;
    }

    /// Richness score used by the merge workflow to pick a primary:
    /// the entity with the most contact data survives.
    pub fn richness(&self) -> usize {
        self.phones.len() + self.emails.len() + self.addresses.len()
    }

    /// Display label: name plus birth date when known.
    pub fn label(&self) -> String {
        match &self.birth_date {
            Some(date) => format!("{} ({})", self.full_name, date),
            None => format!("{} (дата неизвестна)", self.full_name),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_entity_is_system_owned() {
        let e = Entity::new("Иванов Иван".to_string(), None);
        assert_eq!(e.created_by, Actor::System);
        assert_eq!(e.updated_by, Actor::System);
        assert!(e.relations.is_empty());
    }

    #[test]
    fn test_touch_updates_actor() {
        let mut e = Entity::new("Иванов Иван".to_string(), None);
        e.touch(Actor::User);
        assert_eq!(e.updated_by, Actor::User);
        assert_eq!(e.created_by, Actor::System);
    }

    #[test]
    fn test_label_mentions_unknown_date() {
        let e = Entity::new("Иванов Иван".to_string(), None);
        assert_eq!(e.label(), "Иванов Иван (дата неизвестна)");
    }
}

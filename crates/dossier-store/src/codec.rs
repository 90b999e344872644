//! The snapshot codec: repository to versioned document and back.

use chrono::{DateTime, Utc};
use dossier_core::{Actor, Details, Entity, EntityId, RelationTarget, Repository};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Schema version written into every snapshot.
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed entity id: {0}")]
    InvalidId(String),

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(String),
}

/// One relation as persisted: the target is the counterpart's canonical
/// name, or the literal string for an unresolved target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub related_person: String,
    #[serde(default)]
    pub details: Details,
}

fn default_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_actor() -> Actor {
    Actor::System
}

/// One entity as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub passports: Vec<String>,
    #[serde(default)]
    pub cars: Vec<String>,
    #[serde(default)]
    pub driver_license: Option<String>,
    #[serde(default)]
    pub snils: Option<String>,
    #[serde(default)]
    pub inn: Option<String>,
    #[serde(default)]
    pub jobs: Vec<String>,
    #[serde(default)]
    pub social_media: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub bank_accounts: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub source_files: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationRecord>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_actor")]
    pub created_by: Actor,
    #[serde(default = "default_actor")]
    pub updated_by: Actor,
}

/// The whole persisted document.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub people: Vec<PersonRecord>,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_version")]
    pub version: String,
}

fn person_record(repo: &Repository, entity: &Entity) -> PersonRecord {
    let relations = entity
        .relations
        .iter()
        .filter_map(|rel| {
            let related_person = match &rel.target {
                RelationTarget::Resolved(id) => repo.get(*id)?.full_name.clone(),
                RelationTarget::Unresolved(name) => name.clone(),
            };
            Some(RelationRecord {
                kind: rel.kind.clone(),
                related_person,
                details: rel.details.clone(),
            })
        })
        .collect();

    PersonRecord {
        id: entity.id.to_string(),
        full_name: entity.full_name.clone(),
        birth_date: entity.birth_date.clone(),
        phones: entity.phones.iter().cloned().collect(),
        emails: entity.emails.iter().cloned().collect(),
        addresses: entity.addresses.iter().cloned().collect(),
        passports: entity.passports.iter().cloned().collect(),
        cars: entity.cars.iter().cloned().collect(),
        driver_license: entity.driver_license.clone(),
        snils: entity.snils.clone(),
        inn: entity.inn.clone(),
        jobs: entity.jobs.iter().cloned().collect(),
        social_media: entity
            .social_media
            .iter()
            .map(|(platform, urls)| (platform.clone(), urls.iter().cloned().collect()))
            .collect(),
        bank_accounts: entity.bank_accounts.iter().cloned().collect(),
        aliases: entity.aliases.iter().cloned().collect(),
        source_files: entity.source_files.iter().cloned().collect(),
        relations,
        created_at: entity.created_at,
        updated_at: entity.updated_at,
        created_by: entity.created_by,
        updated_by: entity.updated_by,
    }
}

/// Serializes the repository into a snapshot document.
pub fn snapshot(repo: &Repository) -> Snapshot {
    let people = repo
        .sorted_ids()
        .into_iter()
        .filter_map(|id| repo.get(id).map(|e| person_record(repo, e)))
        .collect();
    Snapshot {
        people,
        timestamp: Utc::now(),
        version: SCHEMA_VERSION.to_string(),
    }
}

/// Reconstructs a repository from a snapshot.
///
/// First pass rebuilds every entity with relation targets held as the
/// recorded literal names; second pass resolves those names against the
/// rebuilt repository. A name that resolves to no entity stays a
/// literal. Fails atomically: any malformed record aborts before a
/// repository is returned.
pub fn restore(document: Snapshot) -> Result<Repository, PersistenceError> {
    if document.version != SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion(document.version));
    }

    let mut repo = Repository::new();

    for record in document.people {
        let id = EntityId::parse(&record.id)
            .ok_or_else(|| PersistenceError::InvalidId(record.id.clone()))?;
        let mut entity = Entity::with_id(id, record.full_name, record.birth_date);
        entity.phones = record.phones.into_iter().collect();
        entity.emails = record.emails.into_iter().collect();
        entity.addresses = record.addresses.into_iter().collect();
        entity.passports = record.passports.into_iter().collect();
        entity.cars = record.cars.into_iter().collect();
        entity.driver_license = record.driver_license;
        entity.snils = record.snils;
        entity.inn = record.inn;
        entity.jobs = record.jobs.into_iter().collect();
        entity.social_media = record
            .social_media
            .into_iter()
            .map(|(platform, urls)| (platform, urls.into_iter().collect()))
            .collect();
        entity.bank_accounts = record.bank_accounts.into_iter().collect();
        entity.aliases = record.aliases.into_iter().collect();
        entity.source_files = record.source_files.into_iter().collect();
        entity.relations = record
            .relations
            .into_iter()
            .map(|rel| {
                dossier_core::Relation::new(
                    rel.kind,
                    RelationTarget::Unresolved(rel.related_person),
                    rel.details,
                )
            })
            .collect();
        entity.created_at = record.created_at;
        entity.updated_at = record.updated_at;
        entity.created_by = record.created_by;
        entity.updated_by = record.updated_by;

        repo.insert_restored(entity);
    }

    // second pass: resolve recorded names to the rebuilt entities
    let mut by_name: HashMap<String, EntityId> = HashMap::new();
    for id in repo.sorted_ids() {
        if let Some(entity) = repo.get(id) {
            by_name.entry(entity.full_name.clone()).or_insert(id);
        }
    }
    let mut dangling = 0usize;
    for id in repo.sorted_ids() {
        if let Some(entity) = repo.get_mut(id) {
            for rel in &mut entity.relations {
                if let RelationTarget::Unresolved(name) = &rel.target {
                    match by_name.get(name) {
                        Some(&target) => rel.target = RelationTarget::Resolved(target),
                        None => dangling += 1,
                    }
                }
            }
        }
    }
    if dangling > 0 {
        warn!(dangling, "relations left unresolved after restore");
    }

    info!(people = repo.len(), "restored repository from snapshot");
    Ok(repo)
}

/// Writes a pretty-printed snapshot document to disk.
pub fn save_snapshot(repo: &Repository, path: &Path) -> Result<(), PersistenceError> {
    let document = snapshot(repo);
    fs::write(path, serde_json::to_string_pretty(&document)?)?;
    info!(path = %path.display(), people = document.people.len(), "saved snapshot");
    Ok(())
}

/// Loads a snapshot document and reconstructs the repository.
///
/// Any error leaves the caller's previously loaded state untouched: the
/// repository is only produced after the whole document restores.
pub fn load_snapshot(path: &Path) -> Result<Repository, PersistenceError> {
    let text = fs::read_to_string(path)?;
    let document: Snapshot = serde_json::from_str(&text)?;
    restore(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{DetailValue, KIND_LINK};

    fn sample_repo() -> (Repository, EntityId, EntityId) {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван Иванович", Some("05.08.1990"));
        let b = repo.get_or_create("Петров Петр", None);
        {
            let e = repo.get_mut(a).unwrap();
            e.phones.insert("79990001122".into());
            e.emails.insert("ivanov@mail.ru".into());
            e.source_files.insert("doc1.txt".into());
            e.social_media
                .entry("vk".into())
                .or_default()
                .insert("https://vk.com/ivanov".into());
        }
        repo.add_relation(a, KIND_LINK, RelationTarget::Resolved(b), Details::new(), Actor::User)
            .unwrap();
        (repo, a, b)
    }

    #[test]
    fn test_round_trip_resolves_relations() {
        let (repo, a, b) = sample_repo();
        let restored = restore(snapshot(&repo)).unwrap();

        assert_eq!(restored.len(), 2);
        let ivanov = restored.get(a).unwrap();
        assert_eq!(ivanov.full_name, "Иванов Иван Иванович");
        assert!(ivanov.phones.contains("79990001122"));
        assert!(ivanov.social_media["vk"].contains("https://vk.com/ivanov"));
        assert_eq!(ivanov.birth_date.as_deref(), Some("05.08.1990"));

        // the relation came back as an entity reference, not a literal
        assert!(ivanov.relations.iter().any(|r| r.targets(b)));
        assert!(restored.get(b).unwrap().relations.iter().any(|r| r.targets(a)));
    }

    #[test]
    fn test_identity_keys_survive_restore() {
        let (repo, a, _) = sample_repo();
        let mut restored = restore(snapshot(&repo)).unwrap();
        let again = restored.get_or_create("иванов иван иванович", Some("05.08.1990"));
        assert_eq!(again, a);
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn test_unresolvable_target_stays_literal() {
        let (mut repo, a, b) = sample_repo();
        repo.add_relation(
            a,
            "друг",
            RelationTarget::Unresolved("Без Вести Пропавший".into()),
            Details::new(),
            Actor::User,
        )
        .unwrap();
        let _ = b;

        let restored = restore(snapshot(&repo)).unwrap();
        let ivanov = restored.get(a).unwrap();
        assert!(ivanov.relations.iter().any(|r| {
            r.target == RelationTarget::Unresolved("Без Вести Пропавший".to_string())
        }));
    }

    #[test]
    fn test_details_survive_round_trip() {
        let (mut repo, a, b) = sample_repo();
        let mut details = Details::new();
        details.insert(
            "common_phones".into(),
            DetailValue::List(vec!["79990001122".into()]),
        );
        repo.add_relation(a, "знакомый", RelationTarget::Resolved(b), details, Actor::User)
            .unwrap();

        let restored = restore(snapshot(&repo)).unwrap();
        let rel = restored
            .get(a)
            .unwrap()
            .relations
            .iter()
            .find(|r| r.kind == "знакомый")
            .unwrap();
        assert_eq!(
            rel.details.get("common_phones"),
            Some(&DetailValue::List(vec!["79990001122".to_string()]))
        );
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        assert!(serde_json::from_str::<Snapshot>("{\"people\": 42}").is_err());

        let bad_id = r#"{
            "people": [{"id": "not-a-uuid", "full_name": "Иванов Иван"}],
            "timestamp": "2024-01-01T00:00:00Z",
            "version": "1.0"
        }"#;
        let document: Snapshot = serde_json::from_str(bad_id).unwrap();
        assert!(matches!(
            restore(document),
            Err(PersistenceError::InvalidId(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let (repo, _, _) = sample_repo();
        let mut document = snapshot(&repo);
        document.version = "9.9".to_string();
        assert!(matches!(
            restore(document),
            Err(PersistenceError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let (repo, a, b) = sample_repo();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        save_snapshot(&repo, &path).unwrap();
        let restored = load_snapshot(&path).unwrap();

        assert_eq!(restored.len(), 2);
        assert!(restored.get(a).unwrap().relations.iter().any(|r| r.targets(b)));
    }
}

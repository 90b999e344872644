//! Aggregate statistics over the repository.

use dossier_core::{EntityId, Repository};
use std::collections::BTreeMap;

/// Snapshot of repository-wide figures for the statistics view.
#[derive(Debug)]
pub struct Statistics {
    pub people: usize,
    pub phones: usize,
    pub emails: usize,
    pub relations: usize,
    pub avg_phones: f64,
    pub avg_emails: f64,
    pub avg_relations: f64,
    /// Top entities by relation count, most connected first.
    pub central: Vec<(EntityId, usize)>,
    /// Phone numbers that appear on more than one entity.
    pub shared_phones: Vec<(String, Vec<EntityId>)>,
}

const TOP_CENTRAL: usize = 5;

/// Collects totals, averages, the most connected people and phone
/// numbers shared between entities.
pub fn collect_statistics(repo: &Repository) -> Statistics {
    let people = repo.len();
    let mut phones = 0;
    let mut emails = 0;
    let mut relations = 0;
    let mut by_relations: Vec<(EntityId, usize)> = Vec::new();
    let mut phone_owners: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();

    for id in repo.sorted_ids() {
        let entity = match repo.get(id) {
            Some(e) => e,
            None => continue,
        };
        phones += entity.phones.len();
        emails += entity.emails.len();
        relations += entity.relations.len();
        by_relations.push((id, entity.relations.len()));
        for phone in &entity.phones {
            phone_owners.entry(phone.clone()).or_default().push(id);
        }
    }

    by_relations.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    by_relations.truncate(TOP_CENTRAL);

    let shared_phones: Vec<(String, Vec<EntityId>)> = phone_owners
        .into_iter()
        .filter(|(_, owners)| owners.len() > 1)
        .collect();

    let denom = people.max(1) as f64;
    Statistics {
        people,
        phones,
        emails,
        relations,
        avg_phones: phones as f64 / denom,
        avg_emails: emails as f64 / denom,
        avg_relations: relations as f64 / denom,
        central: by_relations,
        shared_phones,
    }
}

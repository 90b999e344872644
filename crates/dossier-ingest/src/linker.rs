//! Heuristic auto-linking passes.
//!
//! All passes are idempotent: the ledger's own deduplication guards
//! against duplicate edges, so re-running a pass adds nothing.

use dossier_core::{
    Actor, DetailValue, Details, EntityId, RelationTarget, Repository, RepositoryError,
    DETAIL_COMMON_ADDRESSES, DETAIL_COMMON_JOBS, DETAIL_COMMON_PHONES, DETAIL_REASON,
    KIND_ACQUAINTANCE, KIND_COLLEAGUE, KIND_FAMILY_LINK, KIND_LINK, KIND_POSSIBLE_LINK,
    REASON_AUTO_DETECTED, REASON_SAME_DOCUMENT, REASON_SAME_SURNAME_GIVEN,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Links every pair of entities mentioned in one document with a generic
/// relation. `entities` is the document's working set from ingestion.
/// Returns the number of edges added.
pub fn link_within_document(
    repo: &mut Repository,
    entities: &[EntityId],
) -> Result<usize, RepositoryError> {
    let mut added = 0;
    for (i, &a) in entities.iter().enumerate() {
        for &b in &entities[i + 1..] {
            let mut details = Details::new();
            details.insert(
                DETAIL_REASON.to_string(),
                DetailValue::Text(REASON_SAME_DOCUMENT.to_string()),
            );
            if repo.add_relation(a, KIND_LINK, RelationTarget::Resolved(b), details, Actor::System)? {
                added += 1;
            }
        }
    }
    info!(added, "intra-document linking pass");
    Ok(added)
}

/// First two tokens of the canonical name; entities with a single token
/// take no part in cross-document grouping.
fn surname_given(full_name: &str) -> Option<(String, String)> {
    let mut tokens = full_name.split_whitespace();
    let surname = tokens.next()?;
    let given = tokens.next()?;
    Some((surname.to_string(), given.to_string()))
}

/// Cross-document identity pass: groups entities by (surname, given
/// name), picks the member with the most source documents as anchor and
/// links it to every member whose document set is disjoint from the
/// anchor's. Run once after a full ingestion batch.
pub fn link_across_documents(repo: &mut Repository) -> Result<usize, RepositoryError> {
    let mut groups: BTreeMap<(String, String), Vec<EntityId>> = BTreeMap::new();
    for id in repo.sorted_ids() {
        let entity = match repo.get(id) {
            Some(e) => e,
            None => continue,
        };
        if let Some(key) = surname_given(&entity.full_name) {
            groups.entry(key).or_default().push(id);
        }
    }

    let mut added = 0;
    for (_, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        // anchor first: most distinct source documents, ties by id
        members.sort_by(|a, b| {
            let fa = repo.get(*a).map(|e| e.source_files.len()).unwrap_or(0);
            let fb = repo.get(*b).map(|e| e.source_files.len()).unwrap_or(0);
            fb.cmp(&fa).then(a.cmp(b))
        });
        let anchor = members[0];
        let anchor_files: BTreeSet<String> = match repo.get(anchor) {
            Some(e) => e.source_files.clone(),
            None => continue,
        };

        for &other in &members[1..] {
            let disjoint = match repo.get(other) {
                Some(e) => e.source_files.is_disjoint(&anchor_files),
                None => continue,
            };
            if !disjoint {
                continue;
            }
            let mut details = Details::new();
            details.insert(
                DETAIL_REASON.to_string(),
                DetailValue::Text(REASON_SAME_SURNAME_GIVEN.to_string()),
            );
            if repo.add_relation(
                anchor,
                KIND_POSSIBLE_LINK,
                RelationTarget::Resolved(other),
                details,
                Actor::System,
            )? {
                added += 1;
            }
        }
    }
    info!(added, "cross-document linking pass");
    Ok(added)
}

/// User-triggered pairwise heuristic: classifies unrelated entity pairs
/// by their shared addresses, jobs and phones. Returns the number of
/// relations inferred.
pub fn detect_relations(repo: &mut Repository) -> Result<usize, RepositoryError> {
    let ids = repo.sorted_ids();
    let mut added = 0;

    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let (first, second) = match (repo.get(a), repo.get(b)) {
                (Some(x), Some(y)) => (x, y),
                _ => continue,
            };
            // skip pairs with any existing direct relation; mirroring
            // makes checking one side sufficient
            if first.relations.iter().any(|r| r.targets(b)) {
                continue;
            }

            let common_addresses: Vec<String> = first
                .addresses
                .intersection(&second.addresses)
                .cloned()
                .collect();
            let common_jobs: Vec<String> =
                first.jobs.intersection(&second.jobs).cloned().collect();
            let common_phones: Vec<String> =
                first.phones.intersection(&second.phones).cloned().collect();

            let kind = if !common_addresses.is_empty() && !common_jobs.is_empty() {
                KIND_POSSIBLE_LINK
            } else if !common_addresses.is_empty() {
                KIND_FAMILY_LINK
            } else if !common_jobs.is_empty() {
                KIND_COLLEAGUE
            } else if !common_phones.is_empty() {
                KIND_ACQUAINTANCE
            } else {
                continue;
            };

            let mut details = Details::new();
            details.insert(
                DETAIL_REASON.to_string(),
                DetailValue::Text(REASON_AUTO_DETECTED.to_string()),
            );
            if !common_addresses.is_empty() {
                details.insert(
                    DETAIL_COMMON_ADDRESSES.to_string(),
                    DetailValue::sorted_list(common_addresses),
                );
            }
            if !common_jobs.is_empty() {
                details.insert(
                    DETAIL_COMMON_JOBS.to_string(),
                    DetailValue::sorted_list(common_jobs),
                );
            }
            if !common_phones.is_empty() {
                details.insert(
                    DETAIL_COMMON_PHONES.to_string(),
                    DetailValue::sorted_list(common_phones),
                );
            }

            if repo.add_relation(a, kind, RelationTarget::Resolved(b), details, Actor::System)? {
                added += 1;
            }
        }
    }

    info!(added, "pairwise relation detection");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ingest_document;

    #[test]
    fn test_intra_document_links_all_pairs() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        let c = repo.get_or_create("Сидоров Олег", None);
        for id in [a, b, c] {
            repo.get_mut(id).unwrap().source_files.insert("doc.txt".into());
        }

        let added = link_within_document(&mut repo, &[a, b, c]).unwrap();
        assert_eq!(added, 3);

        // idempotent: second run adds nothing
        let again = link_within_document(&mut repo, &[a, b, c]).unwrap();
        assert_eq!(again, 0);

        let rel = &repo.get(a).unwrap().relations[0];
        assert_eq!(rel.kind, KIND_LINK);
        assert_eq!(
            rel.details.get(DETAIL_REASON),
            Some(&DetailValue::Text(REASON_SAME_DOCUMENT.to_string()))
        );
    }

    #[test]
    fn test_cross_document_possible_link() {
        let mut repo = Repository::new();
        let doc1 = "=== Анкета ===\nФИО: Петров Иван\n";
        let doc2 = "=== Досье ===\nФИО: Петров Иван Иванович\n";
        let doc3 = "=== Справка ===\nФИО: Петров Иван Иванович\n";
        ingest_document(&mut repo, doc1, "one.txt");
        ingest_document(&mut repo, doc2, "two.txt");
        ingest_document(&mut repo, doc3, "three.txt");
        assert_eq!(repo.len(), 2);

        let added = link_across_documents(&mut repo).unwrap();
        assert_eq!(added, 1);

        // anchor is the entity seen in more documents
        let anchor = repo.find_by_name("Петров Иван Иванович")[0];
        let other = repo.find_by_name("Петров Иван")[0];
        let rel = repo
            .get(anchor)
            .unwrap()
            .relations
            .iter()
            .find(|r| r.targets(other))
            .unwrap();
        assert_eq!(rel.kind, KIND_POSSIBLE_LINK);
        assert_eq!(
            rel.details.get(DETAIL_REASON),
            Some(&DetailValue::Text(REASON_SAME_SURNAME_GIVEN.to_string()))
        );
        // the two stay separate entities
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_cross_document_skips_shared_documents() {
        let mut repo = Repository::new();
        let doc = "=== Анкета ===\nФИО: Петров Иван\n\n=== Досье ===\nФИО: Петров Иван Иванович\n";
        ingest_document(&mut repo, doc, "same.txt");
        let added = link_across_documents(&mut repo).unwrap();
        assert_eq!(added, 0);
    }

    #[test]
    fn test_shared_address_classifies_family_link() {
        let mut repo = Repository::new();
        let doc = "\
=== Клиент ===
ФИО: Петров Иван
Адрес: г. Москва, ул. Ленина, д. 1

=== Сосед ===
ФИО: Сидоров Олег
Адрес: г. Москва, ул. Ленина, д. 1
";
        ingest_document(&mut repo, doc, "doc.txt");
        let added = detect_relations(&mut repo).unwrap();
        assert_eq!(added, 1);

        let petrov = repo.find_by_name("Петров Иван")[0];
        let rel = repo
            .get(petrov)
            .unwrap()
            .relations
            .iter()
            .find(|r| r.kind == KIND_FAMILY_LINK)
            .unwrap();
        assert_eq!(
            rel.details.get(DETAIL_COMMON_ADDRESSES),
            Some(&DetailValue::List(vec![
                "г. Москва, ул. Ленина, д. 1".to_string()
            ]))
        );
    }

    #[test]
    fn test_classification_precedence() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        for id in [a, b] {
            let e = repo.get_mut(id).unwrap();
            e.addresses.insert("ул. Ленина, д. 1".into());
            e.jobs.insert("ООО Ромашка".into());
            e.phones.insert("79990001122".into());
        }

        detect_relations(&mut repo).unwrap();
        let rel = &repo.get(a).unwrap().relations[0];
        assert_eq!(rel.kind, KIND_POSSIBLE_LINK);
    }

    #[test]
    fn test_shared_jobs_only_classifies_colleague() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        for id in [a, b] {
            repo.get_mut(id).unwrap().jobs.insert("ООО Ромашка".into());
        }
        detect_relations(&mut repo).unwrap();
        assert_eq!(repo.get(a).unwrap().relations[0].kind, KIND_COLLEAGUE);
    }

    #[test]
    fn test_shared_phones_only_classifies_acquaintance() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        for id in [a, b] {
            repo.get_mut(id).unwrap().phones.insert("79990001122".into());
        }
        detect_relations(&mut repo).unwrap();
        assert_eq!(repo.get(a).unwrap().relations[0].kind, KIND_ACQUAINTANCE);
    }

    #[test]
    fn test_existing_relation_suppresses_detection() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        for id in [a, b] {
            repo.get_mut(id).unwrap().addresses.insert("ул. Мира, д. 2".into());
        }
        repo.add_relation(a, "друг", RelationTarget::Resolved(b), Details::new(), Actor::User)
            .unwrap();

        let added = detect_relations(&mut repo).unwrap();
        assert_eq!(added, 0);
    }

    #[test]
    fn test_nothing_shared_adds_nothing() {
        let mut repo = Repository::new();
        repo.get_or_create("Иванов Иван", None);
        repo.get_or_create("Петров Петр", None);
        assert_eq!(detect_relations(&mut repo).unwrap(), 0);
    }
}

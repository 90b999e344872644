//! Textual summaries for the external narrative-analysis service.
//!
//! The service itself lives outside the core and is strictly read-only:
//! this module only formats an entity (or an explicit group) with its
//! relations and provenance annotations into the text the service
//! consumes.

use crate::entity::{Entity, EntityId};
use crate::relation::{RelationTarget, DETAIL_REASON, DETAIL_SOURCE_FILES};
use crate::repository::Repository;
use std::fmt::Write;

fn join_or_unknown(values: impl Iterator<Item = String>) -> String {
    let joined: Vec<String> = values.collect();
    if joined.is_empty() {
        "нет данных".to_string()
    } else {
        joined.join(", ")
    }
}

fn relation_line(repo: &Repository, entity: &Entity, only_within: Option<&[EntityId]>) -> String {
    let mut out = String::new();
    for rel in &entity.relations {
        let target_name = match &rel.target {
            RelationTarget::Resolved(id) => {
                if let Some(scope) = only_within {
                    if !scope.contains(id) {
                        continue;
                    }
                }
                match repo.get(*id) {
                    Some(e) => e.full_name.clone(),
                    None => continue,
                }
            }
            RelationTarget::Unresolved(name) => {
                if only_within.is_some() {
                    continue;
                }
                name.clone()
            }
        };

        let mut line = format!("- {}: {}", rel.kind, target_name);
        let mut annotations = Vec::new();
        if let Some(files) = rel.details.get(DETAIL_SOURCE_FILES) {
            annotations.push(format!("источники: {}", files));
        }
        if let Some(reason) = rel.details.get(DETAIL_REASON) {
            annotations.push(format!("причина: {}", reason));
        }
        if !annotations.is_empty() {
            let _ = write!(line, " ({})", annotations.join("; "));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn entity_block(entity: &Entity) -> String {
    format!(
        "Имя: {}\nДата рождения: {}\nТелефоны: {}\nEmail: {}\nАдреса: {}\n",
        entity.full_name,
        entity.birth_date.as_deref().unwrap_or("неизвестна"),
        join_or_unknown(entity.phones.iter().cloned()),
        join_or_unknown(entity.emails.iter().cloned()),
        join_or_unknown(entity.addresses.iter().cloned()),
    )
}

/// Formats one entity with its relations and their provenance.
pub fn person_summary(repo: &Repository, id: EntityId) -> Option<String> {
    let entity = repo.get(id)?;
    let mut text = format!(
        "Данные о человеке и его связях:\n\n{}Связи:\n",
        entity_block(entity)
    );
    text.push_str(&relation_line(repo, entity, None));
    Some(text)
}

/// Formats an explicit group of entities, listing only the relations
/// between members of the group.
pub fn group_summary(repo: &Repository, ids: &[EntityId]) -> String {
    let mut text = String::from("Данные о группе людей и их взаимосвязях:\n");
    for &id in ids {
        let entity = match repo.get(id) {
            Some(e) => e,
            None => continue,
        };
        text.push('\n');
        text.push_str(&entity_block(entity));
        let relations = relation_line(repo, entity, Some(ids));
        if !relations.is_empty() {
            text.push_str("Связи с другими людьми в группе:\n");
            text.push_str(&relations);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Actor;
    use crate::relation::Details;

    #[test]
    fn test_summary_lists_relations_with_provenance() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        repo.get_mut(a).unwrap().source_files.insert("a.txt".into());
        repo.add_relation(a, "друг", RelationTarget::Resolved(b), Details::new(), Actor::User)
            .unwrap();

        let text = person_summary(&repo, a).unwrap();
        assert!(text.contains("Имя: Иванов Иван"));
        assert!(text.contains("- друг: Петров Петр"));
        assert!(text.contains("источники: a.txt"));
    }

    #[test]
    fn test_group_summary_scopes_to_members() {
        let mut repo = Repository::new();
        let a = repo.get_or_create("Иванов Иван", None);
        let b = repo.get_or_create("Петров Петр", None);
        let c = repo.get_or_create("Сидоров Олег", None);
        repo.add_relation(a, "друг", RelationTarget::Resolved(b), Details::new(), Actor::User)
            .unwrap();
        repo.add_relation(a, "коллега", RelationTarget::Resolved(c), Details::new(), Actor::User)
            .unwrap();

        let text = group_summary(&repo, &[a, b]);
        assert!(text.contains("- друг: Петров Петр"));
        assert!(!text.contains("Сидоров"));
    }
}

//! Relation types, targets and provenance details.
//!
//! A relation is a (kind, target, details) triple. The detail map is
//! ordered (`BTreeMap`) so it doubles as its own canonical encoding for
//! deduplication. Keys and kinds are plain strings: the set of relation
//! kinds is open-ended, only the reverse table below is fixed.

use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Generic relation between people mentioned in one document.
pub const KIND_LINK: &str = "связь";
/// Possible identity/relation inferred by a heuristic pass.
pub const KIND_POSSIBLE_LINK: &str = "возможная связь";
/// Shared address without shared workplace.
pub const KIND_FAMILY_LINK: &str = "семейная связь";
/// Shared workplace without shared address.
pub const KIND_COLLEAGUE: &str = "коллега";
/// Shared phone number only.
pub const KIND_ACQUAINTANCE: &str = "знакомый";

/// Detail key carrying the inferred or explicit reason for a relation.
pub const DETAIL_REASON: &str = "reason";
/// Detail key carrying the source documents of a relation.
pub const DETAIL_SOURCE_FILES: &str = "source_files";
pub const DETAIL_COMMON_ADDRESSES: &str = "common_addresses";
pub const DETAIL_COMMON_PHONES: &str = "common_phones";
pub const DETAIL_COMMON_JOBS: &str = "common_jobs";

pub const REASON_SAME_DOCUMENT: &str = "из одного файла";
pub const REASON_SAME_NAME: &str = "одинаковые имена в разных файлах";
pub const REASON_SAME_SURNAME_GIVEN: &str = "одинаковые фамилия и имя в разных файлах";
pub const REASON_AUTO_DETECTED: &str = "автоматически определенная связь";
pub const REASON_MANUAL: &str = "вручную добавленная связь";

/// Returns the reverse kind for a relation so the mirrored edge can be
/// written on the counterpart.
///
/// The table is an involution except for asymmetric family kinds that
/// collapse (`отец`/`мать` both reverse to `сын/дочь`). Unknown kinds
/// mirror as themselves.
pub fn reverse_kind(kind: &str) -> String {
    match kind.to_lowercase().as_str() {
        "муж" => "жена".to_string(),
        "жена" => "муж".to_string(),
        "отец" | "мать" => "сын/дочь".to_string(),
        "сын" | "дочь" => "родитель".to_string(),
        "брат" | "сестра" => "брат/сестра".to_string(),
        "друг" => "друг".to_string(),
        "коллега" => "коллега".to_string(),
        "партнер" => "партнер".to_string(),
        "связь" => "связь".to_string(),
        "возможная связь" => "возможная связь".to_string(),
        _ => kind.to_string(),
    }
}

/// One value in a detail map: free text or a list of shared values.
///
/// Untagged so the persisted form matches the document schema
/// (`"reason": "..."` next to `"common_phones": [...]`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    List(Vec<String>),
}

impl DetailValue {
    /// Builds a list value with stable ordering.
    pub fn sorted_list(mut items: Vec<String>) -> Self {
        items.sort();
        items.dedup();
        DetailValue::List(items)
    }

    /// The contained items, treating text as a singleton list.
    pub fn items(&self) -> Vec<String> {
        match self {
            DetailValue::Text(s) => vec![s.clone()],
            DetailValue::List(v) => v.clone(),
        }
    }
}

impl fmt::Display for DetailValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailValue::Text(s) => write!(f, "{}", s),
            DetailValue::List(v) => write!(f, "{}", v.join(", ")),
        }
    }
}

/// Ordered detail map attached to a relation.
pub type Details = BTreeMap<String, DetailValue>;

/// The far end of a relation.
///
/// A target is resolved while the counterpart is a live entity; it stays
/// (or becomes, after a partial reconstruction) a bare name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationTarget {
    /// Reference to a live entity in the repository.
    Resolved(EntityId),
    /// Literal name that could not be resolved to an entity.
    Unresolved(String),
}

/// A typed, provenance-carrying edge from one entity to a target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Relation {
    /// Relation kind, e.g. "муж" or "связь".
    pub kind: String,
    pub target: RelationTarget,
    /// Provenance and heuristic evidence; carries a "reason" entry once
    /// the relation has been added through the ledger.
    pub details: Details,
}

impl Relation {
    pub fn new(kind: impl Into<String>, target: RelationTarget, details: Details) -> Self {
        Self {
            kind: kind.into(),
            target,
            details,
        }
    }

    /// Whether this relation matches a (kind, target) pair, ignoring details.
    pub fn matches(&self, kind: &str, target: &RelationTarget) -> bool {
        self.kind == kind && self.target == *target
    }

    /// Whether the relation points at the given entity.
    pub fn targets(&self, id: EntityId) -> bool {
        self.target == RelationTarget::Resolved(id)
    }
}

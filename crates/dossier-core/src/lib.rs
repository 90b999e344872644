//! Dossier Core - Entity resolution and relation bookkeeping
//!
//! This crate owns the deduplicated entity store and the typed,
//! provenance-annotated relation ledger between entities.
//!
//! # Architecture
//!
//! Entities live in a [`Repository`] keyed two ways:
//! - A stable opaque [`EntityId`] used for all cross-references
//! - An identity key (normalized name lowercased, birth date) used to
//!   decide whether two mentions denote the same person
//!
//! Relations reference their counterpart by [`EntityId`], never by a
//! direct entity reference, so merge and delete only rewrite identifier
//! mappings. A relation target that could not be resolved stays behind
//! as a bare name string.
//!
//! # Example
//!
//! ```no_run
//! use dossier_core::{Actor, Details, RelationTarget, Repository};
//!
//! let mut repo = Repository::new();
//! let a = repo.get_or_create("иванов иван иванович", None);
//! let b = repo.get_or_create("Петрова Анна", Some("01.02.1985"));
//!
//! repo.add_relation(a, "муж", RelationTarget::Resolved(b), Details::new(), Actor::User)
//!     .unwrap();
//! ```

mod entity;
mod error;
mod ledger;
mod name;
mod relation;
mod repository;
pub mod summary;

pub use entity::{Actor, Entity, EntityId};
pub use error::RepositoryError;
pub use name::normalize;
pub use relation::{
    reverse_kind, DetailValue, Details, Relation, RelationTarget, DETAIL_COMMON_ADDRESSES,
    DETAIL_COMMON_JOBS, DETAIL_COMMON_PHONES, DETAIL_REASON, DETAIL_SOURCE_FILES,
    KIND_ACQUAINTANCE, KIND_COLLEAGUE, KIND_FAMILY_LINK, KIND_LINK, KIND_POSSIBLE_LINK,
    REASON_AUTO_DETECTED, REASON_MANUAL, REASON_SAME_DOCUMENT, REASON_SAME_NAME,
    REASON_SAME_SURNAME_GIVEN,
};
pub use repository::{IdentityKey, Repository};

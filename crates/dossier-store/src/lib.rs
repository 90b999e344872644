//! Dossier Store - Snapshot persistence
//!
//! Serializes the repository into a versioned JSON document and
//! reconstructs it later. Relation targets are recorded by canonical
//! name, so reconstruction is two-pass: all entities first, then target
//! resolution; unresolved targets stay behind as literals.

mod codec;

pub use codec::{
    load_snapshot, restore, save_snapshot, snapshot, PersistenceError, PersonRecord,
    RelationRecord, Snapshot, SCHEMA_VERSION,
};

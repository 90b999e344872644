//! Dossier Ingest - Text dossier parsing and heuristic auto-linking
//!
//! Turns loosely structured dossier text into repository entities and
//! infers relations between them, within one document and across the
//! whole repository.
//!
//! Parsing is best-effort throughout: a record without a resolvable name
//! is skipped, a field that fails its shape check is simply not
//! recorded, and neither aborts the document.

mod linker;
mod parser;

pub use linker::{detect_relations, link_across_documents, link_within_document};
pub use parser::{ingest_document, IngestReport};

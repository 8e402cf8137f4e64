//! Arena Storage - Document Store and Typed Repository
//!
//! The arena persists one JSON document per id, partitioned into the
//! `agents`, `battles` and `system` collections. [`DocumentStore`] is the
//! storage seam; [`InMemoryDocumentStore`] is the in-process engine used by
//! the server and the tests. [`ArenaStore`] layers typed accessors on top,
//! including the terminal-state guard that makes battle settlement
//! single-writer.

pub mod document;
pub mod memory;
pub mod repository;

pub use document::{merge_patch, Collection, DocumentStore, Mutation};
pub use memory::InMemoryDocumentStore;
pub use repository::ArenaStore;

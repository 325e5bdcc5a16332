//! codelet-core - Core library for codelet
//!
//! This crate contains the snippet models, the local snippet store, the
//! WebDAV remote transport, and the sync engine shared by all codelet
//! front ends.

pub mod config;
pub mod error;
pub mod models;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod sync;
mod util;

pub use error::{Error, Result};
pub use models::{Snippet, SnippetDraft, SnippetId, SnippetPatch};
pub use store::SnippetStore;
pub use sync::{SyncEngine, SyncReport, SyncState};

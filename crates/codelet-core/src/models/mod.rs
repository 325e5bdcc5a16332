//! Data models

mod label;
mod snippet;

pub use label::LabelIndex;
pub use snippet::{Snippet, SnippetDraft, SnippetId, SnippetPatch};

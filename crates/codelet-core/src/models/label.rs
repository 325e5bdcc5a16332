//! Label index model
//!
//! Labels have no independent storage: they exist only as long as at least
//! one snippet references them, so the index is always derived from the
//! current snippet collection.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{Snippet, SnippetId};

/// Derived mapping from label name to the snippets carrying it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelIndex {
    entries: BTreeMap<String, BTreeSet<SnippetId>>,
}

impl LabelIndex {
    /// Build the index from a collection of snippets
    pub fn build<'a>(snippets: impl IntoIterator<Item = &'a Snippet>) -> Self {
        let mut entries: BTreeMap<String, BTreeSet<SnippetId>> = BTreeMap::new();
        for snippet in snippets {
            for label in &snippet.labels {
                entries.entry(label.clone()).or_default().insert(snippet.id);
            }
        }
        Self { entries }
    }

    /// All label names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Snippet ids carrying the given label
    #[must_use]
    pub fn snippets_for(&self, label: &str) -> Option<&BTreeSet<SnippetId>> {
        self.entries.get(label)
    }

    /// Number of distinct labels
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnippetDraft;

    fn snippet_with_labels(labels: &[&str]) -> Snippet {
        let mut draft = SnippetDraft::new("t", "c", "text");
        draft.labels = labels.iter().map(ToString::to_string).collect();
        Snippet::from_draft(draft)
    }

    #[test]
    fn test_build_from_snippets() {
        let a = snippet_with_labels(&["rust", "cli"]);
        let b = snippet_with_labels(&["rust"]);

        let index = LabelIndex::build([&a, &b]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.snippets_for("rust").unwrap().len(), 2);
        assert_eq!(index.snippets_for("cli").unwrap().len(), 1);
        assert!(index.snippets_for("missing").is_none());
    }

    #[test]
    fn test_unreferenced_labels_do_not_exist() {
        let snippets: Vec<&Snippet> = Vec::new();
        let index = LabelIndex::build(snippets);
        assert!(index.is_empty());
    }
}

//! Snippet model

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::timestamp_ms_now;

/// A unique identifier for a snippet, using UUID v7 (time-sortable)
///
/// Assigned once at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnippetId(Uuid);

impl SnippetId {
    /// Create a new unique snippet ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SnippetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SnippetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnippetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A code snippet
///
/// `datetime` is the last-modified instant in Unix milliseconds and doubles
/// as the conflict-resolution version marker during sync. Every local
/// mutation must keep it monotonically non-decreasing for a given id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Unique identifier
    pub id: SnippetId,
    /// Display title
    pub title: String,
    /// Snippet body
    pub content: String,
    /// Syntax highlighting tag (e.g. "rust", "text")
    pub lang: String,
    /// Last-modified timestamp (Unix ms); also the sync version marker
    pub datetime: i64,
    /// Label names attached to this snippet
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    /// Favorite flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub starred: bool,
}

impl Snippet {
    /// Create a new snippet from a draft, assigning a fresh id and timestamp
    #[must_use]
    pub fn from_draft(draft: SnippetDraft) -> Self {
        Self {
            id: SnippetId::new(),
            title: draft.title,
            content: draft.content,
            lang: draft.lang,
            datetime: timestamp_ms_now(),
            labels: draft.labels,
            starred: draft.starred,
        }
    }

    /// Apply a partial edit and bump the version timestamp.
    ///
    /// The timestamp is bumped to `max(now, datetime + 1)` so edits within
    /// the same millisecond still produce a strictly newer version.
    pub fn apply_patch(&mut self, patch: SnippetPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(lang) = patch.lang {
            self.lang = lang;
        }
        if let Some(labels) = patch.labels {
            self.labels = labels;
        }
        if let Some(starred) = patch.starred {
            self.starred = starred;
        }
        self.bump_datetime();
    }

    /// Advance `datetime` while preserving per-id monotonicity.
    pub fn bump_datetime(&mut self) {
        self.datetime = timestamp_ms_now().max(self.datetime + 1);
    }
}

/// Input for creating a new snippet; the store assigns id and timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetDraft {
    pub title: String,
    pub content: String,
    pub lang: String,
    pub labels: BTreeSet<String>,
    pub starred: bool,
}

impl SnippetDraft {
    /// Create a draft with the given title, content, and language
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        lang: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            lang: lang.into(),
            ..Self::default()
        }
    }
}

/// Partial update applied to an existing snippet; `None` fields are kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub lang: Option<String>,
    pub labels: Option<BTreeSet<String>>,
    pub starred: Option<bool>,
}

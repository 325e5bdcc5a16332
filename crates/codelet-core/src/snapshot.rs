//! Snapshot document codec and export helpers.
//!
//! A snapshot is a complete serialization of the snippet collection: an
//! ordered JSON array of `{id, title, content, lang, datetime, labels?,
//! starred?}` records, exchanged wholesale with the remote store. The
//! on-demand export file uses the exact same document, so both sides of the
//! sync and the export flow share this codec.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Snippet, SnippetId};

/// Export output format shared by all clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Encode a collection as the snapshot document.
///
/// Records are ordered by id so that encoding the same collection always
/// produces the same document.
pub fn encode_snapshot<'a>(snippets: impl IntoIterator<Item = &'a Snippet>) -> Result<String> {
    let mut records: Vec<&Snippet> = snippets.into_iter().collect();
    records.sort_by_key(|snippet| snippet.id);
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Decode a remote snapshot body.
///
/// Any shape violation, including duplicate ids, is reported as
/// [`Error::MalformedSnapshot`] so the sync engine aborts without mutating
/// local state.
pub fn decode_snapshot(body: &str) -> Result<Vec<Snippet>> {
    let records: Vec<Snippet> =
        serde_json::from_str(body).map_err(|error| Error::MalformedSnapshot(error.to_string()))?;

    let mut seen: HashSet<SnippetId> = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.id) {
            return Err(Error::MalformedSnapshot(format!(
                "duplicate snippet id {}",
                record.id
            )));
        }
    }

    Ok(records)
}

/// Render snippets in Markdown with frontmatter blocks and fenced bodies.
#[must_use]
pub fn render_markdown_export(snippets: &[Snippet]) -> String {
    let mut output = String::new();

    for (index, snippet) in snippets.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", snippet.id);
        let _ = writeln!(output, "title: {}", snippet.title);
        let _ = writeln!(output, "lang: {}", snippet.lang);
        let _ = writeln!(output, "datetime: {}", snippet.datetime);
        if !snippet.labels.is_empty() {
            let _ = writeln!(output, "labels:");
            for label in &snippet.labels {
                let _ = writeln!(output, "  - {label}");
            }
        }
        if snippet.starred {
            let _ = writeln!(output, "starred: true");
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        let _ = writeln!(output, "```{}", snippet.lang);
        output.push_str(&snippet.content);
        if !snippet.content.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("```\n");
    }

    output
}

/// Render snippets based on selected export format.
///
/// The JSON variant is the snapshot document itself, so an exported file can
/// be pushed to (or was pulled from) the remote verbatim.
pub fn render_export(snippets: &[Snippet], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => encode_snapshot(snippets),
        ExportFormat::Markdown => Ok(render_markdown_export(snippets)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("codelet-export-{timestamp_ms}.{}", format.extension())
}

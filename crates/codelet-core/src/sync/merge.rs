//! Deterministic reconciliation of the frozen local collection with the
//! remote snapshot.
//!
//! The merge is a pure function: it never touches the live store and cannot
//! fail. Labels need no separate merging because they live inside their
//! owning snippet; the label index is rebuilt from whichever records
//! survive.

use std::collections::{HashMap, HashSet};

use crate::models::{Snippet, SnippetId};
use crate::store::StoreSnapshot;

/// Result of one merge pass.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The new authoritative collection
    pub merged: HashMap<SnippetId, Snippet>,
    /// Remote-only records adopted into the collection
    pub adopted: usize,
    /// Remote copies dropped because a local post-checkpoint deletion takes
    /// precedence
    pub suppressed: usize,
    /// Tombstones for ids the remote no longer lists (already converged)
    pub resolved: Vec<SnippetId>,
}

/// Merge the frozen local copy with the parsed remote snapshot.
///
/// For every id in the union of local, remote, and the tombstone set:
/// - local-only and not tombstoned: kept, will be written back;
/// - remote-only: adopted, unless tombstoned since the last checkpoint —
///   then suppressed;
/// - present on both sides: strictly greater `datetime` wins; on an exact
///   tie the local copy wins (this device is authoritative on simultaneous
///   timestamps);
/// - tombstoned and absent remotely: the tombstone is resolved.
#[must_use]
pub fn merge(local: &StoreSnapshot, remote: &[Snippet]) -> MergeOutcome {
    let remote_by_id: HashMap<SnippetId, &Snippet> =
        remote.iter().map(|snippet| (snippet.id, snippet)).collect();

    let mut ids: HashSet<SnippetId> = HashSet::new();
    ids.extend(local.snippets.keys().copied());
    ids.extend(remote_by_id.keys().copied());
    ids.extend(local.tombstones.keys().copied());

    let mut merged = HashMap::with_capacity(ids.len());
    let mut adopted = 0;
    let mut suppressed = 0;
    let mut resolved = Vec::new();

    for id in ids {
        let ours = local.snippets.get(&id);
        let theirs = remote_by_id.get(&id).copied();
        let tombstoned = local.tombstones.contains_key(&id);

        match (ours, theirs) {
            (Some(local_copy), None) => {
                merged.insert(id, local_copy.clone());
            }
            (None, Some(remote_copy)) => {
                if tombstoned {
                    suppressed += 1;
                } else {
                    merged.insert(id, remote_copy.clone());
                    adopted += 1;
                }
            }
            (Some(local_copy), Some(remote_copy)) => {
                if remote_copy.datetime > local_copy.datetime {
                    merged.insert(id, remote_copy.clone());
                } else {
                    merged.insert(id, local_copy.clone());
                }
            }
            (None, None) => {
                if tombstoned {
                    resolved.push(id);
                }
            }
        }
    }

    MergeOutcome {
        merged,
        adopted,
        suppressed,
        resolved,
    }
}

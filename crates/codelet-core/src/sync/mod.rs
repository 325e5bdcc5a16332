//! Sync engine: pull → merge → apply → push against the whole-file remote.
//!
//! One cycle authenticates, reads the remote snapshot, merges it with a
//! frozen copy of the local store, applies the result back, and pushes the
//! merged document. The engine is deliberately single-flight: a second
//! trigger while a cycle runs is rejected, and every outcome returns the
//! engine to `Idle`.

mod merge;

pub use merge::{merge, MergeOutcome};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::error::{Error, Result};
use crate::remote::RemoteTransport;
use crate::snapshot::{decode_snapshot, encode_snapshot};
use crate::store::SnippetStore;
use crate::util::timestamp_ms_now;

/// Engine phase, observable by a presentation layer (e.g. to disable the
/// sync action while a cycle is in flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Authenticating,
    Pulling,
    Merging,
    Pushing,
}

impl SyncState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Authenticating => 1,
            Self::Pulling => 2,
            Self::Merging => 3,
            Self::Pushing => 4,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Authenticating,
            2 => Self::Pulling,
            3 => Self::Merging,
            4 => Self::Pushing,
            _ => Self::Idle,
        }
    }
}

/// Summary of a completed merge cycle, returned to the caller for user
/// notification. The engine communicates only through return values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records listed by the remote snapshot (0 on first sync)
    pub pulled: usize,
    /// Records in the pushed snapshot
    pub pushed: usize,
    /// Remote-only records adopted locally
    pub adopted: usize,
    /// Stale remote copies suppressed by local deletions
    pub suppressed: usize,
    /// Tombstones confirmed converged this cycle
    pub resolved_tombstones: usize,
    /// Whether the cycle was redone once after a remote conflict
    pub retried: bool,
}

/// Orchestrates sync cycles over a [`RemoteTransport`].
pub struct SyncEngine<T> {
    transport: T,
    state: AtomicU8,
    in_flight: AtomicBool,
}

impl<T: RemoteTransport> SyncEngine<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: AtomicU8::new(SyncState::Idle.as_u8()),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Current engine phase.
    #[must_use]
    pub fn state(&self) -> SyncState {
        SyncState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether a cycle is currently in flight.
    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one merge cycle against `store`.
    ///
    /// Only one sync may be in flight per engine; concurrent triggers fail
    /// with [`Error::SyncInFlight`]. A remote conflict during push redoes
    /// the full cycle exactly once; a second conflict is surfaced so the
    /// caller can ask the user to retry. Regardless of outcome the engine
    /// ends `Idle` and the store is never left partially mutated.
    pub async fn sync(&self, store: &SnippetStore) -> Result<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::SyncInFlight);
        }

        let result = self.sync_with_retry(store).await;
        self.set_state(SyncState::Idle);
        self.in_flight.store(false, Ordering::SeqCst);

        if let Err(error) = &result {
            tracing::warn!(%error, "sync cycle failed");
        }
        result
    }

    async fn sync_with_retry(&self, store: &SnippetStore) -> Result<SyncReport> {
        if !self.transport.validate() {
            return Err(Error::Auth(
                "remote credentials are missing or malformed".to_string(),
            ));
        }

        match self.run_cycle(store).await {
            Err(Error::RemoteConflict) => {
                tracing::warn!("remote changed during push; redoing the cycle once");
                let mut report = self.run_cycle(store).await?;
                report.retried = true;
                Ok(report)
            }
            other => other,
        }
    }

    async fn run_cycle(&self, store: &SnippetStore) -> Result<SyncReport> {
        self.set_state(SyncState::Authenticating);
        self.transport.authenticate().await?;

        self.set_state(SyncState::Pulling);
        let body = self.transport.read_snapshot().await?;
        let remote = match body.as_deref() {
            Some(body) => decode_snapshot(body)?,
            None => Vec::new(),
        };
        // Frozen at pulling time; user edits after this point belong to the
        // next cycle and are preserved by `apply_merged`.
        let frozen = store.snapshot_copy();

        self.set_state(SyncState::Merging);
        let outcome = merge(&frozen, &remote);
        tracing::debug!(
            pulled = remote.len(),
            adopted = outcome.adopted,
            suppressed = outcome.suppressed,
            resolved = outcome.resolved.len(),
            "merge complete"
        );

        let document = encode_snapshot(outcome.merged.values())?;
        let pushed = outcome.merged.len();
        store.apply_merged(outcome.merged, &frozen)?;

        self.set_state(SyncState::Pushing);
        self.transport.write_snapshot(&document).await?;

        // The checkpoint and tombstones advance only now that the remote
        // holds the merged snapshot.
        store.complete_sync(&frozen, timestamp_ms_now());
        tracing::info!(pulled = remote.len(), pushed, "sync cycle complete");

        Ok(SyncReport {
            pulled: remote.len(),
            pushed,
            adopted: outcome.adopted,
            suppressed: outcome.suppressed,
            resolved_tombstones: outcome.resolved.len(),
            retried: false,
        })
    }

    fn set_state(&self, state: SyncState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }
}

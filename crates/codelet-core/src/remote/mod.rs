//! Remote transport abstraction.
//!
//! The remote backup location speaks a legacy whole-file protocol:
//! authenticate, read one named resource, replace it wholesale. No range or
//! patch semantics, no server-side merging, no change feed.

mod webdav;

pub use webdav::WebDavTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Capability over the remote whole-file storage protocol.
///
/// All calls are suspension points with bounded timeouts; failures classify
/// as retryable (`Unreachable`) or terminal (`Auth`, malformed payload).
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Verify credentials against the remote.
    async fn authenticate(&self) -> Result<()>;

    /// Fetch the remote snapshot body.
    ///
    /// `None` means the resource does not exist yet (first-ever sync).
    async fn read_snapshot(&self) -> Result<Option<String>>;

    /// Replace the remote snapshot wholesale.
    ///
    /// Fails with [`crate::Error::RemoteConflict`] when the remote signals
    /// the resource changed since this cycle's read.
    async fn write_snapshot(&self, body: &str) -> Result<()>;

    /// Cheap pre-flight check, no network: true when the configuration
    /// looks usable. Used to short-circuit a sync attempt when credentials
    /// are known bad.
    fn validate(&self) -> bool;
}

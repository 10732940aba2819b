//! One complete extraction run
//!
//! A fetch drains a [`RowSource`] through a [`RowListener`]. With a digest
//! configured, the run's final digest is compared with the one recorded for
//! the previous run; when the data changed and the run carries a version
//! marker, the sink is asked to remove documents older than that version.

use crate::cast::listener::RowListener;
use crate::cast::sink::{Cleanup, Sink, SinkCounters};
use crate::cast::source::RowSource;
use crate::error::Result;
use tracing::{info, warn};

/// Summary of a completed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub rows: u64,
    pub counters: SinkCounters,
    /// Base64 content digest, when enabled
    pub digest: Option<String>,
    pub cleanup: Option<Cleanup>,
}

impl FetchOutcome {
    /// Whether the content differs from a previous run's digest.
    ///
    /// `None` when no digest was computed.
    pub fn changed(&self, previous: Option<&str>) -> Option<bool> {
        let digest = self.digest.as_deref()?;
        Some(previous != Some(digest))
    }
}

/// Run one fetch: every row from `source`, then the final flush
pub fn fetch<R, S>(source: &mut R, listener: &mut RowListener<S>, previous_digest: Option<&str>) -> Result<FetchOutcome>
where
    R: RowSource + ?Sized,
    S: Sink,
{
    listener.begin();
    listener.keys(source.columns().iter().cloned());

    let mut rows = 0u64;
    while let Some(row) = source.next_row() {
        listener.values(row?)?;
        rows += 1;
    }
    listener.end()?;

    let mut outcome = FetchOutcome {
        rows,
        counters: listener.counters(),
        digest: listener.digest(),
        cleanup: None,
    };

    if outcome.changed(previous_digest) == Some(true) {
        if let Some(version) = listener.config().version {
            warn!(version, "content digest changed, removing documents from earlier runs");
            let cleanup = Cleanup {
                older_than_version: version,
            };
            listener.sink_mut().cleanup(&cleanup)?;
            outcome.cleanup = Some(cleanup);
        }
    }
    listener.sink_mut().flush()?;

    info!(
        rows = outcome.rows,
        documents = outcome.counters.emitted(),
        discarded = outcome.counters.discarded,
        "fetch complete"
    );
    Ok(outcome)
}

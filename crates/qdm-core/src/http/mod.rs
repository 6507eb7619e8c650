//! HTTP client: capability probe, streaming ranged GET, small whole-body
//! fetches, and per-host connection accounting.
//!
//! All transfers go through libcurl on blocking threads; async callers use
//! `spawn_blocking` (probe, fetch) or consume the channel-backed
//! `ChunkStream` (download).

mod budget;
mod parse;
mod probe;
mod stream;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::QdmConfig;
use crate::error::QdmResult;

pub use budget::{HostBudget, HostLease};
pub use probe::Probe;
pub use stream::{ChunkStream, StreamEnd, StreamEvent};

/// User agent sent on every request.
pub const USER_AGENT: &str = "qdm/1.0";

/// Preferred receive buffer: chunks delivered to the worker are at most this
/// size, which bounds how long a pause can go unobserved.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// HTTP client shared by workers, the HLS downloader, and the grabber.
pub struct HttpClient {
    user_agent: String,
    probe_timeout: Duration,
    budget: HostBudget,
}

impl HttpClient {
    pub fn new(cfg: &QdmConfig) -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
            budget: HostBudget::new(cfg.max_total_connections, cfg.max_connections_per_host),
        }
    }

    /// Metadata probe. HEAD first; servers that reject HEAD (405/501) are
    /// retried with a streaming GET aborted after headers.
    /// Blocking; call from `spawn_blocking` in async code.
    pub fn probe(&self, url: &str) -> QdmResult<Probe> {
        probe::probe(url, &self.user_agent, self.probe_timeout)
    }

    /// Whether the server supports byte ranges for `url`. Used to decide
    /// whether a `Range` header may be sent. Blocking.
    pub fn check_range(&self, url: &str) -> bool {
        self.probe(url).map(|p| p.accept_ranges).unwrap_or(false)
    }

    /// Whole-body GET for small resources (playlists, segments). Blocking.
    pub fn fetch_bytes(&self, url: &str) -> QdmResult<Vec<u8>> {
        stream::fetch_bytes(url, &self.user_agent)
    }

    /// Start a streaming GET from `start_byte` on a blocking thread and
    /// return the event stream. The pause token is consulted before every
    /// chunk; tripping it ends the stream cleanly with `StreamEnd::Paused`.
    pub fn download(&self, url: &str, start_byte: u64, pause: Arc<AtomicBool>) -> ChunkStream {
        stream::download(url.to_string(), self.user_agent.clone(), start_byte, pause)
    }

    /// Reserve a connection slot for the host of `url`, waiting while the
    /// per-host or global cap is exhausted.
    pub async fn lease(&self, url: &str) -> HostLease {
        self.budget.acquire(budget::host_of(url)).await
    }
}

use std::future::Future;

use crate::classify::PageSnapshot;
use crate::error::HarvestError;
use crate::proxy::ProxyEndpoint;
use crate::record::{RecordResult, StatusCounts, TargetRecord};

/// Navigates to a URL through the given proxy and returns the rendered
/// page. The browser layer behind this is opaque to the engine.
pub trait PageDriver: Send + Sync {
    fn navigate(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
    ) -> impl Future<Output = Result<PageSnapshot, HarvestError>> + Send;
}

/// Fetches the candidate proxy list from the external listing service.
/// Called once per run at startup.
pub trait ProxySource: Send + Sync {
    fn fetch_candidates(
        &self,
    ) -> impl Future<Output = Result<Vec<ProxyEndpoint>, HarvestError>> + Send;
}

/// Health-checks a proxy before it serves traffic. The engine probes
/// every endpoint on activation and after each rotation; candidates
/// that fail the probe are discarded without ever carrying a fetch.
pub trait ProxyProbe: Send + Sync {
    fn check(&self, proxy: &ProxyEndpoint) -> impl Future<Output = bool> + Send;
}

/// A no-op ProxyProbe that accepts every endpoint, for setups where
/// probing is unwanted and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl ProxyProbe for NoProbe {
    async fn check(&self, _proxy: &ProxyEndpoint) -> bool {
        true
    }
}

/// Reads the input list and persists per-record results in place.
/// Access is strictly sequential within a run; `write_result` must be
/// durable before the next `next_pending` call returns.
pub trait RecordStore: Send + Sync {
    /// Next record without a terminal status, in original input order,
    /// with its row index. `None` ends the run.
    fn next_pending(
        &self,
    ) -> impl Future<Output = Result<Option<(usize, TargetRecord)>, HarvestError>> + Send;

    /// Update the row at `index` in place and flush durably.
    fn write_result(
        &self,
        index: usize,
        result: &RecordResult,
    ) -> impl Future<Output = Result<(), HarvestError>> + Send;

    /// Done/failed/pending tallies over the whole list.
    fn counts(&self) -> impl Future<Output = Result<StatusCounts, HarvestError>> + Send;
}

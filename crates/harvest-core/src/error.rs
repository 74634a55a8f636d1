use thiserror::Error;

/// Application-wide error types for harvest.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Proxy listing service unreachable or returned no candidates.
    /// Fatal: without proxies no progress is possible.
    #[error("proxy source unavailable: {0}")]
    ProxySourceUnavailable(String),

    /// Every candidate proxy has been rotated away from.
    /// Fatal: the run aborts with remaining records left pending.
    #[error("proxy pool exhausted after discarding {exhausted} endpoints")]
    ProxyPoolExhausted { exhausted: usize },

    /// Navigation timed out.
    #[error("navigation timed out after {0} seconds")]
    Timeout(u64),

    /// Transport-level failure (connection refused, DNS, reset).
    #[error("network error: {0}")]
    NetworkError(String),

    /// Browser launch or CDP failure.
    #[error("browser error: {0}")]
    BrowserError(String),

    /// Record store read/write failed.
    #[error("record store error: {0}")]
    StoreError(String),

    /// CSV parse/serialize failure.
    #[error("csv error: {0}")]
    CsvError(#[from] csv::Error),

    /// Filesystem failure while persisting records.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// A record that cannot be processed (e.g. missing prooflink).
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl HarvestError {
    /// Returns true if this error ends the run rather than feeding the
    /// rotation policy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HarvestError::ProxySourceUnavailable(_) | HarvestError::ProxyPoolExhausted { .. }
        )
    }

    /// Returns true for transport-level failures that classify as a
    /// blocked signal and count toward proxy rotation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            HarvestError::Timeout(_)
                | HarvestError::NetworkError(_)
                | HarvestError::BrowserError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(HarvestError::ProxySourceUnavailable("down".into()).is_fatal());
        assert!(HarvestError::ProxyPoolExhausted { exhausted: 3 }.is_fatal());
        assert!(!HarvestError::Timeout(30).is_fatal());
        assert!(!HarvestError::NetworkError("reset".into()).is_fatal());
    }

    #[test]
    fn test_transport_errors() {
        assert!(HarvestError::Timeout(30).is_transport());
        assert!(HarvestError::NetworkError("refused".into()).is_transport());
        assert!(HarvestError::BrowserError("cdp closed".into()).is_transport());
        assert!(!HarvestError::StoreError("bad row".into()).is_transport());
        assert!(!HarvestError::ProxyPoolExhausted { exhausted: 1 }.is_transport());
    }
}

//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks
//! use `Arc<Mutex<_>>` for interior mutability, allowing test assertions
//! on recorded calls.

use std::sync::{Arc, Mutex};

use crate::classify::PageSnapshot;
use crate::error::HarvestError;
use crate::proxy::ProxyEndpoint;
use crate::record::{RecordResult, StatusCounts, TargetRecord};
use crate::traits::{PageDriver, ProxyProbe, ProxySource, RecordStore};

// ---------------------------------------------------------------------------
// Snapshot builders
// ---------------------------------------------------------------------------

/// A snapshot that classifies as `Success` with the given payload.
pub fn profile_snapshot(name: &str, location: &str) -> PageSnapshot {
    PageSnapshot {
        requested_url: "https://www.example.com/in/test".to_string(),
        final_url: "https://www.example.com/in/test".to_string(),
        title: format!("{name} | Profile"),
        html: format!(
            r#"<html><body><h1 class="text-heading-xlarge">{name}</h1><span class="text-body-small">{location}</span></body></html>"#
        ),
    }
}

/// A snapshot that classifies as `AuthWall`.
pub fn auth_wall_snapshot() -> PageSnapshot {
    PageSnapshot {
        requested_url: "https://www.example.com/in/test".to_string(),
        final_url: "https://www.example.com/authwall?origin=profile".to_string(),
        title: "Sign in".to_string(),
        html: "<html><body>Join to view this page</body></html>".to_string(),
    }
}

/// A snapshot that classifies as `Captcha`.
pub fn captcha_snapshot() -> PageSnapshot {
    PageSnapshot {
        requested_url: "https://www.example.com/in/test".to_string(),
        final_url: "https://www.example.com/in/test".to_string(),
        title: "Security check".to_string(),
        html: "<html><body>Complete the captcha below</body></html>".to_string(),
    }
}

// ---------------------------------------------------------------------------
// MockPageDriver
// ---------------------------------------------------------------------------

/// Recorded navigation: (url, proxy authority).
pub type NavigationRecord = (String, String);

/// Page driver that replays scripted outcomes. Each call pops the first
/// queued outcome; when the queue is empty the fallback is repeated
/// indefinitely (handy for all-blocked scenarios).
pub struct MockPageDriver {
    outcomes: Arc<Mutex<Vec<Result<PageSnapshot, HarvestError>>>>,
    fallback: Arc<Mutex<Option<PageSnapshot>>>,
    pub navigations: Arc<Mutex<Vec<NavigationRecord>>>,
}

impl MockPageDriver {
    pub fn with_outcomes(outcomes: Vec<Result<PageSnapshot, HarvestError>>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            fallback: Arc::new(Mutex::new(None)),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every navigation lands on the same snapshot, forever.
    pub fn always(snapshot: PageSnapshot) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(Vec::new())),
            fallback: Arc::new(Mutex::new(Some(snapshot))),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queued outcomes first, then the fallback forever.
    pub fn with_outcomes_then(
        outcomes: Vec<Result<PageSnapshot, HarvestError>>,
        fallback: PageSnapshot,
    ) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes)),
            fallback: Arc::new(Mutex::new(Some(fallback))),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PageDriver for MockPageDriver {
    async fn navigate(
        &self,
        url: &str,
        proxy: &ProxyEndpoint,
    ) -> Result<PageSnapshot, HarvestError> {
        self.navigations
            .lock()
            .unwrap()
            .push((url.to_string(), proxy.authority()));

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            match self.fallback.lock().unwrap().clone() {
                Some(snapshot) => Ok(snapshot),
                None => Ok(profile_snapshot("Default Person", "Nowhere")),
            }
        } else {
            outcomes.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockRecordStore
// ---------------------------------------------------------------------------

/// In-memory record store backed by a Vec.
pub struct MockRecordStore {
    rows: Arc<Mutex<Vec<TargetRecord>>>,
}

impl MockRecordStore {
    pub fn with_rows(rows: Vec<TargetRecord>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// One pending row per prooflink.
    pub fn with_prooflinks(links: &[&str]) -> Self {
        let rows = links
            .iter()
            .map(|link| TargetRecord {
                first_name: String::new(),
                last_name: String::new(),
                geo: String::new(),
                prooflink: (*link).to_string(),
                ip_change: String::new(),
                result: String::new(),
            })
            .collect();
        Self::with_rows(rows)
    }

    pub fn rows(&self) -> Vec<TargetRecord> {
        self.rows.lock().unwrap().clone()
    }
}

impl RecordStore for MockRecordStore {
    async fn next_pending(&self) -> Result<Option<(usize, TargetRecord)>, HarvestError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .enumerate()
            .find(|(_, r)| !r.status().is_terminal())
            .map(|(i, r)| (i, r.clone())))
    }

    async fn write_result(&self, index: usize, result: &RecordResult) -> Result<(), HarvestError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(index)
            .ok_or_else(|| HarvestError::StoreError(format!("no row at index {index}")))?;
        row.apply(result);
        Ok(())
    }

    async fn counts(&self) -> Result<StatusCounts, HarvestError> {
        Ok(StatusCounts::tally(self.rows.lock().unwrap().iter()))
    }
}

// ---------------------------------------------------------------------------
// MockProxySource
// ---------------------------------------------------------------------------

/// Proxy source returning a fixed candidate list or a fixed error.
pub struct MockProxySource {
    result: Mutex<Option<Result<Vec<ProxyEndpoint>, HarvestError>>>,
}

impl MockProxySource {
    pub fn with_candidates(candidates: Vec<ProxyEndpoint>) -> Self {
        Self {
            result: Mutex::new(Some(Ok(candidates))),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            result: Mutex::new(Some(Err(HarvestError::ProxySourceUnavailable(
                reason.to_string(),
            )))),
        }
    }

    /// `n` distinct endpoints `10.0.0.0..n`.
    pub fn with_n_candidates(n: usize) -> Self {
        Self::with_candidates(
            (0..n)
                .map(|i| ProxyEndpoint::new(format!("10.0.0.{i}"), 8080))
                .collect(),
        )
    }
}

impl ProxySource for MockProxySource {
    async fn fetch_candidates(&self) -> Result<Vec<ProxyEndpoint>, HarvestError> {
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok(vec![]))
    }
}

// ---------------------------------------------------------------------------
// MockProxyProbe
// ---------------------------------------------------------------------------

/// Proxy probe replaying scripted verdicts. Each check pops the first
/// queued verdict; once the script runs out every endpoint passes.
pub struct MockProxyProbe {
    verdicts: Arc<Mutex<Vec<bool>>>,
    fallback: bool,
    /// Authorities checked, in order.
    pub checked: Arc<Mutex<Vec<String>>>,
}

impl MockProxyProbe {
    /// Queued verdicts first, then every endpoint passes.
    pub fn with_verdicts(verdicts: Vec<bool>) -> Self {
        Self {
            verdicts: Arc::new(Mutex::new(verdicts)),
            fallback: true,
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every endpoint fails the probe, forever.
    pub fn always_dead() -> Self {
        Self {
            verdicts: Arc::new(Mutex::new(Vec::new())),
            fallback: false,
            checked: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ProxyProbe for MockProxyProbe {
    async fn check(&self, proxy: &ProxyEndpoint) -> bool {
        self.checked.lock().unwrap().push(proxy.authority());
        let mut verdicts = self.verdicts.lock().unwrap();
        if verdicts.is_empty() {
            self.fallback
        } else {
            verdicts.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Run reporter that records event labels for assertions.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.as_str() == label)
            .count()
    }
}

impl crate::engine::RunReporter for MockReporter {
    fn report(&self, event: crate::engine::RunEvent<'_>) {
        let label = match &event {
            crate::engine::RunEvent::RunStarted { .. } => "RunStarted",
            crate::engine::RunEvent::RecordStarted { .. } => "RecordStarted",
            crate::engine::RunEvent::AttemptClassified { .. } => "AttemptClassified",
            crate::engine::RunEvent::RecordCompleted { .. } => "RecordCompleted",
            crate::engine::RunEvent::RecordSkipped { .. } => "RecordSkipped",
            crate::engine::RunEvent::ProxyRotated { .. } => "ProxyRotated",
            crate::engine::RunEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

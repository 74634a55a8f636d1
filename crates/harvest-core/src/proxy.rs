//! Proxy pool with strike-based rotation.
//!
//! The pool owns the candidate endpoints fetched at startup and hands out
//! exactly one active endpoint at a time. Blocked signals accumulate on a
//! consecutive-failure counter; at the threshold the active endpoint is
//! discarded and the next untested candidate becomes active.
//!
//! ```text
//! ACTIVE --[threshold blocked signals]--> EXHAUSTED, next candidate ACTIVE
//!    ^                                                     |
//!    +--[success resets the counter]                       v
//!                                        no candidates left: ProxyPoolExhausted
//! ```

use std::fmt;

use crate::error::HarvestError;

/// Health of a single proxy endpoint within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyHealth {
    /// Never been the active endpoint.
    Untested,
    /// Currently serving requests.
    Active,
    /// Rotated away from; never reused within this run.
    Exhausted,
}

impl fmt::Display for ProxyHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyHealth::Untested => write!(f, "untested"),
            ProxyHealth::Active => write!(f, "active"),
            ProxyHealth::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// A single candidate proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub address: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub health: ProxyHealth,
}

impl ProxyEndpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            credentials: None,
            health: ProxyHealth::Untested,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    /// `host:port` form, as passed to `--proxy-server`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Configuration for the rotation policy.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Consecutive blocked signals the active endpoint absorbs before
    /// being discarded.
    pub failure_threshold: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
        }
    }
}

/// Ordered set of candidate proxies with exactly one active endpoint.
#[derive(Debug)]
pub struct ProxyPool {
    candidates: Vec<ProxyEndpoint>,
    active: usize,
    consecutive_failures: u32,
    config: PoolConfig,
}

impl ProxyPool {
    /// Build a pool from fetched candidates. The first candidate becomes
    /// active immediately.
    pub fn new(mut candidates: Vec<ProxyEndpoint>, config: PoolConfig) -> Result<Self, HarvestError> {
        if candidates.is_empty() {
            return Err(HarvestError::ProxySourceUnavailable(
                "listing service returned no candidates".to_string(),
            ));
        }
        candidates[0].health = ProxyHealth::Active;
        Ok(Self {
            candidates,
            active: 0,
            consecutive_failures: 0,
            config,
        })
    }

    /// The endpoint currently serving requests.
    pub fn active(&self) -> &ProxyEndpoint {
        &self.candidates[self.active]
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Number of endpoints discarded so far.
    pub fn exhausted_count(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.health == ProxyHealth::Exhausted)
            .count()
    }

    /// Candidates still usable (active or untested).
    pub fn remaining(&self) -> usize {
        self.candidates.len() - self.exhausted_count()
    }

    /// A fetch succeeded through the active endpoint: the streak resets,
    /// whatever endpoint produced earlier failures.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A blocked signal (auth wall, captcha, or network error) landed on
    /// the active endpoint. Returns true when the streak has reached the
    /// threshold and the caller must rotate.
    pub fn record_blocked(&mut self) -> bool {
        self.consecutive_failures += 1;
        tracing::debug!(
            proxy = %self.active(),
            failures = self.consecutive_failures,
            threshold = self.config.failure_threshold,
            "Blocked signal on active proxy"
        );
        self.consecutive_failures >= self.config.failure_threshold
    }

    /// Discard the active endpoint and advance to the next untested
    /// candidate. Never wraps: once every candidate is exhausted the run
    /// cannot make progress and `ProxyPoolExhausted` is returned.
    ///
    /// Resets the failure counter in every case, including the error
    /// path, so the invariant `counter < threshold` holds after any
    /// call.
    pub fn rotate(&mut self) -> Result<(), HarvestError> {
        self.candidates[self.active].health = ProxyHealth::Exhausted;
        self.consecutive_failures = 0;

        let next = self
            .candidates
            .iter()
            .position(|c| c.health == ProxyHealth::Untested);

        match next {
            Some(idx) => {
                self.candidates[idx].health = ProxyHealth::Active;
                tracing::warn!(
                    discarded = %self.candidates[self.active],
                    next = %self.candidates[idx],
                    remaining = self.remaining(),
                    "Rotating proxy"
                );
                self.active = idx;
                Ok(())
            }
            None => {
                tracing::error!(
                    exhausted = self.candidates.len(),
                    "No proxy candidates remain"
                );
                Err(HarvestError::ProxyPoolExhausted {
                    exhausted: self.candidates.len(),
                })
            }
        }
    }
}

//! The resilience engine: the per-record fetch/classify/rotate loop.
//!
//! ```text
//! Idle -> Fetching -> Classifying -> Recording  -> Fetching | Done
//!                                 -> Retrying   -> Fetching
//!                                 -> Rotating   -> Fetching | abort
//! ```
//!
//! Blocked signals (auth wall, captcha, network error) feed the proxy
//! pool's strike counter; at the threshold the pool rotates and the same
//! record is retried immediately on the new endpoint. A record is never
//! failed by rotation — pool exhaustion is the only abort condition and
//! leaves remaining records pending for a future run.

use std::fmt;

use crate::classify::{FetchOutcome, classify};
use crate::delay::DelayPolicy;
use crate::error::HarvestError;
use crate::proxy::ProxyEndpoint;
use crate::record::{RecordResult, TargetRecord};
use crate::session::{RunSession, RunSummary, StopReason};
use crate::traits::{PageDriver, ProxyProbe, RecordStore};

/// Observable engine state, reported at trace level on each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Fetching,
    Classifying,
    Retrying,
    Rotating,
    Recording,
    Done,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Fetching => "fetching",
            EngineState::Classifying => "classifying",
            EngineState::Retrying => "retrying",
            EngineState::Rotating => "rotating",
            EngineState::Recording => "recording",
            EngineState::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// Events emitted by the engine for the append-only audit log.
#[derive(Debug)]
pub enum RunEvent<'a> {
    RunStarted {
        proxies: usize,
    },
    RecordStarted {
        index: usize,
        url: &'a str,
    },
    /// One attempt per event: record identity, active proxy, and the
    /// classification result.
    AttemptClassified {
        index: usize,
        proxy: &'a ProxyEndpoint,
        outcome: &'a FetchOutcome,
    },
    RecordCompleted {
        index: usize,
        rotated: bool,
    },
    RecordSkipped {
        index: usize,
        reason: &'a str,
    },
    ProxyRotated {
        next: &'a ProxyEndpoint,
        remaining: usize,
    },
    RunFinished {
        summary: &'a RunSummary,
    },
}

/// Receives engine events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::RunStarted { proxies } => {
                tracing::info!(%proxies, "Run started");
            }
            RunEvent::RecordStarted { index, url } => {
                tracing::info!(record = index, %url, "Processing record");
            }
            RunEvent::AttemptClassified {
                index,
                proxy,
                outcome,
            } => match outcome {
                FetchOutcome::Success(_) => {
                    tracing::info!(record = index, %proxy, "Fetch succeeded");
                }
                FetchOutcome::AuthWall => {
                    tracing::warn!(record = index, %proxy, "Hit auth wall");
                }
                FetchOutcome::Captcha => {
                    tracing::warn!(record = index, %proxy, "Hit captcha challenge");
                }
                FetchOutcome::NetworkError(reason) => {
                    tracing::warn!(record = index, %proxy, %reason, "Network error");
                }
            },
            RunEvent::RecordCompleted { index, rotated } => {
                tracing::info!(record = index, %rotated, "Record completed");
            }
            RunEvent::RecordSkipped { index, reason } => {
                tracing::warn!(record = index, %reason, "Record skipped");
            }
            RunEvent::ProxyRotated { next, remaining } => {
                tracing::warn!(%next, %remaining, "Rotated to new proxy");
            }
            RunEvent::RunFinished { summary } => {
                tracing::info!(%summary, "Run finished");
            }
        }
    }
}

/// Drives one full pass over the record list.
pub struct Engine<S, D, P, V>
where
    S: RecordStore,
    D: PageDriver,
    P: DelayPolicy,
    V: ProxyProbe,
{
    store: S,
    driver: D,
    delay: P,
    probe: V,
    /// Stop after this many records complete in one run, leaving the
    /// rest pending.
    limit: Option<u64>,
}

impl<S, D, P, V> Engine<S, D, P, V>
where
    S: RecordStore,
    D: PageDriver,
    P: DelayPolicy,
    V: ProxyProbe,
{
    pub fn new(store: S, driver: D, delay: P, probe: V) -> Self {
        Self {
            store,
            driver,
            delay,
            probe,
            limit: None,
        }
    }

    pub fn with_record_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    /// Run to completion, the record limit, or pool exhaustion. All end
    /// states return the run summary; only record-store faults surface
    /// as errors.
    pub async fn run<R: RunReporter>(
        &self,
        mut session: RunSession,
        reporter: &R,
    ) -> Result<RunSummary, HarvestError> {
        let mut state = EngineState::Idle;
        let mut completed_this_run: u64 = 0;

        reporter.report(RunEvent::RunStarted {
            proxies: session.pool.remaining(),
        });

        // Validate the first active endpoint before any record is pulled.
        if !self.ensure_live_proxy(&mut session).await? {
            return self.abort_exhausted(session, &mut state, reporter).await;
        }

        loop {
            if let Some(limit) = self.limit
                && completed_this_run >= limit
            {
                transition(&mut state, EngineState::Done);
                let counts = self.store.counts().await?;
                let summary = session.finish(counts.pending, StopReason::RecordLimit);
                reporter.report(RunEvent::RunFinished { summary: &summary });
                return Ok(summary);
            }

            let Some((index, record)) = self.store.next_pending().await? else {
                transition(&mut state, EngineState::Done);
                let summary = session.finish(0, StopReason::Completed);
                reporter.report(RunEvent::RunFinished { summary: &summary });
                return Ok(summary);
            };

            reporter.report(RunEvent::RecordStarted {
                index,
                url: &record.prooflink,
            });

            if record.prooflink.trim().is_empty() {
                let reason = "missing prooflink";
                reporter.report(RunEvent::RecordSkipped { index, reason });
                self.store
                    .write_result(
                        index,
                        &RecordResult::Failed {
                            reason: reason.to_string(),
                        },
                    )
                    .await?;
                session.note_failed();
                continue;
            }

            match self
                .process_record(index, &record, &mut session, &mut state, reporter)
                .await?
            {
                RecordVerdict::Completed => completed_this_run += 1,
                RecordVerdict::PoolExhausted => {
                    return self.abort_exhausted(session, &mut state, reporter).await;
                }
            }
        }
    }

    /// Probe the active endpoint, discarding dead candidates until a
    /// live one is found. Returns false when the pool runs dry.
    async fn ensure_live_proxy(&self, session: &mut RunSession) -> Result<bool, HarvestError> {
        loop {
            let proxy = session.pool.active().clone();
            if self.probe.check(&proxy).await {
                return Ok(true);
            }
            tracing::warn!(%proxy, "Proxy failed validation probe, discarding");
            match session.pool.rotate() {
                Ok(()) => session.note_rotation(),
                Err(HarvestError::ProxyPoolExhausted { .. }) => return Ok(false),
                Err(e) => return Err(e),
            }
        }
    }

    async fn abort_exhausted<R: RunReporter>(
        &self,
        session: RunSession,
        state: &mut EngineState,
        reporter: &R,
    ) -> Result<RunSummary, HarvestError> {
        transition(state, EngineState::Done);
        let counts = self.store.counts().await?;
        let summary = session.finish(counts.pending, StopReason::PoolExhausted);
        reporter.report(RunEvent::RunFinished { summary: &summary });
        Ok(summary)
    }

    /// Retry one record until it succeeds or the pool runs dry.
    async fn process_record<R: RunReporter>(
        &self,
        index: usize,
        record: &TargetRecord,
        session: &mut RunSession,
        state: &mut EngineState,
        reporter: &R,
    ) -> Result<RecordVerdict, HarvestError> {
        let mut rotated = false;

        loop {
            transition(state, EngineState::Fetching);
            session.note_attempt();
            let raw = self
                .driver
                .navigate(&record.prooflink, session.pool.active())
                .await;

            transition(state, EngineState::Classifying);
            let outcome = classify(&raw);
            reporter.report(RunEvent::AttemptClassified {
                index,
                proxy: session.pool.active(),
                outcome: &outcome,
            });

            match outcome {
                FetchOutcome::Success(payload) => {
                    session.pool.record_success();
                    transition(state, EngineState::Recording);
                    self.store
                        .write_result(index, &RecordResult::Done { payload, rotated })
                        .await?;
                    session.note_completed();
                    reporter.report(RunEvent::RecordCompleted { index, rotated });
                    self.pause().await;
                    return Ok(RecordVerdict::Completed);
                }
                FetchOutcome::AuthWall
                | FetchOutcome::Captcha
                | FetchOutcome::NetworkError(_) => {
                    if session.pool.record_blocked() {
                        transition(state, EngineState::Rotating);
                        match session.pool.rotate() {
                            Ok(()) => {
                                rotated = true;
                                session.note_rotation();
                                // Dead replacements are discarded too.
                                if !self.ensure_live_proxy(session).await? {
                                    return Ok(RecordVerdict::PoolExhausted);
                                }
                                reporter.report(RunEvent::ProxyRotated {
                                    next: session.pool.active(),
                                    remaining: session.pool.remaining(),
                                });
                                // Fresh endpoint: retry immediately,
                                // no inter-request delay.
                            }
                            Err(HarvestError::ProxyPoolExhausted { .. }) => {
                                return Ok(RecordVerdict::PoolExhausted);
                            }
                            Err(e) => return Err(e),
                        }
                    } else {
                        transition(state, EngineState::Retrying);
                        self.pause().await;
                    }
                }
            }
        }
    }

    async fn pause(&self) {
        let delay = self.delay.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// How one record's retry loop ended.
enum RecordVerdict {
    Completed,
    PoolExhausted,
}

fn transition(state: &mut EngineState, next: EngineState) {
    if *state != next {
        tracing::trace!(from = %state, to = %next, "Engine state transition");
        *state = next;
    }
}

use chrono::{DateTime, Utc};

use crate::proxy::ProxyPool;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every record reached a terminal status.
    Completed,
    /// The configured per-run record cap was reached; remaining records
    /// stay pending for a future run.
    RecordLimit,
    /// All proxy candidates were discarded; remaining records stay
    /// pending for a future run.
    PoolExhausted,
}

/// Process-wide state for one full pass over the record list.
///
/// Explicitly constructed at run start and torn down into a
/// [`RunSummary`] at the end; nothing here is ambient or global.
#[derive(Debug)]
pub struct RunSession {
    pub pool: ProxyPool,
    pub started_at: DateTime<Utc>,
    attempts: u64,
    rotations: u64,
    completed: u64,
    failed: u64,
}

impl RunSession {
    pub fn start(pool: ProxyPool) -> Self {
        Self {
            pool,
            started_at: Utc::now(),
            attempts: 0,
            rotations: 0,
            completed: 0,
            failed: 0,
        }
    }

    pub fn note_attempt(&mut self) {
        self.attempts += 1;
    }

    pub fn note_rotation(&mut self) {
        self.rotations += 1;
    }

    pub fn note_completed(&mut self) {
        self.completed += 1;
    }

    pub fn note_failed(&mut self) {
        self.failed += 1;
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Tear the session down into its final report.
    pub fn finish(self, remaining: u64, reason: StopReason) -> RunSummary {
        RunSummary {
            completed: self.completed,
            failed: self.failed,
            remaining,
            attempts: self.attempts,
            rotations: self.rotations,
            started_at: self.started_at,
            finished_at: Utc::now(),
            reason,
        }
    }
}

/// What the run reports when it ends, however it ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: u64,
    pub failed: u64,
    pub remaining: u64,
    pub attempts: u64,
    pub rotations: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reason: StopReason,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self.reason {
            StopReason::Completed => "completed",
            StopReason::RecordLimit => "stopped: record limit reached",
            StopReason::PoolExhausted => "aborted: proxy pool exhausted",
        };
        write!(
            f,
            "{} done, {} failed, {} pending ({} attempts, {} rotations) — {}",
            self.completed, self.failed, self.remaining, self.attempts, self.rotations, reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{PoolConfig, ProxyEndpoint, ProxyPool};

    #[test]
    fn test_session_counters_flow_into_summary() {
        let pool =
            ProxyPool::new(vec![ProxyEndpoint::new("10.0.0.1", 8080)], PoolConfig::default())
                .unwrap();
        let mut session = RunSession::start(pool);
        session.note_attempt();
        session.note_attempt();
        session.note_rotation();
        session.note_completed();

        let summary = session.finish(4, StopReason::PoolExhausted);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.rotations, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.remaining, 4);
        assert_eq!(summary.reason, StopReason::PoolExhausted);
    }

    #[test]
    fn test_summary_display_names_the_reason() {
        let pool =
            ProxyPool::new(vec![ProxyEndpoint::new("10.0.0.1", 8080)], PoolConfig::default())
                .unwrap();
        let summary = RunSession::start(pool).finish(0, StopReason::Completed);
        assert!(summary.to_string().contains("completed"));
    }
}

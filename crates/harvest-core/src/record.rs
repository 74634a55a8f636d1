use std::fmt;

use serde::{Deserialize, Serialize};

/// Value written to the `result` column when a record completes.
const RESULT_DONE: &str = "done";

/// Prefix written to the `result` column when a record is skipped.
const RESULT_FAILED_PREFIX: &str = "failed";

/// One row of the input list. Identity is the row position; the columns
/// mirror the tabular file exactly so the store can round-trip rows it
/// never touched byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub first_name: String,
    pub last_name: String,
    pub geo: String,
    pub prooflink: String,
    #[serde(rename = "IP change")]
    pub ip_change: String,
    /// Appended checkpoint column: empty while pending, `done` on
    /// success, `failed: <reason>` when skipped. Reruns resume from the
    /// first row without a value here.
    #[serde(default)]
    pub result: String,
}

impl TargetRecord {
    /// Derive the record's status from its checkpoint column.
    pub fn status(&self) -> RecordStatus {
        if self.result == RESULT_DONE {
            RecordStatus::Done
        } else if self.result.starts_with(RESULT_FAILED_PREFIX) {
            RecordStatus::Failed
        } else {
            RecordStatus::Pending
        }
    }

    /// Apply a processing result in place.
    pub fn apply(&mut self, result: &RecordResult) {
        match result {
            RecordResult::Done { payload, rotated } => {
                let (first, last) = payload.split_name();
                self.first_name = first;
                self.last_name = last;
                self.geo = payload.location.clone();
                if *rotated {
                    self.ip_change = "rotation".to_string();
                }
                self.result = RESULT_DONE.to_string();
            }
            RecordResult::Failed { reason } => {
                self.result = format!("{RESULT_FAILED_PREFIX}: {reason}");
            }
        }
    }
}

/// Status of a record, derived from its `result` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Done,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Done => "done",
            RecordStatus::Failed => "failed",
        }
    }

    /// Terminal records are skipped by `next_pending`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Done | RecordStatus::Failed)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Data extracted from a successfully rendered profile page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePayload {
    pub full_name: String,
    pub location: String,
}

impl ProfilePayload {
    /// Split the headline name into (first, last) on the first space,
    /// the way the columns expect it.
    pub fn split_name(&self) -> (String, String) {
        match self.full_name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => (self.full_name.clone(), String::new()),
        }
    }
}

/// Done/failed/pending tallies over a record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub done: u64,
    pub failed: u64,
    pub pending: u64,
}

impl StatusCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a TargetRecord>) -> Self {
        let mut counts = StatusCounts::default();
        for record in records {
            match record.status() {
                RecordStatus::Done => counts.done += 1,
                RecordStatus::Failed => counts.failed += 1,
                RecordStatus::Pending => counts.pending += 1,
            }
        }
        counts
    }
}

/// Outcome the engine writes back for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordResult {
    /// Extraction succeeded. `rotated` is true if the proxy was rotated
    /// at least once while this record was in flight; it stamps the
    /// `IP change` column for post-run audit.
    Done {
        payload: ProfilePayload,
        rotated: bool,
    },
    /// The record cannot be processed (e.g. no prooflink). Never set
    /// for rotation or run aborts — those leave the record pending.
    Failed { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(result: &str) -> TargetRecord {
        TargetRecord {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            geo: "London".into(),
            prooflink: "https://example.com/in/ada".into(),
            ip_change: String::new(),
            result: result.into(),
        }
    }

    #[test]
    fn test_status_from_result_column() {
        assert_eq!(record("").status(), RecordStatus::Pending);
        assert_eq!(record("done").status(), RecordStatus::Done);
        assert_eq!(record("failed: missing prooflink").status(), RecordStatus::Failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(RecordStatus::Done.is_terminal());
        assert!(RecordStatus::Failed.is_terminal());
    }

    #[test]
    fn test_apply_done_writes_payload_columns() {
        let mut rec = record("");
        rec.apply(&RecordResult::Done {
            payload: ProfilePayload {
                full_name: "Grace Brewster Hopper".into(),
                location: "Arlington, Virginia".into(),
            },
            rotated: false,
        });

        assert_eq!(rec.first_name, "Grace");
        assert_eq!(rec.last_name, "Brewster Hopper");
        assert_eq!(rec.geo, "Arlington, Virginia");
        assert_eq!(rec.ip_change, "");
        assert_eq!(rec.status(), RecordStatus::Done);
    }

    #[test]
    fn test_apply_done_stamps_ip_change_after_rotation() {
        let mut rec = record("");
        rec.apply(&RecordResult::Done {
            payload: ProfilePayload {
                full_name: "Grace Hopper".into(),
                location: "Arlington".into(),
            },
            rotated: true,
        });

        assert_eq!(rec.ip_change, "rotation");
    }

    #[test]
    fn test_apply_failed_records_reason() {
        let mut rec = record("");
        rec.apply(&RecordResult::Failed {
            reason: "missing prooflink".into(),
        });

        assert_eq!(rec.result, "failed: missing prooflink");
        assert_eq!(rec.status(), RecordStatus::Failed);
    }

    #[test]
    fn test_single_word_name_has_empty_last_name() {
        let payload = ProfilePayload {
            full_name: "Cher".into(),
            location: "LA".into(),
        };
        assert_eq!(payload.split_name(), ("Cher".to_string(), String::new()));
    }
}

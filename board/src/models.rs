// Persisted and delivered record types

use serde::{Deserialize, Serialize};

/// The persisted job definition, stored JSON-encoded in the board hash.
///
/// Optional fields must be omitted when absent (not serialized as null): the
/// promotion script decodes the record with cjson, where a JSON null is a
/// truthy sentinel rather than nil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub runner: String,
    /// Opaque payload; decoded only at show/pop time via a format codec.
    pub payload: String,
    /// Unix seconds at creation.
    pub created_at: i64,
    /// First due time (unix seconds).
    pub start: i64,
    /// End of the valid window, inclusive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
    /// Recurrence period in seconds; absent for one-shot jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// Non-uniform recurrence parameter, carried opaquely (extension point).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    /// Non-uniform recurrence parameter, carried opaquely (extension point).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambda: Option<String>,
}

impl JobRecord {
    /// True when the job recurs (interval variant).
    pub fn is_recurring(&self) -> bool {
        self.interval.is_some()
    }
}

/// A point-in-time snapshot of a job pushed into a runner's FIFO by tick.
/// Once popped it is gone from the queue; redelivery is a consumer concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub runner: String,
    pub job_id: String,
    pub payload: String,
}

/// A job record with its payload decoded for inspection (`Board::show`).
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedJob {
    pub id: String,
    pub runner: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub start: i64,
    pub stop: Option<i64>,
    pub interval: Option<i64>,
}

/// A queue entry with its payload decoded, handed to consumers by pop/listen.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredJob {
    pub job_id: String,
    pub runner: String,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_omits_absent_fields() {
        let record = JobRecord {
            id: "j1".into(),
            runner: "mailer".into(),
            payload: "{}".into(),
            created_at: 1000,
            start: 1000,
            stop: None,
            interval: None,
            step: None,
            lambda: None,
        };
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(!encoded.contains("stop"));
        assert!(!encoded.contains("interval"));
        assert!(!encoded.contains("null"));
    }

    #[test]
    fn test_record_round_trips() {
        let record = JobRecord {
            id: "j2".into(),
            runner: "mailer".into(),
            payload: r#"{"to":"a@b"}"#.into(),
            created_at: 1000,
            start: 1000,
            stop: Some(4600),
            interval: Some(60),
            step: None,
            lambda: None,
        };
        let decoded: JobRecord =
            serde_json::from_str(&serde_json::to_string(&record).unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.is_recurring());
    }
}

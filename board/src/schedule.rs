// Schedule descriptors and their normalization
//
// All validation and start/stop/interval computation happens here at
// construction time, not scattered through call sites. Board operations only
// ever see an already-normalized ScheduleSpec.

use crate::errors::BoardError;
use serde::{Deserialize, Serialize};

/// How a job's due occurrences are produced. Exactly one variant per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleDescriptor {
    /// Fires exactly once at `start`.
    Once { start: i64 },

    /// Valid window `[start, start + duration]`; fires once inside the
    /// window, expired once now has passed the stop. `start` defaults to the
    /// creation time.
    Duration {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<i64>,
        duration: i64,
    },

    /// Recurs every `interval` seconds within `[start, stop]`. `step` and
    /// `lambda` parameterize non-uniform recurrence; they are stored but not
    /// interpreted by this version.
    Interval {
        interval: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lambda: Option<String>,
    },

    /// Unbounded recurrence; explicitly unsupported in this version.
    Repeat,
}

/// Concrete schedule parameters computed from a descriptor at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleSpec {
    pub start: i64,
    pub stop: Option<i64>,
    pub interval: Option<i64>,
    pub step: Option<i64>,
    pub lambda: Option<String>,
}

impl ScheduleDescriptor {
    /// Validate the descriptor and compute concrete start/stop/interval
    /// values, defaulting a missing start to `now`.
    pub fn normalize(&self, now: i64) -> Result<ScheduleSpec, BoardError> {
        match self {
            ScheduleDescriptor::Once { start } => Ok(ScheduleSpec {
                start: *start,
                stop: None,
                interval: None,
                step: None,
                lambda: None,
            }),

            ScheduleDescriptor::Duration { start, duration } => {
                if *duration < 0 {
                    return Err(BoardError::InvalidSchedule(format!(
                        "duration must be non-negative, got {}",
                        duration
                    )));
                }
                let start = start.unwrap_or(now);
                Ok(ScheduleSpec {
                    start,
                    stop: Some(start + duration),
                    interval: None,
                    step: None,
                    lambda: None,
                })
            }

            ScheduleDescriptor::Interval {
                interval,
                start,
                stop,
                step,
                lambda,
            } => {
                if *interval <= 0 {
                    return Err(BoardError::InvalidSchedule(format!(
                        "interval must be positive, got {}",
                        interval
                    )));
                }
                let start = start.unwrap_or(now);
                if let Some(stop) = stop {
                    if *stop < start {
                        return Err(BoardError::InvalidSchedule(format!(
                            "stop {} precedes start {}",
                            stop, start
                        )));
                    }
                }
                Ok(ScheduleSpec {
                    start,
                    stop: *stop,
                    interval: Some(*interval),
                    step: *step,
                    lambda: lambda.clone(),
                })
            }

            ScheduleDescriptor::Repeat => Err(BoardError::Unsupported(
                "repeat schedules are not supported".to_string(),
            )),
        }
    }
}

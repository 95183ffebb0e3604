use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub attempt_id: String,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub attempt_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimerEvent {
    pub fn tick(attempt_id: String, remaining_seconds: u32, total_seconds: u32) -> Self {
        TimerEvent::TimerTick(TimerTick {
            attempt_id,
            remaining_seconds,
            elapsed_seconds: total_seconds.saturating_sub(remaining_seconds),
            total_seconds,
            timestamp: Utc::now(),
        })
    }

    pub fn expired(attempt_id: String) -> Self {
        TimerEvent::TimeExpired(TimeExpired {
            attempt_id,
            timestamp: Utc::now(),
            message: "Time limit exceeded".to_string(),
        })
    }
}

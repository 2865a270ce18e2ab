use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    /// Maps the platform's state vocabulary onto the states the engine reasons about.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "QUEUED" | "PREPARING" | "NOT_STARTED" | "NOT STARTED" => JobState::NotStarted,
            "RUNNING" | "CANCELLING" => JobState::Running,
            "SUCCEEDED" => JobState::Succeeded,
            "FAILED" | "CANCELLED" => JobState::Failed,
            _ => JobState::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::NotStarted => "NOT_STARTED",
            JobState::Running => "RUNNING",
            JobState::Succeeded => "SUCCEEDED",
            JobState::Failed => "FAILED",
            JobState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Usage reported by the platform. `Unknown` is distinct from a reported zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ConsumedUnits {
    Known(f64),
    #[default]
    Unknown,
}

impl ConsumedUnits {
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(units) if units.is_finite() && units >= 0.0 => ConsumedUnits::Known(units),
            _ => ConsumedUnits::Unknown,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            ConsumedUnits::Known(units) => Some(units),
            ConsumedUnits::Unknown => None,
        }
    }
}

/// One observation of a job's remote state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    /// State as spelled by the source, e.g. `QUEUED` for a `NotStarted` job.
    pub raw_state: String,
    pub consumed_units: ConsumedUnits,
    pub create_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    pub training_input: serde_json::Value,
}

impl JobStatus {
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            raw_state: state.as_str().to_string(),
            consumed_units: ConsumedUnits::Unknown,
            create_time: None,
            start_time: None,
            end_time: None,
            labels: BTreeMap::new(),
            training_input: serde_json::Value::Null,
        }
    }

    /// Baseline every tracked job is compared against before its first poll.
    pub fn not_started() -> Self {
        Self::new(JobState::NotStarted)
    }

    /// Shown for a cycle in which the fetch failed.
    pub fn unknown() -> Self {
        Self::new(JobState::Unknown)
    }

    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Sets the end time, which is only kept for terminal states.
    pub fn with_end_time(mut self, end: DateTime<Utc>) -> Self {
        if self.state.is_terminal() {
            self.end_time = Some(end);
        }
        self
    }

    pub fn with_units(mut self, units: f64) -> Self {
        self.consumed_units = ConsumedUnits::from_option(Some(units));
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let end = self.end_time.unwrap_or(now);
        (end - start).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobMetrics {
    pub gpu_mem_utilization: f64,
    pub gpu_utilization: f64,
    pub cpu_utilization: f64,
    pub mem_utilization: f64,
    pub received_bytes: u64,
    pub sent_bytes: u64,
}

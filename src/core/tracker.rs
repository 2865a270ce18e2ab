use crate::core::error::SourceError;
use crate::core::source::StatusSource;
use crate::core::status::{JobMetrics, JobStatus};

/// The engine's record of one watched job.
pub struct TrackedJob {
    pub id: String,
    source: Box<dyn StatusSource>,
    /// Baseline for change detection; the not-started sentinel before the first successful poll.
    pub last_status: JobStatus,
    pub previous_status: Option<JobStatus>,
    /// True only for the cycle in which `last_status.state` changed.
    pub changed: bool,
    pub poll_count: u64,
    pub failure_count: u64,
    /// Set when the most recent fetch failed, cleared by the next success.
    pub last_error: Option<String>,
    pub metrics: Option<JobMetrics>,
}

/// Outcome of one fetch, produced off the engine thread.
pub struct Observation {
    pub status: Result<JobStatus, SourceError>,
    pub metrics: Option<Result<JobMetrics, SourceError>>,
}

impl TrackedJob {
    pub fn new(source: Box<dyn StatusSource>) -> Self {
        Self {
            id: source.id().to_string(),
            source,
            last_status: JobStatus::not_started(),
            previous_status: None,
            changed: false,
            poll_count: 0,
            failure_count: 0,
            last_error: None,
            metrics: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.last_status.is_terminal()
    }

    /// Status to display: `UNKNOWN` for a cycle whose fetch failed.
    pub fn current_status(&self) -> JobStatus {
        if self.last_error.is_some() {
            JobStatus::unknown()
        } else {
            self.last_status.clone()
        }
    }

    pub fn links(&self) -> Vec<String> {
        self.source.links()
    }

    /// Asks the source for the job's state. Touches nothing but the source.
    pub(crate) fn fetch(&mut self) -> Observation {
        let status = self.source.fetch_status();
        let metrics = if status.is_ok() {
            self.source.fetch_metrics()
        } else {
            None
        };
        Observation { status, metrics }
    }
}

impl std::fmt::Debug for TrackedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedJob")
            .field("id", &self.id)
            .field("state", &self.last_status.state)
            .field("changed", &self.changed)
            .field("poll_count", &self.poll_count)
            .field("failure_count", &self.failure_count)
            .finish()
    }
}

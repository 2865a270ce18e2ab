//! What the display is handed once per tick.

use chrono::{DateTime, Utc};

use crate::core::detector::display_order;
use crate::core::formatter::{format_duration, format_metrics, format_units};
use crate::core::status::JobState;
use crate::core::tracker::TrackedJob;

/// Colouring hint for a row's status cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Failure,
    Pending,
    Unknown,
}

impl From<JobState> for Severity {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Succeeded => Severity::Success,
            JobState::Failed => Severity::Failure,
            JobState::NotStarted | JobState::Running => Severity::Pending,
            JobState::Unknown => Severity::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub state: JobState,
    pub raw_state: String,
    pub severity: Severity,
    pub units: String,
    pub elapsed: String,
    pub links: Vec<String>,
    pub metrics: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub rows: Vec<JobRow>,
    pub remote_calls: usize,
    pub total_failures: u64,
    pub tracked: usize,
}

impl Snapshot {
    pub fn build<'a>(
        jobs: impl IntoIterator<Item = &'a TrackedJob>,
        remote_calls: usize,
        total_failures: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let mut jobs: Vec<&TrackedJob> = jobs.into_iter().collect();
        jobs.sort_by(|a, b| {
            display_order(
                (a.id.as_str(), &a.last_status),
                (b.id.as_str(), &b.last_status),
            )
        });

        let rows: Vec<JobRow> = jobs
            .into_iter()
            .map(|job| {
                let shown = job.current_status();
                JobRow {
                    id: job.id.clone(),
                    state: shown.state,
                    raw_state: shown.raw_state.clone(),
                    severity: Severity::from(shown.state),
                    units: format_units(job.last_status.consumed_units),
                    elapsed: format_duration(job.last_status.elapsed(now)),
                    links: job.links(),
                    metrics: job.metrics.as_ref().map(format_metrics),
                    last_error: job.last_error.clone(),
                }
            })
            .collect();

        Self {
            tracked: rows.len(),
            rows,
            remote_calls,
            total_failures,
        }
    }

    pub fn footer(&self) -> String {
        format!(
            "No of remote calls: {} | failed fetches: {} | tracked: {}",
            self.remote_calls, self.total_failures, self.tracked
        )
    }
}

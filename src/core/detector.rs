//! State diffing between consecutive polls, and display ordering.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::core::status::{JobState, JobStatus};
use crate::core::tracker::{Observation, TrackedJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub id: String,
    pub old: JobState,
    pub new: JobState,
}

/// Folds one fetch outcome into `job`, returning the change it represents.
///
/// Only `state` is compared. A failed fetch keeps the previous baseline, so a
/// transient failure never registers as a change.
pub fn apply(job: &mut TrackedJob, observation: Observation) -> Option<ChangeEvent> {
    job.poll_count += 1;

    let status = match observation.status {
        Ok(status) => status,
        Err(err) => {
            job.changed = false;
            job.failure_count += 1;
            tracing::warn!(job = %job.id, failures = job.failure_count, "status fetch failed: {err}");
            job.last_error = Some(err.to_string());
            return None;
        }
    };

    job.last_error = None;
    job.metrics = match observation.metrics {
        Some(Ok(metrics)) => Some(metrics),
        Some(Err(err)) => {
            tracing::debug!(job = %job.id, "metrics fetch failed: {err}");
            None
        }
        None => None,
    };

    let old = job.last_status.state;
    let new = status.state;
    job.changed = old != new;

    let previous = std::mem::replace(&mut job.last_status, status);
    job.previous_status = Some(previous);

    if job.changed {
        tracing::info!(job = %job.id, %old, %new, "job state changed");
        Some(ChangeEvent {
            id: job.id.clone(),
            old,
            new,
        })
    } else {
        None
    }
}

/// Finished jobs rank ahead of active ones.
pub fn terminal_rank(state: JobState) -> u8 {
    if state.is_terminal() {
        1
    } else {
        100
    }
}

/// Display order: `(rank, start_time, id)` ascending, missing start times last.
pub fn display_order(a: (&str, &JobStatus), b: (&str, &JobStatus)) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

fn sort_key<'a>((id, status): (&'a str, &JobStatus)) -> (u8, DateTime<Utc>, &'a str) {
    (
        terminal_rank(status.state),
        status.start_time.unwrap_or(DateTime::<Utc>::MAX_UTC),
        id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SourceError;
    use crate::core::source::{Step, SyntheticSource};
    use chrono::TimeZone;

    fn tracked() -> TrackedJob {
        TrackedJob::new(Box::new(SyntheticSource::scripted("job-1", Vec::<Step>::new())))
    }

    fn ok(state: JobState) -> Observation {
        Observation {
            status: Ok(JobStatus::new(state)),
            metrics: None,
        }
    }

    fn failed() -> Observation {
        Observation {
            status: Err(SourceError::Timeout(std::time::Duration::from_secs(1))),
            metrics: None,
        }
    }

    #[test]
    fn changed_exactly_when_state_differs_from_previous_poll() {
        let mut job = tracked();
        let script = [
            JobState::NotStarted,
            JobState::Running,
            JobState::Running,
            JobState::Succeeded,
        ];
        let changed: Vec<bool> = script
            .iter()
            .map(|state| {
                apply(&mut job, ok(*state));
                job.changed
            })
            .collect();
        assert_eq!(changed, vec![false, true, false, true]);
        assert_eq!(job.previous_status.as_ref().map(|s| s.state), Some(JobState::Running));
    }

    #[test]
    fn first_real_state_is_a_change_from_the_baseline() {
        let mut job = tracked();
        let event = apply(&mut job, ok(JobState::Running)).unwrap();
        assert_eq!(event.old, JobState::NotStarted);
        assert_eq!(event.new, JobState::Running);
    }

    #[test]
    fn failure_then_same_state_is_not_a_change() {
        let mut job = tracked();
        apply(&mut job, ok(JobState::Running));

        assert!(apply(&mut job, failed()).is_none());
        assert!(!job.changed);
        assert_eq!(job.failure_count, 1);
        assert_eq!(job.current_status().state, JobState::Unknown);
        assert_eq!(job.last_status.state, JobState::Running);

        assert!(apply(&mut job, ok(JobState::Running)).is_none());
        assert!(job.last_error.is_none());
        assert_eq!(job.poll_count, 3);
    }

    #[test]
    fn scripted_failures_flow_through_fetch() {
        let mut job = TrackedJob::new(Box::new(SyntheticSource::scripted(
            "job-1",
            [Step::Fail, Step::State(JobState::Running)],
        )));
        let observation = job.fetch();
        assert!(apply(&mut job, observation).is_none());
        let observation = job.fetch();
        assert!(apply(&mut job, observation).is_some());
    }

    #[test]
    fn terminal_jobs_sort_first_then_by_start_time() {
        let t = |min| Utc.with_ymd_and_hms(2021, 4, 28, 8, min, 0).unwrap();
        let a = JobStatus::new(JobState::Failed).with_start_time(t(30));
        let b = JobStatus::new(JobState::Running).with_start_time(t(20));
        let c = JobStatus::new(JobState::Succeeded).with_start_time(t(10));
        let d = JobStatus::new(JobState::Running);

        let mut rows = vec![("A", &a), ("D", &d), ("B", &b), ("C", &c)];
        rows.sort_by(|x, y| display_order(*x, *y));
        let order: Vec<_> = rows.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec!["C", "A", "B", "D"]);
    }
}

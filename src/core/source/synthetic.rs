use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::core::error::SourceError;
use crate::core::source::StatusSource;
use crate::core::status::{JobMetrics, JobState, JobStatus};

/// One scripted fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    State(JobState),
    Fail,
}

#[derive(Debug)]
enum Mode {
    Scripted {
        steps: VecDeque<Step>,
        last: Option<Step>,
    },
    Randomized {
        remaining: u32,
    },
}

/// Source that invents statuses instead of asking a platform.
#[derive(Debug)]
pub struct SyntheticSource {
    id: String,
    mode: Mode,
    started_at: DateTime<Utc>,
    fetches: Arc<AtomicUsize>,
}

impl SyntheticSource {
    /// Replays `steps` in order, then keeps repeating the final step.
    pub fn scripted(id: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            id: id.into(),
            mode: Mode::Scripted {
                steps: steps.into_iter().collect(),
                last: None,
            },
            started_at: Utc::now(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs for a random number of polls, then succeeds.
    pub fn randomized(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mode: Mode::Randomized {
                remaining: rand::thread_rng().gen_range(5..=20),
            },
            started_at: Utc::now(),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle counting `fetch_status` calls, readable after the source is boxed.
    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetches)
    }

    fn next_step(&mut self) -> Option<Step> {
        match &mut self.mode {
            Mode::Scripted { steps, last } => {
                if let Some(step) = steps.pop_front() {
                    *last = Some(step);
                }
                *last
            }
            Mode::Randomized { remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Some(Step::State(JobState::Running))
                } else {
                    Some(Step::State(JobState::Succeeded))
                }
            }
        }
    }

    fn status_for(&self, state: JobState) -> JobStatus {
        let mut status = JobStatus::new(state)
            .with_start_time(self.started_at)
            .with_end_time(Utc::now())
            .with_units(31.5);
        status.create_time = Some(self.started_at);
        status.labels = BTreeMap::from([
            ("env".to_string(), "dev".to_string()),
            ("source".to_string(), "synthetic".to_string()),
        ]);
        status.training_input = serde_json::json!({
            "scaleTier": "CUSTOM",
            "masterType": "n1-highmem-16",
            "region": "europe-west1",
        });
        status
    }
}

impl StatusSource for SyntheticSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_status(&mut self) -> Result<JobStatus, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Some(Step::State(state)) => Ok(self.status_for(state)),
            Some(Step::Fail) => Err(SourceError::Http("synthetic failure".to_string())),
            None => Err(SourceError::Exhausted),
        }
    }

    fn fetch_metrics(&mut self) -> Option<Result<JobMetrics, SourceError>> {
        if matches!(self.mode, Mode::Scripted { .. }) {
            return None;
        }
        let mut rng = rand::thread_rng();
        Some(Ok(JobMetrics {
            gpu_mem_utilization: rng.gen_range(0.01..1.0),
            gpu_utilization: rng.gen_range(0.01..1.0),
            cpu_utilization: rng.gen_range(0.01..1.0),
            mem_utilization: rng.gen_range(0.01..1.0),
            received_bytes: rng.gen_range(100..1000),
            sent_bytes: rng.gen_range(100..1000),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_steps_repeat_the_last_one() {
        let mut source = SyntheticSource::scripted(
            "job-1",
            [Step::State(JobState::Running), Step::State(JobState::Succeeded)],
        );
        let states: Vec<_> = (0..4)
            .map(|_| source.fetch_status().unwrap().state)
            .collect();
        assert_eq!(
            states,
            vec![
                JobState::Running,
                JobState::Succeeded,
                JobState::Succeeded,
                JobState::Succeeded
            ]
        );
        assert_eq!(source.fetch_counter().load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_script_is_exhausted() {
        let mut source = SyntheticSource::scripted("job-1", Vec::<Step>::new());
        assert!(matches!(source.fetch_status(), Err(SourceError::Exhausted)));
        assert!(source.fetch_metrics().is_none());
    }

    #[test]
    fn randomized_source_eventually_succeeds() {
        let mut source = SyntheticSource::randomized("job-1");
        let mut last = JobState::NotStarted;
        for _ in 0..25 {
            last = source.fetch_status().unwrap().state;
        }
        assert_eq!(last, JobState::Succeeded);
        let metrics = source.fetch_metrics().unwrap().unwrap();
        assert!(metrics.cpu_utilization > 0.0 && metrics.cpu_utilization < 1.0);
    }
}

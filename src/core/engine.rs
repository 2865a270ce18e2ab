//! Owner of every tracked job.
//!
//! The engine is driven by a single thread. New jobs arrive as [`Intake`]
//! messages and are drained at the start of each cycle, so the job table has
//! exactly one writer. Fetches run in parallel on scoped threads, each holding
//! the only reference to its job.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use chrono::Utc;

use crate::core::detector::{self, ChangeEvent};
use crate::core::error::SourceError;
use crate::core::snapshot::Snapshot;
use crate::core::source::SourceFactory;
use crate::core::tracker::{Observation, TrackedJob};

/// Request to start tracking a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    pub id: String,
    /// Whether to tell the user the job is now being watched.
    pub announce: bool,
}

pub type IntakeSender = Sender<Intake>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub events: Vec<ChangeEvent>,
    /// Ids that arrived through intake this cycle and asked to be announced.
    pub announced: Vec<String>,
    pub remote_calls: usize,
    pub failures: usize,
}

pub struct Engine {
    jobs: Vec<TrackedJob>,
    factory: SourceFactory,
    intake: Receiver<Intake>,
    total_failures: u64,
    last_remote_calls: usize,
}

impl Engine {
    pub fn new(factory: SourceFactory) -> (Self, IntakeSender) {
        let (intake_tx, intake_rx) = mpsc::channel();
        let engine = Self {
            jobs: Vec::new(),
            factory,
            intake: intake_rx,
            total_failures: 0,
            last_remote_calls: 0,
        };
        (engine, intake_tx)
    }

    /// Starts tracking `id` with a fresh source. Returns false if already tracked.
    pub fn track(&mut self, id: &str) -> bool {
        if self.jobs.iter().any(|job| job.id == id) {
            return false;
        }
        let source = (self.factory)(id);
        self.jobs.push(TrackedJob::new(source));
        true
    }

    /// Re-tracks ids persisted by a previous run, silently.
    pub fn replay<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        let replayed = ids.into_iter().filter(|id| self.track(id)).count();
        tracing::info!(replayed, "replayed job registry");
        replayed
    }

    pub fn jobs(&self) -> &[TrackedJob] {
        &self.jobs
    }

    pub fn job(&self, id: &str) -> Option<&TrackedJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures
    }

    /// Drains intake, then polls every job that has not reached a terminal state.
    pub fn poll_cycle(&mut self) -> CycleReport {
        let announced = self.drain_intake();

        let mut active = Vec::new();
        for (index, job) in self.jobs.iter_mut().enumerate() {
            if job.is_terminal() {
                job.changed = false;
            } else {
                active.push(index);
            }
        }

        let observations = self.fetch_active();

        let mut report = CycleReport {
            announced,
            remote_calls: observations.len(),
            ..CycleReport::default()
        };
        for (index, observation) in active.into_iter().zip(observations) {
            if observation.status.is_err() {
                report.failures += 1;
            }
            if let Some(event) = detector::apply(&mut self.jobs[index], observation) {
                report.events.push(event);
            }
        }

        self.total_failures += report.failures as u64;
        self.last_remote_calls = report.remote_calls;
        tracing::debug!(
            remote_calls = report.remote_calls,
            changes = report.events.len(),
            failures = report.failures,
            "poll cycle finished"
        );
        report
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::build(
            &self.jobs,
            self.last_remote_calls,
            self.total_failures,
            Utc::now(),
        )
    }

    fn drain_intake(&mut self) -> Vec<String> {
        let mut announced = Vec::new();
        while let Ok(intake) = self.intake.try_recv() {
            if self.track(&intake.id) {
                tracing::info!(job = %intake.id, "tracking new job");
                if intake.announce {
                    announced.push(intake.id);
                }
            }
        }
        announced
    }

    /// Fetches non-terminal jobs in parallel, in table order.
    fn fetch_active(&mut self) -> Vec<Observation> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .jobs
                .iter_mut()
                .filter(|job| !job.is_terminal())
                .map(|job| scope.spawn(move || job.fetch()))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| Observation {
                        status: Err(SourceError::Panicked),
                        metrics: None,
                    })
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use crate::core::source::{StatusSource, Step, SyntheticSource};
    use crate::core::status::JobState;

    type Counters = Arc<Mutex<HashMap<String, Arc<AtomicUsize>>>>;

    /// Factory handing out scripted sources and exposing their fetch counters.
    fn scripted_factory(steps: Vec<Step>) -> (SourceFactory, Counters) {
        let counters: Counters = Arc::default();
        let handle = Arc::clone(&counters);
        let factory: SourceFactory = Box::new(move |id: &str| -> Box<dyn StatusSource> {
            let source = SyntheticSource::scripted(id, steps.clone());
            handle
                .lock()
                .unwrap()
                .insert(id.to_string(), source.fetch_counter());
            Box::new(source)
        });
        (factory, counters)
    }

    fn fetches(counters: &Counters, id: &str) -> usize {
        counters.lock().unwrap()[id].load(Ordering::SeqCst)
    }

    #[test]
    fn terminal_jobs_are_no_longer_fetched() {
        let (factory, counters) = scripted_factory(vec![
            Step::State(JobState::Running),
            Step::State(JobState::Succeeded),
        ]);
        let (mut engine, _intake) = Engine::new(factory);
        engine.track("job-1");

        engine.poll_cycle();
        engine.poll_cycle();
        assert_eq!(fetches(&counters, "job-1"), 2);

        let report = engine.poll_cycle();
        assert_eq!(report.remote_calls, 0);
        assert_eq!(fetches(&counters, "job-1"), 2);
        let job = engine.job("job-1").unwrap();
        assert_eq!(job.poll_count, 2);
        assert!(!job.changed);
    }

    #[test]
    fn duplicate_ids_are_tracked_once() {
        let (factory, _) = scripted_factory(vec![Step::State(JobState::Running)]);
        let (mut engine, intake) = Engine::new(factory);
        assert!(engine.track("job-1"));
        assert!(!engine.track("job-1"));

        intake
            .send(Intake {
                id: "job-1".to_string(),
                announce: true,
            })
            .unwrap();
        let report = engine.poll_cycle();
        assert!(report.announced.is_empty());
        assert_eq!(engine.jobs().len(), 1);
    }

    #[test]
    fn intake_is_drained_before_polling() {
        let (factory, _) = scripted_factory(vec![Step::State(JobState::Running)]);
        let (mut engine, intake) = Engine::new(factory);
        intake
            .send(Intake {
                id: "job-2".to_string(),
                announce: true,
            })
            .unwrap();

        let report = engine.poll_cycle();
        assert_eq!(report.announced, vec!["job-2".to_string()]);
        assert_eq!(report.remote_calls, 1);
        assert_eq!(
            report.events,
            vec![ChangeEvent {
                id: "job-2".to_string(),
                old: JobState::NotStarted,
                new: JobState::Running,
            }]
        );
    }

    #[test]
    fn replay_creates_jobs_without_changes() {
        let (factory, counters) = scripted_factory(vec![Step::State(JobState::Running)]);
        let (mut engine, _intake) = Engine::new(factory);

        assert_eq!(engine.replay(["job-1", "job-2", "job-1"]), 2);
        assert!(engine.jobs().iter().all(|job| !job.changed));
        assert_eq!(fetches(&counters, "job-1"), 0);
    }

    #[test]
    fn failures_are_counted_and_shown_as_unknown() {
        let (factory, _) = scripted_factory(vec![
            Step::State(JobState::Running),
            Step::Fail,
            Step::State(JobState::Running),
        ]);
        let (mut engine, _intake) = Engine::new(factory);
        engine.track("job-1");

        assert_eq!(engine.poll_cycle().events.len(), 1);

        let report = engine.poll_cycle();
        assert_eq!(report.failures, 1);
        assert!(report.events.is_empty());
        assert_eq!(engine.snapshot().rows[0].state, JobState::Unknown);

        let report = engine.poll_cycle();
        assert!(report.events.is_empty());
        assert_eq!(engine.total_failures(), 1);
        assert_eq!(engine.snapshot().rows[0].state, JobState::Running);
    }

    #[test]
    fn every_active_job_is_polled_once_per_cycle() {
        let (factory, _) = scripted_factory(vec![Step::State(JobState::Running)]);
        let (mut engine, _intake) = Engine::new(factory);
        engine.replay(["a", "b", "c", "d"]);

        let report = engine.poll_cycle();
        assert_eq!(report.remote_calls, 4);
        let ids: Vec<_> = report.events.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }
}

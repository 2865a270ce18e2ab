use std::io;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::engine::Engine;
use crate::core::notify::{change_message, watch_message, Notifier};
use crate::core::snapshot::Snapshot;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval scheduler: poll, notify, snapshot. Runs on its own thread so
/// a slow fetch never stalls the dashboard.
pub struct RenderLoop {
    engine: Engine,
    notifier: Box<dyn Notifier>,
    interval: Duration,
    next_tick: Option<Instant>,
}

impl RenderLoop {
    pub fn new(engine: Engine, notifier: Box<dyn Notifier>, interval: Duration) -> Self {
        Self {
            engine,
            notifier,
            interval,
            next_tick: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// True when the next tick is due; the first tick is due immediately.
    pub fn due(&self, now: Instant) -> bool {
        self.next_tick.map_or(true, |next| now >= next)
    }

    /// Time left until the next tick, zero if one is due.
    pub fn until_due(&self, now: Instant) -> Duration {
        self.next_tick
            .map_or(Duration::ZERO, |next| next.saturating_duration_since(now))
    }

    pub fn tick(&mut self) -> Snapshot {
        let report = self.engine.poll_cycle();

        for id in &report.announced {
            let (title, body) = watch_message(id);
            self.notifier.notify(&title, &body);
        }
        for event in &report.events {
            let (title, body) = change_message(event);
            self.notifier.notify(&title, &body);
        }

        // Measured from the end of the cycle so a slow cycle is still followed by a pause.
        self.next_tick = Some(Instant::now() + self.interval);
        self.engine.snapshot()
    }

    pub fn spawn(self, snapshots: Sender<Snapshot>) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("render".to_string())
            .spawn(move || self.run(snapshots))
    }

    /// Ticks until the snapshot receiver goes away.
    pub fn run(mut self, snapshots: Sender<Snapshot>) {
        loop {
            let snapshot = self.tick();
            if snapshots.send(snapshot).is_err() {
                tracing::debug!("dashboard closed; render loop stopping");
                return;
            }
            thread::sleep(self.until_due(Instant::now()));
        }
    }
}

//! Quiet-period debouncing of raw notifications
//!
//! Notifications accumulate in a [`PendingBatch`] until no new one has arrived
//! for the configured delay. The batch is then normalized and handed to the
//! consumer as one list of [`NormalizedEvent`]s.
//!
//! The decision logic lives in [`DebounceState`], which takes explicit
//! instants and never touches a clock. [`Debouncer`] drives it from a timer
//! thread; every state change happens under one mutex.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fsnorm_core::{normalize, NormalizedEvent, RawNotification};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Notifications collected since the last flush
#[derive(Debug, Default)]
pub struct PendingBatch {
    pub events: Vec<RawNotification>,
    /// Arrival of the most recent notification
    pub last_event_time: Option<Instant>,
    /// Arrival the current timer was armed for
    pub batch_started_time: Option<Instant>,
}

/// Result of a timer expiry
#[derive(Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Quiet period elapsed, the batch is complete
    Flush(Vec<RawNotification>),
    /// Something arrived while waiting, wait again until the new deadline
    Rearm(Instant),
    /// No timer was armed
    Idle,
}

/// Debounce state machine
#[derive(Debug)]
pub struct DebounceState {
    batch: PendingBatch,
    delay: Duration,
    spam_threshold: Duration,
    deadline: Option<Instant>,
    spam_check_start: Option<Instant>,
    spam_warned: bool,
}

impl DebounceState {
    pub fn new(delay: Duration, spam_threshold: Duration) -> Self {
        Self {
            batch: PendingBatch::default(),
            delay,
            spam_threshold,
            deadline: None,
            spam_check_start: None,
            spam_warned: false,
        }
    }

    /// Record an arrival
    ///
    /// Returns the new timer deadline when this arrival armed the timer.
    pub fn record(&mut self, notification: RawNotification, now: Instant) -> Option<Instant> {
        self.check_for_spam(&notification, now);

        self.batch.events.push(notification);
        self.batch.last_event_time = Some(now);

        if self.deadline.is_some() {
            return None;
        }

        self.batch.batch_started_time = Some(now);
        let deadline = now + self.delay;
        self.deadline = Some(deadline);
        Some(deadline)
    }

    /// Handle the armed timer firing
    pub fn on_timer(&mut self) -> TimerOutcome {
        if self.deadline.is_none() {
            return TimerOutcome::Idle;
        }

        match self.batch.last_event_time {
            Some(last) if self.batch.batch_started_time != Some(last) => {
                self.batch.batch_started_time = Some(last);
                let deadline = last + self.delay;
                self.deadline = Some(deadline);
                TimerOutcome::Rearm(deadline)
            }
            _ => {
                self.deadline = None;
                let batch = std::mem::take(&mut self.batch);
                TimerOutcome::Flush(batch.events)
            }
        }
    }

    /// Deadline of the armed timer, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn pending(&self) -> usize {
        self.batch.events.len()
    }

    pub fn spam_warned(&self) -> bool {
        self.spam_warned
    }

    fn check_for_spam(&mut self, notification: &RawNotification, now: Instant) {
        if self.batch.events.is_empty() {
            self.spam_warned = false;
            self.spam_check_start = Some(now);
            return;
        }

        let Some(start) = self.spam_check_start else {
            return;
        };

        if !self.spam_warned && now.saturating_duration_since(start) > self.spam_threshold {
            self.spam_warned = true;
            warn!(
                "Watcher is busy catching up with {} file changes in {} seconds. Latest path is '{}'",
                self.batch.events.len(),
                self.spam_threshold.as_secs(),
                notification.path.display()
            );
        }
    }
}

struct Shared {
    state: Mutex<DriverState>,
    timer: Condvar,
}

struct DriverState {
    debounce: DebounceState,
    closed: bool,
}

/// Threaded debouncer
///
/// Normalized batches are sent to the receiver returned by
/// [`Debouncer::spawn`]. Empty results are not sent.
pub struct Debouncer {
    shared: Arc<Shared>,
    timer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Start the timer thread
    pub fn spawn(
        delay: Duration,
        spam_threshold: Duration,
    ) -> std::io::Result<(Self, Receiver<Vec<NormalizedEvent>>)> {
        let shared = Arc::new(Shared {
            state: Mutex::new(DriverState {
                debounce: DebounceState::new(delay, spam_threshold),
                closed: false,
            }),
            timer: Condvar::new(),
        });

        let (flush_tx, flush_rx) = unbounded();
        let timer_shared = Arc::clone(&shared);
        let timer_thread = thread::Builder::new()
            .name("fsnorm-timer".to_string())
            .spawn(move || run_timer(timer_shared, flush_tx))?;

        Ok((
            Self {
                shared,
                timer_thread: Mutex::new(Some(timer_thread)),
            },
            flush_rx,
        ))
    }

    /// Add a notification to the pending batch
    pub fn record(&self, notification: RawNotification) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        if state.debounce.record(notification, Instant::now()).is_some() {
            self.shared.timer.notify_one();
        }
    }

    /// Number of notifications waiting for the quiet period
    pub fn pending(&self) -> usize {
        self.shared.state.lock().debounce.pending()
    }

    /// Stop the timer thread, discarding any partial batch
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            self.shared.timer.notify_one();
        }
        let handle = self.timer_thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("debounce timer thread panicked");
            }
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer(shared: Arc<Shared>, flush_tx: Sender<Vec<NormalizedEvent>>) {
    let mut state = shared.state.lock();

    loop {
        if state.closed {
            break;
        }

        let Some(deadline) = state.debounce.deadline() else {
            shared.timer.wait(&mut state);
            continue;
        };

        if Instant::now() < deadline {
            shared.timer.wait_until(&mut state, deadline);
            continue;
        }

        match state.debounce.on_timer() {
            TimerOutcome::Flush(batch) => {
                let events = normalize(&batch);
                debug!("flushing {} raw notifications as {} events", batch.len(), events.len());
                if !events.is_empty() && flush_tx.send(events).is_err() {
                    break;
                }
            }
            TimerOutcome::Rearm(_) | TimerOutcome::Idle => {}
        }
    }
}

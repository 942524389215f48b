//! Local stopwatch that drives time tracking from a client.
//!
//! The timer moves between `Idle`, `Running` and `Paused` on user actions. While
//! running, a one-second ticker republishes the `HH:MM:SS` display; the ticker is
//! owned by the running phase, so leaving that phase (or dropping the timer)
//! aborts it. The display is presentation only: the committed duration is
//! recomputed from the clock when the timer stops.

use crate::client::{ClientError, EntrySink};
use crate::clock::Clock;
use crate::models::{NewTimeEntry, TimeEntry};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

const TICK: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("Please select a project before starting the timer")]
    NoProjectSelected,

    #[error("Timer is already running")]
    AlreadyRunning,

    #[error("Timer is not running")]
    NotRunning,

    #[error("Failed to save time entry: {0}")]
    CommitFailed(#[source] ClientError),
}

/// Periodic display refresh, aborted on drop.
struct Ticker(JoinHandle<()>);

impl Ticker {
    fn spawn(
        clock: Arc<dyn Clock>,
        started_at: DateTime<Utc>,
        display: Arc<watch::Sender<String>>,
    ) -> Self {
        Self(tokio::spawn(async move {
            let mut ticks = interval(TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                display.send_replace(format_hms(clock.now() - started_at));
            }
        }))
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum Phase {
    Idle,
    Running {
        project_id: Uuid,
        // Shifted forward by paused time on resume.
        started_at: DateTime<Utc>,
        _ticker: Ticker,
    },
    Paused {
        project_id: Uuid,
        elapsed: Duration,
    },
}

pub struct Timer {
    clock: Arc<dyn Clock>,
    selected: Option<Uuid>,
    description: Option<String>,
    phase: Phase,
    display: Arc<watch::Sender<String>>,
    unsaved: Vec<NewTimeEntry>,
}

impl Timer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (display, _) = watch::channel(format_hms(Duration::zero()));
        Self {
            clock,
            selected: None,
            description: None,
            phase: Phase::Idle,
            display: Arc::new(display),
            unsaved: Vec::new(),
        }
    }

    pub fn select_project(&mut self, project_id: Option<Uuid>) {
        self.selected = project_id;
    }

    pub fn selected_project(&self) -> Option<Uuid> {
        self.selected
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn status(&self) -> TimerStatus {
        match self.phase {
            Phase::Idle => TimerStatus::Idle,
            Phase::Running { .. } => TimerStatus::Running,
            Phase::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.phase {
            Phase::Idle => Duration::zero(),
            Phase::Running { started_at, .. } => {
                (self.clock.now() - started_at).max(Duration::zero())
            }
            Phase::Paused { elapsed, .. } => elapsed,
        }
    }

    pub fn display(&self) -> String {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.subscribe()
    }

    /// Entries whose commit failed, oldest first.
    pub fn unsaved(&self) -> &[NewTimeEntry] {
        &self.unsaved
    }

    /// Starts from idle, or resumes a paused timer with its original project.
    /// Spawns the ticker, so it must run inside a tokio runtime.
    pub fn start(&mut self) -> Result<(), TimerError> {
        let now = self.clock.now();
        let (project_id, started_at) = match self.phase {
            Phase::Running { .. } => return Err(TimerError::AlreadyRunning),
            Phase::Paused {
                project_id,
                elapsed,
            } => (project_id, now - elapsed),
            Phase::Idle => (self.selected.ok_or(TimerError::NoProjectSelected)?, now),
        };

        self.display.send_replace(format_hms(now - started_at));
        self.phase = Phase::Running {
            project_id,
            started_at,
            _ticker: Ticker::spawn(self.clock.clone(), started_at, self.display.clone()),
        };
        debug!(project = %project_id, "timer running");
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        let Phase::Running {
            project_id,
            started_at,
            ..
        } = self.phase
        else {
            return Err(TimerError::NotRunning);
        };

        let elapsed = (self.clock.now() - started_at).max(Duration::zero());
        self.phase = Phase::Paused {
            project_id,
            elapsed,
        };
        self.display.send_replace(format_hms(elapsed));
        debug!(project = %project_id, elapsed_ms = elapsed.num_milliseconds(), "timer paused");
        Ok(())
    }

    /// Stops the timer and commits the tracked span to `sink`.
    ///
    /// Local state always returns to idle. When the commit fails the entry is kept
    /// in [`Timer::unsaved`] for [`Timer::retry_unsaved`] and the error is returned.
    /// Returns `Ok(None)` when nothing was tracked.
    pub async fn stop(&mut self, sink: &dyn EntrySink) -> Result<Option<TimeEntry>, TimerError> {
        let end_time = self.clock.now();
        let (project_id, elapsed) = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => return Ok(None),
            Phase::Running {
                project_id,
                started_at,
                ..
            } => (project_id, (end_time - started_at).max(Duration::zero())),
            Phase::Paused {
                project_id,
                elapsed,
            } => (project_id, elapsed),
        };
        self.display.send_replace(format_hms(Duration::zero()));
        let description = self.description.take();

        if elapsed.num_milliseconds() <= 0 {
            return Ok(None);
        }

        let pending = NewTimeEntry {
            project_id,
            start_time: end_time - elapsed,
            end_time: Some(end_time),
            duration: Some(elapsed.num_milliseconds() as u64),
            description,
        };

        match sink.commit(&pending).await {
            Ok(entry) => {
                info!(entry = %entry.id, duration_ms = entry.state.duration(), "time entry saved");
                Ok(Some(entry))
            }
            Err(err) => {
                warn!(project = %project_id, "keeping unsaved time entry: {err}");
                self.unsaved.push(pending);
                Err(TimerError::CommitFailed(err))
            }
        }
    }

    /// Re-commits unsaved entries. Ones that fail again stay queued.
    pub async fn retry_unsaved(&mut self, sink: &dyn EntrySink) -> Vec<TimeEntry> {
        let mut saved = Vec::new();
        let mut still_unsaved = Vec::new();
        for pending in std::mem::take(&mut self.unsaved) {
            match sink.commit(&pending).await {
                Ok(entry) => saved.push(entry),
                Err(err) => {
                    warn!("retry failed: {err}");
                    still_unsaved.push(pending);
                }
            }
        }
        self.unsaved = still_unsaved;
        saved
    }
}

pub fn format_hms(elapsed: Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

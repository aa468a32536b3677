//! Work-session state machine. The tracker doesn't own any timer or user interface: the
//! [session](crate::session) module decides when to tick and where descriptions come from.

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::{
    capture::{take_screenshot, ScreenCapturer},
    storage::{
        compute_total_elapsed,
        entities::{RecordField, SessionRecord},
        work_log::WorkLog,
    },
    utils::{clock::Clock, time::WorkingTime},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Tracking {
        started_at: NaiveDateTime,
    },
    /// Stop was requested and the open row waits for its description.
    AwaitingDescription {
        started_at: NaiveDateTime,
        stopped_at: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Time spent in the current session.
    pub current: WorkingTime,
    /// Time of all closed sessions plus the current one.
    pub total: WorkingTime,
}

pub struct SessionTracker<W: WorkLog> {
    log: W,
    capturer: Box<dyn ScreenCapturer>,
    clock: Box<dyn Clock>,
    state: TrackerState,
    /// Total of closed sessions, recomputed from the log on every transition to idle.
    previous_total: WorkingTime,
    current: WorkingTime,
}

impl<W: WorkLog> SessionTracker<W> {
    /// Creates a tracker for `log`, creating the table if needed and loading the total of
    /// previous sessions.
    pub async fn load(
        log: W,
        capturer: Box<dyn ScreenCapturer>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let previous_total = load_total(&log).await?;
        debug!("Loaded previous total {previous_total}");
        Ok(Self {
            log,
            capturer,
            clock,
            state: TrackerState::Idle,
            previous_total,
            current: WorkingTime::ZERO,
        })
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TrackerState::Tracking { .. })
    }

    pub fn is_idle(&self) -> bool {
        self.state == TrackerState::Idle
    }

    pub fn current_elapsed(&self) -> WorkingTime {
        self.current
    }

    pub fn total_elapsed(&self) -> WorkingTime {
        self.previous_total + self.current
    }

    pub fn log(&self) -> &W {
        &self.log
    }

    /// Opens a new row and takes the first screenshot. Returns `false` when a session is already
    /// running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<bool> {
        if !self.is_idle() {
            debug!("Ignoring start in state {:?}", self.state);
            return Ok(false);
        }

        let now = self.clock.now();
        self.log.append(SessionRecord::open_at(now)).await?;
        self.state = TrackerState::Tracking { started_at: now };
        self.current = WorkingTime::ZERO;
        info!("Started session at {now}");

        self.screenshot().await;
        Ok(true)
    }

    /// Updates the open row's end time. Does nothing unless a session is running.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<Option<TickReport>> {
        let TrackerState::Tracking { started_at } = self.state else {
            debug!("Ignoring tick in state {:?}", self.state);
            return Ok(None);
        };

        let now = self.clock.now();
        self.current = WorkingTime::between(started_at, now);
        self.log
            .update_last(vec![RecordField::EndTime(now)])
            .await?;

        let report = TickReport {
            current: self.current,
            total: self.total_elapsed(),
        };
        debug!("Tick {report:?}");
        Ok(Some(report))
    }

    /// Saves a screenshot into the profile's directory. Failures are logged and skipped, a
    /// missing screen never interrupts tracking.
    pub async fn screenshot(&self) -> Option<PathBuf> {
        let now = self.clock.now();
        match take_screenshot(self.capturer.as_ref(), self.log.screenshot_dir(), now).await {
            Ok(path) => {
                info!("Saved screenshot {path:?}");
                Some(path)
            }
            Err(e) => {
                warn!("Skipping screenshot: {e}");
                None
            }
        }
    }

    /// Freezes the session end and waits for [Self::finish_stop]. Returns `false` when no
    /// session is running.
    pub fn begin_stop(&mut self) -> bool {
        let TrackerState::Tracking { started_at } = self.state else {
            debug!("Ignoring stop in state {:?}", self.state);
            return false;
        };
        let stopped_at = self.clock.now();
        self.current = WorkingTime::between(started_at, stopped_at);
        self.state = TrackerState::AwaitingDescription {
            started_at,
            stopped_at,
        };
        debug!("Stop requested at {stopped_at}");
        true
    }

    /// Closes the open row with `description`, takes the final screenshot and recomputes the
    /// total. Returns the new total, or `None` when no stop was requested.
    ///
    /// When the row can't be written the session still ends and the final screenshot is still
    /// taken. The stopped session is then only counted in the in-memory total.
    #[instrument(skip(self))]
    pub async fn finish_stop(&mut self, description: String) -> Result<Option<WorkingTime>> {
        let TrackerState::AwaitingDescription { stopped_at, .. } = self.state else {
            debug!("Ignoring description in state {:?}", self.state);
            return Ok(None);
        };

        let stopped = self.current;
        self.state = TrackerState::Idle;
        self.current = WorkingTime::ZERO;

        let closed = self
            .log
            .update_last(vec![
                RecordField::EndTime(stopped_at),
                RecordField::Description(description),
            ])
            .await;

        self.screenshot().await;

        if let Err(e) = closed {
            self.previous_total = self.previous_total + stopped;
            return Err(e);
        }
        info!("Closed session at {stopped_at}");

        self.previous_total = load_total(&self.log).await?;
        Ok(Some(self.previous_total))
    }

    /// Switches to another work log. Only possible while idle.
    pub async fn switch_profile(&mut self, log: W) -> Result<bool> {
        if !self.is_idle() {
            debug!("Ignoring profile switch in state {:?}", self.state);
            return Ok(false);
        }
        self.previous_total = load_total(&log).await?;
        self.current = WorkingTime::ZERO;
        self.log = log;
        info!("Switched work log, total {}", self.previous_total);
        Ok(true)
    }
}

async fn load_total(log: &impl WorkLog) -> Result<WorkingTime> {
    log.ensure_exists().await?;
    let rows = log.read_all().await?;
    Ok(compute_total_elapsed(&rows))
}

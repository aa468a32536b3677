//! Drives a [SessionTracker] from the outside world: owns the two periodic timers, receives user
//! commands, asks for descriptions and reports what happened.

pub mod shutdown;

use std::time::Duration;

use anyhow::Result;
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    capture::ScreenCapturer,
    settings::Settings,
    storage::work_log::CsvWorkLog,
    tracker::{SessionTracker, TickReport, TrackerState},
    utils::{clock::Clock, time::WorkingTime},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    /// Use new settings. Rejected while a session is running.
    Reconfigure(Settings),
    Quit,
}

/// Request for the description of the session being stopped. Dropping `respond` without an
/// answer leaves the description empty.
#[derive(Debug)]
pub struct DescriptionRequest {
    pub respond: oneshot::Sender<String>,
}

/// What the user interface should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded {
        total: WorkingTime,
    },
    Started,
    Ticked(TickReport),
    Stopped {
        total: WorkingTime,
    },
    /// The settings now in use. Only these should be persisted.
    Reconfigured {
        settings: Settings,
        total: WorkingTime,
    },
    Status {
        state: TrackerState,
        current: WorkingTime,
        total: WorkingTime,
    },
    Ignored {
        reason: &'static str,
    },
    Failed {
        message: String,
    },
}

/// Two independent periodic deadlines, counted from the moment tracking started.
struct Timers {
    tracking_period: Duration,
    screenshot_period: Duration,
    next_tick: Instant,
    next_screenshot: Instant,
    armed: bool,
}

impl Timers {
    fn new(settings: &Settings, now: Instant) -> Self {
        Self {
            tracking_period: settings.tracking_period(),
            screenshot_period: settings.screenshot_period(),
            next_tick: now,
            next_screenshot: now,
            armed: false,
        }
    }

    fn arm(&mut self, now: Instant) {
        self.next_tick = now + self.tracking_period;
        self.next_screenshot = now + self.screenshot_period;
        self.armed = true;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn reconfigure(&mut self, settings: &Settings) {
        self.tracking_period = settings.tracking_period();
        self.screenshot_period = settings.screenshot_period();
    }
}

/// Channel ends the user interface holds to talk to a [SessionService].
pub struct SessionHandle {
    pub commands: mpsc::Sender<Command>,
    pub prompts: mpsc::Receiver<DescriptionRequest>,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

pub struct SessionService {
    tracker: SessionTracker<CsvWorkLog>,
    timers: Timers,
    commands: mpsc::Receiver<Command>,
    prompts: mpsc::Sender<DescriptionRequest>,
    events: mpsc::UnboundedSender<SessionEvent>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
}

/// Loads the work log named by `settings` and wires a service together with the handle that
/// controls it.
pub async fn create_session(
    settings: &Settings,
    capturer: impl ScreenCapturer + 'static,
    clock: impl Clock + Clone,
    shutdown: &CancellationToken,
) -> Result<(SessionService, SessionHandle)> {
    let tracker = SessionTracker::load(
        CsvWorkLog::new(&settings.file_path),
        Box::new(capturer),
        Box::new(clock.clone()),
    )
    .await?;

    let (command_sender, command_receiver) = mpsc::channel(8);
    let (prompt_sender, prompt_receiver) = mpsc::channel(1);
    let (event_sender, event_receiver) = mpsc::unbounded_channel();

    let service = SessionService {
        tracker,
        timers: Timers::new(settings, clock.instant()),
        commands: command_receiver,
        prompts: prompt_sender,
        events: event_sender,
        shutdown: shutdown.clone(),
        clock: Box::new(clock),
    };
    let handle = SessionHandle {
        commands: command_sender,
        prompts: prompt_receiver,
        events: event_receiver,
    };
    Ok((service, handle))
}

impl SessionService {
    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Nobody is listening to session events");
        }
    }

    fn report_error(&self, context: &str, e: anyhow::Error) {
        error!("{context}: {e:?}");
        self.emit(SessionEvent::Failed {
            message: format!("{context}: {e}"),
        });
    }

    /// Executes the session event loop. Returns after `Quit`, when every command sender is gone
    /// or on shutdown. A running session is stopped exactly once before returning.
    pub async fn run(mut self) -> Result<()> {
        self.emit(SessionEvent::Loaded {
            total: self.tracker.total_elapsed(),
        });

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => self.handle(command).await,
                },
                _ = self.clock.sleep_until(self.timers.next_tick), if self.timers.armed => {
                    self.timers.next_tick += self.timers.tracking_period;
                    self.tick().await;
                }
                _ = self.clock.sleep_until(self.timers.next_screenshot), if self.timers.armed => {
                    self.timers.next_screenshot += self.timers.screenshot_period;
                    self.tracker.screenshot().await;
                }
            }
        }

        if self.tracker.is_tracking() {
            info!("Stopping running session before exit");
            self.stop().await;
        }
        // Cancelling lets the shutdown watcher return once the service is done.
        self.shutdown.cancel();
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        debug!("Handling {command:?}");
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Status => self.emit(SessionEvent::Status {
                state: self.tracker.state(),
                current: self.tracker.current_elapsed(),
                total: self.tracker.total_elapsed(),
            }),
            Command::Reconfigure(settings) => self.reconfigure(settings).await,
            Command::Quit => {}
        }
    }

    async fn start(&mut self) {
        match self.tracker.start().await {
            Ok(true) => {
                self.timers.arm(self.clock.instant());
                self.emit(SessionEvent::Started);
            }
            Ok(false) => self.emit(SessionEvent::Ignored {
                reason: "already tracking",
            }),
            Err(e) => self.report_error("Failed to start session", e),
        }
    }

    async fn tick(&mut self) {
        match self.tracker.tick().await {
            Ok(Some(report)) => self.emit(SessionEvent::Ticked(report)),
            Ok(None) => {}
            Err(e) => self.report_error("Failed to update session", e),
        }
    }

    async fn stop(&mut self) {
        if !self.tracker.begin_stop() {
            self.emit(SessionEvent::Ignored {
                reason: "not tracking",
            });
            return;
        }
        self.timers.disarm();

        let description = self.request_description().await;
        match self.tracker.finish_stop(description).await {
            Ok(Some(total)) => self.emit(SessionEvent::Stopped { total }),
            Ok(None) => {}
            Err(e) => self.report_error("Failed to close session", e),
        }
    }

    async fn request_description(&self) -> String {
        let (respond, response) = oneshot::channel();
        if self
            .prompts
            .send(DescriptionRequest { respond })
            .await
            .is_err()
        {
            warn!("No user interface to ask for a description");
            return String::new();
        }
        response.await.unwrap_or_default()
    }

    async fn reconfigure(&mut self, settings: Settings) {
        let log = CsvWorkLog::new(&settings.file_path);
        match self.tracker.switch_profile(log).await {
            Ok(true) => {
                self.timers.reconfigure(&settings);
                self.emit(SessionEvent::Reconfigured {
                    settings,
                    total: self.tracker.total_elapsed(),
                });
            }
            Ok(false) => self.emit(SessionEvent::Ignored {
                reason: "settings can't change while tracking",
            }),
            Err(e) => self.report_error("Failed to switch work log", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::{
        capture::MockScreenCapturer,
        storage::work_log::WorkLog,
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
    );

    fn test_settings(dir: &TempDir) -> Settings {
        Settings {
            file_path: dir.path().join("work"),
            screenshot_interval: 5,
            tracking_interval: 1,
        }
    }

    fn counting_capturer(count: Arc<AtomicUsize>) -> MockScreenCapturer {
        let mut capturer = MockScreenCapturer::new();
        capturer.expect_capture().returning(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        capturer
    }

    /// Answers every description request with `description` and collects events until the
    /// service goes away.
    async fn answer_prompts(
        mut prompts: mpsc::Receiver<DescriptionRequest>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        description: &str,
    ) -> (usize, Vec<SessionEvent>) {
        let mut asked = 0;
        let mut collected = vec![];
        loop {
            tokio::select! {
                Some(request) = prompts.recv() => {
                    asked += 1;
                    let _ = request.respond.send(description.to_string());
                }
                event = events.recv() => match event {
                    Some(event) => collected.push(event),
                    None => return (asked, collected),
                },
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_and_screenshots_follow_their_periods() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let settings = test_settings(&dir);
        let shots = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let (service, handle) = create_session(
            &settings,
            counting_capturer(shots.clone()),
            TestClock::new(TEST_START_DATE),
            &shutdown,
        )
        .await?;
        let SessionHandle {
            commands,
            prompts,
            events,
        } = handle;

        let driver = async {
            commands.send(Command::Start).await?;
            // Ticks at 1..=11 minutes, screenshots at 5 and 10 minutes.
            tokio::time::sleep(Duration::from_secs(11 * 60 + 30)).await;
            commands.send(Command::Stop).await?;
            commands.send(Command::Quit).await?;
            anyhow::Ok(())
        };

        let (driver_result, service_result, (asked, events)) = tokio::join!(
            driver,
            service.run(),
            answer_prompts(prompts, events, "timers")
        );
        driver_result?;
        service_result?;

        let ticks = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Ticked(_)))
            .count();
        assert_eq!(ticks, 11);
        assert_eq!(asked, 1);
        // Start, two periodic and the final one.
        assert_eq!(shots.load(Ordering::SeqCst), 4);

        let rows = CsvWorkLog::new(&settings.file_path).read_all().await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "timers");
        assert_eq!(
            rows[0].end_time,
            TEST_START_DATE + TimeDelta::seconds(11 * 60 + 30)
        );
        assert!(matches!(
            events.last(),
            Some(SessionEvent::Stopped { total }) if total.to_string() == "00:11"
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_tracking_stops_once() -> Result<()> {
        let dir = tempdir()?;
        let settings = test_settings(&dir);
        let shots = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let (service, handle) = create_session(
            &settings,
            counting_capturer(shots.clone()),
            TestClock::new(TEST_START_DATE),
            &shutdown,
        )
        .await?;
        let SessionHandle {
            commands,
            prompts,
            events,
        } = handle;

        let driver = async {
            commands.send(Command::Start).await?;
            tokio::time::sleep(Duration::from_secs(150)).await;
            shutdown.cancel();
            anyhow::Ok(())
        };

        let (driver_result, service_result, (asked, events)) = tokio::join!(
            driver,
            service.run(),
            answer_prompts(prompts, events, "closed")
        );
        driver_result?;
        service_result?;

        assert_eq!(asked, 1);
        assert_eq!(shots.load(Ordering::SeqCst), 2);
        let stops = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Stopped { .. }))
            .count();
        assert_eq!(stops, 1);

        let rows = CsvWorkLog::new(&settings.file_path).read_all().await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "closed");
        assert_eq!(rows[0].end_time, TEST_START_DATE + TimeDelta::seconds(150));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_idle_does_not_touch_log() -> Result<()> {
        let dir = tempdir()?;
        let settings = test_settings(&dir);
        let shutdown = CancellationToken::new();
        let (service, handle) = create_session(
            &settings,
            MockScreenCapturer::new(),
            TestClock::new(TEST_START_DATE),
            &shutdown,
        )
        .await?;

        shutdown.cancel();
        let (service_result, (asked, events)) = tokio::join!(
            service.run(),
            answer_prompts(handle.prompts, handle.events, "")
        );
        service_result?;

        assert_eq!(asked, 0);
        assert_eq!(
            events,
            vec![SessionEvent::Loaded {
                total: WorkingTime::ZERO
            }]
        );
        assert!(CsvWorkLog::new(&settings.file_path).read_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_prompt_leaves_description_empty() -> Result<()> {
        let dir = tempdir()?;
        let settings = test_settings(&dir);
        let shutdown = CancellationToken::new();
        let (service, handle) = create_session(
            &settings,
            counting_capturer(Default::default()),
            TestClock::new(TEST_START_DATE),
            &shutdown,
        )
        .await?;
        let SessionHandle {
            commands,
            mut prompts,
            events,
        } = handle;

        let driver = async {
            commands.send(Command::Start).await?;
            tokio::time::sleep(Duration::from_secs(30)).await;
            commands.send(Command::Stop).await?;
            if let Some(request) = prompts.recv().await {
                drop(request);
            }
            drop(commands);
            anyhow::Ok(())
        };

        let (driver_result, service_result) = tokio::join!(driver, service.run());
        driver_result?;
        service_result?;
        drop(events);

        let rows = CsvWorkLog::new(&settings.file_path).read_all().await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_guards_and_reconfigure() -> Result<()> {
        let dir = tempdir()?;
        let settings = test_settings(&dir);
        let other = Settings {
            file_path: dir.path().join("other"),
            ..settings.clone()
        };
        let shutdown = CancellationToken::new();
        let (service, handle) = create_session(
            &settings,
            counting_capturer(Default::default()),
            TestClock::new(TEST_START_DATE),
            &shutdown,
        )
        .await?;
        let SessionHandle {
            commands,
            prompts,
            events,
        } = handle;

        let driver = async {
            commands.send(Command::Stop).await?;
            commands.send(Command::Start).await?;
            commands.send(Command::Start).await?;
            commands.send(Command::Reconfigure(other.clone())).await?;
            commands.send(Command::Stop).await?;
            commands.send(Command::Reconfigure(other.clone())).await?;
            commands.send(Command::Status).await?;
            commands.send(Command::Quit).await?;
            anyhow::Ok(())
        };

        let (driver_result, service_result, (_, events)) = tokio::join!(
            driver,
            service.run(),
            answer_prompts(prompts, events, "")
        );
        driver_result?;
        service_result?;

        assert_eq!(
            events,
            vec![
                SessionEvent::Loaded {
                    total: WorkingTime::ZERO
                },
                SessionEvent::Ignored {
                    reason: "not tracking"
                },
                SessionEvent::Started,
                SessionEvent::Ignored {
                    reason: "already tracking"
                },
                SessionEvent::Ignored {
                    reason: "settings can't change while tracking"
                },
                SessionEvent::Stopped {
                    total: WorkingTime::ZERO
                },
                SessionEvent::Reconfigured {
                    settings: other.clone(),
                    total: WorkingTime::ZERO
                },
                SessionEvent::Status {
                    state: TrackerState::Idle,
                    current: WorkingTime::ZERO,
                    total: WorkingTime::ZERO,
                },
            ]
        );
        assert!(CsvWorkLog::new(&other.file_path).table_path().exists());
        Ok(())
    }
}

use ansi_term::Colour;
use anyhow::Result;
use std::io::Write;
use tokio::{
    io::{AsyncBufRead, Lines},
    sync::oneshot,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    session::{Command, DescriptionRequest, SessionEvent, SessionHandle},
    settings::{prompt::prompt_settings, Settings, SettingsStore},
    tracker::TrackerState,
};

const HELP: &str = "Commands: start, stop, status, settings, help, quit";

/// Line based stand-in for the tracker window. Reads commands, answers description requests and
/// prints whatever the session reports.
pub struct Console<R> {
    lines: Lines<R>,
    handle: SessionHandle,
    store: SettingsStore,
    defaults: Settings,
    settings: Settings,
    tracking: bool,
    pending_description: Option<oneshot::Sender<String>>,
    input_closed: bool,
    shutdown: CancellationToken,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub fn new(
        lines: Lines<R>,
        handle: SessionHandle,
        store: SettingsStore,
        defaults: Settings,
        settings: Settings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            lines,
            handle,
            store,
            defaults,
            settings,
            tracking: false,
            pending_description: None,
            input_closed: false,
            shutdown,
        }
    }

    /// Runs until the session goes away.
    pub async fn run(mut self) -> Result<()> {
        println!("{HELP}");
        let mut prompts_open = true;
        loop {
            tokio::select! {
                event = self.handle.events.recv() => match event {
                    Some(event) => self.show(event).await,
                    None => return Ok(()),
                },
                request = self.handle.prompts.recv(), if prompts_open => match request {
                    Some(request) => self.ask_description(request),
                    None => prompts_open = false,
                },
                line = self.lines.next_line(), if !self.input_closed => match line? {
                    Some(line) => self.handle_line(&line).await?,
                    None => self.close_input().await,
                },
            }
        }
    }

    async fn send(&self, command: Command) {
        if self.handle.commands.send(command).await.is_err() {
            debug!("Session is gone, dropping command");
        }
    }

    fn ask_description(&mut self, request: DescriptionRequest) {
        if self.input_closed {
            let _ = request.respond.send(String::new());
            return;
        }
        print!("Description: ");
        let _ = std::io::stdout().flush();
        self.pending_description = Some(request.respond);
    }

    async fn handle_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if let Some(respond) = self.pending_description.take() {
            let _ = respond.send(line.to_string());
            return Ok(());
        }

        match line {
            "start" => self.send(Command::Start).await,
            "stop" => self.send(Command::Stop).await,
            "status" => self.send(Command::Status).await,
            "settings" => self.change_settings().await?,
            "quit" | "exit" => self.send(Command::Quit).await,
            "help" => println!("{HELP}"),
            "" => {}
            other => println!("Unknown command {other:?}. {HELP}"),
        }
        Ok(())
    }

    async fn change_settings(&mut self) -> Result<()> {
        if self.tracking {
            println!("{}", Colour::Yellow.paint("Stop tracking before changing settings"));
            return Ok(());
        }
        let form = prompt_settings(
            &mut self.lines,
            self.settings.clone().into(),
            &self.defaults,
            false,
        );
        let settings = tokio::select! {
            settings = form => settings?,
            _ = self.shutdown.cancelled() => {
                debug!("Settings form dropped on shutdown");
                println!();
                return Ok(());
            }
        };
        // Saved once the session reports them in use.
        self.send(Command::Reconfigure(settings)).await;
        Ok(())
    }

    async fn close_input(&mut self) {
        debug!("Input closed");
        self.input_closed = true;
        // Dropping the responder leaves the description empty.
        self.pending_description = None;
        self.send(Command::Quit).await;
    }

    async fn show(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Loaded { total } => {
                println!("Total {}", Colour::Cyan.paint(total.to_string()))
            }
            SessionEvent::Started => {
                self.tracking = true;
                println!("{} 00:00", Colour::Green.paint("Tracking"));
            }
            SessionEvent::Ticked(report) => println!(
                "Current {}  Total {}",
                Colour::Green.paint(report.current.to_string()),
                Colour::Cyan.paint(report.total.to_string())
            ),
            SessionEvent::Stopped { total } => {
                self.tracking = false;
                println!(
                    "Stopped. Total {}",
                    Colour::Cyan.paint(total.to_string())
                );
            }
            SessionEvent::Reconfigured { settings, total } => {
                if let Err(e) = self.store.save(&settings).await {
                    error!("Failed to save settings {e:?}");
                    println!("{}", Colour::Red.paint(format!("Settings not saved: {e}")));
                }
                println!(
                    "Using {:?}. Total {}",
                    settings.file_path,
                    Colour::Cyan.paint(total.to_string())
                );
                self.settings = settings;
            }
            SessionEvent::Status {
                state,
                current,
                total,
            } => {
                let state = match state {
                    TrackerState::Idle => "idle",
                    TrackerState::Tracking { .. } => "tracking",
                    TrackerState::AwaitingDescription { .. } => "stopping",
                };
                println!("State {state}  Current {current}  Total {total}");
            }
            SessionEvent::Ignored { reason } => {
                println!("{}", Colour::Yellow.paint(format!("Ignored: {reason}")))
            }
            SessionEvent::Failed { message } => {
                println!("{}", Colour::Red.paint(message))
            }
        }
    }
}

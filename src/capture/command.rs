use std::{
    env,
    ffi::OsString,
    path::Path,
    process::Stdio,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{CaptureError, ScreenCapturer};

/// Takes screenshots by running an external program. The destination path is passed as the
/// last argument.
#[derive(Debug, Clone)]
pub struct CommandCapturer {
    program: String,
    args: Vec<OsString>,
}

impl CommandCapturer {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ScreenCapturer for CommandCapturer {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn capture(&self, destination: &Path) -> Result<(), CaptureError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if status.success() {
            debug!("Saved screenshot {destination:?}");
            Ok(())
        } else {
            Err(CaptureError::CommandFailed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Picks the screenshot tool for the display server the process is attached to. Wayland sessions
/// use `grim`, X11 sessions use ImageMagick's `import`.
pub struct DisplayServerCapturer {
    wayland: CommandCapturer,
    x11: CommandCapturer,
}

pub fn display_server_capturer() -> DisplayServerCapturer {
    DisplayServerCapturer {
        wayland: CommandCapturer::new("grim", Vec::<OsString>::new()),
        x11: CommandCapturer::new("import", ["-window", "root"]),
    }
}

/// Which display server, if any, is reachable from this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
}

pub fn detect_display_server(
    wayland_display: Option<OsString>,
    x11_display: Option<OsString>,
) -> Option<DisplayServer> {
    let present = |v: &Option<OsString>| v.as_ref().is_some_and(|v| !v.is_empty());
    if present(&wayland_display) {
        Some(DisplayServer::Wayland)
    } else if present(&x11_display) {
        Some(DisplayServer::X11)
    } else {
        None
    }
}

#[async_trait]
impl ScreenCapturer for DisplayServerCapturer {
    async fn capture(&self, destination: &Path) -> Result<(), CaptureError> {
        let server =
            detect_display_server(env::var_os("WAYLAND_DISPLAY"), env::var_os("DISPLAY"));
        match server {
            Some(DisplayServer::Wayland) => self.wayland.capture(destination).await,
            Some(DisplayServer::X11) => self.x11.capture(destination).await,
            None => Err(CaptureError::NoScreen),
        }
    }
}

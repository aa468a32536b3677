//! Contains logic for taking screenshots of the user's screen.
//! [GenericScreenCapturer] is the main artifact of this module that abstracts
//! the platform differences.

pub mod command;

use std::{
    path::{Path, PathBuf},
    process::ExitStatus,
};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::debug;

use crate::utils::time::moment_to_file_name;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// There is no display surface to take a picture of.
    #[error("no capturable screen found")]
    NoScreen,
    #[error("capture command `{program}` exited with {status}")]
    CommandFailed { program: String, status: ExitStatus },
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Intended to serve as a contract every platform's screenshot mechanism must implement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScreenCapturer: Send + Sync {
    /// Saves a PNG picture of the current screen to `destination`.
    async fn capture(&self, destination: &Path) -> Result<(), CaptureError>;
}

/// Serves as a cross-compatible [ScreenCapturer] implementation.
pub struct GenericScreenCapturer {
    inner: Box<dyn ScreenCapturer>,
}

impl GenericScreenCapturer {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "macos")] {
                Self {
                    inner: Box::new(command::CommandCapturer::new("screencapture", ["-x"])),
                }
            } else if #[cfg(unix)] {
                Self {
                    inner: Box::new(command::display_server_capturer()),
                }
            } else {
                Self {
                    inner: Box::new(Unsupported),
                }
            }
        }
    }
}

impl Default for GenericScreenCapturer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScreenCapturer for GenericScreenCapturer {
    async fn capture(&self, destination: &Path) -> Result<(), CaptureError> {
        self.inner.capture(destination).await
    }
}

/// Used on platforms without a known screenshot tool. Every capture is skipped.
#[allow(dead_code)]
struct Unsupported;

#[async_trait]
impl ScreenCapturer for Unsupported {
    async fn capture(&self, _destination: &Path) -> Result<(), CaptureError> {
        Err(CaptureError::NoScreen)
    }
}

/// Path of a screenshot taken at `moment`: `<dir>/YYYY-MM-DD_HH:MM:SS.png`.
pub fn screenshot_path(dir: &Path, moment: NaiveDateTime) -> PathBuf {
    dir.join(format!("{}.png", moment_to_file_name(moment)))
}

/// Creates the screenshot directory when it's missing and saves a picture into it.
pub async fn take_screenshot(
    capturer: &dyn ScreenCapturer,
    dir: &Path,
    moment: NaiveDateTime,
) -> Result<PathBuf, CaptureError> {
    tokio::fs::create_dir_all(dir).await?;
    let destination = screenshot_path(dir, moment);
    debug!("Capturing screen into {destination:?}");
    capturer.capture(&destination).await?;
    Ok(destination)
}

//! Persisted configuration of the tracker. Settings are kept as a small JSON key/value file in
//! the application directory. Any missing key is asked for before tracking can begin.

pub mod prompt;

use std::{
    io::ErrorKind,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::utils::time::moment_to_file_name;

/// Allowed values of both intervals, in minutes.
pub const INTERVAL_RANGE: RangeInclusive<u32> = 1..=60;

pub const DEFAULT_SCREENSHOT_INTERVAL: u32 = 30;
pub const DEFAULT_TRACKING_INTERVAL: u32 = 1;

const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base path of the profile, without extension.
    #[serde(rename = "FilePath")]
    pub file_path: PathBuf,
    /// Minutes between screenshots.
    #[serde(rename = "ScreenShotInterval")]
    pub screenshot_interval: u32,
    /// Minutes between updates of the open row.
    #[serde(rename = "TrackingInterval")]
    pub tracking_interval: u32,
}

impl Settings {
    /// Defaults of a first run. The profile is named after the launch time so that a new
    /// installation never appends to somebody else's table.
    pub fn defaults(application_dir: &Path, launched_at: NaiveDateTime) -> Self {
        Self {
            file_path: application_dir.join(moment_to_file_name(launched_at)),
            screenshot_interval: DEFAULT_SCREENSHOT_INTERVAL,
            tracking_interval: DEFAULT_TRACKING_INTERVAL,
        }
    }

    pub fn tracking_period(&self) -> Duration {
        minutes(self.tracking_interval)
    }

    pub fn screenshot_period(&self) -> Duration {
        minutes(self.screenshot_interval)
    }
}

fn minutes(value: u32) -> Duration {
    Duration::from_secs(u64::from(value) * 60)
}

/// Settings as found on disk, where any key may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSettings {
    #[serde(rename = "FilePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(
        rename = "ScreenShotInterval",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub screenshot_interval: Option<u32>,
    #[serde(
        rename = "TrackingInterval",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tracking_interval: Option<u32>,
}

impl PartialSettings {
    pub fn is_complete(&self) -> bool {
        self.file_path.is_some()
            && self.screenshot_interval.is_some()
            && self.tracking_interval.is_some()
    }

    /// Fills every missing key from `defaults`. Out of range intervals are clamped.
    pub fn or_defaults(self, defaults: &Settings) -> Settings {
        Settings {
            file_path: self
                .file_path
                .unwrap_or_else(|| defaults.file_path.clone()),
            screenshot_interval: clamp_interval(
                "ScreenShotInterval",
                self.screenshot_interval
                    .unwrap_or(defaults.screenshot_interval),
            ),
            tracking_interval: clamp_interval(
                "TrackingInterval",
                self.tracking_interval.unwrap_or(defaults.tracking_interval),
            ),
        }
    }
}

impl From<Settings> for PartialSettings {
    fn from(value: Settings) -> Self {
        Self {
            file_path: Some(value.file_path),
            screenshot_interval: Some(value.screenshot_interval),
            tracking_interval: Some(value.tracking_interval),
        }
    }
}

fn clamp_interval(key: &str, value: u32) -> u32 {
    let clamped = value.clamp(*INTERVAL_RANGE.start(), *INTERVAL_RANGE.end());
    if clamped != value {
        warn!("{key} of {value} minutes is out of range, using {clamped}");
    }
    clamped
}

/// Key/value store for [Settings], backed by `settings.json`.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(application_dir: &Path) -> Self {
        Self {
            path: application_dir.join(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads whatever is stored. A missing or unreadable file counts as no stored keys.
    pub async fn load(&self) -> Result<PartialSettings> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => match serde_json::from_slice(&content) {
                Ok(settings) => Ok(settings),
                Err(e) => {
                    warn!("Ignoring corrupted settings {:?}: {e}", self.path);
                    Ok(PartialSettings::default())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PartialSettings::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {:?}", self.path))?;
        info!("Saved settings {settings:?}");
        Ok(())
    }
}

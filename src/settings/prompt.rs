use std::{io::Write, path::PathBuf};

use anyhow::Result;
use tokio::io::{AsyncBufRead, Lines};
use tracing::info;

use super::{PartialSettings, Settings, SettingsStore, INTERVAL_RANGE};

/// Asks a single question. Empty answers and the end of input mean "keep the default".
async fn ask<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    question: &str,
    default: &str,
) -> Result<Option<String>> {
    print!("{question} [{default}]: ");
    std::io::stdout().flush()?;
    Ok(lines
        .next_line()
        .await?
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty()))
}

async fn ask_interval<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    question: &str,
    default: u32,
) -> Result<u32> {
    loop {
        let Some(answer) = ask(lines, question, &default.to_string()).await? else {
            return Ok(default);
        };
        match answer.parse::<u32>() {
            Ok(value) if INTERVAL_RANGE.contains(&value) => return Ok(value),
            _ => println!(
                "Expected a number of minutes between {} and {}",
                INTERVAL_RANGE.start(),
                INTERVAL_RANGE.end()
            ),
        }
    }
}

/// Interactive settings form. With `only_missing` set, keys already present in `current` are
/// kept without asking. Values shown in brackets are used when the answer is empty.
pub async fn prompt_settings<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    current: PartialSettings,
    defaults: &Settings,
    only_missing: bool,
) -> Result<Settings> {
    let shown = current.clone().or_defaults(defaults);
    let shown_path = shown.file_path.to_string_lossy().to_string();

    let file_path = match current.file_path {
        Some(path) if only_missing => path,
        _ => ask(lines, "File path", &shown_path)
            .await?
            .map(PathBuf::from)
            .unwrap_or(shown.file_path),
    };

    let screenshot_interval = match current.screenshot_interval {
        Some(_) if only_missing => shown.screenshot_interval,
        _ => ask_interval(lines, "Screenshot interval, minutes", shown.screenshot_interval).await?,
    };

    let tracking_interval = match current.tracking_interval {
        Some(_) if only_missing => shown.tracking_interval,
        _ => ask_interval(lines, "Tracking interval, minutes", shown.tracking_interval).await?,
    };

    Ok(Settings {
        file_path,
        screenshot_interval,
        tracking_interval,
    })
}

/// Loads the stored settings. When any key is missing the user is asked for it before anything
/// else happens, and the completed settings are saved.
pub async fn load_or_prompt<R: AsyncBufRead + Unpin>(
    store: &SettingsStore,
    defaults: &Settings,
    lines: &mut Lines<R>,
) -> Result<Settings> {
    let stored = store.load().await?;
    if stored.is_complete() {
        return Ok(stored.or_defaults(defaults));
    }

    info!("Settings in {:?} are incomplete, asking", store.path());
    println!("Some settings are missing. Press enter to keep the value in brackets.");
    let settings = prompt_settings(lines, stored, defaults, true).await?;
    store.save(&settings).await?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tempfile::tempdir;
    use tokio::io::AsyncBufReadExt;

    use super::*;

    const LAUNCH: NaiveDateTime = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
    );

    #[tokio::test]
    async fn test_only_missing_keys_are_asked() -> Result<()> {
        let defaults = Settings::defaults(Path::new("/state"), LAUNCH);
        let current = PartialSettings {
            file_path: Some("/work/log".into()),
            ..Default::default()
        };
        // Screenshot interval first, then tracking interval.
        let mut lines = "15\n\n".as_bytes().lines();

        let settings = prompt_settings(&mut lines, current, &defaults, true).await?;

        assert_eq!(
            settings,
            Settings {
                file_path: "/work/log".into(),
                screenshot_interval: 15,
                tracking_interval: 1,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_interval_is_asked_again() -> Result<()> {
        let defaults = Settings::defaults(Path::new("/state"), LAUNCH);
        let mut lines = "/work/log\n0\nten\n61\n45\n5\n".as_bytes().lines();

        let settings =
            prompt_settings(&mut lines, PartialSettings::default(), &defaults, false).await?;

        assert_eq!(settings.screenshot_interval, 45);
        assert_eq!(settings.tracking_interval, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_end_of_input_fills_defaults() -> Result<()> {
        let defaults = Settings::defaults(Path::new("/state"), LAUNCH);
        let mut lines = "".as_bytes().lines();

        let settings =
            prompt_settings(&mut lines, PartialSettings::default(), &defaults, false).await?;

        assert_eq!(settings, defaults);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_run_saves_prompted_settings() -> Result<()> {
        let dir = tempdir()?;
        let store = SettingsStore::new(dir.path());
        let defaults = Settings::defaults(dir.path(), LAUNCH);
        let mut lines = "\n5\n2\n".as_bytes().lines();

        let settings = load_or_prompt(&store, &defaults, &mut lines).await?;

        assert_eq!(settings.file_path, defaults.file_path);
        assert_eq!(store.load().await?, settings.clone().into());

        // Nothing is asked once every key is stored.
        let mut no_input = "".as_bytes().lines();
        assert_eq!(load_or_prompt(&store, &defaults, &mut no_input).await?, settings);
        Ok(())
    }
}

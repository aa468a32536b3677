use std::{
    ffi::OsString,
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, info, instrument};

use super::entities::{RecordField, SessionRecord, HEADER};

#[derive(Debug, Error)]
pub enum WorkLogError {
    /// A row that doesn't follow the table schema. The whole load fails.
    #[error("malformed row at line {line} of {path:?}: {source}")]
    Parse {
        path: PathBuf,
        line: u64,
        source: csv::Error,
    },
    #[error("work log {0:?} has no row to update")]
    EmptyTable(PathBuf),
    #[error("I/O error on work log: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error on work log: {0}")]
    Csv(#[from] csv::Error),
}

/// Interface for abstracting storage of session records.
pub trait WorkLog {
    /// Creates a header-only table if none exists. Existing tables are left untouched.
    fn ensure_exists(&self) -> impl Future<Output = Result<()>>;

    /// Adds a row at the end of the table. The row becomes the open row.
    fn append(&self, record: SessionRecord) -> impl Future<Output = Result<()>>;

    /// Overwrites fields of the most recently appended row in a single write.
    fn update_last(&self, fields: Vec<RecordField>) -> impl Future<Output = Result<()>>;

    /// Loads every row. A single malformed row fails the load.
    fn read_all(&self) -> impl Future<Output = Result<Vec<SessionRecord>>>;

    /// Directory where screenshots of this profile are saved.
    fn screenshot_dir(&self) -> &Path;
}

/// The main realization of [WorkLog]: a CSV table next to a screenshot directory of the same
/// base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvWorkLog {
    table: PathBuf,
    screenshots: PathBuf,
}

impl CsvWorkLog {
    /// `base` is the profile path without extension.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let screenshots = base.into();
        let mut table = OsString::from(screenshots.as_os_str());
        table.push(".csv");
        Self {
            table: PathBuf::from(table),
            screenshots,
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table
    }

    async fn modify<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<SessionRecord>) -> Result<(), WorkLogError>,
    {
        self.ensure_exists().await?;
        let mut file = File::options()
            .read(true)
            .write(true)
            .open(&self.table)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::modify_with_file(&self.table, &mut file, change).await;
        file.unlock_async().await?;
        Ok(result?)
    }

    async fn modify_with_file<F>(path: &Path, file: &mut File, change: F) -> Result<(), WorkLogError>
    where
        F: FnOnce(&mut Vec<SessionRecord>) -> Result<(), WorkLogError>,
    {
        // The table is small, so every change is a full read-modify-write.
        let mut content = Vec::new();
        file.read_to_end(&mut content).await?;
        let mut rows = parse_rows(path, &content)?;

        change(&mut rows)?;

        let buffer = render_rows(&rows)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

impl WorkLog for CsvWorkLog {
    async fn ensure_exists(&self) -> Result<()> {
        if let Some(parent) = self.table.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        match File::options()
            .write(true)
            .create_new(true)
            .open(&self.table)
            .await
        {
            Ok(mut file) => {
                file.write_all(&render_rows(&[])?).await?;
                file.flush().await?;
                info!("Created work log {:?}", self.table);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(table = ?self.table))]
    async fn append(&self, record: SessionRecord) -> Result<()> {
        self.modify(move |rows| {
            rows.push(record);
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(table = ?self.table))]
    async fn update_last(&self, fields: Vec<RecordField>) -> Result<()> {
        let table = self.table.clone();
        self.modify(move |rows| {
            let last = rows.last_mut().ok_or(WorkLogError::EmptyTable(table))?;
            for field in fields {
                last.apply(field);
            }
            Ok(())
        })
        .await
    }

    async fn read_all(&self) -> Result<Vec<SessionRecord>> {
        async fn extract(path: &Path) -> Result<Vec<SessionRecord>, WorkLogError> {
            debug!("Extracting {path:?}");
            let mut file = File::open(path).await?;
            file.lock_shared()?;
            let mut content = Vec::new();
            let read = file.read_to_end(&mut content).await;
            file.unlock_async().await?;
            read?;
            parse_rows(path, &content)
        }

        match extract(&self.table).await {
            Ok(rows) => Ok(rows),
            Err(WorkLogError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e.into()),
        }
    }

    fn screenshot_dir(&self) -> &Path {
        &self.screenshots
    }
}

fn parse_rows(path: &Path, content: &[u8]) -> Result<Vec<SessionRecord>, WorkLogError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content);
    reader
        .deserialize::<SessionRecord>()
        .map(|row| {
            row.map_err(|source| WorkLogError::Parse {
                path: path.to_path_buf(),
                line: source.position().map_or(0, |p| p.line()),
                source,
            })
        })
        .collect()
}

fn render_rows(rows: &[SessionRecord]) -> Result<Vec<u8>, WorkLogError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

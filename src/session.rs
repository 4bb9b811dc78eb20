//! Shared state for one sync run: directory layout, URL construction, the
//! HTTP transport, and the access-window policy.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::errors::SyncError;
use crate::models::{FilingRecord, Quarter};
use crate::transport::Transport;
use crate::window::AccessWindow;

/// Subdirectory of the data dir holding cached quarterly indexes.
const INDEX_DIR: &str = "master_indexes";

pub struct Session {
    data_dir: PathBuf,
    index_dir: PathBuf,
    archives_url: String,
    request_delay: Duration,
    transport: Transport,
    window: AccessWindow,
}

impl Session {
    pub fn new(config: &Config) -> Result<Session, SyncError> {
        let data_dir = config.data_dir.clone();
        let index_dir = data_dir.join(INDEX_DIR);
        fs::create_dir_all(&index_dir)?;
        Ok(Session {
            data_dir,
            index_dir,
            archives_url: config.archives_url.trim_end_matches('/').to_string(),
            request_delay: config.request_delay(),
            transport: Transport::new(config.transport_config())?,
            window: AccessWindow::default(),
        })
    }

    #[cfg(test)]
    pub fn with_access_window(mut self, window: AccessWindow) -> Session {
        self.window = window;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn access_window(&self) -> &AccessWindow {
        &self.window
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Local cache path of a quarter's master index.
    pub fn index_path(&self, quarter: Quarter) -> PathBuf {
        self.index_dir.join(quarter.index_file_name())
    }

    /// Upstream URL of a quarter's zipped master index.
    pub fn index_url(&self, quarter: Quarter) -> String {
        format!(
            "{}/edgar/full-index/{}/QTR{}/master.zip",
            self.archives_url, quarter.year, quarter.quarter
        )
    }

    /// Upstream URL of one filing's complete submission text file.
    pub fn filing_url(&self, record: &FilingRecord) -> String {
        format!(
            "{}/{}",
            self.archives_url,
            record.filename.trim_start_matches('/')
        )
    }

    /// Where a filing lives in the local mirror. Grouped by form type (with
    /// the `/` of amended forms dropped so each form is one directory), named
    /// `{zero-padded CIK}_{quarter filed}_{remote basename}` so one directory
    /// sorts by filer.
    pub fn artifact_path(&self, record: &FilingRecord) -> PathBuf {
        let form_dir = record.form_type.replace('/', "");
        let quarter = Quarter::from_date(record.date_filed);
        let basename = record
            .filename
            .rsplit('/')
            .next()
            .unwrap_or(&record.filename);
        self.data_dir.join(form_dir).join(format!(
            "{:0>10}_{}_{}",
            record.cik, quarter, basename
        ))
    }
}

/// Write `bytes` to `path` through a temp file in the same directory, so a
/// crash mid-write never leaves a truncated file at the final name.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target path has no parent")
    })?;
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

//! Quarterly master-index cache: fetching, storing, and loading the catalog.
//!
//! EDGAR publishes one pipe-delimited `master.idx` per quarter inside a zip
//! archive. We cache the extracted text under `master_indexes/{year}Q{n}.txt`
//! and treat those files as the local source of truth for what exists
//! upstream.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::errors::SyncError;
use crate::models::{FilingRecord, Quarter};
use crate::session::{self, Session};

/// In-memory catalog, ordered by quarter.
pub type Catalog = BTreeMap<Quarter, Vec<FilingRecord>>;

/// Name of the index member inside each quarterly zip archive.
const INDEX_MEMBER: &str = "master.idx";

#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// This many quarters at the tail of the range are re-downloaded even
    /// when cached; EDGAR keeps amending recent indexes after quarter end.
    pub update_range: usize,
    /// Re-download every quarter in the range.
    pub update_all: bool,
}

impl Default for RefreshOptions {
    fn default() -> RefreshOptions {
        RefreshOptions {
            update_range: 2,
            update_all: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub downloaded: usize,
    pub skipped: usize,
    /// Quarters whose refresh failed; the rest of the range is unaffected.
    pub failures: Vec<(Quarter, SyncError)>,
}

enum RefreshAction {
    Downloaded,
    Skipped,
}

/// Bring the local index cache up to date for `quarters`. One quarter failing
/// records a failure and moves on, so a long backfill survives a flaky hour.
pub async fn refresh_indexes<F>(
    session: &Session,
    quarters: &[Quarter],
    opts: &RefreshOptions,
    mut progress: F,
) -> RefreshOutcome
where
    F: FnMut(usize, usize),
{
    let mut outcome = RefreshOutcome::default();
    for (idx, &quarter) in quarters.iter().enumerate() {
        let force = is_forced(idx, quarters.len(), opts);
        match refresh_quarter(session, quarter, force).await {
            Ok(RefreshAction::Downloaded) => {
                outcome.downloaded += 1;
                info!("Downloaded master index for {}", quarter);
                tokio::time::sleep(session.request_delay()).await;
            }
            Ok(RefreshAction::Skipped) => {
                outcome.skipped += 1;
                debug!("Master index for {} already cached", quarter);
            }
            Err(err) => {
                warn!("Index refresh for {} failed: {}", quarter, err);
                outcome.failures.push((quarter, err));
            }
        }
        progress(idx + 1, quarters.len());
    }
    outcome
}

fn is_forced(idx: usize, len: usize, opts: &RefreshOptions) -> bool {
    opts.update_all || idx + opts.update_range >= len
}

async fn refresh_quarter(
    session: &Session,
    quarter: Quarter,
    force: bool,
) -> Result<RefreshAction, SyncError> {
    let path = session.index_path(quarter);
    if !force && path.is_file() {
        return Ok(RefreshAction::Skipped);
    }
    let url = session.index_url(quarter);
    let body = session
        .transport()
        .get(&url, None)
        .await
        .map_err(SyncError::IndexFetch)?;
    let mut archive = ZipArchive::new(Cursor::new(body))?;
    let mut member = archive.by_name(INDEX_MEMBER)?;
    let mut raw = Vec::with_capacity(member.size() as usize);
    member.read_to_end(&mut raw)?;
    // Old quarters carry Latin-1 company names; store a clean UTF-8 cache so
    // later parsing never has to care.
    let text = String::from_utf8_lossy(&raw);
    session::write_atomic(&path, text.as_bytes())?;
    Ok(RefreshAction::Downloaded)
}

/// Load the cached indexes for `quarters` into memory. Every requested
/// quarter must be cached; otherwise the missing ones are reported in one
/// error so the caller can fix the cache with a single index run.
pub fn load_catalog(session: &Session, quarters: &[Quarter]) -> Result<Catalog, SyncError> {
    let missing: Vec<Quarter> = quarters
        .iter()
        .copied()
        .filter(|&q| !session.index_path(q).is_file())
        .collect();
    if !missing.is_empty() {
        return Err(SyncError::MissingIndexes(missing));
    }
    let mut catalog = Catalog::new();
    for &quarter in quarters {
        let file = File::open(session.index_path(quarter))?;
        let table = parse_index(BufReader::new(file))?;
        debug!(
            "Loaded {} filings for {} ({} rows skipped, {} duplicates)",
            table.records.len(),
            quarter,
            table.skipped_rows,
            table.duplicates
        );
        catalog.insert(quarter, table.records);
    }
    Ok(catalog)
}

struct IndexTable {
    records: Vec<FilingRecord>,
    skipped_rows: usize,
    duplicates: usize,
}

/// Parse a cached master index. The file opens with a free-text preamble, a
/// header row, and a dashed separator; rather than counting preamble lines we
/// keep any row that looks like data (five pipe-separated fields, numeric
/// CIK, ISO date) and skip the rest. Duplicate filenames collapse to the
/// first occurrence.
fn parse_index<R: Read>(reader: R) -> Result<IndexTable, SyncError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);
    let mut seen = HashSet::new();
    let mut table = IndexTable {
        records: Vec::new(),
        skipped_rows: 0,
        duplicates: 0,
    };
    for row in csv_reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(err) => match err.into_kind() {
                csv::ErrorKind::Io(io_err) => return Err(SyncError::Io(io_err)),
                _ => {
                    table.skipped_rows += 1;
                    continue;
                }
            },
        };
        let Some(record) = record_from_row(&row) else {
            table.skipped_rows += 1;
            continue;
        };
        if seen.insert(record.filename.clone()) {
            table.records.push(record);
        } else {
            table.duplicates += 1;
        }
    }
    Ok(table)
}

fn record_from_row(row: &csv::StringRecord) -> Option<FilingRecord> {
    if row.len() != 5 {
        return None;
    }
    let cik = row.get(0)?.trim();
    if cik.is_empty() || !cik.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let company_name = row.get(1)?.trim();
    let form_type = row.get(2)?.trim();
    if form_type.is_empty() {
        return None;
    }
    let date_filed = NaiveDate::parse_from_str(row.get(3)?.trim(), "%Y-%m-%d").ok()?;
    let filename = row.get(4)?.trim();
    if filename.is_empty() {
        return None;
    }
    Some(FilingRecord {
        cik: cik.to_string(),
        company_name: company_name.to_string(),
        form_type: form_type.to_string(),
        date_filed,
        filename: filename.to_string(),
    })
}

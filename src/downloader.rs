//! Retrieval engine: walks a plan period by period and fills in the gaps.
//!
//! The engine is deliberately sequential. EDGAR's fair-access policy is per
//! client, not per connection, so parallel fetches buy throttling rather
//! than throughput; one polite request at a time with a courtesy delay is
//! the fastest sustainable pace.

use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::models::{DownloadOutcome, DownloadPlan, FailedItem, PlannedItem, Quarter};
use crate::session::{self, Session};
use crate::stripper::{self, StripPolicy};

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Run outside the overnight access window.
    pub ignore_time_window: bool,
    /// Strip binary attachments before writing, when set.
    pub strip: Option<StripPolicy>,
}

/// Progress callbacks emitted while the engine runs, for whatever frontend
/// is watching: a progress bar, a log line, or a test.
#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent {
    PeriodStarted {
        quarter: Quarter,
        to_fetch: usize,
        present: usize,
    },
    ItemFinished {
        quarter: Quarter,
        done: usize,
        total: usize,
        elapsed: Duration,
        eta: Duration,
    },
    PeriodFinished {
        quarter: Quarter,
        downloaded: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Run a plan to completion. Item failures are recorded and the run carries
/// on; only a closed access window aborts, since continuing would violate
/// the host's terms rather than just miss a file.
pub async fn execute<F>(
    session: &Session,
    plan: &DownloadPlan,
    opts: &DownloadOptions,
    mut progress: F,
) -> Result<DownloadOutcome, SyncError>
where
    F: FnMut(ProgressEvent),
{
    if !opts.ignore_time_window {
        session.access_window().check(Utc::now())?;
    }
    let mut outcome = DownloadOutcome::default();
    for period in &plan.periods {
        // A long run can outlive the window it started in.
        if !opts.ignore_time_window {
            session.access_window().check(Utc::now())?;
        }
        let total = period.missing.len();
        outcome.targeted += period.present.len() + total;
        outcome.present += period.present.len();
        progress(ProgressEvent::PeriodStarted {
            quarter: period.quarter,
            to_fetch: total,
            present: period.present.len(),
        });
        let started = Instant::now();
        let (mut downloaded, mut skipped, mut failed) = (0usize, 0usize, 0usize);
        for (index, item) in period.missing.iter().enumerate() {
            // The plan may be stale by the time we get here; never refetch
            // what another run already brought down.
            if item.path.is_file() {
                debug!("Already on disk, skipping {}", item.path.display());
                skipped += 1;
                outcome.present += 1;
            } else {
                let url = session.filing_url(&item.record);
                match fetch_item(session, item, &url, opts).await {
                    Ok(stripped) => {
                        downloaded += 1;
                        outcome.downloaded += 1;
                        outcome.bytes_stripped += stripped;
                        debug!("Downloaded {}", item.path.display());
                    }
                    Err(err) => {
                        failed += 1;
                        record_failure(&mut outcome, item, &url, err);
                    }
                }
                tokio::time::sleep(session.request_delay()).await;
            }
            let elapsed = started.elapsed();
            let done = index + 1;
            progress(ProgressEvent::ItemFinished {
                quarter: period.quarter,
                done,
                total,
                elapsed,
                eta: estimate_remaining(elapsed, done, total),
            });
        }
        info!(
            "{}: downloaded {}, skipped {}, failed {}",
            period.quarter, downloaded, skipped, failed
        );
        progress(ProgressEvent::PeriodFinished {
            quarter: period.quarter,
            downloaded,
            skipped,
            failed,
        });
    }
    Ok(outcome)
}

/// Fetch one filing, optionally strip it, and write it into place. Returns
/// how many bytes stripping removed.
async fn fetch_item(
    session: &Session,
    item: &PlannedItem,
    url: &str,
    opts: &DownloadOptions,
) -> Result<u64, SyncError> {
    // The filing's index page is the natural referer for its .txt container.
    let referer = url
        .strip_suffix(".txt")
        .map(|stem| format!("{stem}-index.html"));
    let body = session
        .transport()
        .get(url, referer.as_deref())
        .await
        .map_err(SyncError::ItemFetch)?;
    let text = String::from_utf8_lossy(&body);
    match &opts.strip {
        Some(policy) => {
            let kept = stripper::strip_attachments(&text, policy);
            let removed = (text.len() - kept.len()) as u64;
            session::write_atomic(&item.path, kept.as_bytes())?;
            Ok(removed)
        }
        None => {
            session::write_atomic(&item.path, text.as_bytes())?;
            Ok(0)
        }
    }
}

fn record_failure(outcome: &mut DownloadOutcome, item: &PlannedItem, url: &str, err: SyncError) {
    match &err {
        SyncError::ItemFetch(fetch) if fetch.is_permanent() => {
            warn!("Permanent failure for {}: {}", url, fetch);
        }
        other => warn!("Failed to download {}: {}", url, other),
    }
    outcome.failed.push(FailedItem {
        cik: item.record.cik.clone(),
        form_type: item.record.form_type.clone(),
        url: url.to_string(),
        error: err.to_string(),
    });
}

/// Naive ETA: mean time per finished item times what is left.
fn estimate_remaining(elapsed: Duration, done: usize, total: usize) -> Duration {
    if done == 0 || total <= done {
        return Duration::ZERO;
    }
    let mean = elapsed / done as u32;
    mean * (total - done) as u32
}

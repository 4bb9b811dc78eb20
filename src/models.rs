use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::errors::SyncError;

/// A calendar quarter, the unit EDGAR publishes its full-text indexes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Quarter {
    pub year: i32,
    pub quarter: u8,
}

impl Quarter {
    /// EDGAR full-index coverage starts here; earlier quarters do not exist upstream.
    pub const EARLIEST: Quarter = Quarter {
        year: 1994,
        quarter: 1,
    };

    pub fn from_date(date: NaiveDate) -> Quarter {
        Quarter {
            year: date.year(),
            quarter: (date.month0() / 3 + 1) as u8,
        }
    }

    pub fn current() -> Quarter {
        Quarter::from_date(Utc::now().date_naive())
    }

    pub fn succ(self) -> Quarter {
        if self.quarter == 4 {
            Quarter {
                year: self.year + 1,
                quarter: 1,
            }
        } else {
            Quarter {
                year: self.year,
                quarter: self.quarter + 1,
            }
        }
    }

    /// File name the cached index is stored under, e.g. `2021Q3.txt`.
    pub fn index_file_name(self) -> String {
        format!("{self}.txt")
    }

    pub fn range_inclusive(start: Quarter, end: Quarter) -> QuarterRange {
        QuarterRange {
            next: (start <= end).then_some(start),
            end,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// Ascending iterator over quarters, inclusive of both endpoints.
pub struct QuarterRange {
    next: Option<Quarter>,
    end: Quarter,
}

impl Iterator for QuarterRange {
    type Item = Quarter;

    fn next(&mut self) -> Option<Quarter> {
        let current = self.next?;
        self.next = (current < self.end).then(|| current.succ());
        Some(current)
    }
}

/// One row of a quarterly master index: a single filing accepted by EDGAR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingRecord {
    pub cik: String,
    pub company_name: String,
    pub form_type: String,
    pub date_filed: NaiveDate,
    pub filename: String,
}

/// What the user asked for: which forms, over which span of quarters.
///
/// Validated on construction; an open end means "through the current quarter",
/// resolved when the range is iterated so long-running processes stay honest.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    forms: Vec<String>,
    start: Quarter,
    end: Option<Quarter>,
}

impl DownloadRequest {
    pub fn new(
        forms: Vec<String>,
        start: Quarter,
        end: Option<Quarter>,
    ) -> Result<DownloadRequest, SyncError> {
        if forms.iter().all(|form| form.trim().is_empty()) {
            return Err(SyncError::NoTargetForms);
        }
        if let Some(end) = end {
            if start > end {
                return Err(SyncError::InvalidRange { start, end });
            }
        }
        Ok(DownloadRequest { forms, start, end })
    }

    pub fn forms(&self) -> &[String] {
        &self.forms
    }

    pub fn start(&self) -> Quarter {
        self.start
    }

    pub fn effective_end(&self) -> Quarter {
        self.end.unwrap_or_else(Quarter::current)
    }

    pub fn quarters(&self) -> QuarterRange {
        Quarter::range_inclusive(self.start, self.effective_end())
    }
}

/// Full work list for one request, split by quarter and by on-disk state.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    /// Concrete form types after group expansion, in first-mention order.
    pub forms: Vec<String>,
    pub periods: Vec<PeriodPlan>,
}

impl DownloadPlan {
    pub fn total_missing(&self) -> usize {
        self.periods.iter().map(|p| p.missing.len()).sum()
    }

    pub fn total_present(&self) -> usize {
        self.periods.iter().map(|p| p.present.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PeriodPlan {
    pub quarter: Quarter,
    pub present: Vec<PlannedItem>,
    pub missing: Vec<PlannedItem>,
}

impl PeriodPlan {
    pub fn new(quarter: Quarter) -> PeriodPlan {
        PeriodPlan {
            quarter,
            present: Vec::new(),
            missing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub record: FilingRecord,
    /// Where the filing will live in the local mirror.
    pub path: PathBuf,
}

/// Tally of one engine run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadOutcome {
    /// Everything the plan covered, present or not.
    pub targeted: usize,
    /// Items already on disk, counting both plan-time and re-check skips.
    pub present: usize,
    pub downloaded: usize,
    pub bytes_stripped: u64,
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub cik: String,
    pub form_type: String,
    pub url: String,
    pub error: String,
}

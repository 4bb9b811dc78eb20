//! Turns a request plus the loaded catalog into a concrete work list.
//!
//! Planning is pure bookkeeping: no network, just catalog filtering and an
//! existence check against the local mirror. The same plan feeds both the
//! dry-run summary and the download engine.

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::forms;
use crate::models::{DownloadPlan, DownloadRequest, PeriodPlan, PlannedItem};
use crate::session::Session;

/// Rule-of-thumb estimate: one polite request per second.
pub const EST_SECONDS_PER_FILE: u64 = 1;
/// Rule-of-thumb estimate: the average stripped filing is ~150KB.
pub const EST_BYTES_PER_FILE: u64 = 150_000;

/// Build the work list for `request`: walk its quarters in order, keep the
/// catalog rows whose form type matches the expanded filter, and split them
/// by whether the artifact already exists locally.
pub fn build_plan(session: &Session, request: &DownloadRequest, catalog: &Catalog) -> DownloadPlan {
    let effective = forms::expand_forms(request.forms());
    let wanted: HashSet<String> = effective.iter().map(|f| f.to_ascii_lowercase()).collect();
    let mut periods = Vec::new();
    for quarter in request.quarters() {
        let mut period = PeriodPlan::new(quarter);
        if let Some(rows) = catalog.get(&quarter) {
            for row in rows {
                if !wanted.contains(&row.form_type.to_ascii_lowercase()) {
                    continue;
                }
                let item = PlannedItem {
                    path: session.artifact_path(row),
                    record: row.clone(),
                };
                if item.path.is_file() {
                    period.present.push(item);
                } else {
                    period.missing.push(item);
                }
            }
        }
        periods.push(period);
    }
    DownloadPlan {
        forms: effective,
        periods,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub periods: usize,
    pub per_form: Vec<FormCount>,
    pub total_missing: usize,
    pub total_present: usize,
    pub est_seconds: u64,
    pub est_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormCount {
    pub form: String,
    pub missing: usize,
}

/// Roll a plan up into the numbers shown before a download: how much is
/// left to fetch per form, and ballpark time and disk figures.
pub fn summarize(plan: &DownloadPlan) -> PlanSummary {
    let mut per_form: Vec<FormCount> = plan
        .forms
        .iter()
        .map(|form| FormCount {
            form: form.clone(),
            missing: 0,
        })
        .collect();
    for period in &plan.periods {
        for item in &period.missing {
            if let Some(count) = per_form
                .iter_mut()
                .find(|c| c.form.eq_ignore_ascii_case(&item.record.form_type))
            {
                count.missing += 1;
            }
        }
    }
    let total_missing = plan.total_missing();
    PlanSummary {
        periods: plan.periods.len(),
        per_form,
        total_missing,
        total_present: plan.total_present(),
        est_seconds: total_missing as u64 * EST_SECONDS_PER_FILE,
        est_bytes: total_missing as u64 * EST_BYTES_PER_FILE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::models::{FilingRecord, Quarter};
    use crate::session::{self, tests::test_config};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(cik: u64, form: &str, filename: &str) -> FilingRecord {
        FilingRecord {
            cik: cik.to_string(),
            company_name: format!("COMPANY {cik}"),
            form_type: form.to_string(),
            date_filed: NaiveDate::from_ymd_opt(2021, 8, 13).unwrap(),
            filename: filename.to_string(),
        }
    }

    fn q(year: i32, quarter: u8) -> Quarter {
        Quarter { year, quarter }
    }

    #[test]
    fn plan_splits_present_and_missing() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let on_disk = record(1000, "10-K", "edgar/data/1000/a.txt");
        let absent = record(2000, "10-K", "edgar/data/2000/b.txt");
        session::write_atomic(&session.artifact_path(&on_disk), b"cached").unwrap();

        let mut catalog = Catalog::new();
        catalog.insert(q(2021, 3), vec![on_disk.clone(), absent.clone()]);
        let request =
            DownloadRequest::new(vec!["10-K".to_string()], q(2021, 3), Some(q(2021, 3))).unwrap();
        let plan = build_plan(&session, &request, &catalog);

        assert_eq!(plan.periods.len(), 1);
        assert_eq!(plan.periods[0].present.len(), 1);
        assert_eq!(plan.periods[0].missing.len(), 1);
        assert_eq!(plan.periods[0].present[0].record, on_disk);
        assert_eq!(plan.periods[0].missing[0].record, absent);
    }

    #[test]
    fn plan_visits_each_quarter_once_in_order() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let catalog = Catalog::new();
        let request =
            DownloadRequest::new(vec!["10-K".to_string()], q(2020, 2), Some(q(2021, 2))).unwrap();
        let plan = build_plan(&session, &request, &catalog);

        let quarters: Vec<Quarter> = plan.periods.iter().map(|p| p.quarter).collect();
        assert_eq!(quarters.len(), 5);
        assert_eq!(quarters[0], q(2020, 2));
        assert_eq!(*quarters.last().unwrap(), q(2021, 2));
        for pair in quarters.windows(2) {
            assert_eq!(pair[0].succ(), pair[1]);
        }
    }

    #[test]
    fn sixty_four_missing_filings_on_empty_mirror() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let rows: Vec<FilingRecord> = (0..64)
            .map(|i| {
                record(
                    1000 + i,
                    "10-K",
                    &format!("edgar/data/{}/doc-{i}.txt", 1000 + i),
                )
            })
            .collect();
        let mut catalog = Catalog::new();
        catalog.insert(q(2021, 3), rows);
        // Open-ended request: quarters after 2021Q3 have no catalog entries
        // yet, so everything lands in the first period.
        let request = DownloadRequest::new(vec!["10-K".to_string()], q(2021, 3), None).unwrap();
        let plan = build_plan(&session, &request, &catalog);

        assert_eq!(plan.periods[0].quarter, q(2021, 3));
        assert_eq!(plan.periods[0].missing.len(), 64);
        for period in &plan.periods[1..] {
            assert!(period.missing.is_empty() && period.present.is_empty());
        }
        assert_eq!(plan.total_missing(), 64);
        assert_eq!(plan.total_present(), 0);
        let summary = summarize(&plan);
        assert_eq!(summary.est_seconds, 64);
        assert_eq!(summary.est_bytes, 64 * 150_000);
    }

    #[test]
    fn group_filter_equals_literal_filter() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(
            q(2021, 3),
            vec![
                record(1, "10-Q", "edgar/data/1/a.txt"),
                record(2, "10QSB", "edgar/data/2/b.txt"),
                record(3, "10-K", "edgar/data/3/c.txt"),
            ],
        );
        let span = (q(2021, 3), Some(q(2021, 3)));
        let grouped = DownloadRequest::new(vec!["f_10q".to_string()], span.0, span.1).unwrap();
        let literal = DownloadRequest::new(
            vec!["10-Q".to_string(), "10QSB".to_string(), "10-QSB".to_string()],
            span.0,
            span.1,
        )
        .unwrap();

        let names = |plan: &DownloadPlan| -> Vec<String> {
            plan.periods[0]
                .missing
                .iter()
                .map(|i| i.record.filename.clone())
                .collect()
        };
        let grouped_plan = build_plan(&session, &grouped, &catalog);
        let literal_plan = build_plan(&session, &literal, &catalog);
        assert_eq!(names(&grouped_plan), names(&literal_plan));
        assert_eq!(grouped_plan.total_missing(), 2);
    }

    #[test]
    fn form_matching_ignores_case() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(q(2021, 3), vec![record(1, "10-k", "edgar/data/1/a.txt")]);
        let request =
            DownloadRequest::new(vec!["10-K".to_string()], q(2021, 3), Some(q(2021, 3))).unwrap();
        let plan = build_plan(&session, &request, &catalog);
        assert_eq!(plan.total_missing(), 1);
    }

    #[test]
    fn summary_counts_missing_per_form() {
        let tmp = TempDir::new().unwrap();
        let session = Session::new(&test_config(tmp.path())).unwrap();
        let on_disk = record(1, "10-K", "edgar/data/1/a.txt");
        session::write_atomic(&session.artifact_path(&on_disk), b"cached").unwrap();
        let mut catalog = Catalog::new();
        catalog.insert(
            q(2021, 3),
            vec![
                on_disk,
                record(2, "10-K", "edgar/data/2/b.txt"),
                record(3, "10-Q", "edgar/data/3/c.txt"),
            ],
        );
        let request = DownloadRequest::new(
            vec!["10-K".to_string(), "10-Q".to_string()],
            q(2021, 3),
            Some(q(2021, 3)),
        )
        .unwrap();
        let summary = summarize(&build_plan(&session, &request, &catalog));

        assert_eq!(summary.total_missing, 2);
        assert_eq!(summary.total_present, 1);
        assert_eq!(summary.per_form.len(), 2);
        assert_eq!(summary.per_form[0].form, "10-K");
        assert_eq!(summary.per_form[0].missing, 1);
        assert_eq!(summary.per_form[1].form, "10-Q");
        assert_eq!(summary.per_form[1].missing, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total_missing"], 2);
        assert_eq!(json["per_form"][0]["form"], "10-K");
    }
}

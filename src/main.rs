use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod catalog;
mod cli;
mod config;
mod downloader;
mod errors;
mod forms;
mod models;
mod planner;
mod session;
mod stripper;
mod transport;
mod window;

use catalog::RefreshOptions;
use cli::{Cli, Commands};
use config::Config;
use downloader::{DownloadOptions, ProgressEvent};
use errors::SyncError;
use models::{DownloadRequest, Quarter};
use planner::PlanSummary;
use session::Session;
use stripper::StripPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    // Set default log level to INFO if not specified
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "edgarsync=info");
    }

    // Initialize logging to both console and file
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let file_appender = tracing_appender::rolling::never(".", "edgarsync.log");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env()),
        )
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            from_date,
            to_date,
            update_range,
            update_all,
            data_dir,
            user_agent,
        } => {
            run_index(from_date, to_date, update_range, update_all, data_dir, user_agent).await?;
        }

        Commands::Plan {
            forms,
            from_date,
            to_date,
            data_dir,
            json,
        } => {
            run_plan(forms, from_date, to_date, data_dir, json).await?;
        }

        Commands::Download {
            forms,
            from_date,
            to_date,
            data_dir,
            user_agent,
            ignore_time_window,
            strip_attachments,
            max_retries,
            backoff_base_ms,
        } => {
            run_download(
                forms,
                from_date,
                to_date,
                data_dir,
                user_agent,
                ignore_time_window,
                strip_attachments,
                max_retries,
                backoff_base_ms,
            )
            .await?;
        }

        Commands::Forms => {
            println!("Form groups (pass as --forms <group>):");
            for (name, members) in forms::FORM_GROUPS {
                println!("    {:<8} {}", name, members.join(", "));
            }
            println!("The aliases 10k, all and everything expand to f_10x.");
        }
    }

    Ok(())
}

async fn run_index(
    from_date: NaiveDate,
    to_date: Option<NaiveDate>,
    update_range: usize,
    update_all: bool,
    data_dir: Option<PathBuf>,
    user_agent: Option<String>,
) -> Result<()> {
    let config = load_config(data_dir, user_agent, None, None)?;
    let session = Session::new(&config)?;
    let start = clamped_start(from_date);
    let end = to_date.map(Quarter::from_date).unwrap_or_else(Quarter::current);
    if start > end {
        return Err(SyncError::InvalidRange { start, end }.into());
    }
    let quarters: Vec<Quarter> = Quarter::range_inclusive(start, end).collect();
    info!(
        "Refreshing {} quarterly indexes ({} through {}) under {}",
        quarters.len(),
        start,
        end,
        session.data_dir().display()
    );

    let bar = make_progress_bar(quarters.len() as u64);
    let opts = RefreshOptions {
        update_range,
        update_all,
    };
    let outcome = catalog::refresh_indexes(&session, &quarters, &opts, |done, _total| {
        bar.set_position(done as u64)
    })
    .await;
    bar.finish_and_clear();

    println!(
        "Indexes downloaded: {}, already cached: {}",
        outcome.downloaded, outcome.skipped
    );
    if !outcome.failures.is_empty() {
        for (quarter, err) in &outcome.failures {
            error!("{}: {}", quarter, err);
        }
        println!(
            "{} quarters failed; re-run to retry them.",
            outcome.failures.len()
        );
    }
    Ok(())
}

async fn run_plan(
    forms: Vec<String>,
    from_date: NaiveDate,
    to_date: Option<NaiveDate>,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let config = load_config(data_dir, None, None, None)?;
    let session = Session::new(&config)?;
    let request = DownloadRequest::new(forms, clamped_start(from_date), to_date.map(Quarter::from_date))?;
    let quarters: Vec<Quarter> = request.quarters().collect();
    let catalog = catalog::load_catalog(&session, &quarters)?;
    let plan = planner::build_plan(&session, &request, &catalog);
    let summary = planner::summarize(&plan);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&request, &summary);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_download(
    forms: Vec<String>,
    from_date: NaiveDate,
    to_date: Option<NaiveDate>,
    data_dir: Option<PathBuf>,
    user_agent: Option<String>,
    ignore_time_window: bool,
    strip_attachments: bool,
    max_retries: Option<u32>,
    backoff_base_ms: Option<u64>,
) -> Result<()> {
    let config = load_config(data_dir, user_agent, max_retries, backoff_base_ms)?;
    let session = Session::new(&config)?;
    let request = DownloadRequest::new(forms, clamped_start(from_date), to_date.map(Quarter::from_date))?;
    let quarters: Vec<Quarter> = request.quarters().collect();
    let catalog = catalog::load_catalog(&session, &quarters)?;
    let plan = planner::build_plan(&session, &request, &catalog);

    print_summary(&request, &planner::summarize(&plan));
    if plan.total_missing() == 0 {
        println!("Local mirror is already complete for this request.");
        return Ok(());
    }

    info!(
        "Starting download of {} filings into {}",
        plan.total_missing(),
        session.data_dir().display()
    );
    let opts = DownloadOptions {
        ignore_time_window,
        strip: strip_attachments.then(StripPolicy::default),
    };
    let mut bar: Option<ProgressBar> = None;
    let result = downloader::execute(&session, &plan, &opts, |event| {
        render_progress(&mut bar, event);
    })
    .await;
    if let Some(pb) = bar.take() {
        pb.finish_and_clear();
    }
    let outcome = result?;

    println!(
        "Done: {} downloaded, {} already present, {} failed (of {} targeted)",
        outcome.downloaded,
        outcome.present,
        outcome.failed.len(),
        outcome.targeted
    );
    if outcome.bytes_stripped > 0 {
        println!(
            "Stripped {:.1} MB of binary attachments",
            outcome.bytes_stripped as f64 / 1e6
        );
    }
    if !outcome.failed.is_empty() {
        println!("Failed filings (re-run to retry):");
        for item in &outcome.failed {
            println!("    {} {} {}", item.cik, item.form_type, item.url);
            warn!("Failed: {} ({})", item.url, item.error);
        }
    }
    Ok(())
}

/// Environment configuration with command-line overrides folded in.
fn load_config(
    data_dir: Option<PathBuf>,
    user_agent: Option<String>,
    max_retries: Option<u32>,
    backoff_base_ms: Option<u64>,
) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(agent) = user_agent {
        config.http.user_agent = agent;
    }
    if let Some(retries) = max_retries {
        config.retry.max_retries = retries;
    }
    if let Some(base) = backoff_base_ms {
        config.retry.backoff_base_ms = base;
    }
    Ok(config)
}

fn clamped_start(from_date: NaiveDate) -> Quarter {
    let start = Quarter::from_date(from_date);
    if start < Quarter::EARLIEST {
        debug!(
            "EDGAR full-index coverage begins at {}; clamping start",
            Quarter::EARLIEST
        );
        Quarter::EARLIEST
    } else {
        start
    }
}

fn print_summary(request: &DownloadRequest, summary: &PlanSummary) {
    println!(
        "Prepared to download {} form types between {} and {}:",
        summary.per_form.len(),
        request.start(),
        request.effective_end()
    );
    for count in &summary.per_form {
        println!("    {}: {} missing", count.form, count.missing);
    }
    println!("==============================");
    println!(
        "    Files to fetch: {} (already on disk: {})",
        summary.total_missing, summary.total_present
    );
    println!(
        "Estimated download time at {}s per file: {}",
        planner::EST_SECONDS_PER_FILE,
        format_duration_estimate(summary.est_seconds)
    );
    println!(
        "Estimated disk usage at {}KB per file: {:.2} GB",
        planner::EST_BYTES_PER_FILE / 1_000,
        summary.est_bytes as f64 / 1e9
    );
}

fn render_progress(bar: &mut Option<ProgressBar>, event: ProgressEvent) {
    match event {
        ProgressEvent::PeriodStarted {
            quarter,
            to_fetch,
            present,
        } => {
            if present > 0 {
                println!("{quarter}: {to_fetch} to fetch, {present} already on disk");
            } else {
                println!("{quarter}: {to_fetch} to fetch");
            }
            *bar = (to_fetch > 0).then(|| make_progress_bar(to_fetch as u64));
        }
        ProgressEvent::ItemFinished {
            done, elapsed, eta, ..
        } => {
            if let Some(pb) = bar {
                pb.set_position(done as u64);
                pb.set_message(format!(
                    "{} elapsed, ETA {}",
                    format_hms(elapsed),
                    format_hms(eta)
                ));
            }
        }
        ProgressEvent::PeriodFinished {
            quarter,
            downloaded,
            skipped,
            failed,
        } => {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
            println!("{quarter}: downloaded {downloaded}, skipped {skipped}, failed {failed}");
        }
    }
}

fn make_progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar
}

fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn format_duration_estimate(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
}

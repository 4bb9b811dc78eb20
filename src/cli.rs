use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "edgarsync")]
#[command(about = "Bulk downloader for SEC EDGAR filings with a resumable local mirror")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download or refresh the quarterly master index cache
    Index {
        /// Start date (YYYY-MM-DD); its quarter is included
        #[arg(long, default_value = "1994-01-01")]
        from_date: NaiveDate,

        /// End date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        to_date: Option<NaiveDate>,

        /// Re-download this many trailing quarters even when cached
        #[arg(long, default_value = "2")]
        update_range: usize,

        /// Re-download every quarter in the range
        #[arg(long)]
        update_all: bool,

        /// Root directory of the local mirror
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// User-Agent contact string (SEC fair-access policy wants one)
        #[arg(long)]
        user_agent: Option<String>,
    },

    /// Show what a download would fetch, without touching the network
    Plan {
        /// Form types or group names, comma separated (e.g. "f_10k" or "10-K,10-Q")
        #[arg(short, long, value_delimiter = ',', required = true)]
        forms: Vec<String>,

        /// Start date (YYYY-MM-DD); its quarter is included
        #[arg(long, default_value = "1994-01-01")]
        from_date: NaiveDate,

        /// End date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        to_date: Option<NaiveDate>,

        /// Root directory of the local mirror
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download every filing matching the requested forms and date range
    Download {
        /// Form types or group names, comma separated (e.g. "f_10k" or "10-K,10-Q")
        #[arg(short, long, value_delimiter = ',', required = true)]
        forms: Vec<String>,

        /// Start date (YYYY-MM-DD); its quarter is included
        #[arg(long, default_value = "1994-01-01")]
        from_date: NaiveDate,

        /// End date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        to_date: Option<NaiveDate>,

        /// Root directory of the local mirror
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// User-Agent contact string (SEC fair-access policy wants one)
        #[arg(long)]
        user_agent: Option<String>,

        /// Skip the 21:00-06:00 US/Eastern bulk-access window check
        #[arg(long)]
        ignore_time_window: bool,

        /// Strip binary exhibit attachments before writing filings
        #[arg(long)]
        strip_attachments: bool,

        /// Retries per request after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Base delay of the exponential back-off, in milliseconds
        #[arg(long)]
        backoff_base_ms: Option<u64>,
    },

    /// List the built-in form groups and their member form types
    Forms,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_args_parse() {
        let cli = Cli::try_parse_from([
            "edgarsync",
            "download",
            "--forms",
            "f_10k,10-Q",
            "--from-date",
            "2021-01-01",
            "--to-date",
            "2021-12-31",
            "--strip-attachments",
            "--ignore-time-window",
        ])
        .unwrap();
        match cli.command {
            Commands::Download {
                forms,
                from_date,
                to_date,
                strip_attachments,
                ignore_time_window,
                max_retries,
                ..
            } => {
                assert_eq!(forms, vec!["f_10k", "10-Q"]);
                assert_eq!(from_date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
                assert_eq!(to_date, Some(NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()));
                assert!(strip_attachments);
                assert!(ignore_time_window);
                assert_eq!(max_retries, None);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn index_defaults_cover_full_history() {
        let cli = Cli::try_parse_from(["edgarsync", "index"]).unwrap();
        match cli.command {
            Commands::Index {
                from_date,
                to_date,
                update_range,
                update_all,
                ..
            } => {
                assert_eq!(from_date, NaiveDate::from_ymd_opt(1994, 1, 1).unwrap());
                assert_eq!(to_date, None);
                assert_eq!(update_range, 2);
                assert!(!update_all);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn plan_requires_forms() {
        assert!(Cli::try_parse_from(["edgarsync", "plan"]).is_err());
    }
}

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None, version)]
pub(crate) struct Args {
    /// YAML file of sink settings. Anything left out takes its default, and
    /// INFLUXDB_* environment variables still override connection details.
    #[arg(short, long)]
    pub(crate) config: Option<PathBuf>,
    /// YAML or JSON file describing the job to report.
    #[arg(short, long)]
    pub(crate) job: PathBuf,
    /// Error type name. Supplying this or --failure-message reports the job
    /// as failed.
    #[arg(long)]
    pub(crate) failure_kind: Option<String>,
    /// Error message for a failed job.
    #[arg(long)]
    pub(crate) failure_message: Option<String>,
    /// Adds a default tag, as key=value. May be repeated.
    #[arg(short, long = "tag", value_parser = parse_tag)]
    pub(crate) tags: Vec<(String, String)>,
    /// Prints the point as line protocol instead of sending it.
    #[arg(short = 'n', long)]
    pub(crate) dry_run: bool,
    /// Enables human-friendly logging.
    #[arg(short, long, default_value_t)]
    pub(crate) debug: bool,
}

fn parse_tag(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() && !v.is_empty() => {
            Ok((k.to_owned(), v.to_owned()))
        },
        _ => Err(format!("expected key=value, got {s:?}")),
    }
}

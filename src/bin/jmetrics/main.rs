mod args;

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use job_metrics_influx::config::SinkConfig;
use job_metrics_influx::hooks::{InfluxLogger, JobHooks};
use job_metrics_influx::sink::{Delivery, MetricSink, TracingLogger};
use job_metrics_influx::transport::{Transport, TransportError, WriteRequest};
use job_metrics_influx::types::job::{JobFailure, JobRecord};
use tracing::{error, info, Level};

use crate::args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_max_level(Level::TRACE)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt().json().with_writer(io::stderr).init();
    }

    let result = begin(args).await;
    if let Err(error) = &result {
        error!("unable to report job: {error:#}");
    }

    exit_code(&result)
}

/// 0 when the point was written, 1 when it was dropped, 2 on bad input.
fn exit_code(result: &Result<Delivery>) -> ExitCode {
    match result {
        Ok(Delivery::Sent) => ExitCode::SUCCESS,
        Ok(Delivery::Dropped) => ExitCode::FAILURE,
        Err(_) => ExitCode::from(2),
    }
}

async fn begin(args: Args) -> Result<Delivery> {
    let mut config = match &args.config {
        Some(path) => SinkConfig::from_yaml_path(path)?,
        None => SinkConfig::default(),
    };
    for (k, v) in &args.tags {
        config.default_tags.insert(k.as_str(), v.as_str());
    }

    let job: JobRecord = {
        let text = fs::read_to_string(&args.job)
            .with_context(|| format!("reading {}", args.job.display()))?;
        serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", args.job.display()))?
    };

    let failure = match (args.failure_kind, args.failure_message) {
        (None, None) => None,
        (kind, message) => Some(JobFailure::new(
            kind.unwrap_or_else(|| "Error".into()),
            message.unwrap_or_default(),
        )),
    };

    info!(
        job_id = %job.id,
        class = %job.class,
        failed = failure.is_some(),
        "reporting job"
    );

    if args.dry_run {
        let hooks =
            InfluxLogger::new(MetricSink::with_transport(config, Stdout));
        report(&hooks, job, failure.as_ref()).await
    } else {
        let sink = MetricSink::new(config)
            .context("building HTTP client")?
            .with_logger(Arc::new(TracingLogger));
        report(&InfluxLogger::new(sink), job, failure.as_ref()).await
    }
}

async fn report<T: Transport>(
    hooks: &InfluxLogger<T>,
    mut job: JobRecord,
    failure: Option<&JobFailure>,
) -> Result<Delivery> {
    hooks.before_fork(&mut job);

    let delivery = match failure {
        Some(failure) => hooks.on_failure(failure, &job).await,
        None => hooks.after_perform(&job).await,
    };

    delivery.context("job record produced an unwritable point")
}

/// Prints each point on its own line rather than sending it anywhere.
struct Stdout;

impl Transport for Stdout {
    async fn write(
        &self,
        request: &WriteRequest,
    ) -> Result<(), TransportError> {
        print_line(&mut io::stdout().lock(), &request.body)
    }
}

fn print_line(
    out: &mut impl Write,
    line: &[u8],
) -> Result<(), TransportError> {
    out.write_all(line)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    /// A writer whose reader has gone away.
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(Delivery::Sent)), ExitCode::SUCCESS);
        assert_eq!(exit_code(&Ok(Delivery::Dropped)), ExitCode::FAILURE);
        assert_eq!(
            exit_code(&Err(anyhow!("bad job file"))),
            ExitCode::from(2)
        );
    }

    #[test]
    fn test_print_line() {
        let mut out = Vec::new();
        print_line(&mut out, b"resque n=1i 1").unwrap();
        assert_eq!(out, b"resque n=1i 1\n");

        assert!(matches!(
            print_line(&mut Closed, b"resque n=1i 1"),
            Err(TransportError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_dry_run_reports_sent() {
        let sink = MetricSink::with_transport(SinkConfig::default(), Stdout)
            .with_env(Arc::new(Vec::<(&'static str, String)>::new()));
        let hooks = InfluxLogger::new(sink);
        let job = JobRecord {
            start_time: Some(10),
            end_time: Some(20),
            ..JobRecord::new("abc123", "SomeClass", "queue")
        };

        let delivery = report(&hooks, job, None).await.unwrap();
        assert_eq!(delivery, Delivery::Sent);
    }
}

use std::collections::HashSet;
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dsboot_core::config::ScannerConfig;
use dsboot_core::{ScanContext, ScanPool};

mod jobs;
mod output;

use jobs::Job;

// the doc comments for this struct turn into the CLI help text
#[derive(Debug, Parser)]
/// DS-bootstrap scanner
///
/// Reads `[.]child auth1 auth2 …` job lines and, for each one, either
/// bootstraps a DS record set for `child` or (if the child token starts
/// with `.`) walks the NSEC chain under it to discover candidate children.
struct Args {
    /// Path to read job lines from; defaults to stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Path to write output lines to; defaults to stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Print a per-event count summary to stderr on exit
    #[arg(short, long, action(clap::ArgAction::SetTrue))]
    verbose: bool,
}

fn begin_logging() {
    let log_format: HashSet<String> = env::var("RUST_LOG_FORMAT")
        .map(|var| var.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let logger = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(!log_format.contains("no-ansi"));

    if log_format.contains("json") {
        logger.json().init();
    } else if log_format.contains("pretty") {
        logger.pretty().init();
    } else if log_format.contains("compact") {
        logger.compact().init();
    } else {
        logger.init();
    }
}

fn open_input(path: &Option<String>) -> io::Result<Box<dyn BufRead>> {
    match path {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: &Option<String>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout())),
    }
}

#[tokio::main]
async fn main() {
    begin_logging();
    let args = Args::parse();

    let config = match ScannerConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("could not load configuration: {e}");
            process::exit(1);
        }
    };

    let context = match ScanContext::new(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("could not initialize scanner: {e}");
            process::exit(1);
        }
    };
    let pool = ScanPool::new(context, config.worker_pool_size());

    let input = match open_input(&args.input) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("could not open input: {e}");
            process::exit(1);
        }
    };
    let mut output = match open_output(&args.output) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("could not open output: {e}");
            process::exit(1);
        }
    };

    let mut handles = Vec::new();
    for (lineno, line) in input.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(lineno, error = %e, "could not read line");
                continue;
            }
        };
        let job = match jobs::parse_line(&line) {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(lineno, line = %e.line, reason = %e.reason, "skipping unparseable job line");
                continue;
            }
        };

        let pool = pool.clone();
        handles.push(tokio::spawn(async move { run_job(&pool, job).await }));
    }

    for handle in handles {
        match handle.await {
            Ok(lines) => {
                for line in lines {
                    if let Err(e) = output.write_all(line.as_bytes()) {
                        tracing::error!(error = %e, "could not write output");
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "scan task panicked"),
        }
    }

    if args.verbose {
        for (event, count) in pool.context().sink.report_counts() {
            eprintln!("{event}\t{count}");
        }
    }
}

async fn run_job(pool: &ScanPool, job: Job) -> Vec<String> {
    match job {
        Job::Bootstrap { child, auths } => {
            let scan_job = dsboot_core::ScanJob { child, auths };
            match pool.scan(&scan_job).await {
                Some(ds) => {
                    let mut buf = Vec::new();
                    let _ = output::write_ds_rrset(&mut buf, &ds);
                    vec![String::from_utf8_lossy(&buf).into_owned()]
                }
                None => Vec::new(),
            }
        }
        Job::Walk { ancestor, auths } => {
            let candidates = pool.walk(&ancestor, &auths).await;
            candidates
                .iter()
                .map(|candidate| {
                    let mut buf = Vec::new();
                    let _ = output::write_discovery_line(&mut buf, candidate);
                    String::from_utf8_lossy(&buf).into_owned()
                })
                .collect()
        }
    }
}

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "attendanced")]
#[command(about = "Attendance analytics sidecar speaking JSON lines on stdin/stdout", long_about = None)]
pub struct Cli {
    /// Workspace directory to open at startup
    #[arg(long, env = "ATTENDANCED_WORKSPACE")]
    pub workspace: Option<PathBuf>,
    /// Log filter, e.g. `info` or `attendanced=debug`
    #[arg(long, env = "ATTENDANCED_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log: String,
}

fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Logs go to stderr; stdout carries protocol responses only.
pub fn init_logging(cli: &Cli) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(&cli.log))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

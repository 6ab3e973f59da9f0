//! CAN Log Pipeline CLI Application
//!
//! Runs the full session workflow over a directory of recordings using the
//! can-log-session library:
//! - Concatenate recordings, persist and export them
//! - Filter raw channels and decode signals from DBC files
//! - Tabulate, slice and filter the decoded signals
//! - Alert with a plot when the analysed signal varies too much

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod config;
mod pipeline;

/// CAN Log Pipeline - Merge, decode and analyse CAN recordings
#[derive(Parser, Debug)]
#[command(name = "can-log-pipeline")]
#[command(about = "Merge, decode and analyse CAN log recordings", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the log files and DBC files (overrides config)
    #[arg(short, long, value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Directory for sessions, exports and plots (overrides config)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Log Pipeline v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using session library v{}", can_log_session::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::AppConfig::default(),
    };
    if let Some(dir) = args.input_dir {
        config.input.dir = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    log::debug!("Configuration: {:?}", config);

    let summary = pipeline::run(&config)?;
    log::info!(
        "Done: {} log file(s), {} DBC(s), {} files written, split start {}",
        summary.log_files.len(),
        summary.dbc_files.len(),
        summary.written.len(),
        summary.split_start
    );
    if !summary.outcome.is_alert() {
        log::info!(
            "Spread {} of {} samples within limit",
            summary.stats.spread(),
            summary.stats.count
        );
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::parse_from(["can-log-pipeline", "-i", "logs", "-o", "out", "-vv"]);
        assert_eq!(args.input_dir, Some(PathBuf::from("logs")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);
        assert!(args.config.is_none());
    }
}

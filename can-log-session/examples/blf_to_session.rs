//! Convert a BLF recording into a session file and a CSV export
//!
//! Usage:
//!   blf_to_session <log_file.blf> [output_stem]

use can_log_session::{export_csv, load_log_file, ExportOptions};
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("Usage: blf_to_session <log_file.blf> [output_stem]");
        std::process::exit(2);
    };
    let stem = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.with_extension(""));

    let session = load_log_file(&input)?;
    println!("Start time: {}", session.start_time());
    for group in &session.groups {
        println!("  {}: {} samples", group.name, group.len());
        for channel in &group.channels {
            println!("    {} ({:?})", channel.name, channel.samples.kind());
        }
    }

    let saved = session.save(&stem)?;
    println!("Saved {:?}", saved);

    let options = ExportOptions::new()
        .with_time_as_date(true)
        .with_single_time_base(true);
    for path in export_csv(&session, &stem, &options)? {
        println!("Exported {:?}", path);
    }

    Ok(())
}

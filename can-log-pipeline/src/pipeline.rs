//! The end-to-end run: discover, merge, export, filter, decode, analyse, report

use crate::config::AppConfig;
use anyhow::{Context, Result};
use can_log_session::metadata::{format_split_start, split_start};
use can_log_session::{
    concatenate, discover_files, export_csv, Decoder, ReportHook, ReportOutcome, SpreadAlert,
    SummaryStats, Table,
};
use std::path::PathBuf;

/// What a run produced
#[derive(Debug)]
pub struct RunSummary {
    pub log_files: Vec<PathBuf>,
    pub dbc_files: Vec<PathBuf>,
    pub split_start: String,
    pub written: Vec<PathBuf>,
    pub stats: SummaryStats,
    pub outcome: ReportOutcome,
}

pub fn run(config: &AppConfig) -> Result<RunSummary> {
    let output = &config.output;
    std::fs::create_dir_all(&output.dir)
        .with_context(|| format!("Failed to create output directory {:?}", output.dir))?;
    let mut written = Vec::new();

    // Discover inputs
    let log_files = discover_files(&config.input.dir, &config.input.log_extension)
        .context("Failed to list log files")?;
    let dbc_files = discover_files(&config.input.dir, &config.input.dbc_extension)
        .context("Failed to list signal databases")?;
    println!("Log file(s): {:?}", log_files);
    println!("DBC(s): {:?}", dbc_files);

    // Merge and persist
    let concatenated = concatenate(&log_files).context("Failed to concatenate log files")?;
    written.push(
        concatenated
            .save(&output.stem(&output.concatenated))
            .context("Failed to save concatenated session")?,
    );
    written.extend(
        export_csv(
            &concatenated,
            &output.stem(&output.concatenated),
            &config.export.concatenated,
        )
        .context("Failed to export concatenated session")?,
    );

    // Header metadata
    let split = split_start(&concatenated, &config.signals.split_channel)
        .with_context(|| format!("Failed to read first sample of {}", config.signals.split_channel))?;
    let split_label = format_split_start(&split);
    log::info!("Split start: {}", split_label);

    // Structural filter
    let filtered = concatenated.filter(&config.signals.filter_channels);
    written.push(
        filtered
            .save(&output.stem(&output.filtered))
            .context("Failed to save filtered session")?,
    );

    // Decode the unfiltered session
    let mut decoder = Decoder::new();
    for dbc in &dbc_files {
        decoder
            .add_dbc(dbc)
            .with_context(|| format!("Failed to load DBC file {:?}", dbc))?;
    }
    let stats = decoder.database_stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        stats.num_messages,
        stats.num_signals
    );

    let scaled = decoder
        .extract_can_logging(&concatenated, &config.decode)
        .context("Failed to decode CAN logging")?;
    written.push(
        scaled
            .save(&output.stem(&output.scaled))
            .context("Failed to save scaled session")?,
    );
    written.extend(
        export_csv(&scaled, &output.stem(&output.scaled), &config.export.scaled)
            .context("Failed to export scaled session")?,
    );

    // Signal subsets
    let selected = scaled.select(&config.signals.names);
    let subset = scaled.filter(&config.signals.names);
    log::debug!(
        "Selected {} groups, filtered down to {} groups",
        selected.groups.len(),
        subset.groups.len()
    );
    if !dbc_files.is_empty() {
        let direct = decoder
            .get_can_signal(&concatenated, config.primary_signal())
            .with_context(|| format!("Failed to extract {}", config.primary_signal()))?;
        log::info!(
            "Direct extraction of {}: {} samples",
            direct.name,
            direct.samples.len()
        );
    }

    // Analyse
    let analysis = &config.analysis;
    let table = Table::from_session(&scaled, true)
        .with_ratio_column(
            &analysis.ratio_column,
            config.primary_signal(),
            config.secondary_signal(),
        )
        .context("Failed to compute ratio column")?
        .slice_time(&analysis.time_start, &analysis.time_end)
        .context("Failed to slice time range")?
        .filter_rows(config.primary_signal(), &analysis.predicate)
        .context("Failed to filter rows")?;
    println!("\nFiltered table:\n{}", table);

    // Report
    let stats = table
        .summary(config.primary_signal())
        .context("Failed to compute statistics")?;
    log::info!("{} statistics:\n{}", config.primary_signal(), stats);

    let mut hook = SpreadAlert::new(config.report.max_spread, &output.dir);
    let outcome = hook
        .on_stats(&table, config.primary_signal(), &stats)
        .context("Failed to report statistics")?;
    if let ReportOutcome::Alert { message, plot } = &outcome {
        println!("{}", message);
        written.extend(plot.iter().cloned());
    }

    Ok(RunSummary {
        log_files,
        dbc_files,
        split_start: split_label,
        written,
        stats,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_log_session::{CanFrame, LogSession};
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    const DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: Engine Vehicle

BO_ 2364540158 EEC1: 8 Engine
 SG_ EngineSpeed : 24|16@1+ (0.125,0) [0|8031.875] "rpm" Vector__XXX

BO_ 2566844926 CCVS1: 8 Vehicle
 SG_ WheelBasedVehicleSpeed : 8|16@1+ (0.00390625,0) [0|250.996] "km/h" Vector__XXX
"#;

    fn frame(seconds: u64, can_id: u32, offset: usize, raw: u16) -> CanFrame {
        let mut data = vec![0xFF; 8];
        data[offset..offset + 2].copy_from_slice(&raw.to_le_bytes());
        CanFrame {
            timestamp_ns: seconds * 1_000_000_000,
            channel: 1,
            can_id,
            data,
            is_extended: true,
            is_error_frame: false,
            is_remote_frame: false,
        }
    }

    fn write_inputs(dir: &Path, rpm: &[u16]) {
        let frames = rpm.iter().enumerate().flat_map(|(i, &value)| {
            let t = 5 + 10 * i as u64;
            [
                frame(t, 0x0CF0_04FE, 3, value * 8),
                frame(t + 1, 0x18FE_F1FE, 1, 50 * 256),
            ]
        });
        let session = LogSession::from_frames(
            Utc.with_ymd_and_hms(2020, 1, 13, 13, 58, 30).unwrap(),
            frames,
        );
        session.save(&dir.join("recording")).unwrap();
        std::fs::write(dir.join("j1939.dbc"), DBC).unwrap();
    }

    fn config_for(input: &Path, output: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.input.dir = input.to_path_buf();
        config.input.log_extension = "session".to_string();
        config.output.dir = output.to_path_buf();
        config
    }

    #[test]
    fn test_run_with_alert() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_inputs(input.path(), &[600, 650, 700, 1000]);

        let summary = run(&config_for(input.path(), output.path())).unwrap();

        assert_eq!(summary.log_files.len(), 1);
        assert_eq!(summary.dbc_files.len(), 1);
        assert_eq!(summary.split_start, "20200113135835");
        assert_eq!(summary.stats.count, 6);
        assert_eq!(summary.stats.spread(), 350.0);
        assert!(summary.outcome.is_alert());

        for name in [
            "concatenated.session",
            "concatenated.ChannelGroup_0_CAN_DataFrame.csv",
            "filtered.session",
            "scaled.session",
            "scaled.csv",
            "signal_EngineSpeed.png",
        ] {
            let path = output.path().join(name);
            assert!(path.exists(), "missing {:?}", path);
            assert!(summary.written.contains(&path));
        }
    }

    #[test]
    fn test_run_without_alert() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_inputs(input.path(), &[600, 650, 700, 800]);

        let summary = run(&config_for(input.path(), output.path())).unwrap();
        assert_eq!(summary.outcome, ReportOutcome::Quiet);
        assert!(!output.path().join("signal_EngineSpeed.png").exists());
    }

    #[test]
    fn test_run_without_logs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let err = run(&config_for(input.path(), output.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to concatenate"));
    }
}

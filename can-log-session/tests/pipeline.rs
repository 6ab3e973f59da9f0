//! End-to-end run over two synthetic J1939 recordings

use can_log_session::metadata::{format_split_start, split_start};
use can_log_session::session::{BUS_CHANNEL, DATA_BYTES_CHANNEL, ID_CHANNEL, RAW_GROUP};
use can_log_session::{
    concatenate, discover_files, export_csv, read_csv, CanFrame, Comparison, DecodeOptions,
    Decoder, ExportOptions, LogSession, ReportHook, ReportOutcome, SessionError, SpreadAlert,
    Table, ValuePredicate,
};
use chrono::{TimeZone, Utc};
use std::path::Path;

const J1939_DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: Engine Vehicle

BO_ 2364540158 EEC1: 8 Engine
 SG_ EngineSpeed : 24|16@1+ (0.125,0) [0|8031.875] "rpm" Vector__XXX

BO_ 2566844926 CCVS1: 8 Vehicle
 SG_ WheelBasedVehicleSpeed : 8|16@1+ (0.00390625,0) [0|250.996] "km/h" Vector__XXX
"#;

// Source address 0x00 differs from the database (0xFE); PGN lookup applies
const EEC1_ID: u32 = 0x0CF0_0400;
const CCVS1_ID: u32 = 0x18FE_F1FE;

fn frame(seconds: u64, can_id: u32, data: Vec<u8>) -> CanFrame {
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

fn eec1(seconds: u64, rpm: f64) -> CanFrame {
    let raw = (rpm / 0.125) as u16;
    let mut data = vec![0xFF; 8];
    data[3..5].copy_from_slice(&raw.to_le_bytes());
    frame(seconds, EEC1_ID, data)
}

fn ccvs1(seconds: u64, kmh: f64) -> CanFrame {
    let raw = (kmh / 0.00390625) as u16;
    let mut data = vec![0xFF; 8];
    data[1..3].copy_from_slice(&raw.to_le_bytes());
    frame(seconds, CCVS1_ID, data)
}

/// Two recordings, 30 s apart, plus a database in `dir`
fn write_inputs(dir: &Path) {
    let first = LogSession::from_frames(
        Utc.with_ymd_and_hms(2020, 1, 13, 13, 58, 30).unwrap(),
        vec![
            eec1(5, 600.0),
            ccvs1(6, 50.0),
            eec1(10, 650.0),
            ccvs1(12, 60.0),
            eec1(15, 700.0),
            // Truncated payload, invalid for EngineSpeed
            frame(16, EEC1_ID, vec![0xFF, 0xFF, 0xFF]),
        ],
    );
    let second = LogSession::from_frames(
        Utc.with_ymd_and_hms(2020, 1, 13, 13, 59, 0).unwrap(),
        vec![eec1(10, 1000.0), ccvs1(11, 80.0), eec1(70, 2000.0)],
    );

    first.save(&dir.join("recording_a")).unwrap();
    second.save(&dir.join("recording_b")).unwrap();
    std::fs::write(dir.join("j1939.dbc"), J1939_DBC).unwrap();
}

fn decoder_for(dir: &Path) -> Decoder {
    let mut decoder = Decoder::new();
    for dbc in discover_files(dir, "dbc").unwrap() {
        decoder.add_dbc(&dbc).unwrap();
    }
    decoder
}

#[test]
fn test_full_pipeline() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(input.path());

    // 1. Discover
    let logs = discover_files(input.path(), "session").unwrap();
    assert_eq!(logs.len(), 2);

    // 2. Merge and persist
    let concatenated = concatenate(&logs).unwrap();
    assert_eq!(concatenated.group(RAW_GROUP).unwrap().len(), 9);
    let saved = concatenated.save(&output.path().join("concatenated")).unwrap();
    assert_eq!(LogSession::load(&saved).unwrap(), concatenated);

    // 3. Export
    let csv = export_csv(
        &concatenated,
        &output.path().join("concatenated"),
        &ExportOptions::new()
            .with_time_as_date(true)
            .with_single_time_base(true),
    )
    .unwrap();
    let reloaded = read_csv(&csv[0], ',').unwrap();
    assert_eq!(reloaded.len(), 9);

    // 4. Metadata
    let start = split_start(&concatenated, BUS_CHANNEL).unwrap();
    assert_eq!(format_split_start(&start), "20200113135835");

    // 5. Structural filter
    let filtered = concatenated.filter(&[ID_CHANNEL, DATA_BYTES_CHANNEL]);
    assert_eq!(filtered.channel_names(), vec![ID_CHANNEL, DATA_BYTES_CHANNEL]);
    filtered.save(&output.path().join("filtered")).unwrap();

    // 6. Decode
    let decoder = decoder_for(input.path());
    let decoded = decoder
        .extract_can_logging(
            &concatenated,
            &DecodeOptions::new().with_ignore_invalid_signals(true),
        )
        .unwrap();
    assert_eq!(
        decoded.channel_names(),
        vec!["EngineSpeed", "WheelBasedVehicleSpeed"]
    );
    decoded.save(&output.path().join("scaled")).unwrap();

    // 7. Select and direct extraction agree
    let signals = ["EngineSpeed", "WheelBasedVehicleSpeed"];
    let selected = decoded.select(&signals);
    assert_eq!(selected.groups.len(), 2);
    let direct = decoder.get_can_signal(&concatenated, "EngineSpeed").unwrap();
    assert_eq!(direct, selected.signal("EngineSpeed").unwrap());
    assert_eq!(direct.timestamps, vec![5.0, 10.0, 15.0, 40.0, 100.0]);

    // 8. Tabulate and analyse
    let table = Table::from_session(&selected, true)
        .with_ratio_column("ratio", "EngineSpeed", "WheelBasedVehicleSpeed")
        .unwrap()
        .slice_time("2020-01-13 13:58:35", "2020-01-13 13:59:56")
        .unwrap()
        .filter_rows("EngineSpeed", &ValuePredicate::new(Comparison::Gt, 640.0))
        .unwrap();
    assert_eq!(
        table.numeric("EngineSpeed").unwrap(),
        &[650.0, 650.0, 700.0, 1000.0, 1000.0]
    );
    assert_eq!(table.numeric("ratio").unwrap()[0], 13.0);
    assert!(table.to_string().ends_with("[5 rows x 3 columns]"));

    // 9. Statistics and alert
    let stats = table.summary("EngineSpeed").unwrap();
    assert_eq!(stats.count, 5);
    assert_eq!(stats.mean, 800.0);
    assert_eq!(stats.spread(), 350.0);

    let mut alert = SpreadAlert::new(300.0, output.path());
    let outcome = alert.on_stats(&table, "EngineSpeed", &stats).unwrap();
    assert!(outcome.is_alert());
    assert!(output.path().join("signal_EngineSpeed.png").exists());

    let mut strict = SpreadAlert::new(400.0, output.path());
    assert_eq!(
        strict.on_stats(&table, "EngineSpeed", &stats).unwrap(),
        ReportOutcome::Quiet
    );
}

#[test]
fn test_strict_decode_reports_invalid_record() {
    let input = tempfile::tempdir().unwrap();
    write_inputs(input.path());

    let logs = discover_files(input.path(), "session").unwrap();
    let concatenated = concatenate(&logs).unwrap();
    let result = decoder_for(input.path()).extract_can_logging(&concatenated, &DecodeOptions::new());

    match result {
        Err(SessionError::InvalidSignal {
            signal, timestamp, ..
        }) => {
            assert_eq!(signal, "EngineSpeed");
            assert_eq!(timestamp, 16.0);
        }
        other => panic!("expected InvalidSignal, got {:?}", other),
    }
}

#[test]
fn test_empty_input_directory() {
    let input = tempfile::tempdir().unwrap();
    let logs = discover_files(input.path(), "blf").unwrap();
    assert!(logs.is_empty());
    assert!(matches!(concatenate(&logs), Err(SessionError::NoInput)));
}

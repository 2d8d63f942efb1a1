//! Tests driving the pipeline from file-backed inputs, the way the
//! `thermal_check` binary wires it.

mod common;

use std::path::PathBuf;

use common::full_seed_state;
use thermoscope::config::{SeedOverrides, CH_T_PRIMARY, CH_T_SECONDARY, TIMELINE_ATTRS};
use thermoscope::heater::read_heater_history;
use thermoscope::model::{demo_spec, ModelSpec, ReferenceModel};
use thermoscope::provider::{
    CommandProvider, JsonCommandLog, JsonTelemetryArchive, TelemetryProvider,
};
use thermoscope::seed::{resolve_seed, SeedPolicy};
use thermoscope::sim::{run_prediction, InitialConditions};
use thermoscope::timeline::TimelineBuilder;
use thermoscope::{AttrValue, TimeSeries};

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn command_log_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        &dir,
        "cmds.json",
        r#"{
            "initial_state": {
                "tstart": 0.0,
                "tstop": 30.0,
                "attrs": {
                    "pitch": 150.0, "sim_pos": 75616.0, "ccd_count": 6,
                    "fep_count": 6, "vid_board": 1, "clocking": 1,
                    "dh_heater": false
                }
            },
            "commands": [
                {"time": 1000.0, "set": {"pitch": 90.0}},
                {"time": 5000.0, "set": {"ccd_count": 4, "fep_count": 4}}
            ]
        }"#,
    );
    let log = JsonCommandLog::from_file(&path).unwrap();

    let cmds = log.commands(0.0, 10_000.0).unwrap();
    assert_eq!(cmds.len(), 2);
    assert_eq!(cmds[0].deltas["pitch"], AttrValue::Float(90.0));
    assert_eq!(cmds[1].deltas["ccd_count"], AttrValue::Int(4));

    let state = log.state_at(2000.0).unwrap();
    assert_eq!(state.attr("pitch"), Some(AttrValue::Float(90.0)));
    assert_eq!(state.attr("dh_heater"), Some(AttrValue::Bool(false)));
}

#[test]
fn model_spec_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let spec_json = serde_json::to_string_pretty(&demo_spec()).unwrap();
    let path = write_file(&dir, "model.json", &spec_json);
    let spec = ModelSpec::from_file(&path).unwrap();
    assert_eq!(spec.name, "demo-two-node");
    assert_eq!(spec.nodes.len(), 2);
    assert_eq!(spec.echo, vec!["pitch", "sim_pos"]);
}

#[test]
fn malformed_model_spec_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(&dir, "model.json", r#"{"name": "x", "dt_s": -5.0, "nodes": []}"#);
    let err = ModelSpec::from_file(&path).unwrap_err();
    assert!(matches!(err, thermoscope::Error::Malformed { .. }));
}

#[test]
fn seed_derivation_from_file_backed_history() {
    let dir = tempfile::tempdir().unwrap();
    let cmd_path = write_file(
        &dir,
        "cmds.json",
        r#"{
            "initial_state": {
                "tstart": 0.0,
                "tstop": 30.0,
                "attrs": {
                    "pitch": 150.0, "sim_pos": 75616.0, "ccd_count": 6,
                    "fep_count": 6, "vid_board": 1, "clocking": 1,
                    "dh_heater": false
                }
            },
            "commands": [{"time": 20000.0, "set": {"pitch": 120.0}}]
        }"#,
    );
    let log = JsonCommandLog::from_file(&cmd_path).unwrap();
    let telemetry = TimeSeries::from_points((0..400).map(|i| (i as f64 * 300.0, 36.0)));

    let seed = resolve_seed(
        &SeedOverrides::default(),
        120_000.0,
        &log,
        &telemetry,
        &SeedPolicy::default(),
    )
    .unwrap();
    assert_eq!(seed.state.attr("pitch"), Some(AttrValue::Float(120.0)));
    assert_eq!(seed.state.tstart, 20_000.0);
    assert!((seed.t_primary - 36.0).abs() < 1e-9);
    assert!((seed.t_secondary - 26.0).abs() < 1e-9);
}

#[test]
fn heater_history_drives_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let heater_path = write_file(
        &dir,
        "heater.log",
        "# detector housing heater history\n0.0 1\n40000.0 0\nbogus row\n",
    );
    let heater = read_heater_history(&heater_path).unwrap();
    assert_eq!(heater.skipped_rows, 1);

    let seed = full_seed_state(0.0, 30.0, 150.0);
    let timeline = TimelineBuilder::new(TIMELINE_ATTRS)
        .build(&seed, &[], &[], 80_000.0)
        .unwrap();
    let prediction = run_prediction(
        Box::new(ReferenceModel::new(demo_spec())),
        &timeline,
        0.0,
        80_000.0,
        &InitialConditions {
            t_primary: 35.5,
            t_secondary: 30.0,
            heater_history: Some(heater.series),
        },
    )
    .unwrap();

    // With the heater on the primary equilibrium is 35.5; after it drops
    // out at t=40000 the node cools toward 34.
    let primary = prediction.channel(CH_T_PRIMARY).unwrap();
    let early = primary.value_nearest(30_000.0).unwrap();
    let late = primary.value_nearest(80_000.0).unwrap();
    assert!((early - 35.5).abs() < 0.1);
    assert!(late < early - 0.5);
}

#[test]
fn telemetry_archive_fetch_matches_bin_usage() {
    let dir = tempfile::tempdir().unwrap();
    let telem_path = write_file(
        &dir,
        "telem.json",
        r#"{
            "channels": {
                "t_primary": [[0.0, 35.0], [300.0, 35.2], [600.0, 35.1]],
                "t_secondary": [[0.0, 25.0], [300.0, 25.1], [600.0, 25.0]]
            }
        }"#,
    );
    let archive = JsonTelemetryArchive::from_file(&telem_path).unwrap();
    let fetched = archive
        .fetch(&[CH_T_PRIMARY, CH_T_SECONDARY], 600.0, 1.0)
        .unwrap();
    assert_eq!(fetched[CH_T_PRIMARY].len(), 3);
    assert_eq!(fetched[CH_T_SECONDARY].last().unwrap().value, 25.0);
}

use std::fs;
use std::path::PathBuf;

use grassland::{
    config::ConfigError, engine::SimulationError, report::ReportLog, Simulation, SimulationConfig,
};

fn scenario_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/reference.yaml")
}

#[test]
fn reference_fixture_matches_builtin_defaults() {
    let scenario = SimulationConfig::load(scenario_path()).expect("scenario parses");
    assert_eq!(scenario, SimulationConfig::reference());
}

#[test]
fn scenario_file_drives_a_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("short.yaml");
    fs::write(
        &path,
        "seed: 99\nclock:\n  start_year: 2030\n  horizon_year: 2031\nprey:\n  initial_count: 4\n",
    )
    .unwrap();

    let config = SimulationConfig::load(&path).unwrap();
    let log = ReportLog::new();
    let summary = Simulation::builder(config)
        .with_sink(log.clone())
        .build()
        .unwrap()
        .run()
        .unwrap();

    let reports = log.reports();
    assert_eq!(summary.months_reported, 12);
    assert_eq!(reports.len(), 12);
    assert_eq!((reports[0].month, reports[0].year), (0, 2030));
    // Capacity 5 adds one prey; the single predator may take it back.
    assert!(reports[0].prey == 5 || reports[0].prey == 4);
}

#[test]
fn missing_file_is_an_io_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = SimulationConfig::load(temp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn invalid_scenario_is_rejected_on_load() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("backwards.yaml");
    fs::write(&path, "clock:\n  start_year: 2030\n  horizon_year: 2020\n").unwrap();

    let err = SimulationConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "{err}");
}

#[test]
fn builder_rejects_config_edited_after_load() {
    let mut config = SimulationConfig::load(scenario_path()).unwrap();
    config.vegetation.precip_spread = -3.0;

    let err = Simulation::builder(config).build().err().unwrap();
    assert!(matches!(err, SimulationError::Config(_)));
}

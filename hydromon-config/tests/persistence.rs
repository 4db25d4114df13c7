//! JSON persistence against real files

use std::fs;

use hydromon_config::{JsonConfig, StoreError};
use hydromon_core::calibration::create_formula;
use hydromon_core::{CalibrationSet, ConfigProvider, GyroCalibration};
use tempfile::TempDir;

fn config_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("gravitymon.json")
}

#[test]
fn missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let store = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(store.sleep_interval(), 900);
    assert_eq!(store.gyro_read_count(), 50);
    assert_eq!(store.gyro_sensor_moving_threshold(), 500);
    assert!(!config_path(&dir).exists());
}

#[test]
fn saved_values_read_back_exactly() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonConfig::open(config_path(&dir)).unwrap();
    store.set_sleep_interval(1800);
    store.set_gravity_temp_adjustment(true);
    store.set_gyro_calibration(GyroCalibration { ax: -1200, ay: 340, az: 1688, gx: 12, gy: -7, gz: 3 });
    store.set_formula_data(CalibrationSet::from_pairs(&[(25.123456789, 1.0), (33.3333333333, 1.0123456789)]));
    store.set_gravity_formula("0.00001000*tilt^2+0.00100000*tilt+1.00000000").unwrap();
    store.save().unwrap();

    let loaded = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(loaded.config(), store.config());
    assert_eq!(loaded.formula_data().get(1).map(|p| p.gravity), Some(1.0123456789));
}

#[test]
fn firmware_keys_are_used_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonConfig::open(config_path(&dir)).unwrap();
    store.set_gyro_sensor_moving_threshold(650);
    store.save().unwrap();

    let text = fs::read_to_string(config_path(&dir)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["gyro_moving_threashold"], 650);
    assert_eq!(doc["formula_calculation_data"].as_array().map(Vec::len), Some(20));
    assert_eq!(doc["formula_calculation_data"][0]["g"], 1.0);
    assert!(doc["gyro_calibration_data"].is_object());
}

#[test]
fn foreign_keys_survive_a_save() {
    let dir = TempDir::new().unwrap();
    fs::write(
        config_path(&dir),
        r#"{ "mdns": "gravmon", "wifi_ssid": "brewery", "sleep_interval": 300 }"#,
    )
    .unwrap();

    let mut store = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(store.sleep_interval(), 300);
    store.set_sleep_interval(600);
    store.save().unwrap();

    let reloaded = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(reloaded.sleep_interval(), 600);
    assert_eq!(reloaded.foreign("mdns").and_then(|v| v.as_str()), Some("gravmon"));
    assert_eq!(reloaded.foreign("wifi_ssid").and_then(|v| v.as_str()), Some("brewery"));
}

#[test]
fn legacy_file_is_migrated() {
    let dir = TempDir::new().unwrap();
    fs::write(
        config_path(&dir),
        r#"{
            "sleep-interval": 1200,
            "gravity-formula": "tilt*0.01",
            "gyro-calibration-data": { "ax": 1, "ay": 2, "az": 3, "gx": 4, "gy": 5, "gz": 6 },
            "formula-calculation-data": {
                "a1": 25.0, "g1": 1.0,
                "a2": 35.0, "g2": 1.011,
                "a3": 45.0, "g3": 1.024,
                "a4": 0, "g4": 1
            }
        }"#,
    )
    .unwrap();

    let mut store = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(store.sleep_interval(), 1200);
    assert_eq!(store.gravity_formula(), "tilt*0.01");
    assert_eq!(store.gyro_calibration().gz, 6);
    assert_eq!(store.formula_data().len(), 3);

    store.save().unwrap();
    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(config_path(&dir)).unwrap()).unwrap();
    assert!(doc.get("formula-calculation-data").is_none());
    assert_eq!(doc["formula_calculation_data"][2]["a"], 45.0);
}

#[test]
fn malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    fs::write(config_path(&dir), "{ \"sleep_interval\": ").unwrap();
    assert!(matches!(JsonConfig::open(config_path(&dir)), Err(StoreError::Parse(_))));

    fs::write(config_path(&dir), r#"{ "sleep_interval": "soon" }"#).unwrap();
    assert!(matches!(JsonConfig::open(config_path(&dir)), Err(StoreError::Parse(_))));
}

#[test]
fn unwritable_path_reports_storage_error() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonConfig::with_defaults(dir.path().join("missing").join("config.json"));
    assert!(store.save().is_err());
}

#[test]
fn formula_creation_persists_through_the_store() {
    let dir = TempDir::new().unwrap();
    let mut store = JsonConfig::open(config_path(&dir)).unwrap();
    store.set_formula_data(CalibrationSet::from_pairs(&[
        (25.0, 1.0),
        (35.0, 1.011),
        (45.0, 1.024),
        (55.0, 1.039),
        (65.0, 1.056),
    ]));
    // create_formula saves through the provider
    let fitted = create_formula(&mut store).unwrap();

    let reloaded = JsonConfig::open(config_path(&dir)).unwrap();
    assert_eq!(reloaded.gravity_formula(), fitted.as_str());
}

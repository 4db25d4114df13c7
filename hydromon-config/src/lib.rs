//! JSON Persistence for the Device Configuration
//!
//! ## Overview
//!
//! The measurement core only sees configuration through
//! [`ConfigProvider`]. On hosts (and on targets with a filesystem) this crate
//! backs that trait with a JSON document on disk, using the same keys the
//! firmware has always written:
//!
//! ```json
//! {
//!   "sleep_interval": 900,
//!   "gravity_formula": "0.00001000*tilt^2+0.00100000*tilt+1.00000000",
//!   "gravity_temp_adjustment": false,
//!   "gyro_calibration_data": { "ax": 0, "ay": 0, "az": 0, "gx": 0, "gy": 0, "gz": 0 },
//!   "formula_calculation_data": [ { "a": 25.0, "g": 1.0 } ],
//!   "gyro_read_count": 50,
//!   "gyro_moving_threashold": 500,
//!   "formula_max_deviation": 1.6,
//!   "formula_calibration_temp": 20.0
//! }
//! ```
//!
//! ## Foreign Keys
//!
//! The same file carries settings owned by other parts of the firmware
//! (network, push targets, display). Those keys are kept verbatim and written
//! back on [`JsonConfig::write`], so saving a calibration never drops them.
//!
//! ## Legacy Layout
//!
//! Older firmware used hyphenated keys and stored calibration points as a flat
//! object:
//!
//! ```json
//! { "formula-calculation-data": { "a1": 25.0, "g1": 1.0, "a2": 35.0, "g2": 1.011 } }
//! ```
//!
//! [`parse_document`] rewrites hyphens to underscores and converts the flat
//! object into the `formula_calculation_data` array before deserializing.
//!
//! ## Precision
//!
//! `serde_json` is built with `float_roundtrip`, so calibration angles and
//! gravities read back bit-for-bit identical to what was saved.

#![warn(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use hydromon_core::constants::buffers::CALIBRATION_SLOTS;
use hydromon_core::errors::{ConfigError, ConfigResult};
use hydromon_core::{CalibrationSet, ConfigProvider, DeviceConfig, GyroCalibration};
use log::{debug, error, info};
use serde_json::{Map, Value};

/// Key of the calibration array in the current layout
pub const FORMULA_DATA_KEY: &str = "formula_calculation_data";

/// Key of the flat calibration object in the legacy layout
pub const LEGACY_FORMULA_DATA_KEY: &str = "formula-calculation-data";

/// Persistence errors
#[derive(Debug, thiserror_no_std::Error)]
pub enum StoreError {
    /// The file exists but could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The document is not valid JSON or does not match the model
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The top level of the document is not an object
    #[error("Configuration root must be a JSON object")]
    NotAnObject,
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }
}

/// Parse a configuration document, accepting the legacy layout.
///
/// Returns the typed configuration and the normalised top-level object,
/// including keys the model does not know about.
pub fn parse_document(text: &str) -> Result<(DeviceConfig, Map<String, Value>), StoreError> {
    let value: Value = serde_json::from_str(text).map_err(|e| StoreError::Parse(e.to_string()))?;
    let Value::Object(raw) = value else {
        return Err(StoreError::NotAnObject);
    };

    let mut doc = Map::with_capacity(raw.len());
    let mut legacy_points = None;
    for (key, value) in raw {
        if key == LEGACY_FORMULA_DATA_KEY {
            legacy_points = Some(value);
        } else {
            doc.insert(key.replace('-', "_"), value);
        }
    }

    if let Some(flat) = legacy_points {
        debug!(target: "CFG", "Converting legacy calibration layout");
        let set = legacy_formula_data(&flat);
        let array = serde_json::to_value(set).map_err(|e| StoreError::Parse(e.to_string()))?;
        doc.insert(FORMULA_DATA_KEY.to_string(), array);
    }

    let config = serde_json::from_value(Value::Object(doc.clone())).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok((config, doc))
}

/// Convert a flat `{ a1.., g1.. }` object into calibration slots.
///
/// Missing or non-numeric entries leave their slot empty.
pub fn legacy_formula_data(flat: &Value) -> CalibrationSet {
    let mut set = CalibrationSet::new();
    for slot in 0..CALIBRATION_SLOTS {
        let n = slot + 1;
        let angle = flat.get(format!("a{n}")).and_then(number);
        let gravity = flat.get(format!("g{n}")).and_then(number);
        if let (Some(angle), Some(gravity)) = (angle, gravity) {
            set.set(slot, angle, gravity);
        }
    }
    set
}

// Very old files stored numbers as strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Device configuration backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonConfig {
    path: PathBuf,
    config: DeviceConfig,
    // full document as last loaded, for keys owned elsewhere
    document: Map<String, Value>,
}

impl JsonConfig {
    /// Load `path`, falling back to defaults when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self { path: path.into(), config: DeviceConfig::default(), document: Map::new() };
        store.load()?;
        Ok(store)
    }

    /// Defaults bound to `path`, without touching the filesystem
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), config: DeviceConfig::default(), document: Map::new() }
    }

    /// Re-read the file. A missing file resets to defaults.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(target: "CFG", "No configuration at {}, using defaults", self.path.display());
                self.config = DeviceConfig::default();
                self.document = Map::new();
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let (config, document) = parse_document(&text)?;
        self.config = config;
        self.document = document;
        debug!(target: "CFG", "Loaded configuration from {}", self.path.display());
        Ok(())
    }

    /// Serialize the configuration, merged over the foreign keys
    pub fn to_json(&self) -> Result<String, StoreError> {
        let model = serde_json::to_value(&self.config).map_err(|e| StoreError::Parse(e.to_string()))?;
        let mut doc = self.document.clone();
        if let Value::Object(fields) = model {
            doc.extend(fields);
        }
        serde_json::to_string_pretty(&Value::Object(doc)).map_err(|e| StoreError::Parse(e.to_string()))
    }

    /// Write the configuration to its file
    pub fn write(&mut self) -> Result<(), StoreError> {
        let text = self.to_json()?;
        fs::write(&self.path, text).map_err(|e| StoreError::io(&self.path, e))?;
        info!(target: "CFG", "Saved configuration to {}", self.path.display());
        Ok(())
    }

    /// File this store reads and writes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Mutable typed configuration; call [`ConfigProvider::save`] to persist
    pub fn config_mut(&mut self) -> &mut DeviceConfig {
        &mut self.config
    }

    /// A key owned by another part of the firmware
    pub fn foreign(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Drop the file binding
    pub fn into_inner(self) -> DeviceConfig {
        self.config
    }
}

impl ConfigProvider for JsonConfig {
    fn gyro_calibration(&self) -> GyroCalibration {
        self.config.gyro_calibration()
    }

    fn set_gyro_calibration(&mut self, offsets: GyroCalibration) {
        self.config.set_gyro_calibration(offsets);
    }

    fn gravity_formula(&self) -> &str {
        self.config.gravity_formula()
    }

    fn set_gravity_formula(&mut self, formula: &str) -> ConfigResult<()> {
        self.config.set_gravity_formula(formula)
    }

    fn formula_data(&self) -> &CalibrationSet {
        self.config.formula_data()
    }

    fn set_formula_data(&mut self, data: CalibrationSet) {
        self.config.set_formula_data(data);
    }

    fn max_formula_creation_deviation(&self) -> f64 {
        self.config.max_formula_creation_deviation()
    }

    fn set_max_formula_creation_deviation(&mut self, deviation: f64) {
        self.config.set_max_formula_creation_deviation(deviation);
    }

    fn default_calibration_temp(&self) -> f64 {
        self.config.default_calibration_temp()
    }

    fn set_default_calibration_temp(&mut self, temp_c: f64) {
        self.config.set_default_calibration_temp(temp_c);
    }

    fn gyro_sensor_moving_threshold(&self) -> i32 {
        self.config.gyro_sensor_moving_threshold()
    }

    fn set_gyro_sensor_moving_threshold(&mut self, threshold: i32) {
        self.config.set_gyro_sensor_moving_threshold(threshold);
    }

    fn gyro_read_count(&self) -> i32 {
        self.config.gyro_read_count()
    }

    fn set_gyro_read_count(&mut self, count: i32) {
        self.config.set_gyro_read_count(count);
    }

    fn sleep_interval(&self) -> i32 {
        self.config.sleep_interval()
    }

    fn set_sleep_interval(&mut self, seconds: i32) {
        self.config.set_sleep_interval(seconds);
    }

    fn gravity_temp_adjustment(&self) -> bool {
        self.config.gravity_temp_adjustment()
    }

    fn set_gravity_temp_adjustment(&mut self, enabled: bool) {
        self.config.set_gravity_temp_adjustment(enabled);
    }

    fn save(&mut self) -> ConfigResult<()> {
        self.write().map_err(|e| {
            error!(target: "CFG", "{e}");
            match e {
                StoreError::Io { .. } => ConfigError::Storage { reason: "file write failed" },
                StoreError::Parse(_) | StoreError::NotAnObject => ConfigError::Storage { reason: "encoding failed" },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_flat_points_convert() {
        let flat = serde_json::json!({ "a1": 25.0, "g1": 1.0, "a2": "35.5", "g2": 1.011, "a3": 0, "g3": 1 });
        let set = legacy_formula_data(&flat);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).map(|p| p.angle), Some(35.5));
        assert_eq!(set.get(2), None);
    }

    #[test]
    fn hyphenated_keys_are_normalised() {
        let (config, doc) = parse_document(r#"{ "sleep-interval": 300, "wifi-ssid": "brew" }"#).unwrap();
        assert_eq!(config.sleep_interval(), 300);
        assert!(doc.contains_key("wifi_ssid"));
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(matches!(parse_document("[1, 2]"), Err(StoreError::NotAnObject)));
        assert!(matches!(parse_document("{"), Err(StoreError::Parse(_))));
    }
}

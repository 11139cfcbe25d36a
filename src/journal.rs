//! Append-only JSON-lines logs: catalog overlays, experimental runs and the
//! model registry all live in files of one JSON object per line.

use crate::error::{NutriWaveError, Result};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

pub const TIMESTAMP_FIELD: &str = "timestamp_utc";
pub const DEFAULT_RUNS_READ_LIMIT: usize = 500;
pub const DEFAULT_MODELS_READ_LIMIT: usize = 200;

pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record as a single line. Object records without a
    /// `timestamp_utc` field get one.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<Value> {
        let mut value = serde_json::to_value(record)?;
        if let Value::Object(map) = &mut value {
            map.entry(TIMESTAMP_FIELD)
                .or_insert_with(|| Value::String(utc_timestamp()));
        }
        let mut line = serde_json::to_string(&value)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| NutriWaveError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NutriWaveError::io(&self.path, e))?;
        // One write per record keeps concurrent appenders from interleaving lines.
        file.write_all(line.as_bytes())
            .map_err(|e| NutriWaveError::io(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), "appended record");
        Ok(value)
    }

    /// The most recent `limit` records, oldest first. Blank and malformed
    /// lines are skipped; a missing file reads as empty.
    pub fn read(&self, limit: usize) -> Result<Vec<Value>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let text =
            fs::read_to_string(&self.path).map_err(|e| NutriWaveError::io(&self.path, e))?;
        let mut out = vec![];
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => out.push(value),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    "skipping malformed log line: {e}"
                ),
            }
        }
        let skip = out.len().saturating_sub(limit);
        Ok(out.split_off(skip))
    }

    /// Like [`read`](Self::read), keeping only lines that deserialize as `T`.
    pub fn read_as<T: DeserializeOwned>(&self, limit: usize) -> Result<Vec<T>> {
        let mut records: Vec<T> = self
            .read(usize::MAX)?
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<T>(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "skipping record: {e}");
                    None
                }
            })
            .collect();
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RheologyReading {
    #[serde(default)]
    pub syneresis_pct: f64,
    #[serde(default, rename = "G_prime_pa")]
    pub g_prime_pa: f64,
    #[serde(default)]
    pub tau_y_pa: f64,
    #[serde(default, rename = "Lambda")]
    pub lambda: f64,
    #[serde(default = "default_regime")]
    pub regime: String,
}

impl Default for RheologyReading {
    fn default() -> Self {
        Self {
            syneresis_pct: 0.0,
            g_prime_pa: 0.0,
            tau_y_pa: 0.0,
            lambda: 0.0,
            regime: default_regime(),
        }
    }
}

fn default_regime() -> String {
    "partial (Λ<1)".to_string()
}

/// Sensory scores on a 1–5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensoryScores {
    pub beany: u8,
    pub sweet: u8,
    pub smooth: u8,
    pub overall: u8,
}

impl Default for SensoryScores {
    fn default() -> Self {
        Self {
            beany: 3,
            sweet: 3,
            smooth: 3,
            overall: 3,
        }
    }
}

impl SensoryScores {
    pub fn clamped(self) -> Self {
        Self {
            beany: self.beany.clamp(1, 5),
            sweet: self.sweet.clamp(1, 5),
            smooth: self.smooth.clamp(1, 5),
            overall: self.overall.clamp(1, 5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub run_id: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    #[serde(default = "default_tbd")]
    pub strain_id: String,
    #[serde(default)]
    pub ingredient_ids: Vec<String>,
    #[serde(default = "default_fermentation_time_h")]
    pub fermentation_time_h: f64,
    #[serde(default = "default_end_ph")]
    pub end_ph: f64,
    #[serde(default = "default_rheo_method_id")]
    pub rheo_method_id: String,
    #[serde(default)]
    pub rheology: RheologyReading,
    #[serde(default)]
    pub sensory: SensoryScores,
    #[serde(default = "default_outcome_label")]
    pub outcome_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<String>,
}

impl Default for RunRecord {
    fn default() -> Self {
        Self {
            run_id: String::new(),
            product_type: default_product_type(),
            strain_id: default_tbd(),
            ingredient_ids: vec![],
            fermentation_time_h: default_fermentation_time_h(),
            end_ph: default_end_ph(),
            rheo_method_id: default_rheo_method_id(),
            rheology: RheologyReading::default(),
            sensory: SensoryScores::default(),
            outcome_label: default_outcome_label(),
            timestamp_utc: None,
        }
    }
}

impl RunRecord {
    /// Fills a blank run id from the current UTC time and clamps sensory
    /// scores into range.
    pub fn normalized(mut self) -> Self {
        if self.run_id.trim().is_empty() {
            self.run_id = Utc::now().format("RUN-%Y%m%d-%H%M%S").to_string();
        }
        self.sensory = self.sensory.clamped();
        self
    }
}

fn default_product_type() -> String {
    "soy_yogurt".to_string()
}

fn default_tbd() -> String {
    "TBD".to_string()
}

fn default_fermentation_time_h() -> f64 {
    8.0
}

fn default_end_ph() -> f64 {
    4.6
}

fn default_rheo_method_id() -> String {
    "NW-Lambda-v1".to_string()
}

fn default_outcome_label() -> String {
    "iterate".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    #[serde(default)]
    pub model_id: String,
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub target_outputs: Vec<String>,
    #[serde(default = "default_feature_set_version")]
    pub feature_set_version: String,
    #[serde(default = "default_tbd")]
    pub metrics: String,
    #[serde(default)]
    pub deployed: bool,
    #[serde(default = "default_tbd")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<String>,
}

impl ModelRecord {
    pub fn normalized(mut self) -> Self {
        if self.model_id.trim().is_empty() {
            self.model_id = Utc::now().format("MODEL-%Y%m%d-%H%M%S").to_string();
        }
        self
    }
}

fn default_model_type() -> String {
    "rule_scoring".to_string()
}

fn default_feature_set_version() -> String {
    "v1".to_string()
}

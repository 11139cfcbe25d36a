use crate::{
    error::{NutriWaveError, Result},
    formulation::{DEFAULT_CANDIDATE_COUNT, DEFAULT_SHUFFLE_SEED, GenerationSettings},
    journal::{DEFAULT_MODELS_READ_LIMIT, DEFAULT_RUNS_READ_LIMIT},
    ranker::DEFAULT_SHORTLIST_SIZE,
    store::DEFAULT_DATA_DIR,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "nutriwave.json";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const ENV_DATA_DIR: &str = "NUTRIWAVE_DATA_DIR";
pub const ENV_LOG: &str = "NUTRIWAVE_LOG";
pub const ENV_SEED: &str = "NUTRIWAVE_SEED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutriWaveConfig {
    pub data_dir: PathBuf,
    pub candidate_count: usize,
    pub shortlist_size: usize,
    pub shuffle_seed: u64,
    pub runs_read_limit: usize,
    pub models_read_limit: usize,
    pub log_level: String,
}

impl Default for NutriWaveConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            candidate_count: DEFAULT_CANDIDATE_COUNT,
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
            shuffle_seed: DEFAULT_SHUFFLE_SEED,
            runs_read_limit: DEFAULT_RUNS_READ_LIMIT,
            models_read_limit: DEFAULT_MODELS_READ_LIMIT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl NutriWaveConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| NutriWaveError::io(path, e))?;
        serde_json::from_str(&text).map_err(|e| NutriWaveError::json(path, e))
    }

    /// An explicit path must exist; otherwise `nutriwave.json` in the working
    /// directory is used when present, else defaults. Environment overrides
    /// are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.is_file() {
                    Self::load_from_path(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR)
            && !dir.trim().is_empty()
        {
            self.data_dir = PathBuf::from(dir.trim());
        }

        if let Some(level) = lookup(ENV_LOG)
            && !level.trim().is_empty()
        {
            self.log_level = level.trim().to_string();
        }

        if let Some(seed) = lookup(ENV_SEED) {
            match seed.trim().parse::<u64>() {
                Ok(seed) => self.shuffle_seed = seed,
                Err(_) => tracing::warn!("ignoring non-numeric {ENV_SEED}='{seed}'"),
            }
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            candidates: self.candidate_count,
            shortlist_size: self.shortlist_size,
            seed: self.shuffle_seed,
        }
    }
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use skool_engine::{ContentRequest, LoopConfig};
use thiserror::Error;

pub(crate) const RUN_CONFIG_ENV_VAR: &str = "SKOOL_RUN_CONFIG";
pub(crate) const TICKS_ENV_VAR: &str = "SKOOL_TICKS";
pub(crate) const SEED_ENV_VAR: &str = "SKOOL_SEED";
pub(crate) const ENABLED_MODS_ENV_VAR: &str = "SKOOL_ENABLED_MODS";

/// Optional JSON run configuration; every field falls back to the
/// engine default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RunConfigFile {
    pub ticks: Option<u64>,
    pub target_tps: Option<u32>,
    pub max_ticks_per_wake: Option<u32>,
    pub seed: Option<u64>,
    pub metrics_log_interval_ms: Option<u64>,
    pub enabled_mods: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read run config {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid run config {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {var}='{value}': expected an unsigned integer")]
    InvalidEnv { var: &'static str, value: String },
}

/// Builds the loop configuration from defaults, then the file named by
/// `SKOOL_RUN_CONFIG`, then individual env var overrides.
pub(crate) fn load_loop_config(
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoopConfig, ConfigError> {
    let mut config = LoopConfig::default();

    if let Some(path) = env(RUN_CONFIG_ENV_VAR).filter(|value| !value.trim().is_empty()) {
        let path = PathBuf::from(path);
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        apply_file(&mut config, parse_run_config(&path, &raw)?);
    }

    if let Some(value) = env(TICKS_ENV_VAR) {
        config.ticks = parse_u64(TICKS_ENV_VAR, &value)?;
    }
    if let Some(value) = env(SEED_ENV_VAR) {
        config.seed = parse_u64(SEED_ENV_VAR, &value)?;
    }
    if let Some(value) = env(ENABLED_MODS_ENV_VAR) {
        config.content_request = ContentRequest::from_mod_list(&value);
    }

    Ok(config)
}

pub(crate) fn parse_run_config(path: &Path, raw: &str) -> Result<RunConfigFile, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, RunConfigFile>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field: if field.is_empty() { ".".to_string() } else { field },
            source: error.into_inner(),
        }
    })
}

fn apply_file(config: &mut LoopConfig, file: RunConfigFile) {
    if let Some(ticks) = file.ticks {
        config.ticks = ticks;
    }
    if let Some(target_tps) = file.target_tps {
        config.target_tps = target_tps;
    }
    if let Some(max_ticks_per_wake) = file.max_ticks_per_wake {
        config.max_ticks_per_wake = max_ticks_per_wake;
    }
    if let Some(seed) = file.seed {
        config.seed = seed;
    }
    if let Some(interval_ms) = file.metrics_log_interval_ms {
        config.metrics_log_interval = Duration::from_millis(interval_ms);
    }
    if let Some(enabled_mods) = file.enabled_mods {
        config.content_request = ContentRequest { enabled_mods };
    }
}

fn parse_u64(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
        })
}

//! Configuration management (TOML + environment)

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "PODSENTRY_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prometheus: PrometheusConfig,
    pub detection: DetectionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub interval_secs: u64,
    pub contamination: f64,
    pub freshness_secs: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub signal_path: PathBuf,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        PrometheusConfig {
            url: "http://localhost:9090".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            interval_secs: 60,
            contamination: 0.1,
            freshness_secs: 300,
            n_estimators: 100,
            max_samples: 256,
            seed: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            signal_path: PathBuf::from("/shared/anomalous_pods.txt"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(path);
        }
        directories::ProjectDirs::from("", "", "podsentry")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Defaults, then the config file if present, then process env
    pub fn resolve() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PODSENTRY_PROMETHEUS_URL") {
            self.prometheus.url = v.trim().to_string();
        }
        if let Some(v) = get("PODSENTRY_SIGNAL_PATH") {
            self.output.signal_path = PathBuf::from(v.trim());
        }
        override_parsed(&get, "PODSENTRY_QUERY_TIMEOUT_SECS", &mut self.prometheus.timeout_secs)?;
        override_parsed(&get, "PODSENTRY_INTERVAL_SECS", &mut self.detection.interval_secs)?;
        override_parsed(&get, "PODSENTRY_CONTAMINATION", &mut self.detection.contamination)?;
        override_parsed(&get, "PODSENTRY_FRESHNESS_SECS", &mut self.detection.freshness_secs)?;
        override_parsed(&get, "PODSENTRY_N_ESTIMATORS", &mut self.detection.n_estimators)?;
        override_parsed(&get, "PODSENTRY_MAX_SAMPLES", &mut self.detection.max_samples)?;
        override_parsed(&get, "PODSENTRY_SEED", &mut self.detection.seed)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.prometheus.url).map_err(|e| {
            ConfigError::Invalid(format!("prometheus.url {:?}: {}", self.prometheus.url, e))
        })?;
        if self.prometheus.timeout_secs == 0 {
            return Err(ConfigError::Invalid("prometheus.timeout_secs must be > 0".into()));
        }
        let d = &self.detection;
        if d.interval_secs == 0 {
            return Err(ConfigError::Invalid("detection.interval_secs must be > 0".into()));
        }
        if !(d.contamination > 0.0 && d.contamination < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "detection.contamination must be in (0, 1), got {}",
                d.contamination
            )));
        }
        if d.n_estimators == 0 || d.max_samples == 0 {
            return Err(ConfigError::Invalid(
                "detection.n_estimators and detection.max_samples must be > 0".into(),
            ));
        }
        if self.output.signal_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output.signal_path is empty".into()));
        }
        Ok(())
    }

    /// An interval longer than the freshness window drops every sample
    pub fn interval_exceeds_freshness(&self) -> bool {
        self.detection.interval_secs > self.detection.freshness_secs
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.detection.interval_secs)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.detection.freshness_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.prometheus.timeout_secs)
    }
}

fn override_parsed<T, G>(get: &G, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value: raw })?;
    }
    Ok(())
}

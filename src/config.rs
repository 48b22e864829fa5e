use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::reconcile::{ReconcileOptions, DEFAULT_TOLERANCE, MAX_THREAD_LEVEL};
use crate::sources::cedar::DEFAULT_CEDAR_HOST;
use crate::sources::evergreen::DEFAULT_EVERGREEN_HOST;
use crate::sources::http::Credentials;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evergreen: EvergreenConfig,
    #[serde(default)]
    pub cedar: CedarConfig,
    #[serde(default)]
    pub gather: GatherConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvergreenConfig {
    #[serde(default = "default_evergreen_host")]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CedarConfig {
    #[serde(default = "default_cedar_host")]
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherConfig {
    #[serde(default = "default_weeks_back")]
    pub weeks_back: u32,
    #[serde(default = "default_skip_tasks")]
    pub skip_tasks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_excluded_thread_level")]
    pub excluded_thread_level: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub weeks_back: Option<u32>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/perfcheck/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::parse(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(weeks_back) = overrides.weeks_back {
            self.gather.weeks_back = weeks_back;
        }
    }

    /// Both services accept the task-runner credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.evergreen.user.as_str(), self.evergreen.api_key.as_str())
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            tolerance: self.reconcile.tolerance,
            excluded_thread_level: self.reconcile.excluded_thread_level.clone(),
        }
    }
}

impl Default for EvergreenConfig {
    fn default() -> Self {
        Self {
            host: default_evergreen_host(),
            user: String::new(),
            api_key: String::new(),
        }
    }
}

impl Default for CedarConfig {
    fn default() -> Self {
        Self {
            host: default_cedar_host(),
        }
    }
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            weeks_back: default_weeks_back(),
            skip_tasks: default_skip_tasks(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            excluded_thread_level: default_excluded_thread_level(),
        }
    }
}

fn default_evergreen_host() -> String {
    DEFAULT_EVERGREEN_HOST.to_string()
}

fn default_cedar_host() -> String {
    DEFAULT_CEDAR_HOST.to_string()
}

fn default_weeks_back() -> u32 {
    4
}

fn default_skip_tasks() -> Vec<String> {
    vec![
        "genny_auto_tasks".to_string(),
        "genny_patch_tasks".to_string(),
    ]
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_excluded_thread_level() -> String {
    MAX_THREAD_LEVEL.to_string()
}

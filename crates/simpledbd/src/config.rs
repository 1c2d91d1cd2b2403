//! simpledb.toml configuration.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [store]
//! data_dir = "/var/lib/simpledb"
//!
//! [controller]
//! workers = 2
//! resync_interval = "30s"
//! backoff_base = "500ms"
//! backoff_max = "60s"
//!
//! [rollout]
//! enabled = true
//! interval = "1s"
//! step = 1
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use simpledb_controller::{Backoff, ControllerConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub controller: ControllerSection,
    pub rollout: RolloutSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/simpledb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub workers: usize,
    pub resync_interval: String,
    pub backoff_base: String,
    pub backoff_max: String,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            workers: 2,
            resync_interval: "30s".to_string(),
            backoff_base: "500ms".to_string(),
            backoff_max: "60s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutSection {
    pub enabled: bool,
    pub interval: String,
    pub step: i32,
}

impl Default for RolloutSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: "1s".to_string(),
            step: 1,
        }
    }
}

impl OperatorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: OperatorConfig = toml::from_str(content)?;
        config.controller_config()?;
        config.rollout_interval()?;
        Ok(config)
    }

    /// Driver tuning with every duration resolved.
    pub fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let c = &self.controller;
        if c.workers == 0 {
            bail!("controller.workers must be at least 1");
        }
        let resync_interval = duration_field("controller.resync_interval", &c.resync_interval)?;
        let base = duration_field("controller.backoff_base", &c.backoff_base)?;
        let max = duration_field("controller.backoff_max", &c.backoff_max)?;
        if base > max {
            bail!("controller.backoff_base ({base:?}) exceeds controller.backoff_max ({max:?})");
        }
        Ok(ControllerConfig {
            workers: c.workers,
            resync_interval,
            backoff: Backoff::new(base, max),
        })
    }

    pub fn rollout_interval(&self) -> anyhow::Result<Duration> {
        if self.rollout.step < 1 {
            bail!("rollout.step must be at least 1");
        }
        duration_field("rollout.interval", &self.rollout.interval)
    }
}

fn duration_field(name: &str, value: &str) -> anyhow::Result<Duration> {
    match parse_duration(value) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => bail!("{name} must be greater than zero"),
        None => bail!("{name}: invalid duration {value:?} (expected e.g. \"500ms\", \"30s\", \"5m\")"),
    }
}

/// Parse a duration string: "500ms", "30s", "5m", or plain seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

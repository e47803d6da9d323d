//! Agent configuration stored as a human-editable TOML file.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Agent loop configuration (TOML). Missing fields default to sensible
/// values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Target tick period for real-time plans, in milliseconds.
    pub tick_period_ms: u64,

    /// Bounded wait for behaviors to report ready at start.
    pub readiness_timeout_ms: u64,

    /// Poll interval while paused. The pause-latency contract caps this
    /// at 10ms.
    pub pause_poll_ms: u64,

    /// Stop the loop after this many ticks; `None` runs until won, lost, or
    /// stopped.
    pub max_ticks: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 50,
            readiness_timeout_ms: 2_000,
            pause_poll_ms: 10,
            max_ticks: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_period_ms == 0 {
            return Err(anyhow!("tick_period_ms must be > 0"));
        }
        if self.readiness_timeout_ms == 0 {
            return Err(anyhow!("readiness_timeout_ms must be > 0"));
        }
        if self.pause_poll_ms == 0 || self.pause_poll_ms > 10 {
            return Err(anyhow!("pause_poll_ms must be in 1..=10"));
        }
        if self.max_ticks == Some(0) {
            return Err(anyhow!("max_ticks must be > 0 when set"));
        }
        Ok(())
    }
}

/// Load config from a TOML file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let config = AgentConfig::default();
        config.validate()?;
        return Ok(config);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, config: &AgentConfig) -> Result<()> {
    config.validate()?;
    let mut buf = toml::to_string_pretty(config).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

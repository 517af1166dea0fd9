//! Optional TOML settings file for the CLI.

use anyhow::{Context, Result};
use hashchain_core::MiningConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mining: MiningConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Mining flags that override the file when given.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MiningArgs {
    /// Required leading zero hex digits
    #[arg(long)]
    pub difficulty: Option<u32>,
    /// Parallel search workers
    #[arg(long)]
    pub workers: Option<usize>,
    /// Give up after this many attempts
    #[arg(long)]
    pub max_attempts: Option<u64>,
    /// Give up after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl MiningArgs {
    /// `true` when any mining flag was given.
    pub fn is_set(&self) -> bool {
        self.difficulty.is_some()
            || self.workers.is_some()
            || self.max_attempts.is_some()
            || self.timeout_ms.is_some()
    }

    pub fn apply(&self, mut config: MiningConfig) -> MiningConfig {
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.max_attempts.is_some() {
            config.max_attempts = self.max_attempts;
        }
        if self.timeout_ms.is_some() {
            config.timeout_ms = self.timeout_ms;
        }
        config
    }
}

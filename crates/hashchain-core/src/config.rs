//! Proof-of-work settings shared by the miner, the chain and the CLI.

use crate::constants::{DEFAULT_CHECK_INTERVAL, DEFAULT_DIFFICULTY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Required leading `'0'` hex digits.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub max_attempts: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Attempts between cancellation, deadline and budget checks.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            workers: default_workers(),
            max_attempts: None,
            timeout_ms: None,
            check_interval: default_check_interval(),
        }
    }
}

impl MiningConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_workers() -> usize {
    1
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL
}

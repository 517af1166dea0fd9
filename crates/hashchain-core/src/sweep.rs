use crate::config::MiningConfig;
use crate::error::MiningError;
use crate::pow::{CancelToken, Miner};
use crate::{BlockTemplate, Fingerprint};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Result of mining one template at one difficulty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepRecord {
    pub difficulty: u32,
    pub nonce: u64,
    pub fingerprint: Fingerprint,
    pub attempts: u64,
    pub elapsed: Duration,
}

impl SweepRecord {
    pub fn hash_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return self.attempts as f64;
        }
        self.attempts as f64 / secs
    }
}

/// Mines the same template once per difficulty, in order. `config` supplies
/// workers and budgets; its own difficulty is ignored.
pub fn sweep<I>(
    template: &BlockTemplate,
    difficulties: I,
    config: &MiningConfig,
    cancel: &CancelToken,
) -> Result<Vec<SweepRecord>, MiningError>
where
    I: IntoIterator<Item = u32>,
{
    let mut records = Vec::new();
    for difficulty in difficulties {
        let miner = Miner::new(MiningConfig {
            difficulty,
            ..config.clone()
        });
        let outcome = miner.mine(template, cancel)?;
        info!(
            difficulty,
            nonce = outcome.nonce,
            "mining time at difficulty {difficulty}: {:.2} seconds",
            outcome.elapsed.as_secs_f64()
        );
        records.push(SweepRecord {
            difficulty,
            nonce: outcome.nonce,
            fingerprint: outcome.fingerprint,
            attempts: outcome.attempts,
            elapsed: outcome.elapsed,
        });
    }
    Ok(records)
}

/// How a difficulty compares to Bitcoin's history.
pub fn difficulty_note(difficulty: u32) -> Option<&'static str> {
    match difficulty {
        3 => Some("similar to Bitcoin in 2010"),
        5 => Some("similar to Bitcoin in 2011"),
        8 => Some("similar to Bitcoin in 2013 (GPU mining begins)"),
        10 => Some("similar to Bitcoin in 2014 (ASIC mining begins)"),
        12 => Some("large-scale simulation, still below today's Bitcoin"),
        15 => Some("extremely hard, comparable to current real-world difficulty"),
        _ => None,
    }
}

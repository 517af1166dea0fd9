use crate::config::MiningConfig;
use crate::constants::MAX_DIFFICULTY;
use crate::error::MiningError;
use crate::mine::{search_sequential, search_strided, SearchSpace, Stop};
use crate::{Block, BlockTemplate, Fingerprint, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Number of leading zero hex digits (nibbles) in a digest.
pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// Shared stop flag for a running search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MiningOutcome {
    pub nonce: u64,
    pub fingerprint: Fingerprint,
    pub attempts: u64,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Miner {
    config: MiningConfig,
}

impl Miner {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    pub fn with_difficulty(difficulty: u32) -> Self {
        Self::new(MiningConfig::with_difficulty(difficulty))
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Searches nonces upward from 0 for the smallest one whose fingerprint
    /// starts with `difficulty` zero hex digits.
    ///
    /// With several workers the nonce space is split into strides; the
    /// result is still the smallest qualifying nonce unless the search was
    /// interrupted after a hit but before lower strides caught up.
    pub fn mine(
        &self,
        template: &BlockTemplate,
        cancel: &CancelToken,
    ) -> Result<MiningOutcome, MiningError> {
        let difficulty = self.config.difficulty;
        if difficulty > MAX_DIFFICULTY {
            return Err(MiningError::UnreachableDifficulty {
                difficulty,
                max: MAX_DIFFICULTY,
            });
        }

        let started = Instant::now();
        let space = SearchSpace {
            base: template.base_hasher(),
            difficulty,
            max_attempts: self.config.max_attempts,
            deadline: self.config.timeout().map(|t| started + t),
            check_interval: self.config.check_interval.max(1),
            cancel,
        };
        let workers = self.config.workers.max(1) as u64;
        debug!(
            index = template.index,
            difficulty, workers, "starting proof-of-work search"
        );

        let report = if workers == 1 {
            search_sequential(&space)
        } else {
            search_strided(&space, workers)
        };
        let elapsed = started.elapsed();
        let attempts = report.attempts;

        match report.result {
            Ok(found) => {
                let fingerprint = Fingerprint::from_digest(&found.digest);
                info!(
                    index = template.index,
                    nonce = found.nonce,
                    attempts,
                    ?elapsed,
                    "mined block with fingerprint {fingerprint}"
                );
                Ok(MiningOutcome {
                    nonce: found.nonce,
                    fingerprint,
                    attempts,
                    elapsed,
                })
            }
            Err(Stop::Cancelled) => Err(MiningError::Aborted { attempts }),
            Err(Stop::Deadline) => Err(MiningError::Timeout { attempts, elapsed }),
            Err(Stop::Budget(budget)) => Err(MiningError::BudgetExhausted { budget, attempts }),
            Err(Stop::Exhausted) => Err(MiningError::NonceSpaceExhausted { attempts }),
        }
    }

    /// Mines `template` and returns the sealed block.
    pub fn seal(
        &self,
        template: BlockTemplate,
        cancel: &CancelToken,
    ) -> Result<(Block, MiningOutcome), MiningError> {
        let outcome = self.mine(&template, cancel)?;
        let block = template.into_block(Some(outcome.nonce), outcome.fingerprint.clone());
        Ok((block, outcome))
    }
}

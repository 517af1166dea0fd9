use crate::Fingerprint;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no previous block to extend")]
    EmptyChain,
    #[error("block {index} extends {expected} but the chain tip is {actual}")]
    InvalidExtension {
        index: u64,
        expected: Fingerprint,
        actual: Fingerprint,
    },
    #[error("block {index} has the largest index a chain can hold")]
    IndexOverflow { index: u64 },
    #[error("invalid genesis block: {0}")]
    InvalidGenesis(String),
    #[error(transparent)]
    Integrity(#[from] IntegrityViolation),
    #[error(transparent)]
    Mining(#[from] MiningError),
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// First block that failed validation, and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("chain integrity violated at block {index}: {kind}")]
pub struct IntegrityViolation {
    pub index: usize,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViolationKind {
    #[error("stored fingerprint {stored} does not match recomputed {computed}")]
    FingerprintMismatch {
        stored: Fingerprint,
        computed: Fingerprint,
    },
    #[error("previous fingerprint {found} does not match predecessor {expected}")]
    BrokenLink {
        expected: Fingerprint,
        found: Fingerprint,
    },
    #[error("genesis links to {found} instead of the \"0\" sentinel")]
    MissingSentinel { found: Fingerprint },
    #[error("index {found} out of sequence, expected {expected}")]
    OutOfSequence { expected: u64, found: u64 },
    #[error("fingerprint has {found} leading zeros, difficulty requires {required}")]
    InsufficientWork { required: u32, found: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("mining timed out after {elapsed:?} ({attempts} attempts)")]
    Timeout { attempts: u64, elapsed: Duration },
    #[error("mining gave up after exhausting its budget of {budget} attempts")]
    BudgetExhausted { budget: u64, attempts: u64 },
    #[error("mining aborted after {attempts} attempts")]
    Aborted { attempts: u64 },
    #[error("nonce space exhausted after {attempts} attempts")]
    NonceSpaceExhausted { attempts: u64 },
    #[error("difficulty {difficulty} exceeds the {max} hex digits of a fingerprint")]
    UnreachableDifficulty { difficulty: u32, max: u32 },
}

impl MiningError {
    pub fn attempts(&self) -> u64 {
        match self {
            MiningError::Timeout { attempts, .. }
            | MiningError::BudgetExhausted { attempts, .. }
            | MiningError::Aborted { attempts }
            | MiningError::NonceSpaceExhausted { attempts } => *attempts,
            MiningError::UnreachableDifficulty { .. } => 0,
        }
    }
}

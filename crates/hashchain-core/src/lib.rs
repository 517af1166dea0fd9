//! Hash-linked block chain with an optional proof-of-work seal.
//!
//! Blocks are fingerprinted with SHA-256 over the delimiter-free
//! concatenation `{index}{previous_fingerprint}{timestamp}{payload}{nonce}`,
//! integers in base 10, nonce omitted for blocks sealed without work.

pub mod chain;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
mod mine;
pub mod pow;
pub mod shared;
pub mod sweep;
pub mod validate;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub use chain::{create_genesis_block, create_next_block, Chain, SealPolicy};
pub use clock::{Clock, FixedClock, SteppingClock, SystemClock};
pub use config::MiningConfig;
pub use error::{ChainError, IntegrityViolation, MiningError, Result, ViolationKind};
pub use pow::{CancelToken, Miner, MiningOutcome};
pub use shared::SharedChain;
pub use sweep::{difficulty_note, sweep, SweepRecord};
pub use validate::{
    validate_blocks, verify_blocks, verify_genesis, verify_sequence, verify_work,
};

use constants::{GENESIS_PAYLOAD, GENESIS_PREVIOUS_FINGERPRINT};

pub type Hash = [u8; 32];

/// Lowercase hex rendering of a block digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_digest(digest: &Hash) -> Self {
        Self(hex::encode(digest))
    }

    /// The fixed previous-fingerprint carried by every genesis block.
    pub fn sentinel() -> Self {
        Self(GENESIS_PREVIOUS_FINGERPRINT.to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == GENESIS_PREVIOUS_FINGERPRINT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of leading `'0'` hex digits.
    pub fn leading_zeros(&self) -> u32 {
        self.0.bytes().take_while(|b| *b == b'0').count() as u32
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zeros() >= difficulty
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Computes the fingerprint of a block from its fields.
pub fn fingerprint(
    index: u64,
    previous_fingerprint: &Fingerprint,
    timestamp: u64,
    payload: &str,
    nonce: Option<u64>,
) -> Fingerprint {
    let mut hasher = base_hasher(index, previous_fingerprint, timestamp, payload);
    if let Some(nonce) = nonce {
        hasher.update(nonce.to_string());
    }
    Fingerprint::from_digest(&finalize(hasher))
}

fn base_hasher(index: u64, previous: &Fingerprint, timestamp: u64, payload: &str) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string());
    hasher.update(previous.as_str());
    hasher.update(timestamp.to_string());
    hasher.update(payload);
    hasher
}

pub(crate) fn finalize(hasher: Sha256) -> Hash {
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// The fixed fields of a block that has not been sealed yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_fingerprint: Fingerprint,
    pub timestamp: u64,
    pub payload: String,
}

impl BlockTemplate {
    pub fn new(
        index: u64,
        previous_fingerprint: Fingerprint,
        timestamp: u64,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            index,
            previous_fingerprint,
            timestamp,
            payload: payload.into(),
        }
    }

    pub fn genesis(timestamp: u64) -> Self {
        Self::new(0, Fingerprint::sentinel(), timestamp, GENESIS_PAYLOAD)
    }

    /// Template linked to `previous`. Fails only when `previous` already
    /// holds the largest representable index.
    pub fn successor(
        previous: &Block,
        timestamp: u64,
        payload: impl Into<String>,
    ) -> Result<Self> {
        let index = previous
            .index
            .checked_add(1)
            .ok_or(ChainError::IndexOverflow {
                index: previous.index,
            })?;
        Ok(Self::new(
            index,
            previous.fingerprint.clone(),
            timestamp,
            payload,
        ))
    }

    /// Hasher already fed with every field except the nonce.
    pub(crate) fn base_hasher(&self) -> Sha256 {
        base_hasher(
            self.index,
            &self.previous_fingerprint,
            self.timestamp,
            &self.payload,
        )
    }

    pub fn fingerprint(&self, nonce: Option<u64>) -> Fingerprint {
        fingerprint(
            self.index,
            &self.previous_fingerprint,
            self.timestamp,
            &self.payload,
            nonce,
        )
    }

    /// Seals without proof-of-work: no nonce enters the fingerprint.
    pub fn seal_plain(self) -> Block {
        let fingerprint = self.fingerprint(None);
        self.into_block(None, fingerprint)
    }

    pub fn seal(self, nonce: u64) -> Block {
        let fingerprint = self.fingerprint(Some(nonce));
        self.into_block(Some(nonce), fingerprint)
    }

    pub(crate) fn into_block(self, nonce: Option<u64>, fingerprint: Fingerprint) -> Block {
        Block {
            index: self.index,
            previous_fingerprint: self.previous_fingerprint,
            timestamp: self.timestamp,
            payload: self.payload,
            nonce,
            fingerprint,
        }
    }
}

/// One sealed unit of the chain. Fields are fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    previous_fingerprint: Fingerprint,
    timestamp: u64,
    payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<u64>,
    fingerprint: Fingerprint,
}

impl Block {
    /// Rebuilds a block from stored fields without recomputing its
    /// fingerprint. Use the validator to check what was loaded.
    pub fn from_parts(
        index: u64,
        previous_fingerprint: Fingerprint,
        timestamp: u64,
        payload: impl Into<String>,
        nonce: Option<u64>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            index,
            previous_fingerprint,
            timestamp,
            payload: payload.into(),
            nonce,
            fingerprint,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_fingerprint(&self) -> &Fingerprint {
        &self.previous_fingerprint
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_fingerprint.is_sentinel()
    }

    pub fn recompute_fingerprint(&self) -> Fingerprint {
        fingerprint(
            self.index,
            &self.previous_fingerprint,
            self.timestamp,
            &self.payload,
            self.nonce,
        )
    }

    pub fn is_self_consistent(&self) -> bool {
        self.recompute_fingerprint() == self.fingerprint
    }

    pub fn template(&self) -> BlockTemplate {
        BlockTemplate::new(
            self.index,
            self.previous_fingerprint.clone(),
            self.timestamp,
            self.payload.clone(),
        )
    }
}

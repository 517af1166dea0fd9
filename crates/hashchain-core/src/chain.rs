use crate::clock::{Clock, SystemClock};
use crate::config::MiningConfig;
use crate::error::{ChainError, IntegrityViolation, MiningError, Result, ViolationKind};
use crate::pow::{CancelToken, Miner};
use crate::validate::{verify_blocks, verify_genesis, verify_sequence, verify_work};
use crate::{Block, BlockTemplate};
use tracing::{debug, info, warn};

/// How new blocks are sealed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SealPolicy {
    /// No nonce; the fingerprint covers the four fixed fields only.
    #[default]
    Plain,
    /// Every block, genesis included, is mined before it is appended.
    ProofOfWork(Miner),
}

impl SealPolicy {
    pub fn proof_of_work(config: MiningConfig) -> Self {
        SealPolicy::ProofOfWork(Miner::new(config))
    }

    pub fn difficulty(&self) -> Option<u32> {
        match self {
            SealPolicy::Plain => None,
            SealPolicy::ProofOfWork(miner) => Some(miner.difficulty()),
        }
    }

    pub fn seal(
        &self,
        template: BlockTemplate,
        cancel: &CancelToken,
    ) -> std::result::Result<Block, MiningError> {
        match self {
            SealPolicy::Plain => Ok(template.seal_plain()),
            SealPolicy::ProofOfWork(miner) => miner.seal(template, cancel).map(|(block, _)| block),
        }
    }
}

/// Unmined genesis block stamped with the clock's current time.
pub fn create_genesis_block(clock: &dyn Clock) -> Block {
    BlockTemplate::genesis(clock.now_secs()).seal_plain()
}

/// Unmined successor of `previous`. Any payload is accepted verbatim.
pub fn create_next_block(
    previous: Option<&Block>,
    payload: impl Into<String>,
    clock: &dyn Clock,
) -> Result<Block> {
    let previous = previous.ok_or(ChainError::EmptyChain)?;
    Ok(BlockTemplate::successor(previous, clock.now_secs(), payload)?.seal_plain())
}

/// Append-only sequence of owned blocks, never empty.
#[derive(Debug)]
pub struct Chain<C: Clock = SystemClock> {
    blocks: Vec<Block>,
    clock: C,
    policy: SealPolicy,
}

impl<C: Clock> Chain<C> {
    /// Starts a chain with an unmined genesis block.
    pub fn new(clock: C) -> Self {
        let genesis = BlockTemplate::genesis(clock.now_secs()).seal_plain();
        info!("genesis block {}", genesis.fingerprint());
        Self {
            blocks: vec![genesis],
            clock,
            policy: SealPolicy::Plain,
        }
    }

    /// Starts a chain whose genesis block is sealed under `policy`.
    pub fn with_policy(clock: C, policy: SealPolicy) -> Result<Self> {
        Self::with_policy_cancellable(clock, policy, &CancelToken::new())
    }

    /// Like [`Chain::with_policy`], but mining the genesis block stops
    /// with [`MiningError::Aborted`] once `cancel` fires.
    pub fn with_policy_cancellable(
        clock: C,
        policy: SealPolicy,
        cancel: &CancelToken,
    ) -> Result<Self> {
        let template = BlockTemplate::genesis(clock.now_secs());
        let genesis = policy.seal(template, cancel)?;
        info!("genesis block {}", genesis.fingerprint());
        Ok(Self {
            blocks: vec![genesis],
            clock,
            policy,
        })
    }

    /// Adopts blocks loaded from elsewhere after checking them.
    pub fn from_blocks(blocks: Vec<Block>, clock: C, policy: SealPolicy) -> Result<Self> {
        let genesis = blocks
            .first()
            .ok_or_else(|| ChainError::InvalidGenesis("no blocks".to_string()))?;
        if !genesis.is_genesis() {
            return Err(ChainError::InvalidGenesis(format!(
                "block {} with previous fingerprint {} is not a genesis block",
                genesis.index(),
                genesis.previous_fingerprint()
            )));
        }
        let chain = Self {
            blocks,
            clock,
            policy,
        };
        chain.verify()?;
        Ok(chain)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn policy(&self) -> &SealPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Template for the block that would follow the current tip.
    pub fn prepare(&self, payload: impl Into<String>) -> Result<BlockTemplate> {
        BlockTemplate::successor(self.tip(), self.clock.now_secs(), payload)
    }

    pub fn append(&mut self, payload: impl Into<String>) -> Result<&Block> {
        self.append_with_cancel(payload, &CancelToken::new())
    }

    pub fn append_with_cancel(
        &mut self,
        payload: impl Into<String>,
        cancel: &CancelToken,
    ) -> Result<&Block> {
        let template = self.prepare(payload)?;
        let block = self.policy.seal(template, cancel)?;
        self.push(block);
        Ok(self.tip())
    }

    /// Appends a block built outside the chain. It must extend the current
    /// tip, be self-consistent, and meet the policy's difficulty.
    pub fn append_block(&mut self, block: Block) -> Result<&Block> {
        let tip = self.tip();
        if tip.index().checked_add(1) != Some(block.index())
            || block.previous_fingerprint() != tip.fingerprint()
        {
            warn!(
                index = block.index(),
                "rejecting stale extension of {}",
                block.previous_fingerprint()
            );
            return Err(ChainError::InvalidExtension {
                index: block.index(),
                expected: block.previous_fingerprint().clone(),
                actual: tip.fingerprint().clone(),
            });
        }

        let position = self.blocks.len();
        let computed = block.recompute_fingerprint();
        if &computed != block.fingerprint() {
            return Err(IntegrityViolation {
                index: position,
                kind: ViolationKind::FingerprintMismatch {
                    stored: block.fingerprint().clone(),
                    computed,
                },
            }
            .into());
        }
        if let Some(required) = self.policy.difficulty() {
            let found = block.fingerprint().leading_zeros();
            if found < required {
                return Err(IntegrityViolation {
                    index: position,
                    kind: ViolationKind::InsufficientWork { required, found },
                }
                .into());
            }
        }

        self.push(block);
        Ok(self.tip())
    }

    fn push(&mut self, block: Block) {
        debug!(
            index = block.index(),
            previous = %block.previous_fingerprint(),
            "appending block"
        );
        info!("block {} sealed as {}", block.index(), block.fingerprint());
        self.blocks.push(block);
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Index sequence, the genesis sentinel, fingerprints and linkage, plus
    /// the policy's difficulty on every block after genesis.
    pub fn verify(&self) -> std::result::Result<(), IntegrityViolation> {
        verify_sequence(&self.blocks)?;
        verify_genesis(&self.blocks)?;
        verify_blocks(&self.blocks)?;
        if let Some(difficulty) = self.policy.difficulty() {
            verify_work(&self.blocks, difficulty)?;
        }
        Ok(())
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

impl<'a, C: Clock> IntoIterator for &'a Chain<C> {
    type Item = &'a Block;
    type IntoIter = std::slice::Iter<'a, Block>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SteppingClock};
    use crate::constants::GENESIS_PAYLOAD;
    use crate::validate::validate_blocks;
    use crate::Fingerprint;

    #[test]
    fn genesis_block_example() {
        let genesis = create_genesis_block(&FixedClock(1_700_000_000));
        assert_eq!(genesis.index(), 0);
        assert!(genesis.previous_fingerprint().is_sentinel());
        assert_eq!(genesis.payload(), GENESIS_PAYLOAD);
        assert_eq!(genesis.timestamp(), 1_700_000_000);
        assert!(genesis.is_self_consistent());
    }

    #[test]
    fn next_block_requires_previous() {
        let clock = FixedClock(5);
        assert_eq!(
            create_next_block(None, "orphan", &clock).unwrap_err(),
            ChainError::EmptyChain
        );
        let genesis = create_genesis_block(&clock);
        let next = create_next_block(Some(&genesis), "", &clock).unwrap();
        assert_eq!(next.index(), 1);
        assert_eq!(next.payload(), "");
        assert_eq!(next.previous_fingerprint(), genesis.fingerprint());
    }

    #[test]
    fn next_block_after_last_index_is_an_error() {
        let last = Block::from_parts(
            u64::MAX,
            Fingerprint::sentinel(),
            1,
            "x",
            None,
            Fingerprint::from("ff"),
        );
        assert_eq!(
            create_next_block(Some(&last), "y", &FixedClock(2)).unwrap_err(),
            ChainError::IndexOverflow { index: u64::MAX }
        );
    }

    #[test]
    fn append_after_last_index_leaves_chain_untouched() {
        let last = BlockTemplate::new(u64::MAX, Fingerprint::sentinel(), 1, "x").seal_plain();
        let mut chain = Chain {
            blocks: vec![last],
            clock: FixedClock(2),
            policy: SealPolicy::Plain,
        };
        let err = chain.append("y").unwrap_err();
        assert_eq!(err, ChainError::IndexOverflow { index: u64::MAX });
        assert_eq!(chain.len(), 1);

        let stray = BlockTemplate::new(0, chain.tip().fingerprint().clone(), 2, "y").seal_plain();
        assert!(matches!(
            chain.append_block(stray).unwrap_err(),
            ChainError::InvalidExtension { .. }
        ));
    }

    #[test]
    fn append_links_blocks() {
        let mut chain = Chain::new(SteppingClock::new(100, 1));
        chain.append("A").unwrap();
        chain.append("B").unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.tip().timestamp(), 102);
        assert_eq!(
            chain.blocks()[2].previous_fingerprint(),
            chain.blocks()[1].fingerprint()
        );
        assert!(chain.validate());
        assert_eq!(chain.get(1).map(Block::payload), Some("A"));
        assert!(chain.get(9).is_none());
    }

    #[test]
    fn proof_of_work_policy_mines_every_block() {
        let policy = SealPolicy::proof_of_work(MiningConfig::with_difficulty(2));
        let mut chain = Chain::with_policy(FixedClock(1_700_000_000), policy).unwrap();
        assert_eq!(chain.genesis().nonce(), Some(168));
        chain.append("mined").unwrap();
        for block in &chain {
            assert!(block.fingerprint().meets_difficulty(2));
            assert!(block.nonce().is_some());
        }
        assert!(chain.validate());
    }

    #[test]
    fn cancelled_genesis_mining_is_aborted() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let policy = SealPolicy::proof_of_work(MiningConfig::with_difficulty(12));
        let err = Chain::with_policy_cancellable(FixedClock(1), policy, &cancel).unwrap_err();
        assert!(matches!(err, ChainError::Mining(MiningError::Aborted { .. })));
    }

    #[test]
    fn plain_genesis_ignores_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let chain =
            Chain::with_policy_cancellable(FixedClock(1), SealPolicy::Plain, &cancel).unwrap();
        assert_eq!(chain.genesis().nonce(), None);
    }

    #[test]
    fn proof_of_work_budget_failure_leaves_chain_untouched() {
        let config = MiningConfig {
            difficulty: 64,
            max_attempts: Some(10),
            ..MiningConfig::default()
        };
        let mut chain = Chain::new(FixedClock(1));
        chain.policy = SealPolicy::proof_of_work(config);
        let err = chain.append("never").unwrap_err();
        assert!(matches!(
            err,
            ChainError::Mining(MiningError::BudgetExhausted { budget: 10, .. })
        ));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn append_block_rejects_stale_tip() {
        let mut chain = Chain::new(FixedClock(1));
        let stale = chain.prepare("first").unwrap().seal_plain();
        chain.append("winner").unwrap();
        let err = chain.append_block(stale).unwrap_err();
        assert!(matches!(err, ChainError::InvalidExtension { index: 1, .. }));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn append_block_rejects_forged_fingerprint() {
        let mut chain = Chain::new(FixedClock(1));
        let t = chain.prepare("x").unwrap();
        let forged = Block::from_parts(
            t.index,
            t.previous_fingerprint,
            t.timestamp,
            t.payload,
            None,
            Fingerprint::from("00"),
        );
        let err = chain.append_block(forged).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Integrity(IntegrityViolation {
                index: 1,
                kind: ViolationKind::FingerprintMismatch { .. }
            })
        ));
    }

    #[test]
    fn append_block_enforces_difficulty() {
        let policy = SealPolicy::proof_of_work(MiningConfig::with_difficulty(1));
        let mut chain = Chain::with_policy(FixedClock(1_700_000_000), policy).unwrap();
        let mut nonce = 0;
        let unmined = loop {
            let block = chain.prepare("lazy").unwrap().seal(nonce);
            if block.fingerprint().leading_zeros() == 0 {
                break block;
            }
            nonce += 1;
        };
        let err = chain.append_block(unmined).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Integrity(IntegrityViolation {
                kind: ViolationKind::InsufficientWork { required: 1, found: 0 },
                ..
            })
        ));
    }

    #[test]
    fn from_blocks_round_trip() {
        let mut chain = Chain::new(SteppingClock::new(10, 10));
        chain.append("A").unwrap();
        chain.append("B").unwrap();
        let blocks = chain.into_blocks();
        let restored = Chain::from_blocks(blocks.clone(), FixedClock(99), SealPolicy::Plain).unwrap();
        assert_eq!(restored.blocks(), &blocks[..]);
    }

    #[test]
    fn verify_requires_genesis_sentinel() {
        let genesis = BlockTemplate::new(0, Fingerprint::from("deadbeef"), 1, GENESIS_PAYLOAD)
            .seal_plain();
        let next = BlockTemplate::successor(&genesis, 2, "A").unwrap().seal_plain();
        let chain = Chain {
            blocks: vec![genesis, next],
            clock: FixedClock(3),
            policy: SealPolicy::Plain,
        };
        assert!(validate_blocks(chain.blocks()));
        let violation = chain.verify().unwrap_err();
        assert_eq!(violation.index, 0);
        assert_eq!(
            violation.kind,
            ViolationKind::MissingSentinel {
                found: Fingerprint::from("deadbeef")
            }
        );
        assert!(!chain.validate());
    }

    #[test]
    fn from_blocks_rejects_missing_genesis() {
        let err = Chain::from_blocks(vec![], FixedClock(0), SealPolicy::Plain).unwrap_err();
        assert!(matches!(err, ChainError::InvalidGenesis(_)));

        let mut chain = Chain::new(FixedClock(0));
        chain.append("A").unwrap();
        let tail = chain.into_blocks().split_off(1);
        let err = Chain::from_blocks(tail, FixedClock(0), SealPolicy::Plain).unwrap_err();
        assert!(matches!(err, ChainError::InvalidGenesis(_)));
    }
}

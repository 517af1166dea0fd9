//! Chain integrity checks.
//!
//! The genesis block is never checked on its own: a chain of zero or one
//! blocks is valid.

use crate::error::{IntegrityViolation, ViolationKind};
use crate::Block;
use tracing::warn;

/// `true` iff every block after genesis carries its own fingerprint and
/// links to its predecessor's.
pub fn validate_blocks(blocks: &[Block]) -> bool {
    verify_blocks(blocks).is_ok()
}

/// Like [`validate_blocks`] but names the first offending block. The
/// self-fingerprint check runs before the linkage check.
pub fn verify_blocks(blocks: &[Block]) -> Result<(), IntegrityViolation> {
    for (index, pair) in blocks.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        let index = index + 1;

        let computed = current.recompute_fingerprint();
        if &computed != current.fingerprint() {
            return Err(violation(
                index,
                ViolationKind::FingerprintMismatch {
                    stored: current.fingerprint().clone(),
                    computed,
                },
            ));
        }
        if current.previous_fingerprint() != previous.fingerprint() {
            return Err(violation(
                index,
                ViolationKind::BrokenLink {
                    expected: previous.fingerprint().clone(),
                    found: current.previous_fingerprint().clone(),
                },
            ));
        }
    }
    Ok(())
}

/// The first block, if any, must link to the genesis sentinel.
pub fn verify_genesis(blocks: &[Block]) -> Result<(), IntegrityViolation> {
    match blocks.first() {
        Some(genesis) if !genesis.previous_fingerprint().is_sentinel() => Err(violation(
            0,
            ViolationKind::MissingSentinel {
                found: genesis.previous_fingerprint().clone(),
            },
        )),
        _ => Ok(()),
    }
}

/// Every block's index must equal its position.
pub fn verify_sequence(blocks: &[Block]) -> Result<(), IntegrityViolation> {
    for (position, block) in blocks.iter().enumerate() {
        if block.index() != position as u64 {
            return Err(violation(
                position,
                ViolationKind::OutOfSequence {
                    expected: position as u64,
                    found: block.index(),
                },
            ));
        }
    }
    Ok(())
}

/// Every block after genesis must meet `difficulty`.
pub fn verify_work(blocks: &[Block], difficulty: u32) -> Result<(), IntegrityViolation> {
    for (index, block) in blocks.iter().enumerate().skip(1) {
        let found = block.fingerprint().leading_zeros();
        if found < difficulty {
            return Err(violation(
                index,
                ViolationKind::InsufficientWork {
                    required: difficulty,
                    found,
                },
            ));
        }
    }
    Ok(())
}

fn violation(index: usize, kind: ViolationKind) -> IntegrityViolation {
    let violation = IntegrityViolation { index, kind };
    warn!("{violation}");
    violation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockTemplate, Fingerprint};

    fn build(len: usize) -> Vec<Block> {
        let mut blocks = vec![BlockTemplate::genesis(1_000).seal_plain()];
        for i in 1..len {
            let previous = &blocks[i - 1];
            let next = BlockTemplate::successor(previous, 1_000 + i as u64, format!("payload {i}"))
                .unwrap()
                .seal_plain();
            blocks.push(next);
        }
        blocks
    }

    #[test]
    fn empty_and_single_block_chains_are_valid() {
        assert!(validate_blocks(&[]));
        assert!(validate_blocks(&build(1)));
    }

    #[test]
    fn genesis_is_not_checked() {
        let forged = Block::from_parts(
            0,
            Fingerprint::sentinel(),
            1,
            "whatever",
            None,
            Fingerprint::from("not a digest"),
        );
        assert!(validate_blocks(&[forged]));
    }

    #[test]
    fn built_chain_is_valid() {
        let blocks = build(5);
        assert!(validate_blocks(&blocks));
        assert!(verify_sequence(&blocks).is_ok());
    }

    #[test]
    fn tampered_payload_is_fingerprint_mismatch() {
        let mut blocks = build(4);
        let b = &blocks[2];
        blocks[2] = Block::from_parts(
            b.index(),
            b.previous_fingerprint().clone(),
            b.timestamp(),
            "forged",
            b.nonce(),
            b.fingerprint().clone(),
        );
        let err = verify_blocks(&blocks).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(matches!(err.kind, ViolationKind::FingerprintMismatch { .. }));
    }

    #[test]
    fn replaced_fingerprint_is_reported_at_first_index() {
        let mut blocks = build(4);
        let b = &blocks[1];
        blocks[1] = Block::from_parts(
            b.index(),
            b.previous_fingerprint().clone(),
            b.timestamp(),
            b.payload(),
            b.nonce(),
            Fingerprint::from("deadbeef"),
        );
        let err = verify_blocks(&blocks).unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(
            err.kind,
            ViolationKind::FingerprintMismatch {
                stored: Fingerprint::from("deadbeef"),
                computed: blocks[1].recompute_fingerprint(),
            }
        );
    }

    #[test]
    fn reseal_of_tampered_block_breaks_next_link() {
        let mut blocks = build(4);
        let mut template = blocks[1].template();
        template.payload = "forged".to_string();
        blocks[1] = template.seal_plain();
        let err = verify_blocks(&blocks).unwrap_err();
        assert_eq!(err.index, 2);
        assert!(matches!(err.kind, ViolationKind::BrokenLink { .. }));
    }

    #[test]
    fn sequence_gap_is_reported() {
        let mut blocks = build(3);
        let mut template = blocks[2].template();
        template.index = 7;
        blocks[2] = template.seal_plain();
        assert!(validate_blocks(&blocks));
        let err = verify_sequence(&blocks).unwrap_err();
        assert_eq!(
            err.kind,
            ViolationKind::OutOfSequence {
                expected: 2,
                found: 7
            }
        );
    }

    #[test]
    fn genesis_must_carry_sentinel() {
        assert!(verify_genesis(&[]).is_ok());
        assert!(verify_genesis(&build(3)).is_ok());

        let mut blocks = build(2);
        let mut template = blocks[0].template();
        template.previous_fingerprint = Fingerprint::from("deadbeef");
        blocks[0] = template.seal_plain();
        let err = verify_genesis(&blocks).unwrap_err();
        assert_eq!(err.index, 0);
        assert!(matches!(err.kind, ViolationKind::MissingSentinel { .. }));
    }

    #[test]
    fn work_check_skips_genesis() {
        let blocks = build(1);
        assert!(verify_work(&blocks, 64).is_ok());
        let blocks = build(2);
        let err = verify_work(&blocks, 64).unwrap_err();
        assert_eq!(err.index, 1);
    }
}

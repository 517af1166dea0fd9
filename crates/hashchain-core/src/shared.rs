//! A chain that several producers can extend at once.
//!
//! Mining happens outside the lock. The tip is compared again before the
//! append, and a producer whose tip went stale gets
//! [`ChainError::InvalidExtension`] instead of forking the chain.

use crate::chain::Chain;
use crate::clock::{Clock, SystemClock};
use crate::error::{ChainError, Result};
use crate::pow::CancelToken;
use crate::{Block, BlockTemplate, Fingerprint};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub struct SharedChain<C: Clock = SystemClock> {
    inner: Arc<Mutex<Chain<C>>>,
}

impl<C: Clock> Clone for SharedChain<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> SharedChain<C> {
    pub fn new(chain: Chain<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(chain)),
        }
    }

    /// (index, fingerprint) of the current tip.
    pub fn tip(&self) -> (u64, Fingerprint) {
        let chain = self.inner.lock();
        let tip = chain.tip();
        (tip.index(), tip.fingerprint().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.inner.lock().blocks().to_vec()
    }

    pub fn validate(&self) -> bool {
        self.inner.lock().validate()
    }

    /// Runs `f` against the chain while holding the lock.
    pub fn with_chain<R>(&self, f: impl FnOnce(&Chain<C>) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Extends whatever the tip is right now.
    pub fn extend(&self, payload: impl Into<String>, cancel: &CancelToken) -> Result<Block> {
        let (_, tip) = self.tip();
        self.extend_from(&tip, payload, cancel)
    }

    /// Extends the chain only if its tip is still `expected_tip`, both
    /// before mining starts and when the sealed block is appended.
    pub fn extend_from(
        &self,
        expected_tip: &Fingerprint,
        payload: impl Into<String>,
        cancel: &CancelToken,
    ) -> Result<Block> {
        let (template, policy) = {
            let chain = self.inner.lock();
            let tip = chain.tip();
            if tip.fingerprint() != expected_tip {
                return Err(ChainError::InvalidExtension {
                    index: tip.index().saturating_add(1),
                    expected: expected_tip.clone(),
                    actual: tip.fingerprint().clone(),
                });
            }
            let template = BlockTemplate::successor(tip, chain.clock().now_secs(), payload)?;
            (template, chain.policy().clone())
        };

        debug!(index = template.index, "sealing outside the chain lock");
        let block = policy.seal(template, cancel)?;

        let mut chain = self.inner.lock();
        chain.append_block(block).cloned()
    }

    /// Unwraps the chain if this is the last handle.
    pub fn try_into_inner(self) -> std::result::Result<Chain<C>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

use crate::pow::{count_leading_zero_nibbles, CancelToken};
use crate::{finalize, Hash};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Lowest winning nonce found so far; `u64::MAX` means none.
const NOT_FOUND: u64 = u64::MAX;

pub(crate) struct SearchSpace<'a> {
    pub base: Sha256,
    pub difficulty: u32,
    pub max_attempts: Option<u64>,
    pub deadline: Option<Instant>,
    pub check_interval: u64,
    pub cancel: &'a CancelToken,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stop {
    Cancelled,
    Deadline,
    Budget(u64),
    Exhausted,
}

pub(crate) struct Found {
    pub nonce: u64,
    pub digest: Hash,
}

pub(crate) struct SearchReport {
    pub result: Result<Found, Stop>,
    pub attempts: u64,
}

impl SearchSpace<'_> {
    fn digest(&self, nonce: u64) -> Hash {
        let mut hasher = self.base.clone();
        hasher.update(nonce.to_string());
        finalize(hasher)
    }

    fn hits(&self, digest: &Hash) -> bool {
        count_leading_zero_nibbles(digest) >= self.difficulty
    }

    fn interrupted(&self) -> Option<Stop> {
        if self.cancel.is_cancelled() {
            return Some(Stop::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Stop::Deadline),
            _ => None,
        }
    }

    fn over_budget(&self, attempts: u64) -> Option<Stop> {
        match self.max_attempts {
            Some(budget) if attempts >= budget => Some(Stop::Budget(budget)),
            _ => None,
        }
    }
}

pub(crate) fn search_sequential(space: &SearchSpace<'_>) -> SearchReport {
    let mut attempts = 0u64;
    let mut nonce = 0u64;
    loop {
        if attempts % space.check_interval == 0 {
            if let Some(stop) = space.interrupted() {
                return SearchReport {
                    result: Err(stop),
                    attempts,
                };
            }
        }
        if let Some(stop) = space.over_budget(attempts) {
            return SearchReport {
                result: Err(stop),
                attempts,
            };
        }

        let digest = space.digest(nonce);
        attempts += 1;
        if space.hits(&digest) {
            return SearchReport {
                result: Ok(Found { nonce, digest }),
                attempts,
            };
        }
        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => {
                return SearchReport {
                    result: Err(Stop::Exhausted),
                    attempts,
                }
            }
        };
    }
}

/// Worker `w` of `workers` tests nonces `w, w + workers, w + 2 * workers, ...`.
/// A hit lowers the shared best nonce; a worker stops once its next nonce
/// is above it, so lower strides still finish the range below the hit.
pub(crate) fn search_strided(space: &SearchSpace<'_>, workers: u64) -> SearchReport {
    let best = AtomicU64::new(NOT_FOUND);
    let attempts = AtomicU64::new(0);
    let stop = parking_lot::Mutex::new(None::<Stop>);

    (0..workers).into_par_iter().for_each(|worker| {
        let mut nonce = worker;
        let mut local = 0u64;
        loop {
            if nonce >= best.load(Ordering::Acquire) {
                break;
            }
            if local == space.check_interval {
                let total = attempts.fetch_add(local, Ordering::AcqRel) + local;
                local = 0;
                if stop.lock().is_some() {
                    break;
                }
                if let Some(reason) = space.interrupted().or_else(|| space.over_budget(total)) {
                    stop.lock().get_or_insert(reason);
                    break;
                }
            } else if local == 0 {
                if let Some(reason) = space
                    .interrupted()
                    .or_else(|| space.over_budget(attempts.load(Ordering::Acquire)))
                {
                    stop.lock().get_or_insert(reason);
                    break;
                }
            }

            let digest = space.digest(nonce);
            local += 1;
            if space.hits(&digest) {
                best.fetch_min(nonce, Ordering::AcqRel);
                debug!(worker, nonce, "worker found a qualifying nonce");
                break;
            }
            nonce = match nonce.checked_add(workers) {
                Some(next) if next != NOT_FOUND => next,
                _ => {
                    stop.lock().get_or_insert(Stop::Exhausted);
                    break;
                }
            };
        }
        attempts.fetch_add(local, Ordering::AcqRel);
    });

    let attempts = attempts.into_inner();
    let nonce = best.into_inner();
    if nonce != NOT_FOUND {
        return SearchReport {
            result: Ok(Found {
                nonce,
                digest: space.digest(nonce),
            }),
            attempts,
        };
    }
    SearchReport {
        result: Err(stop.into_inner().unwrap_or(Stop::Exhausted)),
        attempts,
    }
}

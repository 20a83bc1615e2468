//! Cost-weighted rate limiting using a token bucket.
//!
//! Tokens are conditional cost units, not requests. One limiter is created at
//! startup and shared by every caller; governor's GCRA state is a single
//! atomic, so admission needs no lock.

use crate::domain::config::RateLimitConfig;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why an acquisition did not deduct any tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("cost {cost} exceeds bucket capacity {capacity}")]
    ExceedsCapacity { cost: u64, capacity: u32 },

    #[error("timed out waiting for capacity")]
    TimedOut,

    #[error("cancelled while waiting for capacity")]
    Cancelled,
}

/// Token bucket denominated in conditional cost.
pub struct CostRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    clock: DefaultClock,
    capacity: u32,
    refill_per_second: u32,
}

impl CostRateLimiter {
    /// Bucket starts full. Zero settings are clamped to 1.
    pub fn new(capacity: u32, refill_per_second: u32) -> Self {
        let burst = NonZeroU32::new(capacity).unwrap_or(NonZeroU32::MIN);
        let rate = NonZeroU32::new(refill_per_second).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rate).allow_burst(burst);
        let clock = DefaultClock::default();

        Self {
            limiter: RateLimiter::direct_with_clock(quota, &clock),
            clock,
            capacity: burst.get(),
            refill_per_second: rate.get(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.capacity, config.refill_per_second)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_per_second(&self) -> u32 {
        self.refill_per_second
    }

    /// Deduct `cost` tokens if they are available right now.
    pub fn try_acquire(&self, cost: u64) -> bool {
        match self.cells(cost) {
            Ok(None) => true,
            Ok(Some(n)) => matches!(self.limiter.check_n(n), Ok(Ok(()))),
            Err(_) => false,
        }
    }

    /// Deduct `cost` tokens, waiting up to `timeout` for them to refill.
    ///
    /// The wait ends early on `cancel`. A failed acquisition never deducts
    /// anything. If the bucket cannot refill enough before the deadline the
    /// call fails immediately instead of sleeping through it.
    pub async fn acquire(
        &self,
        cost: u64,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), AcquireError> {
        let n = match self.cells(cost)? {
            Some(n) => n,
            None => return Ok(()),
        };

        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        match self.limiter.check_n(n) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(not_until)) => {
                // Same clock that produced `not_until`
                let wait = not_until.wait_time_from(self.clock.now());
                if wait > timeout {
                    debug!(cost, wait_ms = wait.as_millis() as u64, "Cost limiter wait exceeds deadline");
                    return Err(AcquireError::TimedOut);
                }
                debug!(cost, wait_ms = wait.as_millis() as u64, "Waiting for cost limiter");
            }
            Err(_) => {
                return Err(AcquireError::ExceedsCapacity {
                    cost,
                    capacity: self.capacity,
                })
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AcquireError::Cancelled),
            waited = tokio::time::timeout(timeout, self.limiter.until_n_ready(n)) => match waited {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(AcquireError::ExceedsCapacity {
                    cost,
                    capacity: self.capacity,
                }),
                Err(_) => Err(AcquireError::TimedOut),
            },
        }
    }

    /// `None` for zero cost, which is always admitted.
    fn cells(&self, cost: u64) -> Result<Option<NonZeroU32>, AcquireError> {
        if cost == 0 {
            return Ok(None);
        }
        if cost > u64::from(self.capacity) {
            return Err(AcquireError::ExceedsCapacity {
                cost,
                capacity: self.capacity,
            });
        }
        // cost <= capacity <= u32::MAX
        Ok(NonZeroU32::new(cost as u32))
    }
}

impl std::fmt::Debug for CostRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostRateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_per_second", &self.refill_per_second)
            .finish()
    }
}

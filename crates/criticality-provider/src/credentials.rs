//! Quota bookkeeping for a rotating set of API tokens.
//!
//! The pool is shared by every concurrent metric task of a run. Reads of the
//! cached credential are lock-light; rotation (checking every token for its
//! quota) is serialized behind an async mutex so only one task performs it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ProviderError;

/// Tokens with fewer remaining calls are treated as near exhaustion.
pub const QUOTA_SAFETY_FLOOR: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitState {
    pub const fn is_near_exhaustion(&self, floor: u64) -> bool {
        self.remaining < floor
    }
}

pub struct CredentialPool {
    tokens: Vec<String>,
    floor: u64,
    states: RwLock<Vec<Option<RateLimitState>>>,
    active: RwLock<Option<usize>>,
    rotation: Mutex<()>,
}

impl CredentialPool {
    pub fn new(tokens: Vec<String>, floor: u64) -> Result<Self, ProviderError> {
        if tokens.is_empty() {
            return Err(ProviderError::Config(
                "at least one API token is required".to_string(),
            ));
        }
        let states = vec![None; tokens.len()];
        Ok(Self {
            tokens,
            floor,
            states: RwLock::new(states),
            active: RwLock::new(None),
            rotation: Mutex::new(()),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub const fn floor(&self) -> u64 {
        self.floor
    }

    pub fn token(&self, idx: usize) -> Option<&str> {
        self.tokens.get(idx).map(String::as_str)
    }

    pub fn state(&self, idx: usize) -> Option<RateLimitState> {
        self.states.read().get(idx).copied().flatten()
    }

    /// The cached credential, unless its last known state is near exhaustion.
    pub fn cached(&self) -> Option<usize> {
        let idx = (*self.active.read())?;
        match self.state(idx) {
            Some(s) if s.is_near_exhaustion(self.floor) => None,
            _ => Some(idx),
        }
    }

    /// Last known state of `idx` when it is near exhaustion and its quota
    /// has not reset yet as of `now`.
    pub fn known_exhausted(&self, idx: usize, now: DateTime<Utc>) -> Option<RateLimitState> {
        self.state(idx)
            .filter(|s| s.is_near_exhaustion(self.floor) && s.reset_at > now)
    }

    pub fn activate(&self, idx: usize) {
        if idx < self.tokens.len() {
            *self.active.write() = Some(idx);
        }
    }

    pub fn record(&self, idx: usize, state: RateLimitState) {
        if let Some(slot) = self.states.write().get_mut(idx) {
            *slot = Some(state);
        }
    }

    /// Drops the cached credential after a quota-exceeded response.
    pub fn invalidate(&self, idx: usize, reset_at: DateTime<Utc>) {
        self.record(
            idx,
            RateLimitState {
                remaining: 0,
                reset_at,
            },
        );
        let mut active = self.active.write();
        if *active == Some(idx) {
            *active = None;
        }
    }

    pub(crate) async fn lock_rotation(&self) -> MutexGuard<'_, ()> {
        self.rotation.lock().await
    }
}

/// Time until the soonest reset among `states`, bounded by `max_wait`.
pub fn soonest_reset_wait(
    states: &[RateLimitState],
    now: DateTime<Utc>,
    max_wait: Duration,
) -> Duration {
    states
        .iter()
        .map(|s| (s.reset_at - now).to_std().unwrap_or(Duration::ZERO))
        .min()
        .unwrap_or(Duration::ZERO)
        // The reset instant is second-granular; wake just after it.
        .saturating_add(Duration::from_secs(1))
        .min(max_wait)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn pool(n: usize) -> CredentialPool {
        let tokens = (0..n).map(|i| format!("t{i}")).collect();
        CredentialPool::new(tokens, QUOTA_SAFETY_FLOOR).expect("pool")
    }

    #[test]
    fn empty_pool_is_a_config_error() {
        assert!(matches!(
            CredentialPool::new(Vec::new(), 50),
            Err(ProviderError::Config(_))
        ));
    }

    #[test]
    fn cached_credential_expires_near_floor() {
        let p = pool(2);
        assert_eq!(p.cached(), None);
        p.activate(1);
        assert_eq!(p.cached(), Some(1));

        let reset_at = Utc::now();
        p.record(
            1,
            RateLimitState {
                remaining: 49,
                reset_at,
            },
        );
        assert_eq!(p.cached(), None);

        p.record(
            1,
            RateLimitState {
                remaining: 50,
                reset_at,
            },
        );
        assert_eq!(p.cached(), Some(1));

        p.invalidate(1, reset_at);
        assert_eq!(p.cached(), None);
        assert_eq!(p.state(1).map(|s| s.remaining), Some(0));
    }

    #[test]
    fn exhausted_until_reset() {
        let p = pool(2);
        let now = Utc::now();
        assert_eq!(p.known_exhausted(0, now), None);

        p.invalidate(0, now + TimeDelta::seconds(300));
        assert_eq!(p.known_exhausted(0, now).map(|s| s.remaining), Some(0));
        assert_eq!(p.known_exhausted(0, now + TimeDelta::seconds(301)), None);

        p.record(
            1,
            RateLimitState {
                remaining: 4000,
                reset_at: now + TimeDelta::seconds(300),
            },
        );
        assert_eq!(p.known_exhausted(1, now), None);
    }

    #[test]
    fn waits_for_the_soonest_reset() {
        let now = Utc::now();
        let states = [
            RateLimitState {
                remaining: 0,
                reset_at: now + TimeDelta::seconds(600),
            },
            RateLimitState {
                remaining: 3,
                reset_at: now + TimeDelta::seconds(120),
            },
        ];
        let wait = soonest_reset_wait(&states, now, Duration::from_secs(3600));
        assert_eq!(wait, Duration::from_secs(121));

        let capped = soonest_reset_wait(&states, now, Duration::from_secs(60));
        assert_eq!(capped, Duration::from_secs(60));

        let past = [RateLimitState {
            remaining: 0,
            reset_at: now - TimeDelta::seconds(30),
        }];
        assert_eq!(
            soonest_reset_wait(&past, now, Duration::from_secs(60)),
            Duration::from_secs(1)
        );
    }
}

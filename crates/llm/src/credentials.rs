//! Shared credential pool with rate-limit rotation.
//!
//! One pool is built per process and shared (behind an `Arc`) by every
//! question being answered. Each credential carries the instant until which it
//! is rate limited; selection scans round-robin from a cursor so load spreads
//! across keys.

use docask_core::{AppError, AppResult};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// A credential handed out by the pool.
#[derive(Clone)]
pub struct Credential {
    /// Position of the credential in the pool
    pub index: usize,
    secret: Option<String>,
}

impl Credential {
    /// The bearer secret, `None` for anonymous pools.
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("index", &self.index)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Result of asking the pool for a credential.
#[derive(Debug, Clone)]
pub enum CredentialSelection {
    /// A credential that is not currently rate limited
    Available(Credential),

    /// Every credential is rate limited; the earliest frees up after `wait`
    Exhausted { wait: Duration },
}

struct Slot {
    secret: Option<String>,
    rate_limited_until: Option<Instant>,
}

struct PoolState {
    slots: Vec<Slot>,
    cursor: usize,
}

/// Round-robin credential pool shared across concurrent questions.
pub struct CredentialPool {
    state: Mutex<PoolState>,
}

impl CredentialPool {
    /// Create a pool from a list of secrets.
    ///
    /// # Errors
    /// Returns a configuration error when `secrets` is empty.
    pub fn new(secrets: Vec<String>) -> AppResult<Self> {
        if secrets.is_empty() {
            return Err(AppError::Config(
                "Credential pool needs at least one credential".to_string(),
            ));
        }

        Ok(Self::from_slots(secrets.into_iter().map(Some).collect()))
    }

    /// Create a single-slot pool for providers that need no credential.
    ///
    /// Rate limits reported by such providers are still honoured.
    pub fn anonymous() -> Self {
        Self::from_slots(vec![None])
    }

    fn from_slots(secrets: Vec<Option<String>>) -> Self {
        let slots = secrets
            .into_iter()
            .map(|secret| Slot {
                secret,
                rate_limited_until: None,
            })
            .collect();

        Self {
            state: Mutex::new(PoolState { slots, cursor: 0 }),
        }
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select the next credential that is not rate limited.
    ///
    /// Scans at most one full turn starting at the cursor. The cursor moves
    /// past the returned credential, so consecutive calls rotate.
    pub fn select(&self) -> CredentialSelection {
        let now = Instant::now();
        let mut state = self.lock();
        let count = state.slots.len();

        for _ in 0..count {
            let index = state.cursor;
            state.cursor = (state.cursor + 1) % count;

            let slot = &state.slots[index];
            let available = slot.rate_limited_until.map_or(true, |until| now >= until);
            if available {
                return CredentialSelection::Available(Credential {
                    index,
                    secret: slot.secret.clone(),
                });
            }
        }

        let wait = state
            .slots
            .iter()
            .filter_map(|slot| slot.rate_limited_until)
            .map(|until| until.saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::ZERO);

        CredentialSelection::Exhausted { wait }
    }

    /// Mark a credential as rate limited for `window` from now.
    ///
    /// Unknown indexes are ignored.
    pub fn mark_rate_limited(&self, index: usize, window: Duration) {
        let until = Instant::now() + window;
        let mut state = self.lock();
        if let Some(slot) = state.slots.get_mut(index) {
            slot.rate_limited_until = Some(until);
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Pool state stays consistent even if a holder panicked mid-update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("CredentialPool")
            .field("credentials", &state.slots.len())
            .field("cursor", &state.cursor)
            .finish()
    }
}

/// Whole seconds a caller should wait, rounded up and never below one.
pub fn wait_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> CredentialPool {
        CredentialPool::new((0..n).map(|i| format!("key-{}", i)).collect()).unwrap()
    }

    fn selected_index(selection: CredentialSelection) -> usize {
        match selection {
            CredentialSelection::Available(credential) => credential.index,
            CredentialSelection::Exhausted { wait } => panic!("unexpected exhaustion: {:?}", wait),
        }
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(CredentialPool::new(Vec::new()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_rotates_round_robin() {
        let pool = pool(3);
        let order: Vec<usize> = (0..4).map(|_| selected_index(pool.select())).collect();
        assert_eq!(order, vec![0, 1, 2, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_skips_rate_limited() {
        let pool = pool(3);
        pool.mark_rate_limited(0, Duration::from_secs(30));
        pool.mark_rate_limited(1, Duration::from_secs(30));

        assert_eq!(selected_index(pool.select()), 2);
        assert_eq!(selected_index(pool.select()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_minimum_wait() {
        let pool = pool(2);
        pool.mark_rate_limited(0, Duration::from_secs(40));
        pool.mark_rate_limited(1, Duration::from_secs(15));

        match pool.select() {
            CredentialSelection::Exhausted { wait } => assert_eq!(wait, Duration::from_secs(15)),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_recovers_after_window() {
        let pool = pool(1);
        pool.mark_rate_limited(0, Duration::from_secs(10));
        assert!(matches!(pool.select(), CredentialSelection::Exhausted { .. }));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(selected_index(pool.select()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_anonymous_pool_has_no_secret() {
        let pool = CredentialPool::anonymous();
        match pool.select() {
            CredentialSelection::Available(credential) => assert!(credential.secret().is_none()),
            other => panic!("expected credential, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_masks_secret() {
        let credential = Credential {
            index: 0,
            secret: Some("gsk-very-secret".to_string()),
        };
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("gsk-very-secret"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_stays_in_bounds() {
        let pool = std::sync::Arc::new(pool(3));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    (0..200).map(|_| selected_index(pool.select())).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = [0usize; 3];
        for handle in handles {
            for index in handle.await.unwrap() {
                counts[index] += 1;
            }
        }
        assert_eq!(counts.iter().sum::<usize>(), 8 * 200);
        assert!(counts.iter().all(|&n| n > 0));

        let handles: Vec<_> = (0..3)
            .map(|index| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.mark_rate_limited(index, Duration::from_secs(60)) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.select() })
            })
            .collect();
        for handle in handles {
            match handle.await.unwrap() {
                CredentialSelection::Exhausted { wait } => {
                    assert!(wait <= Duration::from_secs(60));
                    assert!(wait > Duration::from_secs(50));
                }
                CredentialSelection::Available(credential) => {
                    panic!("credential #{} should be rate limited", credential.index)
                }
            }
        }
    }

    #[test]
    fn test_wait_secs_rounds_up() {
        assert_eq!(wait_secs(Duration::ZERO), 1);
        assert_eq!(wait_secs(Duration::from_millis(14_200)), 15);
        assert_eq!(wait_secs(Duration::from_secs(60)), 60);
    }
}

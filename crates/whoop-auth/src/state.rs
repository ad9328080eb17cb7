//! One-time state nonces for the authorization round trip
//!
//! Every authorization URL carries a fresh random `state`. The callback must
//! echo a nonce that this tracker issued, that has not been redeemed, and that
//! is younger than the TTL. `consume` removes the entry under the lock, so two
//! racing callbacks with the same nonce cannot both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Clock;
use rand::RngExt;
use tokio::sync::Mutex;
use tracing::debug;

/// An issued nonce awaiting its callback.
struct PendingAuthorization {
    created_at: u64,
}

/// Issues and redeems CSRF state nonces.
pub struct StateTracker {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
}

impl StateTracker {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a nonce, remember it, and return it for the authorization URL.
    pub async fn issue(&self) -> String {
        let nonce = generate_nonce();
        let now = self.clock.now_millis();

        let mut pending = self.pending.lock().await;
        // Lazy cleanup: drop expired entries while holding the lock
        pending.retain(|_, p| self.is_live(p, now));
        pending.insert(nonce.clone(), PendingAuthorization { created_at: now });

        debug!(pending = pending.len(), "state nonce issued");
        nonce
    }

    /// Redeem a nonce. True exactly once per issued nonce, and only within the TTL.
    pub async fn consume(&self, nonce: &str) -> bool {
        let now = self.clock.now_millis();
        let removed = self.pending.lock().await.remove(nonce);
        match removed {
            Some(p) if self.is_live(&p, now) => true,
            Some(_) => {
                debug!("state nonce expired");
                false
            }
            None => false,
        }
    }

    /// Number of nonces still awaiting a callback (expired ones included until cleanup).
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    fn is_live(&self, p: &PendingAuthorization, now: u64) -> bool {
        now.saturating_sub(p.created_at) < self.ttl.as_millis() as u64
    }
}

/// 32 random bytes as URL-safe base64 without padding (43 characters).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::MockClock;

    fn tracker(clock: &MockClock) -> StateTracker {
        StateTracker::new(Duration::from_secs(600), Arc::new(clock.clone()))
    }

    #[test]
    fn nonce_is_url_safe_base64() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 43);
        assert!(
            nonce
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "nonce must be URL-safe base64 (no padding): {nonce}"
        );
    }

    #[test]
    fn nonces_are_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[tokio::test]
    async fn issued_nonce_consumes_exactly_once() {
        let clock = MockClock::at(1_000_000);
        let states = tracker(&clock);

        let nonce = states.issue().await;
        assert!(states.consume(&nonce).await);
        assert!(!states.consume(&nonce).await, "second consume must fail");
        assert_eq!(states.pending().await, 0);
    }

    #[tokio::test]
    async fn unknown_nonce_is_rejected() {
        let clock = MockClock::at(1_000_000);
        let states = tracker(&clock);
        states.issue().await;

        let long = "x".repeat(43);
        for candidate in ["", "abc123", "../../etc/passwd", long.as_str()] {
            assert!(!states.consume(candidate).await, "accepted {candidate:?}");
        }
        assert_eq!(states.pending().await, 1, "failed lookups must not evict");
    }

    #[tokio::test]
    async fn nonce_expires_after_ttl() {
        let clock = MockClock::at(1_000_000);
        let states = tracker(&clock);

        let nonce = states.issue().await;
        clock.advance(Duration::from_secs(600));
        assert!(!states.consume(&nonce).await, "nonce at TTL must be expired");
    }

    #[tokio::test]
    async fn nonce_valid_just_inside_ttl() {
        let clock = MockClock::at(1_000_000);
        let states = tracker(&clock);

        let nonce = states.issue().await;
        clock.advance(Duration::from_secs(599));
        assert!(states.consume(&nonce).await);
    }

    #[tokio::test]
    async fn issue_sweeps_expired_entries() {
        let clock = MockClock::at(1_000_000);
        let states = tracker(&clock);

        states.issue().await;
        states.issue().await;
        clock.advance(Duration::from_secs(601));
        states.issue().await;

        assert_eq!(states.pending().await, 1);
    }

    #[tokio::test]
    async fn concurrent_consumers_of_one_nonce_have_one_winner() {
        let clock = MockClock::at(1_000_000);
        let states = Arc::new(tracker(&clock));
        let nonce = states.issue().await;

        let mut handles = vec![];
        for _ in 0..16 {
            let states = states.clone();
            let nonce = nonce.clone();
            handles.push(tokio::spawn(async move { states.consume(&nonce).await }));
        }

        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn distinct_nonces_consume_independently_under_concurrency() {
        let clock = MockClock::at(1_000_000);
        let states = Arc::new(tracker(&clock));

        let mut nonces = vec![];
        for _ in 0..8 {
            nonces.push(states.issue().await);
        }

        let mut handles = vec![];
        for nonce in nonces {
            let states = states.clone();
            handles.push(tokio::spawn(async move { states.consume(&nonce).await }));
        }
        for h in handles {
            assert!(h.await.unwrap());
        }
    }
}

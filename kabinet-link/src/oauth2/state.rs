//! CSRF `state` tokens for the authorization flow
//!
//! A state token is issued when the authorization link is rendered and must
//! come back unchanged on the callback. Tokens are:
//! - 32 bytes of randomness, hex-encoded
//! - Bound to the principal they were issued for
//! - Single-use: a successful or failed check removes them
//! - Expired after a configurable TTL (10 minutes by default)
//! - Capped per principal: issuing past the cap evicts that principal's
//!   oldest outstanding token

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Default lifetime of an issued state token
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Default number of outstanding tokens kept per principal
pub const DEFAULT_MAX_PENDING_PER_PRINCIPAL: usize = 8;

/// Opaque state value carried through the authorization server
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateToken(String);

impl StateToken {
    /// Generate a new random token
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::rng().random();
        Self(hex::encode(bytes))
    }

    /// The token as sent in the authorization URL
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for issued state tokens
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Issue a fresh token for `principal_id`
    async fn issue(&self, principal_id: i64) -> StateToken;

    /// Check and consume `presented` for `principal_id`
    ///
    /// Returns `true` only if the token was issued to this principal and has
    /// not expired. The token is removed either way.
    async fn consume(&self, principal_id: i64, presented: &str) -> bool;
}

#[derive(Debug)]
struct PendingState {
    principal_id: i64,
    expires_at: Instant,
    /// Issue order, used to find the oldest token of a principal
    seq: u64,
}

#[derive(Debug, Default)]
struct PendingStates {
    entries: HashMap<String, PendingState>,
    next_seq: u64,
}

impl PendingStates {
    /// Drop the oldest tokens of `principal_id` until at most `max` remain
    fn evict_oldest(&mut self, principal_id: i64, max: usize) {
        let mut owned: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.principal_id == principal_id)
            .map(|(token, entry)| (entry.seq, token.clone()))
            .collect();

        if owned.len() <= max {
            return;
        }

        owned.sort_unstable_by_key(|(seq, _)| *seq);
        let excess = owned.len() - max;
        for (_, token) in owned.into_iter().take(excess) {
            self.entries.remove(&token);
        }
        tracing::debug!(principal_id, evicted = excess, "Evicted oldest OAuth2 states");
    }
}

/// Process-local [`StateStore`]
///
/// Sufficient for a single instance. Expired entries are swept on every issue,
/// and each principal holds at most `max_per_principal` live tokens.
#[derive(Debug)]
pub struct InMemoryStateStore {
    ttl: Duration,
    max_per_principal: usize,
    pending: Mutex<PendingStates>,
}

impl InMemoryStateStore {
    /// Create a store whose tokens live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_per_principal: DEFAULT_MAX_PENDING_PER_PRINCIPAL,
            pending: Mutex::new(PendingStates::default()),
        }
    }

    /// Keep at most `max` outstanding tokens per principal (minimum 1)
    #[must_use]
    pub fn with_max_per_principal(mut self, max: usize) -> Self {
        self.max_per_principal = max.max(1);
        self
    }

    /// Number of tokens awaiting a callback, expired ones included
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().entries.len()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TTL)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn issue(&self, principal_id: i64) -> StateToken {
        let token = StateToken::generate();
        let now = Instant::now();

        let mut pending = self.pending.lock();
        pending.entries.retain(|_, entry| entry.expires_at > now);

        let seq = pending.next_seq;
        pending.next_seq += 1;
        pending.entries.insert(
            token.as_str().to_string(),
            PendingState {
                principal_id,
                expires_at: now + self.ttl,
                seq,
            },
        );
        pending.evict_oldest(principal_id, self.max_per_principal);
        drop(pending);

        tracing::debug!(principal_id, "Issued OAuth2 state");
        token
    }

    async fn consume(&self, principal_id: i64, presented: &str) -> bool {
        let Some(entry) = self.pending.lock().entries.remove(presented) else {
            tracing::warn!(principal_id, "Unknown OAuth2 state presented");
            return false;
        };

        if entry.principal_id != principal_id {
            tracing::warn!(
                principal_id,
                issued_to = entry.principal_id,
                "OAuth2 state issued to a different user"
            );
            return false;
        }

        if entry.expires_at <= Instant::now() {
            tracing::warn!(principal_id, "Expired OAuth2 state presented");
            return false;
        }

        true
    }
}

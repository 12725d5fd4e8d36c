//! Single-flight guard: at most one pipeline operation per identity.
//!
//! `try_acquire` never waits; a second caller gets `Ok(None)` and is expected
//! to report the operation as busy. Pipeline code goes through `acquire`,
//! whose `LockGuard` also releases when the holding future is dropped
//! mid-flight (client disconnect, aborted task).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock backend error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Proof of ownership handed back to `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub uid: String,
    token: String,
}

#[async_trait]
pub trait SessionLock: Send + Sync {
    async fn try_acquire(&self, uid: &str) -> Result<Option<LockToken>, LockError>;

    async fn release(&self, token: LockToken) -> Result<(), LockError>;
}

/// A held lock. `release` gives it back in order; dropping an unreleased
/// guard hands the release to a spawned task.
pub struct LockGuard {
    locks: Arc<dyn SessionLock>,
    token: Option<LockToken>,
}

/// Takes the lock for `uid`, or `Ok(None)` when another operation holds it.
pub async fn acquire(
    locks: &Arc<dyn SessionLock>,
    uid: &str,
) -> Result<Option<LockGuard>, LockError> {
    Ok(locks.try_acquire(uid).await?.map(|token| LockGuard {
        locks: Arc::clone(locks),
        token: Some(token),
    }))
}

impl LockGuard {
    pub async fn release(mut self) {
        if let Some(token) = self.token.take() {
            release_logged(self.locks.as_ref(), token).await;
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let locks = Arc::clone(&self.locks);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { release_logged(locks.as_ref(), token).await });
            }
            Err(_) => warn!(uid = %token.uid, "No runtime left to release resume lock"),
        }
    }
}

async fn release_logged(locks: &dyn SessionLock, token: LockToken) {
    let uid = token.uid.clone();
    if let Err(e) = locks.release(token).await {
        warn!(uid = %uid, "Failed to release resume lock: {e}");
    }
}

/// In-process lock for a single API instance.
#[derive(Default)]
pub struct LocalSessionLock {
    held: Mutex<HashSet<String>>,
}

impl LocalSessionLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl SessionLock for LocalSessionLock {
    async fn try_acquire(&self, uid: &str) -> Result<Option<LockToken>, LockError> {
        if self.held().insert(uid.to_string()) {
            Ok(Some(LockToken {
                uid: uid.to_string(),
                token: Uuid::new_v4().to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    async fn release(&self, token: LockToken) -> Result<(), LockError> {
        self.held().remove(&token.uid);
        Ok(())
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

/// Redis-backed lock shared by every API instance. Keys expire after `ttl`
/// so a crashed holder cannot block the student forever.
pub struct RedisSessionLock {
    client: redis::Client,
    ttl: Duration,
}

impl RedisSessionLock {
    pub fn new(client: redis::Client, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    fn key(uid: &str) -> String {
        format!("placement:resume-lock:{uid}")
    }
}

#[async_trait]
impl SessionLock for RedisSessionLock {
    async fn try_acquire(&self, uid: &str) -> Result<Option<LockToken>, LockError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = Uuid::new_v4().to_string();

        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(uid))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| LockToken {
            uid: uid.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<(), LockError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(Self::key(&token.uid))
            .arg(&token.token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }
}

//! Distributed lock service using Redis (§4.8 Task-Lock Service).
//!
//! Provides distributed locking mechanism for multi-replica deployments.
//! Uses Redis SET NX EX for atomic lock acquisition.

use redis::aio::ConnectionManager as RedisConnectionManager;
use redis::Script;
use crate::{Error, Result};

/// Distributed lock service
///
/// Provides Redis-based distributed locking for cross-replica critical sections
#[derive(Clone)]
pub struct DistributedLock {
    redis: RedisConnectionManager,
}

impl DistributedLock {
    /// Create a new distributed lock service
    #[must_use] 
    pub const fn new(redis: RedisConnectionManager) -> Self {
        Self { redis }
    }

    /// Acquire a lock (using SET NX EX atomic operation)
    ///
    /// Returns the lock value if acquired successfully, None if lock is already held
    ///
    /// # Arguments
    /// * `key` - Lock key (without "lock:" prefix)
    /// * `ttl_seconds` - Lock expiration time in seconds
    ///
    /// # Example
    /// ```ignore
    /// let lock_value = lock.acquire("refresh_single_source:abc123", 10).await?;
    /// if let Some(value) = lock_value {
    ///     // Lock acquired, perform operation
    ///     // ...
    ///     lock.release("refresh_single_source:abc123", &value).await?;
    /// } else {
    ///     // Lock already held by another process
    /// }
    /// ```
    pub async fn acquire(&self, key: &str, ttl_seconds: u64) -> Result<Option<String>> {
        let lock_key = format!("lock:{key}");
        let lock_value = crate::models::generate_id(); // nanoid(12)

        let mut conn = self.redis.clone();

        // SET key value NX EX ttl
        // NX: Only set if not exists
        // EX: Set expiration time
        let result: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(&lock_value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Internal(format!("Failed to acquire lock: {e}")))?;

        if result.is_some() {
            tracing::debug!(
                lock_key = %lock_key,
                lock_value = %lock_value,
                ttl_seconds = %ttl_seconds,
                "Lock acquired"
            );
            Ok(Some(lock_value))
        } else {
            tracing::debug!(
                lock_key = %lock_key,
                "Lock already held by another process"
            );
            Ok(None)
        }
    }

    /// Release a lock (using Lua script for atomicity)
    ///
    /// Only the lock holder (matching `lock_value`) can release the lock
    ///
    /// # Arguments
    /// * `key` - Lock key (without "lock:" prefix)
    /// * `lock_value` - The value returned by `acquire()`
    ///
    /// # Returns
    /// * `true` if lock was released successfully
    /// * `false` if lock was not held or already expired
    pub async fn release(&self, key: &str, lock_value: &str) -> Result<bool> {
        let lock_key = format!("lock:{key}");

        // Lua script: Only delete if the value matches
        // This prevents releasing a lock that was already expired and reacquired
        let script = Script::new(
            r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
            "#,
        );

        let mut conn = self.redis.clone();

        let result: i32 = script
            .key(&lock_key)
            .arg(lock_value)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::Internal(format!("Failed to release lock: {e}")))?;

        let released = result == 1;
        if released {
            tracing::debug!(
                lock_key = %lock_key,
                "Lock released"
            );
        } else {
            tracing::warn!(
                lock_key = %lock_key,
                "Lock release failed: value mismatch or already expired"
            );
        }

        Ok(released)
    }
}

/// RAII lock guard that automatically releases on drop
///
/// # Example
/// ```ignore
/// let Some(value) = lock.acquire("refresh_single_source:abc123", 10).await? else {
///     return Err(Error::LockContended("already running".to_string()));
/// };
/// let guard = LockGuard::from_acquired(lock, "refresh_single_source:abc123".to_string(), value);
/// // Lock is held
/// orchestrator.refresh_source(&source_id).await?;
/// // Lock is automatically released when guard goes out of scope
/// ```
pub struct LockGuard {
    lock: DistributedLock,
    key: String,
    value: String,
}

impl LockGuard {
    /// Wrap a lock value a caller already obtained from `DistributedLock::acquire`,
    /// so callers that need to distinguish "lock contended" from other errors
    /// (and react differently to each) can still get RAII release afterward.
    #[must_use]
    pub const fn from_acquired(lock: DistributedLock, key: String, value: String) -> Self {
        Self { lock, key, value }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let lock = self.lock.clone();
        let key = self.key.clone();
        let value = self.value.clone();

        // Spawn async task to release lock
        tokio::spawn(async move {
            if let Err(e) = lock.release(&key, &value).await {
                tracing::error!(
                    key = %key,
                    error = %e,
                    "Failed to release lock in Drop"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_acquire_and_release() {
        let redis_client = redis::Client::open("redis://localhost:6379").unwrap();
        let redis = RedisConnectionManager::new(redis_client).await.unwrap();
        let lock = DistributedLock::new(redis);

        // Acquire lock
        let lock_value = lock.acquire("test:lock1", 10).await.unwrap();
        assert!(lock_value.is_some());

        let lock_value = lock_value.unwrap();

        // Try to acquire same lock (should fail)
        let lock_value2 = lock.acquire("test:lock1", 10).await.unwrap();
        assert!(lock_value2.is_none());

        // Release lock
        let released = lock.release("test:lock1", &lock_value).await.unwrap();
        assert!(released);

        // Acquire lock again (should succeed)
        let lock_value3 = lock.acquire("test:lock1", 10).await.unwrap();
        assert!(lock_value3.is_some());

        // Cleanup
        lock.release("test:lock1", &lock_value3.unwrap()).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_lock_guard_releases_on_drop() {
        let redis_client = redis::Client::open("redis://localhost:6379").unwrap();
        let redis = RedisConnectionManager::new(redis_client).await.unwrap();
        let lock = DistributedLock::new(redis.clone());

        {
            let value = lock.acquire("test:lock4", 10).await.unwrap().unwrap();
            let _guard = LockGuard::from_acquired(lock.clone(), "test:lock4".to_string(), value);

            // Lock is held
            let lock_value = lock.acquire("test:lock4", 10).await.unwrap();
            assert!(lock_value.is_none());

            // Guard will release lock when dropped
        }

        // Wait for async drop task to complete
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        // Lock should be released
        let lock_value = lock.acquire("test:lock4", 10).await.unwrap();
        assert!(lock_value.is_some());

        // Cleanup
        lock.release("test:lock4", &lock_value.unwrap()).await.unwrap();
    }
}

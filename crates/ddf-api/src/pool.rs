//! Bounded pool of reusable query engines.
//!
//! `TableEngine::new()` spins up a fresh DataFusion `SessionContext`;
//! creating one per request lets an unbounded number of sessions pile
//! up under load. This pool keeps a fixed number of engines and hands
//! them out under a semaphore honoring `DB_CONNECTION_TIMEOUT`, so a
//! request either gets an engine within that window or fails fast with
//! `503`. The checked-out engine is released back to the pool as soon
//! as the streaming query it served completes, fails, or the client
//! drops the response before it finishes.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use ddf_table::TableEngine;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("timed out after {0:?} waiting for a free query engine")]
    AcquireTimeout(Duration),
    #[error("failed to reset pooled query engine: {0}")]
    Reset(#[from] ddf_table::TableEngineError),
}

/// Fixed-size pool of `TableEngine`s. `size` bounds how many queries can
/// run concurrently; `acquire_timeout` bounds how long a caller waits
/// for one to free up.
pub struct EnginePool {
    slots: Vec<Arc<Mutex<TableEngine>>>,
    semaphore: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl EnginePool {
    pub fn new(size: usize, acquire_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            slots: (0..size).map(|_| Arc::new(Mutex::new(TableEngine::new()))).collect(),
            semaphore: Arc::new(Semaphore::new(size)),
            acquire_timeout,
        }
    }

    /// Check out an idle engine, resetting it to a blank session first
    /// so nothing registered by a previous request leaks into this
    /// query. Waits up to `acquire_timeout` for a slot to free up. The
    /// returned guard owns its slot and permit, so it can outlive this
    /// call and be held for as long as the query it serves is running.
    pub async fn acquire(&self) -> Result<PooledEngine, PoolError> {
        let permit = tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.semaphore).acquire_owned())
            .await
            .map_err(|_| PoolError::AcquireTimeout(self.acquire_timeout))?
            .expect("pool semaphore is never closed");

        // The semaphore has exactly one permit per slot, so a granted
        // permit guarantees at least one slot isn't locked right now.
        for slot in &self.slots {
            if let Ok(engine) = Arc::clone(slot).try_lock_owned() {
                engine.reset()?;
                return Ok(PooledEngine { engine, _permit: permit });
            }
        }
        unreachable!("semaphore granted a permit but every slot is locked")
    }
}

pub struct PooledEngine {
    engine: OwnedMutexGuard<TableEngine>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledEngine {
    type Target = TableEngine;

    fn deref(&self) -> &TableEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_returns_an_engine_within_the_pool_size() {
        let pool = EnginePool::new(2, Duration::from_secs(1));
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert!(!a.table_exists("nope"));
        assert!(!b.table_exists("nope"));
    }

    #[tokio::test]
    async fn acquire_times_out_once_every_slot_is_checked_out() {
        let pool = EnginePool::new(1, Duration::from_millis(50));
        let _held = pool.acquire().await.unwrap();
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::AcquireTimeout(_)));
    }

    #[tokio::test]
    async fn released_engine_is_available_to_the_next_acquire() {
        let pool = EnginePool::new(1, Duration::from_millis(200));
        {
            let _held = pool.acquire().await.unwrap();
        }
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn engine_can_be_held_past_the_call_that_acquired_it() {
        let pool = EnginePool::new(1, Duration::from_millis(200));
        let engine = pool.acquire().await.unwrap();
        // Simulate holding the engine for a streaming response that
        // outlives the handler's own stack frame.
        let moved: PooledEngine = engine;
        assert!(!moved.table_exists("nope"));
    }
}

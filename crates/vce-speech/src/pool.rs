//! Generic LIFO, capacity-bounded resource pool for ASR/TTS/LLM/VAD
//! handles (§5: "process-wide, LIFO, capacity-bounded (default 1000).
//! Acquire is non-blocking: on empty, a new instance is constructed; on
//! release when full, the instance is closed rather than enqueued.").

use tokio::sync::Mutex;

/// A pool of reusable `T` instances. `T` itself decides what "closing an
/// instance" means via [`Poolable::close`]; the pool only manages the
/// stack and the capacity bound.
pub trait Poolable: Send {
    /// Reset internal state before returning to the pool, or indicate
    /// the instance is no longer reusable and should be dropped instead
    /// (e.g. a provider connection that errored).
    fn reset(&mut self) -> bool;

    /// Release any external resources the instance is holding.
    fn close(&mut self);
}

pub struct ResourcePool<T: Poolable> {
    items: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T: Poolable> ResourcePool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::with_capacity(capacity.min(64))),
            capacity,
        }
    }

    /// Pop the most recently released instance, if any. Non-blocking:
    /// callers construct a fresh instance themselves when this returns
    /// `None`.
    pub async fn acquire(&self) -> Option<T> {
        self.items.lock().await.pop()
    }

    /// Return an instance to the pool. Resets it first; if `reset`
    /// reports the instance isn't reusable, or the pool is already at
    /// capacity, the instance is closed instead of enqueued.
    pub async fn release(&self, mut item: T) {
        if !item.reset() {
            item.close();
            return;
        }
        let mut items = self.items.lock().await;
        if items.len() >= self.capacity {
            drop(items);
            item.close();
            return;
        }
        items.push(item);
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        reusable: bool,
        closed: bool,
    }

    impl Poolable for Dummy {
        fn reset(&mut self) -> bool {
            self.reusable
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[tokio::test]
    async fn acquire_on_empty_pool_returns_none() {
        let pool: ResourcePool<Dummy> = ResourcePool::new(2);
        assert!(pool.acquire().await.is_none());
    }

    #[tokio::test]
    async fn release_then_acquire_roundtrips() {
        let pool: ResourcePool<Dummy> = ResourcePool::new(2);
        pool.release(Dummy {
            reusable: true,
            closed: false,
        })
        .await;
        assert_eq!(pool.len().await, 1);
        let item = pool.acquire().await.unwrap();
        assert!(!item.closed);
    }

    #[tokio::test]
    async fn release_beyond_capacity_closes_instance() {
        let pool: ResourcePool<Dummy> = ResourcePool::new(1);
        pool.release(Dummy {
            reusable: true,
            closed: false,
        })
        .await;
        pool.release(Dummy {
            reusable: true,
            closed: false,
        })
        .await;
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn non_reusable_release_is_closed_not_enqueued() {
        let pool: ResourcePool<Dummy> = ResourcePool::new(4);
        pool.release(Dummy {
            reusable: false,
            closed: false,
        })
        .await;
        assert_eq!(pool.len().await, 0);
    }
}

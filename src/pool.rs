//! A bounded, thread-safe reservoir of pre-built resources with overflow
//! construction on an empty acquire.
//!
//! Grounded in `gedis.GedisPool`: eager N-item construction, a non-blocking
//! acquire that builds one more item rather than blocking when the
//! reservoir is empty, and a non-blocking release that closes the item
//! outright when the reservoir is already full. The Go version hands a
//! `*Gedis` wrapping a back-pointer to its own pool back to the caller;
//! here the borrow-checker's own lifetimes replace that cycle with a
//! [`PooledConnection`] guard that returns its item to the pool on `Drop`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::RedisResult;

/// Something a [`Pool`] can build, hold, and tear down.
pub trait Poolable: Send + 'static {
    fn close(&mut self);
}

/// A bounded reservoir of `T`, built eagerly and replenished on demand.
pub struct Pool<T: Poolable> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    builder: Box<dyn Fn() -> RedisResult<T> + Send + Sync>,
    /// Set by `drain`. Once set, `release` closes returned items outright
    /// instead of re-admitting them, so a pool that has been drained stays
    /// inert even as outstanding loans trickle back in — the contract
    /// `SentinelPool::rebuild` relies on for its stale reservoir.
    drained: AtomicBool,
}

impl<T: Poolable> Pool<T> {
    /// Eagerly builds `capacity` items via `builder`. If any dial fails,
    /// every item already built is closed and the error is returned,
    /// matching the original's all-or-nothing `NewGedisPool`.
    pub fn new(
        capacity: usize,
        builder: impl Fn() -> RedisResult<T> + Send + Sync + 'static,
    ) -> RedisResult<Arc<Self>> {
        let mut items = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            match builder() {
                Ok(item) => items.push_back(item),
                Err(e) => {
                    for mut item in items {
                        item.close();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Arc::new(Pool {
            items: Mutex::new(items),
            capacity,
            builder: Box::new(builder),
            drained: AtomicBool::new(false),
        }))
    }

    /// Non-blocking acquire: pops a pooled item if one is available,
    /// otherwise builds a fresh overflow item via the builder.
    pub fn acquire(self: &Arc<Self>) -> RedisResult<PooledConnection<T>> {
        let popped = self.items.lock().pop_front();
        let item = match popped {
            Some(item) => item,
            None => {
                debug!(capacity = self.capacity, "pool empty, constructing overflow item");
                (self.builder)()?
            }
        };
        Ok(PooledConnection {
            item: Some(item),
            pool: Arc::clone(self),
        })
    }

    /// Non-blocking acquire that never overflows: returns `None` rather
    /// than building a fresh item when the reservoir is empty. Used by
    /// [`crate::sentinel::SentinelPool`], which treats an empty pool as
    /// `Exhausted` rather than growing past its configured size.
    pub fn try_acquire_existing(self: &Arc<Self>) -> Option<PooledConnection<T>> {
        let item = self.items.lock().pop_front()?;
        Some(PooledConnection {
            item: Some(item),
            pool: Arc::clone(self),
        })
    }

    /// Non-blocking release: returns `item` to the reservoir if there is
    /// room, otherwise closes it. A pool that has already been `drain`-ed
    /// is inert — a late release (an outstanding loan from a pool a
    /// sentinel switch has since replaced, for instance) always closes the
    /// item rather than re-admitting it.
    fn release(&self, mut item: T) {
        if self.drained.load(Ordering::SeqCst) {
            item.close();
            return;
        }
        let mut guard = self.items.lock();
        if guard.len() < self.capacity {
            guard.push_back(item);
        } else {
            drop(guard);
            item.close();
        }
    }

    /// Drains and closes every currently pooled item, then marks the pool
    /// inert: every subsequent `release` against it closes its item
    /// outright instead of re-admitting it. Items on loan at the time of
    /// the call are closed individually as their guards drop.
    pub fn drain(&self) {
        self.drained.store(true, Ordering::SeqCst);
        let mut guard = self.items.lock();
        while let Some(mut item) = guard.pop_front() {
            item.close();
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An item on loan from a [`Pool`]. Returns itself to the pool when
/// dropped, standing in for the Go client's cyclic back-pointer to its
/// owning pool.
pub struct PooledConnection<T: Poolable> {
    item: Option<T>,
    pool: Arc<Pool<T>>,
}

impl<T: Poolable> std::ops::Deref for PooledConnection<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.item.as_ref().expect("item taken only on drop")
    }
}

impl<T: Poolable> std::ops::DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().expect("item taken only on drop")
    }
}

impl<T: Poolable> Drop for PooledConnection<T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.release(item);
        }
    }
}

impl Poolable for crate::connection::Connection {
    fn close(&mut self) {
        crate::connection::Connection::close(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i32,
        closed: bool,
    }

    impl Poolable for Counter {
        fn close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn acquire_reuses_pooled_items_until_exhausted() {
        let pool = Pool::new(2, || Ok(Counter { value: 0, closed: false })).unwrap();
        assert_eq!(pool.len(), 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.len(), 0);
        drop(a);
        drop(b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn acquire_on_empty_pool_overflows() {
        let pool = Pool::new(0, || Ok(Counter { value: 7, closed: false })).unwrap();
        let guard = pool.acquire().unwrap();
        assert_eq!(guard.value, 7);
    }

    #[test]
    fn release_closes_when_pool_already_full() {
        let pool = Pool::new(1, || Ok(Counter { value: 0, closed: false })).unwrap();
        let extra = pool.acquire().unwrap();
        let overflow = pool.acquire().unwrap();
        drop(extra);
        assert_eq!(pool.len(), 1);
        drop(overflow);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn drain_closes_every_pooled_item() {
        let pool = Pool::new(3, || Ok(Counter { value: 0, closed: false })).unwrap();
        pool.drain();
        assert_eq!(pool.len(), 0);
    }

    struct Flagged {
        closed_flag: Arc<std::sync::atomic::AtomicBool>,
    }

    impl Poolable for Flagged {
        fn close(&mut self) {
            self.closed_flag.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn release_after_drain_closes_the_item_instead_of_readmitting_it() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        let pool = Pool::new(1, move || {
            Ok(Flagged { closed_flag: Arc::clone(&flag_clone) })
        })
        .unwrap();

        let on_loan = pool.acquire().unwrap();
        pool.drain();
        assert_eq!(pool.len(), 0);

        drop(on_loan);
        assert!(flag.load(Ordering::SeqCst), "late release after drain must close the item");
        assert_eq!(pool.len(), 0, "a drained pool stays inert, it does not re-admit the item");
    }

    #[test]
    fn construction_failure_closes_already_built_items_and_propagates_error() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let built = Arc::new(AtomicUsize::new(0));
        let built_clone = Arc::clone(&built);
        let result = Pool::new(3, move || {
            let n = built_clone.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                Err(crate::error::RedisError::dial("boom"))
            } else {
                Ok(Counter { value: 0, closed: false })
            }
        });
        assert!(result.is_err());
    }
}

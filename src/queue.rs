//! Batch admission to the engine.
//!
//! Each batch that needs the engine appends a completion signal to the pending list and waits
//! for the entry ahead of it. Dropping the returned [`BatchPermit`] removes the entry and fires
//! its signal, which admits the next batch. Admission is therefore strictly FIFO among batches
//! that call [`BatchQueue::admit`]; batches that never call it are not ordered at all.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt as _;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

/// Resolves once a batch and every batch ahead of it have released their permits.
type Done = Shared<BoxFuture<'static, ()>>;

struct Pending {
    id: u64,
    done: Done,
}

#[derive(Clone, Default)]
pub struct BatchQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    pending: Mutex<VecDeque<Pending>>,
    next_id: AtomicU64,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches holding or waiting for admission.
    pub fn len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join the queue now and return a future that resolves once every batch that joined earlier
    /// has released its permit.
    ///
    /// The position is taken at call time, not when the future is first polled. Dropping the
    /// future before it resolves gives the position up without reordering anyone else.
    pub fn admit(&self) -> impl Future<Output = BatchPermit> + Send + 'static {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let previous = {
            let mut pending = self.inner.pending.lock();
            let previous = pending.back().map(|p| p.done.clone());
            // Chaining through `previous` keeps the order intact even if this batch is dropped
            // while still waiting: its successor then waits for our predecessor instead.
            let chained = previous.clone();
            let done = async move {
                if let Some(previous) = chained {
                    previous.await;
                }
                // Err means the permit was dropped without signalling; it is finished either way.
                let _ = rx.await;
            }
            .boxed()
            .shared();
            pending.push_back(Pending { id, done });
            previous
        };

        let permit = BatchPermit {
            queue: self.clone(),
            id,
            done: Some(tx),
        };

        async move {
            if let Some(previous) = previous {
                tracing::trace!(batch = id, "waiting for previous batch");
                previous.await;
            }
            tracing::trace!(batch = id, "batch admitted");
            permit
        }
    }

    fn release(&self, id: u64) {
        let mut pending = self.inner.pending.lock();
        if pending.front().is_some_and(|p| p.id == id) {
            pending.pop_front();
        } else if let Some(pos) = pending.iter().position(|p| p.id == id) {
            // Only reachable when a waiting batch is dropped before admission.
            pending.remove(pos);
        }
    }
}

/// Exclusive right to issue engine runs. Released on drop.
pub struct BatchPermit {
    queue: BatchQueue,
    id: u64,
    done: Option<oneshot::Sender<()>>,
}

impl BatchPermit {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for BatchPermit {
    fn drop(&mut self) {
        self.queue.release(self.id);
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/queue.rs"]
mod tests;

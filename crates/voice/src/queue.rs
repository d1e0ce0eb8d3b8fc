use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

#[derive(Debug)]
struct Inner<T> {
    buffers: VecDeque<Vec<T>>,
    capacity: usize,
    skipped: u64,
    disposed: bool,
}

/// Bounded handoff between an audio producer and one worker.
///
/// The producer never blocks: a push against a full queue drops the buffer
/// and counts it. Capture callbacks run on real-time audio threads and must
/// not stall behind encode or network throughput.
#[derive(Debug)]
pub struct PushQueue<T> {
    shared: Arc<(Mutex<Inner<T>>, Condvar)>,
}

impl<T> Clone for PushQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PushQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            shared: Arc::new((
                Mutex::new(Inner {
                    buffers: VecDeque::with_capacity(capacity),
                    capacity,
                    skipped: 0,
                    disposed: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Producer side. Returns false when the buffer was dropped, either
    /// because the queue is full or already disposed.
    pub fn push(&self, buffer: Vec<T>) -> bool {
        let (lock, wake) = &*self.shared;
        let mut inner = lock.lock().unwrap();
        if inner.disposed {
            return false;
        }
        if inner.buffers.len() >= inner.capacity {
            inner.skipped += 1;
            log::debug!("push queue full, dropping buffer (skipped {})", inner.skipped);
            return false;
        }
        inner.buffers.push_back(buffer);
        wake.notify_one();
        true
    }

    /// Consumer side. Blocks until at least one buffer is queued or the
    /// queue is disposed, then returns the whole backlog so the worker
    /// drains fully before waiting again. `None` means disposed; any
    /// buffers still queued at that point are released, not processed.
    pub fn wait_drain(&self) -> Option<Vec<Vec<T>>> {
        let (lock, wake) = &*self.shared;
        let mut inner = lock.lock().unwrap();
        loop {
            if inner.disposed {
                return None;
            }
            if !inner.buffers.is_empty() {
                return Some(inner.buffers.drain(..).collect());
            }
            inner = wake.wait(inner).unwrap();
        }
    }

    /// Marks the queue disposed, releases queued buffers and wakes the
    /// consumer one final time. Safe to call more than once.
    pub fn dispose(&self) {
        let (lock, wake) = &*self.shared;
        let mut inner = lock.lock().unwrap();
        inner.disposed = true;
        inner.buffers.clear();
        wake.notify_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.0.lock().unwrap().disposed
    }

    pub fn len(&self) -> usize {
        self.shared.0.lock().unwrap().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffers dropped because the queue was full.
    pub fn skipped(&self) -> u64 {
        self.shared.0.lock().unwrap().skipped
    }
}

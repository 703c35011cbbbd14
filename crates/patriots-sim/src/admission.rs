//! Attacker admission queue.
//!
//! Operator requests turn into slot indices here. A request is admitted only
//! when an index is free and a launcher is blocked in `draw`; anything else is
//! dropped on the floor. Admitted indices queue on the ready chain in request
//! order until the launcher wakes and draws them.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::slot_pool::SlotChain;

#[derive(Debug)]
struct QueueInner {
    chain: SlotChain,
    /// Launchers blocked in `draw`.
    drawers: usize,
    closed: bool,
}

impl QueueInner {
    /// Move one free index onto the ready chain if a drawer is waiting.
    fn admit(&mut self) -> bool {
        if self.closed || self.drawers == 0 {
            return false;
        }
        let Some(index) = self.chain.pop_free() else {
            return false;
        };
        self.chain.push_ready(index);
        true
    }
}

/// FIFO of ready slot indices layered over a free chain.
#[derive(Debug)]
pub struct AdmissionQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                chain: SlotChain::new(capacity),
                drawers: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best-effort launch request. Never blocks.
    ///
    /// Returns `true` if a free index moved to the ready chain.
    pub fn submit_request(&self) -> bool {
        let admitted = self.lock().admit();
        if admitted {
            self.ready.notify_one();
        }
        admitted
    }

    /// Block until a ready index exists and take it.
    ///
    /// Returns `None` once the queue has been closed.
    pub fn draw(&self) -> Option<usize> {
        let mut inner = self.lock();
        inner.drawers += 1;
        loop {
            if let Some(index) = inner.chain.pop_ready() {
                inner.drawers -= 1;
                return Some(index);
            }
            if inner.closed {
                inner.drawers -= 1;
                return None;
            }
            inner = self
                .ready
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Splice a drawn index back onto the free chain.
    ///
    /// # Panics
    /// If `index` is out of range or not currently drawn.
    pub fn release(&self, index: usize) {
        self.lock().chain.push_free(index);
    }

    /// Wake every drawer; `draw` returns `None` from now on. Indices still
    /// queued on the ready chain go back to the free chain.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        while let Some(index) = inner.chain.pop_ready() {
            inner.chain.push_free(index);
        }
        self.ready.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.lock().chain.capacity()
    }

    pub fn free_len(&self) -> usize {
        self.lock().chain.free_len()
    }

    pub fn ready_len(&self) -> usize {
        self.lock().chain.ready_len()
    }

    pub fn in_use(&self) -> usize {
        self.lock().chain.in_use_len()
    }

    /// Launchers currently blocked in `draw`.
    pub fn waiting_drawers(&self) -> usize {
        self.lock().drawers
    }
}

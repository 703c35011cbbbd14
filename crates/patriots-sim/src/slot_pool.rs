//! Fixed-capacity pools of recyclable slot indices.
//!
//! Both sides bound their number of live missiles with an array-backed
//! intrusive chain: `next[i]` links index `i` to the following index of the
//! same chain. `SlotChain` owns that bookkeeping; `SlotPool` wraps it with a
//! blocking `acquire` that receives released indices by direct handoff.
//! `AdmissionQueue` (see `admission.rs`) reuses the same chain with a second,
//! ready list.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Where an index currently lives. Every index is in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Ready,
    InUse,
}

/// Intrusive free and ready chains over `0..capacity`.
#[derive(Debug)]
pub(crate) struct SlotChain {
    next: Vec<Option<usize>>,
    state: Vec<SlotState>,
    free_head: Option<usize>,
    free_len: usize,
    ready_head: Option<usize>,
    ready_tail: Option<usize>,
    ready_len: usize,
}

impl SlotChain {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "slot chain needs at least one index");
        let next = (0..capacity)
            .map(|i| if i + 1 < capacity { Some(i + 1) } else { None })
            .collect();
        Self {
            next,
            state: vec![SlotState::Free; capacity],
            free_head: Some(0),
            free_len: capacity,
            ready_head: None,
            ready_tail: None,
            ready_len: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.next.len()
    }

    pub(crate) fn free_len(&self) -> usize {
        self.free_len
    }

    pub(crate) fn ready_len(&self) -> usize {
        self.ready_len
    }

    pub(crate) fn in_use_len(&self) -> usize {
        self.capacity() - self.free_len - self.ready_len
    }

    /// Unlink the free head and mark it in use.
    pub(crate) fn pop_free(&mut self) -> Option<usize> {
        let index = self.free_head?;
        self.free_head = self.next[index];
        self.next[index] = None;
        self.free_len -= 1;
        self.state[index] = SlotState::InUse;
        Some(index)
    }

    /// Splice an in-use index back onto the free chain.
    pub(crate) fn push_free(&mut self, index: usize) {
        self.expect_in_use(index);
        self.next[index] = self.free_head;
        self.free_head = Some(index);
        self.free_len += 1;
        self.state[index] = SlotState::Free;
    }

    /// Append an in-use index to the tail of the ready chain.
    pub(crate) fn push_ready(&mut self, index: usize) {
        self.expect_in_use(index);
        self.next[index] = None;
        match self.ready_tail {
            Some(tail) => self.next[tail] = Some(index),
            None => self.ready_head = Some(index),
        }
        self.ready_tail = Some(index);
        self.ready_len += 1;
        self.state[index] = SlotState::Ready;
    }

    /// Unlink the ready head and mark it in use.
    pub(crate) fn pop_ready(&mut self) -> Option<usize> {
        let index = self.ready_head?;
        self.ready_head = self.next[index];
        if self.ready_head.is_none() {
            self.ready_tail = None;
        }
        self.next[index] = None;
        self.ready_len -= 1;
        self.state[index] = SlotState::InUse;
        Some(index)
    }

    /// Contract check shared by every release path: out-of-range and
    /// double releases abort.
    pub(crate) fn expect_in_use(&self, index: usize) {
        assert!(
            index < self.capacity(),
            "slot index {index} out of range (capacity {})",
            self.capacity()
        );
        assert_eq!(
            self.state[index],
            SlotState::InUse,
            "slot index {index} released while not in use"
        );
    }
}

#[derive(Debug)]
struct PoolInner {
    chain: SlotChain,
    /// Callers blocked in `acquire`.
    waiting: usize,
    /// Indices released straight to a blocked waiter, not yet picked up.
    handed: Vec<usize>,
    closed: bool,
}

/// Blocking free-list of slot indices.
///
/// A released index goes directly to a blocked waiter when there is one, so a
/// newly arriving caller can never overtake a waiter that is already queued.
/// Waiters are not served in FIFO order.
#[derive(Debug)]
pub struct SlotPool {
    inner: Mutex<PoolInner>,
    handoff: Condvar,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                chain: SlotChain::new(capacity),
                waiting: 0,
                handed: Vec::new(),
                closed: false,
            }),
            handoff: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a free index, blocking until one is released.
    ///
    /// Returns `None` only once the pool has been closed.
    pub fn acquire(&self) -> Option<usize> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        if inner.waiting == 0 {
            if let Some(index) = inner.chain.pop_free() {
                return Some(index);
            }
        }

        inner.waiting += 1;
        loop {
            if let Some(index) = inner.handed.pop() {
                inner.waiting -= 1;
                return Some(index);
            }
            if inner.closed {
                inner.waiting -= 1;
                return None;
            }
            inner = self
                .handoff
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Take a free index without blocking.
    pub fn try_acquire(&self) -> Option<usize> {
        let mut inner = self.lock();
        if inner.closed || inner.waiting > 0 {
            return None;
        }
        inner.chain.pop_free()
    }

    /// Return an index. Hands it to exactly one blocked waiter if any.
    ///
    /// # Panics
    /// If `index` is out of range or not currently in use.
    pub fn release(&self, index: usize) {
        let mut inner = self.lock();
        inner.chain.expect_in_use(index);
        assert!(
            !inner.handed.contains(&index),
            "slot index {index} released twice"
        );
        if !inner.closed && inner.waiting > inner.handed.len() {
            inner.handed.push(index);
            self.handoff.notify_one();
        } else {
            inner.chain.push_free(index);
        }
    }

    /// Wake every waiter; blocking calls return `None` from now on.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        while let Some(index) = inner.handed.pop() {
            inner.chain.push_free(index);
        }
        self.handoff.notify_all();
    }

    pub fn capacity(&self) -> usize {
        self.lock().chain.capacity()
    }

    /// Indices on the free chain.
    pub fn available(&self) -> usize {
        self.lock().chain.free_len()
    }

    /// Indices held by callers, including ones handed off but not yet picked up.
    pub fn in_use(&self) -> usize {
        self.lock().chain.in_use_len()
    }

    /// Callers currently blocked in `acquire`.
    pub fn waiting(&self) -> usize {
        self.lock().waiting
    }
}

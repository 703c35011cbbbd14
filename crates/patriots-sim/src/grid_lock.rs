//! Three-tier arbitration for the shared grid.
//!
//! At most one holder at a time. A newcomer blocks if someone holds the lock
//! or if a waiter of the same or higher priority is already queued. On
//! release the lock is handed to one waiter, scanning the tiers round-robin
//! starting just after the releasing tier, so every tier gets a turn. Waiters
//! of one tier are served in arrival order.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use patriots_core::enums::Tier;

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Handoffs performed on release.
    pub handoffs: u64,
    /// Per tier: the most handoffs observed while one waiter was blocked,
    /// counting the one that finally served it.
    pub longest_wait: [u64; Tier::COUNT],
}

#[derive(Debug, Default)]
struct ArbiterState {
    holders: usize,
    blocked: [usize; Tier::COUNT],
    /// Per tier: tickets taken by waiters so far.
    tickets: [u64; Tier::COUNT],
    /// Per tier: tickets granted the lock so far.
    served: [u64; Tier::COUNT],
    stats: LockStats,
}

/// Mutual exclusion with three priority tiers and round-robin handoff.
#[derive(Debug, Default)]
pub struct PriorityGridLock {
    state: Mutex<ArbiterState>,
    wakeups: [Condvar; Tier::COUNT],
}

impl PriorityGridLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ArbiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the caller holds the lock at `tier`.
    pub fn acquire(&self, tier: Tier) {
        let t = tier.index();
        let mut state = self.lock();
        let must_wait = state.holders > 0 || state.blocked[..=t].iter().any(|&b| b > 0);
        if !must_wait {
            state.holders += 1;
            return;
        }

        state.blocked[t] += 1;
        let ticket = state.tickets[t];
        state.tickets[t] += 1;
        let seen = state.stats.handoffs;
        while state.served[t] <= ticket {
            state = self.wakeups[t]
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.blocked[t] -= 1;

        // The releaser already counted us as the holder.
        let waited = state.stats.handoffs - seen;
        let longest = &mut state.stats.longest_wait[t];
        *longest = (*longest).max(waited);
    }

    /// Give the lock up and hand it to the next waiter, if any.
    ///
    /// # Panics
    /// If nobody holds the lock.
    pub fn release(&self, tier: Tier) {
        let mut state = self.lock();
        assert!(
            state.holders > 0,
            "grid lock released at {tier:?} without a holder"
        );
        state.holders -= 1;
        if state.holders > 0 {
            return;
        }

        for step in 1..=Tier::COUNT {
            let next = Tier::from_index(tier.index() + step).index();
            if state.tickets[next] > state.served[next] {
                state.served[next] += 1;
                state.holders += 1;
                state.stats.handoffs += 1;
                self.wakeups[next].notify_all();
                break;
            }
        }
    }

    /// Holders right now; never more than one.
    pub fn holders(&self) -> usize {
        self.lock().holders
    }

    /// Waiters blocked at `tier`, including ones granted but not yet awake.
    pub fn blocked(&self, tier: Tier) -> usize {
        self.lock().blocked[tier.index()]
    }

    pub fn stats(&self) -> LockStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_uncontended_acquire_and_release() {
        let lock = PriorityGridLock::new();
        for tier in Tier::ALL {
            lock.acquire(tier);
            assert_eq!(lock.holders(), 1);
            lock.release(tier);
            assert_eq!(lock.holders(), 0);
        }
        assert_eq!(lock.stats().handoffs, 0);
    }

    #[test]
    #[should_panic(expected = "without a holder")]
    fn test_release_without_holder_panics() {
        PriorityGridLock::new().release(Tier::Low);
    }

    #[test]
    fn test_release_hands_off_to_blocked_waiter() {
        let lock = Arc::new(PriorityGridLock::new());
        lock.acquire(Tier::High);

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.acquire(Tier::Low);
                let holders = lock.holders();
                lock.release(Tier::Low);
                holders
            })
        };
        while lock.blocked(Tier::Low) == 0 {
            thread::yield_now();
        }

        lock.release(Tier::High);
        assert_eq!(waiter.join().unwrap(), 1);
        assert_eq!(lock.stats().handoffs, 1);
        assert_eq!(lock.holders(), 0);
    }

    #[test]
    fn test_every_tier_is_served_within_one_round() {
        const ROUNDS: usize = 300;

        let lock = Arc::new(PriorityGridLock::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = Tier::ALL
            .into_iter()
            .map(|tier| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        lock.acquire(tier);
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_micros(20));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release(tier);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let stats = lock.stats();
        for tier in Tier::ALL {
            assert!(
                stats.longest_wait[tier.index()] <= Tier::COUNT as u64,
                "{tier:?} waited through {} handoffs",
                stats.longest_wait[tier.index()]
            );
        }
        assert_eq!(lock.holders(), 0);
    }

    #[test]
    fn test_queued_waiters_of_one_tier_are_bounded() {
        const WAITERS_PER_TIER: usize = 4;
        const ROUNDS: usize = 100;

        let lock = Arc::new(PriorityGridLock::new());
        let inside = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = Tier::ALL
            .into_iter()
            .flat_map(|tier| (0..WAITERS_PER_TIER).map(move |_| tier))
            .map(|tier| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        lock.acquire(tier);
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        thread::sleep(Duration::from_micros(20));
                        inside.fetch_sub(1, Ordering::SeqCst);
                        lock.release(tier);
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let bound = (Tier::COUNT * WAITERS_PER_TIER + 1) as u64;
        let stats = lock.stats();
        for tier in Tier::ALL {
            assert!(
                stats.longest_wait[tier.index()] <= bound,
                "{tier:?} waited through {} handoffs",
                stats.longest_wait[tier.index()]
            );
        }
        assert_eq!(lock.holders(), 0);
        assert!(Tier::ALL.into_iter().all(|tier| lock.blocked(tier) == 0));
    }
}

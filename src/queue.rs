/// Bounded hand-off from radio driver callbacks to the main loop.
///
/// The WiFi promiscuous callback and the BLE scan-result callback run
/// outside main-loop control. They push owned observations here; the main
/// loop drains the queue and publishes on the event bus, so analysis never
/// runs inside driver context. Each push and pop holds a critical section
/// only for the deque operation itself.
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use heapless::Deque;

use crate::event::Observation;

/// Default queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// What to do when an observation arrives and the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropPolicy {
    /// Keep what is queued, discard the arriving observation
    #[default]
    DropNewest,
    /// Evict the oldest queued observation to make room
    DropOldest,
}

pub struct ObservationQueue<const N: usize> {
    items: Mutex<RefCell<Deque<Observation, N>>>,
    policy: DropPolicy,
    dropped: AtomicU32,
}

impl<const N: usize> ObservationQueue<N> {
    pub const fn new(policy: DropPolicy) -> Self {
        Self {
            items: Mutex::new(RefCell::new(Deque::new())),
            policy,
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue an observation. Returns false if an observation was dropped
    /// to honor the capacity bound (either this one or the oldest).
    pub fn push(&self, observation: Observation) -> bool {
        let accepted = critical_section::with(|cs| {
            let mut items = self.items.borrow(cs).borrow_mut();
            match self.policy {
                DropPolicy::DropNewest => items.push_back(observation).is_ok(),
                DropPolicy::DropOldest => {
                    let evicted = if items.is_full() {
                        items.pop_front().is_some()
                    } else {
                        false
                    };
                    let _ = items.push_back(observation);
                    !evicted
                }
            }
        });
        if !accepted {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    pub fn pop(&self) -> Option<Observation> {
        critical_section::with(|cs| self.items.borrow(cs).borrow_mut().pop_front())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.items.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }

    /// Observations discarded because the queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for ObservationQueue<N> {
    fn default() -> Self {
        Self::new(DropPolicy::default())
    }
}

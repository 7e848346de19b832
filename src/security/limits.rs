use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Single-occupancy gate for listening mode
///
/// An occupancy counter that is either 0 or 1, guarded by one lock that is
/// only held for the check-and-increment or the decrement. Connections that
/// arrive while the slot is taken are declined, never queued.
///
/// # Examples
///
/// ```
/// use wsgat::security::ConnectionSlot;
///
/// let slot = ConnectionSlot::new();
/// assert!(slot.try_acquire());
/// assert!(!slot.try_acquire());
/// slot.release();
/// assert!(slot.try_acquire());
/// ```
#[derive(Debug, Default)]
pub struct ConnectionSlot {
    occupied: Mutex<usize>,
}

impl ConnectionSlot {
    /// Number of sessions the slot admits at once
    pub const CAPACITY: usize = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the slot occupied if it was free
    ///
    /// Returns `false` without side effects when the slot is taken.
    pub fn try_acquire(&self) -> bool {
        let mut occupied = self.lock();
        if *occupied < Self::CAPACITY {
            *occupied += 1;
            true
        } else {
            false
        }
    }

    /// Frees the slot
    ///
    /// Must be called exactly once per successful [`try_acquire`](Self::try_acquire).
    pub fn release(&self) {
        let mut occupied = self.lock();
        match occupied.checked_sub(1) {
            Some(remaining) => *occupied = remaining,
            None => tracing::warn!("Connection slot released while free"),
        }
    }

    /// Current number of occupants
    pub fn occupancy(&self) -> usize {
        *self.lock()
    }

    /// Acquires the slot and returns a guard that releases it on drop
    ///
    /// The guard releases on every exit path of the session it protects,
    /// including unwinding.
    pub fn try_claim(self: &Arc<Self>) -> Option<SlotGuard> {
        if !self.try_acquire() {
            return None;
        }
        tracing::info!(occupancy = self.occupancy(), "Connection slot acquired");
        Some(SlotGuard {
            slot: Arc::clone(self),
            start_time: Instant::now(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.occupied.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII claim on a [`ConnectionSlot`]
#[derive(Debug)]
pub struct SlotGuard {
    slot: Arc<ConnectionSlot>,
    start_time: Instant,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slot.release();
        tracing::info!(
            occupancy = self.slot.occupancy(),
            session_duration_ms = self.start_time.elapsed().as_millis(),
            "Connection slot released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_slot_admits_one_occupant() {
        let slot = ConnectionSlot::new();
        assert!(slot.try_acquire());
        assert_eq!(slot.occupancy(), 1);

        // A declined attempt leaves the counter alone
        assert!(!slot.try_acquire());
        assert_eq!(slot.occupancy(), 1);

        slot.release();
        assert_eq!(slot.occupancy(), 0);
        assert!(slot.try_acquire());
    }

    #[test]
    fn test_concurrent_acquire_has_single_winner() {
        let contenders = 16;
        let slot = Arc::new(ConnectionSlot::new());
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let slot = slot.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    slot.try_acquire()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(slot.occupancy(), 1);
    }

    #[test]
    fn test_release_on_free_slot_stays_at_zero() {
        let slot = ConnectionSlot::new();
        slot.release();
        assert_eq!(slot.occupancy(), 0);
        assert!(slot.try_acquire());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let slot = Arc::new(ConnectionSlot::new());
        let guard = slot.try_claim().unwrap();
        assert!(slot.try_claim().is_none());
        assert_eq!(slot.occupancy(), 1);

        drop(guard);
        assert_eq!(slot.occupancy(), 0);
        assert!(slot.try_claim().is_some());
    }

    #[test]
    fn test_guard_releases_when_session_panics() {
        let slot = Arc::new(ConnectionSlot::new());
        let claimed = slot.clone();
        let result = thread::spawn(move || {
            let _guard = claimed.try_claim().unwrap();
            panic!("session blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(slot.occupancy(), 0);
    }

    #[test]
    fn test_independent_slots_do_not_interfere() {
        let a = ConnectionSlot::new();
        let b = ConnectionSlot::new();
        assert!(a.try_acquire());
        assert!(b.try_acquire());
    }
}

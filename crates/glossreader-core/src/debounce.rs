//! Cancelable, explicitly clocked debounce timer.
//!
//! Callers pass `now` into every operation, so the timer never spawns threads
//! or sleeps and tests can drive it with plain `Instant` arithmetic. Each
//! `schedule` replaces whatever was pending: only the last scheduled key for a
//! timer can ever fire.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Pending<K> {
    key: K,
    deadline: Instant,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    pending: Option<Pending<K>>,
    generation: u64,
}

impl<K: Clone> Debouncer<K> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer for `key`, cancelling any earlier arming. Returns the
    /// generation of the new arming.
    pub fn schedule(&mut self, key: K, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(Pending {
            key,
            deadline: now + self.delay,
            generation: self.generation,
        });
        self.generation
    }

    /// Disarm the timer. Returns true when something was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_key(&self) -> Option<&K> {
        self.pending.as_ref().map(|pending| &pending.key)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| pending.deadline)
    }

    /// Generation of the most recent arming, fired or not.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fire the timer if its deadline has passed. A fired timer is disarmed.
    pub fn poll(&mut self, now: Instant) -> Option<K> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.deadline <= now);
        if !due {
            return None;
        }
        let pending = self.pending.take()?;
        debug_assert_eq!(pending.generation, self.generation);
        Some(pending.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_delay() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(500));
        timer.schedule((), start);

        assert_eq!(timer.poll(start + Duration::from_millis(499)), None);
        assert_eq!(timer.poll(start + Duration::from_millis(500)), Some(()));
        assert_eq!(timer.poll(start + Duration::from_millis(900)), None);
    }

    #[test]
    fn rescheduling_pushes_deadline_and_replaces_key() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(300));
        for step in 0..5u64 {
            timer.schedule(step, start + Duration::from_millis(step * 100));
        }

        assert_eq!(timer.poll(start + Duration::from_millis(600)), None);
        assert_eq!(timer.pending_key(), Some(&4));
        assert_eq!(timer.poll(start + Duration::from_millis(700)), Some(4));
        assert_eq!(timer.generation(), 5);
    }

    #[test]
    fn cancel_prevents_firing() {
        let start = Instant::now();
        let mut timer = Debouncer::new(Duration::from_millis(10));
        timer.schedule("a", start);
        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert_eq!(timer.poll(start + Duration::from_secs(1)), None);
    }
}

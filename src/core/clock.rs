//! Virtual Clock & Timer Scheduler
//!
//! Replaces wall-clock `setInterval`/`setTimeout` style callbacks with an
//! explicit timer queue. Time only moves when the owner advances it, so a
//! sequence of ticks is exactly reproducible.
//!
//! Timers fire in due-time order; timers due at the same instant fire in the
//! order they were scheduled. Firing is pull-based ([`Scheduler::pop_due`]),
//! which lets the owner cancel timers between two firings of the same
//! advance.

use std::collections::BTreeMap;

/// Time in milliseconds on the virtual clock.
pub type Millis = u64;

/// Handle to a scheduled timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<T> {
    id: TimerId,
    period: Option<Millis>,
    payload: T,
}

/// A fired timer.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing<T> {
    /// Which timer fired.
    pub id: TimerId,
    /// Virtual time at which it fired.
    pub at: Millis,
    /// Payload given when scheduling.
    pub payload: T,
}

/// Deterministic timer queue over a virtual clock.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Millis,
    next_id: u64,
    /// Keyed by (due time, id) for ordered, FIFO-stable firing.
    queue: BTreeMap<(Millis, TimerId), Timer<T>>,
    /// Reverse index id -> due time, for cancellation.
    due_by_id: BTreeMap<TimerId, Millis>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    /// Create a scheduler at time zero.
    pub fn new() -> Self {
        Self {
            now: 0,
            next_id: 0,
            queue: BTreeMap::new(),
            due_by_id: BTreeMap::new(),
        }
    }

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Fire `payload` once, `delay` ms from now.
    pub fn schedule_once(&mut self, delay: Millis, payload: T) -> TimerId {
        self.insert(self.now.saturating_add(delay), None, payload)
    }

    /// Fire `payload` every `period` ms, first firing one period from now.
    ///
    /// A zero period is treated as 1 ms.
    pub fn schedule_every(&mut self, period: Millis, payload: T) -> TimerId {
        let period = period.max(1);
        self.insert(self.now.saturating_add(period), Some(period), payload)
    }

    /// Cancel a timer. Returns false if it already fired (one-shot) or was
    /// never scheduled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.due_by_id.remove(&id) {
            Some(due) => self.queue.remove(&(due, id)).is_some(),
            None => false,
        }
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&mut self) {
        self.queue.clear();
        self.due_by_id.clear();
    }

    /// Is the timer still pending?
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.due_by_id.contains_key(&id)
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time. Periodic timers are re-armed one period later.
    ///
    /// Returns `None` once nothing is due by `until`; the clock is then left
    /// where it is, call [`Scheduler::set_now`] to finish the advance.
    pub fn pop_due(&mut self, until: Millis) -> Option<Firing<T>>
    where
        T: Clone,
    {
        let (&(due, id), _) = self.queue.iter().next()?;
        if due > until {
            return None;
        }

        let timer = self.queue.remove(&(due, id))?;
        self.due_by_id.remove(&id);
        self.now = self.now.max(due);

        if let Some(period) = timer.period {
            let next_due = due.saturating_add(period);
            self.queue.insert(
                (next_due, id),
                Timer { id, period: Some(period), payload: timer.payload.clone() },
            );
            self.due_by_id.insert(id, next_due);
        }

        Some(Firing {
            id: timer.id,
            at: due,
            payload: timer.payload,
        })
    }

    /// Move the clock forward to `now`. Never moves backwards.
    pub fn set_now(&mut self, now: Millis) {
        self.now = self.now.max(now);
    }

    fn insert(&mut self, due: Millis, period: Option<Millis>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((due, id), Timer { id, period, payload });
        self.due_by_id.insert(id, due);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut Scheduler<&'static str>, until: Millis) -> Vec<(Millis, &'static str)> {
        let mut fired = Vec::new();
        while let Some(f) = scheduler.pop_due(until) {
            fired.push((f.at, f.payload));
        }
        scheduler.set_now(until);
        fired
    }

    #[test]
    fn test_once_fires_at_due_time() {
        let mut s = Scheduler::new();
        s.schedule_once(100, "reset");

        assert!(drain(&mut s, 99).is_empty());
        assert_eq!(s.now(), 99);

        assert_eq!(drain(&mut s, 100), vec![(100, "reset")]);
        assert_eq!(s.pending(), 0);
    }

    #[test]
    fn test_interval_rearms() {
        let mut s = Scheduler::new();
        s.schedule_every(50, "tick");

        let fired = drain(&mut s, 175);
        assert_eq!(fired, vec![(50, "tick"), (100, "tick"), (150, "tick")]);
        assert_eq!(s.pending(), 1);
        assert_eq!(s.now(), 175);
    }

    #[test]
    fn test_same_due_fifo() {
        let mut s = Scheduler::new();
        s.schedule_once(10, "first");
        s.schedule_once(10, "second");
        s.schedule_once(5, "earliest");

        assert_eq!(
            drain(&mut s, 10),
            vec![(5, "earliest"), (10, "first"), (10, "second")]
        );
    }

    #[test]
    fn test_cancel_between_firings() {
        let mut s = Scheduler::new();
        let tick = s.schedule_every(50, "tick");

        let first = s.pop_due(500).map(|f| f.at);
        assert_eq!(first, Some(50));

        assert!(s.cancel(tick));
        assert!(!s.is_pending(tick));
        assert!(s.pop_due(500).is_none());
        assert!(!s.cancel(tick));
    }

    #[test]
    fn test_cancel_all() {
        let mut s = Scheduler::new();
        s.schedule_every(50, "tick");
        s.schedule_once(15_000, "reset");
        s.cancel_all();
        assert!(drain(&mut s, 20_000).is_empty());
    }

    #[test]
    fn test_clock_never_moves_back() {
        let mut s: Scheduler<&'static str> = Scheduler::new();
        s.set_now(1_000);
        s.set_now(10);
        assert_eq!(s.now(), 1_000);
    }
}

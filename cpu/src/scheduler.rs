//! The scheduler holds the peripheral events which are due at some
//! point in simulated time.  Controllers schedule events (the next
//! disk sector, the end of a scan line) and the system hands each
//! one back to the peripherals when the CPU has run for long enough.
//!
//! Time advances by one [`CYCLE_TIME`] for each call to
//! [`Scheduler::clock`].
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::time::Duration;

use tracing::{event, Level};

use base::collections::pq::EarliestFirstQueue;

use super::clock::{BasicClock, Clock, CYCLE_TIME};

/// Identifies a scheduled event, so that it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

pub struct Scheduler<E> {
    clock: BasicClock,
    next_id: u64,
    /// Events fire in order of deadline; events with the same
    /// deadline fire in the order they were scheduled, which is also
    /// the order of their ids.
    deadlines: EarliestFirstQueue<EventId, (Duration, EventId)>,
    pending: HashMap<EventId, E>,
}

impl<E> Debug for Scheduler<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.clock.now())
            .field("deadlines", &self.deadlines)
            .finish_non_exhaustive()
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    #[must_use]
    pub fn new() -> Scheduler<E> {
        Scheduler {
            clock: BasicClock::new(),
            next_id: 0,
            deadlines: EarliestFirstQueue::new(),
            pending: HashMap::new(),
        }
    }

    /// The current simulated time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// The number of events waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Arrange for `event` to fire `delay` from now.  An event with
    /// a delay of zero fires on the next clock.
    pub fn schedule(&mut self, delay: Duration, event: E) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let deadline = self.clock.now() + delay;
        self.deadlines.push(id, (deadline, id));
        self.pending.insert(id, event);
        event!(Level::TRACE, "scheduled event {id:?} for {deadline:?}");
        id
    }

    /// Cancel a scheduled event.  Returns the event, or `None` if it
    /// has already fired or was never scheduled.
    pub fn cancel(&mut self, id: EventId) -> Option<E> {
        self.deadlines.remove(&id);
        self.pending.remove(&id)
    }

    /// Advance time by one CPU cycle and return the events which are
    /// now due, earliest first.
    pub fn clock(&mut self) -> Vec<E> {
        self.clock.consume(&CYCLE_TIME);
        let limit = (self.clock.now(), EventId(u64::MAX));
        let mut fired = Vec::new();
        while let Some((id, (deadline, _))) = self.deadlines.pop_due(&limit) {
            if let Some(e) = self.pending.remove(&id) {
                event!(Level::TRACE, "event {id:?} fires (deadline {deadline:?})");
                fired.push(e);
            }
        }
        fired
    }

    /// Discard every pending event and restart time from zero.
    pub fn reset(&mut self) {
        self.clock.reset();
        self.deadlines.clear();
        self.pending.clear();
    }
}

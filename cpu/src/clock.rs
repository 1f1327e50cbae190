//! Simulation of elapsed time in the simulated system.

use std::time::Duration;

/// The length of one microinstruction cycle.
pub const CYCLE_TIME: Duration = Duration::from_nanos(170);

/// Clock is a simulated system clock.  Simulated time passes only
/// when something consumes it; nothing here is tied to wall-clock
/// time.
pub trait Clock {
    /// Retrieves the current (simulated) time.
    fn now(&self) -> Duration;

    /// The caller calls `consume` to simulate the passing of a
    /// duration `interval`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use cpu::Clock;
    ///
    /// fn g<C: Clock>(clk: &mut C) {
    ///   // We just performed an action which would have taken
    ///   // one microsecond on the simulated machine.
    ///   clk.consume(&Duration::from_micros(1));
    /// }
    /// ```
    fn consume(&mut self, interval: &Duration);
}

/// BasicClock provides a simulated clock.
///
/// # Examples
/// ```
/// use cpu::{BasicClock, Clock, CYCLE_TIME};
/// let mut clk = BasicClock::new();
/// clk.consume(&CYCLE_TIME);
/// assert_eq!(clk.now().as_nanos(), 170);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicClock {
    /// Elapsed time as measured by the simulated clock.
    simulator_elapsed: Duration,
}

impl BasicClock {
    #[must_use]
    pub fn new() -> BasicClock {
        BasicClock {
            simulator_elapsed: Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.simulator_elapsed = Duration::ZERO;
    }
}

impl Default for BasicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for BasicClock {
    fn now(&self) -> Duration {
        self.simulator_elapsed
    }

    fn consume(&mut self, interval: &Duration) {
        self.simulator_elapsed += *interval;
    }
}

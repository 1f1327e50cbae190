use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{event, Level};

/// How long to sleep so that wall-clock time catches up with
/// `simulated` time run at `multiplier` times real speed, given that
/// `wall` has already passed.  `None` when we are behind.
fn owed_sleep(simulated: Duration, multiplier: f64, wall: Duration) -> Option<Duration> {
    let target = simulated.div_f64(multiplier);
    target.checked_sub(wall).filter(|owed| !owed.is_zero())
}

/// MinimalSleeper keeps the emulation from running faster than a
/// multiple of real time.  It sleeps only once the debt exceeds
/// `min_sleep`, so that it makes few system calls; on average the
/// emulation still runs at the requested speed.
///
/// When the emulation falls behind (the host is too slow) nothing
/// is done to catch up, and it simply runs flat out.
#[derive(Debug)]
pub struct MinimalSleeper {
    /// Minimum period for which we will try to sleep.
    min_sleep: Duration,
    multiplier: f64,
    started: Instant,
    total_cumulative_sleep: Duration,
}

impl MinimalSleeper {
    pub fn new(min_sleep: Duration, multiplier: f64) -> MinimalSleeper {
        MinimalSleeper {
            min_sleep,
            multiplier,
            started: Instant::now(),
            total_cumulative_sleep: Duration::ZERO,
        }
    }

    /// Called with the simulated time elapsed since the sleeper was
    /// created.
    pub fn time_passes(&mut self, simulated: Duration) {
        let wall = self.started.elapsed();
        match owed_sleep(simulated, self.multiplier, wall) {
            Some(owed) if owed > self.min_sleep => {
                event!(Level::TRACE, "MinimalSleeper: sleeping for {:?}", owed);
                sleep(owed);
                self.total_cumulative_sleep += owed;
            }
            _ => {
                // Either we are behind, or we have not built up enough
                // sleep debt to exceed the threshold yet.
            }
        }
    }
}

impl Drop for MinimalSleeper {
    fn drop(&mut self) {
        event!(
            Level::INFO,
            "MinimalSleeper: drop: total cumulative sleep is {:?}",
            self.total_cumulative_sleep
        );
    }
}

#[test]
fn test_owed_sleep() {
    let ms = Duration::from_millis;
    assert_eq!(owed_sleep(ms(10), 1.0, ms(4)), Some(ms(6)));
    // Running twice as fast halves the wall-clock time we need.
    assert_eq!(owed_sleep(ms(10), 2.0, ms(4)), Some(ms(1)));
    assert_eq!(owed_sleep(ms(10), 1.0, ms(10)), None);
    assert_eq!(owed_sleep(ms(10), 1.0, ms(12)), None);
}

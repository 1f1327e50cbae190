//! Running the system on a thread of its own.
//!
//! The emulation thread is the only one which steps the machine.
//! Other threads may look at the system between batches of cycles by
//! locking it, and must stop the controller before changing anything
//! (loading memory, attaching devices).
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use conv::*;
use tracing::{event, Level};

use super::alarm::Alarm;
use super::system::AltoSystem;

/// Called after every cycle; returning `true` stops execution.
pub type StepCallback = Box<dyn FnMut(&AltoSystem) -> bool + Send>;

/// Called when a cycle raises an alarm.  Execution has stopped.
pub type ErrorCallback = Box<dyn FnMut(&Alarm) + Send>;

/// Cycles run for each acquisition of the system lock.
const CYCLES_PER_LOCK: u32 = 4096;

#[derive(Default)]
struct Callbacks {
    step: Option<StepCallback>,
    error: Option<ErrorCallback>,
}

pub struct ExecutionController {
    system: Arc<Mutex<AltoSystem>>,
    stop_requested: Arc<AtomicBool>,
    /// The callbacks live here while the machine is stopped, and on
    /// the emulation thread while it runs.
    callbacks: Option<Callbacks>,
    worker: Option<JoinHandle<Callbacks>>,
}

impl std::fmt::Debug for ExecutionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionController")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn lock(system: &Mutex<AltoSystem>) -> MutexGuard<'_, AltoSystem> {
    // A panic on the emulation thread leaves the system in the state
    // of the last completed cycle, which is still worth inspecting.
    system.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ExecutionController {
    #[must_use]
    pub fn new(system: AltoSystem) -> ExecutionController {
        ExecutionController {
            system: Arc::new(Mutex::new(system)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            callbacks: Some(Callbacks::default()),
            worker: None,
        }
    }

    /// The system, for inspection.  While the controller is running,
    /// holding the lock pauses execution.
    #[must_use]
    pub fn system(&self) -> Arc<Mutex<AltoSystem>> {
        Arc::clone(&self.system)
    }

    /// Set the callback run after each cycle.  Takes effect at the
    /// next [`ExecutionController::start`].
    pub fn set_step_callback(&mut self, callback: StepCallback) {
        self.stop();
        if let Some(callbacks) = self.callbacks.as_mut() {
            callbacks.step = Some(callback);
        }
    }

    pub fn set_error_callback(&mut self, callback: ErrorCallback) {
        self.stop();
        if let Some(callbacks) = self.callbacks.as_mut() {
            callbacks.error = Some(callback);
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Start running on a new thread.  Does nothing if the machine is
    /// already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        // Collect the callbacks from a thread which stopped by itself.
        self.wait();
        let callbacks = self.callbacks.take().unwrap_or_default();
        self.stop_requested.store(false, Ordering::SeqCst);
        let system = Arc::clone(&self.system);
        let stop = Arc::clone(&self.stop_requested);
        event!(Level::DEBUG, "starting execution");
        self.worker = Some(thread::spawn(move || run(&system, &stop, callbacks)));
    }

    /// Stop at the end of the current cycle and wait for the
    /// emulation thread to finish.
    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wait();
    }

    /// Wait for execution to stop by itself, because the step
    /// callback asked for that or because of an alarm.
    pub fn wait(&mut self) {
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(callbacks) => self.callbacks = Some(callbacks),
                Err(_) => {
                    event!(Level::ERROR, "the emulation thread panicked");
                    self.callbacks = Some(Callbacks::default());
                }
            }
        }
    }

    /// Reset the system, resuming execution afterwards if it was
    /// running.
    pub fn reset(&mut self) {
        let was_running = self.is_running();
        self.stop();
        lock(&self.system).reset();
        if was_running {
            self.start();
        }
    }
}

impl Drop for ExecutionController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(system: &Mutex<AltoSystem>, stop: &AtomicBool, mut callbacks: Callbacks) -> Callbacks {
    let started = Instant::now();
    let mut cycles: u64 = 0;
    'running: loop {
        let mut sys = lock(system);
        for _ in 0..CYCLES_PER_LOCK {
            if stop.load(Ordering::SeqCst) {
                break 'running;
            }
            if let Err(alarm) = sys.single_step() {
                event!(Level::ERROR, "execution stopped: {alarm}");
                if let Some(on_error) = callbacks.error.as_mut() {
                    on_error(&alarm);
                }
                break 'running;
            }
            cycles += 1;
            if let Some(on_step) = callbacks.step.as_mut() {
                if on_step(&sys) {
                    break 'running;
                }
            }
        }
    }
    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        let cycles_per_second = f64::value_from(cycles).unwrap_or(f64::MAX) / elapsed;
        event!(
            Level::INFO,
            "ran {cycles} cycles in {elapsed:.3}s ({:.2} MHz)",
            cycles_per_second / 1.0e6
        );
    }
    callbacks
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use base::microcode::MicroWord;
    use base::prelude::*;

    use super::*;
    use crate::config::Configuration;
    use crate::peripherals::NullPeripherals;
    use crate::rom::{build_images, ControlRom};

    fn system(microcode: &[u32]) -> AltoSystem {
        let config = Configuration {
            system_type: SystemType::TwoKRom,
            ..Configuration::default()
        };
        let images = build_images(config.system_type, microcode, &ControlRom::default());
        AltoSystem::new(config, &images, Box::new(NullPeripherals::default()))
            .expect("images are complete")
    }

    fn nop_loop() -> Vec<u32> {
        (0..1024u16).map(|a| MicroWord::nop(a).encode()).collect()
    }

    #[test]
    fn test_step_callback_stops_execution() {
        let mut controller = ExecutionController::new(system(&nop_loop()));
        controller.set_step_callback(Box::new(|sys| sys.cycles() >= 100));
        controller.start();
        controller.wait();
        assert!(!controller.is_running());
        assert_eq!(lock(&controller.system()).cycles(), 100);
    }

    #[test]
    fn test_stop_is_at_a_cycle_boundary() {
        let mut controller = ExecutionController::new(system(&nop_loop()));
        controller.start();
        thread::sleep(Duration::from_millis(5));
        controller.stop();
        assert!(!controller.is_running());
        let sys = controller.system();
        let sys = lock(&sys);
        let cycles = <u32 as std::convert::TryFrom<_>>::try_from(sys.cycles()).expect("a short run");
        assert_eq!(sys.elapsed(), crate::clock::CYCLE_TIME * cycles);
    }

    #[test]
    fn test_alarm_reaches_error_callback() {
        // BLOCK in the emulator task.
        let mut microcode = nop_loop();
        microcode[0] = MicroWord {
            f1: 3,
            ..MicroWord::nop(0)
        }
        .encode();
        let mut controller = ExecutionController::new(system(&microcode));
        let (tx, rx) = mpsc::channel();
        controller.set_error_callback(Box::new(move |alarm| {
            tx.send(alarm.clone()).expect("receiver is waiting");
        }));
        controller.start();
        let alarm = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("the alarm is reported");
        assert_eq!(alarm.task, Some(TaskType::Emulator));
        controller.stop();
        assert_eq!(lock(&controller.system()).cycles(), 0);
    }

    #[test]
    fn test_reset_while_stopped() {
        let mut controller = ExecutionController::new(system(&nop_loop()));
        controller.set_step_callback(Box::new(|sys| sys.cycles() >= 10));
        controller.start();
        controller.stop();
        controller.reset();
        assert!(!controller.is_running());
        assert_eq!(lock(&controller.system()).cycles(), 0);
    }
}

//! The whole machine: CPU, memory bus, wakeup lines, event scheduler
//! and peripherals, clocked together.
use std::time::Duration;

use tracing::{event, Level};

use base::prelude::*;

use super::alarm::Alarm;
use super::config::Configuration;
use super::control::ControlUnit;
use super::membus::MemoryBus;
use super::peripherals::{DeviceEvent, Io, Peripherals, Signals, WakeupLines};
use super::rom::RomSource;
use super::scheduler::Scheduler;
use super::ucode::ControlStore;

pub struct AltoSystem {
    config: Configuration,
    cpu: ControlUnit,
    bus: MemoryBus,
    lines: WakeupLines,
    scheduler: Scheduler<DeviceEvent>,
    peripherals: Box<dyn Peripherals + Send>,
    cycles: u64,
}

impl std::fmt::Debug for AltoSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AltoSystem")
            .field("config", &self.config)
            .field("cpu", &self.cpu)
            .field("bus", &self.bus)
            .field("lines", &self.lines)
            .field("scheduler", &self.scheduler)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl AltoSystem {
    /// Build a system from its configuration, loading the microcode
    /// from `roms`.  The system is reset and ready to run.
    ///
    /// # Errors
    ///
    /// A `RomLoad` alarm if the ROM images cannot be loaded.
    pub fn new(
        config: Configuration,
        roms: &dyn RomSource,
        peripherals: Box<dyn Peripherals + Send>,
    ) -> Result<AltoSystem, Alarm> {
        let store = ControlStore::load(roms, config.system_type)?;
        let mut system = AltoSystem {
            cpu: ControlUnit::new(store),
            bus: MemoryBus::new(config.system_type),
            lines: WakeupLines::new(),
            scheduler: Scheduler::new(),
            peripherals,
            cycles: 0,
            config,
        };
        system.reset();
        Ok(system)
    }

    /// Hard reset, as at power-on.  Memory is cleared and pending
    /// events are discarded.
    pub fn reset(&mut self) {
        event!(Level::INFO, "resetting {} system", self.config.system_type);
        self.scheduler.reset();
        self.bus.reset();
        self.bus.main_memory_mut().reset();
        let mut io = Io {
            peripherals: &mut *self.peripherals,
            signals: Signals {
                lines: &mut self.lines,
                scheduler: &mut self.scheduler,
            },
        };
        self.cpu.reset(&mut io);
        io.peripherals.reset(&mut io.signals);
        self.cycles = 0;
    }

    /// The same soft reset that STARTF performs.
    pub fn soft_reset(&mut self) {
        let mut io = Io {
            peripherals: &mut *self.peripherals,
            signals: Signals {
                lines: &mut self.lines,
                scheduler: &mut self.scheduler,
            },
        };
        self.cpu.soft_reset(&mut self.bus, &mut io);
    }

    /// Run the machine for one CPU cycle.
    ///
    /// # Errors
    ///
    /// Any alarm raised by the CPU.  The machine should not be
    /// stepped further.
    pub fn single_step(&mut self) -> Result<(), Alarm> {
        self.bus.clock();
        let mut io = Io {
            peripherals: &mut *self.peripherals,
            signals: Signals {
                lines: &mut self.lines,
                scheduler: &mut self.scheduler,
            },
        };
        self.cpu.clock(&mut self.bus, &mut io)?;
        for due in io.signals.scheduler.clock() {
            io.peripherals.on_event(due, &mut io.signals);
        }
        self.cycles += 1;
        Ok(())
    }

    /// Run for up to `cycles` cycles.
    ///
    /// # Errors
    ///
    /// The first alarm raised; the cycles completed before it are
    /// counted by [`AltoSystem::cycles`].
    pub fn run(&mut self, cycles: u64) -> Result<(), Alarm> {
        for _ in 0..cycles {
            self.single_step()?;
        }
        Ok(())
    }

    /// Raise the wakeup line of `task`.
    ///
    /// # Errors
    ///
    /// An alarm if `task` is the emulator, which is always awake.
    pub fn wakeup_task(&mut self, task: TaskType) -> Result<(), Alarm> {
        self.lines.wakeup(task)
    }

    /// Lower the wakeup line of `task`.
    ///
    /// # Errors
    ///
    /// An alarm if `task` is the emulator, which is always awake.
    pub fn block_task(&mut self, task: TaskType) -> Result<(), Alarm> {
        self.lines.block(task)
    }

    #[must_use]
    pub fn is_blocked(&self, task: TaskType) -> bool {
        self.lines.is_blocked(task)
    }

    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    #[must_use]
    pub fn cpu(&self) -> &ControlUnit {
        &self.cpu
    }

    #[must_use]
    pub fn memory_bus(&self) -> &MemoryBus {
        &self.bus
    }

    /// For loading memory images and attaching memory-mapped
    /// devices; do this only while the machine is stopped.
    pub fn memory_bus_mut(&mut self) -> &mut MemoryBus {
        &mut self.bus
    }

    #[must_use]
    pub fn wakeup_lines(&self) -> &WakeupLines {
        &self.lines
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<DeviceEvent> {
        &self.scheduler
    }

    /// Number of cycles run since the last reset.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Simulated time since the last reset.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }
}

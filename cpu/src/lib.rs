//! This crate emulates the Alto's processor: the microcoded control
//! unit with its sixteen tasks, the ALU and shifter, the control
//! store, and the memory bus with its cycle-level timing.  Disk,
//! display, Ethernet and other controllers are outside the crate;
//! they reach the CPU through the [`Peripherals`] trait and the task
//! wakeup lines.

mod alarm;
mod alu;
mod clock;
mod config;
mod control;
mod exec;
mod membus;
mod memory;
mod peripherals;
mod rom;
mod scheduler;
mod shifter;
mod system;
mod task;
mod ucode;

pub use alarm::{Alarm, AlarmDetails, AlarmKind, FunctionField, MemoryDataAccess, RomProblem};
pub use alu::Alu;
pub use clock::{BasicClock, Clock, CYCLE_TIME};
pub use config::{Configuration, DEFAULT_ETHERNET_ADDRESS};
pub use control::{ControlUnit, Registers};
pub use exec::{ErrorCallback, ExecutionController, StepCallback};
pub use membus::{DeviceId, MemoryBus};
pub use memory::{MainMemory, MemoryMapped, MemoryRange, RAM_TOP, XM_BANK_REGISTERS};
pub use peripherals::{
    Device, DeviceEvent, Io, NullPeripherals, Peripherals, Signals, WakeupLines, KSTAT_STROBE,
};
pub use rom::{build_images, load_microcode, ControlRom, RomDirectory, RomSource};
pub use scheduler::{EventId, Scheduler};
pub use shifter::{Shifter, ShifterModifier, ShifterOp};
pub use system::AltoSystem;
pub use ucode::{ControlStore, MicrocodeBank};

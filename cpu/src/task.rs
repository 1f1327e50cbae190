//! The hardware tasks.
//!
//! All tasks share the datapath, and most of what an instruction
//! does is the same whichever task issues it.  The task-specific bus
//! sources (3 and 4) and special functions (codes 8-15) differ, as do
//! the hooks which run when a task blocks, when it gets the
//! processor, and on a soft reset.  Those are the methods of
//! [`TaskFunctions`]; there is one implementation per kind of task,
//! and [`Functions`] selects between them.
use base::microcode::SRegisterBusSource;
use base::prelude::*;

use super::alarm::{Alarm, FunctionField};
use super::alu::Alu;
use super::control::Registers;
use super::membus::MemoryBus;
use super::peripherals::Io;
use super::shifter::Shifter;
use super::ucode::ControlStore;

mod disk;
mod display;
mod emulator;
mod ethernet;
mod orbit;
mod refresh;
mod trident;

#[cfg(test)]
mod tests;

pub(crate) use emulator::Emulator;

/// How an instruction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Normal,
    /// The instruction performed TASK, so the CPU must choose which
    /// task runs next.
    TaskSwitch,
    /// The memory was not ready; the instruction did nothing and
    /// will be retried.
    MemoryWait,
}

/// The state which each task keeps for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TaskState {
    /// Address of the next instruction this task will execute.
    pub(crate) mpc: u16,
    /// Branch bits produced by the previous instruction; they are
    /// ORed into the NEXT field of this task's next instruction.
    pub(crate) next_modifier: u16,
    pub(crate) first_instruction_after_switch: bool,
    /// The S register bank.
    pub(crate) rb: usize,
    /// RDRAM or WRTRAM was issued by the previous instruction.
    pub(crate) rdram: bool,
    pub(crate) wrtram: bool,
}

impl TaskState {
    fn new(task: TaskType) -> TaskState {
        TaskState {
            mpc: u16::from(task.number()),
            next_modifier: 0,
            first_instruction_after_switch: false,
            rb: 0,
            rdram: false,
            wrtram: false,
        }
    }
}

/// Everything an instruction can touch while it executes, plus the
/// values it computes on the way.
pub(crate) struct Cycle<'a, 'io> {
    pub(crate) task: TaskType,
    pub(crate) system: SystemType,
    pub(crate) instruction: MicroInstruction,
    pub(crate) state: &'a mut TaskState,
    pub(crate) regs: &'a mut Registers,
    pub(crate) alu: &'a mut Alu,
    pub(crate) shifter: &'a mut Shifter,
    pub(crate) store: &'a mut ControlStore,
    pub(crate) memory: &'a mut MemoryBus,
    pub(crate) io: &'a mut Io<'io>,

    pub(crate) bus: u16,
    /// RSELECT, as modified by ACSOURCE and ACDEST.
    pub(crate) rselect: usize,
    /// Branch bits produced by this instruction.
    pub(crate) next_modifier: u16,
    pub(crate) load_r: bool,
    pub(crate) load_s: bool,
    pub(crate) soft_reset: bool,
    pub(crate) switch_mode: bool,
}

impl Cycle<'_, '_> {
    pub(crate) fn block_self(&mut self) -> Result<(), Alarm> {
        self.io.signals.lines.block(self.task)
    }

    fn task_specific_code(&self, field: FunctionField) -> u8 {
        match field {
            FunctionField::Alu => self.instruction.aluf.code(),
            FunctionField::BusSource => self.instruction.bs.code(),
            FunctionField::F1 => self.instruction.f1.code(),
            FunctionField::F2 => self.instruction.f2.code(),
        }
    }

    pub(crate) fn unknown(&self, field: FunctionField) -> Alarm {
        Alarm::unknown_function(field, self.task_specific_code(field))
    }

    /// The task-specific F1 code of this instruction, if it has one.
    pub(crate) fn task_f1(&self) -> Option<u8> {
        match self.instruction.f1 {
            SpecialFunction1::TaskSpecific(code) => Some(code),
            _ => None,
        }
    }

    /// The task-specific F2 code of this instruction, if it has one.
    pub(crate) fn task_f2(&self) -> Option<u8> {
        match self.instruction.f2 {
            SpecialFunction2::TaskSpecific(code) => Some(code),
            _ => None,
        }
    }
}

/// The points at which a task may differ from the others.  Every
/// method has a default: task-specific bus sources and special
/// functions are unknown, and the hooks do nothing.
pub(crate) trait TaskFunctions {
    /// Hard reset.
    fn reset(&mut self) {}

    fn soft_reset(&mut self, _io: &mut Io<'_>) {}

    /// The task has just been given the processor.
    fn on_task_switch(&mut self, _task: TaskType, _io: &mut Io<'_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// Runs before anything else, including the check for memory
    /// readiness.
    fn before_instruction(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// Bus sources 3 and 4.
    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        Err(cx.unknown(FunctionField::BusSource))
    }

    /// F2 functions which act before the bus is driven (they may
    /// change RSELECT).
    fn early_f2(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// F1 functions which modify the bus before the ALU sees it.
    fn early_f1(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// F2 functions which modify the bus before the ALU sees it.
    fn post_bus_f2(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    fn f1(&mut self, cx: &mut Cycle<'_, '_>, _code: u8) -> Result<(), Alarm> {
        Err(cx.unknown(FunctionField::F1))
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, _code: u8) -> Result<(), Alarm> {
        Err(cx.unknown(FunctionField::F2))
    }

    /// F2 functions which need the shifter output.
    fn late_f2(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// Runs after BLOCK has lowered the task's wakeup line.
    fn on_block(&mut self, _cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        Ok(())
    }

    /// Whether F2 code 6 (normally `MD←`) means something else to this
    /// task in this instruction.
    fn overrides_store_md(&self, _instruction: &MicroInstruction) -> bool {
        false
    }
}

/// `←SLOCATION` and `SLOCATION←`, the task-specific bus sources of
/// the RAM tasks.
pub(crate) fn s_register_bus_source(cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
    match SRegisterBusSource::try_from(cx.instruction.bs.code()) {
        Ok(SRegisterBusSource::ReadSLocation) => Ok(if cx.instruction.rselect == 0 {
            cx.regs.m
        } else {
            cx.regs.s[cx.state.rb][usize::from(cx.instruction.rselect)]
        }),
        Ok(SRegisterBusSource::LoadSLocation) => {
            cx.load_s = true;
            // The hardware leaves the bus undriven.
            Ok(0xffff)
        }
        Err(_) => Err(cx.unknown(FunctionField::BusSource)),
    }
}

/// The task-specific behaviour of each kind of task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Functions {
    Emulator(Emulator),
    Disk(disk::Disk),
    DisplayWord(display::DisplayWord),
    DisplayHorizontal(display::DisplayHorizontal),
    DisplayVertical(display::DisplayVertical),
    Cursor(display::Cursor),
    MemoryRefresh(refresh::MemoryRefresh),
    Parity(refresh::Parity),
    Ethernet(ethernet::Ethernet),
    Orbit(orbit::Orbit),
    Trident(trident::Trident),
}

impl Functions {
    fn of(task: TaskType) -> Functions {
        match task {
            TaskType::Emulator => Functions::Emulator(Emulator::default()),
            TaskType::DiskSector | TaskType::DiskWord => Functions::Disk(disk::Disk),
            TaskType::DisplayWord => Functions::DisplayWord(display::DisplayWord),
            TaskType::DisplayHorizontal => Functions::DisplayHorizontal(display::DisplayHorizontal),
            TaskType::DisplayVertical => Functions::DisplayVertical(display::DisplayVertical),
            TaskType::Cursor => Functions::Cursor(display::Cursor),
            TaskType::MemoryRefresh => Functions::MemoryRefresh(refresh::MemoryRefresh),
            TaskType::Parity => Functions::Parity(refresh::Parity),
            TaskType::Ethernet => Functions::Ethernet(ethernet::Ethernet),
            TaskType::Orbit => Functions::Orbit(orbit::Orbit),
            TaskType::TridentInput | TaskType::TridentOutput => Functions::Trident(trident::Trident),
        }
    }

    pub(crate) fn hooks(&mut self) -> &mut dyn TaskFunctions {
        match self {
            Functions::Emulator(f) => f,
            Functions::Disk(f) => f,
            Functions::DisplayWord(f) => f,
            Functions::DisplayHorizontal(f) => f,
            Functions::DisplayVertical(f) => f,
            Functions::Cursor(f) => f,
            Functions::MemoryRefresh(f) => f,
            Functions::Parity(f) => f,
            Functions::Ethernet(f) => f,
            Functions::Orbit(f) => f,
            Functions::Trident(f) => f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Task {
    pub(crate) kind: TaskType,
    pub(crate) state: TaskState,
    pub(crate) functions: Functions,
}

impl Task {
    pub(crate) fn new(kind: TaskType) -> Task {
        Task {
            kind,
            state: TaskState::new(kind),
            functions: Functions::of(kind),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = TaskState::new(self.kind);
        self.functions.hooks().reset();
    }

    /// A soft reset sends the task back to its starting address and
    /// leaves everything else alone.
    pub(crate) fn soft_reset(&mut self, io: &mut Io<'_>) {
        self.functions.hooks().soft_reset(io);
        self.state.mpc = u16::from(self.kind.number());
    }

    /// The Nova carry, for the emulator task.
    pub(crate) fn emulator(&self) -> Option<&Emulator> {
        match &self.functions {
            Functions::Emulator(e) => Some(e),
            _ => None,
        }
    }
}

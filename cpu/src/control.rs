//! The control unit: the microinstruction pipeline and the task
//! switcher.
//!
//! Every clock, the current task executes one microinstruction.  The
//! datapath (R, S, T, L, M, the ALU and the shifter) is shared by all
//! tasks; what each task keeps for itself is its micro-program
//! counter and a few flip-flops (see [`crate::task`]).
//!
//! Two timing details matter a great deal to the microcode:
//!
//! - The branch bits an instruction produces (from BUS=0, SH<0 and
//!   the task-specific functions) are ORed into the NEXT field of
//!   the task's *following* instruction, not its own.
//! - TASK does not switch immediately.  The highest-priority awake
//!   task is chosen when the TASK instruction completes, and the
//!   switch happens once the instruction after it has completed.
use std::mem;

use tracing::{event, span, Level};

use base::prelude::*;

use super::alarm::Alarm;
use super::alu::Alu;
use super::membus::MemoryBus;
use super::peripherals::Io;
use super::shifter::{Shifter, ShifterModifier, ShifterOp};
use super::task::{Completion, Cycle, Task, TaskFunctions};
use super::ucode::{ControlStore, MicrocodeBank};

#[cfg(test)]
pub(crate) mod tests;

/// Number of R registers, and of S registers per bank.
pub const REGISTER_COUNT: usize = 32;

/// Number of banks of S registers.
pub const S_BANKS: usize = 8;

/// The registers of the shared datapath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub r: [u16; REGISTER_COUNT],
    pub s: [[u16; REGISTER_COUNT]; S_BANKS],
    pub t: u16,
    pub l: u16,
    pub m: u16,
    pub ir: u16,
    /// The ALU carry, latched whenever L is loaded.
    pub alu_c0: u16,
    /// The emulator's SKIP flip-flop, read by the BUS+SKIP ALU
    /// function.
    pub skip: u16,
    /// The reset mode register.  A zero bit selects RAM for the
    /// corresponding task on a soft reset.
    pub rmr: u16,
}

impl Default for Registers {
    fn default() -> Registers {
        Registers {
            r: [0; REGISTER_COUNT],
            s: [[0; REGISTER_COUNT]; S_BANKS],
            t: 0,
            l: 0,
            m: 0,
            ir: 0,
            alu_c0: 0,
            skip: 0,
            rmr: 0xffff,
        }
    }
}

#[derive(Debug)]
pub struct ControlUnit {
    regs: Registers,
    alu: Alu,
    shifter: Shifter,
    store: ControlStore,
    tasks: [Option<Task>; TaskType::SLOTS],
    current: TaskType,
    /// The task chosen by the last TASK.  It takes over after the
    /// next instruction which completes normally.
    requested_next: Option<TaskType>,
}

impl ControlUnit {
    /// Build a CPU around a loaded control store.  Call
    /// [`ControlUnit::reset`] before clocking it.
    #[must_use]
    pub fn new(store: ControlStore) -> ControlUnit {
        ControlUnit {
            regs: Registers::default(),
            alu: Alu::new(),
            shifter: Shifter::new(),
            store,
            tasks: std::array::from_fn(|slot| {
                u8::try_from(slot)
                    .ok()
                    .and_then(|n| TaskType::try_from(n).ok())
                    .map(Task::new)
            }),
            current: TaskType::Emulator,
            requested_next: None,
        }
    }

    /// Hard reset.  Every task goes back to its starting address in
    /// ROM0, and the registers are cleared.
    pub fn reset(&mut self, io: &mut Io<'_>) {
        event!(Level::DEBUG, "CPU reset");
        self.store.reset();
        self.regs = Registers::default();
        self.alu.reset();
        self.shifter.reset();
        for task in self.tasks.iter_mut().flatten() {
            task.reset();
        }
        io.signals.lines.reset();
        self.current = io.signals.lines.highest_priority();
        self.requested_next = None;
    }

    /// Soft reset, as performed by STARTF with bit 15 set.  The
    /// registers keep their contents; each task restarts at its
    /// starting address in the bank selected by RMR.
    pub fn soft_reset(&mut self, memory: &mut MemoryBus, io: &mut Io<'_>) {
        event!(Level::DEBUG, "CPU soft reset, RMR={:06o}", self.regs.rmr);
        for task in self.tasks.iter_mut().flatten() {
            task.soft_reset(io);
        }
        self.store.load_banks_from_rmr(self.regs.rmr);
        memory.main_memory_mut().soft_reset();
        self.regs.rmr = 0xffff;
        self.current = TaskType::Emulator;

        // The boot microcode depends on this: the sector task must
        // run first, and the disk word and Trident tasks must not run
        // until they are woken again.
        let lines = &mut *io.signals.lines;
        lines.set(TaskType::DiskSector, true);
        lines.set(TaskType::DiskWord, false);
        lines.set(TaskType::TridentInput, false);
        lines.set(TaskType::TridentOutput, false);
    }

    /// Execute one microinstruction.
    ///
    /// # Errors
    ///
    /// Any alarm raised by the instruction, attributed to the task
    /// which was running.
    pub fn clock(&mut self, memory: &mut MemoryBus, io: &mut Io<'_>) -> Result<(), Alarm> {
        let task = self.current;
        let span = span!(Level::TRACE, "clock", task = task.short_name());
        let _enter = span.enter();

        let (completion, soft_reset) = self
            .execute(memory, io)
            .map_err(|alarm| alarm.in_task(task))?;
        if soft_reset {
            self.soft_reset(memory, io);
        }
        match completion {
            Completion::Normal => {
                if let Some(next) = self.requested_next.take() {
                    self.switch_to(next, io).map_err(|alarm| alarm.in_task(next))?;
                }
            }
            Completion::TaskSwitch => {
                let next = io.signals.lines.highest_priority();
                event!(Level::TRACE, "TASK: {next} will run next");
                self.requested_next = Some(next);
            }
            Completion::MemoryWait => (),
        }
        Ok(())
    }

    fn switch_to(&mut self, next: TaskType, io: &mut Io<'_>) -> Result<(), Alarm> {
        if next != self.current {
            event!(Level::TRACE, "task switch {} -> {}", self.current, next);
        }
        self.current = next;
        let task = self.task_mut(next)?;
        task.state.first_instruction_after_switch = true;
        task.functions.hooks().on_task_switch(next, io)
    }

    fn task_mut(&mut self, task: TaskType) -> Result<&mut Task, Alarm> {
        self.tasks[task.index()]
            .as_mut()
            .ok_or_else(|| Alarm::bug(format!("task slot {} is empty", task.number())))
    }

    /// Run the current task's next instruction.  Returns the way it
    /// completed and whether it requested a soft reset.
    fn execute(
        &mut self,
        memory: &mut MemoryBus,
        io: &mut Io<'_>,
    ) -> Result<(Completion, bool), Alarm> {
        let ControlUnit {
            regs,
            alu,
            shifter,
            store,
            tasks,
            current,
            ..
        } = self;
        let task = *current;
        let Task {
            state, functions, ..
        } = tasks[task.index()]
            .as_mut()
            .ok_or_else(|| Alarm::bug(format!("task slot {} is empty", task.number())))?;
        let system = store.system_type();
        let instruction = *store.instruction(state.mpc, task);
        event!(
            Level::TRACE,
            "{:04o}: {}",
            state.mpc,
            instruction.disassemble(Some(task))
        );
        let mut cx = Cycle {
            task,
            system,
            instruction,
            state,
            regs,
            alu,
            shifter,
            store,
            memory,
            io,
            bus: 0,
            rselect: usize::from(instruction.rselect),
            next_modifier: 0,
            load_r: false,
            load_s: false,
            soft_reset: false,
            switch_mode: false,
        };
        let completion = execute_instruction(&mut cx, functions.hooks())?;
        Ok((completion, cx.soft_reset))
    }

    /// The datapath registers.
    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    #[must_use]
    pub fn current_task(&self) -> TaskType {
        self.current
    }

    /// The task which will take over after the next instruction, if
    /// a TASK is pending.
    #[must_use]
    pub fn next_task(&self) -> Option<TaskType> {
        self.requested_next
    }

    /// The micro-program counter of `task`.
    #[must_use]
    pub fn mpc(&self, task: TaskType) -> Option<u16> {
        self.tasks[task.index()].as_ref().map(|t| t.state.mpc)
    }

    /// The S register bank selected by `task`.
    #[must_use]
    pub fn s_register_bank(&self, task: TaskType) -> Option<usize> {
        self.tasks[task.index()].as_ref().map(|t| t.state.rb)
    }

    /// The microcode bank `task` executes from.
    #[must_use]
    pub fn bank(&self, task: TaskType) -> MicrocodeBank {
        self.store.bank(task)
    }

    /// The emulator's Nova carry flip-flop.
    #[must_use]
    pub fn nova_carry(&self) -> u16 {
        self.tasks[TaskType::Emulator.index()]
            .as_ref()
            .and_then(Task::emulator)
            .map_or(0, |e| e.carry())
    }

    /// The shifter's DNS carry.
    #[must_use]
    pub fn dns_carry(&self) -> u16 {
        self.shifter.dns_carry()
    }

    #[must_use]
    pub fn control_store(&self) -> &ControlStore {
        &self.store
    }

    #[must_use]
    pub fn system_type(&self) -> SystemType {
        self.store.system_type()
    }
}

/// The value the bus sources put on the bus, before any masking by
/// the constant ROM.
fn bus_source(cx: &mut Cycle<'_, '_>, hooks: &mut dyn TaskFunctions) -> Result<u16, Alarm> {
    let i = cx.instruction;
    if i.constant_access {
        // The constant replaces the bus source, but R is still loaded.
        if i.bs == BusSource::LoadR {
            cx.load_r = true;
        }
        return Ok(i.constant_value);
    }
    Ok(match i.bs {
        BusSource::ReadR => cx.regs.r[cx.rselect],
        BusSource::LoadR => {
            cx.load_r = true;
            // R← leaves the bus undriven, and the bus pulls up to
            // zeros here.
            0
        }
        BusSource::None => 0xffff,
        BusSource::TaskSpecific1 | BusSource::TaskSpecific2 => hooks.bus_source(cx)?,
        BusSource::ReadMD => cx.memory.read_md()?,
        BusSource::ReadMouse => cx.io.peripherals.read_mouse(),
        BusSource::ReadDisp => {
            // The displacement field of IR, sign-extended for the
            // relative addressing modes.
            let ir = cx.regs.ir;
            if ir & 0x300 != 0 && ir & 0x80 != 0 {
                0xff00 | (ir & 0xff)
            } else {
                ir & 0xff
            }
        }
    })
}

fn execute_instruction(
    cx: &mut Cycle<'_, '_>,
    hooks: &mut dyn TaskFunctions,
) -> Result<Completion, Alarm> {
    hooks.before_instruction(cx)?;
    let i = cx.instruction;
    if !cx.memory.ready(i.memory_operation) {
        return Ok(Completion::MemoryWait);
    }
    let pending = mem::take(&mut cx.state.next_modifier);

    hooks.early_f2(cx)?;
    cx.bus = bus_source(cx, hooks)?;
    if i.bs4 {
        cx.bus &= i.constant_value;
    }
    if mem::take(&mut cx.state.rdram) {
        cx.bus &= cx.store.read_ram()?;
    }
    hooks.early_f1(cx)?;
    hooks.post_bus_f2(cx)?;

    let alu_out = cx.alu.execute(i.aluf, cx.bus, cx.regs.t, cx.regs.skip)?;
    if mem::take(&mut cx.state.wrtram) {
        cx.store.write_ram(alu_out, cx.regs.m);
    }

    // The DNS carry survives from one instruction to the next.
    cx.shifter.set_operation(ShifterOp::None);
    cx.shifter.set_modifier(ShifterModifier::None);

    let mut task_switch = false;
    match i.f1 {
        SpecialFunction1::None | SpecialFunction1::Constant => (),
        SpecialFunction1::LoadMAR => {
            // On the Alto II, MAR← together with MD← is an XMAR,
            // which uses the alternate memory bank.
            let extended = !cx.system.is_alto_i() && i.f2 == SpecialFunction2::StoreMD;
            cx.memory.load_mar(alu_out, cx.task, extended)?;
        }
        SpecialFunction1::Task => {
            // A task cannot switch away on its first instruction.
            task_switch = !cx.state.first_instruction_after_switch;
        }
        SpecialFunction1::Block => {
            cx.io.signals.lines.block(cx.task)?;
            hooks.on_block(cx)?;
        }
        SpecialFunction1::LLSH1 => cx.shifter.set_operation(ShifterOp::ShiftLeft),
        SpecialFunction1::LRSH1 => cx.shifter.set_operation(ShifterOp::ShiftRight),
        SpecialFunction1::LLCY8 => cx.shifter.set_operation(ShifterOp::RotateLeft),
        SpecialFunction1::TaskSpecific(code) => hooks.f1(cx, code)?,
    }

    match i.f2 {
        SpecialFunction2::None
        | SpecialFunction2::Constant
        | SpecialFunction2::ShLt0
        | SpecialFunction2::ShEq0 => (),
        SpecialFunction2::BusEq0 => {
            if cx.bus == 0 {
                cx.next_modifier |= 1;
            }
        }
        SpecialFunction2::Bus => cx.next_modifier |= cx.bus & 0x3ff,
        SpecialFunction2::ALUCY => cx.next_modifier |= cx.regs.alu_c0,
        SpecialFunction2::StoreMD => {
            // The Alto II does the store part of an XMAR as part of
            // MAR←.
            if !hooks.overrides_store_md(&i)
                && (cx.system.is_alto_i() || i.f1 != SpecialFunction1::LoadMAR)
            {
                cx.memory.load_md(cx.bus)?;
            }
        }
        SpecialFunction2::TaskSpecific(code) => hooks.f2(cx, code)?,
    }

    if cx.load_r || i.need_shifter_output {
        cx.shifter.do_operation(cx.regs.l, cx.regs.t);
    }
    let shifter_out = cx.shifter.output();
    match i.f2 {
        SpecialFunction2::ShLt0 if shifter_out & 0x8000 != 0 => cx.next_modifier |= 1,
        SpecialFunction2::ShEq0 if shifter_out == 0 => cx.next_modifier |= 1,
        _ => (),
    }

    if cx.load_r {
        cx.regs.r[cx.rselect] = shifter_out;
    }
    if cx.load_s {
        cx.regs.s[cx.state.rb][cx.rselect] = cx.regs.m;
    }
    if i.load_t {
        cx.regs.t = if i.load_t_from_alu { alu_out } else { cx.bus };
    }
    if i.load_l {
        cx.regs.l = alu_out;
        if cx.task.is_ram_task() {
            cx.regs.m = alu_out;
        }
        cx.regs.alu_c0 = cx.alu.carry();
    }

    hooks.late_f2(cx)?;

    if cx.switch_mode {
        cx.store.switch_mode(i.next, cx.task);
    }
    cx.state.next_modifier = cx.next_modifier;
    if !cx.soft_reset {
        cx.state.mpc = i.next | pending;
    }
    cx.state.first_instruction_after_switch = false;

    Ok(if task_switch {
        Completion::TaskSwitch
    } else {
        Completion::Normal
    })
}

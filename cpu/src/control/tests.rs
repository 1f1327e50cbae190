use base::microcode::{EmulatorF1, MicroWord};

use super::*;
use crate::alarm::AlarmKind;
use crate::peripherals::{DeviceEvent, NullPeripherals, Peripherals, Signals, WakeupLines};
use crate::rom::{ControlRom, MICROCODE_ROM_SIZE};
use crate::scheduler::Scheduler;

/// Just enough of a machine to clock the CPU.
pub(crate) struct Machine<P: Peripherals = NullPeripherals> {
    pub(crate) cpu: ControlUnit,
    pub(crate) bus: MemoryBus,
    pub(crate) lines: WakeupLines,
    pub(crate) scheduler: Scheduler<DeviceEvent>,
    pub(crate) peripherals: P,
}

impl Machine {
    fn new(system: SystemType, program: &[(u16, MicroWord)], constants: &[(usize, u16)]) -> Machine {
        Machine::with_peripherals(system, program, constants, NullPeripherals::default())
    }
}

impl<P: Peripherals> Machine<P> {
    pub(crate) fn with_peripherals(
        system: SystemType,
        program: &[(u16, MicroWord)],
        constants: &[(usize, u16)],
        peripherals: P,
    ) -> Machine<P> {
        let mut rom: Vec<u32> = (0..MICROCODE_ROM_SIZE)
            .map(|a| MicroWord::nop((a as u16) & NEXT_MASK).encode())
            .collect();
        for (address, word) in program {
            rom[usize::from(*address)] = word.encode();
        }
        let mut control = ControlRom::default();
        for (address, value) in constants {
            control.constants[*address] = *value;
        }
        let store = ControlStore::with_contents(system, rom, control).expect("ROM fits");
        let mut machine = Machine {
            cpu: ControlUnit::new(store),
            bus: MemoryBus::new(system),
            lines: WakeupLines::new(),
            scheduler: Scheduler::new(),
            peripherals,
        };
        machine
            .with_io(|cpu, _, io| {
                cpu.reset(io);
                Ok(())
            })
            .expect("reset cannot fail");
        machine
    }

    fn with_io<F>(&mut self, f: F) -> Result<(), Alarm>
    where
        F: FnOnce(&mut ControlUnit, &mut MemoryBus, &mut Io<'_>) -> Result<(), Alarm>,
    {
        let mut io = Io {
            peripherals: &mut self.peripherals,
            signals: Signals {
                lines: &mut self.lines,
                scheduler: &mut self.scheduler,
            },
        };
        f(&mut self.cpu, &mut self.bus, &mut io)
    }

    pub(crate) fn clock(&mut self) -> Result<(), Alarm> {
        self.bus.clock();
        self.with_io(|cpu, bus, io| cpu.clock(bus, io))
    }

    pub(crate) fn run(&mut self, cycles: usize) {
        for n in 0..cycles {
            if let Err(e) = self.clock() {
                panic!("cycle {n}: {e}");
            }
        }
    }

    pub(crate) fn mpc(&self, task: TaskType) -> u16 {
        self.cpu.mpc(task).expect("task exists")
    }
}

fn nop(next: u16) -> MicroWord {
    MicroWord::nop(next)
}

fn with_f1(f1: u8, next: u16) -> MicroWord {
    MicroWord { f1, ..nop(next) }
}

const F1_TASK: u8 = 2;
const F1_BLOCK: u8 = 3;
const F2_BUS_EQ_0: u8 = 1;
const F2_CONSTANT: u8 = 7;

#[test]
fn test_nop_loop_is_stable() {
    let program: Vec<(u16, MicroWord)> = (0..8).map(|a| (a, nop((a + 1) % 8))).collect();
    let mut m = Machine::new(SystemType::TwoKRom, &program, &[]);
    for cycles in 1..=100u16 {
        m.run(1);
        assert_eq!(m.cpu.current_task(), TaskType::Emulator);
        assert_eq!(m.mpc(TaskType::Emulator), cycles % 8);
    }
}

#[test]
fn test_branch_bits_apply_to_the_following_instruction() {
    let program = [
        // R0 is zero after a reset, so BUS=0 produces a branch bit.
        (
            0,
            MicroWord {
                bs: BusSource::ReadR.code(),
                f2: F2_BUS_EQ_0,
                ..nop(2)
            },
        ),
        (2, nop(4)),
    ];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &[]);
    m.run(1);
    assert_eq!(m.mpc(TaskType::Emulator), 2);
    m.run(1);
    assert_eq!(m.mpc(TaskType::Emulator), 5);
}

#[test]
fn test_task_switch_priority_and_delay() {
    let program = [
        (0, with_f1(F1_TASK, 1)),
        (1, nop(2)),
        (2, nop(2)),
        // Disk sector task.
        (0o4, with_f1(F1_BLOCK, 0o5)),
        (0o5, with_f1(F1_TASK, 0o6)),
        (0o6, nop(0o6)),
        // Cursor task.
        (0o12, nop(0o13)),
        (0o13, with_f1(F1_TASK, 0o14)),
        (0o14, nop(0o14)),
    ];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &[]);
    m.lines.wakeup(TaskType::Cursor).expect("not the emulator");
    m.lines.wakeup(TaskType::DiskSector).expect("not the emulator");

    m.run(1);
    // TASK has chosen the cursor task (slot 12), but the emulator
    // runs one more instruction first.
    assert_eq!(m.cpu.current_task(), TaskType::Emulator);
    assert_eq!(m.cpu.next_task(), Some(TaskType::Cursor));
    m.run(1);
    assert_eq!(m.cpu.current_task(), TaskType::Cursor);
    assert_eq!(m.cpu.next_task(), None);
    assert_eq!(m.mpc(TaskType::Emulator), 2);
    // The cursor task puts itself to sleep as soon as it runs.
    assert!(m.lines.is_blocked(TaskType::Cursor));

    m.run(2);
    assert_eq!(m.cpu.next_task(), Some(TaskType::DiskSector));
    m.run(1);
    assert_eq!(m.cpu.current_task(), TaskType::DiskSector);
    m.run(1);
    assert!(m.lines.is_blocked(TaskType::DiskSector));

    m.run(2);
    assert_eq!(m.cpu.current_task(), TaskType::Emulator);
    assert_eq!(m.mpc(TaskType::Emulator), 2);
    assert_eq!(m.mpc(TaskType::Cursor), 0o14);
    assert_eq!(m.mpc(TaskType::DiskSector), 0o6);
}

#[test]
fn test_task_on_first_instruction_is_ignored() {
    let program = [
        (0, with_f1(F1_TASK, 1)),
        (1, nop(1)),
        (0o12, with_f1(F1_TASK, 0o13)),
        (0o13, nop(0o13)),
    ];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &[]);
    m.lines.wakeup(TaskType::Cursor).expect("not the emulator");
    m.run(2);
    assert_eq!(m.cpu.current_task(), TaskType::Cursor);
    m.run(1);
    assert_eq!(m.cpu.next_task(), None);
    assert_eq!(m.mpc(TaskType::Cursor), 0o13);
}

#[test]
fn test_blocking_the_emulator_is_an_alarm() {
    let mut m = Machine::new(SystemType::TwoKRom, &[(0, with_f1(F1_BLOCK, 1))], &[]);
    let alarm = m.clock().expect_err("the emulator cannot block");
    assert_eq!(alarm.kind(), AlarmKind::ProtocolViolation);
    assert_eq!(alarm.task, Some(TaskType::Emulator));
}

#[test]
fn test_memory_wait_stalls_the_task() {
    let program = [
        // MAR← 100 (from the constant ROM).
        (
            0,
            MicroWord {
                rselect: 2,
                f1: 1,
                f2: F2_CONSTANT,
                ..nop(1)
            },
        ),
        // T← MD.
        (
            1,
            MicroWord {
                bs: BusSource::ReadMD.code(),
                load_t: true,
                ..nop(2)
            },
        ),
    ];
    // The constant addressed by RSELECT=0 and BS=5 masks ←MD.
    let constants = [((2 << 3) | 2, 0o100), (5, 0xffff)];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &constants);
    m.bus.main_memory_mut().poke(0, 0o100, 0o1234);
    m.run(1);
    for _ in 0..3 {
        m.run(1);
        assert_eq!(m.mpc(TaskType::Emulator), 1);
    }
    m.run(1);
    assert_eq!(m.mpc(TaskType::Emulator), 2);
    assert_eq!(m.cpu.registers().t, 0o1234);
}

fn soft_reset_program() -> Vec<(u16, MicroWord)> {
    vec![
        // L← (and M←) 177777.
        (
            0,
            MicroWord {
                load_l: true,
                ..nop(1)
            },
        ),
        // R5← L.
        (
            1,
            MicroWord {
                rselect: 5,
                bs: BusSource::LoadR.code(),
                ..nop(2)
            },
        ),
        // RMR← 177776 (from the constant ROM).
        (
            2,
            MicroWord {
                rselect: 1,
                f1: EmulatorF1::LoadRMR.code(),
                f2: F2_CONSTANT,
                ..nop(3)
            },
        ),
        // T← 177777, STARTF 177777.
        (
            3,
            MicroWord {
                f1: EmulatorF1::STARTF.code(),
                load_t: true,
                ..nop(4)
            },
        ),
    ]
}

#[test]
fn test_soft_reset_preserves_registers() {
    let mut program = soft_reset_program();
    // Leave RMR all ones.
    program[2].1 = nop(3);
    let mut m = Machine::new(SystemType::TwoKRom, &program, &[]);
    m.lines.wakeup(TaskType::DiskWord).expect("not the emulator");
    m.run(3);
    let before = m.cpu.registers().clone();
    assert_eq!(before.r[5], 0xffff);
    assert_eq!(before.l, 0xffff);
    assert_eq!(before.m, 0xffff);

    m.run(1);
    let after = m.cpu.registers();
    assert_eq!(after.r, before.r);
    assert_eq!(after.s, before.s);
    assert_eq!(after.l, before.l);
    assert_eq!(after.m, before.m);
    assert_eq!(after.t, 0xffff);
    assert_eq!(after.rmr, 0xffff);
    for task in TaskType::ALL {
        assert_eq!(m.cpu.bank(task), MicrocodeBank::ROM0, "{task}");
    }
    // The emulator restarts at its slot address, not at NEXT.
    assert_eq!(m.mpc(TaskType::Emulator), 0);
    assert_eq!(m.cpu.current_task(), TaskType::Emulator);
    assert!(m.lines.is_awake(TaskType::DiskSector));
    assert!(m.lines.is_blocked(TaskType::DiskWord));
    assert!(m.lines.is_blocked(TaskType::TridentInput));
}

#[test]
fn test_soft_reset_selects_banks_from_rmr() {
    let constants = [((1 << 3) | 2, 0xfffe)];
    let mut m = Machine::new(SystemType::TwoKRom, &soft_reset_program(), &constants);
    m.run(3);
    assert_eq!(m.cpu.registers().rmr, 0xfffe);
    m.run(1);
    assert_eq!(m.cpu.bank(TaskType::Emulator), MicrocodeBank::RAM0);
    assert_eq!(m.cpu.bank(TaskType::Orbit), MicrocodeBank::ROM0);
    assert_eq!(m.cpu.registers().rmr, 0xffff);
}

#[test]
fn test_control_ram_write_then_read() {
    let program = [
        // T← 5: RAM, low half, address 5.
        (
            0,
            MicroWord {
                rselect: 1,
                f2: F2_CONSTANT,
                load_t: true,
                ..nop(1)
            },
        ),
        (1, with_f1(EmulatorF1::WRTRAM.code(), 2)),
        // The ALU output (012345) becomes the low half.
        (
            2,
            MicroWord {
                rselect: 2,
                f2: F2_CONSTANT,
                ..nop(3)
            },
        ),
        (3, with_f1(EmulatorF1::RDRAM.code(), 4)),
        // T← the word read back.
        (
            4,
            MicroWord {
                load_t: true,
                ..nop(5)
            },
        ),
    ];
    let constants = [((1 << 3) | 2, 5), ((2 << 3) | 2, 0o12345)];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &constants);
    m.run(5);
    assert_eq!(m.cpu.registers().t, 0o12345);
}

#[test]
fn test_shift_left_into_r() {
    let program = [
        // L← 3 (from the constant ROM).
        (
            0,
            MicroWord {
                rselect: 1,
                f2: F2_CONSTANT,
                load_l: true,
                ..nop(1)
            },
        ),
        // R7← L LSH 1, and branch if the result is negative.
        (
            1,
            MicroWord {
                rselect: 7,
                bs: BusSource::LoadR.code(),
                f1: 4,
                f2: 2,
                ..nop(2)
            },
        ),
    ];
    let constants = [((1 << 3) | 2, 3)];
    let mut m = Machine::new(SystemType::TwoKRom, &program, &constants);
    m.run(2);
    assert_eq!(m.cpu.registers().r[7], 6);
    m.run(1);
    // SH<0 did not fire.
    assert_eq!(m.mpc(TaskType::Emulator), 2);
}

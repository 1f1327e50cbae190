use base::microcode::{
    CursorF2, DiskF1, DiskF2, DisplayHorizontalF2, DisplayWordF2, EthernetBusSource, EthernetF1,
    EthernetF2, OrbitF1, TridentF2,
};
use base::prelude::*;

use crate::control::tests::Machine;
use crate::peripherals::{Peripherals, Signals};

/// A set of controllers which remembers what the microcode asked of
/// it.
#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<(&'static str, u16)>,
    kstat: u16,
    kadr: u16,
    word_init: bool,
    horizontal_blocked: bool,
    countdown: bool,
    input_word: u16,
    collision: bool,
    orbit_iacs: bool,
    kdta: u16,
}

impl Recorder {
    fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|(n, _)| *n == name)
    }

    fn value_of(&self, name: &str) -> Option<u16> {
        self.calls.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }
}

impl Peripherals for Recorder {
    fn kstat(&self) -> u16 {
        self.kstat
    }
    fn kadr(&self) -> u16 {
        self.kadr
    }
    fn load_kadr(&mut self, value: u16, _signals: &mut Signals<'_>) {
        self.calls.push(("load_kadr", value));
        self.kadr = value;
    }
    fn word_init(&self) -> bool {
        self.word_init
    }
    fn clear_word_init(&mut self) {
        self.word_init = false;
    }
    fn disable_seclate(&mut self) {
        self.calls.push(("disable_seclate", 0));
    }

    fn load_ddr(&mut self, value: u16, _signals: &mut Signals<'_>) {
        self.calls.push(("load_ddr", value));
    }
    fn display_word_block(&mut self, _signals: &mut Signals<'_>) {
        self.calls.push(("display_word_block", 0));
    }
    fn display_horizontal_blocked(&self) -> bool {
        self.horizontal_blocked
    }
    fn set_mode(&mut self, value: u16, _signals: &mut Signals<'_>) {
        self.calls.push(("set_mode", value));
    }
    fn load_xpreg(&mut self, value: u16) {
        self.calls.push(("load_xpreg", value));
    }

    fn read_input_fifo(&mut self, advance: bool, _signals: &mut Signals<'_>) -> u16 {
        self.calls.push(("read_input_fifo", u16::from(advance)));
        self.input_word
    }
    fn ethernet_status(&self) -> u16 {
        0o377
    }
    fn reset_ethernet_interface(&mut self, _signals: &mut Signals<'_>) {
        self.calls.push(("reset_ethernet_interface", 0));
    }
    fn countdown_wakeup(&self) -> bool {
        self.countdown
    }
    fn set_countdown_wakeup(&mut self, enabled: bool) {
        self.countdown = enabled;
    }
    fn collision(&self) -> bool {
        self.collision
    }

    fn orbit_status(&mut self) -> u16 {
        0o123
    }
    fn orbit_iacs(&self) -> bool {
        self.orbit_iacs
    }
    fn orbit_stop(&mut self, _signals: &mut Signals<'_>) {
        self.calls.push(("orbit_stop", 0));
    }

    fn trident_kdta(&mut self) -> u16 {
        self.kdta
    }
}

const F1_TASK: u8 = 2;
const F1_BLOCK: u8 = 3;
const F1_CONSTANT: u8 = 7;

fn nop(next: u16) -> MicroWord {
    MicroWord::nop(next)
}

/// A machine whose emulator gives up the processor straight away,
/// with `program` for the other tasks.  None of it may use addresses
/// 0 or 0o20.
fn machine(
    system: SystemType,
    program: &[(u16, MicroWord)],
    constants: &[(usize, u16)],
    peripherals: Recorder,
) -> Machine<Recorder> {
    let mut words = vec![
        (
            0,
            MicroWord {
                f1: F1_TASK,
                ..nop(0o20)
            },
        ),
        (0o20, nop(0o20)),
    ];
    words.extend_from_slice(program);
    Machine::with_peripherals(system, &words, constants, peripherals)
}

/// Wake `task` and run until it has the processor.  Its first
/// instruction (at its slot address) is the next one executed.
fn switch_to(m: &mut Machine<Recorder>, task: TaskType) {
    m.lines.wakeup(task).expect("not the emulator");
    m.run(2);
    assert_eq!(m.cpu.current_task(), task);
    assert_eq!(m.mpc(task), u16::from(task.number()));
}

#[test]
fn test_disk_sector_task() {
    let program = [
        // T← KSTAT, KADR← BUS.
        (
            0o4,
            MicroWord {
                bs: 3,
                f1: DiskF1::LoadKADR.code(),
                load_t: true,
                ..nop(0o40)
            },
        ),
        (
            0o40,
            MicroWord {
                f2: DiskF2::RWC.code(),
                ..nop(0o50)
            },
        ),
        (0o50, nop(0o60)),
    ];
    let recorder = Recorder {
        kstat: 0o1234,
        ..Recorder::default()
    };
    let mut m = machine(SystemType::TwoKRom, &program, &[], recorder);
    switch_to(&mut m, TaskType::DiskSector);
    assert!(m.peripherals.called("disable_seclate"));

    m.run(1);
    assert_eq!(m.cpu.registers().t, 0o1234);
    // Only the low byte reaches KADR.
    assert_eq!(m.peripherals.value_of("load_kadr"), Some(0o234));

    // A write command in KADR makes RWC branch with 3.
    m.run(2);
    assert_eq!(m.mpc(TaskType::DiskSector), 0o63);
}

#[test]
fn test_disk_word_task_init() {
    let program = [
        (
            0o16,
            MicroWord {
                f2: DiskF2::INIT.code(),
                ..nop(0o40)
            },
        ),
        (
            0o40,
            MicroWord {
                f1: F1_BLOCK,
                ..nop(0o100)
            },
        ),
    ];
    let recorder = Recorder {
        word_init: true,
        ..Recorder::default()
    };
    let mut m = machine(SystemType::TwoKRom, &program, &[], recorder);
    switch_to(&mut m, TaskType::DiskWord);
    assert!(!m.peripherals.called("disable_seclate"));
    m.run(2);
    assert_eq!(m.mpc(TaskType::DiskWord), 0o137);
    assert!(m.lines.is_blocked(TaskType::DiskWord));
    // Blocking the word task ends its initialisation.
    assert!(!m.peripherals.word_init);
}

#[test]
fn test_display_word_block_wakes_horizontal_task() {
    let program = [
        // DDR← 7070 (from the constant ROM).
        (
            0o11,
            MicroWord {
                rselect: 3,
                f1: F1_CONSTANT,
                f2: DisplayWordF2::LoadDDR.code(),
                ..nop(0o40)
            },
        ),
        (
            0o40,
            MicroWord {
                f1: F1_BLOCK,
                ..nop(0o41)
            },
        ),
    ];
    let constants = [((3 << 3) | 2, 0o7070)];
    let mut m = machine(SystemType::TwoKRom, &program, &constants, Recorder::default());
    switch_to(&mut m, TaskType::DisplayWord);
    m.run(1);
    assert_eq!(m.peripherals.value_of("load_ddr"), Some(0o7070));
    assert!(m.lines.is_blocked(TaskType::DisplayHorizontal));
    m.run(1);
    assert!(m.peripherals.called("display_word_block"));
    assert!(m.lines.is_blocked(TaskType::DisplayWord));
    assert!(m.lines.is_awake(TaskType::DisplayHorizontal));
}

#[test]
fn test_display_word_block_leaves_blocked_horizontal_task_asleep() {
    let program = [(
        0o11,
        MicroWord {
            f1: F1_BLOCK,
            ..nop(0o40)
        },
    )];
    let recorder = Recorder {
        horizontal_blocked: true,
        ..Recorder::default()
    };
    let mut m = machine(SystemType::TwoKRom, &program, &[], recorder);
    switch_to(&mut m, TaskType::DisplayWord);
    m.run(1);
    assert!(m.lines.is_blocked(TaskType::DisplayHorizontal));
}

#[test]
fn test_horizontal_task_runs_once_per_wakeup() {
    let program = [
        (
            0o13,
            MicroWord {
                f2: DisplayHorizontalF2::SETMODE.code(),
                ..nop(0o40)
            },
        ),
        (0o40, nop(0o50)),
    ];
    let mut m = machine(SystemType::TwoKRom, &program, &[], Recorder::default());
    switch_to(&mut m, TaskType::DisplayHorizontal);
    assert!(m.lines.is_blocked(TaskType::DisplayHorizontal));
    m.run(2);
    assert_eq!(m.peripherals.value_of("set_mode"), Some(0xffff));
    // SETMODE branches on bit 0 of the bus.
    assert_eq!(m.mpc(TaskType::DisplayHorizontal), 0o51);
}

#[test]
fn test_cursor_task() {
    let program = [(
        0o12,
        MicroWord {
            rselect: 4,
            f1: F1_CONSTANT,
            f2: CursorF2::LoadXPREG.code(),
            ..nop(0o40)
        },
    )];
    let constants = [((4 << 3) | 2, 0o1717)];
    let mut m = machine(SystemType::TwoKRom, &program, &constants, Recorder::default());
    switch_to(&mut m, TaskType::Cursor);
    assert!(m.lines.is_blocked(TaskType::Cursor));
    m.run(1);
    assert_eq!(m.peripherals.value_of("load_xpreg"), Some(0o1717));
}

#[test]
fn test_ethernet_task() {
    let program = [
        // T← EIDFCT.
        (
            0o7,
            MicroWord {
                bs: EthernetBusSource::EIDFCT.code(),
                load_t: true,
                ..nop(0o40)
            },
        ),
        // T← BUS AND status, EPFCT.  T is loaded from the bus, which
        // EPFCT masks after the ALU has seen it.
        (
            0o40,
            MicroWord {
                aluf: AluFunction::T.code(),
                f1: EthernetF1::EPFCT.code(),
                load_t: true,
                ..nop(0o41)
            },
        ),
        // T← EILFCT, EBFCT.
        (
            0o41,
            MicroWord {
                f1: EthernetF1::EILFCT.code(),
                f2: EthernetF2::EBFCT.code(),
                load_t: true,
                ..nop(0o50)
            },
        ),
        (0o50, nop(0o60)),
    ];
    // BS 4 is masked by the constant ROM.
    let constants = [(4, 0xffff)];
    let recorder = Recorder {
        countdown: true,
        input_word: 0o4321,
        collision: true,
        ..Recorder::default()
    };
    let mut m = machine(SystemType::TwoKRom, &program, &constants, recorder);
    switch_to(&mut m, TaskType::Ethernet);

    m.run(1);
    assert_eq!(m.cpu.registers().t, 0o4321);
    // The countdown wakeup lasted for one instruction.
    assert!(!m.peripherals.countdown);
    assert!(m.lines.is_blocked(TaskType::Ethernet));

    m.run(1);
    assert_eq!(m.cpu.registers().t, 0o377);
    assert!(m.peripherals.called("reset_ethernet_interface"));

    m.run(2);
    assert_eq!(m.cpu.registers().t, 0o4321);
    let fifo_reads: Vec<u16> = m
        .peripherals
        .calls
        .iter()
        .filter(|(name, _)| *name == "read_input_fifo")
        .map(|(_, advance)| *advance)
        .collect();
    // EIDFCT takes the word, EILFCT only looks at it.
    assert_eq!(fifo_reads, vec![1, 0]);
    // A collision branches with 10.
    assert_eq!(m.mpc(TaskType::Ethernet), 0o70);
}

#[test]
fn test_orbit_task() {
    let program = [
        (
            0o1,
            MicroWord {
                f1: OrbitF1::Status.code(),
                load_t: true,
                ..nop(0o40)
            },
        ),
        (
            0o40,
            MicroWord {
                f1: F1_BLOCK,
                ..nop(0o50)
            },
        ),
    ];
    let mut m = machine(SystemType::TwoKRom, &program, &[], Recorder::default());
    switch_to(&mut m, TaskType::Orbit);
    m.run(1);
    assert_eq!(m.cpu.registers().t, 0o123);
    m.run(1);
    // IACS is clear, so the status read branched with 4.
    assert_eq!(m.mpc(TaskType::Orbit), 0o54);
    assert!(m.peripherals.called("orbit_stop"));
    assert!(m.lines.is_blocked(TaskType::Orbit));
}

#[test]
fn test_trident_task() {
    let program = [
        // T← KDTA: F2 6 with nothing else on the bus is not MD←.
        (
            0o17,
            MicroWord {
                f2: TridentF2::ReadKDTA.code(),
                load_t: true,
                ..nop(0o40)
            },
        ),
        (
            0o40,
            MicroWord {
                f2: TridentF2::WAIT.code(),
                ..nop(0o41)
            },
        ),
    ];
    let recorder = Recorder {
        kdta: 0o5555,
        ..Recorder::default()
    };
    let mut m = machine(SystemType::TwoKRom, &program, &[], recorder);
    switch_to(&mut m, TaskType::TridentInput);
    m.run(1);
    assert_eq!(m.cpu.registers().t, 0o5555);
    assert_eq!(m.mpc(TaskType::TridentInput), 0o40);
    m.run(1);
    assert!(m.lines.is_blocked(TaskType::TridentInput));
}

#[test]
fn test_alto_i_refresh_task_blocks_on_mar_from_r37() {
    let program = [(
        0o10,
        MicroWord {
            rselect: 0o37,
            f1: 1,
            bs: BusSource::ReadR.code(),
            ..nop(0o40)
        },
    )];
    for system in [SystemType::AltoI, SystemType::TwoKRom] {
        let mut m = machine(system, &program, &[], Recorder::default());
        switch_to(&mut m, TaskType::MemoryRefresh);
        m.run(1);
        assert_eq!(
            m.lines.is_blocked(TaskType::MemoryRefresh),
            system.is_alto_i(),
            "{system:?}"
        );
    }
}

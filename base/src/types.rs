//! Identities shared by everything that talks about the Alto: the
//! sixteen hardware task slots and the machine variants.
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(test)]
use test_strategy::Arbitrary;

/// The hardware tasks.  Each occupies a fixed slot whose number is
/// also its priority; higher numbers are more urgent.  Slots 2, 5
/// and 6 have no task assigned to them.
///
/// A task begins execution (after a reset) at the microcode address
/// equal to its slot number.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskType {
    Emulator = 0,
    Orbit = 1,
    TridentOutput = 3,
    DiskSector = 4,
    Ethernet = 7,
    MemoryRefresh = 8,
    DisplayWord = 9,
    Cursor = 10,
    DisplayHorizontal = 11,
    DisplayVertical = 12,
    Parity = 13,
    DiskWord = 14,
    TridentInput = 15,
}

impl TaskType {
    /// Number of task slots, including the unassigned ones.
    pub const SLOTS: usize = 16;

    pub const ALL: [TaskType; 13] = [
        TaskType::Emulator,
        TaskType::Orbit,
        TaskType::TridentOutput,
        TaskType::DiskSector,
        TaskType::Ethernet,
        TaskType::MemoryRefresh,
        TaskType::DisplayWord,
        TaskType::Cursor,
        TaskType::DisplayHorizontal,
        TaskType::DisplayVertical,
        TaskType::Parity,
        TaskType::DiskWord,
        TaskType::TridentInput,
    ];

    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// RAM-related tasks may use the S registers, load M together
    /// with L, and access the control RAM.
    #[must_use]
    pub const fn is_ram_task(self) -> bool {
        matches!(
            self,
            TaskType::Emulator
                | TaskType::Orbit
                | TaskType::TridentInput
                | TaskType::TridentOutput
        )
    }

    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            TaskType::Emulator => "EMU",
            TaskType::Orbit => "ORB",
            TaskType::TridentOutput => "TRO",
            TaskType::DiskSector => "KSEC",
            TaskType::Ethernet => "ETH",
            TaskType::MemoryRefresh => "MRT",
            TaskType::DisplayWord => "DWT",
            TaskType::Cursor => "CURS",
            TaskType::DisplayHorizontal => "DHT",
            TaskType::DisplayVertical => "DVT",
            TaskType::Parity => "PAR",
            TaskType::DiskWord => "KWD",
            TaskType::TridentInput => "TRI",
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:o})", self.short_name(), self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnassignedTaskSlot(pub u8);

impl Display for UnassignedTaskSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "no task is assigned to slot {:o}", self.0)
    }
}

impl Error for UnassignedTaskSlot {}

impl TryFrom<u8> for TaskType {
    type Error = UnassignedTaskSlot;

    fn try_from(n: u8) -> Result<TaskType, UnassignedTaskSlot> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|t| t.number() == n)
            .ok_or(UnassignedTaskSlot(n))
    }
}

/// The machine variants we can emulate.  They differ in memory
/// timing, in the amount of microcode ROM and RAM, and in the rules
/// by which `SWMODE` moves a task between control-store banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemType {
    /// An Alto I: 1K of ROM, 1K of RAM, slower memory.
    AltoI,
    /// An Alto II with 1K of ROM and 1K of RAM.
    OneKRom,
    /// An Alto II with 2K of ROM and 1K of RAM.
    TwoKRom,
    /// An Alto II with 1K of ROM and 3K of RAM.
    ThreeKRam,
}

impl SystemType {
    #[must_use]
    pub const fn is_alto_i(self) -> bool {
        matches!(self, SystemType::AltoI)
    }

    pub const ALL: [SystemType; 4] = [
        SystemType::AltoI,
        SystemType::OneKRom,
        SystemType::TwoKRom,
        SystemType::ThreeKRam,
    ];
}

impl Display for SystemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SystemType::AltoI => "AltoI",
            SystemType::OneKRom => "OneKRom",
            SystemType::TwoKRom => "TwoKRom",
            SystemType::ThreeKRam => "ThreeKRam",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSystemType(String);

impl Display for UnknownSystemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown system type '{}'", self.0)
    }
}

impl Error for UnknownSystemType {}

impl FromStr for SystemType {
    type Err = UnknownSystemType;

    fn from_str(s: &str) -> Result<SystemType, UnknownSystemType> {
        SystemType::ALL
            .iter()
            .copied()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSystemType(s.to_owned()))
    }
}

#[test]
fn test_task_priority_order() {
    assert!(TaskType::Cursor > TaskType::DiskSector);
    assert!(TaskType::Cursor > TaskType::Emulator);
    assert!(TaskType::TridentInput > TaskType::DiskWord);
    for pair in TaskType::ALL.windows(2) {
        assert!(pair[0].number() < pair[1].number());
    }
}

#[test]
fn test_unassigned_slots() {
    for n in [2u8, 5, 6, 16, 255] {
        assert_eq!(TaskType::try_from(n), Err(UnassignedTaskSlot(n)));
    }
}

#[test]
fn test_system_type_names() {
    for t in SystemType::ALL {
        assert_eq!(t.to_string().parse::<SystemType>(), Ok(t));
    }
    assert_eq!("threekram".parse::<SystemType>(), Ok(SystemType::ThreeKRam));
    assert!("Alto III".parse::<SystemType>().is_err());
}

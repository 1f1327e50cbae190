//! Alto emulator alarms.
//!
//! An alarm stops the emulator.  Microcode which misbehaves in ways
//! that real Alto software is known to do (for example storing into
//! MD when no memory reference is active) does not raise an alarm;
//! those cases are reported with a `tracing` warning instead.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// Describes the kinds of alarm that can stop the emulator.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum AlarmKind {
    /// A stateful operation was used while its preconditions did not
    /// hold.
    ProtocolViolation,
    /// A function code, bus source or ALU function has no meaning
    /// for the task which used it.
    UnknownFunction,
    /// A ROM image was missing or malformed.
    RomLoad,
    /// There is a bug in the emulator.
    Bug,
}

impl Display for AlarmKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            AlarmKind::ProtocolViolation => "protocol violation",
            AlarmKind::UnknownFunction => "unknown function",
            AlarmKind::RomLoad => "ROM load failure",
            AlarmKind::Bug => "emulator bug",
        })
    }
}

/// Which kind of memory data access was mistimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryDataAccess {
    /// `←MD`
    Read,
    /// `MD←`
    Store,
}

impl Display for MemoryDataAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            MemoryDataAccess::Read => "←MD",
            MemoryDataAccess::Store => "MD←",
        })
    }
}

/// The field of a microinstruction which held an unusable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionField {
    Alu,
    BusSource,
    F1,
    F2,
}

impl Display for FunctionField {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            FunctionField::Alu => "ALU function",
            FunctionField::BusSource => "bus source",
            FunctionField::F1 => "F1",
            FunctionField::F2 => "F2",
        })
    }
}

/// Why a ROM image could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomProblem {
    Unreadable(String),
    WrongSize { expected: usize, actual: usize },
}

impl Display for RomProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            RomProblem::Unreadable(why) => write!(f, "could not be read: {why}"),
            RomProblem::WrongSize { expected, actual } => {
                write!(f, "is {actual} bytes long but should be {expected} bytes")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmDetails {
    /// `MAR←` was issued while a memory reference was still in
    /// progress.
    MemoryBusy { active: u16, requested: u16 },

    /// `←MD` or `MD←` was performed on a cycle where the memory
    /// cannot accept it.
    MemoryDataOutOfWindow {
        access: MemoryDataAccess,
        cycle: u32,
    },

    /// Something attempted to wake or block a task which is always
    /// awake.
    AlwaysAwake { task: TaskType, operation: &'static str },

    /// A code has no meaning in the current context.
    UnknownFunction { field: FunctionField, code: u8 },

    /// The microcode used a feature which the emulator does not
    /// provide.
    Unimplemented { explanation: String },

    RomLoad { file: String, problem: RomProblem },

    /// Two memory-mapped devices claimed the same address.
    DeviceOverlap { address: u16 },

    /// There is a bug in the emulator.
    Bug { message: String },
}

impl AlarmDetails {
    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        match self {
            AlarmDetails::MemoryBusy { .. }
            | AlarmDetails::MemoryDataOutOfWindow { .. }
            | AlarmDetails::AlwaysAwake { .. } => AlarmKind::ProtocolViolation,
            AlarmDetails::UnknownFunction { .. } | AlarmDetails::Unimplemented { .. } => {
                AlarmKind::UnknownFunction
            }
            AlarmDetails::RomLoad { .. } => AlarmKind::RomLoad,
            AlarmDetails::DeviceOverlap { .. } | AlarmDetails::Bug { .. } => AlarmKind::Bug,
        }
    }
}

impl Display for AlarmDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        use AlarmDetails::*;
        match self {
            MemoryBusy { active, requested } => write!(
                f,
                "MAR←{requested:06o} while the reference to {active:06o} is still active"
            ),
            MemoryDataOutOfWindow { access, cycle } => {
                write!(f, "{access} on memory cycle {cycle}, which is not allowed")
            }
            AlwaysAwake { task, operation } => {
                write!(f, "task {task} is always awake, it cannot be {operation}")
            }
            UnknownFunction { field, code } => {
                write!(f, "{field} code {code:o} is not defined here")
            }
            Unimplemented { explanation } => {
                write!(f, "the microcode used a feature which is not emulated: {explanation}")
            }
            RomLoad { file, problem } => write!(f, "ROM image {file} {problem}"),
            DeviceOverlap { address } => write!(
                f,
                "more than one memory-mapped device claims address {address:06o}"
            ),
            Bug { message } => write!(f, "encountered a bug in the emulator: {message}"),
        }
    }
}

/// Describes an alarm which stopped the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    /// The task which was running, where that is known.
    pub task: Option<TaskType>,
    pub details: AlarmDetails,
}

impl Alarm {
    #[must_use]
    pub fn new(details: AlarmDetails) -> Alarm {
        Alarm {
            task: None,
            details,
        }
    }

    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        self.details.kind()
    }

    /// Attribute this alarm to `task` unless it already names one.
    #[must_use]
    pub fn in_task(self, task: TaskType) -> Alarm {
        Alarm {
            task: self.task.or(Some(task)),
            ..self
        }
    }

    pub(crate) fn bug(message: impl Into<String>) -> Alarm {
        Alarm::new(AlarmDetails::Bug {
            message: message.into(),
        })
    }

    pub(crate) fn unknown_function(field: FunctionField, code: u8) -> Alarm {
        Alarm::new(AlarmDetails::UnknownFunction { field, code })
    }
}

impl From<AlarmDetails> for Alarm {
    fn from(details: AlarmDetails) -> Alarm {
        Alarm::new(details)
    }
}

impl Display for Alarm {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self.task {
            Some(task) => write!(f, "{} in task {task}: {}", self.kind(), self.details),
            None => write!(f, "{}: {}", self.kind(), self.details),
        }
    }
}

impl Error for Alarm {}

#[test]
fn test_alarm_kinds() {
    assert_eq!(
        Alarm::new(AlarmDetails::MemoryBusy {
            active: 1,
            requested: 2
        })
        .kind(),
        AlarmKind::ProtocolViolation
    );
    assert_eq!(
        Alarm::unknown_function(FunctionField::F1, 12).kind(),
        AlarmKind::UnknownFunction
    );
    assert_eq!(Alarm::bug("oops").kind(), AlarmKind::Bug);
}

#[test]
fn test_alarm_attribution() {
    let alarm = Alarm::unknown_function(FunctionField::F2, 0o17).in_task(TaskType::Cursor);
    assert_eq!(alarm.task, Some(TaskType::Cursor));
    // A task named already is kept.
    let alarm = alarm.in_task(TaskType::Emulator);
    assert_eq!(alarm.task, Some(TaskType::Cursor));
    assert_eq!(
        alarm.to_string(),
        "unknown function in task CURS (12): F2 code 17 is not defined here"
    );
}

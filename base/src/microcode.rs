//! The format of a 32-bit Alto microinstruction.
//!
//! From the most significant end, a microcode word holds these
//! fields:
//!
//! | Field   | Bits | Meaning                                      |
//! | ------- | ---- | -------------------------------------------- |
//! | RSELECT | 5    | selects an R (or S) register                 |
//! | ALUF    | 4    | the ALU function                             |
//! | BS      | 3    | the bus source                               |
//! | F1      | 4    | special function 1                           |
//! | F2      | 4    | special function 2                           |
//! | LoadT   | 1    | load T (from the bus or the ALU)             |
//! | LoadL   | 1    | load L (and M in RAM tasks) from the ALU     |
//! | NEXT    | 10   | address of the next microinstruction         |
//!
//! Special function codes 0-7 (and bus sources 0-2 and 5-7) mean the
//! same thing in every task.  Codes 8-15 (and bus sources 3 and 4)
//! are interpreted by the task which is running; the tables for those
//! are at the end of this module.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use super::types::TaskType;

mod disasm;

pub use disasm::Disassembly;

/// The constant ROM holds this many 16-bit words.  It is addressed by
/// the concatenation of RSELECT and BS.
pub const CONSTANT_ROM_SIZE: usize = 256;

/// Mask for the NEXT field.
pub const NEXT_MASK: u16 = 0x3ff;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AluFunction {
    Bus = 0,
    T = 1,
    BusOrT = 2,
    BusAndT = 3,
    BusXorT = 4,
    BusPlus1 = 5,
    BusMinus1 = 6,
    BusPlusT = 7,
    BusMinusT = 8,
    BusMinusTMinus1 = 9,
    BusPlusTPlus1 = 10,
    BusPlusSkip = 11,
    /// Identical to `BusAndT` except that T is loaded from the ALU.
    AluBusAndT = 12,
    BusAndNotT = 13,
    Undefined14 = 14,
    Undefined15 = 15,
}

impl AluFunction {
    #[must_use]
    pub const fn from_code(code: u8) -> AluFunction {
        match code & 0xf {
            0 => AluFunction::Bus,
            1 => AluFunction::T,
            2 => AluFunction::BusOrT,
            3 => AluFunction::BusAndT,
            4 => AluFunction::BusXorT,
            5 => AluFunction::BusPlus1,
            6 => AluFunction::BusMinus1,
            7 => AluFunction::BusPlusT,
            8 => AluFunction::BusMinusT,
            9 => AluFunction::BusMinusTMinus1,
            10 => AluFunction::BusPlusTPlus1,
            11 => AluFunction::BusPlusSkip,
            12 => AluFunction::AluBusAndT,
            13 => AluFunction::BusAndNotT,
            14 => AluFunction::Undefined14,
            _ => AluFunction::Undefined15,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// When T is loaded, these functions load it from the ALU output
    /// rather than from the bus.
    #[must_use]
    pub const fn loads_t_from_alu(self) -> bool {
        matches!(
            self,
            AluFunction::Bus
                | AluFunction::BusOrT
                | AluFunction::BusPlus1
                | AluFunction::BusMinus1
                | AluFunction::BusPlusTPlus1
                | AluFunction::BusPlusSkip
                | AluFunction::AluBusAndT
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusSource {
    ReadR = 0,
    LoadR = 1,
    None = 2,
    TaskSpecific1 = 3,
    TaskSpecific2 = 4,
    ReadMD = 5,
    ReadMouse = 6,
    ReadDisp = 7,
}

impl BusSource {
    #[must_use]
    pub const fn from_code(code: u8) -> BusSource {
        match code & 0x7 {
            0 => BusSource::ReadR,
            1 => BusSource::LoadR,
            2 => BusSource::None,
            3 => BusSource::TaskSpecific1,
            4 => BusSource::TaskSpecific2,
            5 => BusSource::ReadMD,
            6 => BusSource::ReadMouse,
            _ => BusSource::ReadDisp,
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFunction1 {
    None,
    LoadMAR,
    Task,
    Block,
    LLSH1,
    LRSH1,
    LLCY8,
    Constant,
    /// Codes 8-15, whose meaning depends on the running task.
    TaskSpecific(u8),
}

impl SpecialFunction1 {
    #[must_use]
    pub const fn from_code(code: u8) -> SpecialFunction1 {
        match code & 0xf {
            0 => SpecialFunction1::None,
            1 => SpecialFunction1::LoadMAR,
            2 => SpecialFunction1::Task,
            3 => SpecialFunction1::Block,
            4 => SpecialFunction1::LLSH1,
            5 => SpecialFunction1::LRSH1,
            6 => SpecialFunction1::LLCY8,
            7 => SpecialFunction1::Constant,
            n => SpecialFunction1::TaskSpecific(n),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            SpecialFunction1::None => 0,
            SpecialFunction1::LoadMAR => 1,
            SpecialFunction1::Task => 2,
            SpecialFunction1::Block => 3,
            SpecialFunction1::LLSH1 => 4,
            SpecialFunction1::LRSH1 => 5,
            SpecialFunction1::LLCY8 => 6,
            SpecialFunction1::Constant => 7,
            SpecialFunction1::TaskSpecific(n) => n,
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFunction2 {
    None,
    BusEq0,
    ShLt0,
    ShEq0,
    Bus,
    ALUCY,
    StoreMD,
    Constant,
    /// Codes 8-15, whose meaning depends on the running task.
    TaskSpecific(u8),
}

impl SpecialFunction2 {
    #[must_use]
    pub const fn from_code(code: u8) -> SpecialFunction2 {
        match code & 0xf {
            0 => SpecialFunction2::None,
            1 => SpecialFunction2::BusEq0,
            2 => SpecialFunction2::ShLt0,
            3 => SpecialFunction2::ShEq0,
            4 => SpecialFunction2::Bus,
            5 => SpecialFunction2::ALUCY,
            6 => SpecialFunction2::StoreMD,
            7 => SpecialFunction2::Constant,
            n => SpecialFunction2::TaskSpecific(n),
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            SpecialFunction2::None => 0,
            SpecialFunction2::BusEq0 => 1,
            SpecialFunction2::ShLt0 => 2,
            SpecialFunction2::ShEq0 => 3,
            SpecialFunction2::Bus => 4,
            SpecialFunction2::ALUCY => 5,
            SpecialFunction2::StoreMD => 6,
            SpecialFunction2::Constant => 7,
            SpecialFunction2::TaskSpecific(n) => n,
        }
    }
}

/// The kind of memory reference a microinstruction makes, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOperation {
    None,
    LoadAddress,
    Read,
    Store,
}

/// A decoded microinstruction.
///
/// Decoding is done once, when a control-store cell is loaded or
/// written, so the fields which the execution path needs on every
/// cycle (whether the constant ROM is gated onto the bus, whether we
/// must wait for memory, and so on) are worked out here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroInstruction {
    /// The undecoded word.
    pub word: u32,

    pub rselect: u8,
    pub aluf: AluFunction,
    pub bs: BusSource,
    pub f1: SpecialFunction1,
    pub f2: SpecialFunction2,
    pub load_t: bool,
    pub load_l: bool,
    pub next: u16,

    /// F1 or F2 selects the constant ROM, so the constant replaces
    /// the bus source entirely.
    pub constant_access: bool,
    /// BS is 4 or more, so the constant ROM is ANDed onto whatever the
    /// bus source supplies.  This provides masks for the high bus
    /// sources.
    pub bs4: bool,
    /// The constant ROM word addressed by RSELECT and BS.
    pub constant_value: u16,

    pub memory_access: bool,
    pub memory_operation: MemoryOperation,

    /// The shifter must run even if no R register is loaded.
    pub need_shifter_output: bool,
    pub load_t_from_alu: bool,
}

/// F2 code 10 is DNS← in the emulator.  Every task treats the code as
/// needing the shifter output, as the hardware does.
const F2_LOAD_DNS: u8 = 10;

impl MicroInstruction {
    #[must_use]
    pub fn decode(word: u32, constants: &[u16; CONSTANT_ROM_SIZE]) -> MicroInstruction {
        let rselect = ((word & 0xf800_0000) >> 27) as u8;
        let aluf = AluFunction::from_code(((word & 0x0780_0000) >> 23) as u8);
        let bs_code = ((word & 0x0070_0000) >> 20) as u8;
        let bs = BusSource::from_code(bs_code);
        let f1 = SpecialFunction1::from_code(((word & 0x000f_0000) >> 16) as u8);
        let f2 = SpecialFunction2::from_code(((word & 0x0000_f000) >> 12) as u8);
        let load_t = word & 0x0000_0800 != 0;
        let load_l = word & 0x0000_0400 != 0;
        let next = (word & u32::from(NEXT_MASK)) as u16;

        let constant_access =
            f1 == SpecialFunction1::Constant || f2 == SpecialFunction2::Constant;
        let constant_value = constants[usize::from((rselect << 3) | bs_code)];

        // ←MD is not performed when the constant ROM drives the bus.
        let memory_access = (bs == BusSource::ReadMD && !constant_access)
            || f1 == SpecialFunction1::LoadMAR
            || f2 == SpecialFunction2::StoreMD;
        let memory_operation = if !memory_access {
            MemoryOperation::None
        } else if f1 == SpecialFunction1::LoadMAR {
            MemoryOperation::LoadAddress
        } else if bs == BusSource::ReadMD {
            MemoryOperation::Read
        } else {
            MemoryOperation::Store
        };

        let need_shifter_output = matches!(
            f2,
            SpecialFunction2::ShLt0 | SpecialFunction2::ShEq0
        ) || f2 == SpecialFunction2::TaskSpecific(F2_LOAD_DNS);

        MicroInstruction {
            word,
            rselect,
            aluf,
            bs,
            f1,
            f2,
            load_t,
            load_l,
            next,
            constant_access,
            bs4: bs_code >= 4,
            constant_value,
            memory_access,
            memory_operation,
            need_shifter_output,
            load_t_from_alu: aluf.loads_t_from_alu(),
        }
    }

    /// Produce a listing of this instruction, naming task-specific
    /// functions as `task` understands them.
    #[must_use]
    pub fn disassemble(&self, task: Option<TaskType>) -> Disassembly<'_> {
        Disassembly::new(self, task)
    }
}

/// The fields of a microcode word, before encoding.  This is the
/// inverse of [`MicroInstruction::decode`] and is mostly useful for
/// building microcode images in tests and tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MicroWord {
    pub rselect: u8,
    pub aluf: u8,
    pub bs: u8,
    pub f1: u8,
    pub f2: u8,
    pub load_t: bool,
    pub load_l: bool,
    pub next: u16,
}

impl MicroWord {
    /// A word which does nothing except go to `next`: the bus is
    /// undriven and nothing is loaded.
    #[must_use]
    pub const fn nop(next: u16) -> MicroWord {
        MicroWord {
            rselect: 0,
            aluf: AluFunction::Bus.code(),
            bs: BusSource::None.code(),
            f1: 0,
            f2: 0,
            load_t: false,
            load_l: false,
            next,
        }
    }

    #[must_use]
    pub const fn encode(&self) -> u32 {
        ((self.rselect as u32 & 0x1f) << 27)
            | ((self.aluf as u32 & 0xf) << 23)
            | ((self.bs as u32 & 0x7) << 20)
            | ((self.f1 as u32 & 0xf) << 16)
            | ((self.f2 as u32 & 0xf) << 12)
            | ((self.load_t as u32) << 11)
            | ((self.load_l as u32) << 10)
            | (self.next as u32 & NEXT_MASK as u32)
    }
}

/// Signals that a special function or bus source code has no meaning
/// in a particular table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFunctionCode {
    pub table: &'static str,
    pub code: u8,
}

impl Display for UnknownFunctionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "code {:o} is not defined in {}", self.code, self.table)
    }
}

impl Error for UnknownFunctionCode {}

macro_rules! function_codes {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            #[must_use]
            pub const fn code(self) -> u8 {
                self as u8
            }

            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl TryFrom<u8> for $name {
            type Error = UnknownFunctionCode;

            fn try_from(code: u8) -> Result<$name, UnknownFunctionCode> {
                match code {
                    $($code => Ok($name::$variant),)+
                    _ => Err(UnknownFunctionCode {
                        table: stringify!($name),
                        code,
                    }),
                }
            }
        }
    };
}

function_codes! {
    /// Emulator special function 1.  Code 12 is unused.
    EmulatorF1 {
        SWMODE = 8,
        WRTRAM = 9,
        RDRAM = 10,
        LoadRMR = 11,
        LoadESRB = 13,
        RSNF = 14,
        STARTF = 15,
    }
}

function_codes! {
    /// Emulator special function 2.  Code 15 is unused.
    EmulatorF2 {
        BUSODD = 8,
        MAGIC = 9,
        LoadDNS = 10,
        ACDEST = 11,
        LoadIR = 12,
        IDISP = 13,
        ACSOURCE = 14,
    }
}

function_codes! {
    /// The S-register bus sources of the RAM tasks.
    SRegisterBusSource {
        ReadSLocation = 3,
        LoadSLocation = 4,
    }
}

function_codes! {
    /// Special function 1 for both disk tasks.
    DiskF1 {
        STROBE = 9,
        LoadKSTAT = 10,
        INCRECNO = 11,
        CLRSTAT = 12,
        LoadKCOMM = 13,
        LoadKADR = 14,
        LoadKDATA = 15,
    }
}

function_codes! {
    /// Special function 2 for both disk tasks.
    DiskF2 {
        INIT = 8,
        RWC = 9,
        RECNO = 10,
        XFRDAT = 11,
        SWRNRDY = 12,
        NFER = 13,
        STROBON = 14,
    }
}

function_codes! {
    DiskBusSource {
        ReadKSTAT = 3,
        ReadKDATA = 4,
    }
}

function_codes! {
    DisplayWordF2 {
        LoadDDR = 8,
    }
}

function_codes! {
    DisplayHorizontalF2 {
        EVENFIELD = 8,
        SETMODE = 9,
    }
}

function_codes! {
    DisplayVerticalF2 {
        EVENFIELD = 8,
    }
}

function_codes! {
    CursorF2 {
        LoadXPREG = 8,
        LoadCSR = 9,
    }
}

function_codes! {
    EthernetBusSource {
        EIDFCT = 4,
    }
}

function_codes! {
    EthernetF1 {
        EILFCT = 11,
        EPFCT = 12,
        EWFCT = 13,
    }
}

function_codes! {
    EthernetF2 {
        EODFCT = 8,
        EOSFCT = 9,
        ERBFCT = 10,
        EEFCT = 11,
        EBFCT = 12,
        ECBFCT = 13,
        EISFCT = 14,
    }
}

function_codes! {
    OrbitF1 {
        DeltaWC = 12,
        DBCWidthRead = 13,
        OutputData = 14,
        Status = 15,
    }
}

function_codes! {
    OrbitF2 {
        DBCWidthSet = 8,
        XY = 9,
        Height = 10,
        FontData = 11,
        Ink = 12,
        Control = 13,
        ROSCommand = 14,
    }
}

function_codes! {
    /// Special function 2 for both Trident tasks.  Code 6 overlays the
    /// generic MD← function.
    TridentF2 {
        ReadKDTA = 6,
        STATUS = 8,
        KTAG = 10,
        WriteKDTA = 11,
        WAIT = 12,
        WAIT2 = 13,
        RESET = 14,
        EMPTY = 15,
    }
}

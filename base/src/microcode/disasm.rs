use std::fmt::{self, Display, Formatter};

use super::{
    AluFunction, BusSource, CursorF2, DiskBusSource, DiskF1, DiskF2, DisplayHorizontalF2,
    DisplayVerticalF2, DisplayWordF2, EmulatorF1, EmulatorF2, EthernetBusSource, EthernetF1,
    EthernetF2, MicroInstruction, OrbitF1, OrbitF2, SRegisterBusSource, SpecialFunction1,
    SpecialFunction2, TridentF2,
};
use crate::types::TaskType;

/// A printable listing of one microinstruction, in roughly the
/// notation of the Alto microassembler (octal numbers, `←` for
/// assignment, `:` before the successor address).
#[derive(Debug)]
pub struct Disassembly<'a> {
    instruction: &'a MicroInstruction,
    task: Option<TaskType>,
}

impl<'a> Disassembly<'a> {
    pub(super) fn new(instruction: &'a MicroInstruction, task: Option<TaskType>) -> Disassembly<'a> {
        Disassembly { instruction, task }
    }
}

fn task_f1_name(task: TaskType, code: u8) -> Option<&'static str> {
    match task {
        TaskType::Emulator => EmulatorF1::try_from(code).ok().map(EmulatorF1::name),
        TaskType::DiskSector | TaskType::DiskWord => DiskF1::try_from(code).ok().map(DiskF1::name),
        TaskType::Ethernet => EthernetF1::try_from(code).ok().map(EthernetF1::name),
        TaskType::Orbit => OrbitF1::try_from(code).ok().map(OrbitF1::name),
        _ => None,
    }
}

fn task_f2_name(task: TaskType, code: u8) -> Option<&'static str> {
    match task {
        TaskType::Emulator => EmulatorF2::try_from(code).ok().map(EmulatorF2::name),
        TaskType::DiskSector | TaskType::DiskWord => DiskF2::try_from(code).ok().map(DiskF2::name),
        TaskType::DisplayWord => DisplayWordF2::try_from(code).ok().map(DisplayWordF2::name),
        TaskType::DisplayHorizontal => DisplayHorizontalF2::try_from(code)
            .ok()
            .map(DisplayHorizontalF2::name),
        TaskType::DisplayVertical => DisplayVerticalF2::try_from(code)
            .ok()
            .map(DisplayVerticalF2::name),
        TaskType::Cursor => CursorF2::try_from(code).ok().map(CursorF2::name),
        TaskType::Ethernet => EthernetF2::try_from(code).ok().map(EthernetF2::name),
        TaskType::Orbit => OrbitF2::try_from(code).ok().map(OrbitF2::name),
        TaskType::TridentInput | TaskType::TridentOutput => {
            TridentF2::try_from(code).ok().map(TridentF2::name)
        }
        _ => None,
    }
}

fn task_bs_name(task: TaskType, code: u8) -> Option<&'static str> {
    match task {
        TaskType::Emulator | TaskType::Orbit | TaskType::TridentInput | TaskType::TridentOutput => {
            SRegisterBusSource::try_from(code)
                .ok()
                .map(SRegisterBusSource::name)
        }
        TaskType::DiskSector | TaskType::DiskWord => {
            DiskBusSource::try_from(code).ok().map(DiskBusSource::name)
        }
        TaskType::Ethernet => EthernetBusSource::try_from(code)
            .ok()
            .map(EthernetBusSource::name),
        _ => None,
    }
}

fn alu_expression(aluf: AluFunction) -> &'static str {
    match aluf {
        AluFunction::Bus => "BUS",
        AluFunction::T => "T",
        AluFunction::BusOrT => "BUS OR T",
        AluFunction::BusAndT => "BUS AND T",
        AluFunction::BusXorT => "BUS XOR T",
        AluFunction::BusPlus1 => "BUS+1",
        AluFunction::BusMinus1 => "BUS-1",
        AluFunction::BusPlusT => "BUS+T",
        AluFunction::BusMinusT => "BUS-T",
        AluFunction::BusMinusTMinus1 => "BUS-T-1",
        AluFunction::BusPlusTPlus1 => "BUS+T+1",
        AluFunction::BusPlusSkip => "BUS+SKIP",
        AluFunction::AluBusAndT => "BUS.T",
        AluFunction::BusAndNotT => "BUS AND NOT T",
        AluFunction::Undefined14 | AluFunction::Undefined15 => "UNDEFINED",
    }
}

impl Disassembly<'_> {
    fn bus_text(&self) -> String {
        let i = self.instruction;
        if i.constant_access {
            return format!("{:o}", i.constant_value);
        }
        let source = match i.bs {
            BusSource::ReadR => format!("R{:o}", i.rselect),
            BusSource::LoadR => "0".to_string(),
            BusSource::None => "177777".to_string(),
            BusSource::TaskSpecific1 | BusSource::TaskSpecific2 => self
                .task
                .and_then(|t| task_bs_name(t, i.bs.code()))
                .map_or_else(|| format!("BS{:o}", i.bs.code()), str::to_string),
            BusSource::ReadMD => "MD".to_string(),
            BusSource::ReadMouse => "MOUSE".to_string(),
            BusSource::ReadDisp => "DISP".to_string(),
        };
        if i.bs4 {
            format!("{source}.{:o}", i.constant_value)
        } else {
            source
        }
    }

    fn f1_text(&self) -> Option<String> {
        match self.instruction.f1 {
            SpecialFunction1::None | SpecialFunction1::Constant => None,
            SpecialFunction1::LoadMAR => Some("MAR←".to_string()),
            SpecialFunction1::Task => Some("TASK".to_string()),
            SpecialFunction1::Block => Some("BLOCK".to_string()),
            SpecialFunction1::LLSH1 => Some("LLSH1".to_string()),
            SpecialFunction1::LRSH1 => Some("LRSH1".to_string()),
            SpecialFunction1::LLCY8 => Some("LLCY8".to_string()),
            SpecialFunction1::TaskSpecific(code) => Some(
                self.task
                    .and_then(|t| task_f1_name(t, code))
                    .map_or_else(|| format!("F1={code:o}"), str::to_string),
            ),
        }
    }

    fn f2_text(&self) -> Option<String> {
        match self.instruction.f2 {
            SpecialFunction2::None | SpecialFunction2::Constant => None,
            SpecialFunction2::BusEq0 => Some("BUS=0".to_string()),
            SpecialFunction2::ShLt0 => Some("SH<0".to_string()),
            SpecialFunction2::ShEq0 => Some("SH=0".to_string()),
            SpecialFunction2::Bus => Some("BUS".to_string()),
            SpecialFunction2::ALUCY => Some("ALUCY".to_string()),
            SpecialFunction2::StoreMD => Some("MD←".to_string()),
            SpecialFunction2::TaskSpecific(code) => Some(
                self.task
                    .and_then(|t| task_f2_name(t, code))
                    .map_or_else(|| format!("F2={code:o}"), str::to_string),
            ),
        }
    }
}

impl Display for Disassembly<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let i = self.instruction;
        let mut parts: Vec<String> = Vec::new();
        if let Some(s) = self.f1_text() {
            parts.push(s);
        }
        if let Some(s) = self.f2_text() {
            parts.push(s);
        }

        let mut destinations = String::new();
        if i.bs == BusSource::LoadR {
            destinations.push_str(&format!("R{:o}← ", i.rselect));
        }
        if i.load_t {
            destinations.push_str("T← ");
        }
        if i.load_l {
            destinations.push_str("L← ");
        }
        let expression = alu_expression(i.aluf).replace("BUS", &self.bus_text());
        parts.push(format!("{destinations}{expression}"));

        write!(f, "{}, :{:04o}", parts.join(", "), i.next)
    }
}

/// Without a task, task-specific functions are shown by number.
impl Display for MicroInstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Disassembly::new(self, None).fmt(f)
    }
}

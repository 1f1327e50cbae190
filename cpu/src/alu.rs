//! The Alto's arithmetic unit.
//!
//! The ALU is a pair of 74181s.  The subtraction functions are done
//! by complement addition, so for those functions a carry of 1 means
//! that no borrow occurred.
use base::prelude::*;

use super::alarm::{Alarm, FunctionField};

/// The ALU latches the carry out of its most recent operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Alu {
    carry: u16,
}

impl Alu {
    #[must_use]
    pub fn new() -> Alu {
        Alu::default()
    }

    pub fn reset(&mut self) {
        self.carry = 0;
    }

    /// The carry out of the last operation (0 or 1).
    #[must_use]
    pub fn carry(&self) -> u16 {
        self.carry
    }

    /// Perform `function` and latch its carry.  `skip` is the value
    /// of the emulator's SKIP flip-flop (0 or 1).
    pub fn execute(
        &mut self,
        function: AluFunction,
        bus: u16,
        t: u16,
        skip: u16,
    ) -> Result<u16, Alarm> {
        let bus = i32::from(bus);
        let t = i32::from(t);
        let (result, carry) = match function {
            AluFunction::Bus => (bus, Carry::Zero),
            AluFunction::T => (t, Carry::Zero),
            AluFunction::BusOrT => (bus | t, Carry::Zero),
            AluFunction::BusAndT | AluFunction::AluBusAndT => (bus & t, Carry::Zero),
            AluFunction::BusXorT => (bus ^ t, Carry::Zero),
            AluFunction::BusPlus1 => (bus + 1, Carry::Sum),
            AluFunction::BusMinus1 => (bus - 1, Carry::Difference),
            AluFunction::BusPlusT => (bus + t, Carry::Sum),
            AluFunction::BusMinusT => (bus - t, Carry::Difference),
            AluFunction::BusMinusTMinus1 => (bus - t - 1, Carry::Difference),
            AluFunction::BusPlusTPlus1 => (bus + t + 1, Carry::Sum),
            AluFunction::BusPlusSkip => (bus + i32::from(skip), Carry::Sum),
            AluFunction::BusAndNotT => (bus & !t, Carry::Zero),
            AluFunction::Undefined14 | AluFunction::Undefined15 => {
                return Err(Alarm::unknown_function(FunctionField::Alu, function.code()));
            }
        };
        self.carry = match carry {
            Carry::Zero => 0,
            Carry::Sum => u16::from(result > 0xffff),
            Carry::Difference => u16::from(result >= 0),
        };
        Ok((result & 0xffff) as u16)
    }
}

/// How the carry out of an operation is produced.
enum Carry {
    /// The logic functions (M=1 on the 74181) produce no carry.
    Zero,
    /// Carry out of bit 0.
    Sum,
    /// Complement addition: carry means "no borrow".
    Difference,
}

//! The emulator task, which implements the Nova-like instruction set
//! of the Alto.  It is always awake.
//!
//! Besides the special functions, the emulator has two flip-flops of
//! its own: SKIP (which lives with the registers, because the ALU's
//! BUS+SKIP function reads it) and the Nova CARRY, kept here.
use tracing::{event, Level};

use base::microcode::{EmulatorF1, EmulatorF2};
use base::prelude::*;

use super::{s_register_bus_source, Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};
use crate::shifter::ShifterModifier;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Emulator {
    carry: u16,
}

impl Emulator {
    /// The Nova CARRY flip-flop.
    pub(crate) fn carry(&self) -> u16 {
        self.carry
    }
}

/// The low two bits of RSELECT, taken from an accumulator field of
/// IR.
fn accumulator(rselect: usize, field: u16) -> usize {
    (rselect & !3) | usize::from(field ^ 3)
}

/// The first-level dispatch on an arithmetic instruction: 3 minus
/// the SH field.
fn shift_dispatch(ir: u16) -> u16 {
    3 - ((ir & 0xc0) >> 6)
}

impl Emulator {
    /// Choose the Nova carry input for a DNS← operation.
    fn dns_carry_in(&self, ir: u16, alu_c0: u16) -> u16 {
        let carry = match (ir & 0x30) >> 4 {
            0 => self.carry,
            1 => 0,
            2 => 1,
            _ => !self.carry & 1,
        };
        // NEG, INC, ADC, SUB and ADD complement the carry when the
        // arithmetic produced one.
        match (ir & 0x700) >> 8 {
            1 | 3 | 4 | 5 | 6 if alu_c0 != 0 => !carry & 1,
            _ => carry,
        }
    }
}

/// Whether a Nova skip condition holds.
fn skip_condition(ir: u16, result: u16, carry: u16) -> bool {
    match ir & 7 {
        0 => false,
        1 => true,
        2 => carry == 0,
        3 => carry != 0,
        4 => result == 0,
        5 => result != 0,
        6 => result == 0 || carry == 0,
        _ => result != 0 && carry != 0,
    }
}

impl TaskFunctions for Emulator {
    fn reset(&mut self) {
        self.carry = 0;
    }

    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        s_register_bus_source(cx)
    }

    fn early_f2(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let ir = cx.regs.ir;
        match cx.task_f2().map(EmulatorF2::try_from) {
            Some(Ok(EmulatorF2::ACSOURCE)) => {
                cx.rselect = accumulator(cx.rselect, (ir & 0x6000) >> 13);
            }
            Some(Ok(EmulatorF2::ACDEST | EmulatorF2::LoadDNS)) => {
                cx.rselect = accumulator(cx.rselect, (ir & 0x1800) >> 11);
            }
            _ => (),
        }
        Ok(())
    }

    fn early_f1(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        if cx.task_f1() == Some(EmulatorF1::RSNF.code()) {
            // The Ethernet board drives the low byte; the high byte is
            // undriven.
            cx.bus &= 0xff00 | u16::from(cx.io.peripherals.ethernet_address());
        }
        Ok(())
    }

    fn f1(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f1 = EmulatorF1::try_from(code).map_err(|_| cx.unknown(FunctionField::F1))?;
        match f1 {
            EmulatorF1::LoadRMR => {
                cx.regs.rmr = cx.bus;
            }
            EmulatorF1::RSNF => (),
            EmulatorF1::STARTF => self.startf(cx),
            EmulatorF1::SWMODE => {
                cx.switch_mode = true;
            }
            EmulatorF1::RDRAM => {
                cx.store.load_control_ram_address(cx.regs.t);
                cx.state.rdram = true;
            }
            EmulatorF1::WRTRAM => {
                cx.store.load_control_ram_address(cx.regs.t);
                cx.state.wrtram = true;
            }
            EmulatorF1::LoadESRB => {
                cx.state.rb = if cx.system == SystemType::ThreeKRam {
                    usize::from((cx.bus & 0xe) >> 1)
                } else {
                    // Only the 3K RAM machine has more than one bank
                    // of S registers.
                    0
                };
            }
        }
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = EmulatorF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        let ir = cx.regs.ir;
        match f2 {
            EmulatorF2::LoadIR => {
                cx.regs.ir = cx.bus;
                // The first-level instruction dispatch.
                cx.next_modifier |= ((cx.bus & 0x8000) >> 12) | ((cx.bus & 0x0700) >> 8);
                cx.regs.skip = 0;
            }
            EmulatorF2::IDISP => {
                cx.next_modifier |= if ir & 0x8000 != 0 {
                    shift_dispatch(ir)
                } else {
                    u16::from(cx.store.acsource()[usize::from((ir & 0x7f00) >> 8) + 0x80])
                };
            }
            EmulatorF2::ACSOURCE => {
                cx.next_modifier |= if ir & 0x8000 != 0 {
                    shift_dispatch(ir)
                } else {
                    u16::from(cx.store.acsource()[usize::from((ir & 0x7f00) >> 8)])
                };
            }
            EmulatorF2::ACDEST => (),
            EmulatorF2::BUSODD => {
                cx.next_modifier |= cx.bus & 1;
            }
            EmulatorF2::MAGIC => {
                cx.shifter.set_modifier(ShifterModifier::Magic);
            }
            EmulatorF2::LoadDNS => {
                // IR[12] suppresses the store into R, whatever BS says.
                cx.load_r = ir & 0x0008 == 0;
                let carry = self.dns_carry_in(ir, cx.regs.alu_c0);
                cx.shifter.set_modifier(ShifterModifier::DNS);
                cx.shifter.set_dns_carry(carry != 0);
            }
        }
        Ok(())
    }

    fn late_f2(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        if cx.task_f2() == Some(EmulatorF2::LoadDNS.code()) {
            let carry = cx.shifter.dns_carry();
            cx.regs.skip = u16::from(skip_condition(cx.regs.ir, cx.shifter.output(), carry));
            if cx.load_r {
                self.carry = carry;
            }
        }
        Ok(())
    }
}

impl Emulator {
    fn startf(&mut self, cx: &mut Cycle<'_, '_>) {
        let code = cx.bus;
        let io = &mut *cx.io;
        match code {
            0 => (),
            c if c & 0x8000 != 0 => {
                event!(Level::DEBUG, "STARTF {c:06o}: soft reset");
                cx.soft_reset = true;
            }
            1..=3 => io.peripherals.ethernet_startf(code, &mut io.signals),
            4 => io.peripherals.orbit_startf(&mut io.signals),
            0x10 | 0x20 => io.peripherals.trident_startf(code, &mut io.signals),
            _ => {
                event!(Level::WARN, "STARTF for unknown device (code {code:06o})");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_select() {
        // AC0 is R3 and AC3 is R0.
        assert_eq!(accumulator(0, 0), 3);
        assert_eq!(accumulator(0, 3), 0);
        assert_eq!(accumulator(0o14, 1), 0o16);
    }

    #[test]
    fn test_dns_carry_in() {
        let mut e = Emulator::default();
        // MOV (function 2) with no carry control keeps CARRY.
        assert_eq!(e.dns_carry_in(0x0200, 1), 0);
        e.carry = 1;
        assert_eq!(e.dns_carry_in(0x0200, 1), 1);
        // Z, O and C carry controls.
        assert_eq!(e.dns_carry_in(0x0210, 0), 0);
        assert_eq!(e.dns_carry_in(0x0220, 0), 1);
        assert_eq!(e.dns_carry_in(0x0230, 0), 0);
        // ADD (function 6) with an ALU carry complements the input.
        assert_eq!(e.dns_carry_in(0x0620, 1), 0);
        assert_eq!(e.dns_carry_in(0x0620, 0), 1);
        // COM (function 0) never does.
        assert_eq!(e.dns_carry_in(0x0020, 1), 1);
    }

    #[test]
    fn test_skip_conditions() {
        assert!(!skip_condition(0, 0, 0));
        assert!(skip_condition(1, 5, 1));
        assert!(skip_condition(2, 5, 0));
        assert!(!skip_condition(3, 5, 0));
        assert!(skip_condition(4, 0, 1));
        assert!(skip_condition(5, 1, 1));
        assert!(skip_condition(6, 1, 0));
        assert!(!skip_condition(6, 1, 1));
        assert!(skip_condition(7, 1, 1));
        assert!(!skip_condition(7, 0, 1));
    }
}

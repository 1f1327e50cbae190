//! The shifter sits between the L register and the R registers.
use base::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShifterOp {
    #[default]
    None,
    ShiftLeft,
    ShiftRight,
    /// Exchange the two bytes (LLCY8).
    RotateLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShifterModifier {
    #[default]
    None,
    /// Shift in a bit of T, for double-length shifts.
    Magic,
    /// Nova-style shift through the emulator's carry flip-flop.
    DNS,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Shifter {
    op: ShifterOp,
    modifier: ShifterModifier,
    output: u16,
    dns_carry: u16,
}

impl Shifter {
    #[must_use]
    pub fn new() -> Shifter {
        Shifter::default()
    }

    pub fn reset(&mut self) {
        *self = Shifter::default();
    }

    pub fn set_operation(&mut self, op: ShifterOp) {
        self.op = op;
    }

    pub fn set_modifier(&mut self, modifier: ShifterModifier) {
        self.modifier = modifier;
    }

    #[must_use]
    pub fn operation(&self) -> ShifterOp {
        self.op
    }

    #[must_use]
    pub fn modifier(&self) -> ShifterModifier {
        self.modifier
    }

    /// The result of the last operation.
    #[must_use]
    pub fn output(&self) -> u16 {
        self.output
    }

    /// The Nova carry bit which DNS shifts in and out.
    #[must_use]
    pub fn dns_carry(&self) -> u16 {
        self.dns_carry
    }

    pub fn set_dns_carry(&mut self, carry: bool) {
        self.dns_carry = u16::from(carry);
    }

    /// Shift `input` (the L register) according to the current
    /// operation and modifier.  `t` supplies the bit for MAGIC.
    pub fn do_operation(&mut self, input: u16, t: u16) -> u16 {
        self.output = match self.op {
            ShifterOp::None => input,
            ShifterOp::ShiftLeft => {
                let shifted = input << 1;
                match self.modifier {
                    ShifterModifier::None => shifted,
                    ShifterModifier::Magic => shifted | (t >> 15),
                    ShifterModifier::DNS => {
                        let out = shifted | self.dns_carry;
                        self.dns_carry = input >> 15;
                        out
                    }
                }
            }
            ShifterOp::ShiftRight => {
                let shifted = input >> 1;
                match self.modifier {
                    ShifterModifier::None => shifted,
                    ShifterModifier::Magic => shifted | ((t & 1) << 15),
                    ShifterModifier::DNS => {
                        let out = shifted | (self.dns_carry << 15);
                        self.dns_carry = input & 1;
                        out
                    }
                }
            }
            // Neither modifier affects a byte swap; this agrees with
            // the hardware.
            ShifterOp::RotateLeft => swap_bytes(input),
        };
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    #[proptest]
    fn shift_left_doubles(#[strategy(0..0x8000u16)] input: u16) {
        let mut shifter = Shifter::new();
        shifter.set_operation(ShifterOp::ShiftLeft);
        assert_eq!(shifter.do_operation(input, 0xffff), input * 2);
    }

    #[proptest]
    fn dns_shift_left_keeps_top_bit(input: u16, carry_in: bool) {
        let mut shifter = Shifter::new();
        shifter.set_dns_carry(carry_in);
        shifter.set_operation(ShifterOp::ShiftLeft);
        shifter.set_modifier(ShifterModifier::DNS);
        let out = shifter.do_operation(input, 0);
        assert_eq!(out, (input << 1) | u16::from(carry_in));
        assert_eq!(shifter.dns_carry(), u16::from(input & 0x8000 != 0));
    }

    #[test]
    fn test_pass_through() {
        let mut shifter = Shifter::new();
        assert_eq!(shifter.do_operation(0o123456, 0o177777), 0o123456);
        assert_eq!(shifter.output(), 0o123456);
    }

    #[test]
    fn test_magic() {
        let mut shifter = Shifter::new();
        shifter.set_modifier(ShifterModifier::Magic);
        shifter.set_operation(ShifterOp::ShiftLeft);
        assert_eq!(shifter.do_operation(0x4001, 0x8000), 0x8003);
        shifter.set_operation(ShifterOp::ShiftRight);
        assert_eq!(shifter.do_operation(0x0002, 0x0001), 0x8001);
    }

    #[test]
    fn test_dns_right() {
        let mut shifter = Shifter::new();
        shifter.set_modifier(ShifterModifier::DNS);
        shifter.set_operation(ShifterOp::ShiftRight);
        shifter.set_dns_carry(true);
        assert_eq!(shifter.do_operation(0x0003, 0), 0x8001);
        assert_eq!(shifter.dns_carry(), 1);
        assert_eq!(shifter.do_operation(0x0002, 0), 0x8001);
        assert_eq!(shifter.dns_carry(), 0);
    }

    #[test]
    fn test_rotate_ignores_modifiers() {
        let mut shifter = Shifter::new();
        shifter.set_operation(ShifterOp::RotateLeft);
        for modifier in [
            ShifterModifier::None,
            ShifterModifier::Magic,
            ShifterModifier::DNS,
        ] {
            shifter.set_modifier(modifier);
            shifter.set_dns_carry(true);
            assert_eq!(shifter.do_operation(0x12f4, 0xffff), 0xf412);
            assert_eq!(shifter.dns_carry(), 1);
        }
    }
}

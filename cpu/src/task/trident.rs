//! The Trident disk tasks (input and output), which are RAM tasks.
use base::microcode::TridentF2;
use base::prelude::*;

use super::{s_register_bus_source, Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};
use crate::peripherals::Io;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Trident;

impl TaskFunctions for Trident {
    fn soft_reset(&mut self, io: &mut Io<'_>) {
        io.peripherals.trident_stop(&mut io.signals);
    }

    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        s_register_bus_source(cx)
    }

    fn post_bus_f2(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let io = &mut *cx.io;
        match TridentF2::try_from(cx.instruction.f2.code()) {
            // ←KDTA is only gated onto the bus when nothing else
            // drives it.
            Ok(TridentF2::ReadKDTA) if cx.instruction.bs == BusSource::None => {
                cx.bus &= io.peripherals.trident_kdta();
            }
            Ok(TridentF2::STATUS) => cx.bus &= io.peripherals.trident_status(),
            Ok(TridentF2::EMPTY) => io.peripherals.trident_wait_for_empty(&mut io.signals),
            _ => (),
        }
        Ok(())
    }

    fn overrides_store_md(&self, instruction: &MicroInstruction) -> bool {
        instruction.bs == BusSource::None
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = TridentF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        match f2 {
            TridentF2::KTAG => {
                let io = &mut *cx.io;
                io.peripherals.trident_tag(cx.bus, &mut io.signals);
            }
            TridentF2::WriteKDTA => cx.io.peripherals.trident_load_kdta(cx.bus),
            TridentF2::WAIT | TridentF2::WAIT2 => cx.block_self()?,
            TridentF2::RESET => {
                let io = &mut *cx.io;
                io.peripherals.trident_controller_reset(&mut io.signals);
            }
            // Handled before the ALU.
            TridentF2::ReadKDTA | TridentF2::STATUS | TridentF2::EMPTY => (),
        }
        Ok(())
    }
}

//! The Orbit rasteriser task, which drives a laser printer.  It is a
//! RAM task, so it has the S register bus sources.
use base::microcode::{OrbitF1, OrbitF2};

use super::{s_register_bus_source, Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Orbit;

impl TaskFunctions for Orbit {
    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        s_register_bus_source(cx)
    }

    /// All the Orbit F1 functions gate a controller register onto the
    /// bus.
    fn early_f1(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let f1 = cx.task_f1().map(OrbitF1::try_from);
        let orbit = &mut *cx.io.peripherals;
        match f1 {
            Some(Ok(OrbitF1::DeltaWC)) => cx.bus &= orbit.orbit_delta_wc(),
            Some(Ok(OrbitF1::DBCWidthRead)) => cx.bus &= orbit.orbit_dbc_width(),
            Some(Ok(OrbitF1::OutputData)) => cx.bus &= orbit.orbit_output_data(),
            Some(Ok(OrbitF1::Status)) => {
                cx.bus &= orbit.orbit_status();
                if !orbit.orbit_iacs() {
                    cx.next_modifier |= 4;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn f1(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        OrbitF1::try_from(code)
            .map(|_| ())
            .map_err(|_| cx.unknown(FunctionField::F1))
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = OrbitF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        let bus = cx.bus;
        let io = &mut *cx.io;
        let orbit = &mut *io.peripherals;
        match f2 {
            OrbitF2::DBCWidthSet => orbit.orbit_set_dbc_width(bus),
            OrbitF2::XY => orbit.orbit_set_xy(bus),
            OrbitF2::Height => {
                orbit.orbit_set_height(bus);
                if orbit.orbit_refresh_timer_expired() {
                    cx.next_modifier |= 4;
                }
            }
            OrbitF2::FontData => orbit.orbit_write_font_data(bus),
            OrbitF2::Ink => orbit.orbit_write_ink_data(bus),
            OrbitF2::Control => orbit.orbit_control(bus, &mut io.signals),
            OrbitF2::ROSCommand => orbit.orbit_ros_command(bus),
        }
        Ok(())
    }

    fn on_block(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let io = &mut *cx.io;
        io.peripherals.orbit_stop(&mut io.signals);
        Ok(())
    }
}

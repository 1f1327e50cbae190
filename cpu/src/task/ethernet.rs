//! The Ethernet task.
use tracing::{event, Level};

use base::microcode::{EthernetBusSource, EthernetF1, EthernetF2};
use base::prelude::*;

use super::{Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Ethernet;

impl TaskFunctions for Ethernet {
    fn before_instruction(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        // A countdown wakeup lasts for one instruction only.
        if cx.io.peripherals.countdown_wakeup() {
            cx.io.peripherals.set_countdown_wakeup(false);
            cx.io.signals.lines.set(TaskType::Ethernet, false);
        }
        Ok(())
    }

    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        match EthernetBusSource::try_from(cx.instruction.bs.code()) {
            Ok(EthernetBusSource::EIDFCT) => {
                let io = &mut *cx.io;
                Ok(io.peripherals.read_input_fifo(true, &mut io.signals))
            }
            Err(_) => Err(cx.unknown(FunctionField::BusSource)),
        }
    }

    fn early_f1(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        if cx.task_f1() == Some(EthernetF1::EILFCT.code()) {
            let io = &mut *cx.io;
            cx.bus &= io.peripherals.read_input_fifo(false, &mut io.signals);
        }
        Ok(())
    }

    fn f1(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f1 = EthernetF1::try_from(code).map_err(|_| cx.unknown(FunctionField::F1))?;
        let io = &mut *cx.io;
        match f1 {
            EthernetF1::EILFCT => (),
            EthernetF1::EPFCT => {
                cx.bus &= io.peripherals.ethernet_status();
                io.peripherals.reset_ethernet_interface(&mut io.signals);
                io.signals.lines.set(TaskType::Ethernet, false);
                event!(Level::DEBUG, "EPFCT: bus now {:06o}", cx.bus);
            }
            EthernetF1::EWFCT => {
                event!(Level::DEBUG, "enabling countdown wakeups");
                io.peripherals.set_countdown_wakeup(true);
            }
        }
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = EthernetF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        let io = &mut *cx.io;
        let ether = &mut *io.peripherals;
        match f2 {
            EthernetF2::EODFCT => ether.write_output_fifo(cx.bus, &mut io.signals),
            EthernetF2::EOSFCT => ether.start_output(&mut io.signals),
            EthernetF2::ERBFCT => {
                cx.next_modifier |= ether.io_command() << 2;
            }
            EthernetF2::EEFCT => ether.end_transmission(&mut io.signals),
            EthernetF2::EBFCT => {
                if ether.data_late() || ether.io_command() != 0 || ether.operation_done() {
                    cx.next_modifier |= 4;
                }
                if ether.collision() {
                    cx.next_modifier |= 8;
                }
            }
            EthernetF2::ECBFCT => {
                if !ether.input_fifo_empty() {
                    cx.next_modifier |= 4;
                }
            }
            EthernetF2::EISFCT => ether.start_input(&mut io.signals),
        }
        Ok(())
    }
}

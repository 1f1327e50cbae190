//! The display tasks: word (DWT), horizontal (DHT), vertical (DVT)
//! and cursor.
//!
//! DHT, DVT and the cursor task are woken once per scan line or
//! field and must run only once, so each lowers its own wakeup line
//! as soon as it gets the processor.
use base::microcode::{CursorF2, DisplayHorizontalF2, DisplayVerticalF2, DisplayWordF2};
use base::prelude::*;

use super::{Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};
use crate::peripherals::Io;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DisplayWord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DisplayHorizontal;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DisplayVertical;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor;

fn sleep_on_switch(task: TaskType, io: &mut Io<'_>) {
    io.signals.lines.set(task, false);
}

impl TaskFunctions for DisplayWord {
    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        match DisplayWordF2::try_from(code) {
            Ok(DisplayWordF2::LoadDDR) => {
                let io = &mut *cx.io;
                io.peripherals.load_ddr(cx.bus, &mut io.signals);
                Ok(())
            }
            Err(_) => Err(cx.unknown(FunctionField::F2)),
        }
    }

    fn on_block(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let io = &mut *cx.io;
        io.peripherals.display_word_block(&mut io.signals);
        if !io.peripherals.display_horizontal_blocked() {
            io.signals.lines.wakeup(TaskType::DisplayHorizontal)?;
        }
        Ok(())
    }
}

impl TaskFunctions for DisplayHorizontal {
    fn on_task_switch(&mut self, task: TaskType, io: &mut Io<'_>) -> Result<(), Alarm> {
        sleep_on_switch(task, io);
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = DisplayHorizontalF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        let io = &mut *cx.io;
        match f2 {
            DisplayHorizontalF2::EVENFIELD => {
                cx.next_modifier |= u16::from(io.peripherals.even_field());
            }
            DisplayHorizontalF2::SETMODE => {
                io.peripherals.set_mode(cx.bus, &mut io.signals);
                cx.next_modifier |= u16::from(cx.bus & 0x8000 != 0);
            }
        }
        Ok(())
    }

    fn on_block(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        let io = &mut *cx.io;
        io.peripherals.display_horizontal_block(&mut io.signals);
        Ok(())
    }
}

impl TaskFunctions for DisplayVertical {
    fn on_task_switch(&mut self, task: TaskType, io: &mut Io<'_>) -> Result<(), Alarm> {
        sleep_on_switch(task, io);
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        match DisplayVerticalF2::try_from(code) {
            Ok(DisplayVerticalF2::EVENFIELD) => {
                cx.next_modifier |= u16::from(cx.io.peripherals.even_field());
                Ok(())
            }
            Err(_) => Err(cx.unknown(FunctionField::F2)),
        }
    }
}

impl TaskFunctions for Cursor {
    fn on_task_switch(&mut self, task: TaskType, io: &mut Io<'_>) -> Result<(), Alarm> {
        sleep_on_switch(task, io);
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = CursorF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        match f2 {
            CursorF2::LoadXPREG => cx.io.peripherals.load_xpreg(cx.bus),
            CursorF2::LoadCSR => cx.io.peripherals.load_csr(cx.bus),
        }
        Ok(())
    }
}

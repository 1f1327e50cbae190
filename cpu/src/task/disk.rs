//! The disk sector and disk word tasks, which share their functions.
use base::microcode::{DiskBusSource, DiskF1, DiskF2};
use base::prelude::*;

use super::{Cycle, TaskFunctions};
use crate::alarm::{Alarm, FunctionField};
use crate::peripherals::{Io, KSTAT_STROBE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Disk;

impl Disk {
    /// While WDINIT is set, every branch function of the word task
    /// also ORs in 37B.
    fn init_modifier(cx: &Cycle<'_, '_>) -> u16 {
        if cx.task == TaskType::DiskWord && cx.io.peripherals.word_init() {
            0o37
        } else {
            0
        }
    }
}

impl TaskFunctions for Disk {
    fn on_task_switch(&mut self, task: TaskType, io: &mut Io<'_>) -> Result<(), Alarm> {
        if task == TaskType::DiskSector {
            io.peripherals.disable_seclate();
        }
        Ok(())
    }

    fn bus_source(&mut self, cx: &mut Cycle<'_, '_>) -> Result<u16, Alarm> {
        match DiskBusSource::try_from(cx.instruction.bs.code()) {
            Ok(DiskBusSource::ReadKSTAT) => Ok(cx.io.peripherals.kstat()),
            Ok(DiskBusSource::ReadKDATA) => Ok(cx.io.peripherals.kdata()),
            Err(_) => Err(cx.unknown(FunctionField::BusSource)),
        }
    }

    fn f1(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f1 = DiskF1::try_from(code).map_err(|_| cx.unknown(FunctionField::F1))?;
        let bus = cx.bus;
        let io = &mut *cx.io;
        let disk = &mut *io.peripherals;
        let signals = &mut io.signals;
        match f1 {
            DiskF1::LoadKDATA => disk.load_kdata(bus, signals),
            DiskF1::LoadKADR => disk.load_kadr(bus & 0xff, signals),
            DiskF1::LoadKCOMM => disk.load_kcom((bus & 0x7c00) >> 10, signals),
            DiskF1::CLRSTAT => disk.clear_disk_status(signals),
            DiskF1::INCRECNO => disk.increment_record(signals),
            DiskF1::LoadKSTAT => {
                // Only the low bits are loaded, and bit 13 (the
                // "no transfer" flag) is inverted on the way.
                let bits = (bus & 0xb) | (!bus & 0x4);
                let kstat = (disk.kstat() & 0xfff4) | bits;
                disk.load_kstat(kstat, signals);
            }
            DiskF1::STROBE => disk.disk_strobe(signals),
        }
        Ok(())
    }

    fn f2(&mut self, cx: &mut Cycle<'_, '_>, code: u8) -> Result<(), Alarm> {
        let f2 = DiskF2::try_from(code).map_err(|_| cx.unknown(FunctionField::F2))?;
        let init = Disk::init_modifier(cx);
        let disk = &*cx.io.peripherals;
        let branch = match f2 {
            DiskF2::INIT => 0,
            DiskF2::RWC => match (disk.kadr() & 0xc0) >> 6 {
                0 => 0,
                1 => 2,
                _ => 3,
            },
            DiskF2::XFRDAT => u16::from(disk.data_transfer()),
            DiskF2::RECNO => disk.record_number(),
            DiskF2::NFER => u16::from(!disk.fatal_disk_error()),
            DiskF2::STROBON => u16::from(disk.kstat() & KSTAT_STROBE != 0),
            DiskF2::SWRNRDY => u16::from(!disk.disk_ready()),
        };
        cx.next_modifier |= init | branch;
        Ok(())
    }

    fn on_block(&mut self, cx: &mut Cycle<'_, '_>) -> Result<(), Alarm> {
        if cx.task == TaskType::DiskWord {
            cx.io.peripherals.clear_word_init();
        }
        Ok(())
    }
}

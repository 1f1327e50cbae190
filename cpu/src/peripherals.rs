//! The interface between the CPU and the I/O controllers.
//!
//! The microcode drives the controllers directly: task-specific bus
//! sources read controller registers, and task-specific special
//! functions load registers, strobe signals and sample status bits
//! for microcode branches.  Those calls all go through the
//! [`Peripherals`] trait.  The controllers signal back to the CPU by
//! raising and lowering task wakeup lines ([`WakeupLines`]), and they
//! measure time by scheduling events.
//!
//! Every method of `Peripherals` has a default which behaves as if
//! the corresponding controller were not attached.
use std::fmt::{self, Debug, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::alarm::{Alarm, AlarmDetails};
use super::scheduler::Scheduler;

/// The hardware wakeup line of each task.  A task runs only while
/// its line is raised; the emulator task's line is permanently
/// raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeupLines {
    awake: [bool; TaskType::SLOTS],
}

impl Default for WakeupLines {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeupLines {
    #[must_use]
    pub fn new() -> WakeupLines {
        let mut lines = WakeupLines {
            awake: [false; TaskType::SLOTS],
        };
        lines.reset();
        lines
    }

    /// Lower every line except the emulator's.
    pub(crate) fn reset(&mut self) {
        self.awake = [false; TaskType::SLOTS];
        self.awake[TaskType::Emulator.index()] = true;
    }

    /// Set a line without the always-awake check; for the CPU's own
    /// use.
    pub(crate) fn set(&mut self, task: TaskType, awake: bool) {
        if task != TaskType::Emulator {
            self.awake[task.index()] = awake;
        }
    }

    /// Raise the wakeup line of `task`.
    ///
    /// # Errors
    ///
    /// An `AlwaysAwake` alarm if `task` is the emulator.
    pub fn wakeup(&mut self, task: TaskType) -> Result<(), Alarm> {
        if task == TaskType::Emulator {
            return Err(Alarm::new(AlarmDetails::AlwaysAwake {
                task,
                operation: "woken",
            }));
        }
        if !self.awake[task.index()] {
            event!(Level::TRACE, "wakeup {task}");
        }
        self.awake[task.index()] = true;
        Ok(())
    }

    /// Lower the wakeup line of `task`.
    ///
    /// # Errors
    ///
    /// An `AlwaysAwake` alarm if `task` is the emulator.
    pub fn block(&mut self, task: TaskType) -> Result<(), Alarm> {
        if task == TaskType::Emulator {
            return Err(Alarm::new(AlarmDetails::AlwaysAwake {
                task,
                operation: "blocked",
            }));
        }
        if self.awake[task.index()] {
            event!(Level::TRACE, "block {task}");
        }
        self.awake[task.index()] = false;
        Ok(())
    }

    #[must_use]
    pub fn is_awake(&self, task: TaskType) -> bool {
        self.awake[task.index()]
    }

    #[must_use]
    pub fn is_blocked(&self, task: TaskType) -> bool {
        !self.is_awake(task)
    }

    /// The most urgent task whose line is raised.  Since the emulator
    /// never sleeps, there always is one.
    #[must_use]
    pub fn highest_priority(&self) -> TaskType {
        TaskType::ALL
            .iter()
            .rev()
            .copied()
            .find(|t| self.is_awake(*t))
            .unwrap_or(TaskType::Emulator)
    }
}

/// The controllers which can schedule events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Disk,
    Display,
    Ethernet,
    Keyboard,
    Mouse,
    Orbit,
    Trident,
}

/// A scheduled event.  The meaning of `code` is up to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceEvent {
    pub device: Device,
    pub code: u32,
}

/// What a controller may use to signal the rest of the machine.
#[derive(Debug)]
pub struct Signals<'a> {
    pub lines: &'a mut WakeupLines,
    pub scheduler: &'a mut Scheduler<DeviceEvent>,
}

/// The CPU's view of the rest of the machine for the duration of one
/// clock.
pub struct Io<'a> {
    pub peripherals: &'a mut dyn Peripherals,
    pub signals: Signals<'a>,
}

impl Debug for Io<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Io")
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

/// Status bit of KSTAT which is set while a seek strobe is in
/// progress.
pub const KSTAT_STROBE: u16 = 0o100;

/// The I/O controllers, as seen by the microcode.
///
/// Methods which may change the state of the machine get a
/// [`Signals`] so that the controller can wake tasks or schedule
/// follow-up events.
#[allow(unused_variables)]
pub trait Peripherals {
    /// Called after a hard reset of the system, with every pending
    /// event discarded.
    fn reset(&mut self, signals: &mut Signals<'_>) {}

    /// A previously scheduled event is due.
    fn on_event(&mut self, event: DeviceEvent, signals: &mut Signals<'_>) {
        event!(Level::WARN, "{event:?} fired but there is nothing to handle it");
    }

    /// `←MOUSE`.
    fn read_mouse(&mut self) -> u16 {
        0
    }

    // Diablo disk controller.

    fn kstat(&self) -> u16 {
        0
    }
    fn load_kstat(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn kdata(&mut self) -> u16 {
        0
    }
    fn load_kdata(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn kadr(&self) -> u16 {
        0
    }
    fn load_kadr(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn load_kcom(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn clear_disk_status(&mut self, signals: &mut Signals<'_>) {}
    fn increment_record(&mut self, signals: &mut Signals<'_>) {}
    fn disk_strobe(&mut self, signals: &mut Signals<'_>) {}
    /// The current record number (header, label, data) as the RECNO
    /// branch needs it.
    fn record_number(&self) -> u16 {
        0
    }
    fn data_transfer(&self) -> bool {
        false
    }
    fn fatal_disk_error(&self) -> bool {
        false
    }
    fn disk_ready(&self) -> bool {
        false
    }
    /// The word task's initialisation flag, WDINIT.
    fn word_init(&self) -> bool {
        false
    }
    fn clear_word_init(&mut self) {}
    /// The sector task has started running, so it is not late.
    fn disable_seclate(&mut self) {}

    // Display controller.

    fn load_ddr(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn display_word_block(&mut self, signals: &mut Signals<'_>) {}
    fn display_horizontal_block(&mut self, signals: &mut Signals<'_>) {}
    /// Whether the horizontal task has blocked since the start of the
    /// field.
    fn display_horizontal_blocked(&self) -> bool {
        false
    }
    fn even_field(&self) -> bool {
        false
    }
    fn set_mode(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn load_xpreg(&mut self, value: u16) {}
    fn load_csr(&mut self, value: u16) {}

    // Ethernet controller.

    /// The host address reported by RSNF.
    fn ethernet_address(&self) -> u8 {
        0
    }
    /// Read the input FIFO.  `advance` is false for a look-ahead read
    /// which leaves the word in the FIFO.
    fn read_input_fifo(&mut self, advance: bool, signals: &mut Signals<'_>) -> u16 {
        0
    }
    fn write_output_fifo(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn ethernet_status(&self) -> u16 {
        0xffff
    }
    fn reset_ethernet_interface(&mut self, signals: &mut Signals<'_>) {}
    fn countdown_wakeup(&self) -> bool {
        false
    }
    fn set_countdown_wakeup(&mut self, enabled: bool) {}
    fn start_output(&mut self, signals: &mut Signals<'_>) {}
    fn start_input(&mut self, signals: &mut Signals<'_>) {}
    fn end_transmission(&mut self, signals: &mut Signals<'_>) {}
    /// The two bits of the I/O command latched by STARTF.
    fn io_command(&self) -> u16 {
        0
    }
    fn data_late(&self) -> bool {
        false
    }
    fn operation_done(&self) -> bool {
        false
    }
    fn collision(&self) -> bool {
        false
    }
    fn input_fifo_empty(&self) -> bool {
        true
    }
    fn ethernet_startf(&mut self, code: u16, signals: &mut Signals<'_>) {}

    // Orbit rasteriser.

    fn orbit_delta_wc(&mut self) -> u16 {
        0xffff
    }
    fn orbit_dbc_width(&mut self) -> u16 {
        0xffff
    }
    fn orbit_output_data(&mut self) -> u16 {
        0xffff
    }
    fn orbit_status(&mut self) -> u16 {
        0xffff
    }
    /// The "image active, controller stopped" status bit.
    fn orbit_iacs(&self) -> bool {
        false
    }
    fn orbit_refresh_timer_expired(&self) -> bool {
        false
    }
    fn orbit_set_dbc_width(&mut self, value: u16) {}
    fn orbit_set_xy(&mut self, value: u16) {}
    fn orbit_set_height(&mut self, value: u16) {}
    fn orbit_write_font_data(&mut self, value: u16) {}
    fn orbit_write_ink_data(&mut self, value: u16) {}
    fn orbit_control(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn orbit_ros_command(&mut self, value: u16) {}
    fn orbit_stop(&mut self, signals: &mut Signals<'_>) {}
    fn orbit_startf(&mut self, signals: &mut Signals<'_>) {}

    // Trident disk controller.

    fn trident_kdta(&mut self) -> u16 {
        0xffff
    }
    fn trident_load_kdta(&mut self, value: u16) {}
    fn trident_status(&self) -> u16 {
        0xffff
    }
    fn trident_wait_for_empty(&mut self, signals: &mut Signals<'_>) {}
    fn trident_tag(&mut self, value: u16, signals: &mut Signals<'_>) {}
    fn trident_controller_reset(&mut self, signals: &mut Signals<'_>) {}
    fn trident_stop(&mut self, signals: &mut Signals<'_>) {}
    fn trident_startf(&mut self, code: u16, signals: &mut Signals<'_>) {}
}

/// A machine with no I/O controllers attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullPeripherals {
    ethernet_address: u8,
}

impl NullPeripherals {
    #[must_use]
    pub fn new(ethernet_address: u8) -> NullPeripherals {
        NullPeripherals { ethernet_address }
    }
}

impl Peripherals for NullPeripherals {
    fn ethernet_address(&self) -> u8 {
        self.ethernet_address
    }

    fn on_event(&mut self, _event: DeviceEvent, _signals: &mut Signals<'_>) {}
}

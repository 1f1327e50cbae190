//! The memory bus: the timing of memory references and the dispatch
//! of each reference to main memory or a memory-mapped device.
//!
//! A reference begins with `MAR←`, which is memory cycle 1.  The bus
//! is clocked once per microinstruction, before the CPU runs.  The
//! Alto I and Alto II differ in which cycles the data is transferred
//! on:
//!
//! | Event                 | Alto I     | Alto II          |
//! | --------------------- | ---------- | ---------------- |
//! | read of first word    | 4          | 3                |
//! | read of second word   | 5 (A OR 1) | 4 (A XOR 1)      |
//! | `←MD` allowed         | 5, 6       | 5, or when idle  |
//! | `MD←` allowed         | 5, 6       | 3, 4             |
//! | reference ends after  | 7          | 6                |
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::alarm::{Alarm, AlarmDetails, MemoryDataAccess};
use super::memory::{MainMemory, MemoryMapped, MemoryRange, RAM_TOP};

/// Which memory timing the machine has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timing {
    AltoI,
    AltoII,
}

impl Timing {
    fn of(system: SystemType) -> Timing {
        if system.is_alto_i() {
            Timing::AltoI
        } else {
            Timing::AltoII
        }
    }

    /// The cycle after which the reference is complete.
    fn last_cycle(self) -> u32 {
        match self {
            Timing::AltoI => 7,
            Timing::AltoII => 6,
        }
    }
}

/// The state of the memory reference in progress (or the last one).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Reference {
    active: bool,
    cycle: u32,
    address: u16,
    task: Option<TaskType>,
    extended: bool,
    /// Buffered read data.
    data_low: u16,
    data_high: u16,
    /// The last word stored, for debuggers.
    data_written: u16,
    /// Which word of a double-word transfer comes next.
    first_word_done: bool,
}

/// Identifies a device attached with [`MemoryBus::add_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

pub struct MemoryBus {
    timing: Timing,
    main: MainMemory,
    /// The addresses main memory decodes, including the I/O page
    /// bank registers.
    main_ranges: Vec<MemoryRange>,
    devices: Vec<Box<dyn MemoryMapped + Send>>,
    /// Which device decodes each I/O page address.
    device_map: HashMap<u16, DeviceId>,
    reference: Reference,
}

impl Debug for MemoryBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBus")
            .field("timing", &self.timing)
            .field("main", &self.main)
            .field("devices", &self.devices.len())
            .field("reference", &self.reference)
            .finish()
    }
}

impl MemoryBus {
    #[must_use]
    pub fn new(system: SystemType) -> MemoryBus {
        let main = MainMemory::new(system);
        MemoryBus {
            timing: Timing::of(system),
            main_ranges: main.ranges(),
            main,
            devices: Vec::new(),
            device_map: HashMap::new(),
            reference: Reference::default(),
        }
    }

    /// Attach a memory-mapped device.
    ///
    /// # Errors
    ///
    /// A `DeviceOverlap` alarm if the device claims an address which
    /// main memory or another device already decodes.
    pub fn add_device(&mut self, device: Box<dyn MemoryMapped + Send>) -> Result<DeviceId, Alarm> {
        let ranges = device.ranges();
        for range in ranges.iter() {
            if let Some(address) = range
                .addresses()
                .find(|a| self.device_map.contains_key(a) || self.decoded_by_main(*a))
            {
                return Err(Alarm::new(AlarmDetails::DeviceOverlap { address }));
            }
        }
        let id = DeviceId(self.devices.len());
        for range in ranges.iter() {
            self.device_map.extend(range.addresses().map(|a| (a, id)));
            event!(Level::DEBUG, "device {id:?} decodes addresses {range}");
        }
        self.devices.push(device);
        Ok(id)
    }

    /// Abandon any memory reference in progress.
    pub fn reset(&mut self) {
        self.reference = Reference::default();
    }

    #[must_use]
    pub fn main_memory(&self) -> &MainMemory {
        &self.main
    }

    pub fn main_memory_mut(&mut self) -> &mut MainMemory {
        &mut self.main
    }

    #[must_use]
    pub fn mar(&self) -> u16 {
        self.reference.address
    }

    #[must_use]
    pub fn md_low(&self) -> u16 {
        self.reference.data_low
    }

    #[must_use]
    pub fn md_high(&self) -> u16 {
        self.reference.data_high
    }

    #[must_use]
    pub fn md_written(&self) -> u16 {
        self.reference.data_written
    }

    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.reference.cycle
    }

    #[must_use]
    pub fn active(&self) -> bool {
        self.reference.active
    }

    /// Advance the memory reference in progress by one cycle.
    pub fn clock(&mut self) {
        self.reference.cycle = self.reference.cycle.saturating_add(1);
        if !self.reference.active {
            return;
        }
        let cycle = self.reference.cycle;
        let address = self.reference.address;
        match (self.timing, cycle) {
            (Timing::AltoI, 4) | (Timing::AltoII, 3) => {
                self.reference.data_low = self.read_from_bus(address);
            }
            (Timing::AltoI, 5) => {
                self.reference.data_high = self.read_from_bus(address | 1);
            }
            (Timing::AltoII, 4) => {
                self.reference.data_high = self.read_from_bus(address ^ 1);
            }
            _ => (),
        }
        if cycle == self.timing.last_cycle() {
            self.reference.active = false;
            event!(Level::TRACE, "memory reference to {address:06o} complete");
        }
    }

    /// Determine whether `op` can be performed on this cycle.  When
    /// it cannot, the CPU must wait.
    #[must_use]
    pub fn ready(&self, op: MemoryOperation) -> bool {
        if !self.reference.active {
            return true;
        }
        let cycle = self.reference.cycle;
        match op {
            MemoryOperation::None => true,
            MemoryOperation::LoadAddress => false,
            MemoryOperation::Read => cycle > 4,
            MemoryOperation::Store => match self.timing {
                Timing::AltoI => cycle > 4,
                Timing::AltoII => cycle > 2,
            },
        }
    }

    /// Begin a memory reference (`MAR←`).
    ///
    /// # Errors
    ///
    /// `MemoryBusy` if a reference is still in progress; the CPU
    /// should have waited until [`MemoryBus::ready`] allowed this.
    pub fn load_mar(&mut self, address: u16, task: TaskType, extended: bool) -> Result<(), Alarm> {
        if self.reference.active {
            return Err(Alarm::new(AlarmDetails::MemoryBusy {
                active: self.reference.address,
                requested: address,
            }));
        }
        // The buffered data survives; the Alto II returns it for ←MD
        // after the reference is over.
        self.reference = Reference {
            active: true,
            cycle: 1,
            address,
            task: Some(task),
            extended,
            first_word_done: false,
            ..self.reference.clone()
        };
        Ok(())
    }

    fn out_of_window(&self, access: MemoryDataAccess) -> Alarm {
        Alarm::new(AlarmDetails::MemoryDataOutOfWindow {
            access,
            cycle: self.reference.cycle,
        })
    }

    /// Perform `←MD`.
    ///
    /// # Errors
    ///
    /// `MemoryDataOutOfWindow` if no data can be read on this cycle.
    pub fn read_md(&mut self) -> Result<u16, Alarm> {
        let r = &mut self.reference;
        match (self.timing, r.active, r.cycle) {
            // The Alto I does not latch the data, so what we read is
            // undefined.
            (Timing::AltoI, false, _) => Ok(0xffff),
            (Timing::AltoI, true, 5) => Ok(r.data_low),
            (Timing::AltoI, true, 6) => Ok(r.data_high),
            // The Alto II latches the data, so ←MD works any time
            // after cycle 5 of a reference.  The second ←MD of a
            // double-word reference may be late (the Orbit microcode
            // does this).  A ←MD on cycle 5 can also fetch the second
            // word of a reference whose first word was stored on
            // cycle 3 (the Ethernet microcode does this).
            (Timing::AltoII, false, _) | (Timing::AltoII, true, 5) => {
                let data = if r.first_word_done {
                    r.data_high
                } else {
                    r.data_low
                };
                r.first_word_done = !r.first_word_done;
                Ok(data)
            }
            _ => Err(self.out_of_window(MemoryDataAccess::Read)),
        }
    }

    /// Perform `MD←`.
    ///
    /// # Errors
    ///
    /// `MemoryDataOutOfWindow` if the memory cannot accept data on
    /// this cycle.
    pub fn load_md(&mut self, data: u16) -> Result<(), Alarm> {
        if !self.reference.active {
            // Smalltalk-80 does this when run with too little control
            // RAM; it must not stop the emulator.
            event!(
                Level::WARN,
                "MD← while no memory reference is active (cycle {})",
                self.reference.cycle
            );
            return Ok(());
        }
        let address = self.reference.address;
        let first_word_done = self.reference.first_word_done;
        let target = match (self.timing, self.reference.cycle) {
            (Timing::AltoI, 5) | (Timing::AltoII, 3) => address,
            (Timing::AltoI, 6) if first_word_done => address | 1,
            (Timing::AltoII, 4) if first_word_done => address ^ 1,
            (Timing::AltoII, 4) => address,
            (Timing::AltoII, 5) => {
                // MADTEST does this, and does not care what happens.
                event!(Level::WARN, "MD← on memory cycle 5 ignored");
                return Ok(());
            }
            _ => return Err(self.out_of_window(MemoryDataAccess::Store)),
        };
        self.reference.data_written = data;
        self.write_to_bus(target, data);
        self.reference.first_word_done = !first_word_done;
        Ok(())
    }

    fn decoded_by_main(&self, address: u16) -> bool {
        self.main_ranges.iter().any(|r| r.contains(address))
    }

    fn reference_context(&self) -> (TaskType, bool) {
        (
            self.reference.task.unwrap_or(TaskType::Emulator),
            self.reference.extended,
        )
    }

    fn read_from_bus(&mut self, address: u16) -> u16 {
        let (task, extended) = self.reference_context();
        self.read_word(address, task, extended)
    }

    fn write_to_bus(&mut self, address: u16, data: u16) {
        let (task, extended) = self.reference_context();
        if address <= RAM_TOP {
            self.main.load(address, data, task, extended);
        } else if let Some(DeviceId(n)) = self.device_map.get(&address) {
            self.devices[*n].load(address, data, task, extended);
        } else if self.decoded_by_main(address) {
            self.main.load(address, data, task, extended);
        }
    }

    /// Read a word as `task` would, outside the timing of a memory
    /// reference.  Unclaimed addresses read as zero.
    pub fn read_word(&mut self, address: u16, task: TaskType, extended: bool) -> u16 {
        if address <= RAM_TOP {
            self.main.read(address, task, extended)
        } else if let Some(DeviceId(n)) = self.device_map.get(&address) {
            self.devices[*n].read(address, task, extended)
        } else if self.decoded_by_main(address) {
            self.main.read(address, task, extended)
        } else {
            0
        }
    }
}

//! Main memory, and the interface of devices which appear in the
//! memory address space.
//!
//! The Alto II XM has four banks of 64K words.  Each task has a bank
//! register which selects the bank used for its normal references
//! and the bank used for its extended (XMAR) references.  The Alto I
//! only ever uses bank 0.
use std::fmt::{self, Debug, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

/// Highest address of main memory in each bank; the I/O page lies
/// above it.
pub const RAM_TOP: u16 = 0o176777;

/// Address of the bank register of task 0.
pub const XM_BANK_REGISTERS: u16 = 0o177740;

pub const BANK_COUNT: usize = 4;
const BANK_WORDS: usize = 0x10000;

/// An inclusive range of memory addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u16,
    pub end: u16,
}

impl MemoryRange {
    /// # Panics
    ///
    /// Panics if `end` is below `start`, which is a programming error
    /// in the device declaring the range.
    #[must_use]
    pub const fn new(start: u16, end: u16) -> MemoryRange {
        assert!(end >= start, "memory range ends before it starts");
        MemoryRange { start, end }
    }

    #[must_use]
    pub const fn contains(&self, address: u16) -> bool {
        address >= self.start && address <= self.end
    }

    #[must_use]
    pub const fn overlaps(&self, other: &MemoryRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn addresses(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

impl Display for MemoryRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:06o}-{:06o}", self.start, self.end)
    }
}

/// A device which responds to memory references.
pub trait MemoryMapped {
    fn read(&mut self, address: u16, task: TaskType, extended: bool) -> u16;
    fn load(&mut self, address: u16, data: u16, task: TaskType, extended: bool);
    /// The addresses which this device decodes.
    fn ranges(&self) -> Vec<MemoryRange>;
}

/// One task's bank register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BankRegister {
    value: u16,
}

impl BankRegister {
    fn normal(self) -> usize {
        usize::from((self.value & 0xc) >> 2)
    }

    fn alternate(self) -> usize {
        usize::from(self.value & 0x3)
    }
}

pub struct MainMemory {
    system: SystemType,
    words: Vec<u16>,
    banks: [BankRegister; TaskType::SLOTS],
}

impl Debug for MainMemory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainMemory")
            .field("system", &self.system)
            .field("banks", &self.banks)
            .finish_non_exhaustive()
    }
}

impl MainMemory {
    #[must_use]
    pub fn new(system: SystemType) -> MainMemory {
        MainMemory {
            system,
            // All four banks exist even on an Alto I, which just
            // never selects the others.
            words: vec![0; BANK_COUNT * BANK_WORDS],
            banks: [BankRegister::default(); TaskType::SLOTS],
        }
    }

    /// Clear all of memory and the bank registers.
    pub fn reset(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.soft_reset();
    }

    /// Clear the bank registers only.
    pub fn soft_reset(&mut self) {
        self.banks = [BankRegister::default(); TaskType::SLOTS];
    }

    fn bank_register_slot(address: u16) -> Option<usize> {
        address
            .checked_sub(XM_BANK_REGISTERS)
            .map(usize::from)
            .filter(|slot| *slot < TaskType::SLOTS)
    }

    fn bank(&self, task: TaskType, extended: bool) -> usize {
        let register = self.banks[task.index()];
        if extended {
            register.alternate()
        } else {
            register.normal()
        }
    }

    /// Read a word in the bank of `task` without going through the
    /// memory bus.  For debuggers.
    #[must_use]
    pub fn peek(&self, address: u16, task: TaskType) -> u16 {
        self.words[usize::from(address) + BANK_WORDS * self.bank(task, false)]
    }

    /// Write a word into bank `bank` without going through the memory
    /// bus.  Used for loading programs.
    pub fn poke(&mut self, bank: usize, address: u16, data: u16) {
        if let Some(w) = self.words.get_mut(usize::from(address) + BANK_WORDS * bank) {
            *w = data;
        }
    }
}

impl MemoryMapped for MainMemory {
    fn read(&mut self, address: u16, task: TaskType, extended: bool) -> u16 {
        match MainMemory::bank_register_slot(address) {
            // Some software (IFS for example) relies on the top 12
            // bits reading as ones.
            Some(slot) => 0xfff0 | self.banks[slot].value,
            None => self.words[usize::from(address) + BANK_WORDS * self.bank(task, extended)],
        }
    }

    fn load(&mut self, address: u16, data: u16, task: TaskType, extended: bool) {
        match MainMemory::bank_register_slot(address) {
            Some(slot) => {
                let register = BankRegister { value: data };
                self.banks[slot] = register;
                event!(
                    Level::DEBUG,
                    "XM bank register {slot:o}: normal bank {}, alternate bank {}",
                    register.normal(),
                    register.alternate()
                );
            }
            None => {
                let bank = self.bank(task, extended);
                self.words[usize::from(address) + BANK_WORDS * bank] = data;
            }
        }
    }

    fn ranges(&self) -> Vec<MemoryRange> {
        let mut result = vec![MemoryRange::new(0, RAM_TOP)];
        if !self.system.is_alto_i() {
            result.push(MemoryRange::new(
                XM_BANK_REGISTERS,
                XM_BANK_REGISTERS + TaskType::SLOTS as u16 - 1,
            ));
        }
        result
    }
}

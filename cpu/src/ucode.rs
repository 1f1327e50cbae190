//! The control store: microcode ROM, microcode RAM, and the bank
//! selection of each task.
//!
//! Every control-store word is decoded once, when it is loaded or
//! written; instruction fetch just indexes the decoded copies.
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::alarm::{Alarm, AlarmDetails};
use super::rom::{self, ControlRom, RomSource, ACSOURCE_ROM_SIZE, MICROCODE_ROM_SIZE};

/// Words per bank of microcode.
pub const BANK_SIZE: usize = 1024;

/// The largest control RAM (3K) has this many banks.
pub const RAM_BANKS: usize = 3;

/// The XOR applied to control RAM words.  Some of the control lines
/// of the RAM are inverted with respect to the ROM.
const RAM_INVERTED_BITS: u32 = 0x0008_8400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MicrocodeBank {
    #[default]
    ROM0 = 0,
    ROM1 = 1,
    RAM0 = 2,
    RAM1 = 3,
    RAM2 = 4,
}

impl MicrocodeBank {
    /// Offset of this bank within the decoded-instruction arena.
    const fn base(self) -> usize {
        self as usize * BANK_SIZE
    }
}

impl Display for MicrocodeBank {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MicrocodeBank::ROM0 => "ROM0",
            MicrocodeBank::ROM1 => "ROM1",
            MicrocodeBank::RAM0 => "RAM0",
            MicrocodeBank::RAM1 => "RAM1",
            MicrocodeBank::RAM2 => "RAM2",
        })
    }
}

const fn map_ram_word(word: u32) -> u32 {
    word ^ RAM_INVERTED_BITS
}

/// The control-RAM address register, loaded from T by RDRAM and
/// WRTRAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ControlRamAddress {
    /// The address refers to RAM (otherwise, to ROM).
    ram_select: bool,
    low_half: bool,
    address: usize,
    bank: usize,
}

impl Default for ControlRamAddress {
    fn default() -> ControlRamAddress {
        ControlRamAddress {
            ram_select: true,
            low_half: true,
            address: 0,
            bank: 0,
        }
    }
}

impl ControlRamAddress {
    fn cell(&self) -> usize {
        self.address + self.bank * BANK_SIZE
    }
}

#[derive(Debug)]
pub struct ControlStore {
    system: SystemType,
    control: ControlRom,
    /// Logical ROM words.
    rom: Vec<u32>,
    /// RAM words as stored (that is, with some bits inverted).
    ram: Vec<u32>,
    /// Decoded copies of ROM0, ROM1, RAM0, RAM1, RAM2 in that order.
    decoded: Vec<MicroInstruction>,
    bank: [MicrocodeBank; TaskType::SLOTS],
    ram_address: ControlRamAddress,
}

impl ControlStore {
    /// Load the ROMs for `system` from `source`.
    ///
    /// # Errors
    ///
    /// A `RomLoad` alarm if any image is missing or malformed.
    pub fn load(source: &dyn RomSource, system: SystemType) -> Result<ControlStore, Alarm> {
        let rom = rom::load_microcode(source, system)?;
        let control = ControlRom::load(source, system)?;
        ControlStore::with_contents(system, rom, control)
    }

    /// Build a control store from already-loaded ROM contents.
    ///
    /// # Errors
    ///
    /// A `Bug` alarm if `rom` is larger than the ROM banks.
    pub fn with_contents(
        system: SystemType,
        rom: Vec<u32>,
        control: ControlRom,
    ) -> Result<ControlStore, Alarm> {
        if rom.len() > MICROCODE_ROM_SIZE {
            return Err(Alarm::bug(format!(
                "microcode ROM has {} words but there is only room for {MICROCODE_ROM_SIZE}",
                rom.len()
            )));
        }
        let mut store = ControlStore {
            system,
            control,
            rom,
            ram: vec![0; RAM_BANKS * BANK_SIZE],
            decoded: Vec::with_capacity(MicrocodeBank::RAM2.base() + BANK_SIZE),
            bank: [MicrocodeBank::ROM0; TaskType::SLOTS],
            ram_address: ControlRamAddress::default(),
        };
        store.reset();
        Ok(store)
    }

    /// Clear the control RAM and select ROM0 for every task.
    pub fn reset(&mut self) {
        self.ram.iter_mut().for_each(|w| *w = 0);
        // Unpopulated ROM words behave as if all their bits read as
        // zero in the chips.
        let empty_rom = MicroInstruction::decode(rom::map_rom_word(0), &self.control.constants);
        self.decoded.clear();
        self.decoded.extend(
            (0..MICROCODE_ROM_SIZE).map(|i| match self.rom.get(i) {
                Some(word) => MicroInstruction::decode(*word, &self.control.constants),
                None => empty_rom,
            }),
        );
        // The cache holds the decode of each word as the RAM chips
        // store it, just as WRTRAM leaves it.
        let constants = &self.control.constants;
        self.decoded.extend(
            self.ram
                .iter()
                .map(|word| MicroInstruction::decode(*word, constants)),
        );
        self.bank = [MicrocodeBank::ROM0; TaskType::SLOTS];
        self.ram_address = ControlRamAddress::default();
    }

    #[must_use]
    pub fn system_type(&self) -> SystemType {
        self.system
    }

    /// The decoded instruction at `address` in the bank which `task`
    /// has selected.
    #[must_use]
    pub fn instruction(&self, address: u16, task: TaskType) -> &MicroInstruction {
        let address = usize::from(address & NEXT_MASK);
        &self.decoded[self.bank[task.index()].base() + address]
    }

    #[must_use]
    pub fn bank(&self, task: TaskType) -> MicrocodeBank {
        self.bank[task.index()]
    }

    /// Select the bank of every task from the reset mode register:
    /// a 0 bit means the task starts in RAM.
    pub fn load_banks_from_rmr(&mut self, rmr: u16) {
        for (i, bank) in self.bank.iter_mut().enumerate() {
            *bank = if rmr & (1 << i) == 0 {
                MicrocodeBank::RAM0
            } else {
                MicrocodeBank::ROM0
            };
        }
    }

    /// Perform SWMODE for `task`: choose its next bank from its
    /// current one and from bits of the NEXT field of the
    /// instruction doing the switch.
    pub fn switch_mode(&mut self, next: u16, task: TaskType) {
        use MicrocodeBank::*;
        let current = self.bank[task.index()];
        let bit_400 = next & 0x100 != 0;
        let bit_200 = next & 0x80 != 0;
        let new_bank = match self.system {
            SystemType::AltoI | SystemType::OneKRom => match current {
                ROM0 => RAM0,
                _ => ROM0,
            },
            SystemType::TwoKRom => match (current, bit_400) {
                (ROM0, false) | (ROM1, true) => RAM0,
                (ROM0, true) | (RAM0, true) => ROM1,
                (ROM1, false) | (RAM0, false) => ROM0,
                // Banks which this machine does not have.
                (RAM1 | RAM2, _) => current,
            },
            SystemType::ThreeKRam => match (current, bit_400, bit_200) {
                (ROM0, false, false) => RAM0,
                (ROM0, false, true) => RAM2,
                (RAM0 | RAM1, false, false) => ROM0,
                (RAM0 | RAM1, false, true) => RAM2,
                (RAM2, false, false) => ROM0,
                (RAM2, false, true) => RAM1,
                (ROM0, true, false) => RAM1,
                (ROM0, true, true) => RAM0,
                (RAM0, true, _) => RAM1,
                (RAM1 | RAM2, true, _) => RAM0,
                (ROM1, _, _) => current,
            },
        };
        event!(
            Level::DEBUG,
            "SWMODE: task {} switches from {} to {}",
            task,
            current,
            new_bank
        );
        self.bank[task.index()] = new_bank;
    }

    /// Latch the control-RAM address used by RDRAM and WRTRAM.
    pub fn load_control_ram_address(&mut self, address: u16) {
        self.ram_address = ControlRamAddress {
            ram_select: address & 0x0800 == 0,
            low_half: address & 0x0400 == 0,
            address: usize::from(address & 0x3ff),
            bank: if self.system == SystemType::ThreeKRam {
                usize::from((address & 0x3000) >> 12)
            } else {
                0
            },
        };
    }

    /// Read the selected half of the addressed control RAM word.
    ///
    /// # Errors
    ///
    /// Reading the ROM this way is not emulated; it raises an
    /// `Unimplemented` alarm.
    pub fn read_ram(&self) -> Result<u16, Alarm> {
        let a = self.ram_address;
        if !a.ram_select {
            return Err(Alarm::new(AlarmDetails::Unimplemented {
                explanation: "reading microcode ROM with RDRAM".to_string(),
            }));
        }
        let word = self
            .ram
            .get(a.cell())
            .copied()
            .map(map_ram_word)
            .ok_or_else(|| Alarm::bug(format!("control RAM cell {} does not exist", a.cell())))?;
        let half = if a.low_half {
            low_half(word)
        } else {
            high_half(word)
        };
        event!(
            Level::TRACE,
            "RDRAM bank {} address {:o} {} half: {:06o}",
            a.bank,
            a.address,
            if a.low_half { "low" } else { "high" },
            half
        );
        Ok(half)
    }

    /// Write a whole word of control RAM and redecode it.  When the
    /// address selects ROM, this does nothing.
    pub fn write_ram(&mut self, low: u16, high: u16) {
        let a = self.ram_address;
        if !a.ram_select {
            return;
        }
        let cell = a.cell();
        let stored = map_ram_word(join_halves(high, low));
        if let Some(w) = self.ram.get_mut(cell) {
            *w = stored;
            self.decoded[MicrocodeBank::RAM0.base() + cell] =
                MicroInstruction::decode(stored, &self.control.constants);
            event!(
                Level::TRACE,
                "WRTRAM bank {} address {:o}: {:06o} {:06o}",
                a.bank,
                a.address,
                high,
                low
            );
        }
    }

    /// The constant ROM, as it appears on the bus.
    #[must_use]
    pub fn constants(&self) -> &[u16; CONSTANT_ROM_SIZE] {
        &self.control.constants
    }

    #[must_use]
    pub fn acsource(&self) -> &[u8; ACSOURCE_ROM_SIZE] {
        &self.control.acsource
    }

    /// Logical microcode ROM words.
    #[must_use]
    pub fn rom_words(&self) -> &[u32] {
        &self.rom
    }

    /// Control RAM words as the RAM chips store them.
    #[must_use]
    pub fn ram_words(&self) -> &[u32] {
        &self.ram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(system: SystemType) -> ControlStore {
        let rom: Vec<u32> = (0..2048u16).map(|i| micro!(next: i ^ 1)).collect();
        ControlStore::with_contents(system, rom, ControlRom::default())
            .expect("ROM fits")
    }

    #[test]
    fn test_reset_selects_rom0() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_banks_from_rmr(0);
        assert_eq!(cs.bank(TaskType::Cursor), MicrocodeBank::RAM0);
        cs.reset();
        for task in TaskType::ALL {
            assert_eq!(cs.bank(task), MicrocodeBank::ROM0);
        }
        assert_eq!(cs.instruction(5, TaskType::Emulator).next, 4);
    }

    #[test]
    fn test_load_banks_from_rmr() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_banks_from_rmr(!(1 << TaskType::DisplayWord.number()));
        assert_eq!(cs.bank(TaskType::DisplayWord), MicrocodeBank::RAM0);
        assert_eq!(cs.bank(TaskType::Emulator), MicrocodeBank::ROM0);
        cs.load_banks_from_rmr(0xffff);
        assert!(TaskType::ALL
            .iter()
            .all(|t| cs.bank(*t) == MicrocodeBank::ROM0));
    }

    #[test]
    fn test_switch_mode_one_k() {
        let mut cs = store(SystemType::OneKRom);
        cs.switch_mode(0, TaskType::Emulator);
        assert_eq!(cs.bank(TaskType::Emulator), MicrocodeBank::RAM0);
        cs.switch_mode(0x100, TaskType::Emulator);
        assert_eq!(cs.bank(TaskType::Emulator), MicrocodeBank::ROM0);
    }

    #[test]
    fn test_switch_mode_two_k() {
        let mut cs = store(SystemType::TwoKRom);
        let t = TaskType::Emulator;
        cs.switch_mode(0x100, t);
        assert_eq!(cs.bank(t), MicrocodeBank::ROM1);
        cs.switch_mode(0x100, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM0);
        cs.switch_mode(0x100, t);
        assert_eq!(cs.bank(t), MicrocodeBank::ROM1);
        cs.switch_mode(0, t);
        assert_eq!(cs.bank(t), MicrocodeBank::ROM0);
        cs.switch_mode(0, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM0);
        cs.switch_mode(0, t);
        assert_eq!(cs.bank(t), MicrocodeBank::ROM0);
        assert_eq!(cs.instruction(0o1003, t).next, 0o1002);
    }

    #[test]
    fn test_switch_mode_three_k() {
        let mut cs = store(SystemType::ThreeKRam);
        let t = TaskType::Emulator;
        cs.switch_mode(0x80, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM2);
        cs.switch_mode(0x80, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM1);
        cs.switch_mode(0x100, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM0);
        cs.switch_mode(0x100, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM1);
        cs.switch_mode(0, t);
        assert_eq!(cs.bank(t), MicrocodeBank::ROM0);
        cs.switch_mode(0x180, t);
        assert_eq!(cs.bank(t), MicrocodeBank::RAM0);
    }

    #[test]
    fn test_control_ram_round_trip() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_control_ram_address(0o123);
        cs.write_ram(0o1234, 0o4321);
        assert_eq!(cs.read_ram(), Ok(0o1234));
        cs.load_control_ram_address(0o123 | 0x400);
        assert_eq!(cs.read_ram(), Ok(0o4321));
        // The stored form has the inverted lines flipped.
        assert_eq!(cs.ram_words()[0o123], join_halves(0o4321, 0o1234) ^ RAM_INVERTED_BITS);
    }

    #[test]
    fn test_write_ram_redecodes() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_banks_from_rmr(0);
        let word = micro!(rselect: 7, next: 0o321);
        cs.load_control_ram_address(0o17);
        cs.write_ram(low_half(word), high_half(word));
        let i = cs.instruction(0o17, TaskType::Emulator);
        assert_eq!(i.word, word ^ RAM_INVERTED_BITS);
        assert_eq!(i.rselect, 7);
        assert_eq!(i.next, 0o321);
    }

    fn assert_ram_decodes_match_stored_words(cs: &ControlStore) {
        for (cell, word) in cs.ram_words().iter().enumerate().take(BANK_SIZE) {
            let address = u16::try_from(cell).expect("a bank is 1K words");
            assert_eq!(
                *cs.instruction(address, TaskType::Cursor),
                MicroInstruction::decode(*word, cs.constants()),
                "RAM0 address {address:o}"
            );
        }
    }

    #[test]
    fn test_unwritten_ram_decodes_as_stored() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_banks_from_rmr(0);
        assert_eq!(cs.bank(TaskType::Cursor), MicrocodeBank::RAM0);
        assert_ram_decodes_match_stored_words(&cs);
        // An empty cell does nothing but go to address 0.
        let empty = cs.instruction(0o400, TaskType::Cursor);
        assert_eq!(empty.f1, SpecialFunction1::None);
        assert_eq!(empty.f2, SpecialFunction2::None);
        assert!(!empty.load_l);
        assert_eq!(empty.next, 0);

        cs.load_control_ram_address(0o17);
        cs.write_ram(0o1234, 0o4321);
        assert_ram_decodes_match_stored_words(&cs);

        cs.reset();
        cs.load_banks_from_rmr(0);
        assert_ram_decodes_match_stored_words(&cs);
    }

    #[test]
    fn test_ram_bank_only_on_three_k() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_control_ram_address(0x2005);
        cs.write_ram(1, 2);
        assert_eq!(cs.ram_words()[5], join_halves(2, 1) ^ RAM_INVERTED_BITS);

        let mut cs = store(SystemType::ThreeKRam);
        cs.load_control_ram_address(0x2005);
        cs.write_ram(1, 2);
        assert_eq!(cs.ram_words()[2 * BANK_SIZE + 5], join_halves(2, 1) ^ RAM_INVERTED_BITS);
        assert_eq!(cs.ram_words()[5], 0);
    }

    #[test]
    fn test_rom_select() {
        let mut cs = store(SystemType::TwoKRom);
        cs.load_control_ram_address(0x800 | 3);
        cs.write_ram(0xffff, 0xffff);
        assert!(cs.ram_words().iter().all(|w| *w == 0));
        let alarm = cs.read_ram().expect_err("ROM reads are not emulated");
        assert_eq!(alarm.kind(), crate::alarm::AlarmKind::UnknownFunction);
    }
}

//! Loading of the ROM images dumped from real Alto hardware.
//!
//! Each image file holds one 4-bit nybble per byte, and supplies that
//! nybble for some bit position of a range of ROM words.  The address
//! and data lines of the ROM chips are wired in no sane order, so the
//! loaders undo that wiring.  The Alto I and Alto II have different
//! image sets.
//!
//! The images are found through a [`RomSource`], so that tests (and
//! tools) can supply them from memory.
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{event, Level};

use base::prelude::*;
use base::subword::{permute_bits, reverse_low_bits};

use super::alarm::{Alarm, AlarmDetails, RomProblem};

/// Number of words in the microcode ROM of an Alto II (two 1K
/// banks).  The Alto I has only the first 1K.
pub const MICROCODE_ROM_SIZE: usize = 2048;

/// Number of entries in the ACSOURCE ROM.
pub const ACSOURCE_ROM_SIZE: usize = 256;

/// The microcode word bits which are stored inverted in the ROMs.
/// The high bits of F1 and F2, and the LoadL bit, are not inverted.
const INVERTED_BITS: u32 = 0xfff7_7bff;

/// Something which can supply the contents of ROM image files.
///
/// Names are paths relative to the ROM directory, with `/` as the
/// separator (for example `AltoII/U55`).
pub trait RomSource {
    /// Fetch the image called `name`.
    ///
    /// # Errors
    ///
    /// `RomProblem::Unreadable` if the image cannot be obtained.
    fn read_image(&self, name: &str) -> Result<Vec<u8>, RomProblem>;
}

/// ROM images stored as files under a directory.
#[derive(Clone)]
pub struct RomDirectory {
    root: PathBuf,
}

impl RomDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> RomDirectory {
        RomDirectory {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl Debug for RomDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RomDirectory({})", self.root.display())
    }
}

impl RomSource for RomDirectory {
    fn read_image(&self, name: &str) -> Result<Vec<u8>, RomProblem> {
        let path = name
            .split('/')
            .fold(self.root.clone(), |path, component| path.join(component));
        fs::read(&path).map_err(|e| RomProblem::Unreadable(format!("{}: {e}", path.display())))
    }
}

/// In-memory images, keyed by name.
impl RomSource for BTreeMap<String, Vec<u8>> {
    fn read_image(&self, name: &str) -> Result<Vec<u8>, RomProblem> {
        self.get(name)
            .cloned()
            .ok_or_else(|| RomProblem::Unreadable("no such image".to_string()))
    }
}

/// One image file and where its nybbles go.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RomFile {
    name: String,
    start: usize,
    bit_position: u32,
}

impl RomFile {
    fn new(name: String, start: usize, bit_position: u32) -> RomFile {
        RomFile {
            name,
            start,
            bit_position,
        }
    }
}

const ALTO_II_MICROCODE_CHIPS: [[&str; 8]; 2] = [
    // First K, the standard microcode.
    ["U55", "U64", "U65", "U63", "U53", "U60", "U61", "U62"],
    // Second K (Mesa).
    ["U54", "U74", "U75", "U73", "U52", "U70", "U71", "U72"],
];

fn alto_i_path(name: &str) -> String {
    format!("AltoI/{name}")
}

fn alto_ii_path(name: &str) -> String {
    format!("AltoII/{name}")
}

/// The ACSOURCE ROM image is the same for both machines.
const ACSOURCE_IMAGE: &str = "ACSOURCE.NEW";

fn microcode_files(system: SystemType) -> Vec<RomFile> {
    if system.is_alto_i() {
        // Four 256-word ROM sets, each of eight chips.
        (0..4usize)
            .flat_map(|x| {
                (0..8u32).map(move |y| {
                    RomFile::new(alto_i_path(&format!("{x}{y}_23.BIN")), x * 0x100, 28 - 4 * y)
                })
            })
            .collect()
    } else {
        ALTO_II_MICROCODE_CHIPS
            .iter()
            .enumerate()
            .flat_map(|(k, chips)| {
                chips.iter().zip((0..8u32).rev()).map(move |(chip, nybble)| {
                    RomFile::new(alto_ii_path(chip), k * 0x400, nybble * 4)
                })
            })
            .collect()
    }
}

fn constant_files(system: SystemType) -> Vec<RomFile> {
    (0..4u32)
        .map(|n| {
            let name = if system.is_alto_i() {
                alto_i_path(&format!("C{n}_23.BIN"))
            } else {
                alto_ii_path(&format!("C{n}"))
            };
            RomFile::new(name, 0, 12 - 4 * n)
        })
        .collect()
}

/// Size in bytes of each microcode image file.
fn microcode_file_size(system: SystemType) -> usize {
    if system.is_alto_i() {
        256
    } else {
        1024
    }
}

/// Undo the address wiring of the microcode ROM chips.
fn microcode_address_map(address: usize, file_size: usize) -> usize {
    !address & (file_size - 1)
}

/// Undo the address wiring of the constant ROM.
fn constant_address_map(address: usize) -> usize {
    const MAPPING: [u32; 8] = [7, 2, 1, 0, 3, 4, 5, 6];
    permute_bits(address as u32, &MAPPING) as usize
}

fn nybble_reverse(data: u8) -> u8 {
    reverse_low_bits(u32::from(data), 4) as u8
}

/// Undo the address wiring of the ACSOURCE ROM: reverse the 8
/// address bits, then invert them.
fn acsource_address_map(address: usize) -> usize {
    !(reverse_low_bits(address as u32, 8) as usize) & 0xff
}

/// Converts a microcode word between its ROM form and its logical
/// form; the conversion is its own inverse.
#[must_use]
pub const fn map_rom_word(word: u32) -> u32 {
    word ^ INVERTED_BITS
}

fn read_sized(source: &dyn RomSource, name: &str, expected: usize) -> Result<Vec<u8>, Alarm> {
    let data = source.read_image(name).map_err(|problem| {
        Alarm::new(AlarmDetails::RomLoad {
            file: name.to_string(),
            problem,
        })
    })?;
    if data.len() == expected {
        Ok(data)
    } else {
        Err(Alarm::new(AlarmDetails::RomLoad {
            file: name.to_string(),
            problem: RomProblem::WrongSize {
                expected,
                actual: data.len(),
            },
        }))
    }
}

/// Load the microcode ROM for `system`.  The result holds logical
/// microcode words (that is, the inverted bits have been restored).
/// For the Alto I only the first 1024 words are present.
///
/// # Errors
///
/// A `RomLoad` alarm if an image is missing or has the wrong size.
pub fn load_microcode(source: &dyn RomSource, system: SystemType) -> Result<Vec<u32>, Alarm> {
    let file_size = microcode_file_size(system);
    let words = if system.is_alto_i() {
        1024
    } else {
        MICROCODE_ROM_SIZE
    };
    let mut rom = vec![0u32; words];
    for file in microcode_files(system) {
        let data = read_sized(source, &file.name, file_size)?;
        for (i, word) in rom[file.start..file.start + file_size].iter_mut().enumerate() {
            let nybble = u32::from(data[microcode_address_map(i, file_size)] & 0xf);
            *word |= nybble << file.bit_position;
        }
    }
    for word in rom.iter_mut() {
        *word = map_rom_word(*word);
    }
    event!(
        Level::INFO,
        "loaded {} words of {} microcode ROM",
        rom.len(),
        system
    );
    Ok(rom)
}

/// The constant ROM and the ACSOURCE ROM, which the emulator uses
/// for instruction dispatch.
#[derive(Clone, PartialEq, Eq)]
pub struct ControlRom {
    pub constants: [u16; CONSTANT_ROM_SIZE],
    /// Each entry is a 4-bit dispatch value.
    pub acsource: [u8; ACSOURCE_ROM_SIZE],
}

impl Debug for ControlRom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRom")
            .field("constants[0..8]", &&self.constants[0..8])
            .finish_non_exhaustive()
    }
}

impl Default for ControlRom {
    fn default() -> ControlRom {
        ControlRom {
            constants: [0; CONSTANT_ROM_SIZE],
            acsource: [0; ACSOURCE_ROM_SIZE],
        }
    }
}

impl ControlRom {
    /// Load the constant and ACSOURCE ROMs for `system`.
    ///
    /// # Errors
    ///
    /// A `RomLoad` alarm if an image is missing or has the wrong size.
    pub fn load(source: &dyn RomSource, system: SystemType) -> Result<ControlRom, Alarm> {
        let mut result = ControlRom::default();
        // The Alto I constant ROMs hold their data complemented.
        let flip = system.is_alto_i();
        for file in constant_files(system) {
            let data = read_sized(source, &file.name, CONSTANT_ROM_SIZE)?;
            for (i, word) in result.constants.iter_mut().enumerate() {
                let mut raw = data[constant_address_map(i)];
                if flip {
                    raw = !raw;
                }
                let nybble = nybble_reverse(raw & 0xf);
                *word |= u16::from(nybble) << file.bit_position;
            }
        }
        for word in result.constants.iter_mut() {
            *word = !*word;
        }

        let data = read_sized(source, ACSOURCE_IMAGE, ACSOURCE_ROM_SIZE)?;
        for (i, entry) in result.acsource.iter_mut().enumerate() {
            *entry = !nybble_reverse(data[acsource_address_map(i)] & 0xf) & 0xf;
        }
        event!(Level::INFO, "loaded constant and ACSOURCE ROMs for {}", system);
        Ok(result)
    }
}

/// Produce the set of image files which would load as `microcode`
/// and `control`.  This is the inverse of the loaders above, and is
/// used to build test images without real ROM dumps.
///
/// `microcode` holds logical words; missing words are zero.
#[must_use]
pub fn build_images(
    system: SystemType,
    microcode: &[u32],
    control: &ControlRom,
) -> BTreeMap<String, Vec<u8>> {
    let mut images = BTreeMap::new();
    let file_size = microcode_file_size(system);
    for file in microcode_files(system) {
        let mut data = vec![0u8; file_size];
        for i in 0..file_size {
            let word = map_rom_word(microcode.get(file.start + i).copied().unwrap_or(0));
            data[microcode_address_map(i, file_size)] = ((word >> file.bit_position) & 0xf) as u8;
        }
        images.insert(file.name, data);
    }

    let flip = system.is_alto_i();
    for file in constant_files(system) {
        let mut data = vec![0u8; CONSTANT_ROM_SIZE];
        for (i, word) in control.constants.iter().enumerate() {
            let nybble = nybble_reverse(((!*word >> file.bit_position) & 0xf) as u8);
            data[constant_address_map(i)] = if flip { !nybble & 0xf } else { nybble };
        }
        images.insert(file.name, data);
    }

    let mut data = vec![0u8; ACSOURCE_ROM_SIZE];
    for (i, entry) in control.acsource.iter().enumerate() {
        data[acsource_address_map(i)] = nybble_reverse(!*entry & 0xf);
    }
    images.insert(ACSOURCE_IMAGE.to_string(), data);
    images
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmKind;

    fn sample_control_rom() -> ControlRom {
        let mut control = ControlRom::default();
        for (i, w) in control.constants.iter_mut().enumerate() {
            *w = (i as u16).wrapping_mul(0o1473).rotate_left(3);
        }
        for (i, a) in control.acsource.iter_mut().enumerate() {
            *a = (i % 16) as u8;
        }
        control
    }

    #[test]
    fn test_address_maps_are_permutations() {
        let mut seen = [false; 256];
        for i in 0..256 {
            seen[constant_address_map(i)] = true;
        }
        assert!(seen.iter().all(|&s| s));
        let mut seen = [false; 256];
        for i in 0..256 {
            seen[acsource_address_map(i)] = true;
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(acsource_address_map(0), 0xff);
        assert_eq!(acsource_address_map(1), 0x7f);
    }

    #[test]
    fn test_file_tables() {
        let files = microcode_files(SystemType::TwoKRom);
        assert_eq!(files.len(), 16);
        assert_eq!(files[0], RomFile::new("AltoII/U55".to_string(), 0, 28));
        assert_eq!(files[7], RomFile::new("AltoII/U62".to_string(), 0, 0));
        assert_eq!(files[9], RomFile::new("AltoII/U74".to_string(), 0x400, 24));
        let files = microcode_files(SystemType::AltoI);
        assert_eq!(files.len(), 32);
        assert_eq!(files[0], RomFile::new("AltoI/00_23.BIN".to_string(), 0, 28));
        assert_eq!(
            files[31],
            RomFile::new("AltoI/37_23.BIN".to_string(), 0x300, 0)
        );
        let files = constant_files(SystemType::AltoI);
        assert_eq!(files[1], RomFile::new("AltoI/C1_23.BIN".to_string(), 0, 8));
    }

    #[test]
    fn test_single_nybble_placement() {
        // A single U55 byte supplies bits 31-28 of one word; the byte
        // for word 0 is the last one in the file.
        let mut images = build_images(SystemType::TwoKRom, &[], &ControlRom::default());
        for (name, data) in images.iter_mut() {
            if name.starts_with("AltoII/U") {
                data.iter_mut().for_each(|b| *b = 0);
            }
        }
        images.get_mut("AltoII/U55").expect("U55 exists")[1023] = 0x5;
        let rom = load_microcode(&images, SystemType::TwoKRom).expect("images are complete");
        assert_eq!(rom[0], map_rom_word(0x5000_0000));
        assert_eq!(rom[1], map_rom_word(0));
    }

    #[test]
    fn test_microcode_images_reload() {
        for system in [SystemType::AltoI, SystemType::TwoKRom] {
            let words: Vec<u32> = (0..2048u32).map(|i| i.wrapping_mul(0x9e37_79b9)).collect();
            let images = build_images(system, &words, &sample_control_rom());
            let rom = load_microcode(&images, system).expect("images are complete");
            assert_eq!(rom.as_slice(), &words[..rom.len()], "{system}");
        }
    }

    #[test]
    fn test_control_rom_reloads() {
        for system in [SystemType::AltoI, SystemType::ThreeKRam] {
            let control = sample_control_rom();
            let images = build_images(system, &[], &control);
            assert_eq!(ControlRom::load(&images, system), Ok(control));
        }
    }

    #[test]
    fn test_missing_image() {
        let mut images = build_images(SystemType::TwoKRom, &[], &ControlRom::default());
        images.remove("AltoII/U63");
        let alarm = load_microcode(&images, SystemType::TwoKRom).expect_err("U63 is missing");
        assert_eq!(alarm.kind(), AlarmKind::RomLoad);
        assert!(alarm.to_string().contains("AltoII/U63"));
    }

    #[test]
    fn test_wrong_size_image() {
        let mut images = build_images(SystemType::TwoKRom, &[], &ControlRom::default());
        images.insert("ACSOURCE.NEW".to_string(), vec![0; 255]);
        match ControlRom::load(&images, SystemType::TwoKRom) {
            Err(Alarm {
                details:
                    AlarmDetails::RomLoad {
                        problem: RomProblem::WrongSize { expected, actual },
                        ..
                    },
                ..
            }) => {
                assert_eq!(expected, 256);
                assert_eq!(actual, 255);
            }
            other => panic!("expected a size complaint, got {other:?}"),
        }
    }

    #[test]
    fn test_rom_directory_names_files() {
        let dir = RomDirectory::new("/nonexistent/roms");
        match dir.read_image("AltoII/U55") {
            Err(RomProblem::Unreadable(why)) => {
                assert!(why.contains("AltoII"), "{why}");
            }
            other => panic!("expected an error, got {other:?}"),
        }
    }
}

//! Configuration of the emulated machine.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use base::prelude::*;

/// The host address of the Ethernet interface, unless configured
/// otherwise.
pub const DEFAULT_ETHERNET_ADDRESS: u8 = 0o42;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub system_type: SystemType,
    /// The directory holding the ROM images.
    pub rom_dir: PathBuf,
    /// The Alto's host address on the Ethernet, as reported by RSNF.
    pub ethernet_address: u8,
}

impl Default for Configuration {
    fn default() -> Configuration {
        Configuration {
            system_type: SystemType::OneKRom,
            rom_dir: PathBuf::from("ROM"),
            ethernet_address: DEFAULT_ETHERNET_ADDRESS,
        }
    }
}

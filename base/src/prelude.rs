//! The prelude exports the items most users of the base crate need:
//! task identities, machine variants and the microinstruction format.
pub use super::microcode::{
    AluFunction, BusSource, MemoryOperation, MicroInstruction, MicroWord, SpecialFunction1,
    SpecialFunction2, CONSTANT_ROM_SIZE, NEXT_MASK,
};
pub use super::subword::{high_half, join_halves, low_half, swap_bytes};
pub use super::types::*;
pub use super::micro;

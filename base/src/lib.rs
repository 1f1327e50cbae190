//! The `base` crate defines the Alto-related things which are useful
//! both in an emulator and in associated tools.  The idea is that if
//! you want to write a microcode disassembler or assembler, it would
//! depend on the base crate but would not need to depend on the
//! emulator library itself.

mod types;

pub mod collections;
pub mod microcode;
pub mod prelude;
pub mod subword;

pub use types::*;

/// Build a microcode word from named fields, leaving the rest zero.
///
/// ```
/// use base::micro;
/// let w: u32 = micro!(rselect: 3, next: 0o17);
/// assert_eq!(w, (3 << 27) | 0o17);
/// ```
#[macro_export]
macro_rules! micro {
    ($($field:ident : $value:expr),* $(,)?) => {
        $crate::microcode::MicroWord {
            $($field: $value,)*
            ..$crate::microcode::MicroWord::default()
        }
        .encode()
    };
}

#[test]
fn test_micro_macro() {
    use microcode::{AluFunction, MicroInstruction, CONSTANT_ROM_SIZE};
    let w: u32 = micro!(aluf: AluFunction::BusPlus1.code(), load_l: true, next: 5);
    let i = MicroInstruction::decode(w, &[0; CONSTANT_ROM_SIZE]);
    assert_eq!(i.aluf, AluFunction::BusPlus1);
    assert!(i.load_l);
    assert_eq!(i.next, 5);
}

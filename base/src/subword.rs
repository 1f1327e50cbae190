//! Convenience utilities for splitting 32-bit microcode words into
//! their 16-bit halves (the control RAM is read and written a half at
//! a time) and for the bit shuffling needed to undo the wiring of the
//! ROM chips.

/// Extract the more-significant halfword from a microcode word.
#[must_use]
pub const fn high_half(word: u32) -> u16 {
    (word >> 16) as u16
}

/// Extract the less-significant halfword from a microcode word.
#[must_use]
pub const fn low_half(word: u32) -> u16 {
    (word & 0xffff) as u16
}

/// Join two halfwords into a microcode word.
#[must_use]
pub const fn join_halves(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | (low as u32)
}

/// Exchange the two bytes of a 16-bit word.
#[must_use]
pub const fn swap_bytes(w: u16) -> u16 {
    w.rotate_left(8)
}

/// Reverse the order of the low `width` bits of `value`.  Bits above
/// `width` are discarded.
#[must_use]
pub const fn reverse_low_bits(value: u32, width: u32) -> u32 {
    let mut result = 0;
    let mut i = 0;
    while i < width {
        if value & (1 << i) != 0 {
            result |= 1 << (width - 1 - i);
        }
        i += 1;
    }
    result
}

/// Move bit `i` of `value` to bit `map[i]` of the result.
#[must_use]
pub fn permute_bits(value: u32, map: &[u32]) -> u32 {
    map.iter()
        .enumerate()
        .filter(|(i, _)| value & (1 << i) != 0)
        .fold(0, |acc, (_, to)| acc | (1 << to))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_octal_eq {
        ($left:expr, $right:expr $(,)?) => {{
            match (&$left, &$right) {
                (left_val, right_val) => {
                    assert!(
                        *left_val == *right_val,
                        "assertion failed: {:o} != {:o}",
                        left_val,
                        right_val
                    );
                }
            }
        }};
    }

    #[test]
    fn test_halves() {
        assert_octal_eq!(high_half(0o12345_67012), (0o12345_67012u32 >> 16) as u16);
        assert_eq!(low_half(0xdead_beef), 0xbeef);
        assert_eq!(high_half(0xdead_beef), 0xdead);
        assert_eq!(join_halves(0xdead, 0xbeef), 0xdead_beef);
    }

    #[test]
    fn test_swap_bytes() {
        assert_eq!(swap_bytes(0x1234), 0x3412);
        assert_eq!(swap_bytes(0x00ff), 0xff00);
    }

    #[test]
    fn test_reverse_low_bits() {
        assert_eq!(reverse_low_bits(0b0001, 4), 0b1000);
        assert_eq!(reverse_low_bits(0b0110, 4), 0b0110);
        assert_eq!(reverse_low_bits(0b1_0001, 4), 0b1000);
        assert_eq!(reverse_low_bits(0x01, 8), 0x80);
        assert_eq!(reverse_low_bits(0xf0, 8), 0x0f);
    }

    #[test]
    fn test_permute_bits() {
        let map = [7, 2, 1, 0, 3, 4, 5, 6];
        assert_eq!(permute_bits(0x01, &map), 0x80);
        assert_eq!(permute_bits(0x02, &map), 0x04);
        assert_eq!(permute_bits(0x08, &map), 0x01);
        assert_eq!(permute_bits(0xff, &map), 0xff);
        assert_eq!(permute_bits(0, &map), 0);
    }
}

/*
 * Copyright (C) 2018 Nils Asmussen <nils@os.inf.tu-dresden.de>
 * Economic rights: Technische Universitaet Dresden (Germany)
 *
 * Copyright (C) 2019-2024 Nils Asmussen, Barkhausen Institut
 *
 * This file is part of M3 (Microkernel-based SysteM for Heterogeneous Manycores).
 *
 * M3 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * M3 is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

//! Contains math and bit-mask functions

use num_traits::PrimInt;

/// Returns true if any of the bits in `bits` are set in `mask`
///
/// # Examples
///
/// ```
/// use base::math;
///
/// assert!(math::is_bit_set(0b1010u32, 0b0010));
/// assert!(!math::is_bit_set(0b1010u32, 0b0101));
/// ```
pub fn is_bit_set<T: PrimInt>(mask: T, bits: T) -> bool {
    (mask & bits) != T::zero()
}

/// Returns `mask` with the bits in `bits` set or cleared, depending on `val`
pub fn set_bit<T: PrimInt>(mask: T, bits: T, val: bool) -> T {
    if val {
        mask | bits
    }
    else {
        mask & !bits
    }
}

/// Returns true if exactly one bit of `val` is set
pub fn is_single_bit<T: PrimInt>(val: T) -> bool {
    val.count_ones() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits() {
        assert!(is_bit_set(0b1010u32, 0b0010));
        assert!(!is_bit_set(0b1010u32, 0b0100));
        assert_eq!(set_bit(0b1010u32, 0b0100, true), 0b1110);
        assert_eq!(set_bit(0b1010u32, 0b0010, false), 0b1000);
    }

    #[test]
    fn single_bits() {
        assert!(is_single_bit(0x40u32));
        assert!(!is_single_bit(0x41u32));
        assert!(!is_single_bit(0u32));
    }
}

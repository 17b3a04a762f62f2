// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! Variable-length cell encoding used for inline token operands.
//!
//! Values are zigzag-mapped (so small negative numbers stay short) and then
//! written 7 bits at a time, least significant group first. The high bit of
//! each byte is set when more bytes follow.

use crate::mem::{Cell, UCell};
use arrayvec::ArrayVec;

/// Upper bound on the encoded size of any cell.
pub const MAX_VARINT_LEN: usize = (Cell::BITS as usize).div_ceil(7);

pub type Encoded = ArrayVec<u8, MAX_VARINT_LEN>;

fn zigzag(value: Cell) -> UCell {
    ((value << 1) ^ (value >> (Cell::BITS - 1))) as UCell
}

fn unzigzag(value: UCell) -> Cell {
    ((value >> 1) as Cell) ^ -((value & 1) as Cell)
}

pub fn encode(value: Cell) -> Encoded {
    let mut out = Encoded::new();
    let mut rest = zigzag(value);
    loop {
        let group = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(group);
            return out;
        }
        out.push(group | 0x80);
    }
}

/// Decodes a value from the front of `bytes`, returning it with the number of
/// bytes consumed. `None` when the input ends mid-value or runs past
/// [`MAX_VARINT_LEN`].
pub fn decode(bytes: &[u8]) -> Option<(Cell, usize)> {
    let mut acc: UCell = 0;
    for (i, &byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        acc |= ((byte & 0x7f) as UCell) << (7 * i as u32);
        if byte & 0x80 == 0 {
            return Some((unzigzag(acc), i + 1));
        }
    }
    None
}

pub fn encoded_len(value: Cell) -> usize {
    let bits = Cell::BITS - zigzag(value).leading_zeros();
    (bits.max(1) as usize).div_ceil(7)
}

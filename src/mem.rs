// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use crate::codec;
use bytemuck::must_cast;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory access out of bounds at {0}")]
    OutOfBounds(i64),
    #[error("out of memory: {requested} bytes requested, capacity is {capacity}")]
    OutOfMemory { requested: i64, capacity: usize },
    #[error("here would move to {requested}, below the user region at {floor}")]
    BelowFloor { requested: i64, floor: usize },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("malformed variable-length integer at {0}")]
    MalformedVarInt(usize),
}

#[cfg(not(feature = "cell32"))]
pub type Cell = i64;
#[cfg(not(feature = "cell32"))]
pub type UCell = u64;

#[cfg(feature = "cell32")]
pub type Cell = i32;
#[cfg(feature = "cell32")]
pub type UCell = u32;

/// Byte offset into the arena. Addresses are never host pointers, so an
/// arena image can be saved and loaded back at the same offsets.
pub type Address = usize;

pub const CELL_SIZE: usize = std::mem::size_of::<Cell>();
pub const CHAR_SIZE: usize = 1;

pub const TRUE: Cell = -1;
pub const FALSE: Cell = 0;

/// Converts a host boolean to the Forth flag convention (-1 / 0).
pub fn flag(value: bool) -> Cell {
    if value { TRUE } else { FALSE }
}

pub fn to_address(cell: Cell) -> Result<Address, MemoryError> {
    Address::try_from(cell).map_err(|_| MemoryError::OutOfBounds(cell as i64))
}

pub(crate) fn decode_cell(bytes: [u8; CELL_SIZE]) -> Cell {
    Cell::from_le(must_cast(bytes))
}

pub(crate) fn encode_cell(value: Cell) -> [u8; CELL_SIZE] {
    must_cast(value.to_le())
}

/// The data space: one fixed-size byte arena holding system buffers, the
/// dictionary and every compiled definition.
///
/// `here` marks the first free byte. Everything below it has been handed out,
/// either to a system region at startup or to the dictionary afterwards.
///
/// ```text
/// 0                                                      here        capacity
/// +--------------------+----------------------+-----------+---------------+
/// | system regions     | user region          | dictionary| free          |
/// | (fixed at startup) | (saved in an image)  | grows ->  |               |
/// +--------------------+----------------------+-----------+---------------+
/// ```
///
/// All multi-byte values are little-endian and unaligned.
pub struct Memory {
    bytes: Box<[u8]>,
    here: Address,
    floor: Address,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: bytemuck::zeroed_slice_box(size),
            here: 0,
            floor: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn here(&self) -> Address {
        self.here
    }

    /// Lowest address `allot` may move `here` back to.
    pub fn set_floor(&mut self, floor: Address) {
        self.floor = floor;
    }

    pub fn set_here(&mut self, here: Address) -> Result<(), MemoryError> {
        if here > self.bytes.len() {
            return Err(MemoryError::OutOfMemory {
                requested: here as i64,
                capacity: self.bytes.len(),
            });
        }
        self.here = here;
        Ok(())
    }

    /// Moves `here` by `delta` bytes (which may be negative) and returns the
    /// previous value.
    pub fn allot(&mut self, delta: Cell) -> Result<Address, MemoryError> {
        let old = self.here;
        let new = old as i128 + delta as i128;
        if new < self.floor as i128 {
            return Err(MemoryError::BelowFloor {
                requested: new as i64,
                floor: self.floor,
            });
        }
        if new > self.bytes.len() as i128 {
            return Err(MemoryError::OutOfMemory {
                requested: new as i64,
                capacity: self.bytes.len(),
            });
        }
        self.here = new as Address;
        Ok(old)
    }

    /// Reserves `len` bytes at `here` and returns their start.
    pub fn reserve(&mut self, len: usize) -> Result<Address, MemoryError> {
        let start = self.here;
        self.set_here(start + len)?;
        Ok(start)
    }

    pub fn bytes(&self, address: Address, len: usize) -> Result<&[u8], MemoryError> {
        address
            .checked_add(len)
            .and_then(|end| self.bytes.get(address..end))
            .ok_or(MemoryError::OutOfBounds(address as i64))
    }

    pub fn bytes_mut(&mut self, address: Address, len: usize) -> Result<&mut [u8], MemoryError> {
        address
            .checked_add(len)
            .and_then(|end| self.bytes.get_mut(address..end))
            .ok_or(MemoryError::OutOfBounds(address as i64))
    }

    pub fn byte(&self, address: Address) -> Result<u8, MemoryError> {
        self.bytes
            .get(address)
            .copied()
            .ok_or(MemoryError::OutOfBounds(address as i64))
    }

    pub fn set_byte(&mut self, address: Address, value: u8) -> Result<(), MemoryError> {
        let byte = self
            .bytes
            .get_mut(address)
            .ok_or(MemoryError::OutOfBounds(address as i64))?;
        *byte = value;
        Ok(())
    }

    pub fn cell(&self, address: Address) -> Result<Cell, MemoryError> {
        let bytes = self.bytes(address, CELL_SIZE)?;
        let raw: [u8; CELL_SIZE] = bytes
            .try_into()
            .map_err(|_| MemoryError::OutOfBounds(address as i64))?;
        Ok(decode_cell(raw))
    }

    pub fn set_cell(&mut self, address: Address, value: Cell) -> Result<(), MemoryError> {
        self.bytes_mut(address, CELL_SIZE)?.copy_from_slice(&encode_cell(value));
        Ok(())
    }

    /// Reads a 2-byte signed branch offset.
    pub fn short(&self, address: Address) -> Result<i16, MemoryError> {
        let bytes = self.bytes(address, 2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn set_short(&mut self, address: Address, value: i16) -> Result<(), MemoryError> {
        self.bytes_mut(address, 2)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Decodes a variable-length cell, returning the value and the number of
    /// bytes it occupies.
    pub fn varint(&self, address: Address) -> Result<(Cell, usize), MemoryError> {
        let end = self.bytes.len().min(address.saturating_add(codec::MAX_VARINT_LEN));
        let window = self
            .bytes
            .get(address..end)
            .ok_or(MemoryError::OutOfBounds(address as i64))?;
        codec::decode(window).ok_or(MemoryError::MalformedVarInt(address))
    }

    /// Encodes `value` at `address`, returning the number of bytes written.
    pub fn set_varint(&mut self, address: Address, value: Cell) -> Result<usize, MemoryError> {
        let encoded = codec::encode(value);
        self.bytes_mut(address, encoded.len())?.copy_from_slice(&encoded);
        Ok(encoded.len())
    }

    pub fn copy_within(
        &mut self,
        from: Address,
        to: Address,
        len: usize,
    ) -> Result<(), MemoryError> {
        let src_end = from
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(MemoryError::OutOfBounds(from as i64))?;
        to.checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(MemoryError::OutOfBounds(to as i64))?;
        self.bytes.copy_within(from..src_end, to);
        Ok(())
    }

    pub fn comma_byte(&mut self, value: u8) -> Result<(), MemoryError> {
        let at = self.reserve(1)?;
        self.set_byte(at, value)
    }

    pub fn comma(&mut self, value: Cell) -> Result<(), MemoryError> {
        let at = self.reserve(CELL_SIZE)?;
        self.set_cell(at, value)
    }

    pub fn comma_short(&mut self, value: i16) -> Result<(), MemoryError> {
        let at = self.reserve(2)?;
        self.set_short(at, value)
    }

    pub fn comma_varint(&mut self, value: Cell) -> Result<usize, MemoryError> {
        let encoded = codec::encode(value);
        let at = self.reserve(encoded.len())?;
        self.bytes_mut(at, encoded.len())?.copy_from_slice(&encoded);
        Ok(encoded.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_read_write() -> Result<(), MemoryError> {
        let mut memory = Memory::new(64);
        memory.set_cell(3, -42)?;
        assert_eq!(memory.cell(3)?, -42);
        assert_eq!(memory.byte(3)?, 0xD6);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds() {
        let mut memory = Memory::new(16);
        let at = 16 - CELL_SIZE + 1;
        assert_eq!(memory.cell(at), Err(MemoryError::OutOfBounds(at as i64)));
        assert!(memory.set_byte(16, 1).is_err());
        assert!(memory.short(15).is_err());
    }

    #[test]
    fn test_here_moves_with_commas() -> Result<(), MemoryError> {
        let mut memory = Memory::new(64);
        memory.comma_byte(7)?;
        memory.comma(100)?;
        memory.comma_short(-3)?;
        assert_eq!(memory.here(), 1 + CELL_SIZE + 2);
        assert_eq!(memory.cell(1)?, 100);
        assert_eq!(memory.short(1 + CELL_SIZE)?, -3);

        memory.allot(-2)?;
        assert_eq!(memory.here(), 1 + CELL_SIZE);
        assert!(memory.allot(-100).is_err());
        assert!(memory.allot(1000).is_err());
        Ok(())
    }

    #[test]
    fn test_allot_stops_at_floor() -> Result<(), MemoryError> {
        let mut memory = Memory::new(64);
        memory.reserve(16)?;
        memory.set_floor(memory.here());
        memory.allot(8)?;
        assert_eq!(
            memory.allot(-9),
            Err(MemoryError::BelowFloor { requested: 15, floor: 16 })
        );
        assert_eq!(memory.here(), 24);
        memory.allot(-8)?;
        assert_eq!(memory.here(), 16);
        Ok(())
    }

    #[test]
    fn test_varint_in_arena() -> Result<(), MemoryError> {
        let mut memory = Memory::new(32);
        let written = memory.set_varint(4, -900)?;
        assert_eq!(written, 2);
        assert_eq!(memory.varint(4)?, (-900, 2));
        Ok(())
    }
}

// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use crate::mem::{CELL_SIZE, Cell, MemoryError, decode_cell, encode_cell};

/// A cell stack over a growable byte buffer. Used for both the parameter
/// stack and the return stack.
pub struct Stack {
    bytes: Vec<u8>,
    top: usize,
}

impl Stack {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: vec![0; bytes.max(CELL_SIZE)],
            top: 0,
        }
    }

    pub fn push(&mut self, value: Cell) {
        let end = self.top + CELL_SIZE;
        if end > self.bytes.len() {
            let grown = (self.bytes.len() * 2).max(end);
            self.bytes.resize(grown, 0);
        }
        self.bytes[self.top..end].copy_from_slice(&encode_cell(value));
        self.top = end;
    }

    pub fn pop(&mut self) -> Result<Cell, MemoryError> {
        let value = self.pick(0)?;
        self.top -= CELL_SIZE;
        Ok(value)
    }

    pub fn peek(&self) -> Result<Cell, MemoryError> {
        self.pick(0)
    }

    /// The `n`th cell below the top (0 is the top itself).
    pub fn pick(&self, n: usize) -> Result<Cell, MemoryError> {
        let start = n
            .checked_add(1)
            .and_then(|cells| cells.checked_mul(CELL_SIZE))
            .and_then(|offset| self.top.checked_sub(offset))
            .ok_or(MemoryError::StackUnderflow)?;
        let mut raw = [0; CELL_SIZE];
        raw.copy_from_slice(&self.bytes[start..start + CELL_SIZE]);
        Ok(decode_cell(raw))
    }

    pub fn drop_n(&mut self, n: usize) -> Result<(), MemoryError> {
        self.top = n
            .checked_mul(CELL_SIZE)
            .and_then(|len| self.top.checked_sub(len))
            .ok_or(MemoryError::StackUnderflow)?;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.top / CELL_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    pub fn clear(&mut self) {
        self.top = 0;
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Cells from bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.bytes[..self.top].chunks_exact(CELL_SIZE).map(|chunk| {
            let mut raw = [0; CELL_SIZE];
            raw.copy_from_slice(chunk);
            decode_cell(raw)
        })
    }
}

// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! The dictionary: a singly linked list of entries threaded through the arena,
//! newest first.
//!
//! ```text
//! +-------------+-----+-----------------+----------------------+
//! | link (cell) | len | name (len bytes)| code ...             |
//! +-------------+-----+-----------------+----------------------+
//!   ^ entry address                       ^ execution token
//! ```
//!
//! `link` holds the address of the previous entry, or 0 for the oldest one.
//! The high bit of `len` marks an immediate word.

use crate::mem::{Address, CELL_SIZE, CHAR_SIZE, Cell, Memory, MemoryError, to_address};
use thiserror::Error;

pub const IMMEDIATE_FLAG: u8 = 0x80;
pub const NAME_LEN_MASK: u8 = 0x7f;
pub const MAX_NAME_LEN: usize = NAME_LEN_MASK as usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DictError {
    #[error("word name is empty")]
    EmptyName,
    #[error("word name is longer than {MAX_NAME_LEN} bytes: {0}")]
    NameTooLong(String),
    #[error("dictionary is empty")]
    Empty,
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Result of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Immediate(Address),
    Normal(Address),
    NotFound,
}

impl Lookup {
    pub fn xt(&self) -> Option<Address> {
        match self {
            Lookup::Immediate(xt) | Lookup::Normal(xt) => Some(*xt),
            Lookup::NotFound => None,
        }
    }

    /// The flag `find` leaves on the stack: 1 immediate, -1 normal, 0 missing.
    pub fn flag(&self) -> Cell {
        match self {
            Lookup::Immediate(_) => 1,
            Lookup::Normal(_) => -1,
            Lookup::NotFound => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub address: Address,
    pub name: String,
    pub immediate: bool,
    pub xt: Address,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dictionary {
    head: Address,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Address {
        self.head
    }

    pub fn set_head(&mut self, head: Address) {
        self.head = head;
    }

    /// Appends a new entry at `here`. The name is stored lower-cased. Returns
    /// the execution token, i.e. where the entry's code starts.
    pub fn add(&mut self, memory: &mut Memory, name: &[u8]) -> Result<Address, DictError> {
        if name.is_empty() {
            return Err(DictError::EmptyName);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(DictError::NameTooLong(String::from_utf8_lossy(name).into_owned()));
        }
        let entry = memory.here();
        memory.comma(self.head as Cell)?;
        memory.comma_byte(name.len() as u8)?;
        let start = memory.reserve(name.len())?;
        let stored = memory.bytes_mut(start, name.len())?;
        stored.copy_from_slice(name);
        stored.make_ascii_lowercase();
        self.head = entry;
        Ok(memory.here())
    }

    /// Finds the newest entry named `name`, compared case-insensitively.
    pub fn find(&self, memory: &Memory, name: &[u8]) -> Result<Lookup, MemoryError> {
        let mut entry = self.head;
        while entry != 0 {
            let (len, immediate) = Self::header(memory, entry)?;
            if len == name.len() {
                let stored = memory.bytes(entry + CELL_SIZE + CHAR_SIZE, len)?;
                if stored.eq_ignore_ascii_case(name) {
                    let xt = Self::code_address(entry, len);
                    return Ok(if immediate { Lookup::Immediate(xt) } else { Lookup::Normal(xt) });
                }
            }
            entry = Self::next(memory, entry)?;
        }
        Ok(Lookup::NotFound)
    }

    /// Execution token of the newest entry.
    pub fn last_xt(&self, memory: &Memory) -> Result<Address, DictError> {
        if self.head == 0 {
            return Err(DictError::Empty);
        }
        let (len, _) = Self::header(memory, self.head)?;
        Ok(Self::code_address(self.head, len))
    }

    /// Marks the newest entry immediate.
    pub fn set_immediate(&self, memory: &mut Memory) -> Result<(), DictError> {
        if self.head == 0 {
            return Err(DictError::Empty);
        }
        let at = self.head + CELL_SIZE;
        let len = memory.byte(at)?;
        memory.set_byte(at, len | IMMEDIATE_FLAG)?;
        Ok(())
    }

    /// All entries, newest first.
    pub fn entries(&self, memory: &Memory) -> Result<Vec<Entry>, MemoryError> {
        let mut entries = Vec::new();
        let mut entry = self.head;
        while entry != 0 {
            let (len, immediate) = Self::header(memory, entry)?;
            let name = memory.bytes(entry + CELL_SIZE + CHAR_SIZE, len)?;
            entries.push(Entry {
                address: entry,
                name: String::from_utf8_lossy(name).into_owned(),
                immediate,
                xt: Self::code_address(entry, len),
            });
            entry = Self::next(memory, entry)?;
        }
        Ok(entries)
    }

    fn header(memory: &Memory, entry: Address) -> Result<(usize, bool), MemoryError> {
        let raw = memory.byte(entry + CELL_SIZE)?;
        Ok(((raw & NAME_LEN_MASK) as usize, raw & IMMEDIATE_FLAG != 0))
    }

    fn next(memory: &Memory, entry: Address) -> Result<Address, MemoryError> {
        let link = memory.cell(entry)?;
        let next = to_address(link)?;
        // links only ever point backwards; anything else is a corrupt image
        if next >= entry {
            return Err(MemoryError::OutOfBounds(link as i64));
        }
        Ok(next)
    }

    fn code_address(entry: Address, len: usize) -> Address {
        entry + CELL_SIZE + CHAR_SIZE + len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Memory {
        let mut memory = Memory::new(1024);
        // address 0 means "no entry", so keep it out of the dictionary
        memory.reserve(16).unwrap();
        memory
    }

    #[test]
    fn test_newest_definition_shadows() -> Result<(), DictError> {
        let mut memory = arena();
        let mut dict = Dictionary::new();
        let first = dict.add(&mut memory, b"Square")?;
        memory.comma_byte(0)?;
        let second = dict.add(&mut memory, b"square")?;

        assert_ne!(first, second);
        assert_eq!(dict.find(&memory, b"SQUARE")?, Lookup::Normal(second));
        assert_eq!(dict.find(&memory, b"cube")?, Lookup::NotFound);
        assert_eq!(dict.last_xt(&memory)?, second);
        Ok(())
    }

    #[test]
    fn test_immediate_flag() -> Result<(), DictError> {
        let mut memory = arena();
        let mut dict = Dictionary::new();
        let xt = dict.add(&mut memory, b"endif")?;
        dict.set_immediate(&mut memory)?;
        let found = dict.find(&memory, b"endif")?;
        assert_eq!(found, Lookup::Immediate(xt));
        assert_eq!(found.flag(), 1);
        assert_eq!(dict.last_xt(&memory)?, xt);
        Ok(())
    }

    #[test]
    fn test_entries_newest_first() -> Result<(), DictError> {
        let mut memory = arena();
        let mut dict = Dictionary::new();
        dict.add(&mut memory, b"a")?;
        dict.add(&mut memory, b"bc")?;
        let names: Vec<_> = dict
            .entries(&memory)?
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        assert_eq!(names, ["bc", "a"]);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut memory = arena();
        let mut dict = Dictionary::new();
        assert_eq!(dict.add(&mut memory, b""), Err(DictError::EmptyName));
        let long = [b'x'; MAX_NAME_LEN + 1];
        assert!(matches!(dict.add(&mut memory, &long), Err(DictError::NameTooLong(_))));
        assert_eq!(dict.last_xt(&memory), Err(DictError::Empty));
    }
}

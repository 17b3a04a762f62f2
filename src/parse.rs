// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! Scanning and number conversion for the outer interpreter
//!
//! Forth has almost no syntax: the input line is a sequence of words separated
//! by delimiters, and every word is either found in the dictionary or
//! converted as a number in the current `base`. This module provides the
//! pure pieces of that process, operating on byte slices:
//! - `scan_word`: skips leading delimiters, then takes bytes up to the next
//!   delimiter (the `word` primitive)
//! - `scan_until`: takes bytes up to a delimiter without skipping first (the
//!   `parse` primitive)
//! - `parse_number`: converts a word in a given base (2 to 36), with an
//!   optional leading sign
//! - `format_number`: renders a cell in a given base for `.`
//!
//! A blank delimiter matches any ASCII whitespace, so tabs separate words
//! just like spaces.

use crate::mem::{Cell, UCell};
use std::num::IntErrorKind;
use thiserror::Error;

/// Errors that can occur during parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The word is neither a dictionary entry nor a number
    #[error("{0} is not a recognized word or number")]
    UnrecognizedWord(String),
    /// The word is a number, but does not fit in a cell
    #[error("number out of range: {0}")]
    OutOfRange(String),
    /// The `base` variable holds something number conversion cannot use
    #[error("invalid number base: {0}")]
    InvalidBase(Cell),
}

/// Result of scanning the input buffer: the word occupies `start..end`, and
/// scanning resumes at `next`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    pub start: usize,
    pub end: usize,
    pub next: usize,
}

impl Scan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

fn is_delimiter(byte: u8, delimiter: u8) -> bool {
    byte == delimiter || (delimiter == b' ' && byte.is_ascii_whitespace())
}

/// Skips delimiters starting at `from`, then takes everything up to the next
/// delimiter. The delimiter that ends the word is consumed.
pub fn scan_word(input: &[u8], from: usize, delimiter: u8) -> Scan {
    let mut pos = from.min(input.len());
    while pos < input.len() && is_delimiter(input[pos], delimiter) {
        pos += 1;
    }
    let start = pos;
    while pos < input.len() && !is_delimiter(input[pos], delimiter) {
        pos += 1;
    }
    let end = pos;
    if pos < input.len() {
        pos += 1;
    }
    Scan { start, end, next: pos }
}

/// Takes everything from `from` up to the next delimiter, or to the end of
/// input when there is none.
pub fn scan_until(input: &[u8], from: usize, delimiter: u8) -> Scan {
    let start = from.min(input.len());
    let end = input[start..]
        .iter()
        .position(|&byte| is_delimiter(byte, delimiter))
        .map_or(input.len(), |offset| start + offset);
    let next = (end + 1).min(input.len());
    Scan { start, end, next }
}

pub fn check_base(base: Cell) -> Result<u32, ParseError> {
    match u32::try_from(base) {
        Ok(radix) if (2..=36).contains(&radix) => Ok(radix),
        _ => Err(ParseError::InvalidBase(base)),
    }
}

/// Converts `text` in `base`. Returns `Ok(None)` when it is not a number at
/// all.
///
/// Without a sign, digits in a non-decimal base may spell any bit pattern of
/// a cell, so `FFFFFFFFFFFFFFFF` in base 16 reads as -1.
pub fn parse_number(text: &str, base: Cell) -> Result<Option<Cell>, ParseError> {
    let radix = check_base(base)?;
    match Cell::from_str_radix(text, radix) {
        Ok(value) => Ok(Some(value)),
        Err(error) => match error.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                let unsigned = !text.starts_with(['+', '-']);
                if radix != 10 && unsigned {
                    if let Ok(bits) = UCell::from_str_radix(text, radix) {
                        return Ok(Some(bits as Cell));
                    }
                }
                Err(ParseError::OutOfRange(text.to_string()))
            }
            _ => Ok(None),
        },
    }
}

/// Renders `value` the way `.` prints it. Bases 2, 8 and 16 show the two's
/// complement bit pattern; every other base prints a sign.
pub fn format_number(value: Cell, base: Cell) -> Result<String, ParseError> {
    let radix = check_base(base)?;
    Ok(match radix {
        2 => format!("{value:b}"),
        8 => format!("{value:o}"),
        10 => value.to_string(),
        16 => format!("{value:x}"),
        _ => {
            let mut digits = Vec::new();
            let mut rest = value.unsigned_abs();
            loop {
                let digit = (rest % radix as UCell) as u32;
                digits.push(char::from_digit(digit, radix).unwrap_or('?'));
                rest /= radix as UCell;
                if rest == 0 {
                    break;
                }
            }
            if value < 0 {
                digits.push('-');
            }
            digits.iter().rev().collect()
        }
    })
}

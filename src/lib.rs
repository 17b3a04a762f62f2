// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! A token-threaded Forth virtual machine.
//!
//! Code, data and the dictionary share one byte arena addressed by offsets,
//! so the whole user region can be saved to an image and loaded back. Source
//! text is compiled into one-byte tokens with inline operands, which the
//! [`Vm`] interprets.

pub mod codec;
pub mod dict;
pub mod host;
mod interp;
pub mod mem;
pub mod parse;
pub mod stack;
pub mod stdlib;
pub mod token;
pub mod vm;

pub use vm::{Mode, RunOutcome, Vm, VmConfig, VmError};

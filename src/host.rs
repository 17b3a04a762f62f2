// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! Seams between the VM and its embedder: where input lines come from, and
//! which host functions Forth code can call.

use crate::mem::Cell;
use std::io::BufRead;
use thiserror::Error;
use tracing::warn;

/// Supplies the outer interpreter with input, one line at a time. `None`
/// means the input is exhausted.
pub trait LineSource {
    fn next_line(&mut self) -> Option<String>;
}

impl<F> LineSource for F
where
    F: FnMut() -> Option<String>,
{
    fn next_line(&mut self) -> Option<String> {
        self()
    }
}

/// Lines of an in-memory text.
pub struct TextLines {
    lines: std::vec::IntoIter<String>,
}

impl TextLines {
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.lines().map(str::to_owned).collect();
        Self {
            lines: lines.into_iter(),
        }
    }
}

impl LineSource for TextLines {
    fn next_line(&mut self) -> Option<String> {
        self.lines.next()
    }
}

/// Lines read from any buffered reader, such as a file or stdin.
pub struct ReaderLines<R> {
    reader: R,
}

impl<R: BufRead> ReaderLines<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderLines<R> {
    fn next_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(error) => {
                warn!(%error, "input read failed, treating as end of input");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Cell,
    /// Taken from the stack as an address/length pair.
    Str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Cell(Cell),
    Str(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HostError {
    #[error("type {0} not found")]
    TypeNotFound(String),
    #[error("method {method} not found on type {type_name}")]
    MethodNotFound { type_name: String, method: String },
    #[error("no host type selected")]
    NoType,
    #[error("no host method selected")]
    NoMethod,
    #[error("host call returned nothing")]
    NullResult,
    #[error("result string of {0} bytes does not fit the host string buffer")]
    ResultTooLong(usize),
    #[error("{0}")]
    Failed(String),
}

/// Host functions reachable from Forth through `host>type`, `host>method`
/// and `host>call`.
pub trait HostBridge {
    fn has_type(&self, type_name: &str) -> bool;

    /// Argument kinds of `type_name.method`, in call order, or `None` when
    /// there is no such method.
    fn signature(&self, type_name: &str, method: &str) -> Option<Vec<ArgKind>>;

    /// Invokes a method. `Ok(None)` is a null result, which the VM reports
    /// as an error.
    fn call(
        &mut self,
        type_name: &str,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<Option<HostValue>, HostError>;
}

/// The bridge of a VM nobody wired up: it knows no types.
pub struct NoHost;

impl HostBridge for NoHost {
    fn has_type(&self, _type_name: &str) -> bool {
        false
    }

    fn signature(&self, _type_name: &str, _method: &str) -> Option<Vec<ArgKind>> {
        None
    }

    fn call(
        &mut self,
        type_name: &str,
        _method: &str,
        _args: Vec<HostValue>,
    ) -> Result<Option<HostValue>, HostError> {
        Err(HostError::TypeNotFound(type_name.to_string()))
    }
}

/// A small bridge over Rust's integer and string functions, installed by the
/// command-line runner.
pub struct StdHost;

impl HostBridge for StdHost {
    fn has_type(&self, type_name: &str) -> bool {
        matches!(type_name, "math" | "string")
    }

    fn signature(&self, type_name: &str, method: &str) -> Option<Vec<ArgKind>> {
        use ArgKind::*;
        match (type_name, method) {
            ("math", "abs" | "isqrt" | "signum") => Some(vec![Cell]),
            ("math", "pow") => Some(vec![Cell, Cell]),
            ("string", "upper" | "lower" | "trim") => Some(vec![Str]),
            ("string", "len") => Some(vec![Str]),
            ("string", "repeat") => Some(vec![Str, Cell]),
            _ => None,
        }
    }

    fn call(
        &mut self,
        type_name: &str,
        method: &str,
        args: Vec<HostValue>,
    ) -> Result<Option<HostValue>, HostError> {
        use HostValue as V;
        let result = match (method, args.as_slice()) {
            ("abs", [V::Cell(n)]) => V::Cell(n.wrapping_abs()),
            ("signum", [V::Cell(n)]) => V::Cell(n.signum()),
            ("isqrt", [V::Cell(n)]) if *n >= 0 => V::Cell(n.isqrt()),
            ("isqrt", [V::Cell(n)]) => {
                return Err(HostError::Failed(format!("isqrt of negative number {n}")));
            }
            ("pow", [V::Cell(base), V::Cell(exp)]) => {
                let exp = u32::try_from(*exp)
                    .map_err(|_| HostError::Failed(format!("negative exponent {exp}")))?;
                V::Cell(base.wrapping_pow(exp))
            }
            ("upper", [V::Str(s)]) => V::Str(s.to_uppercase()),
            ("lower", [V::Str(s)]) => V::Str(s.to_lowercase()),
            ("trim", [V::Str(s)]) => V::Str(s.trim().to_string()),
            ("len", [V::Str(s)]) => V::Cell(s.chars().count() as Cell),
            ("repeat", [V::Str(s), V::Cell(n)]) => {
                let times = usize::try_from(*n)
                    .map_err(|_| HostError::Failed(format!("negative repeat count {n}")))?;
                V::Str(s.repeat(times))
            }
            _ => {
                return Err(HostError::MethodNotFound {
                    type_name: type_name.to_string(),
                    method: method.to_string(),
                });
            }
        };
        Ok(Some(result))
    }
}

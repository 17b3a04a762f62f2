// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use crate::codec::MAX_VARINT_LEN;
use crate::dict::{DictError, Dictionary, Lookup};
use crate::host::{ArgKind, HostBridge, HostError, HostValue, LineSource, NoHost};
use crate::interp::{Fixup, Input};
use crate::mem::{
    Address, CELL_SIZE, CHAR_SIZE, Cell, FALSE, Memory, MemoryError, TRUE, flag, to_address,
};
use crate::parse::{self, ParseError};
use crate::stack::Stack;
use crate::stdlib;
use crate::token::{Operand, Token};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, trace};

#[derive(Error, Debug)]
pub enum VmError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Dictionary(#[from] DictError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("{0} not found in the dictionary")]
    WordNotFound(String),
    #[error("{0}")]
    Compile(String),
    #[error("{0} needs a subsequent word in the input")]
    MissingWord(&'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("bytecode {0} not supported")]
    UnsupportedToken(u8),
    #[error("no line source installed")]
    NoLineSource,
    #[error("input line of {len} bytes does not fit the {max}-byte source buffer")]
    LineTooLong { len: usize, max: usize },
    #[error("word of {len} bytes does not fit the {max}-byte word buffer")]
    WordTooLong { len: usize, max: usize },
    #[error("image of {0} bytes does not fit this VM")]
    InvalidImage(usize),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("file: {file} line: {line}\n{text}\n{source}")]
    Included {
        file: String,
        line: usize,
        text: String,
        #[source]
        source: Box<VmError>,
    },
    #[error("bye")]
    Bye,
}

/// Sizes of the VM's memory areas, in bytes.
#[derive(Debug, Clone)]
pub struct VmConfig {
    pub parameter_stack_size: usize,
    pub return_stack_size: usize,
    pub data_space_size: usize,
    pub pad_size: usize,
    pub source_size: usize,
    pub word_size: usize,
    /// Write buffered output to stdout before reading each input line.
    pub autoflush: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            parameter_stack_size: 16 * 1024,
            return_stack_size: 16 * 1024,
            data_space_size: 256 * 1024,
            pad_size: 1024,
            source_size: 1024,
            word_size: 1024,
            autoflush: false,
        }
    }
}

pub const HOST_STRING_SIZE: usize = 256;
const STUB_SIZE: usize = 3;
const STUB_SLOTS: usize = 256;

/// Addresses of the system regions carved out of the bottom of the arena,
/// in the order they are laid out.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    /// Scratch space for the single instruction the interpreter runs.
    pub code: Address,
    /// Word buffer used by the outer interpreter.
    pub keyword: Address,
    pub source: Address,
    /// Word buffer used by the `word` primitive.
    pub word: Address,
    pub pad: Address,
    pub base: Address,
    pub host_strings: Address,
    pub input_offset: Address,
    pub state: Address,
    /// Execution tokens of primitives, one small stub per token value.
    pub stubs: Address,
    /// First byte saved in a user image. Holds the dictionary head at save
    /// time.
    pub user_start: Address,
    pub source_size: usize,
    pub word_size: usize,
}

impl Layout {
    fn carve(memory: &mut Memory, config: &VmConfig) -> Result<Self, MemoryError> {
        Ok(Self {
            code: memory.reserve(CHAR_SIZE + MAX_VARINT_LEN)?,
            keyword: memory.reserve(config.word_size)?,
            source: memory.reserve(config.source_size)?,
            word: memory.reserve(config.word_size)?,
            pad: memory.reserve(config.pad_size)?,
            base: memory.reserve(CELL_SIZE)?,
            host_strings: memory.reserve(HOST_STRING_SIZE)?,
            input_offset: memory.reserve(CELL_SIZE)?,
            state: memory.reserve(CELL_SIZE)?,
            stubs: memory.reserve(STUB_SIZE * STUB_SLOTS)?,
            user_start: memory.reserve(CELL_SIZE)?,
            source_size: config.source_size,
            word_size: config.word_size,
        })
    }

    pub fn saved_dict_head(&self) -> Address {
        self.user_start
    }

    pub fn stub(&self, token: Token) -> Address {
        self.stubs + STUB_SIZE * token as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Executing,
    Compiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    EndOfInput,
    Bye,
}

pub struct Vm {
    pub(crate) mem: Memory,
    pub(crate) ps: Stack,
    pub(crate) rs: Stack,
    pub(crate) dict: Dictionary,
    pub(crate) layout: Layout,
    pub(crate) fixups: Vec<Fixup>,
    pub(crate) input: Input,
    pub(crate) output: String,
    pub(crate) debug: bool,
    autoflush: bool,
    host: Box<dyn HostBridge>,
    host_type: Option<String>,
    host_method: Option<String>,
}

impl Vm {
    /// Builds a VM and loads the Forth prelude into it.
    pub fn new(config: VmConfig) -> Result<Self, VmError> {
        let mut mem = Memory::new(config.data_space_size);
        let layout = Layout::carve(&mut mem, &config)?;
        mem.set_floor(mem.here());
        let mut vm = Self {
            mem,
            ps: Stack::with_capacity(config.parameter_stack_size),
            rs: Stack::with_capacity(config.return_stack_size),
            dict: Dictionary::new(),
            layout,
            fixups: Vec::new(),
            input: Input::default(),
            output: String::new(),
            debug: false,
            autoflush: config.autoflush,
            host: Box::new(NoHost),
            host_type: None,
            host_method: None,
        };
        vm.mem.set_cell(layout.base, 10)?;
        vm.write_stubs()?;
        vm.evaluate(stdlib::PRELUDE)?;
        debug!(here = vm.mem.here(), user_start = layout.user_start, "vm ready");
        Ok(vm)
    }

    fn write_stubs(&mut self) -> Result<(), MemoryError> {
        for descriptor in stdlib::PRIMITIVES {
            let at = self.layout.stub(descriptor.token);
            self.mem.bytes_mut(at, STUB_SIZE)?.copy_from_slice(&[
                descriptor.token as u8,
                Token::Exit as u8,
                Token::Noop as u8,
            ]);
        }
        for descriptor in stdlib::IMMEDIATES {
            let at = self.layout.stub(descriptor.token);
            self.mem.bytes_mut(at, STUB_SIZE)?.copy_from_slice(&[
                Token::CallImmediate as u8,
                descriptor.token as u8,
                Token::Exit as u8,
            ]);
        }
        Ok(())
    }

    pub fn set_line_source(&mut self, source: impl LineSource + 'static) {
        self.input.source = Some(Box::new(source));
    }

    pub fn set_host(&mut self, host: impl HostBridge + 'static) {
        self.host = Box::new(host);
        self.host_type = None;
        self.host_method = None;
    }

    pub fn set_autoflush(&mut self, autoflush: bool) {
        self.autoflush = autoflush;
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn here(&self) -> Address {
        self.mem.here()
    }

    pub fn push(&mut self, value: Cell) {
        self.ps.push(value);
    }

    pub fn pop(&mut self) -> Result<Cell, VmError> {
        Ok(self.ps.pop()?)
    }

    pub fn depth(&self) -> usize {
        self.ps.depth()
    }

    pub fn return_depth(&self) -> usize {
        self.rs.depth()
    }

    /// Parameter stack contents, bottom first.
    pub fn stack(&self) -> Vec<Cell> {
        self.ps.iter().collect()
    }

    pub fn mode(&self) -> Mode {
        match self.mem.cell(self.layout.state) {
            Ok(FALSE) | Err(_) => Mode::Executing,
            Ok(_) => Mode::Compiling,
        }
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) -> Result<(), VmError> {
        let state = match mode {
            Mode::Executing => FALSE,
            Mode::Compiling => TRUE,
        };
        Ok(self.mem.set_cell(self.layout.state, state)?)
    }

    pub fn base(&self) -> Result<Cell, VmError> {
        Ok(self.mem.cell(self.layout.base)?)
    }

    /// Drains everything printed so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub(crate) fn flush_output(&mut self) {
        use std::io::Write;
        if self.autoflush && !self.output.is_empty() {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(self.output.as_bytes());
            let _ = stdout.flush();
            self.output.clear();
        }
    }

    /// Looks a name up the way the interpreter does: dictionary first, then
    /// the primitive tables.
    pub fn find(&self, name: &str) -> Result<Lookup, VmError> {
        let name = name.to_ascii_lowercase();
        let found = self.dict.find(&self.mem, name.as_bytes())?;
        if found != Lookup::NotFound {
            return Ok(found);
        }
        if let Some(token) = stdlib::primitive(&name) {
            return Ok(Lookup::Normal(self.layout.stub(token)));
        }
        if let Some(token) = stdlib::immediate(&name) {
            return Ok(Lookup::Immediate(self.layout.stub(token)));
        }
        Ok(Lookup::NotFound)
    }

    /// Every known word, primitives included, sorted.
    pub fn words(&self) -> Result<Vec<String>, VmError> {
        let mut words: Vec<String> = stdlib::PRIMITIVES
            .iter()
            .chain(stdlib::IMMEDIATES)
            .map(|descriptor| descriptor.name.to_string())
            .collect();
        words.extend(self.dict.entries(&self.mem)?.into_iter().map(|entry| entry.name));
        words.sort();
        Ok(words)
    }

    /// Runs the code at `xt` until it returns.
    pub fn call(&mut self, xt: Address) -> Result<(), VmError> {
        self.execute(Token::Call, Some(xt as Cell))
    }

    pub(crate) fn pop_address(&mut self) -> Result<Address, VmError> {
        Ok(to_address(self.ps.pop()?)?)
    }

    fn rpop_address(&mut self) -> Result<Address, VmError> {
        Ok(to_address(self.rs.pop()?)?)
    }

    /// Pops a `c-addr u` pair.
    pub(crate) fn pop_string(&mut self) -> Result<String, VmError> {
        let len = self.pop_address()?;
        let address = self.pop_address()?;
        let bytes = self.mem.bytes(address, len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub(crate) fn token_at(&self, address: Address) -> Result<Token, VmError> {
        let byte = self.mem.byte(address)?;
        Token::from_byte(byte).ok_or(VmError::UnsupportedToken(byte))
    }

    /// Size of the operand of `token`, which starts at `at`.
    pub(crate) fn operand_len(&self, token: Token, at: Address) -> Result<usize, VmError> {
        Ok(match token.operand() {
            Operand::None => 0,
            Operand::Byte => 1,
            Operand::Short => 2,
            Operand::Cell => CELL_SIZE,
            Operand::VarInt => self.mem.varint(at)?.1,
            Operand::Str => self.mem.byte(at)? as usize + 1,
        })
    }

    /// Runs one instruction placed in the code scratch area, following calls
    /// until control comes back to the end of that instruction.
    pub(crate) fn execute(&mut self, token: Token, operand: Option<Cell>) -> Result<(), VmError> {
        let code = self.layout.code;
        self.mem.set_byte(code, token as u8)?;
        let len = match operand {
            Some(value) => CHAR_SIZE + self.mem.set_varint(code + CHAR_SIZE, value)?,
            None => CHAR_SIZE,
        };
        let end = code + len;
        let mut ip = code;
        loop {
            let token = self.token_at(ip)?;
            if self.debug {
                let name = stdlib::name_of(token).unwrap_or_default();
                trace!(ip, ?token, name, depth = self.ps.depth(), rdepth = self.rs.depth(), "step");
            }
            ip = self.step(token, ip + CHAR_SIZE)?;
            if ip == end {
                return Ok(());
            }
        }
    }

    fn binary(&mut self, op: impl FnOnce(Cell, Cell) -> Cell) -> Result<(), VmError> {
        let b = self.ps.pop()?;
        let a = self.ps.pop()?;
        self.ps.push(op(a, b));
        Ok(())
    }

    fn jump(&self, at: Address) -> Result<Address, VmError> {
        let offset = self.mem.short(at)?;
        at.checked_add_signed(offset as isize)
            .ok_or(VmError::Memory(MemoryError::OutOfBounds(at as i64 + offset as i64)))
    }

    /// Executes `token`, whose operand (if any) starts at `ip`. Returns the
    /// address of the next instruction.
    fn step(&mut self, token: Token, mut ip: Address) -> Result<Address, VmError> {
        use Token::*;
        match token {
            Invalid => return Err(VmError::UnsupportedToken(token as u8)),
            Noop => {}
            Plus => self.binary(Cell::wrapping_add)?,
            Minus => self.binary(Cell::wrapping_sub)?,
            Star => self.binary(Cell::wrapping_mul)?,
            Slash => {
                let divisor = self.ps.pop()?;
                let dividend = self.ps.pop()?;
                if divisor == 0 {
                    return Err(VmError::DivisionByZero);
                }
                self.ps.push(dividend.wrapping_div(divisor));
            }
            StarSlashMod => {
                let n3 = self.ps.pop()?;
                let n2 = self.ps.pop()?;
                let n1 = self.ps.pop()?;
                if n3 == 0 {
                    return Err(VmError::DivisionByZero);
                }
                let product = n1 as i128 * n2 as i128;
                self.ps.push((product % n3 as i128) as Cell);
                self.ps.push((product / n3 as i128) as Cell);
            }
            And => self.binary(|a, b| a & b)?,
            Or => self.binary(|a, b| a | b)?,
            Invert => {
                let value = self.ps.pop()?;
                self.ps.push(!value);
            }
            Less => self.binary(|a, b| flag(a < b))?,
            Greater => self.binary(|a, b| flag(a > b))?,
            Equal => self.binary(|a, b| flag(a == b))?,
            NotEqual => self.binary(|a, b| flag(a != b))?,
            Dup => {
                let value = self.ps.peek()?;
                self.ps.push(value);
            }
            TwoDup => {
                let x2 = self.ps.pick(0)?;
                let x1 = self.ps.pick(1)?;
                self.ps.push(x1);
                self.ps.push(x2);
            }
            Over => {
                let value = self.ps.pick(1)?;
                self.ps.push(value);
            }
            Swap => {
                let b = self.ps.pop()?;
                let a = self.ps.pop()?;
                self.ps.push(b);
                self.ps.push(a);
            }
            Drop => self.ps.drop_n(1)?,
            TwoDrop => self.ps.drop_n(2)?,
            Depth => self.ps.push(self.ps.depth() as Cell),
            RDepth => self.ps.push(self.rs.depth() as Cell),
            ToR => {
                let value = self.ps.pop()?;
                self.rs.push(value);
            }
            FromR => {
                let value = self.rs.pop()?;
                self.ps.push(value);
            }
            I => self.ps.push(self.rs.pick(0)?),
            J => self.ps.push(self.rs.pick(3)?),
            Here => self.ps.push(self.mem.here() as Cell),
            Base => self.ps.push(self.layout.base as Cell),
            State => self.ps.push(self.layout.state as Cell),
            ToIn => self.ps.push(self.layout.input_offset as Cell),
            Pad => self.ps.push(self.layout.pad as Cell),
            Source => {
                self.ps.push(self.layout.source as Cell);
                self.ps.push(self.input.len as Cell);
            }
            Bl => self.ps.push(b' ' as Cell),
            Cells => {
                let n = self.ps.pop()?;
                self.ps.push(n.wrapping_mul(CELL_SIZE as Cell));
            }
            Allot => {
                let n = self.ps.pop()?;
                self.mem.allot(n)?;
            }
            Comma => {
                let value = self.ps.pop()?;
                self.mem.comma(value)?;
            }
            CComma => {
                let value = self.ps.pop()?;
                self.mem.comma_byte(value as u8)?;
            }
            Fetch => {
                let address = self.pop_address()?;
                self.ps.push(self.mem.cell(address)?);
            }
            CFetch => {
                let address = self.pop_address()?;
                self.ps.push(self.mem.byte(address)? as Cell);
            }
            Store => {
                let address = self.pop_address()?;
                let value = self.ps.pop()?;
                self.mem.set_cell(address, value)?;
            }
            Count => {
                let address = self.pop_address()?;
                let len = self.mem.byte(address)?;
                self.ps.push(address as Cell + 1);
                self.ps.push(len as Cell);
            }
            Dot => {
                let value = self.ps.pop()?;
                let text = parse::format_number(value, self.base()?)?;
                self.output.push_str(&text);
                self.output.push(' ');
            }
            DotS => {
                let text = self.dot_s();
                self.output.push_str(&text);
                self.output.push('\n');
            }
            Emit => {
                let value = self.ps.pop()?;
                self.output.push(char::from(value as u8));
            }
            Type => {
                let text = self.pop_string()?;
                self.output.push_str(&text);
            }
            Cr => self.output.push('\n'),
            Words => {
                let words = self.words()?.join(" ");
                self.output.push_str(&words);
                self.output.push('\n');
            }
            Refill => {
                let refilled = self.refill()?;
                self.ps.push(flag(refilled));
            }
            Word => {
                let delimiter = self.ps.pop()? as u8;
                let address = self.word(delimiter, self.layout.word)?;
                self.ps.push(address as Cell);
            }
            Parse => {
                let delimiter = self.ps.pop()? as u8;
                let (address, len) = self.parse_input(delimiter)?;
                self.ps.push(address as Cell);
                self.ps.push(len as Cell);
            }
            Char => {
                let code = self.char_code("char")?;
                self.ps.push(code);
            }
            Find => self.find_word()?,
            Tick => self.tick()?,
            Interpret => self.interpret()?,
            Quit => self.quit()?,
            Included => {
                let path = self.pop_string()?;
                self.include_file(path)?;
            }
            TestSys => self.evaluate(stdlib::PRELIMINARY_TESTS)?,
            Bye => return Err(VmError::Bye),
            Colon => self.colon()?,
            Create => self.create()?,
            Does => ip = self.does(ip)?,
            Immediate => self.dict.set_immediate(&mut self.mem)?,
            ToBody => {
                let xt = self.ps.pop()?;
                self.ps.push(xt.wrapping_add((CHAR_SIZE + CELL_SIZE) as Cell));
            }
            Execute => {
                let xt = self.pop_address()?;
                self.rs.push(ip as Cell);
                ip = xt;
            }
            Save | SaveSys => {
                let path = self.pop_string()?;
                self.save_image_file(&path, token == SaveSys)?;
                self.output.push_str(&format!("Saved in file {path}.\n"));
            }
            Load | LoadSys => {
                let path = self.pop_string()?;
                self.load_image_file(&path, token == LoadSys)?;
            }
            HostType => self.select_host_type()?,
            HostMethod => self.select_host_method()?,
            HostCall => self.call_host()?,
            Call => {
                let (target, len) = self.mem.varint(ip)?;
                self.rs.push((ip + len) as Cell);
                ip = to_address(target)?;
            }
            Jump => ip = to_address(self.mem.varint(ip)?.0)?,
            Exit => ip = self.rpop_address()?,
            Literal => {
                let (value, len) = self.mem.varint(ip)?;
                self.ps.push(value);
                ip += len;
            }
            CreatedBody => {
                self.ps.push(self.mem.cell(ip)?);
                ip = self.rpop_address()?;
            }
            BranchIfZero => {
                let value = self.ps.pop()?;
                ip = if value == FALSE { self.jump(ip)? } else { ip + 2 };
            }
            Branch => ip = self.jump(ip)?,
            Do => {
                let after = self.mem.cell(ip)?;
                ip += CELL_SIZE;
                let index = self.ps.pop()?;
                let limit = self.ps.pop()?;
                self.rs.push(after);
                self.rs.push(limit);
                self.rs.push(index);
            }
            Loop => {
                let index = self.rs.pop()?.wrapping_add(1);
                let limit = self.rs.pop()?;
                ip = self.next_iteration(ip, index, limit, index < limit)?;
            }
            PlusLoop => {
                let increment = self.ps.pop()?;
                let index = self.rs.pop()?.wrapping_add(increment);
                let limit = self.rs.pop()?;
                let again = if increment > 0 { index < limit } else { index >= limit };
                ip = self.next_iteration(ip, index, limit, again)?;
            }
            Leave => {
                self.rs.drop_n(2)?;
                ip = self.rpop_address()?;
            }
            CountedString => {
                self.ps.push(ip as Cell);
                ip += self.mem.byte(ip)? as usize + 1;
            }
            StringLiteral | SLiteral => {
                let len = self.mem.byte(ip)? as usize;
                self.ps.push((ip + 1) as Cell);
                self.ps.push(len as Cell);
                ip += len + 1;
            }
            CallImmediate => {
                let action = self.token_at(ip)?;
                if !self.compile_action(action)? {
                    return Err(VmError::UnsupportedToken(action as u8));
                }
                ip += 1;
            }
            PostponeToken => {
                let postponed = self.token_at(ip)?;
                self.compile(postponed, None)?;
                ip += 2;
            }
            PostponeCall => {
                let (xt, len) = self.mem.varint(ip)?;
                self.compile(Call, Some(xt))?;
                ip += len;
            }
            action => {
                if !self.compile_action(action)? {
                    return Err(VmError::UnsupportedToken(action as u8));
                }
            }
        }
        Ok(ip)
    }

    /// Loop bookkeeping shared by `loop` and `+loop`. `at` is the address of
    /// the backward offset.
    fn next_iteration(
        &mut self,
        at: Address,
        index: Cell,
        limit: Cell,
        again: bool,
    ) -> Result<Address, VmError> {
        if again {
            self.rs.push(limit);
            self.rs.push(index);
            self.jump(at)
        } else {
            self.rs.drop_n(1)?;
            Ok(at + 2)
        }
    }

    pub fn dot_s(&self) -> String {
        if self.ps.is_empty() {
            return "Stack: empty".to_string();
        }
        let cells: Vec<String> = self.ps.iter().map(|cell| cell.to_string()).collect();
        format!("Stack: {}", cells.join(" "))
    }

    /// Copies the arena from `user_start` (or from 0 when `all`) up to `here`.
    /// The dictionary head is stored first so the image is self-contained.
    pub fn save_image(&mut self, all: bool) -> Result<Vec<u8>, VmError> {
        let start = if all { 0 } else { self.layout.user_start };
        self.mem.set_cell(self.layout.saved_dict_head(), self.dict.head() as Cell)?;
        let len = self
            .mem
            .here()
            .checked_sub(start)
            .ok_or(MemoryError::OutOfBounds(start as i64))?;
        Ok(self.mem.bytes(start, len)?.to_vec())
    }

    pub fn load_image(&mut self, image: &[u8], all: bool) -> Result<(), VmError> {
        let start = if all { 0 } else { self.layout.user_start };
        let head_end = self.layout.saved_dict_head() + CELL_SIZE;
        if start + image.len() < head_end {
            return Err(VmError::InvalidImage(image.len()));
        }
        // a full image also covers the input buffer, which is still being read
        let offset = self.mem.cell(self.layout.input_offset)?;
        let line = self.mem.bytes(self.layout.source, self.input.len)?.to_vec();
        self.mem
            .bytes_mut(start, image.len())
            .map_err(|_| VmError::InvalidImage(image.len()))?
            .copy_from_slice(image);
        if all {
            self.mem.set_cell(self.layout.input_offset, offset)?;
            self.mem
                .bytes_mut(self.layout.source, line.len())?
                .copy_from_slice(&line);
        }
        let head = to_address(self.mem.cell(self.layout.saved_dict_head())?)?;
        self.dict.set_head(head);
        self.mem.set_here(start + image.len())?;
        info!(bytes = image.len(), all, here = self.mem.here(), "image loaded");
        Ok(())
    }

    pub fn save_image_file(&mut self, path: impl AsRef<Path>, all: bool) -> Result<(), VmError> {
        let path = path.as_ref();
        let image = self.save_image(all)?;
        std::fs::write(path, &image).map_err(|source| VmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(path = %path.display(), bytes = image.len(), all, "image saved");
        Ok(())
    }

    pub fn load_image_file(&mut self, path: impl AsRef<Path>, all: bool) -> Result<(), VmError> {
        let path = path.as_ref();
        let image = std::fs::read(path).map_err(|source| VmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load_image(&image, all)
    }

    fn select_host_type(&mut self) -> Result<(), VmError> {
        let name = self.pop_string()?;
        if !self.host.has_type(&name) {
            return Err(HostError::TypeNotFound(name).into());
        }
        debug!(host_type = %name, "host type selected");
        self.host_type = Some(name);
        self.host_method = None;
        Ok(())
    }

    fn select_host_method(&mut self) -> Result<(), VmError> {
        let method = self.pop_string()?;
        let type_name = self.host_type.as_deref().ok_or(HostError::NoType)?;
        if self.host.signature(type_name, &method).is_none() {
            return Err(HostError::MethodNotFound {
                type_name: type_name.to_string(),
                method,
            }
            .into());
        }
        self.host_method = Some(method);
        Ok(())
    }

    fn call_host(&mut self) -> Result<(), VmError> {
        let type_name = self.host_type.clone().ok_or(HostError::NoType)?;
        let method = self.host_method.clone().ok_or(HostError::NoMethod)?;
        let signature = self.host.signature(&type_name, &method).ok_or_else(|| {
            HostError::MethodNotFound {
                type_name: type_name.clone(),
                method: method.clone(),
            }
        })?;
        let mut args = Vec::with_capacity(signature.len());
        for kind in signature.iter().rev() {
            args.push(match kind {
                ArgKind::Cell => HostValue::Cell(self.ps.pop()?),
                ArgKind::Str => HostValue::Str(self.pop_string()?),
            });
        }
        args.reverse();
        debug!(host_type = %type_name, %method, args = args.len(), "host call");
        match self.host.call(&type_name, &method, args)? {
            None => Err(HostError::NullResult.into()),
            Some(HostValue::Cell(value)) => {
                self.ps.push(value);
                Ok(())
            }
            Some(HostValue::Str(text)) => {
                let bytes = text.as_bytes();
                if bytes.len() > HOST_STRING_SIZE {
                    return Err(HostError::ResultTooLong(bytes.len()).into());
                }
                let at = self.layout.host_strings;
                self.mem.bytes_mut(at, bytes.len())?.copy_from_slice(bytes);
                self.ps.push(at as Cell);
                self.ps.push(bytes.len() as Cell);
                Ok(())
            }
        }
    }
}

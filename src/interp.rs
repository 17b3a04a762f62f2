// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! The outer interpreter: reads words from the input, runs or compiles them,
//! and implements the compile-time words that build control structures.
//!
//! Forward branches are emitted with a 2-byte placeholder whose address is
//! remembered as a [`Fixup`]. The word closing the structure (`then`, `else`,
//! `repeat`, `loop`) pops the fixup and writes the real offset. Offsets are
//! relative to the placeholder itself.

use crate::codec;
use crate::dict::{DictError, Lookup};
use crate::host::{LineSource, ReaderLines, TextLines};
use crate::mem::{Address, CELL_SIZE, CHAR_SIZE, Cell, to_address};
use crate::parse::{self, ParseError};
use crate::stdlib;
use crate::token::Token;
use crate::vm::{Mode, RunOutcome, Vm, VmError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, error, info, warn};

#[derive(Default)]
pub(crate) struct Input {
    pub(crate) source: Option<Box<dyn LineSource>>,
    /// Bytes of the current line held in the source buffer.
    pub(crate) len: usize,
    pub(crate) line_number: usize,
    pub(crate) last_line: String,
}

/// Everything needed to resume an outer input after a nested one ends.
struct SavedInput {
    input: Input,
    line: Vec<u8>,
    offset: Cell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FixupKind {
    If,
    Else,
    Begin,
    While,
    Do,
}

impl FixupKind {
    fn word(self) -> &'static str {
        match self {
            FixupKind::If => "if",
            FixupKind::Else => "else",
            FixupKind::Begin => "begin",
            FixupKind::While => "while",
            FixupKind::Do => "do",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Fixup {
    kind: FixupKind,
    at: Address,
}

fn branch_offset(from: Address, to: Address) -> Result<i16, VmError> {
    let delta = to as i64 - from as i64;
    i16::try_from(delta)
        .map_err(|_| VmError::Compile(format!("branch of {delta} bytes is out of range")))
}

impl Vm {
    /// Reads and interprets lines until the line source runs dry, recovering
    /// from errors: each one is reported to the output, then the stacks and
    /// the compiler state are reset and reading goes on with the next line.
    pub fn run(&mut self) -> RunOutcome {
        loop {
            match self.quit() {
                Ok(()) | Err(VmError::NoLineSource) => {
                    self.flush_output();
                    return RunOutcome::EndOfInput;
                }
                Err(VmError::Bye) => {
                    self.flush_output();
                    return RunOutcome::Bye;
                }
                Err(failure) => {
                    warn!(error = %failure, line = self.input.line_number, "input rejected");
                    self.output.push_str(&failure.to_string());
                    self.output.push('\n');
                    if let Err(fatal) = self.reset() {
                        error!(error = %fatal, "reset failed");
                        return RunOutcome::EndOfInput;
                    }
                }
            }
        }
    }

    /// Clears both stacks and any half-built control structure, and returns
    /// to interpretation mode.
    pub fn reset(&mut self) -> Result<(), VmError> {
        self.ps.clear();
        self.rs.clear();
        self.fixups.clear();
        self.set_mode(Mode::Executing)?;
        self.mem.set_cell(self.layout.input_offset, 0)?;
        Ok(())
    }

    pub(crate) fn quit(&mut self) -> Result<(), VmError> {
        self.rs.clear();
        self.set_mode(Mode::Executing)?;
        self.interpret_lines()
    }

    fn interpret_lines(&mut self) -> Result<(), VmError> {
        while self.refill()? {
            self.interpret()?;
        }
        Ok(())
    }

    /// Interprets Forth source as if it were typed in, then resumes the
    /// current input where it left off.
    pub fn evaluate(&mut self, text: &str) -> Result<(), VmError> {
        let saved = self.enter_input(Box::new(TextLines::new(text)))?;
        let result = self.interpret_lines();
        self.leave_input(saved)?;
        result
    }

    pub fn include_file(&mut self, path: impl AsRef<Path>) -> Result<(), VmError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| VmError::Io {
            path: path.display().to_string(),
            source,
        })?;
        info!(file = %path.display(), "including");
        let saved = self.enter_input(Box::new(ReaderLines::new(BufReader::new(file))))?;
        let result = self.interpret_lines();
        let line = self.input.line_number;
        let text = std::mem::take(&mut self.input.last_line);
        self.leave_input(saved)?;
        result.map_err(|failure| match failure {
            VmError::Bye => VmError::Bye,
            failure => VmError::Included {
                file: path.display().to_string(),
                line,
                text,
                source: Box::new(failure),
            },
        })
    }

    fn enter_input(&mut self, source: Box<dyn LineSource>) -> Result<SavedInput, VmError> {
        let line = self.mem.bytes(self.layout.source, self.input.len)?.to_vec();
        let offset = self.mem.cell(self.layout.input_offset)?;
        let fresh = Input {
            source: Some(source),
            ..Input::default()
        };
        let input = std::mem::replace(&mut self.input, fresh);
        Ok(SavedInput { input, line, offset })
    }

    fn leave_input(&mut self, saved: SavedInput) -> Result<(), VmError> {
        self.input = saved.input;
        self.mem
            .bytes_mut(self.layout.source, saved.line.len())?
            .copy_from_slice(&saved.line);
        self.mem.set_cell(self.layout.input_offset, saved.offset)?;
        Ok(())
    }

    /// Loads the next line into the source buffer. `Ok(false)` at end of
    /// input.
    pub(crate) fn refill(&mut self) -> Result<bool, VmError> {
        self.flush_output();
        let source = self.input.source.as_mut().ok_or(VmError::NoLineSource)?;
        let Some(line) = source.next_line() else {
            return Ok(false);
        };
        let line = line.trim();
        self.input.line_number += 1;
        let max = self.layout.source_size;
        if line.len() > max {
            return Err(VmError::LineTooLong { len: line.len(), max });
        }
        self.mem
            .bytes_mut(self.layout.source, line.len())?
            .copy_from_slice(line.as_bytes());
        self.input.len = line.len();
        self.input.last_line = line.to_string();
        self.mem.set_cell(self.layout.input_offset, 0)?;
        Ok(true)
    }

    fn input_offset(&self) -> Result<usize, VmError> {
        let offset = self.mem.cell(self.layout.input_offset)?;
        Ok(to_address(offset).unwrap_or(0).min(self.input.len))
    }

    /// Scans the next `delimiter`-separated word into the counted-string
    /// buffer at `buffer` and returns `buffer`. An exhausted line yields an
    /// empty string.
    pub(crate) fn word(&mut self, delimiter: u8, buffer: Address) -> Result<Address, VmError> {
        let from = self.input_offset()?;
        let input = self.mem.bytes(self.layout.source, self.input.len)?;
        let scan = parse::scan_word(input, from, delimiter);
        let max = self.layout.word_size.saturating_sub(1).min(u8::MAX as usize);
        if scan.len() > max {
            return Err(VmError::WordTooLong { len: scan.len(), max });
        }
        self.mem
            .copy_within(self.layout.source + scan.start, buffer + 1, scan.len())?;
        self.mem.set_byte(buffer, scan.len() as u8)?;
        self.mem.set_cell(self.layout.input_offset, scan.next as Cell)?;
        Ok(buffer)
    }

    /// Takes the input up to `delimiter` in place, without skipping leading
    /// delimiters. Returns the address and length inside the source buffer.
    pub(crate) fn parse_input(&mut self, delimiter: u8) -> Result<(Address, usize), VmError> {
        let from = self.input_offset()?;
        let input = self.mem.bytes(self.layout.source, self.input.len)?;
        let scan = parse::scan_until(input, from, delimiter);
        self.mem.set_cell(self.layout.input_offset, scan.next as Cell)?;
        Ok((self.layout.source + scan.start, scan.len()))
    }

    fn lowercase_counted(&mut self, at: Address) -> Result<String, VmError> {
        let len = self.mem.byte(at)? as usize;
        let bytes = self.mem.bytes_mut(at + 1, len)?;
        bytes.make_ascii_lowercase();
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn next_name(&mut self, context: &'static str) -> Result<String, VmError> {
        let at = self.word(b' ', self.layout.word)?;
        let name = self.lowercase_counted(at)?;
        if name.is_empty() {
            return Err(VmError::MissingWord(context));
        }
        Ok(name)
    }

    pub(crate) fn char_code(&mut self, context: &'static str) -> Result<Cell, VmError> {
        let at = self.word(b' ', self.layout.word)?;
        if self.mem.byte(at)? == 0 {
            return Err(VmError::MissingWord(context));
        }
        Ok(self.mem.byte(at + 1)? as Cell)
    }

    /// Interprets the rest of the current line.
    pub(crate) fn interpret(&mut self) -> Result<(), VmError> {
        loop {
            let at = self.word(b' ', self.layout.keyword)?;
            let name = self.lowercase_counted(at)?;
            if name.is_empty() {
                return Ok(());
            }
            if self.interpret_word(&name)? {
                continue;
            }
            match parse::parse_number(&name, self.base()?)? {
                Some(value) => match self.mode() {
                    Mode::Executing => self.ps.push(value),
                    Mode::Compiling => self.compile(Token::Literal, Some(value))?,
                },
                None => return Err(ParseError::UnrecognizedWord(name).into()),
            }
        }
    }

    fn interpret_word(&mut self, name: &str) -> Result<bool, VmError> {
        match self.dict.find(&self.mem, name.as_bytes())? {
            Lookup::Immediate(xt) => {
                self.call(xt)?;
                return Ok(true);
            }
            Lookup::Normal(xt) => {
                self.run_or_compile(Token::Call, Some(xt as Cell))?;
                return Ok(true);
            }
            Lookup::NotFound => {}
        }
        if let Some(token) = stdlib::primitive(name) {
            self.run_or_compile(token, None)?;
            return Ok(true);
        }
        if let Some(token) = stdlib::immediate(name) {
            self.compile_action(token)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn run_or_compile(&mut self, token: Token, operand: Option<Cell>) -> Result<(), VmError> {
        match self.mode() {
            Mode::Executing => self.execute(token, operand),
            Mode::Compiling => self.compile(token, operand),
        }
    }

    /// Appends `token` and its variable-length operand at `here`.
    pub(crate) fn compile(&mut self, token: Token, operand: Option<Cell>) -> Result<(), VmError> {
        self.mem.comma_byte(token as u8)?;
        if let Some(value) = operand {
            self.mem.comma_varint(value)?;
        }
        Ok(())
    }

    /// `find ( c-addr -- c-addr 0 | xt 1 | xt -1 )`
    pub(crate) fn find_word(&mut self) -> Result<(), VmError> {
        let at = self.pop_address()?;
        let name = self.lowercase_counted(at)?;
        let found = self.find(&name)?;
        match found.xt() {
            Some(xt) => self.ps.push(xt as Cell),
            None => self.ps.push(at as Cell),
        }
        self.ps.push(found.flag());
        Ok(())
    }

    pub(crate) fn tick(&mut self) -> Result<(), VmError> {
        let name = self.next_name("'")?;
        let xt = self.find(&name)?.xt().ok_or(VmError::WordNotFound(name))?;
        self.ps.push(xt as Cell);
        Ok(())
    }

    pub(crate) fn colon(&mut self) -> Result<(), VmError> {
        let name = self.next_name(":")?;
        self.dict.add(&mut self.mem, name.as_bytes())?;
        self.fixups.clear();
        self.set_mode(Mode::Compiling)?;
        debug!(word = %name, "compiling");
        Ok(())
    }

    pub(crate) fn create(&mut self) -> Result<(), VmError> {
        let name = self.next_name("create")?;
        self.dict.add(&mut self.mem, name.as_bytes())?;
        self.compile(Token::CreatedBody, None)?;
        let body = self.mem.here() + CELL_SIZE;
        self.mem.comma(body as Cell)?;
        Ok(())
    }

    /// Rewrites the newest created word to push its body and then run the
    /// code following `does>`, which is copied out of the running definition.
    /// Returns to the caller of that definition.
    pub(crate) fn does(&mut self, ip: Address) -> Result<Address, VmError> {
        if ip == self.layout.code + CHAR_SIZE {
            return Err(VmError::Compile("does> is only valid inside a definition".into()));
        }
        let xt = match self.dict.last_xt(&self.mem) {
            Err(DictError::Empty) => {
                return Err(VmError::Compile("does> needs a word made by create".into()));
            }
            other => other?,
        };
        if self.token_at(xt)? != Token::CreatedBody {
            return Err(VmError::Compile("does> needs a word made by create".into()));
        }
        let body = self.mem.cell(xt + CHAR_SIZE)?;
        let behavior = self.mem.here();
        if CHAR_SIZE + codec::encoded_len(behavior as Cell) > CHAR_SIZE + CELL_SIZE {
            return Err(VmError::Compile("does> code lies beyond jump range".into()));
        }
        self.mem.set_byte(xt, Token::Jump as u8)?;
        self.mem.set_varint(xt + CHAR_SIZE, behavior as Cell)?;
        self.compile(Token::Literal, Some(body))?;
        self.copy_until_exit(ip)?;
        Ok(to_address(self.rs.pop()?)?)
    }

    fn copy_until_exit(&mut self, mut ip: Address) -> Result<(), VmError> {
        loop {
            let token = self.token_at(ip)?;
            let len = CHAR_SIZE + self.operand_len(token, ip + CHAR_SIZE)?;
            let to = self.mem.reserve(len)?;
            self.mem.copy_within(ip, to, len)?;
            if token == Token::Do {
                // the leave target is absolute, so it moves with the copy
                let after = self.mem.cell(to + CHAR_SIZE)?;
                let moved = after.wrapping_add(to as Cell - ip as Cell);
                self.mem.set_cell(to + CHAR_SIZE, moved)?;
            }
            ip += len;
            if token == Token::Exit {
                return Ok(());
            }
        }
    }

    /// Runs a compile-time word. Returns `false` if `token` is not one.
    pub(crate) fn compile_action(&mut self, token: Token) -> Result<bool, VmError> {
        match token {
            Token::DebugToggle => self.debug = !self.debug,
            Token::BracketChar => {
                let code = self.char_code("[char]")?;
                self.compile(Token::Literal, Some(code))?;
            }
            Token::CompileLiteral => {
                let value = self.ps.pop()?;
                self.compile(Token::Literal, Some(value))?;
            }
            Token::SLiteral => {
                let len = self.pop_address()?;
                let from = self.pop_address()?;
                self.embed_counted(Token::SLiteral, from, len)?;
            }
            Token::CountedString | Token::StringLiteral => self.embed_string(token)?,
            Token::LeftBracket => self.set_mode(Mode::Executing)?,
            Token::RightBracket => self.set_mode(Mode::Compiling)?,
            Token::Semicolon => self.semicolon()?,
            Token::PostponeCall => self.postpone()?,
            Token::Begin => {
                self.require_compiling("begin")?;
                let at = self.mem.here();
                self.fixups.push(Fixup { kind: FixupKind::Begin, at });
            }
            Token::CompileDo => {
                self.require_compiling("do")?;
                self.compile(Token::Do, None)?;
                self.mem.reserve(CELL_SIZE)?;
                let at = self.mem.here();
                self.fixups.push(Fixup { kind: FixupKind::Do, at });
            }
            Token::CompileLoop => self.close_loop(Token::Loop, "loop")?,
            Token::CompilePlusLoop => self.close_loop(Token::PlusLoop, "+loop")?,
            Token::Again => {
                let begin = self.resolve(&[FixupKind::Begin], "again")?;
                self.branch_back(begin)?;
            }
            Token::If => self.branch_forward(FixupKind::If, "if")?,
            Token::While => self.branch_forward(FixupKind::While, "while")?,
            Token::Else => {
                let mark = self.resolve(&[FixupKind::If], "else")?;
                self.compile(Token::Branch, None)?;
                let at = self.mem.reserve(2)?;
                self.patch(mark, at + 2)?;
                self.fixups.push(Fixup { kind: FixupKind::Else, at });
            }
            Token::Then => {
                let mark = self.resolve(&[FixupKind::If, FixupKind::Else], "then")?;
                self.patch(mark, self.mem.here())?;
            }
            Token::Repeat => {
                let mark = self.resolve(&[FixupKind::While], "repeat")?;
                // past the backward branch emitted below
                self.patch(mark, self.mem.here() + 3)?;
                let begin = self.resolve(&[FixupKind::Begin], "repeat")?;
                self.branch_back(begin)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn require_compiling(&self, word: &str) -> Result<(), VmError> {
        match self.mode() {
            Mode::Compiling => Ok(()),
            Mode::Executing => Err(VmError::Compile(format!(
                "{word} is only valid inside a definition"
            ))),
        }
    }

    fn resolve(&mut self, expected: &[FixupKind], word: &str) -> Result<Address, VmError> {
        self.require_compiling(word)?;
        match self.fixups.pop() {
            Some(fixup) if expected.contains(&fixup.kind) => Ok(fixup.at),
            Some(fixup) => Err(VmError::Compile(format!(
                "{word} does not close {}",
                fixup.kind.word()
            ))),
            None => Err(VmError::Compile(format!(
                "{word} without {}",
                expected.first().map_or("an opening word", |kind| kind.word())
            ))),
        }
    }

    fn patch(&mut self, at: Address, target: Address) -> Result<(), VmError> {
        let offset = branch_offset(at, target)?;
        Ok(self.mem.set_short(at, offset)?)
    }

    fn branch_forward(&mut self, kind: FixupKind, word: &str) -> Result<(), VmError> {
        self.require_compiling(word)?;
        self.compile(Token::BranchIfZero, None)?;
        let at = self.mem.reserve(2)?;
        self.fixups.push(Fixup { kind, at });
        Ok(())
    }

    fn branch_back(&mut self, target: Address) -> Result<(), VmError> {
        self.compile(Token::Branch, None)?;
        let at = self.mem.here();
        self.mem.comma_short(branch_offset(at, target)?)?;
        Ok(())
    }

    fn close_loop(&mut self, token: Token, word: &str) -> Result<(), VmError> {
        let mark = self.resolve(&[FixupKind::Do], word)?;
        self.compile(token, None)?;
        let at = self.mem.here();
        self.mem.comma_short(branch_offset(at, mark)?)?;
        let after = self.mem.here();
        self.mem.set_cell(mark - CELL_SIZE, after as Cell)?;
        Ok(())
    }

    fn semicolon(&mut self) -> Result<(), VmError> {
        self.require_compiling(";")?;
        if let Some(open) = self.fixups.last() {
            let word = open.kind.word();
            self.fixups.clear();
            return Err(VmError::Compile(format!("unterminated {word} in definition")));
        }
        self.compile(Token::Exit, None)?;
        self.set_mode(Mode::Executing)
    }

    fn postpone(&mut self) -> Result<(), VmError> {
        let name = self.next_name("postpone")?;
        match self.dict.find(&self.mem, name.as_bytes())? {
            Lookup::Immediate(xt) => return self.compile(Token::Call, Some(xt as Cell)),
            Lookup::Normal(xt) => return self.compile(Token::PostponeCall, Some(xt as Cell)),
            Lookup::NotFound => {}
        }
        if let Some(token) = stdlib::primitive(&name) {
            self.compile(Token::PostponeToken, None)?;
            self.mem.comma_byte(token as u8)?;
            self.mem.comma_byte(Token::Noop as u8)?;
            return Ok(());
        }
        if let Some(token) = stdlib::immediate(&name) {
            self.compile(Token::CallImmediate, None)?;
            self.mem.comma_byte(token as u8)?;
            return Ok(());
        }
        Err(VmError::WordNotFound(name))
    }

    /// `c"` and `s"`: copies the quoted text into code. Interpreted, the
    /// string's address is left on the stack right away.
    fn embed_string(&mut self, token: Token) -> Result<(), VmError> {
        let (from, len) = self.parse_input(b'"')?;
        let at = self.embed_counted(token, from, len)?;
        if self.mode() == Mode::Executing {
            if token == Token::CountedString {
                self.ps.push(at as Cell);
            } else {
                self.ps.push((at + 1) as Cell);
                self.ps.push(len as Cell);
            }
        }
        Ok(())
    }

    fn embed_counted(&mut self, token: Token, from: Address, len: usize) -> Result<Address, VmError> {
        if len > u8::MAX as usize {
            return Err(VmError::Compile(format!(
                "string of {len} bytes is longer than {}",
                u8::MAX
            )));
        }
        self.compile(token, None)?;
        let at = self.mem.reserve(len + 1)?;
        self.mem.set_byte(at, len as u8)?;
        self.mem.copy_within(from, at + 1, len)?;
        Ok(at)
    }
}

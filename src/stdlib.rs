// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

use crate::token::Token;

pub struct PrimitiveDescriptor {
    pub name: &'static str,
    pub token: Token,
}

impl PrimitiveDescriptor {
    pub const fn new(name: &'static str, token: Token) -> Self {
        Self { name, token }
    }
}

/// Words implemented directly by a token. Compiling one of them emits its
/// token; interpreting it runs the token at once.
pub const PRIMITIVES: &[PrimitiveDescriptor] = &[
    PrimitiveDescriptor::new(".", Token::Dot),
    PrimitiveDescriptor::new("count", Token::Count),
    PrimitiveDescriptor::new("words", Token::Words),
    PrimitiveDescriptor::new("testsys", Token::TestSys),
    PrimitiveDescriptor::new("cells", Token::Cells),
    PrimitiveDescriptor::new("allot", Token::Allot),
    PrimitiveDescriptor::new("and", Token::And),
    PrimitiveDescriptor::new("or", Token::Or),
    PrimitiveDescriptor::new("base", Token::Base),
    PrimitiveDescriptor::new("refill", Token::Refill),
    PrimitiveDescriptor::new("interpret", Token::Interpret),
    PrimitiveDescriptor::new("quit", Token::Quit),
    PrimitiveDescriptor::new("word", Token::Word),
    PrimitiveDescriptor::new("parse", Token::Parse),
    PrimitiveDescriptor::new("save", Token::Save),
    PrimitiveDescriptor::new("load", Token::Load),
    PrimitiveDescriptor::new("savesys", Token::SaveSys),
    PrimitiveDescriptor::new("loadsys", Token::LoadSys),
    PrimitiveDescriptor::new("included", Token::Included),
    PrimitiveDescriptor::new(",", Token::Comma),
    PrimitiveDescriptor::new("c,", Token::CComma),
    PrimitiveDescriptor::new("here", Token::Here),
    PrimitiveDescriptor::new("@", Token::Fetch),
    PrimitiveDescriptor::new("c@", Token::CFetch),
    PrimitiveDescriptor::new("pad", Token::Pad),
    PrimitiveDescriptor::new("!", Token::Store),
    PrimitiveDescriptor::new("state", Token::State),
    PrimitiveDescriptor::new("bl", Token::Bl),
    PrimitiveDescriptor::new(":", Token::Colon),
    PrimitiveDescriptor::new("bye", Token::Bye),
    PrimitiveDescriptor::new(".s", Token::DotS),
    PrimitiveDescriptor::new("+", Token::Plus),
    PrimitiveDescriptor::new("-", Token::Minus),
    PrimitiveDescriptor::new("*", Token::Star),
    PrimitiveDescriptor::new("/", Token::Slash),
    PrimitiveDescriptor::new("<", Token::Less),
    PrimitiveDescriptor::new(">", Token::Greater),
    PrimitiveDescriptor::new("=", Token::Equal),
    PrimitiveDescriptor::new("<>", Token::NotEqual),
    PrimitiveDescriptor::new("create", Token::Create),
    PrimitiveDescriptor::new("does>", Token::Does),
    PrimitiveDescriptor::new(">body", Token::ToBody),
    PrimitiveDescriptor::new("rdepth", Token::RDepth),
    PrimitiveDescriptor::new("swap", Token::Swap),
    PrimitiveDescriptor::new("depth", Token::Depth),
    PrimitiveDescriptor::new("over", Token::Over),
    PrimitiveDescriptor::new("dup", Token::Dup),
    PrimitiveDescriptor::new("dup2", Token::TwoDup),
    PrimitiveDescriptor::new("drop", Token::Drop),
    PrimitiveDescriptor::new("drop2", Token::TwoDrop),
    PrimitiveDescriptor::new("*/mod", Token::StarSlashMod),
    PrimitiveDescriptor::new("invert", Token::Invert),
    PrimitiveDescriptor::new("exit", Token::Exit),
    PrimitiveDescriptor::new("i", Token::I),
    PrimitiveDescriptor::new("j", Token::J),
    PrimitiveDescriptor::new(">r", Token::ToR),
    PrimitiveDescriptor::new("r>", Token::FromR),
    PrimitiveDescriptor::new("leave", Token::Leave),
    PrimitiveDescriptor::new("immediate", Token::Immediate),
    PrimitiveDescriptor::new("source", Token::Source),
    PrimitiveDescriptor::new("type", Token::Type),
    PrimitiveDescriptor::new("emit", Token::Emit),
    PrimitiveDescriptor::new("cr", Token::Cr),
    PrimitiveDescriptor::new("char", Token::Char),
    PrimitiveDescriptor::new(">in", Token::ToIn),
    PrimitiveDescriptor::new("find", Token::Find),
    PrimitiveDescriptor::new("execute", Token::Execute),
    PrimitiveDescriptor::new("'", Token::Tick),
    PrimitiveDescriptor::new("host>type", Token::HostType),
    PrimitiveDescriptor::new("host>method", Token::HostMethod),
    PrimitiveDescriptor::new("host>call", Token::HostCall),
    PrimitiveDescriptor::new(".net>type", Token::HostType),
    PrimitiveDescriptor::new(".net>method", Token::HostMethod),
    PrimitiveDescriptor::new(".net>call", Token::HostCall),
];

/// Words that run at compile time, even inside a definition.
pub const IMMEDIATES: &[PrimitiveDescriptor] = &[
    PrimitiveDescriptor::new("debug", Token::DebugToggle),
    PrimitiveDescriptor::new("[char]", Token::BracketChar),
    PrimitiveDescriptor::new("literal", Token::CompileLiteral),
    PrimitiveDescriptor::new("sliteral", Token::SLiteral),
    PrimitiveDescriptor::new("[", Token::LeftBracket),
    PrimitiveDescriptor::new("]", Token::RightBracket),
    PrimitiveDescriptor::new(";", Token::Semicolon),
    PrimitiveDescriptor::new("postpone", Token::PostponeCall),
    PrimitiveDescriptor::new("begin", Token::Begin),
    PrimitiveDescriptor::new("do", Token::CompileDo),
    PrimitiveDescriptor::new("loop", Token::CompileLoop),
    PrimitiveDescriptor::new("+loop", Token::CompilePlusLoop),
    PrimitiveDescriptor::new("again", Token::Again),
    PrimitiveDescriptor::new("if", Token::If),
    PrimitiveDescriptor::new("else", Token::Else),
    PrimitiveDescriptor::new("then", Token::Then),
    PrimitiveDescriptor::new("while", Token::While),
    PrimitiveDescriptor::new("repeat", Token::Repeat),
    PrimitiveDescriptor::new("c\"", Token::CountedString),
    PrimitiveDescriptor::new("s\"", Token::StringLiteral),
];

/// Forth source evaluated by every new VM.
pub const PRELUDE: &str = include_str!("forth/prelude.fth");

/// The preliminary test suite run by `testsys`.
pub const PRELIMINARY_TESTS: &str = include_str!("forth/prelim.fth");

fn lookup(table: &[PrimitiveDescriptor], name: &str) -> Option<Token> {
    table
        .iter()
        .find(|descriptor| descriptor.name == name)
        .map(|descriptor| descriptor.token)
}

pub fn primitive(name: &str) -> Option<Token> {
    lookup(PRIMITIVES, name)
}

pub fn immediate(name: &str) -> Option<Token> {
    lookup(IMMEDIATES, name)
}

/// Name of a token for listings, preferring the first table entry.
pub fn name_of(token: Token) -> Option<&'static str> {
    PRIMITIVES
        .iter()
        .chain(IMMEDIATES)
        .find(|descriptor| descriptor.token == token)
        .map(|descriptor| descriptor.name)
}

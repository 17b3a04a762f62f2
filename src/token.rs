// Tokforth © 2025 Huly Labs • https://hulylabs.com • SPDX-License-Identifier: MIT

//! One-byte tokens and the operands that follow them in compiled code.
//!
//! Token values are part of the image format: a saved arena only loads back
//! correctly into a build that numbers the tokens the same way. New tokens go
//! at the end.

/// Kind of inline operand following a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// A single token byte.
    Byte,
    /// 2-byte signed offset, relative to the offset's own address.
    Short,
    /// Fixed-size cell, so it can be patched in place.
    Cell,
    /// Variable-length cell.
    VarInt,
    /// Counted string: one length byte, then the bytes.
    Str,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Invalid,
    Colon,
    Does,
    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    Base,
    Noop,
    Count,
    Word,
    Parse,
    Refill,
    Comma,
    CComma,
    Here,
    Fetch,
    Store,
    State,
    Bl,
    Dup,
    Exit,
    Immediate,
    Swap,
    TwoDup,
    Drop,
    TwoDrop,
    Find,
    Bye,
    DotS,
    Interpret,
    Quit,
    Create,
    ToBody,
    RDepth,
    Depth,
    Less,
    Words,
    TestSys,
    Greater,
    Equal,
    NotEqual,
    Do,
    Loop,
    PlusLoop,
    ToR,
    FromR,
    I,
    J,
    Leave,
    Cr,
    Source,
    Type,
    Emit,
    Char,
    ToIn,
    Over,
    And,
    Or,
    Allot,
    Cells,
    Execute,
    Invert,
    StarSlashMod,
    Save,
    Load,
    SaveSys,
    LoadSys,
    Included,
    HostType,
    HostCall,
    HostMethod,
    CFetch,
    Pad,
    // compile-time actions
    DebugToggle,
    Semicolon,
    Begin,
    CompileDo,
    CompileLoop,
    CompilePlusLoop,
    Again,
    If,
    Else,
    Then,
    While,
    Repeat,
    LeftBracket,
    RightBracket,
    // tokens with inline operands
    BranchIfZero,
    Branch,
    CallImmediate,
    PostponeToken,
    CreatedBody,
    Jump,
    Literal,
    Call,
    PostponeCall,
    CompileLiteral,
    BracketChar,
    CountedString,
    StringLiteral,
    SLiteral,
    Tick,
}

impl Token {
    /// Every token, indexed by its byte value.
    pub const ALL: [Token; 104] = {
        use Token::*;
        [
            Invalid, Colon, Does, Plus, Minus, Star, Slash, Dot, Base, Noop,
            Count, Word, Parse, Refill, Comma, CComma, Here, Fetch, Store, State,
            Bl, Dup, Exit, Immediate, Swap, TwoDup, Drop, TwoDrop, Find, Bye,
            DotS, Interpret, Quit, Create, ToBody, RDepth, Depth, Less, Words, TestSys,
            Greater, Equal, NotEqual, Do, Loop, PlusLoop, ToR, FromR, I, J,
            Leave, Cr, Source, Type, Emit, Char, ToIn, Over, And, Or,
            Allot, Cells, Execute, Invert, StarSlashMod, Save, Load, SaveSys, LoadSys, Included,
            HostType, HostCall, HostMethod, CFetch, Pad, DebugToggle, Semicolon, Begin, CompileDo, CompileLoop,
            CompilePlusLoop, Again, If, Else, Then, While, Repeat, LeftBracket, RightBracket, BranchIfZero,
            Branch, CallImmediate, PostponeToken, CreatedBody, Jump, Literal, Call, PostponeCall, CompileLiteral, BracketChar,
            CountedString, StringLiteral, SLiteral, Tick,
        ]
    };

    pub fn from_byte(byte: u8) -> Option<Token> {
        Self::ALL.get(byte as usize).copied()
    }

    pub const fn operand(self) -> Operand {
        use Token::*;
        match self {
            BranchIfZero | Branch | Loop | PlusLoop => Operand::Short,
            CallImmediate => Operand::Byte,
            // the postponed token is followed by a padding Noop
            PostponeToken => Operand::Short,
            Do | CreatedBody => Operand::Cell,
            Jump | Literal | Call | PostponeCall => Operand::VarInt,
            CountedString | StringLiteral | SLiteral => Operand::Str,
            // these read their argument from the input stream, not from code
            CompileLiteral | BracketChar => Operand::None,
            _ => Operand::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_discriminants() {
        for (i, token) in Token::ALL.iter().enumerate() {
            assert_eq!(*token as usize, i, "{token:?}");
            assert_eq!(Token::from_byte(i as u8), Some(*token));
        }
        assert_eq!(Token::from_byte(Token::ALL.len() as u8), None);
    }

    #[test]
    fn test_pinned_values() {
        assert_eq!(Token::Invalid as u8, 0);
        assert_eq!(Token::Exit as u8, 22);
        assert_eq!(Token::BranchIfZero as u8, 89);
        assert_eq!(Token::CreatedBody as u8, 93);
        assert_eq!(Token::SLiteral as u8, 102);
    }

    #[test]
    fn test_operand_kinds() {
        assert_eq!(Token::Do.operand(), Operand::Cell);
        assert_eq!(Token::Loop.operand(), Operand::Short);
        assert_eq!(Token::Call.operand(), Operand::VarInt);
        assert_eq!(Token::StringLiteral.operand(), Operand::Str);
        assert_eq!(Token::Dup.operand(), Operand::None);
    }
}

//! The instruction repertoire and its encoding
//!
//! Bytecode is a flat sequence of words: an opcode word followed by zero,
//! one or two inline immediate words. `imm_words` is the only description of
//! that layout; every scanner in the system derives its stride from it.

use crate::word::Word;
use std::fmt;

/// One opcode of the zero-address instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    Nop,
    Push,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Move,
    Load,
    Store,
    Print,
    PrintChar,
    Deref,
    Refer,
    Where,
    Offset,
    Index,
    Set,
    Function,
    Call,
    Return,
    While,
    If,
    Else,
    EndBlock,
    OrAssign,
    AndAssign,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    Lsh,
    Lrsh,
    Arsh,
    Gez,
    Halt,
}

impl OpCode {
    /// All opcodes in encoding order. An opcode word is its index here.
    pub const ALL: [OpCode; 36] = [
        OpCode::Nop,
        OpCode::Push,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Rem,
        OpCode::Move,
        OpCode::Load,
        OpCode::Store,
        OpCode::Print,
        OpCode::PrintChar,
        OpCode::Deref,
        OpCode::Refer,
        OpCode::Where,
        OpCode::Offset,
        OpCode::Index,
        OpCode::Set,
        OpCode::Function,
        OpCode::Call,
        OpCode::Return,
        OpCode::While,
        OpCode::If,
        OpCode::Else,
        OpCode::EndBlock,
        OpCode::OrAssign,
        OpCode::AndAssign,
        OpCode::Not,
        OpCode::BitAnd,
        OpCode::BitOr,
        OpCode::BitXor,
        OpCode::Lsh,
        OpCode::Lrsh,
        OpCode::Arsh,
        OpCode::Gez,
        OpCode::Halt,
    ];

    /// Decode an opcode from its bytecode word.
    pub fn from_word(w: Word) -> Option<OpCode> {
        usize::try_from(w).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// The bytecode word encoding this opcode.
    pub fn to_word(self) -> Word {
        Self::ALL.iter().position(|op| *op == self).unwrap_or(0) as Word
    }

    /// How many inline immediate words follow the opcode word.
    ///
    /// `Push` and `Set` carry a type tag word plus a value word. The five
    /// 1-immediate ops carry a signed delta, a function index or a code
    /// position. Everything else is a bare opcode.
    pub fn imm_words(self) -> usize {
        match self {
            OpCode::Push | OpCode::Set => 2,
            OpCode::Move
            | OpCode::Offset
            | OpCode::Function
            | OpCode::Call
            | OpCode::While => 1,
            _ => 0,
        }
    }

    /// Total encoded length in words, opcode included.
    pub fn encoded_len(self) -> usize {
        1 + self.imm_words()
    }

    /// The assembly mnemonic, as the parser accepts it and the disassembler
    /// prints it.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Push => "push",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Mul => "mul",
            OpCode::Div => "div",
            OpCode::Rem => "rem",
            OpCode::Move => "move",
            OpCode::Load => "load",
            OpCode::Store => "store",
            OpCode::Print => "print",
            OpCode::PrintChar => "printchar",
            OpCode::Deref => "deref",
            OpCode::Refer => "refer",
            OpCode::Where => "where",
            OpCode::Offset => "offset",
            OpCode::Index => "index",
            OpCode::Set => "set",
            OpCode::Function => "func",
            OpCode::Call => "call",
            OpCode::Return => "ret",
            OpCode::While => "while",
            OpCode::If => "if",
            OpCode::Else => "else",
            OpCode::EndBlock => "end",
            OpCode::OrAssign => "or",
            OpCode::AndAssign => "and",
            OpCode::Not => "not",
            OpCode::BitAnd => "bitand",
            OpCode::BitOr => "bitor",
            OpCode::BitXor => "bitxor",
            OpCode::Lsh => "lsh",
            OpCode::Lrsh => "lrsh",
            OpCode::Arsh => "arsh",
            OpCode::Gez => "gez",
            OpCode::Halt => "halt",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_encoding_round_trips() {
        for op in OpCode::ALL {
            assert_eq!(OpCode::from_word(op.to_word()), Some(op));
        }
        assert_eq!(OpCode::from_word(-1), None);
        assert_eq!(OpCode::from_word(OpCode::ALL.len() as Word), None);
    }

    #[test]
    fn immediate_widths_match_the_encoding() {
        assert_eq!(OpCode::Push.encoded_len(), 3);
        assert_eq!(OpCode::Set.encoded_len(), 3);
        for op in [
            OpCode::Move,
            OpCode::Offset,
            OpCode::Function,
            OpCode::Call,
            OpCode::While,
        ] {
            assert_eq!(op.encoded_len(), 2);
        }
        for op in [OpCode::Add, OpCode::Load, OpCode::Halt, OpCode::EndBlock] {
            assert_eq!(op.encoded_len(), 1);
        }
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut names: Vec<_> = OpCode::ALL.iter().map(|op| op.mnemonic()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), OpCode::ALL.len());
    }
}

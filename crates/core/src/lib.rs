//! RRVM Core: shared primitives for the RRVM bytecode
//!
//! This crate provides the language-agnostic pieces shared by the assembler,
//! the interpreter, and the TAC lowering backend:
//!
//! - `Word`: the uniform 64-bit storage slot every value lives in
//! - `TypeTag`: primitive type tags carried alongside words
//! - `OpCode`: the instruction repertoire plus its encoding widths
//! - `disasm`: a bytecode disassembler for diagnostics
//!
//! The per-opcode immediate-width table (`OpCode::imm_words`) lives here and
//! nowhere else. The dispatcher, the forward block scanners, the disassembler
//! and the lowering backend all consult it, so the encoding cannot drift
//! between consumers.

pub mod disasm;
pub mod opcode;
pub mod types;
pub mod word;

pub use disasm::disasm;
pub use opcode::OpCode;
pub use types::TypeTag;
pub use word::{Word, f32_to_word, f64_to_word, word_to_f32, word_to_f64};

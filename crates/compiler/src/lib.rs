//! RRVM Compiler Library
//!
//! Provides the textual frontend (lexer + assembler) and the TAC lowering
//! backend for RRVM programs.
//!
//! The usual pipeline:
//!
//! ```rust,ignore
//! let vm = rrc::assemble(source)?;          // text -> bytecode
//! rr_runtime::run(&mut vm, &mut Interp::new());  // execute
//! // or:
//! let tac = rrc::codegen::lower(&mut vm);   // bytecode -> TAC
//! let text = rrc::codegen::serialize(&tac); // TAC -> clause blocks
//! ```
//!
//! Lowering and execution share the dispatcher in `rr-runtime`: the TAC
//! backend is a second interpretation of the same instruction sequence, not
//! a separate pass over the bytecode.

pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;

pub use codegen::{TacProgram, lower, serialize};
pub use error::ParseError;
pub use parser::Parser;

use rr_runtime::{RunConfig, Vm};

/// Assemble a source into a ready-to-run VM with default state sizes.
pub fn assemble(source: &str) -> Result<Vm, ParseError> {
    Parser::new(source).parse()
}

/// Assemble with explicit state sizes.
pub fn assemble_with_config(source: &str, config: RunConfig) -> Result<Vm, ParseError> {
    Parser::new(source).parse_with_config(config)
}

/// Assemble, lower and serialize in one step: source text to the clause
/// form the downstream rewriter consumes.
pub fn lower_source(source: &str) -> Result<String, ParseError> {
    let mut vm = assemble(source)?;
    let tac = lower(&mut vm);
    Ok(serialize(&tac))
}

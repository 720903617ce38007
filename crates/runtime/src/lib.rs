//! RRVM Runtime: the virtual machine proper
//!
//! This crate owns everything that happens after parsing:
//!
//! - `vm`: the machine state (value stack, typed tape, pointer history,
//!   call frames, block stack, function table) with checked accessors
//! - `dispatch`: the structural execution loop and the `Backend` trait
//! - `interp`: the evaluating backend that gives opcodes their meaning
//! - `config`: tunable state sizes, loadable from TOML
//!
//! The dispatcher is deliberately free of semantics; a backend is the only
//! place behavior lives. Frontends construct a `Vm` (the parser does this),
//! pick a backend and call `dispatch::run`.
//!
//! Invariant violations at runtime (type mismatches, stack or tape bounds,
//! division by zero) are programming errors in the executed program and
//! panic with a descriptive message. User-facing errors belong to the
//! frontend, which reports them as values.

pub mod config;
pub mod dispatch;
pub mod interp;
pub mod vm;

pub use config::RunConfig;
pub use dispatch::{Backend, run};
pub use interp::Interp;
pub use vm::{Block, Cell, Frame, Vm};

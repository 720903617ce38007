//! TAC serialization
//!
//! Renders a lowered program as labelled clause blocks:
//!
//! ```text
//! l0 :-
//!   const(t0, i64, 3),
//!   print(t0).
//! ```
//!
//! A block starts at a `label` instruction or at the program start (the
//! implicit `l0`); `ret` terminates its block early, and the next
//! non-label instruction opens a fresh implicit `l0` block. A label with no
//! goals is written as the bare fact `l<N>.` so every jump target exists in
//! the output. This surface form is consumed verbatim by the downstream
//! rewrite passes.

use super::instr::{LabelId, TacInstr, TacProgram};
use rr_core::{TypeTag, word_to_f32, word_to_f64};
use std::fmt::Write as _;

pub fn serialize(prog: &TacProgram) -> String {
    let mut out = String::new();
    let mut head: LabelId = 0;
    let mut explicit = false;
    let mut goals: Vec<String> = Vec::new();

    for instr in &prog.instrs {
        match instr {
            TacInstr::Label(l) => {
                flush(&mut out, head, explicit, &mut goals);
                head = *l;
                explicit = true;
            }
            TacInstr::Ret => {
                goals.push("ret".to_string());
                flush(&mut out, head, explicit, &mut goals);
                head = 0;
                explicit = false;
            }
            other => goals.push(goal(other)),
        }
    }
    flush(&mut out, head, explicit, &mut goals);
    out
}

fn flush(out: &mut String, head: LabelId, explicit: bool, goals: &mut Vec<String>) {
    if goals.is_empty() && !explicit {
        return;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    if goals.is_empty() {
        let _ = writeln!(out, "l{}.", head);
        return;
    }
    let _ = writeln!(out, "l{} :-", head);
    let last = goals.len() - 1;
    for (i, g) in goals.iter().enumerate() {
        let sep = if i == last { '.' } else { ',' };
        let _ = writeln!(out, "  {}{}", g, sep);
    }
    goals.clear();
}

fn goal(instr: &TacInstr) -> String {
    match *instr {
        TacInstr::Const { dst, ty, imm } if ty.is_float() => {
            if ty == TypeTag::F32 {
                format!(
                    "const(t{}, {}, {:#x} /* {} */)",
                    dst,
                    ty,
                    imm as u32,
                    word_to_f32(imm)
                )
            } else {
                format!(
                    "const(t{}, {}, {:#x} /* {} */)",
                    dst,
                    ty,
                    imm as u64,
                    word_to_f64(imm)
                )
            }
        }
        TacInstr::Const { dst, ty, imm } => format!("const(t{}, {}, {})", dst, ty, imm),
        TacInstr::Bin {
            op,
            dst,
            ty,
            lhs,
            rhs,
        } => format!("{}(t{}, {}, t{}, t{})", op.name(), dst, ty, lhs, rhs),
        TacInstr::Un { op, dst, src } => format!("{}(t{}, bool, t{})", op.name(), dst, src),
        TacInstr::Move { delta } => format!("move({})", delta),
        TacInstr::Load { dst } => format!("load(t{})", dst),
        TacInstr::Store { src } => format!("store(t{})", src),
        TacInstr::Print { src } => format!("print(t{})", src),
        TacInstr::PrintChar { src } => format!("printchar(t{})", src),
        TacInstr::Deref { dst, src } => format!("deref(t{}, t{})", dst, src),
        TacInstr::Refer { dst, src } => format!("refer(t{}, t{})", dst, src),
        TacInstr::Where { dst } => format!("where(t{})", dst),
        TacInstr::Offset { dst, src, delta } => {
            format!("offset(t{}, t{}, {})", dst, src, delta)
        }
        TacInstr::Index { dst, src, step } => {
            format!("index(t{}, t{}, t{})", dst, src, step)
        }
        TacInstr::Set { ptr, val } => format!("set(t{}, t{})", ptr, val),
        TacInstr::Jmp(l) => format!("jmp(l{})", l),
        TacInstr::Jz { cond, target } => format!("jz(t{}, l{})", cond, target),
        TacInstr::Call { dst, target } => format!("call(l{}, t{})", target, dst),
        TacInstr::Label(_) | TacInstr::Ret => unreachable!("handled by the block loop"),
    }
}

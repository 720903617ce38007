//! The evaluating backend
//!
//! Gives every opcode its runtime meaning against the VM state. Operand
//! types are strict: binary operations require both stack tags to agree,
//! and any bound or shape violation panics (these are bugs in the executed
//! program, not recoverable conditions).
//!
//! Output goes through an owned writer so tests can capture it; the default
//! is stdout.

use crate::dispatch::Backend;
use crate::vm::{Block, Cell, Frame, Vm};
use rr_core::{TypeTag, Word, word_to_f32, word_to_f64};
use std::io::{self, Stdout, Write};

/// The interpreter.
pub struct Interp<W: Write = Stdout> {
    out: W,
}

impl Interp<Stdout> {
    pub fn new() -> Self {
        Interp { out: io::stdout() }
    }
}

impl Default for Interp<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interp<W> {
    /// Interpreter writing to an arbitrary sink (a buffer under test).
    pub fn with_output(out: W) -> Self {
        Interp { out }
    }

    /// Recover the sink, e.g. to inspect captured output.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Pop both operands of a binary op, enforcing tag agreement.
    /// Returns (left, right).
    fn pop_pair(&mut self, vm: &mut Vm) -> (Cell, Cell) {
        let rhs = vm.pop();
        let lhs = vm.pop();
        assert!(
            lhs.tag == rhs.tag,
            "operand type mismatch at ip {}: {} vs {}",
            vm.ip,
            lhs.tag,
            rhs.tag
        );
        (lhs, rhs)
    }

    /// Binary word arithmetic; the result keeps the left operand's tag.
    fn binary(&mut self, vm: &mut Vm, f: impl Fn(Word, Word) -> Word) {
        let (lhs, rhs) = self.pop_pair(vm);
        vm.push(Cell::new(f(lhs.word, rhs.word), lhs.tag));
    }

    /// Binary logical op; the result is a bool.
    fn logical(&mut self, vm: &mut Vm, f: impl Fn(bool, bool) -> bool) {
        let (lhs, rhs) = self.pop_pair(vm);
        vm.push(Cell::new(
            Word::from(f(lhs.word != 0, rhs.word != 0)),
            TypeTag::Bool,
        ));
    }
}

impl<W: Write> Backend for Interp<W> {
    fn op_nop(&mut self, _vm: &mut Vm) {}

    fn op_push(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word) {
        vm.push(Cell::new(imm, tag));
    }

    fn op_add(&mut self, vm: &mut Vm) {
        self.binary(vm, Word::wrapping_add);
    }

    fn op_sub(&mut self, vm: &mut Vm) {
        self.binary(vm, Word::wrapping_sub);
    }

    fn op_mul(&mut self, vm: &mut Vm) {
        self.binary(vm, Word::wrapping_mul);
    }

    fn op_div(&mut self, vm: &mut Vm) {
        let (lhs, rhs) = self.pop_pair(vm);
        assert!(rhs.word != 0, "division by zero at ip {}", vm.ip);
        vm.push(Cell::new(lhs.word.wrapping_div(rhs.word), lhs.tag));
    }

    fn op_rem(&mut self, vm: &mut Vm) {
        let (lhs, rhs) = self.pop_pair(vm);
        assert!(rhs.word != 0, "remainder by zero at ip {}", vm.ip);
        vm.push(Cell::new(lhs.word.wrapping_rem(rhs.word), lhs.tag));
    }

    fn op_move(&mut self, vm: &mut Vm, delta: Word) {
        vm.move_tp(delta);
    }

    fn op_load(&mut self, vm: &mut Vm) {
        let cell = vm.tape_cell();
        vm.push(cell);
    }

    fn op_store(&mut self, vm: &mut Vm) {
        let cell = vm.pop();
        vm.set_tape_cell(cell);
    }

    fn op_print(&mut self, vm: &mut Vm) {
        let cell = vm.pop();
        let result = match cell.tag {
            t if t.is_unsigned() => writeln!(self.out, "{}", cell.word as u64),
            TypeTag::F32 => writeln!(self.out, "{}", word_to_f32(cell.word)),
            TypeTag::F64 => writeln!(self.out, "{}", word_to_f64(cell.word)),
            _ => writeln!(self.out, "{}", cell.word),
        };
        result.expect("write to output");
    }

    fn op_printchar(&mut self, vm: &mut Vm) {
        let cell = vm.pop();
        self.out
            .write_all(&[cell.word as u8])
            .expect("write to output");
    }

    fn op_deref(&mut self, vm: &mut Vm) {
        let target = vm.tape_cell().word;
        vm.push_ptr_history(vm.tp);
        vm.jump_tp(target);
    }

    fn op_refer(&mut self, vm: &mut Vm) {
        let prior = vm.pop_ptr_history();
        vm.tp = prior;
    }

    fn op_where(&mut self, vm: &mut Vm) {
        vm.push(Cell::new(vm.tp as Word, TypeTag::Ptr));
    }

    fn op_offset(&mut self, vm: &mut Vm, delta: Word) {
        vm.move_tp(delta);
    }

    fn op_index(&mut self, vm: &mut Vm) {
        let delta = vm.tape_cell().word;
        vm.move_tp(delta);
    }

    fn op_set(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word) {
        vm.set_tape_cell(Cell::new(imm, tag));
    }

    fn op_function(&mut self, vm: &mut Vm, idx: Word) {
        // `ip` already points at the first body instruction; record it and
        // skip the body - functions only run when called.
        vm.define_function(idx, vm.ip);
        let (after, _) = vm.scan_block_end(vm.ip, false);
        vm.ip = after;
    }

    fn op_call(&mut self, vm: &mut Vm, idx: Word) {
        vm.push_frame(Frame {
            return_ip: vm.ip,
            fp: vm.fp,
        });
        vm.fp = vm.sp();
        vm.ip = vm.function_ip(idx);
    }

    fn op_return(&mut self, vm: &mut Vm) {
        let result = if vm.sp() > vm.fp {
            vm.pop()
        } else {
            Cell::new(0, TypeTag::I64)
        };
        vm.unwind_to_fp();
        let frame = vm.pop_frame();
        vm.ip = frame.return_ip;
        vm.fp = frame.fp;
        vm.push(result);
    }

    fn op_while(&mut self, vm: &mut Vm, cond_ip: Word) {
        let cond = vm.pop();
        if cond.word != 0 {
            vm.push_block(Block::While {
                cond_ip: cond_ip as usize,
            });
        } else {
            let (after, _) = vm.scan_block_end(vm.ip, false);
            vm.ip = after;
        }
    }

    fn op_if(&mut self, vm: &mut Vm) {
        let cond = vm.pop();
        if cond.word != 0 {
            vm.push_block(Block::If);
        } else {
            let (after, stopped_at_else) = vm.scan_block_end(vm.ip, true);
            vm.ip = after;
            if stopped_at_else {
                // we are about to execute the else arm; its `end` will pop
                vm.push_block(Block::Else);
            }
        }
    }

    fn op_else(&mut self, vm: &mut Vm) {
        // reached by falling out of a taken then-arm
        match vm.pop_block() {
            Block::If => {}
            other => panic!("else closing a {:?} block at ip {}", other, vm.ip),
        }
        let (after, _) = vm.scan_block_end(vm.ip, false);
        vm.ip = after;
    }

    fn op_end(&mut self, vm: &mut Vm) {
        match vm.pop_block() {
            Block::While { cond_ip } => vm.ip = cond_ip,
            Block::If | Block::Else | Block::Function => {}
        }
    }

    fn op_or(&mut self, vm: &mut Vm) {
        self.logical(vm, |a, b| a || b);
    }

    fn op_and(&mut self, vm: &mut Vm) {
        self.logical(vm, |a, b| a && b);
    }

    fn op_not(&mut self, vm: &mut Vm) {
        let cell = vm.pop();
        vm.push(Cell::new(Word::from(cell.word == 0), TypeTag::Bool));
    }

    fn op_bitand(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| a & b);
    }

    fn op_bitor(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| a | b);
    }

    fn op_bitxor(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| a ^ b);
    }

    fn op_lsh(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| a.wrapping_shl(b as u32));
    }

    fn op_lrsh(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| ((a as u64).wrapping_shr(b as u32)) as Word);
    }

    fn op_arsh(&mut self, vm: &mut Vm) {
        self.binary(vm, |a, b| a.wrapping_shr(b as u32));
    }

    fn op_gez(&mut self, vm: &mut Vm) {
        let cell = vm.pop();
        vm.push(Cell::new(Word::from(cell.word >= 0), TypeTag::Bool));
    }

    fn op_halt(&mut self, _vm: &mut Vm) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::run;
    use rr_core::{OpCode, f64_to_word};

    fn exec(code: Vec<Word>) -> (Vm, String) {
        let mut vm = Vm::new(code);
        let mut interp = Interp::with_output(Vec::new());
        run(&mut vm, &mut interp);
        let out = String::from_utf8(interp.into_output()).unwrap();
        (vm, out)
    }

    fn push(ty: TypeTag, v: Word) -> Vec<Word> {
        vec![OpCode::Push.to_word(), ty.to_word(), v]
    }

    #[test]
    fn arithmetic_keeps_the_left_tag() {
        let mut code = push(TypeTag::I32, 10);
        code.extend(push(TypeTag::I32, 3));
        code.push(OpCode::Sub.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(7, TypeTag::I32));
    }

    #[test]
    #[should_panic(expected = "operand type mismatch")]
    fn mixed_operand_tags_fault() {
        let mut code = push(TypeTag::I32, 1);
        code.extend(push(TypeTag::I64, 2));
        code.push(OpCode::Add.to_word());
        exec(code);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn zero_divisor_faults() {
        let mut code = push(TypeTag::I64, 1);
        code.extend(push(TypeTag::I64, 0));
        code.push(OpCode::Div.to_word());
        exec(code);
    }

    #[test]
    fn shifts_distinguish_logical_and_arithmetic() {
        let mut code = push(TypeTag::I64, -8);
        code.extend(push(TypeTag::I64, 1));
        code.push(OpCode::Arsh.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop().word, -4);

        let mut code = push(TypeTag::I64, -8);
        code.extend(push(TypeTag::I64, 1));
        code.push(OpCode::Lrsh.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop().word, ((-8i64 as u64) >> 1) as i64);
    }

    #[test]
    fn logical_ops_produce_bools() {
        let mut code = push(TypeTag::I64, 5);
        code.extend(push(TypeTag::I64, 0));
        code.push(OpCode::OrAssign.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(1, TypeTag::Bool));

        let mut code = push(TypeTag::I64, -3);
        code.push(OpCode::Gez.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(0, TypeTag::Bool));
    }

    #[test]
    fn print_respects_tags() {
        let mut code = push(TypeTag::U8, 200);
        code.push(OpCode::Print.to_word());
        code.extend(push(TypeTag::F64, f64_to_word(1.5)));
        code.push(OpCode::Print.to_word());
        code.extend(push(TypeTag::I64, -7));
        code.push(OpCode::Print.to_word());
        let (_, out) = exec(code);
        assert_eq!(out, "200\n1.5\n-7\n");
    }

    #[test]
    fn printchar_writes_raw_bytes() {
        let mut code = push(TypeTag::I64, b'h' as Word);
        code.push(OpCode::PrintChar.to_word());
        code.extend(push(TypeTag::I64, b'i' as Word));
        code.push(OpCode::PrintChar.to_word());
        let (_, out) = exec(code);
        assert_eq!(out, "hi");
    }

    #[test]
    fn store_and_load_round_trip_tags() {
        let mut code = push(TypeTag::Bool, 1);
        code.push(OpCode::Store.to_word());
        code.push(OpCode::Load.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(1, TypeTag::Bool));
    }

    #[test]
    fn deref_refer_nest_through_history() {
        // set ptr 2 | deref | set i64 9 | refer | where
        let mut code = vec![OpCode::Set.to_word(), TypeTag::Ptr.to_word(), 2];
        code.push(OpCode::Deref.to_word());
        code.extend([OpCode::Set.to_word(), TypeTag::I64.to_word(), 9]);
        code.push(OpCode::Refer.to_word());
        code.push(OpCode::Where.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(0, TypeTag::Ptr));
        assert_eq!(vm.tp, 0);
    }

    #[test]
    fn index_shifts_by_the_cell_value() {
        let mut code = vec![OpCode::Set.to_word(), TypeTag::I64.to_word(), 3];
        code.push(OpCode::Index.to_word());
        code.push(OpCode::Where.to_word());
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop().word, 3);
    }

    #[test]
    fn if_true_takes_the_then_arm() {
        let mut code = push(TypeTag::I64, 1);
        code.push(OpCode::If.to_word());
        code.extend(push(TypeTag::I64, 100));
        code.push(OpCode::Print.to_word());
        code.push(OpCode::Else.to_word());
        code.extend(push(TypeTag::I64, 200));
        code.push(OpCode::Print.to_word());
        code.push(OpCode::EndBlock.to_word());
        let (_, out) = exec(code);
        assert_eq!(out, "100\n");
    }

    #[test]
    fn if_false_takes_the_else_arm() {
        let mut code = push(TypeTag::I64, 0);
        code.push(OpCode::If.to_word());
        code.extend(push(TypeTag::I64, 100));
        code.push(OpCode::Print.to_word());
        code.push(OpCode::Else.to_word());
        code.extend(push(TypeTag::I64, 200));
        code.push(OpCode::Print.to_word());
        code.push(OpCode::EndBlock.to_word());
        let (_, out) = exec(code);
        assert_eq!(out, "200\n");
    }

    #[test]
    fn if_false_without_else_skips_the_block() {
        let mut code = push(TypeTag::I64, 0);
        code.push(OpCode::If.to_word());
        code.extend(push(TypeTag::I64, 100));
        code.push(OpCode::Print.to_word());
        code.push(OpCode::EndBlock.to_word());
        code.extend(push(TypeTag::I64, 5));
        code.push(OpCode::Print.to_word());
        let (_, out) = exec(code);
        assert_eq!(out, "5\n");
    }

    #[test]
    fn empty_return_pushes_zero() {
        // func 0 | ret | end | call 0 | print
        let code = vec![
            OpCode::Function.to_word(),
            0,
            OpCode::Return.to_word(),
            OpCode::EndBlock.to_word(),
            OpCode::Call.to_word(),
            0,
            OpCode::Print.to_word(),
        ];
        let (_, out) = exec(code);
        assert_eq!(out, "0\n");
    }

    #[test]
    fn call_discards_function_locals() {
        // func 0: push 1, push 2, push 3, ret -- only the 3 survives
        let code: Vec<Word> = [
            vec![OpCode::Function.to_word(), 0],
            push(TypeTag::I64, 1),
            push(TypeTag::I64, 2),
            push(TypeTag::I64, 3),
            vec![OpCode::Return.to_word(), OpCode::EndBlock.to_word()],
            vec![OpCode::Call.to_word(), 0],
        ]
        .concat();
        let (mut vm, _) = exec(code);
        assert_eq!(vm.pop(), Cell::new(3, TypeTag::I64));
        assert_eq!(vm.sp(), 0);
    }
}

//! Per-opcode lowering hooks
//!
//! Each hook mirrors the interpreter's stack discipline on the shadow stack
//! and appends the corresponding three-address instructions. Binary results
//! inherit the left operand's type; logical results are bool; loads are
//! `unknown` until a later pass sharpens them.

use super::instr::{TacBinOp, TacInstr, TacUnOp};
use super::{TacBlock, TacGen};
use rr_core::{OpCode, TypeTag, Word};
use rr_runtime::{Backend, Vm};

impl TacGen {
    fn binary(&mut self, vm: &Vm, op: OpCode, bin: TacBinOp) {
        self.mark(vm, op);
        let rhs = self.pop_temp();
        let lhs = self.pop_temp();
        let ty = self.temp_type(lhs);
        let dst = self.alloc_temp(ty);
        self.emit(TacInstr::Bin {
            op: bin,
            dst,
            ty,
            lhs,
            rhs,
        });
        self.push_temp(dst);
    }

    fn logical(&mut self, vm: &Vm, op: OpCode, bin: TacBinOp) {
        self.mark(vm, op);
        let rhs = self.pop_temp();
        let lhs = self.pop_temp();
        let dst = self.alloc_temp(TypeTag::Bool);
        self.emit(TacInstr::Bin {
            op: bin,
            dst,
            ty: TypeTag::Bool,
            lhs,
            rhs,
        });
        self.push_temp(dst);
    }

    fn unary(&mut self, vm: &Vm, op: OpCode, un: TacUnOp) {
        self.mark(vm, op);
        let src = self.pop_temp();
        let dst = self.alloc_temp(TypeTag::Bool);
        self.emit(TacInstr::Un { op: un, dst, src });
        self.push_temp(dst);
    }

    /// Shadow depth at entry of the innermost open function, or zero at
    /// top level.
    fn function_entry_depth(&self) -> usize {
        self.blocks
            .iter()
            .rev()
            .find_map(|b| match b {
                TacBlock::Function { entry_depth } => Some(*entry_depth),
                _ => None,
            })
            .unwrap_or(0)
    }
}

impl Backend for TacGen {
    fn op_nop(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Nop);
    }

    fn op_push(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word) {
        self.mark(vm, OpCode::Push);
        let dst = self.alloc_temp(tag);
        self.emit(TacInstr::Const { dst, ty: tag, imm });
        self.push_temp(dst);
    }

    fn op_add(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Add, TacBinOp::Add);
    }

    fn op_sub(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Sub, TacBinOp::Sub);
    }

    fn op_mul(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Mul, TacBinOp::Mul);
    }

    fn op_div(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Div, TacBinOp::Div);
    }

    fn op_rem(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Rem, TacBinOp::Rem);
    }

    fn op_move(&mut self, vm: &mut Vm, delta: Word) {
        self.mark(vm, OpCode::Move);
        self.emit(TacInstr::Move { delta });
        // the pointer moved away from whatever temp described it
        self.ptr_temp = None;
    }

    fn op_load(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Load);
        let dst = self.alloc_temp(TypeTag::Unknown);
        self.emit(TacInstr::Load { dst });
        self.push_temp(dst);
    }

    fn op_store(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Store);
        let src = self.pop_temp();
        self.emit(TacInstr::Store { src });
    }

    fn op_print(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Print);
        let src = self.pop_temp();
        self.emit(TacInstr::Print { src });
    }

    fn op_printchar(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::PrintChar);
        let src = self.pop_temp();
        self.emit(TacInstr::PrintChar { src });
    }

    fn op_deref(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Deref);
        let src = self.cur_ptr();
        let dst = self.alloc_temp(TypeTag::Ptr);
        self.emit(TacInstr::Deref { dst, src });
        self.ptr_temp = Some(dst);
    }

    fn op_refer(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Refer);
        let src = self.cur_ptr();
        let dst = self.alloc_temp(TypeTag::Ptr);
        self.emit(TacInstr::Refer { dst, src });
        self.ptr_temp = Some(dst);
    }

    fn op_where(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Where);
        let dst = self.alloc_temp(TypeTag::Ptr);
        self.emit(TacInstr::Where { dst });
        self.push_temp(dst);
        self.ptr_temp = Some(dst);
    }

    fn op_offset(&mut self, vm: &mut Vm, delta: Word) {
        self.mark(vm, OpCode::Offset);
        let src = self.cur_ptr();
        let dst = self.alloc_temp(TypeTag::Ptr);
        self.emit(TacInstr::Offset { dst, src, delta });
        self.ptr_temp = Some(dst);
    }

    fn op_index(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Index);
        let src = self.cur_ptr();
        // the step is the cell under the pointer; materialize it
        let step = self.alloc_temp(TypeTag::Unknown);
        self.emit(TacInstr::Load { dst: step });
        let dst = self.alloc_temp(TypeTag::Ptr);
        self.emit(TacInstr::Index { dst, src, step });
        self.ptr_temp = Some(dst);
    }

    fn op_set(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word) {
        self.mark(vm, OpCode::Set);
        // prefer a pointer temp already on the shadow stack, unpopped
        let ptr = match self.shadow.last().copied() {
            Some(top) if self.temp_type(top) == TypeTag::Ptr => top,
            _ => self.cur_ptr(),
        };
        let val = self.alloc_temp(tag);
        self.emit(TacInstr::Const { dst: val, ty: tag, imm });
        self.emit(TacInstr::Set { ptr, val });
    }

    fn op_function(&mut self, vm: &mut Vm, idx: Word) {
        self.mark(vm, OpCode::Function);
        let label = self.function_label(idx as usize);
        self.emit(TacInstr::Label(label));
        let entry_depth = self.shadow.len();
        self.blocks.push(TacBlock::Function { entry_depth });
    }

    fn op_call(&mut self, vm: &mut Vm, idx: Word) {
        self.mark(vm, OpCode::Call);
        let target = self.function_label(idx as usize);
        let dst = self.alloc_temp(TypeTag::Unknown);
        self.emit(TacInstr::Call { dst, target });
        self.push_temp(dst);
    }

    fn op_return(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Return);
        self.emit(TacInstr::Ret);
        // drop the body's result temp, as the interpreter's unwind would
        if self.shadow.len() > self.function_entry_depth() {
            self.shadow.pop();
        }
    }

    fn op_while(&mut self, vm: &mut Vm, cond_ip: Word) {
        self.mark(vm, OpCode::While);
        let cond_lbl = self.insert_cond_label(cond_ip as usize);
        let cond = self.pop_temp();
        let end_lbl = self.fresh_label();
        self.emit(TacInstr::Jz {
            cond,
            target: end_lbl,
        });
        let body_lbl = self.fresh_label();
        self.emit(TacInstr::Label(body_lbl));
        self.blocks.push(TacBlock::While { cond_lbl, end_lbl });
    }

    fn op_if(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::If);
        let cond = self.pop_temp();
        let else_lbl = self.fresh_label();
        let end_lbl = self.fresh_label();
        self.emit(TacInstr::Jz {
            cond,
            target: else_lbl,
        });
        self.blocks.push(TacBlock::If { else_lbl, end_lbl });
    }

    fn op_else(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Else);
        match self.pop_block() {
            TacBlock::If { else_lbl, end_lbl } => {
                self.emit(TacInstr::Jmp(end_lbl));
                self.emit(TacInstr::Label(else_lbl));
                self.blocks.push(TacBlock::Else { end_lbl });
            }
            other => panic!("lowering: else closing a {:?} block", other),
        }
    }

    fn op_end(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::EndBlock);
        match self.pop_block() {
            TacBlock::While { cond_lbl, end_lbl } => {
                self.emit(TacInstr::Jmp(cond_lbl));
                self.emit(TacInstr::Label(end_lbl));
            }
            TacBlock::If { else_lbl, end_lbl } => {
                // no else arm: the false edge lands here
                self.emit(TacInstr::Label(else_lbl));
                self.emit(TacInstr::Label(end_lbl));
            }
            TacBlock::Else { end_lbl } => {
                self.emit(TacInstr::Label(end_lbl));
            }
            TacBlock::Function { .. } => {}
        }
    }

    fn op_or(&mut self, vm: &mut Vm) {
        self.logical(vm, OpCode::OrAssign, TacBinOp::Or);
    }

    fn op_and(&mut self, vm: &mut Vm) {
        self.logical(vm, OpCode::AndAssign, TacBinOp::And);
    }

    fn op_not(&mut self, vm: &mut Vm) {
        self.unary(vm, OpCode::Not, TacUnOp::Not);
    }

    fn op_bitand(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::BitAnd, TacBinOp::BitAnd);
    }

    fn op_bitor(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::BitOr, TacBinOp::BitOr);
    }

    fn op_bitxor(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::BitXor, TacBinOp::BitXor);
    }

    fn op_lsh(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Lsh, TacBinOp::Lsh);
    }

    fn op_lrsh(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Lrsh, TacBinOp::Lrsh);
    }

    fn op_arsh(&mut self, vm: &mut Vm) {
        self.binary(vm, OpCode::Arsh, TacBinOp::Arsh);
    }

    fn op_gez(&mut self, vm: &mut Vm) {
        self.unary(vm, OpCode::Gez, TacUnOp::Gez);
    }

    fn op_halt(&mut self, vm: &mut Vm) {
        self.mark(vm, OpCode::Halt);
    }
}

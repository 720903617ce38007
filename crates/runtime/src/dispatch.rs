//! The structural dispatcher
//!
//! `run` is the single execution loop shared by every backend. It fetches an
//! opcode, decodes its inline immediates, advances `ip` past the whole
//! encoding and only then invokes the backend hook - so a hook always
//! observes `ip` pointing past its own instruction and can recover the
//! opcode's origin as `ip - encoded_len`.
//!
//! No semantics live here: arithmetic, control flow and type checking are
//! all the backend's business. That is what lets the interpreter and the
//! TAC lowering share one loop.

use crate::vm::Vm;
use rr_core::{OpCode, TypeTag, Word};
use tracing::trace;

/// One hook per opcode. Backends implement every method; a missing
/// implementation is a compile error, not a silent no-op.
///
/// Hooks take the VM by mutable borrow and may move `vm.ip` (the
/// interpreter's control flow does); the dispatcher re-reads it each
/// iteration.
pub trait Backend {
    fn op_nop(&mut self, vm: &mut Vm);
    fn op_push(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word);
    fn op_add(&mut self, vm: &mut Vm);
    fn op_sub(&mut self, vm: &mut Vm);
    fn op_mul(&mut self, vm: &mut Vm);
    fn op_div(&mut self, vm: &mut Vm);
    fn op_rem(&mut self, vm: &mut Vm);
    fn op_move(&mut self, vm: &mut Vm, delta: Word);
    fn op_load(&mut self, vm: &mut Vm);
    fn op_store(&mut self, vm: &mut Vm);
    fn op_print(&mut self, vm: &mut Vm);
    fn op_printchar(&mut self, vm: &mut Vm);
    fn op_deref(&mut self, vm: &mut Vm);
    fn op_refer(&mut self, vm: &mut Vm);
    fn op_where(&mut self, vm: &mut Vm);
    fn op_offset(&mut self, vm: &mut Vm, delta: Word);
    fn op_index(&mut self, vm: &mut Vm);
    fn op_set(&mut self, vm: &mut Vm, tag: TypeTag, imm: Word);
    fn op_function(&mut self, vm: &mut Vm, idx: Word);
    fn op_call(&mut self, vm: &mut Vm, idx: Word);
    fn op_return(&mut self, vm: &mut Vm);
    fn op_while(&mut self, vm: &mut Vm, cond_ip: Word);
    fn op_if(&mut self, vm: &mut Vm);
    fn op_else(&mut self, vm: &mut Vm);
    fn op_end(&mut self, vm: &mut Vm);
    fn op_or(&mut self, vm: &mut Vm);
    fn op_and(&mut self, vm: &mut Vm);
    fn op_not(&mut self, vm: &mut Vm);
    fn op_bitand(&mut self, vm: &mut Vm);
    fn op_bitor(&mut self, vm: &mut Vm);
    fn op_bitxor(&mut self, vm: &mut Vm);
    fn op_lsh(&mut self, vm: &mut Vm);
    fn op_lrsh(&mut self, vm: &mut Vm);
    fn op_arsh(&mut self, vm: &mut Vm);
    fn op_gez(&mut self, vm: &mut Vm);
    fn op_halt(&mut self, vm: &mut Vm);
}

/// Run the VM against a backend until `halt` executes or the code is
/// exhausted.
pub fn run(vm: &mut Vm, backend: &mut impl Backend) {
    while vm.ip < vm.code.len() {
        let word = vm.code[vm.ip];
        let op = OpCode::from_word(word)
            .unwrap_or_else(|| panic!("unknown opcode {} at ip {}", word, vm.ip));
        assert!(
            vm.ip + op.encoded_len() <= vm.code.len(),
            "truncated {} at ip {}",
            op,
            vm.ip
        );
        trace!(ip = vm.ip, op = %op, "dispatch");

        let imm0 = if op.imm_words() >= 1 { vm.code[vm.ip + 1] } else { 0 };
        let imm1 = if op.imm_words() >= 2 { vm.code[vm.ip + 2] } else { 0 };
        vm.ip += op.encoded_len();

        match op {
            OpCode::Nop => backend.op_nop(vm),
            OpCode::Push => backend.op_push(vm, decode_tag(imm0, vm.ip), imm1),
            OpCode::Add => backend.op_add(vm),
            OpCode::Sub => backend.op_sub(vm),
            OpCode::Mul => backend.op_mul(vm),
            OpCode::Div => backend.op_div(vm),
            OpCode::Rem => backend.op_rem(vm),
            OpCode::Move => backend.op_move(vm, imm0),
            OpCode::Load => backend.op_load(vm),
            OpCode::Store => backend.op_store(vm),
            OpCode::Print => backend.op_print(vm),
            OpCode::PrintChar => backend.op_printchar(vm),
            OpCode::Deref => backend.op_deref(vm),
            OpCode::Refer => backend.op_refer(vm),
            OpCode::Where => backend.op_where(vm),
            OpCode::Offset => backend.op_offset(vm, imm0),
            OpCode::Index => backend.op_index(vm),
            OpCode::Set => backend.op_set(vm, decode_tag(imm0, vm.ip), imm1),
            OpCode::Function => backend.op_function(vm, imm0),
            OpCode::Call => backend.op_call(vm, imm0),
            OpCode::Return => backend.op_return(vm),
            OpCode::While => backend.op_while(vm, imm0),
            OpCode::If => backend.op_if(vm),
            OpCode::Else => backend.op_else(vm),
            OpCode::EndBlock => backend.op_end(vm),
            OpCode::OrAssign => backend.op_or(vm),
            OpCode::AndAssign => backend.op_and(vm),
            OpCode::Not => backend.op_not(vm),
            OpCode::BitAnd => backend.op_bitand(vm),
            OpCode::BitOr => backend.op_bitor(vm),
            OpCode::BitXor => backend.op_bitxor(vm),
            OpCode::Lsh => backend.op_lsh(vm),
            OpCode::Lrsh => backend.op_lrsh(vm),
            OpCode::Arsh => backend.op_arsh(vm),
            OpCode::Gez => backend.op_gez(vm),
            OpCode::Halt => {
                backend.op_halt(vm);
                break;
            }
        }
    }
}

fn decode_tag(w: Word, ip: usize) -> TypeTag {
    TypeTag::from_word(w)
        .unwrap_or_else(|| panic!("invalid type tag {} in encoding before ip {}", w, ip))
}

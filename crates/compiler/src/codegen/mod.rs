//! TAC lowering
//!
//! Re-runs a program's structure through the VM dispatcher, but instead of
//! computing values it emits three-address code. The VM's operand stack is
//! shadowed by a stack of temp ids; under this backend no hook ever moves
//! `ip`, so the whole program is lowered in one linear sweep - function
//! bodies in place, both arms of every `if`, loop bodies once.
//!
//! The one non-append emission is the retroactive condition label: when a
//! `while` executes, its condition region is already in the output, so the
//! label is spliced in at the recorded position (see `op_while` in
//! `lower.rs`).

mod emit;
mod instr;
mod lower;

pub use emit::serialize;
pub use instr::{LabelId, TacBinOp, TacInstr, TacProgram, TacUnOp, Temp};

use rr_core::{OpCode, TypeTag};
use rr_runtime::Vm;

/// Block-stack entry mirroring the VM's open constructs, carrying the
/// labels each `end` needs.
#[derive(Clone, Copy, Debug)]
enum TacBlock {
    If { else_lbl: LabelId, end_lbl: LabelId },
    Else { end_lbl: LabelId },
    While { cond_lbl: LabelId, end_lbl: LabelId },
    Function { entry_depth: usize },
}

/// The lowering backend.
pub struct TacGen {
    prog: Vec<TacInstr>,
    /// Temp ids standing in for the VM's value stack, same depths at every
    /// hook.
    shadow: Vec<Temp>,
    /// Indexed by temp id; grows at allocation.
    temp_types: Vec<TypeTag>,
    next_label: LabelId,
    /// VM code position -> index of the first TAC instruction emitted for
    /// the opcode at that position. Sized once from the code length.
    ip_to_tac: Vec<Option<usize>>,
    /// VM code position of a loop condition -> its retro-inserted label.
    ip_to_label: Vec<Option<LabelId>>,
    /// Function index -> label, forward-allocated by `call`.
    func_labels: Vec<Option<LabelId>>,
    blocks: Vec<TacBlock>,
    /// Temp known to hold the current tape pointer, if any.
    ptr_temp: Option<Temp>,
}

impl TacGen {
    pub fn new(vm: &Vm) -> Self {
        TacGen {
            prog: Vec::new(),
            shadow: Vec::new(),
            temp_types: Vec::new(),
            next_label: 1,
            ip_to_tac: vec![None; vm.code.len()],
            ip_to_label: vec![None; vm.code.len()],
            func_labels: vec![None; vm.config().function_table_size],
            blocks: Vec::new(),
            ptr_temp: None,
        }
    }

    /// Take the finished program.
    pub fn finish(self) -> TacProgram {
        TacProgram {
            instrs: self.prog,
            temp_types: self.temp_types,
            cond_labels: self.ip_to_label,
        }
    }

    // ---- allocators ----

    fn alloc_temp(&mut self, ty: TypeTag) -> Temp {
        let t = self.temp_types.len();
        self.temp_types.push(ty);
        t
    }

    fn temp_type(&self, t: Temp) -> TypeTag {
        self.temp_types[t]
    }

    fn fresh_label(&mut self) -> LabelId {
        let l = self.next_label;
        self.next_label += 1;
        l
    }

    // ---- shadow stack ----

    fn push_temp(&mut self, t: Temp) {
        self.shadow.push(t);
    }

    fn pop_temp(&mut self) -> Temp {
        self.shadow
            .pop()
            .expect("lowering: missing operand temp on the shadow stack")
    }

    fn pop_block(&mut self) -> TacBlock {
        self.blocks
            .pop()
            .expect("lowering: end without an open block")
    }

    // ---- emission ----

    fn emit(&mut self, instr: TacInstr) {
        self.prog.push(instr);
    }

    /// Record where the instructions for the opcode that just dispatched
    /// begin. Called first by every hook; `vm.ip` already points past the
    /// opcode's encoding.
    fn mark(&mut self, vm: &Vm, op: OpCode) {
        let origin = vm.ip - op.encoded_len();
        self.ip_to_tac[origin] = Some(self.prog.len());
    }

    /// The temp holding the current tape pointer, materializing one with an
    /// emitted `where` when none is cached.
    fn cur_ptr(&mut self) -> Temp {
        match self.ptr_temp {
            Some(t) => t,
            None => {
                let t = self.alloc_temp(TypeTag::Ptr);
                self.emit(TacInstr::Where { dst: t });
                self.ptr_temp = Some(t);
                t
            }
        }
    }

    /// The label for a function index, forward-allocating on first use.
    fn function_label(&mut self, idx: usize) -> LabelId {
        assert!(
            idx < self.func_labels.len(),
            "lowering: function index {} out of range",
            idx
        );
        match self.func_labels[idx] {
            Some(l) => l,
            None => {
                let l = self.fresh_label();
                self.func_labels[idx] = Some(l);
                l
            }
        }
    }

    /// Splice a `label` instruction in at the TAC position recorded for a
    /// loop-condition code position, shifting the position map to match.
    fn insert_cond_label(&mut self, cond_ip: usize) -> LabelId {
        let cond_lbl = self.fresh_label();
        match self.ip_to_tac.get(cond_ip).copied().flatten() {
            Some(at) => {
                self.prog.insert(at, TacInstr::Label(cond_lbl));
                for entry in self.ip_to_tac.iter_mut().flatten() {
                    if *entry >= at {
                        *entry += 1;
                    }
                }
            }
            None => {
                // no emission recorded for the condition region: a lowering
                // bug upstream, but a floating label keeps the output usable
                debug_assert!(false, "no TAC position recorded for cond ip {}", cond_ip);
                self.emit(TacInstr::Label(cond_lbl));
            }
        }
        self.ip_to_label[cond_ip] = Some(cond_lbl);
        cond_lbl
    }
}

/// Lower a parsed program: run the dispatcher once with a `TacGen` backend.
pub fn lower(vm: &mut Vm) -> TacProgram {
    let mut backend = TacGen::new(vm);
    rr_runtime::run(vm, &mut backend);
    backend.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::Word;

    fn gen_for(code_len: usize) -> TacGen {
        TacGen::new(&Vm::new(vec![0; code_len]))
    }

    #[test]
    fn retro_insertion_shifts_later_map_entries() {
        let mut g = gen_for(8);
        let c = g.alloc_temp(TypeTag::I64);
        g.emit(TacInstr::Const {
            dst: c,
            ty: TypeTag::I64,
            imm: 1,
        });
        g.ip_to_tac[0] = Some(0);
        let loaded = g.alloc_temp(TypeTag::Unknown);
        g.emit(TacInstr::Load { dst: loaded });
        g.ip_to_tac[3] = Some(1);
        g.emit(TacInstr::Store { src: 1 });
        g.ip_to_tac[4] = Some(2);

        let lbl = g.insert_cond_label(3);
        assert_eq!(g.prog[1], TacInstr::Label(lbl));
        // entries at or after the insertion point moved by one
        assert_eq!(g.ip_to_tac[0], Some(0));
        assert_eq!(g.ip_to_tac[3], Some(2));
        assert_eq!(g.ip_to_tac[4], Some(3));
        assert_eq!(g.ip_to_label[3], Some(lbl));
    }

    #[test]
    fn labels_allocate_from_one() {
        let mut g = gen_for(1);
        assert_eq!(g.fresh_label(), 1);
        assert_eq!(g.fresh_label(), 2);
    }

    #[test]
    fn function_labels_are_stable_across_uses() {
        let mut g = gen_for(1);
        let forward = g.function_label(5);
        assert_eq!(g.function_label(5), forward);
        assert_ne!(g.function_label(6), forward);
    }

    #[test]
    fn temp_types_grow_with_allocation() {
        let mut g = gen_for(1);
        let a = g.alloc_temp(TypeTag::I32);
        let b = g.alloc_temp(TypeTag::Bool);
        assert_eq!((a, b), (0, 1));
        assert_eq!(g.temp_type(a), TypeTag::I32);
        assert_eq!(g.temp_type(b), TypeTag::Bool);
    }

    #[test]
    #[should_panic(expected = "missing operand temp")]
    fn popping_an_empty_shadow_stack_is_a_lowering_fault() {
        let mut g = gen_for(1);
        g.pop_temp();
    }

    #[test]
    #[should_panic(expected = "function index")]
    fn function_index_beyond_the_table_is_a_lowering_fault() {
        let mut g = gen_for(1);
        g.function_label(100_000);
    }

    #[test]
    fn finish_hands_back_the_emitted_stream() {
        let mut g = gen_for(2);
        g.emit(TacInstr::Move { delta: 2 as Word });
        let prog = g.finish();
        assert_eq!(prog.instrs, vec![TacInstr::Move { delta: 2 }]);
    }
}

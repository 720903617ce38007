//! Bytecode disassembly
//!
//! Renders a code buffer one instruction per line for diagnostics. Float
//! immediates are shown as their raw bit pattern so the dump stays exact.

use crate::opcode::OpCode;
use crate::types::TypeTag;
use crate::word::Word;
use std::fmt::Write as _;

/// Disassemble a bytecode buffer.
///
/// Each line is `<ip>: <mnemonic> [operands]`. Decoding stops at the first
/// malformed word (unknown opcode or truncated immediates), which is
/// reported in place.
pub fn disasm(code: &[Word]) -> String {
    let mut out = String::new();
    let mut ip = 0;
    while ip < code.len() {
        let Some(op) = OpCode::from_word(code[ip]) else {
            let _ = writeln!(out, "{ip:4}: <unknown opcode {}>", code[ip]);
            break;
        };
        if ip + op.imm_words() >= code.len() {
            let _ = writeln!(out, "{ip:4}: <truncated {}>", op);
            break;
        }
        match op.imm_words() {
            2 => {
                let tag = TypeTag::from_word(code[ip + 1]);
                let imm = code[ip + 2];
                match tag {
                    Some(t) if t.is_float() => {
                        let _ = writeln!(out, "{ip:4}: {op} {t} {imm:#x}");
                    }
                    Some(t) => {
                        let _ = writeln!(out, "{ip:4}: {op} {t} {imm}");
                    }
                    None => {
                        let _ = writeln!(out, "{ip:4}: {op} <bad tag {}> {imm}", code[ip + 1]);
                    }
                }
            }
            1 => {
                let _ = writeln!(out, "{ip:4}: {op} {}", code[ip + 1]);
            }
            _ => {
                let _ = writeln!(out, "{ip:4}: {op}");
            }
        }
        ip += op.encoded_len();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::f64_to_word;

    #[test]
    fn renders_each_encoding_width() {
        let code = [
            OpCode::Push.to_word(),
            TypeTag::I64.to_word(),
            3,
            OpCode::Move.to_word(),
            -2,
            OpCode::Add.to_word(),
            OpCode::Halt.to_word(),
        ];
        let text = disasm(&code);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("push i64 3"));
        assert!(lines[1].contains("move -2"));
        assert!(lines[2].contains("add"));
        assert!(lines[3].contains("halt"));
    }

    #[test]
    fn float_immediates_print_as_bit_patterns() {
        let code = [OpCode::Push.to_word(), TypeTag::F64.to_word(), f64_to_word(1.5)];
        let text = disasm(&code);
        assert!(text.contains("push f64 0x3ff8000000000000"));
    }

    #[test]
    fn stops_on_unknown_opcode() {
        let code = [OpCode::Nop.to_word(), 999, OpCode::Halt.to_word()];
        let text = disasm(&code);
        assert!(text.contains("<unknown opcode 999>"));
        assert!(!text.contains("halt"));
    }

    #[test]
    fn reports_truncated_immediates() {
        let code = [OpCode::Push.to_word(), TypeTag::I64.to_word()];
        let text = disasm(&code);
        assert!(text.contains("<truncated push>"));
    }
}

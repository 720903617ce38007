//! Assembler: token lines to bytecode
//!
//! One instruction per line, case-insensitive mnemonics. The parser owns
//! three symbol tables:
//!
//! - labels (`name:` or `label name`), recording code positions
//! - functions, with indices allocated on first reference so `call` can
//!   precede `func`
//! - while-patches: `while` emits a placeholder immediate that is filled in
//!   when (or as soon as) its label is defined
//!
//! The output is a `Vm` owning the finished code buffer; everything else in
//! the machine starts zeroed.

use crate::error::ParseError;
use crate::lexer::{Line, tokenize};
use rr_core::{OpCode, TypeTag, Word, f32_to_word, f64_to_word};
use rr_runtime::{RunConfig, Vm};
use std::collections::HashMap;

struct WhilePatch {
    label: String,
    /// Index of the placeholder immediate in the code buffer.
    slot: usize,
    line: usize,
}

struct FuncEntry {
    idx: Word,
    defined: bool,
    /// Line of the first reference, for end-of-parse diagnostics.
    line: usize,
}

pub struct Parser {
    lines: Vec<Line>,
    code: Vec<Word>,
    labels: HashMap<String, usize>,
    patches: Vec<WhilePatch>,
    functions: HashMap<String, FuncEntry>,
    next_func_idx: Word,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser {
            lines: tokenize(source),
            code: Vec::new(),
            labels: HashMap::new(),
            patches: Vec::new(),
            functions: HashMap::new(),
            next_func_idx: 0,
        }
    }

    /// Assemble the whole source into a VM with default state sizes.
    pub fn parse(self) -> Result<Vm, ParseError> {
        self.parse_with_config(RunConfig::default())
    }

    pub fn parse_with_config(mut self, config: RunConfig) -> Result<Vm, ParseError> {
        let lines = std::mem::take(&mut self.lines);
        for line in &lines {
            self.parse_line(line)?;
        }
        self.check_unresolved()?;
        Ok(Vm::with_config(self.code, config))
    }

    fn parse_line(&mut self, line: &Line) -> Result<(), ParseError> {
        let first = &line.tokens[0];

        // `name:` label form
        if first.len() > 1 && first.ends_with(':') {
            if line.tokens.len() > 1 {
                return Err(ParseError::new(
                    line.number,
                    format!("unexpected token '{}' after label", line.tokens[1]),
                ));
            }
            let name = first[..first.len() - 1].to_string();
            return self.define_label(name, line.number);
        }

        let mnemonic = first.to_lowercase();
        match mnemonic.as_str() {
            "nop" => self.bare(line, OpCode::Nop),
            "push" => self.typed_imm(line, OpCode::Push),
            "add" => self.bare(line, OpCode::Add),
            "sub" => self.bare(line, OpCode::Sub),
            "mul" => self.bare(line, OpCode::Mul),
            "div" => self.bare(line, OpCode::Div),
            "rem" => self.bare(line, OpCode::Rem),
            "move" => self.int_imm(line, OpCode::Move),
            "load" => self.bare(line, OpCode::Load),
            "store" => self.bare(line, OpCode::Store),
            "print" => self.bare(line, OpCode::Print),
            "printchar" => self.bare(line, OpCode::PrintChar),
            "deref" => self.bare(line, OpCode::Deref),
            "refer" => self.bare(line, OpCode::Refer),
            "where" => self.bare(line, OpCode::Where),
            "offset" => self.int_imm(line, OpCode::Offset),
            "index" => self.bare(line, OpCode::Index),
            "set" => self.typed_imm(line, OpCode::Set),
            "func" => self.function_def(line),
            "call" => self.function_call(line),
            "ret" | "return" => self.bare(line, OpCode::Return),
            "while" => self.while_loop(line),
            "if" => self.bare(line, OpCode::If),
            "else" => self.bare(line, OpCode::Else),
            "end" => self.bare(line, OpCode::EndBlock),
            "or" => self.bare(line, OpCode::OrAssign),
            "and" => self.bare(line, OpCode::AndAssign),
            "not" => self.bare(line, OpCode::Not),
            "bitand" => self.bare(line, OpCode::BitAnd),
            "bitor" => self.bare(line, OpCode::BitOr),
            "bitxor" => self.bare(line, OpCode::BitXor),
            "lsh" => self.bare(line, OpCode::Lsh),
            "lrsh" => self.bare(line, OpCode::Lrsh),
            "arsh" => self.bare(line, OpCode::Arsh),
            "gez" => self.bare(line, OpCode::Gez),
            "halt" => self.bare(line, OpCode::Halt),
            "label" => {
                let name = self.operand(line, 1, "label name")?.to_string();
                self.no_extra(line, 2)?;
                self.define_label(name, line.number)
            }
            _ => Err(ParseError::new(
                line.number,
                format!("unknown instruction '{}'", first),
            )),
        }
    }

    // ---- per-form emitters ----

    fn bare(&mut self, line: &Line, op: OpCode) -> Result<(), ParseError> {
        self.no_extra(line, 1)?;
        self.code.push(op.to_word());
        Ok(())
    }

    fn int_imm(&mut self, line: &Line, op: OpCode) -> Result<(), ParseError> {
        let tok = self.operand(line, 1, "immediate")?;
        let imm = parse_int(tok).ok_or_else(|| {
            ParseError::new(line.number, format!("invalid immediate '{}'", tok))
        })?;
        self.no_extra(line, 2)?;
        self.code.push(op.to_word());
        self.code.push(imm);
        Ok(())
    }

    fn typed_imm(&mut self, line: &Line, op: OpCode) -> Result<(), ParseError> {
        let ty_tok = self.operand(line, 1, "type")?.to_lowercase();
        let tag: TypeTag = ty_tok.parse().map_err(|_| {
            ParseError::new(line.number, format!("unknown type '{}'", ty_tok))
        })?;
        let imm_tok = self.operand(line, 2, "immediate")?;
        let imm = parse_typed_imm(tag, imm_tok).ok_or_else(|| {
            ParseError::new(
                line.number,
                format!("invalid {} immediate '{}'", tag, imm_tok),
            )
        })?;
        self.no_extra(line, 3)?;
        self.code.push(op.to_word());
        self.code.push(tag.to_word());
        self.code.push(imm);
        Ok(())
    }

    fn function_def(&mut self, line: &Line) -> Result<(), ParseError> {
        let name = self.operand(line, 1, "function name")?.to_string();
        self.no_extra(line, 2)?;
        let idx = self.intern_function(&name, line.number);
        let entry = self.functions.get_mut(&name).expect("just interned");
        if entry.defined {
            return Err(ParseError::new(
                line.number,
                format!("function '{}' already defined", name),
            ));
        }
        entry.defined = true;
        self.code.push(OpCode::Function.to_word());
        self.code.push(idx);
        Ok(())
    }

    fn function_call(&mut self, line: &Line) -> Result<(), ParseError> {
        let name = self.operand(line, 1, "function name")?.to_string();
        self.no_extra(line, 2)?;
        let idx = self.intern_function(&name, line.number);
        self.code.push(OpCode::Call.to_word());
        self.code.push(idx);
        Ok(())
    }

    fn while_loop(&mut self, line: &Line) -> Result<(), ParseError> {
        let name = self.operand(line, 1, "condition label")?.to_string();
        self.no_extra(line, 2)?;
        self.code.push(OpCode::While.to_word());
        let slot = self.code.len();
        match self.labels.get(&name) {
            Some(pos) => self.code.push(*pos as Word),
            None => {
                self.code.push(0);
                self.patches.push(WhilePatch {
                    label: name,
                    slot,
                    line: line.number,
                });
            }
        }
        Ok(())
    }

    // ---- symbol tables ----

    fn define_label(&mut self, name: String, line: usize) -> Result<(), ParseError> {
        let pos = self.code.len();
        if self.labels.insert(name.clone(), pos).is_some() {
            return Err(ParseError::new(
                line,
                format!("label '{}' already defined", name),
            ));
        }
        // fill in every pending forward reference
        for patch in &self.patches {
            if patch.label == name {
                self.code[patch.slot] = pos as Word;
            }
        }
        self.patches.retain(|p| p.label != name);
        Ok(())
    }

    fn intern_function(&mut self, name: &str, line: usize) -> Word {
        if let Some(entry) = self.functions.get(name) {
            return entry.idx;
        }
        let idx = self.next_func_idx;
        self.next_func_idx += 1;
        self.functions.insert(
            name.to_string(),
            FuncEntry {
                idx,
                defined: false,
                line,
            },
        );
        idx
    }

    fn check_unresolved(&self) -> Result<(), ParseError> {
        if let Some(patch) = self.patches.iter().min_by_key(|p| p.line) {
            return Err(ParseError::new(
                patch.line,
                format!("undefined label '{}'", patch.label),
            ));
        }
        if let Some((name, entry)) = self
            .functions
            .iter()
            .filter(|(_, e)| !e.defined)
            .min_by_key(|(_, e)| e.line)
        {
            return Err(ParseError::new(
                entry.line,
                format!("undefined function '{}'", name),
            ));
        }
        Ok(())
    }

    // ---- token plumbing ----

    fn operand<'a>(
        &self,
        line: &'a Line,
        index: usize,
        what: &str,
    ) -> Result<&'a str, ParseError> {
        line.tokens.get(index).map(String::as_str).ok_or_else(|| {
            ParseError::new(
                line.number,
                format!("missing {} after '{}'", what, line.tokens[0]),
            )
        })
    }

    fn no_extra(&self, line: &Line, from: usize) -> Result<(), ParseError> {
        if let Some(extra) = line.tokens.get(from) {
            return Err(ParseError::new(
                line.number,
                format!("unexpected token '{}'", extra),
            ));
        }
        Ok(())
    }
}

/// Parse a decimal or C-hex integer, optionally negated.
fn parse_int(s: &str) -> Option<Word> {
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if body.is_empty() {
        return None;
    }
    let magnitude = match body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => body.parse::<u64>().ok()?,
    };
    let word = magnitude as Word;
    Some(if neg { word.wrapping_neg() } else { word })
}

/// Parse an immediate under a type tag: integers are normalized to their
/// width; float literals are bit-cast, with `0x` accepted as a raw pattern.
fn parse_typed_imm(tag: TypeTag, s: &str) -> Option<Word> {
    if tag.is_float() {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let bits = u64::from_str_radix(hex, 16).ok()?;
            if tag == TypeTag::F32 && bits > u32::MAX as u64 {
                return None;
            }
            return Some(bits as Word);
        }
        return match tag {
            TypeTag::F32 => s.parse::<f32>().ok().map(f32_to_word),
            _ => s.parse::<f64>().ok().map(f64_to_word),
        };
    }
    parse_int(s).map(|w| tag.normalize(w))
}

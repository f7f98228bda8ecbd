//! Disassembler: decodes a [`Program`]'s flat code array back into a
//! sequence of instruction records (spec §6, §8).
//!
//! A pure decoder, deliberately kept separate from the VM (which never
//! imports this module): used for developer-facing dumps and by
//! `tests/invariants.rs`'s round-trip-coverage property. Grounded on the
//! teacher's own separation of `bytecode/builder.rs` (produces code) from
//! its disassembly helpers (consume it) rather than folding decoding into
//! the execution loop.

use std::fmt;

use crate::opcode::Opcode;
use crate::program::{Const, Program};

/// One decoded instruction: its address, opcode, raw operands (in emission
/// order), and the source line attributed to its first code slot.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub ip: usize,
    pub op: Opcode,
    pub operands: Vec<i32>,
    pub line: u32,
}

/// Decodes every instruction in `program`, in address order. Consumes
/// exactly `program.code.len()` slots in total — the round-trip invariant
/// spec §8 requires (no gaps, no overlapping reads).
#[must_use]
pub fn disassemble(program: &Program) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut ip = 0;
    while ip < program.code.len() {
        let op = Opcode::from_i32(program.code[ip]).expect("well-formed program has only valid opcodes");
        let n = op.operand_count();
        let operands = program.code[ip + 1..ip + 1 + n].to_vec();
        let line = program.source_map[ip];
        out.push(Instruction { ip, op, operands, line });
        ip += 1 + n;
    }
    out
}

/// Renders one instruction the way a `blocksi --disassemble` dump would,
/// resolving pool-indexed operands (`PushConst`, `LoadGlobal`, `BinaryOp`,
/// `MakeBlock`) to their human-readable constant instead of a bare index.
pub fn format_instruction(program: &Program, instr: &Instruction) -> String {
    let resolved = match (instr.op, instr.operands.as_slice()) {
        (Opcode::PushConst, [idx]) => format!(" {}", describe_const(&program.pool[*idx as usize])),
        (Opcode::LoadGlobal | Opcode::StoreGlobal, [idx]) => {
            format!(" {}", program.pool[*idx as usize].as_name())
        }
        (Opcode::BinaryOp, [idx]) => format!(" {}", program.pool[*idx as usize].as_name()),
        (Opcode::MakeBlock, [params_idx, entry, locals]) => {
            let Const::Params(names) = &program.pool[*params_idx as usize] else {
                unreachable!("MakeBlock's first operand always indexes a Params entry")
            };
            format!(" params=({}) entry={entry} locals={locals}", names.join(", "))
        }
        (_, operands) => operands.iter().map(|o| format!(" {o}")).collect(),
    };
    format!("{:>5}  {:<18}{resolved}  ; line {}", instr.ip, instr.op.to_string(), instr.line)
}

fn describe_const(c: &Const) -> String {
    match c {
        Const::Int(n) => n.to_string(),
        Const::Str(s) => format!("{s:?}"),
        Const::Nil => "nil".to_string(),
        Const::Name(s) | Const::Op(s) => s.to_string(),
        Const::Params(names) => format!("({})", names.join(", ")),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}  {}", self.ip, self.op)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    #[test]
    fn disassembly_covers_every_code_slot_exactly_once() {
        let program = compile(&parse(tokenize("fact = [ $n  if n < 2 then 1 else n * fact(n - 1) ]").unwrap()).unwrap());
        let instructions = disassemble(&program);
        let total: usize = instructions.iter().map(|i| 1 + i.operands.len()).sum();
        assert_eq!(total, program.code.len());
    }

    #[test]
    fn every_instruction_has_a_source_line() {
        let program = compile(&parse(tokenize("1 + 2\n3 * 4").unwrap()).unwrap());
        for instr in disassemble(&program) {
            assert!(instr.line >= 1);
        }
    }
}

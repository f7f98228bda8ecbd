//! Bytecode instruction set for the Blocks VM.
//!
//! Mirrors the table in spec §6: each opcode is a 32-bit signed integer
//! followed by a fixed, opcode-specific number of 32-bit operands. Operand
//! counts are table-driven here so the compiler, disassembler, and VM all
//! consume the same source of truth instead of re-deriving it.

use std::fmt;

/// A single VM instruction.
///
/// The `#[repr(i32)]` discriminants match spec §6 exactly; `Program::code`
/// stores these (and their operands) as raw `i32`s, so the numeric values
/// below are load-bearing, not incidental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(i32)]
pub enum Opcode {
    PushConst = 0,
    LoadLocal = 1,
    StoreLocal = 2,
    LoadGlobal = 3,
    StoreGlobal = 4,
    LoadUpvalue = 5,
    StoreUpvalue = 6,
    BinaryOp = 7,
    Jump = 8,
    JumpIfF = 9,
    MakeBlock = 10,
    Call = 11,
    TailCall = 12,
    Return = 13,
    Halt = 14,
    Pop = 15,
    CallIfClosure = 16,
    TailCallIfClosure = 17,
}

impl Opcode {
    /// Decodes a raw code-array slot into an opcode.
    ///
    /// Returns `None` for any value outside the table — the VM turns that
    /// into an `UnknownOpcode` fault rather than panicking.
    #[must_use]
    pub fn from_i32(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::PushConst,
            1 => Self::LoadLocal,
            2 => Self::StoreLocal,
            3 => Self::LoadGlobal,
            4 => Self::StoreGlobal,
            5 => Self::LoadUpvalue,
            6 => Self::StoreUpvalue,
            7 => Self::BinaryOp,
            8 => Self::Jump,
            9 => Self::JumpIfF,
            10 => Self::MakeBlock,
            11 => Self::Call,
            12 => Self::TailCall,
            13 => Self::Return,
            14 => Self::Halt,
            15 => Self::Pop,
            16 => Self::CallIfClosure,
            17 => Self::TailCallIfClosure,
            _ => return None,
        })
    }

    /// Number of inline 32-bit operands this opcode consumes, per spec §6.
    #[must_use]
    pub const fn operand_count(self) -> usize {
        match self {
            Self::PushConst
            | Self::LoadLocal
            | Self::StoreLocal
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::BinaryOp
            | Self::Jump
            | Self::JumpIfF
            | Self::Call
            | Self::TailCall => 1,
            Self::LoadUpvalue | Self::StoreUpvalue => 2,
            Self::MakeBlock => 3,
            Self::Return | Self::Halt | Self::Pop | Self::CallIfClosure | Self::TailCallIfClosure => 0,
        }
    }
}

impl fmt::Binary for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:b}", *self as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode() {
        for raw in 0..=17 {
            let op = Opcode::from_i32(raw).expect("table entry");
            assert_eq!(op as i32, raw);
        }
    }

    #[test]
    fn rejects_unknown_opcodes() {
        assert!(Opcode::from_i32(18).is_none());
        assert!(Opcode::from_i32(-1).is_none());
    }
}

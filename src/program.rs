//! The compiled program artifact: code array, constant pool, and source map.
//!
//! Grounded on the teacher's `Code`/`CodeBuilder` split (`bytecode/builder.rs`):
//! a growable builder accumulates instructions and constants during
//! compilation, then freezes into an immutable `Program` the VM executes.
//! The teacher packs operands into a byte buffer with per-opcode width;
//! spec §6 fixes every operand at 32 bits, so `Program::code` is a flat
//! `Vec<i32>` instead — simpler, and it's what the disassembler and VM
//! invariants in spec §8 assume.

use std::rc::Rc;

use crate::opcode::Opcode;

/// A pool constant. Integers and strings are scalar and dedupe on equality
/// (spec §4.3); parameter-name lists and operator symbols are emitted fresh
/// per use site and never dedupe.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Str(Rc<str>),
    /// An identifier name, as referenced by `LOAD_GLOBAL`/`STORE_GLOBAL`.
    Name(Rc<str>),
    /// An operator symbol, as referenced by `BINARY_OP`.
    Op(Rc<str>),
    /// A block's ordered parameter names, retained for diagnostics only.
    Params(Rc<[Rc<str>]>),
    /// The nil literal, implicitly pushed for an empty block body.
    Nil,
}

impl Const {
    #[must_use]
    pub fn as_name(&self) -> &str {
        match self {
            Self::Name(s) | Self::Str(s) => s,
            Self::Op(s) => s,
            _ => panic!("pool entry is not a name-shaped constant"),
        }
    }
}

/// Immutable compiled program: code array, constant pool, and source map.
///
/// `source_map.len() == code.len()` always holds (spec §3 invariant,
/// verified by `tests/invariants.rs`).
#[derive(Debug, Clone)]
pub struct Program {
    pub code: Vec<i32>,
    pub pool: Vec<Const>,
    pub source_map: Vec<u32>,
}

/// Accumulates code, constants, and source locations during compilation.
///
/// Mirrors the teacher's `CodeBuilder`: callers `emit_*` instructions, get
/// back patch tokens for forward jumps, and `patch_jump` once the target is
/// known.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<i32>,
    pool: Vec<Const>,
    source_map: Vec<u32>,
    current_line: u32,
}

/// Opaque token identifying a jump operand slot to be patched later.
#[derive(Debug, Clone, Copy)]
pub struct JumpPatch(usize);

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source line attributed to subsequently emitted slots.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    #[must_use]
    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// Current address (index into `code`) of the next emitted opcode.
    #[must_use]
    pub fn here(&self) -> usize {
        self.code.len()
    }

    fn push_slot(&mut self, value: i32) {
        self.code.push(value);
        self.source_map.push(self.current_line);
    }

    pub fn emit0(&mut self, op: Opcode) {
        debug_assert_eq!(op.operand_count(), 0);
        self.push_slot(op as i32);
    }

    pub fn emit1(&mut self, op: Opcode, a: i32) {
        debug_assert_eq!(op.operand_count(), 1);
        self.push_slot(op as i32);
        self.push_slot(a);
    }

    pub fn emit2(&mut self, op: Opcode, a: i32, b: i32) {
        debug_assert_eq!(op.operand_count(), 2);
        self.push_slot(op as i32);
        self.push_slot(a);
        self.push_slot(b);
    }

    pub fn emit3(&mut self, op: Opcode, a: i32, b: i32, c: i32) {
        debug_assert_eq!(op.operand_count(), 3);
        self.push_slot(op as i32);
        self.push_slot(a);
        self.push_slot(b);
        self.push_slot(c);
    }

    /// Emits a jump-family opcode with a placeholder target, returning a
    /// patch token for [`ProgramBuilder::patch_jump`].
    pub fn emit_jump(&mut self, op: Opcode) -> JumpPatch {
        debug_assert!(matches!(op, Opcode::Jump | Opcode::JumpIfF));
        self.push_slot(op as i32);
        let slot = self.code.len();
        self.push_slot(-1);
        JumpPatch(slot)
    }

    /// Patches a previously emitted jump to target the current address.
    pub fn patch_jump(&mut self, patch: JumpPatch) {
        let target = self.here() as i32;
        self.code[patch.0] = target;
    }

    /// Patches an arbitrary already-emitted code slot. Used for a
    /// `MakeBlock`'s entry-address and locals-count operands, both known
    /// only after the block's body has finished compiling.
    pub fn patch_operand(&mut self, addr: usize, value: i32) {
        self.code[addr] = value;
    }

    /// Interns the nil constant, deduping with any other nil use.
    pub fn intern_nil(&mut self) -> i32 {
        self.intern_scalar(Const::Nil)
    }

    /// Interns an integer constant, deduping on equality.
    pub fn intern_int(&mut self, v: i64) -> i32 {
        self.intern_scalar(Const::Int(v))
    }

    /// Interns a string constant, deduping on equality.
    pub fn intern_str(&mut self, s: impl Into<Rc<str>>) -> i32 {
        self.intern_scalar(Const::Str(s.into()))
    }

    /// Interns an identifier name, deduping on equality.
    pub fn intern_name(&mut self, s: impl Into<Rc<str>>) -> i32 {
        self.intern_scalar(Const::Name(s.into()))
    }

    /// Interns an operator symbol, deduping on equality.
    pub fn intern_op(&mut self, s: impl Into<Rc<str>>) -> i32 {
        self.intern_scalar(Const::Op(s.into()))
    }

    fn intern_scalar(&mut self, c: Const) -> i32 {
        if let Some(idx) = self.pool.iter().position(|existing| existing == &c) {
            return idx as i32;
        }
        self.pool.push(c);
        (self.pool.len() - 1) as i32
    }

    /// Interns a parameter-name list. Never dedupes (spec §4.3).
    pub fn intern_params(&mut self, names: Rc<[Rc<str>]>) -> i32 {
        self.pool.push(Const::Params(names));
        (self.pool.len() - 1) as i32
    }

    #[must_use]
    pub fn build(self) -> Program {
        debug_assert_eq!(self.code.len(), self.source_map.len());
        Program {
            code: self.code,
            pool: self.pool,
            source_map: self.source_map,
        }
    }
}

//! Error types for every phase of the pipeline.
//!
//! Grounded on `exception_private.rs`/`resource.rs`: the teacher favors
//! small, closed enums with a hand-written `Display` impl (see
//! `ResourceError`) over a derive-macro error crate, and always carries a
//! source location alongside the fault payload. This crate follows the same
//! shape, one enum per phase (spec §7: lex/parse/runtime are reported
//! differently and never unify into one "exception" users can catch).

use std::fmt;

/// Lexer failure: an unrecognized byte (spec §4.1, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: u32,
    pub byte: u8,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: unrecognized byte {:#04x} ({:?})",
            self.line, self.byte, self.byte as char
        )
    }
}

impl std::error::Error for LexError {}

/// Parser failure: expected-vs-actual token mismatch or unexpected EOF
/// (spec §4.2, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: expected {}, found {}",
            self.line, self.expected, self.actual
        )
    }
}

impl std::error::Error for ParseError {}

/// The closed set of VM runtime faults (spec §7). Every fault aborts the
/// run; there is no user-visible recovery (spec §1 non-goals).
#[derive(Debug, Clone, PartialEq)]
pub enum FaultKind {
    StackOverflow,
    StackUnderflow,
    UndefinedGlobal(String),
    UpvalueNullParent,
    DivisionByZero,
    ModuloByZero,
    InvalidOperands {
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },
    NotCallable,
    UnknownOpcode(i32),
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackOverflow => write!(f, "operand stack overflow"),
            Self::StackUnderflow => write!(f, "operand stack underflow"),
            Self::UndefinedGlobal(name) => write!(f, "undefined global '{name}'"),
            Self::UpvalueNullParent => write!(f, "upvalue lookup reached a null parent"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::InvalidOperands { op, lhs, rhs } => {
                write!(f, "invalid operands for '{op}': {lhs} and {rhs}")
            }
            Self::NotCallable => write!(f, "target is not callable"),
            Self::UnknownOpcode(raw) => write!(f, "unknown opcode {raw}"),
        }
    }
}

/// A runtime fault, annotated with the source line of the faulting
/// instruction (spec §4.5: `sourceMap[max(0, ip-1)]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub kind: FaultKind,
    pub line: u32,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for Fault {}

/// Top-level error returned by [`crate::compile`] and [`crate::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum BlocksError {
    Lex(LexError),
    Parse(ParseError),
    Runtime(Fault),
}

impl fmt::Display for BlocksError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BlocksError {}

impl From<LexError> for BlocksError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

impl From<ParseError> for BlocksError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<Fault> for BlocksError {
    fn from(e: Fault) -> Self {
        Self::Runtime(e)
    }
}

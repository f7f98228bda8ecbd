//! Blocks: lexer, parser, bytecode compiler, and stack VM for a small,
//! expression-oriented, purely-functional toy language (spec §1-§6).
//!
//! The pipeline is a straight line, one module per stage:
//!
//! ```text
//! source  --lexer-->  tokens  --parser-->  AST  --compiler-->  Program  --vm-->  Value
//! ```
//!
//! [`compile`] runs the first three stages and hands back a [`Program`];
//! [`run`] additionally drives a [`Vm`] to completion. Embedders who need
//! finer control — resumable stepping, a custom [`PrintSink`], non-default
//! [`VmLimits`] — build the pipeline by hand from the re-exported pieces.

pub mod ast;
pub mod compiler;
pub mod disasm;
pub mod env;
pub mod error;
pub mod globals;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod program;
pub mod value;
pub mod vm;

pub use disasm::{disassemble, format_instruction, Instruction};
pub use error::{BlocksError, Fault, FaultKind, LexError, ParseError};
pub use globals::{CollectPrint, PrintSink, StdPrint};
pub use opcode::Opcode;
pub use program::{Const, Program};
pub use value::{Closure, Native, NativeFn, Value};
pub use vm::{StepOutcome, Vm, VmLimits};

/// Lexes, parses, and compiles `source` into a [`Program`], without
/// executing it.
pub fn compile(source: &str) -> Result<Program, BlocksError> {
    let tokens = lexer::tokenize(source)?;
    let statements = parser::parse(tokens)?;
    Ok(compiler::compile(&statements))
}

/// Compiles and runs `source` to completion against the default
/// [`VmLimits`], writing `print`'s output through `print`.
pub fn run(source: &str, print: &mut dyn PrintSink) -> Result<Value, BlocksError> {
    let program = compile(source)?;
    let mut vm = Vm::new(program);
    Ok(vm.run(print)?)
}

/// As [`run`], but against caller-supplied resource limits (SPEC_FULL.md
/// §10.3).
pub fn run_with_limits(source: &str, limits: VmLimits, print: &mut dyn PrintSink) -> Result<Value, BlocksError> {
    let program = compile(source)?;
    let mut vm = Vm::with_limits(program, limits);
    Ok(vm.run(print)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_pipeline_runs_end_to_end() {
        let mut sink = CollectPrint::default();
        let result = run("print(1 + 2)", &mut sink).unwrap();
        assert!(matches!(result, Value::Int(3)));
        assert_eq!(sink.lines, vec!["3".to_string()]);
    }

    #[test]
    fn lex_errors_surface_through_the_top_level_api() {
        let mut sink = CollectPrint::default();
        let err = run("@", &mut sink).unwrap_err();
        assert!(matches!(err, BlocksError::Lex(_)));
    }

    #[test]
    fn parse_errors_surface_through_the_top_level_api() {
        let mut sink = CollectPrint::default();
        let err = run("(1", &mut sink).unwrap_err();
        assert!(matches!(err, BlocksError::Parse(_)));
    }
}

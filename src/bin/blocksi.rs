//! Thin CLI driver: reads a `.blk` file, compiles it, and runs it against
//! real stdout (SPEC_FULL.md §10.5).
//!
//! Grounded on `ouros-cli/src/main.rs`: a few dozen lines gluing the
//! library's entry points to argv and stdout, nothing more. This binary is
//! explicitly not part of the public API (spec §1 non-goals: no IDE shell,
//! no example gallery, no debugger UI — just enough to run a script).

use std::env;
use std::fs;
use std::process::ExitCode;

use blocks::{BlocksError, StdPrint};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: blocksi <script.blk>");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut print = StdPrint;
    match blocks::run(&source, &mut print) {
        Ok(value) => {
            println!("{}", value.stringify());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &BlocksError) {
    match err {
        BlocksError::Lex(e) => eprintln!("lex error: {e}"),
        BlocksError::Parse(e) => eprintln!("parse error: {e}"),
        BlocksError::Runtime(e) => eprintln!("runtime fault: {e}"),
    }
}

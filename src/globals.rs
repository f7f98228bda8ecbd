//! The print sink trait and the pre-populated global environment (spec §6).
//!
//! `PrintSink` mirrors the teacher's `PrintWriter`/`StdPrint` split in
//! `io.rs`: the VM never writes to `stdout` directly, it writes through an
//! injected sink, so embedders (and tests) can capture output instead of
//! inheriting the process's real stdout.

use std::fmt;
use std::rc::Rc;

use crate::error::FaultKind;
use crate::value::{Native, NativeFn, Value};

/// Where `print` output goes. Grounded on `io.rs`'s `PrintWriter` trait.
pub trait PrintSink {
    fn write_line(&mut self, line: &str);
}

/// Writes to the process's real stdout (spec §6, `print`). Grounded on
/// `io.rs`'s `StdPrint`.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintSink for StdPrint {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Captures output in memory instead of touching the real stdout. Used by
/// the test suite and by embedders that want to inspect printed output.
#[derive(Debug, Default)]
pub struct CollectPrint {
    pub lines: Vec<String>,
}

impl PrintSink for CollectPrint {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

macro_rules! native_fn {
    ($name:literal, $func:path) => {
        Value::Native(NativeFn {
            name: Rc::from($name),
            func: Rc::new(FnPtr($func)),
        })
    };
}

/// Wraps a bare `fn` pointer so it can implement [`Native`]; spares every
/// builtin from hand-writing a zero-sized struct (spec §6 lists only three
/// natives, so a single adapter is simpler than one type per builtin).
struct FnPtr(fn(&[Value], &mut dyn PrintSink) -> Result<Value, FaultKind>);

impl fmt::Debug for FnPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

impl Native for FnPtr {
    fn call(&self, args: &[Value], print: &mut dyn PrintSink) -> Result<Value, FaultKind> {
        (self.0)(args, print)
    }
}

fn arity_fault(expected: usize, got: usize) -> FaultKind {
    FaultKind::InvalidOperands {
        op: format!("call (expected {expected} argument(s), got {got})"),
        lhs: "",
        rhs: "",
    }
}

/// `print(...args)` — variadic (spec §6): writes every argument
/// stringified and space-separated as one line, and returns the last
/// argument (or `Nil` if called with none), so `print` composes inside
/// larger expressions.
fn native_print(args: &[Value], print: &mut dyn PrintSink) -> Result<Value, FaultKind> {
    let line = args.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
    print.write_line(&line);
    Ok(args.last().cloned().unwrap_or(Value::Nil))
}

/// `to_s(x)` — converts any value to its string representation (spec §6).
fn native_to_s(args: &[Value], _print: &mut dyn PrintSink) -> Result<Value, FaultKind> {
    let [value] = args else {
        return Err(arity_fault(1, args.len()));
    };
    Ok(Value::Str(Rc::from(value.stringify().as_str())))
}

/// `to_n(x)` — parses a leading base-10 integer from `x`'s default
/// stringification (spec §6); never faults, yielding `Int 0` when no
/// leading integer is present.
fn native_to_n(args: &[Value], _print: &mut dyn PrintSink) -> Result<Value, FaultKind> {
    let [value] = args else {
        return Err(arity_fault(1, args.len()));
    };
    Ok(Value::Int(leading_int(&value.stringify())))
}

/// Scans an optional sign followed by a run of ASCII digits from the
/// start of `s`; `0` if none is present.
fn leading_int(s: &str) -> i64 {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return 0;
    }
    s[..i].parse().unwrap_or(0)
}

/// Name/value pairs the VM seeds its global namespace with before running
/// any user code (spec §6).
#[must_use]
pub fn builtins() -> Vec<(&'static str, Value)> {
    vec![
        ("print", native_fn!("print", native_print)),
        ("to_s", native_fn!("to_s", native_to_s)),
        ("to_n", native_fn!("to_n", native_to_n)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_returns_its_last_argument() {
        let mut sink = CollectPrint::default();
        let result = native_print(&[Value::Int(5)], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(5)));
        assert_eq!(sink.lines, vec!["5".to_string()]);
    }

    #[test]
    fn print_is_variadic_and_space_separates() {
        let mut sink = CollectPrint::default();
        let result = native_print(&[Value::Str(Rc::from("Sum:")), Value::Int(30)], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(30)));
        assert_eq!(sink.lines, vec!["Sum: 30".to_string()]);
    }

    #[test]
    fn print_with_no_arguments_returns_nil() {
        let mut sink = CollectPrint::default();
        let result = native_print(&[], &mut sink).unwrap();
        assert_eq!(result, Value::Nil);
        assert_eq!(sink.lines, vec![String::new()]);
    }

    #[test]
    fn to_n_parses_digit_strings() {
        let mut sink = CollectPrint::default();
        let result = native_to_n(&[Value::Str(Rc::from("42"))], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn to_n_parses_a_leading_integer_and_ignores_the_rest() {
        let mut sink = CollectPrint::default();
        let result = native_to_n(&[Value::Str(Rc::from("42abc"))], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(42)));
    }

    #[test]
    fn to_n_never_faults_and_defaults_to_zero() {
        let mut sink = CollectPrint::default();
        let result = native_to_n(&[Value::Str(Rc::from("abc"))], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(0)));
    }

    #[test]
    fn to_n_stringifies_non_string_values_first() {
        let mut sink = CollectPrint::default();
        let result = native_to_n(&[Value::Nil], &mut sink).unwrap();
        assert!(matches!(result, Value::Int(0)));
    }

    #[test]
    fn builtins_cover_the_spec_list() {
        let names: Vec<_> = builtins().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["print", "to_s", "to_n"]);
    }
}

//! End-to-end scenarios (spec §8): each exercises the full
//! lex/parse/compile/run pipeline through the public API only.

use blocks::{BlocksError, CollectPrint, Value};
use pretty_assertions::assert_eq;

fn run(src: &str) -> (Value, Vec<String>) {
    let mut sink = CollectPrint::default();
    let value = blocks::run(src, &mut sink).expect("program runs without fault");
    (value, sink.lines)
}

#[test]
fn arithmetic_and_print() {
    // Spec §8 scenario 1, verbatim: `print` is variadic and space-separates.
    let (value, printed) = run("x = 10\ny = 20\nprint(\"Sum:\", x + y)");
    assert!(matches!(value, Value::Int(30)));
    assert_eq!(printed, vec!["Sum: 30".to_string()]);
}

#[test]
fn recursive_factorial() {
    let (value, _) = run("fact = [ $n  if n < 2 then 1 else n * fact(n - 1) ]\nfact(6)");
    assert!(matches!(value, Value::Int(720)));
}

#[test]
fn closure_capture_and_currying() {
    let (value, _) = run(
        r"
        adder = [ $x  [ $y  x + y ] ]
        add10 = adder(10)
        add10(32)
        ",
    );
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn tail_recursive_counter_to_100000_without_overflow() {
    let (value, _) = run("count = [ $n  $acc  if n == 0 then acc else count(n - 1, acc + 1) ]\ncount(100000, 0)");
    assert!(matches!(value, Value::Int(100_000)));
}

#[test]
fn string_subtraction_operators_slice_from_either_end() {
    let (value, _) = run(r#""hello world" - 6"#);
    match value {
        Value::Str(s) => assert_eq!(&*s, "hello"),
        other => panic!("expected string, got {other:?}"),
    }

    let (value, _) = run(r#"6 - "hello world""#);
    match value {
        Value::Str(s) => assert_eq!(&*s, "world"),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn implicit_local_shadows_outer_binding_inside_a_block() {
    let (value, _) = run(
        r"
        x = 1
        f = [ x = 2  x ]
        f()
        x
        ",
    );
    // the block's `x` shadows the outer one; the outer `x` is untouched.
    assert!(matches!(value, Value::Int(1)));
}

#[test]
fn non_block_assignment_reads_the_outer_binding_before_rebinding() {
    // spec §9 "Recursion via pre-binding": for any RHS other than a block
    // literal, the name is resolved *after* the RHS compiles, so `x = x + 1`
    // inside a block reads the outer (global) `x` rather than a
    // freshly-declared, zero-valued local of the same name.
    let (value, _) = run("x = 5\nf = [ x = x + 1  x ]\nf()");
    assert!(matches!(value, Value::Int(6)));
}

#[test]
fn unassigned_local_slot_defaults_to_int_zero_not_nil() {
    // spec §4.5's calling convention: extra/unassigned local slots default
    // to `Int 0`, so an un-taken branch that would have assigned `x` still
    // leaves `x` usable in arithmetic.
    let (value, _) = run("f = [ $n  if n > 0 then x = 99 else 0  x + 1 ]\nf(-1)");
    assert!(matches!(value, Value::Int(1)));
}

#[test]
fn an_unrecognized_byte_is_reported_as_a_lex_error() {
    let mut sink = CollectPrint::default();
    let err = blocks::run("1 @ 2", &mut sink).unwrap_err();
    assert!(matches!(err, BlocksError::Lex(_)));
}

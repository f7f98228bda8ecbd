//! Quantified properties from spec §8, checked against a handful of
//! representative programs rather than via mechanical round-trip grids.

use blocks::{disassemble, CollectPrint, Value, Vm, VmLimits};

const PROGRAMS: &[&str] = &[
    "1 + 2",
    "fact = [ $n  if n < 2 then 1 else n * fact(n - 1) ]\nfact(5)",
    "adder = [ $x  [ $y  x + y ] ]\nadder(1)(2)",
    r#""abc" * 3"#,
    "x = 1\nf = [ x = 2  x ]\nf()\nx",
];

#[test]
fn every_program_has_a_total_source_map() {
    for src in PROGRAMS {
        let program = blocks::compile(src).unwrap();
        assert_eq!(program.code.len(), program.source_map.len(), "program: {src}");
    }
}

#[test]
fn disassembly_consumes_the_entire_code_array_with_no_overlap() {
    for src in PROGRAMS {
        let program = blocks::compile(src).unwrap();
        let instructions = disassemble(&program);
        let mut expected_ip = 0;
        for instr in &instructions {
            assert_eq!(instr.ip, expected_ip, "program: {src}");
            expected_ip += 1 + instr.operands.len();
        }
        assert_eq!(expected_ip, program.code.len(), "program: {src}");
    }
}

#[test]
fn repeated_runs_of_the_same_program_are_deterministic() {
    for src in PROGRAMS {
        let program = blocks::compile(src).unwrap();
        let first = {
            let mut vm = Vm::new(program.clone());
            let mut sink = CollectPrint::default();
            format!("{:?}", vm.run(&mut sink).unwrap())
        };
        let second = {
            let mut vm = Vm::new(program);
            let mut sink = CollectPrint::default();
            format!("{:?}", vm.run(&mut sink).unwrap())
        };
        assert_eq!(first, second, "program: {src}");
    }
}

#[test]
fn assignment_evaluates_to_the_assigned_value() {
    let mut sink = CollectPrint::default();
    let value = blocks::run("y = 41 + 1", &mut sink).unwrap();
    assert!(matches!(value, Value::Int(42)));
}

#[test]
fn tail_recursion_runs_in_constant_call_stack_depth() {
    let program = blocks::compile(
        "count = [ $n  if n == 0 then 0 else count(n - 1) ]\ncount(5000)",
    )
    .unwrap();
    let mut vm = Vm::new(program);
    let mut sink = CollectPrint::default();
    let mut max_depth = 0;
    loop {
        match vm.step(&mut sink).unwrap() {
            blocks::StepOutcome::Running => {
                max_depth = max_depth.max(vm.call_depth());
            }
            blocks::StepOutcome::Halted(v) => {
                assert!(matches!(v, Value::Int(0)));
                break;
            }
        }
    }
    // A non-tail-recursive equivalent would reach a call depth proportional
    // to n (5000); tail-call frame reuse keeps it at the single top-level
    // invocation.
    assert!(max_depth <= 1, "call depth grew with recursion: {max_depth}");
}

#[test]
fn exceeding_the_call_depth_limit_faults_instead_of_overflowing_the_host_stack() {
    let program = blocks::compile("f = [ 1 + f() ]\nf()").unwrap();
    let limits = VmLimits {
        operand_stack_capacity: 4096,
        max_call_depth: 64,
    };
    let mut vm = Vm::with_limits(program, limits);
    let mut sink = CollectPrint::default();
    let err = vm.run(&mut sink).unwrap_err();
    assert!(matches!(err.kind, blocks::FaultKind::StackOverflow));
}

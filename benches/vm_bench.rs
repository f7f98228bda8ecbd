//! Criterion benchmarks for the two shapes spec §8 calls out: a
//! tail-recursive loop (constant call-stack depth) and a naive recursive
//! function (call-stack depth proportional to input). Grounded on the
//! teacher's workspace benches, which likewise pair a Criterion harness
//! with a couple of representative programs rather than a microbenchmark
//! per opcode.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use blocks::{CollectPrint, Program, Vm};

fn compiled(src: &str) -> Program {
    blocks::compile(src).expect("benchmark program compiles")
}

fn bench_tail_recursive_counter(c: &mut Criterion) {
    let program = compiled("count = [ $n  $acc  if n == 0 then acc else count(n - 1, acc + 1) ]\ncount(10000, 0)");
    c.bench_function("tail_recursive_counter_10k", |b| {
        b.iter(|| {
            let mut vm = Vm::new(program.clone());
            let mut sink = CollectPrint::default();
            black_box(vm.run(&mut sink).unwrap());
        });
    });
}

fn bench_naive_recursive_factorial(c: &mut Criterion) {
    let program = compiled("fact = [ $n  if n < 2 then 1 else n * fact(n - 1) ]\nfact(15)");
    c.bench_function("naive_recursive_factorial_15", |b| {
        b.iter(|| {
            let mut vm = Vm::new(program.clone());
            let mut sink = CollectPrint::default();
            black_box(vm.run(&mut sink).unwrap());
        });
    });
}

criterion_group!(benches, bench_tail_recursive_counter, bench_naive_recursive_factorial);
criterion_main!(benches);

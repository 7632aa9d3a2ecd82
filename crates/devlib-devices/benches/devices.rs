//! Benchmarks for source loading and expression evaluation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use devlib_core::{AnalysisMode, Circuit, DeckLine};
use devlib_devices::{DevLib, ModelTable, ParseTree};

/// A ladder of `n` stages, each an independent source driving a VCVS
/// and a nonlinear current source.
fn ladder(n: usize) -> (DevLib, Circuit, ModelTable) {
    let lib = DevLib::builtin();
    let mut ckt = Circuit::new();
    let mut models = ModelTable::new();
    for k in 0..n {
        for text in [
            format!("v{k} in{k} 0 dc 1 ac 1"),
            format!("e{k} out{k} 0 in{k} 0 2"),
            format!("a{k} out{k} 0 function 'v(in{k})*v(out{k}) + tanh(v(in{k}))'"),
        ] {
            let mut line = DeckLine::new(k + 1, text);
            lib.parse(&mut line, &mut ckt, &mut models).unwrap();
        }
    }
    lib.setup_all(&mut models, &mut ckt).unwrap();
    (lib, ckt, models)
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_load");

    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, &size| {
            let (lib, mut ckt, mut models) = ladder(size);
            bencher.iter(|| {
                ckt.begin_load(AnalysisMode::Dc);
                lib.preload_all(&mut models, &mut ckt).unwrap();
                lib.load_all(black_box(&mut models), black_box(&mut ckt)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_expression(c: &mut Criterion) {
    let tree = ParseTree::parse("v(a)*v(b) + 2*exp(v(a) - v(c)) / (1 + v(b)^2)").unwrap();
    let x = [0.3, 0.7, 0.1];
    c.bench_function("expression_eval", |bencher| {
        let mut d = [0.0; 3];
        bencher.iter(|| tree.eval(black_box(&x), 0.0, &mut d).unwrap());
    });
}

criterion_group!(benches, bench_load, bench_expression);
criterion_main!(benches);

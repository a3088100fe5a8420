//! Benchmarks for kernels and end-to-end evaluation.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use fd_expr::kernels::{pairwise, rolling};
use fd_expr::{Engine, EngineConfig, Panel};
use rand::Rng;

fn random_walk(n: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let mut price = 100.0;
    (0..n)
        .map(|_| {
            price *= 1.0 + rng.gen_range(-0.02..0.02);
            price
        })
        .collect()
}

fn panel(symbols: usize, days: usize) -> Panel {
    let mut entities = Vec::with_capacity(symbols * days);
    let mut dates = Vec::with_capacity(symbols * days);
    let mut close = Vec::with_capacity(symbols * days);
    let mut volume = Vec::with_capacity(symbols * days);
    let walks: Vec<Vec<f64>> = (0..symbols).map(|_| random_walk(days)).collect();
    for day in 0..days {
        for (symbol, walk) in walks.iter().enumerate() {
            entities.push(format!("S{symbol:04}"));
            dates.push(format!("D{day:05}"));
            close.push(walk[day]);
            volume.push(1e6 + walk[day] * 1e3);
        }
    }
    Panel::new(entities, dates)
        .and_then(|p| p.with_field("close", close))
        .and_then(|p| p.with_field("volume", volume))
        .unwrap()
}

fn benchmark_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernels");
    for n in [250, 2500] {
        let x = random_walk(n);
        let y = random_walk(n);
        group.bench_with_input(BenchmarkId::new("moving_average_20", n), &x, |b, x| {
            b.iter(|| rolling::moving_average(black_box(x), 20))
        });
        group.bench_with_input(BenchmarkId::new("rolling_rank_20", n), &x, |b, x| {
            b.iter(|| rolling::rolling_rank(black_box(x), 20))
        });
        group.bench_with_input(BenchmarkId::new("rolling_corr_20", n), &(x.clone(), y), |b, (x, y)| {
            b.iter(|| pairwise::rolling_corr(black_box(x), black_box(y), 20))
        });
        group.bench_with_input(BenchmarkId::new("rsrs_18", n), &x, |b, x| {
            let low: Vec<f64> = x.iter().map(|v| v * 0.98).collect();
            b.iter(|| pairwise::rsrs(black_box(x), black_box(&low), 18))
        });
    }
    group.finish();
}

fn benchmark_evaluation(c: &mut Criterion) {
    let panel = panel(200, 250);
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let sequential = Engine::new(EngineConfig {
        parallel: false,
        ..EngineConfig::default()
    })
    .unwrap();
    let expression = "rank(roc(close, 5)) / std(volume, 20)";

    c.bench_function("evaluate_parallel", |b| {
        b.iter(|| engine.evaluate(black_box(expression), &panel).unwrap())
    });

    c.bench_function("evaluate_sequential", |b| {
        b.iter(|| sequential.evaluate(black_box(expression), &panel).unwrap())
    });
}

criterion_group!(benches, benchmark_kernels, benchmark_evaluation);
criterion_main!(benches);

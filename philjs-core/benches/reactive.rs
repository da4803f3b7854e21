//! Benchmark: signal write propagation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use philjs_core::reactive::{batch, Effect, Memo, Signal};
use philjs_core::ssr::render_to_string;
use philjs_core::view::{dynamic, jsx, Props};

fn signal_to_effect(c: &mut Criterion) {
    let count = Signal::new(0u64);
    let source = count.clone();
    let _effect = Effect::new(move || {
        black_box(source.get());
    });

    c.bench_function("signal_set_effect", |b| {
        b.iter(|| count.update(|n| n + 1));
    });
}

fn memo_chain(c: &mut Criterion) {
    let base = Signal::new(0u64);
    let mut last = {
        let base = base.clone();
        Memo::new(move || base.get() + 1)
    };
    for _ in 0..32 {
        let prev = last.clone();
        last = Memo::new(move || prev.get() + 1);
    }
    let tail = last.clone();
    let _effect = Effect::new(move || {
        black_box(tail.get());
    });

    c.bench_function("memo_chain_32", |b| {
        b.iter(|| base.update(|n| n + 1));
    });
}

fn batched_writes(c: &mut Criterion) {
    let signals: Vec<Signal<u64>> = (0..16).map(Signal::new).collect();
    let sources = signals.clone();
    let _effect = Effect::new(move || {
        black_box(sources.iter().map(|s| s.get()).sum::<u64>());
    });

    c.bench_function("batch_16_writes", |b| {
        b.iter(|| {
            batch(|| {
                for signal in &signals {
                    signal.update(|n| n + 1);
                }
            })
        });
    });
}

fn ssr_list(c: &mut Criterion) {
    let items = Signal::new((0..100).collect::<Vec<u32>>());
    let node = jsx(
        "ul",
        Props::new().child(dynamic(move || {
            items
                .get()
                .into_iter()
                .map(|i| jsx("li", Props::new().child(i), None))
                .collect::<Vec<_>>()
        })),
        None,
    );

    c.bench_function("ssr_list_100", |b| {
        b.iter(|| black_box(render_to_string(&node)));
    });
}

criterion_group!(benches, signal_to_effect, memo_chain, batched_writes, ssr_list);
criterion_main!(benches);

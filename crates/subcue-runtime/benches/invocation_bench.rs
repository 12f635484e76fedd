//! Benchmark: command-line parsing, registry lookup and undoable execution.
//!
//! Run with: `cargo bench -p subcue-runtime --bench invocation_bench`
//!
//! Hotkeys fire on every key press, so parsing and dispatch sit on the
//! interactive path; reloads happen while lookups keep running.

use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use subcue_core::{Selection, SubtitleEvent};
use subcue_runtime::{CommandRegistry, Editor, Engine, EngineOptions, parse_cmdline};

const CMDLINES: &[(&str, &str)] = &[
    ("short", "undo"),
    ("selector", "sub-insert --after --no-align"),
    ("time", "audio-shift-sel -s=+10f -e ns.e+500ms"),
    ("chain", "seek -p=cs.s; pause off; sub-shift -t 1...5 -d -2f --start-only"),
];

fn editor(n: usize) -> Editor {
    let mut ed = Editor::headless();
    for i in 0..n as i64 {
        ed.document
            .push(SubtitleEvent::new(i * 1000, i * 1000 + 900).with_text("line"));
    }
    ed.selection = Selection::of_indexes(&ed.document, &[n / 2]);
    ed
}

// ===========================================================================
// Parsing
// ===========================================================================

fn bench_parse(c: &mut Criterion) {
    let registry = CommandRegistry::with_builtins();
    let table = registry.snapshot();
    let mut group = c.benchmark_group("parse_cmdline");
    for (name, cmdline) in CMDLINES {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(parse_cmdline(&table, black_box(cmdline))));
        });
    }
    group.finish();
}

// ===========================================================================
// Lookup under reload pressure
// ===========================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    let registry = CommandRegistry::with_builtins();
    group.bench_function("single_thread", |b| {
        b.iter(|| black_box(registry.resolve(black_box("sub-duplicate"))));
    });

    group.bench_function("readers_with_reloads", |b| {
        let registry = Arc::new(CommandRegistry::with_builtins());
        b.iter(|| {
            let barrier = Arc::new(Barrier::new(5));
            let writer = {
                let r = Arc::clone(&registry);
                let bar = Arc::clone(&barrier);
                thread::spawn(move || {
                    bar.wait();
                    for _ in 0..10 {
                        black_box(r.reload());
                        thread::yield_now();
                    }
                })
            };
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let r = Arc::clone(&registry);
                    let bar = Arc::clone(&barrier);
                    thread::spawn(move || {
                        bar.wait();
                        for _ in 0..1_000 {
                            black_box(r.resolve("seek").is_ok());
                        }
                    })
                })
                .collect();
            writer.join().unwrap();
            for h in readers {
                h.join().unwrap();
            }
        });
    });

    group.finish();
}

// ===========================================================================
// Execution
// ===========================================================================

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let mut engine = Engine::new(
        Arc::new(CommandRegistry::with_builtins()),
        &EngineOptions::default(),
    );

    for size in [100usize, 10_000] {
        group.bench_function(format!("shift/{size}"), |b| {
            b.iter_batched(
                || editor(size),
                |mut ed| black_box(engine.run_cmdline(&mut ed, "sub-shift -t all -d 100ms")),
                BatchSize::LargeInput,
            );
        });
        group.bench_function(format!("insert_undo/{size}"), |b| {
            let mut ed = editor(size);
            b.iter(|| {
                black_box(engine.run_cmdline(&mut ed, "sub-insert --after; undo"));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_resolve, bench_execute);
criterion_main!(benches);

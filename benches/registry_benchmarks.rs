//! Performance benchmarks for plugin lookup and call-site substitution.
//!
//! Three groups:
//! - `registry/lookup`: probe cost against open, resolved, and chained
//!   registries, hits and misses
//! - `registry/dispatch`: one full call-site substitution per iteration
//! - `registry/registration`: filling and sealing a registry from scratch
//!
//! ## Profiling with Puffin
//!
//! Run with the `profile-with-puffin` feature to collect timings from the
//! instrumented lookup and dispatch paths:
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use trellis::plugins::{ARRAY_TYPE, INTEGER_TYPE, MATH_TYPE};
use trellis::prelude::*;

/// Initialize puffin profiler.
#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    // The global frame view registers itself as a sink
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of a benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

/// Print accumulated top-level scope timings.
#[cfg(feature = "profile-with-puffin")]
fn print_profiling_stats() {
    use std::collections::HashMap;

    use puffin::Reader;

    let Some(frame_view) = FRAME_VIEW.get() else {
        println!("Profiler not initialized");
        return;
    };

    let view = frame_view.lock();
    let scope_collection = view.scope_collection();

    let mut totals: HashMap<String, i64> = HashMap::new();
    let mut frame_count = 0i64;
    for frame in view.recent_frames() {
        frame_count += 1;
        let unpacked = match frame.unpacked() {
            Ok(u) => u,
            Err(_) => continue,
        };
        for (_thread_info, stream_info) in unpacked.thread_streams.iter() {
            let reader = Reader::from_start(&stream_info.stream);
            let Ok(scopes) = reader.read_top_scopes() else {
                continue;
            };
            for scope in scopes {
                if let Some(details) = scope_collection.fetch_by_id(&scope.id) {
                    *totals.entry(details.name().to_string()).or_insert(0) +=
                        scope.record.duration_ns;
                }
            }
        }
    }

    println!("\n=== Profiling Summary ({} frames) ===", frame_count);
    let mut entries: Vec<_> = totals.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (name, ns) in entries {
        let avg_ns = if frame_count > 0 { ns / frame_count } else { ns };
        println!(
            "  {:30} {:>10.2?} avg",
            name,
            std::time::Duration::from_nanos(avg_ns as u64)
        );
    }
    println!("=====================================\n");
}

#[cfg(not(feature = "profile-with-puffin"))]
fn print_profiling_stats() {}

fn method(declaring: &str, name: &str, descriptor: &str, is_static: bool) -> Arc<MethodRef> {
    Arc::new(MethodRef::new(
        TypeName::new(declaring),
        name,
        descriptor,
        is_static,
    ))
}

/// Every method the standard suite binds.
fn standard_methods() -> Vec<Arc<MethodRef>> {
    vec![
        method(MATH_TYPE, "abs", "(I)I", true),
        method(MATH_TYPE, "abs", "(J)J", true),
        method(MATH_TYPE, "min", "(II)I", true),
        method(MATH_TYPE, "max", "(II)I", true),
        method(MATH_TYPE, "sqrt", "(D)D", true),
        method(INTEGER_TYPE, "reverse_bytes", "(I)I", true),
        method(INTEGER_TYPE, "reverse_bytes", "(J)J", true),
        method(INTEGER_TYPE, "divide", "(II)I", true),
        method(INTEGER_TYPE, "divide_unsigned", "(II)I", true),
        method(INTEGER_TYPE, "saturating_add", "(II)I", true),
        method(ARRAY_TYPE, "alloc", "(I)[I", true),
        method(ARRAY_TYPE, "length", "()I", false),
    ]
}

fn standard_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    register_standard(&registry).unwrap();
    registry.seal().unwrap();
    registry
}

/// Snapshot an open registry into the frozen hash-probe form.
fn resolved_registry(open: &PluginRegistry) -> PluginRegistry {
    let entries: Vec<_> = standard_methods()
        .into_iter()
        .map(|m| {
            let plugin = open.lookup(&m).unwrap().unwrap();
            ((*m).clone(), plugin)
        })
        .collect();
    PluginRegistry::resolved(entries)
}

/// Benchmark lookup cost across registry shapes.
fn lookup_benchmarks(c: &mut Criterion) {
    setup_profiler();

    let open = standard_registry();
    let resolved = resolved_registry(&open);
    let parent = Arc::new(standard_registry());
    let child = PluginRegistry::new().with_parent(Arc::clone(&parent));
    child.seal().unwrap();

    let methods = standard_methods();
    let miss = method(MATH_TYPE, "cbrt", "(D)D", true);
    let abs = method(MATH_TYPE, "abs", "(I)I", true);

    let mut group = c.benchmark_group("registry/lookup");

    group.throughput(Throughput::Elements(methods.len() as u64));
    group.bench_function("open_hit_batch", |b| {
        b.iter(|| {
            for m in &methods {
                black_box(open.lookup(black_box(m)).unwrap());
            }
            end_profiling_frame();
        });
    });

    group.throughput(Throughput::Elements(methods.len() as u64));
    group.bench_function("resolved_hit_batch", |b| {
        b.iter(|| {
            for m in &methods {
                black_box(resolved.lookup(black_box(m)).unwrap());
            }
            end_profiling_frame();
        });
    });

    group.throughput(Throughput::Elements(1));
    group.bench_function("open_miss", |b| {
        b.iter(|| black_box(open.lookup(black_box(&miss)).unwrap()));
    });

    // The child is empty, so every probe walks up to the parent
    group.throughput(Throughput::Elements(1));
    group.bench_function("parent_chain_hit", |b| {
        b.iter(|| black_box(child.lookup(black_box(&abs)).unwrap()));
    });

    group.finish();

    print_profiling_stats();
}

/// Benchmark a full call-site substitution, from lookup to finished graph.
fn dispatch_benchmarks(c: &mut Criterion) {
    let registry = standard_registry();
    let abs = method(MATH_TYPE, "abs", "(I)I", true);
    let divide = method(INTEGER_TYPE, "divide", "(II)I", true);
    let miss = method(MATH_TYPE, "cbrt", "(D)D", true);

    let mut group = c.benchmark_group("registry/dispatch");

    group.bench_function("substitute_abs", |b| {
        b.iter(|| {
            let mut builder = FragmentBuilder::for_invocation(
                Arc::clone(&abs),
                InvokeKind::Static,
                BuilderConfig::new(),
            )
            .unwrap();
            let args = [builder.arg(0)];
            assert!(try_substitute(&mut builder, &registry, &abs, &args).unwrap());
            let graph = builder.finish().unwrap();
            end_profiling_frame();
            black_box(graph.node_count())
        });
    });

    // Explicit mode builds the zero check, so the fragment is larger
    group.bench_function("substitute_divide_explicit", |b| {
        let config = BuilderConfig::new().with_exception_mode(ExceptionMode::Explicit);
        b.iter(|| {
            let mut builder = FragmentBuilder::for_invocation(
                Arc::clone(&divide),
                InvokeKind::Static,
                config.clone(),
            )
            .unwrap();
            let args = [builder.arg(0), builder.arg(1)];
            assert!(try_substitute(&mut builder, &registry, &divide, &args).unwrap());
            let graph = builder.finish().unwrap();
            end_profiling_frame();
            black_box(graph.node_count())
        });
    });

    group.bench_function("unbound_fallthrough", |b| {
        b.iter(|| {
            let mut builder = FragmentBuilder::for_invocation(
                Arc::clone(&miss),
                InvokeKind::Static,
                BuilderConfig::new(),
            )
            .unwrap();
            let args = [builder.arg(0)];
            assert!(!try_substitute(&mut builder, &registry, &miss, &args).unwrap());
            black_box(args[0])
        });
    });

    group.finish();
}

/// Benchmark registry construction.
fn registration_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry/registration");

    group.bench_function("standard_suite_seal", |b| {
        b.iter(|| {
            let registry = PluginRegistry::new();
            register_standard(&registry).unwrap();
            registry.seal().unwrap();
            black_box(registry.binding_count())
        });
    });

    group.bench_function("resolved_snapshot", |b| {
        let open = standard_registry();
        b.iter(|| {
            let resolved = resolved_registry(&open);
            black_box(resolved.binding_count())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    lookup_benchmarks,
    dispatch_benchmarks,
    registration_benchmarks
);

criterion_main!(benches);

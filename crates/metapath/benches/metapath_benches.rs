use std::hint::black_box;
use std::num::NonZeroUsize;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use metapath::simple_node::{SimpleNodeBuilder, assembly, cycled, doc, field, flag};
use metapath::{CompileCache, SimpleNode, compile};

/// A catalog of groups, each holding controls with nested parts. Every
/// innermost part ends in a cycle marker.
fn create_catalog(groups: usize, controls: usize) -> SimpleNode {
    let mut catalog = assembly("catalog")
        .flag(flag("uuid", "74c8ba1e-5cd4-4ad1-bbfd-d888e2f6c724"))
        .child(field("title", "Benchmark Catalog"));
    for g in 0..groups {
        let mut group = assembly("group")
            .flag(flag("id", &format!("g-{g}")))
            .child(field("title", &format!("Group {g}")));
        for c in 0..controls {
            let part: SimpleNodeBuilder = assembly("part")
                .flag(flag("name", "statement"))
                .child(field("prose", &format!("Statement for control {g}.{c}")))
                .child(assembly("part").flag(flag("name", "item")).child(cycled("part")));
            group = group.child(
                assembly("control")
                    .flag(flag("id", &format!("c-{g}-{c}")))
                    .flag(flag("rank", &c.to_string()))
                    .child(field("title", &format!("Control {g}.{c}")))
                    .child(part),
            );
        }
        catalog = catalog.child(group);
    }
    doc().child(catalog).build()
}

fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let sources = [
        ("simple_path", "/catalog/group/control"),
        ("predicate", "//control[@id = 'c-3-4']/title"),
        ("let_if", "let $n := count(//control) return if ($n > 10) then 'many' else 'few'"),
        ("arithmetic", "(1 + 2) * 3 div 4 idiv 5 mod 6 - -7"),
    ];
    for (name, src) in sources {
        group.bench_with_input(BenchmarkId::new("parse", name), &src, |b, src| {
            b.iter(|| black_box(compile(black_box(src)).unwrap()));
        });
    }
    let cache = CompileCache::new(NonZeroUsize::new(64).unwrap());
    group.bench_function("cached", |b| {
        b.iter(|| black_box(cache.get_or_compile("//control[@id = 'c-3-4']/title").unwrap()));
    });
    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for (groups, controls) in [(10, 10), (50, 20)] {
        let document = create_catalog(groups, controls);
        let cases = [
            ("search", "//title"),
            ("search_predicate", "//control[@rank = '5']/title"),
            ("descendant_axis", "descendant::part"),
            ("union", "//control | //group/control"),
            ("aggregate", "sum(//control/@rank)"),
        ];
        for (name, src) in cases {
            let compiled = compile(src).unwrap();
            group.bench_with_input(
                BenchmarkId::new(name, groups * controls),
                &document,
                |b, document| {
                    b.iter(|| black_box(compiled.evaluate(document).unwrap()));
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, benchmark_compile, benchmark_evaluate);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modlock_core::lockfile::{LockFileModuleExtension, Lockfile, ResolutionInputs};
use modlock_core::model::{Label, Module, ModuleExtensionId, ModuleExtensionUsage, ModuleKey, RepoSpec, Version};
use modlock_core::{Location, ScriptGraph, TransitiveDigest};
use std::collections::BTreeMap;
use std::path::Path;

fn script_label(index: usize) -> Label {
    Label::parse_canonical(&format!("//lib:file{}.bzl", index)).unwrap()
}

/// A chain of scripts where each one loads the next two
fn chained_graph(size: usize) -> ScriptGraph {
    let mut graph = ScriptGraph::new();
    for i in 0..size {
        let loads = [i + 1, i + 2]
            .into_iter()
            .filter(|next| *next < size)
            .map(script_label);
        let content = format!("def helper_{}(ctx):\n    return {}\n", i, i).repeat(20);
        graph.insert(script_label(i), content.into_bytes(), loads);
    }
    graph
}

fn lockfile_with_extensions(count: usize) -> Lockfile {
    let mut root = Module::root("root", Version::EMPTY);
    let mut entries = BTreeMap::new();
    for i in 0..count {
        let id = ModuleExtensionId::new(script_label(i), "deps");
        let usage = ModuleExtensionUsage::new(id.clone(), Location::new("MODULE.bazel", i as u32 + 1, 1))
            .with_import("repo", "repo");
        root = root.with_usage(usage);
        let specs = BTreeMap::from([(
            "repo".to_string(),
            RepoSpec::new("http_archive").with_attr("url", format!("https://example.com/{}.tar.gz", i)),
        )]);
        entries.insert(id, LockFileModuleExtension::new(TransitiveDigest::of_content(&[i as u8]), specs));
    }

    let mut lockfile = Lockfile::new(ResolutionInputs {
        module_dep_graph: BTreeMap::from([(ModuleKey::ROOT, root)]),
        ..ResolutionInputs::default()
    });
    lockfile.module_extensions = entries;
    lockfile
}

fn bench_transitive_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_digest");

    for size in [10, 100, 1000].iter() {
        let graph = chained_graph(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| graph.transitive_digest(black_box(&script_label(0))).unwrap())
        });
    }

    group.finish();
}

fn bench_lockfile_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("lockfile_parse");

    for count in [10, 100].iter() {
        let json = lockfile_with_extensions(*count).to_json().unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &json, |b, json| {
            b.iter(|| Lockfile::from_json(black_box(json), Path::new("MODULE.lock")).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transitive_digest, bench_lockfile_parse);
criterion_main!(benches);

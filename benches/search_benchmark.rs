//! Performance benchmarks for memevault
//!
//! **Benchmarks Included:**
//! - `search`: paginated search at 100, 1000 and 5000 assets
//! - `values_with_prefix`: tag autocomplete against the in-memory index
//! - `tags_by_value_fuzzy`: typo-tolerant tag lookup
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                        # Run all benchmarks
//! cargo bench -- search              # Search only
//! ```
//!
//! **Notes:**
//! - Each benchmark builds its library in a `TempDir`
//! - Assets carry three tags drawn from small namespaces so queries hit
//!   realistic join fan-out

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use memevault::{Config, Library, NewAsset, SearchMode, Tag};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const ANIMALS: [&str; 8] = [
    "cat", "dog", "capybara", "crab", "cow", "dolphin", "catfish", "duck",
];

/// Build a library holding `count` small text assets.
fn create_benchmark_library(count: usize) -> (TempDir, Library) {
    let tmpdir = TempDir::new().expect("failed to create temp dir");
    let library = Library::open(Config::with_data_dir(tmpdir.path().join("library")))
        .expect("failed to open library");

    let incoming = tmpdir.path().join("incoming");
    fs::create_dir_all(&incoming).expect("failed to create source dir");

    for i in 0..count {
        let src = incoming.join(format!("{i}.txt"));
        fs::write(&src, format!("asset body {i}")).expect("failed to write source");

        let tags = vec![
            Tag::new("animal", ANIMALS[i % ANIMALS.len()]).expect("valid tag"),
            Tag::new("artist", format!("artist{}", i % 50)).expect("valid tag"),
            Tag::new("year", format!("{}", 2000 + i % 25)).expect("valid tag"),
        ];
        library
            .add(
                NewAsset::new(src)
                    .with_summary(format!("meme number {i}"))
                    .with_tags(tags)
                    .removing_source(),
            )
            .expect("failed to add asset");
    }

    (tmpdir, library)
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    for size in [100, 1000, 5000] {
        let (_tmpdir, library) = create_benchmark_library(size);

        group.bench_with_input(BenchmarkId::new("tag_and_text", size), &size, |b, _| {
            b.iter(|| {
                library
                    .search(black_box("meme animal:ca* -year:2001"), 0, SearchMode::Normal)
                    .expect("search failed")
            });
        });

        group.bench_with_input(BenchmarkId::new("empty_last_page", size), &size, |b, _| {
            let last = u32::try_from(size / 30).unwrap_or(0);
            b.iter(|| {
                library
                    .search("", black_box(last), SearchMode::Normal)
                    .expect("search failed")
            });
        });
    }

    group.finish();
}

fn bench_autocomplete(c: &mut Criterion) {
    let (_tmpdir, library) = create_benchmark_library(1000);

    c.bench_function("values_with_prefix", |b| {
        b.iter(|| library.values_with_prefix(black_box("artist"), black_box("artist1")));
    });

    c.bench_function("tags_by_value_fuzzy", |b| {
        b.iter(|| library.tags_by_value_fuzzy(black_box("dolpin")));
    });
}

criterion_group!(benches, bench_search, bench_autocomplete);
criterion_main!(benches);

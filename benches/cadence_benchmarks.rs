//! # Cadence Performance Benchmarks
//!
//! Benchmarks for the paths that run on every song change.
//!
//! ## Benchmark Categories
//!
//! - **Algorithm Performance**: Scoring and candidate ranking
//! - **Catalog Operations**: SQLite recommendation queries
//! - **Controller**: Advancing through a personalized session
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench algorithm
//! cargo bench catalog
//! cargo bench controller
//! ```

use cadence::algorithm::{self, ScoringContext, SongStats};
use cadence::catalog::{Catalog, RecommendationRequest, Seeds, SqliteCatalog};
use cadence::clock::{Clock, ManualClock};
use cadence::config::SessionConfig;
use cadence::controller::PlaybackController;
use cadence::media::{CatalogDurationTransport, MediaTransport};
use cadence::song::{Song, UserId};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::collections::HashSet;
use std::hint::black_box;
use std::rc::Rc;

/// `count` songs spread over 20 artists and 100 albums.
fn create_test_songs(count: usize) -> Vec<(Song, SongStats)> {
    (1..=count)
        .map(|i| {
            let touches = (i % 100) as u32;
            let listens = (f64::from(touches) * 0.7) as u32;
            let song = Song::new(
                &format!("s{i:04}"),
                &format!("Song {i:04}"),
                &format!("Artist {}", (i - 1) % 20 + 1),
            )
            .with_album(&format!("Album {}", (i - 1) / 10 + 1));
            let stats = SongStats {
                touches,
                listens,
                skips: touches.saturating_sub(listens),
                loved: i % 20 == 0,
            };
            (song, stats)
        })
        .collect()
}

fn create_benchmark_catalog(count: usize) -> SqliteCatalog {
    let mut catalog = SqliteCatalog::in_memory().expect("Failed to open in-memory catalog");
    let songs: Vec<Song> = create_test_songs(count).into_iter().map(|(s, _)| s).collect();
    catalog.import_songs(&songs).expect("Failed to import songs");
    catalog
}

fn benchmark_algorithm_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("algorithm_scoring");
    let context = ScoringContext::default();

    let stats = create_test_songs(1)[0].1;
    group.bench_function("single_song_score", |b| {
        b.iter(|| algorithm::calculate_score(black_box(&stats), black_box(&context)))
    });

    let seeds: Vec<Song> = create_test_songs(5).into_iter().map(|(s, _)| s).collect();
    for size in [100, 1000, 5000] {
        let candidates = create_test_songs(size);
        group.bench_with_input(BenchmarkId::new("rank_candidates", size), &candidates, |b, candidates| {
            b.iter_batched(
                || candidates.clone(),
                |candidates| algorithm::rank_candidates(candidates, black_box(&seeds), &context),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn benchmark_catalog_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_operations");
    let catalog = create_benchmark_catalog(1000);
    let seed = Song::new("s0001", "Song 0001", "Artist 1");

    group.bench_function("recommend_single_seed", |b| {
        let request = RecommendationRequest {
            user: UserId::from("bench"),
            seeds: Seeds::Single(seed.clone()),
            exclude: HashSet::new(),
            limit: 20,
            shuffle: false,
        };
        b.iter(|| catalog.recommend(black_box(&request)).expect("recommendation"))
    });

    group.bench_function("recommend_multi_seed", |b| {
        let seeds: Vec<Song> = create_test_songs(8).into_iter().map(|(s, _)| s).collect();
        let request = RecommendationRequest {
            user: UserId::from("bench"),
            exclude: seeds.iter().map(|s| s.file_id.clone()).collect(),
            seeds: Seeds::Multi(seeds),
            limit: 20,
            shuffle: true,
        };
        b.iter(|| catalog.recommend(black_box(&request)).expect("recommendation"))
    });

    group.finish();
}

fn benchmark_controller(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller");
    let catalog: Rc<dyn Catalog> = Rc::new(create_benchmark_catalog(500));

    group.bench_function("session_of_20_songs", |b| {
        b.iter_batched(
            || {
                let clock = Rc::new(ManualClock::new());
                let mut player = PlaybackController::new(
                    Rc::clone(&catalog),
                    Rc::new(CatalogDurationTransport) as Rc<dyn MediaTransport>,
                    Rc::clone(&clock) as Rc<dyn Clock>,
                    SessionConfig::default(),
                );
                player.sign_in(UserId::from("bench"));
                (player, clock)
            },
            |(mut player, clock)| {
                player.play(Song::new("s0001", "Song 0001", "Artist 1"));
                player.process_pending();
                for _ in 0..20 {
                    clock.advance_secs(30);
                    let _ = player.advance();
                    player.process_pending();
                }
                black_box(player.snapshot())
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_algorithm_scoring,
    benchmark_catalog_operations,
    benchmark_controller
);

criterion_main!(benches);

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::Rng;
use runoff::{CandidateId, ElectionId, ElectionService, NewElection, PositionId, ResultEntry};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

/// An election with `positions` positions of `candidates` candidates each
fn seeded(positions: u32, candidates: usize) -> (ElectionService, ElectionId, Vec<(PositionId, Vec<CandidateId>)>) {
    let service = ElectionService::new(runoff::EngineConfig {
        max_candidates_per_position: candidates.max(1),
        ..Default::default()
    });
    let dir = service.directory();
    let election = dir
        .create_election(NewElection {
            name: "Benchmark".to_string(),
            ..Default::default()
        })
        .unwrap();

    let mut layout = Vec::new();
    for order in 1..=positions {
        let title = dir
            .create_catalog_entry(&format!("Cargo {order}"), None)
            .unwrap();
        let position = dir.add_position(election.id, title.id, Some(order)).unwrap();
        let ids = (0..candidates)
            .map(|n| {
                dir.register_candidate(position.id, &format!("Candidato {n}"), None)
                    .unwrap()
                    .id
            })
            .collect();
        layout.push((position.id, ids));
    }
    (service, election.id, layout)
}

fn random_batch(candidates: &[CandidateId]) -> Vec<ResultEntry> {
    let mut rng = rand::thread_rng();
    candidates
        .iter()
        .map(|&id| ResultEntry::new(id, rng.gen_range(0..5_000)))
        .collect()
}

fn bench_recording(c: &mut Criterion) {
    let mut group = c.benchmark_group("recording");
    group.warm_up_time(Duration::from_millis(100));

    for candidates in [2_usize, 10, 50] {
        let (service, _, layout) = seeded(1, candidates);
        let (position, ids) = &layout[0];
        let round = service.create_round(*position, None, None).unwrap();

        group.bench_with_input(BenchmarkId::new("record_batch", candidates), ids, |b, ids| {
            b.iter_batched(
                || random_batch(ids),
                |batch| service.record_results(black_box(round.id), &batch).unwrap(),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("summary");

    for positions in [1_u32, 10, 40] {
        let (service, election, layout) = seeded(positions, 6);
        for (position, ids) in &layout {
            // Two rounds per position so the summary walks back past an empty one
            let first = service.create_round(*position, None, None).unwrap();
            service.record_results(first.id, &random_batch(ids)).unwrap();
            service.finalize_round(first.id).unwrap();
            service.create_round(*position, None, None).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("final_summary", positions), &election, |b, id| {
            b.iter(|| service.final_summary(black_box(*id)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("election_report", positions), &election, |b, id| {
            b.iter(|| service.election_report(black_box(*id)).unwrap())
        });
    }

    group.finish();
}

fn bench_concurrent_recording(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("concurrent_recording");

    let (service, _, layout) = seeded(8, 5);
    let service = Arc::new(service);
    let rounds: Vec<_> = layout
        .iter()
        .map(|(position, ids)| {
            let round = service.create_round(*position, None, None).unwrap();
            (round.id, ids.clone())
        })
        .collect();

    group.bench_function("eight_positions_in_parallel", |b| {
        b.to_async(&rt).iter(|| async {
            let handles: Vec<_> = rounds
                .iter()
                .cloned()
                .map(|(round_id, ids)| {
                    let service = Arc::clone(&service);
                    tokio::task::spawn_blocking(move || {
                        service.record_results(round_id, &random_batch(&ids)).unwrap()
                    })
                })
                .collect();
            for handle in handles {
                black_box(handle.await.unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_recording,
    bench_summary,
    bench_concurrent_recording
);

criterion_main!(benches);

//! Benchmarks for the hot paths of a ratification round.
//!
//! - Phrase-table classification of chain rejections
//! - Quorum threshold for committee sizes 4..=100
//! - Payload digest computed once per signature
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quorum_gov::policy::{Classification, IdempotencyClassifier, PhraseRule};
use quorum_gov::types::TxPayload;
use quorum_gov::utils::threshold;
use serde_json::json;

const MESSAGES: &[&str] = &[
    "chain 2 had been initialized",
    "relayer 0x01 already requested",
    "verify signature failed",
    "",
];

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_message");

    for extra in [0usize, 16, 128].iter() {
        let classifier = (0..*extra).fold(IdempotencyClassifier::default(), |acc, i| {
            let phrase = format!("node wording {}", i);
            acc.with_rule(PhraseRule::new(phrase, Classification::AlreadyApplied))
        });
        group.throughput(Throughput::Elements(MESSAGES.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(extra), &classifier, |b, classifier| {
            b.iter(|| {
                for message in MESSAGES {
                    black_box(classifier.classify_message(black_box(message)));
                }
            });
        });
    }

    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    c.bench_function("threshold_4_to_100", |b| {
        b.iter(|| {
            for n in 4..=100usize {
                let _ = black_box(threshold(black_box(n)));
            }
        });
    });
}

fn bench_payload_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_digest");

    for peers in [1usize, 7, 50].iter() {
        let keys: Vec<String> = (0..*peers).map(|i| format!("{:064x}", i)).collect();
        let payload = TxPayload {
            contract: "node_manager".into(),
            method: "approveCandidate".into(),
            params: json!({ "peer_pubkeys": keys }),
        };
        group.bench_with_input(BenchmarkId::from_parameter(peers), &payload, |b, payload| {
            b.iter(|| black_box(payload.digest()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_threshold, bench_payload_digest);
criterion_main!(benches);

//! Benchmarks for the content-addressed stream hash (§4.4 / §C5).
//!
//! Run with: cargo bench --bench hashing

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use catalog_core::models::{HashKeyField, HashKeyList, ParsedStream, SourceId};
use catalog_core::service::hashing::stream_hash;

fn sample_stream(n: usize) -> ParsedStream {
    let mut attrs = HashMap::new();
    attrs.insert("tvg-id".to_string(), format!("channel-{n}"));
    attrs.insert("tvg-logo".to_string(), format!("http://logo.example/{n}.png"));
    attrs.insert("group-title".to_string(), "Sports".to_string());
    ParsedStream {
        name: format!("Channel {n} HD"),
        url: format!("http://stream.example/live/{n}.ts"),
        attrs,
    }
}

fn bench_stream_hash_default_key_list(c: &mut Criterion) {
    let source_id = SourceId::new();
    let stream = sample_stream(1);
    let key_list = HashKeyList::default();

    c.bench_function("stream_hash_url_and_source", |b| {
        b.iter(|| {
            black_box(stream_hash(black_box(&stream), black_box(&source_id), black_box(&key_list)));
        });
    });
}

fn bench_stream_hash_by_key_list_size(c: &mut Criterion) {
    let source_id = SourceId::new();
    let stream = sample_stream(1);

    let mut group = c.benchmark_group("stream_hash_by_key_count");
    for key_list in [
        HashKeyList(vec![HashKeyField::Url]),
        HashKeyList(vec![HashKeyField::Url, HashKeyField::SourceId]),
        HashKeyList(vec![
            HashKeyField::Name,
            HashKeyField::Url,
            HashKeyField::TvgId,
            HashKeyField::SourceId,
        ]),
    ] {
        group.bench_with_input(
            BenchmarkId::from_parameter(key_list.0.len()),
            &key_list,
            |b, key_list| {
                b.iter(|| {
                    black_box(stream_hash(black_box(&stream), black_box(&source_id), black_box(key_list)));
                });
            },
        );
    }
    group.finish();
}

fn bench_stream_hash_batch(c: &mut Criterion) {
    let source_id = SourceId::new();
    let key_list = HashKeyList::default();
    let streams: Vec<ParsedStream> = (0..1500).map(sample_stream).collect();

    c.bench_function("stream_hash_batch_1500", |b| {
        b.iter(|| {
            for stream in &streams {
                black_box(stream_hash(black_box(stream), black_box(&source_id), black_box(&key_list)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_stream_hash_default_key_list,
    bench_stream_hash_by_key_list_size,
    bench_stream_hash_batch
);
criterion_main!(benches);

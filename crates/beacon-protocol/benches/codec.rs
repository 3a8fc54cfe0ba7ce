//! Codec benchmarks for beacon-protocol.

use beacon_protocol::{codec, Frame};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;

fn message_frame(text_len: usize) -> Frame {
    Frame::PrivateMessage(json!({
        "to": "bob@example.com",
        "from": "alice@example.com",
        "text": "x".repeat(text_len),
    }))
}

fn bench_encode_message(c: &mut Criterion) {
    let frame = message_frame(64);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("message_64B", |b| {
        b.iter(|| codec::encode(black_box(&frame)))
    });
    group.finish();
}

fn bench_decode_message(c: &mut Criterion) {
    let frame = message_frame(64);
    let encoded = codec::encode(&frame).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("message_64B", |b| {
        b.iter(|| codec::decode(black_box(&encoded)))
    });
    group.finish();
}

fn bench_broadcast_roundtrip(c: &mut Criterion) {
    let list: Vec<String> = (0..100).map(|i| format!("user{i}@example.com")).collect();
    let frame = Frame::online_list(list);

    c.bench_function("roundtrip_online_list_100", |b| {
        b.iter(|| {
            let encoded = codec::encode(black_box(&frame)).unwrap();
            codec::decode(black_box(&encoded)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_encode_message,
    bench_decode_message,
    bench_broadcast_roundtrip
);
criterion_main!(benches);

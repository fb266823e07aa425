//! Benchmarks for the gateway's hot paths
//!
//! Every packet off the ring goes through header decode, fingerprint
//! construction, and a linear scan of its channel's ring, so these three
//! dominate throughput under load.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::time::Duration;

use wavegate::{ChannelRing, DedupRegistry, TraceBuf2, TraceHeader};

/// A full-size little-endian i4 message: 64-byte header + 1008 samples.
fn full_message() -> Vec<u8> {
    let mut message = vec![0u8; 4096];
    message[0..4].copy_from_slice(&17i32.to_le_bytes());
    message[4..8].copy_from_slice(&1008i32.to_le_bytes());
    message[8..16].copy_from_slice(&1_700_000_000f64.to_le_bytes());
    message[24..32].copy_from_slice(&100f64.to_le_bytes());
    message[32..35].copy_from_slice(b"MPU");
    message[39..41].copy_from_slice(b"UU");
    message[48..51].copy_from_slice(b"HHZ");
    message[55..57].copy_from_slice(b"20");
    message[57..59].copy_from_slice(b"i4");
    message
}

fn header_at(start_time_us: i64) -> TraceHeader {
    TraceHeader {
        name: "UU.MPU.HHZ".to_string(),
        start_time_us,
        sampling_rate: 100,
        n_samples: 100,
    }
}

fn bench_decode(c: &mut Criterion) {
    let message = full_message();

    let mut group = c.benchmark_group("tracebuf2_decode");
    group.throughput(Throughput::Bytes(message.len() as u64));
    group.bench_function("full_packet", |b| {
        b.iter(|| {
            let packet = TraceBuf2::decode(black_box(&message)).unwrap();
            black_box(packet)
        })
    });
    group.finish();
}

fn bench_ring_scan(c: &mut Criterion) {
    // A warmed-up ring at the capacity floor, scanned by a candidate that
    // matches nothing (the worst case).
    let mut ring = ChannelRing::new(1000);
    for i in 0..1000i64 {
        ring.push_back(header_at(i * 10_000_000));
    }
    let miss = header_at(1000 * 10_000_000);

    c.bench_function("ring_scan_miss_1000", |b| {
        b.iter(|| black_box(ring.contains(black_box(&miss))))
    });
}

fn bench_admission(c: &mut Criterion) {
    c.bench_function("registry_admit_advancing", |b| {
        let mut registry = DedupRegistry::new(Duration::from_secs(3600));
        let mut start_time_us = 0i64;
        b.iter(|| {
            start_time_us += 1_000_000;
            black_box(registry.admit(header_at(start_time_us)))
        })
    });
}

criterion_group!(benches, bench_decode, bench_ring_scan, bench_admission);
criterion_main!(benches);

//! Signaling hot-path benchmarks.
//!
//! - Strict envelope and payload decoding
//! - Room broadcast fan-out at different room sizes
//!
//! Run with: cargo bench --bench fanout
//! Results saved to: target/criterion/

use std::convert::Infallible;
use std::hint::black_box;
use std::sync::Arc;

use axum::extract::ws::Message;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures_util::{sink, stream};
use tokio::runtime::Runtime;

use screenecho_server::protocol::{Envelope, SdpOfferRequest, decode_envelope, decode_payload};
use screenecho_server::{ClientRegistry, ConnectionRegistry, RoomId, RoomManager};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const ROOM_SIZES: &[usize] = &[2, 8, 32, 128];

const OFFER_FRAME: &str = r#"{"type":"sdp-offer","msg":{"calleeClientID":"67e55044-10b1-426f-9247-bb680e5fe0c8","offer":{"type":"offer","sdp":"v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\na=group:BUNDLE 0 1\r\n"}}}"#;

// ============================================================================
// Benchmark: Strict Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(OFFER_FRAME.len() as u64));

    group.bench_function("envelope", |b| {
        b.iter(|| decode_envelope(black_box(OFFER_FRAME)).unwrap());
    });

    group.bench_function("envelope_and_offer", |b| {
        b.iter(|| {
            let envelope = decode_envelope(black_box(OFFER_FRAME)).unwrap();
            decode_payload::<SdpOfferRequest>(&envelope.msg).unwrap()
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Broadcast Fan-out
// ============================================================================

fn bench_broadcast(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let _guard = rt.enter();

    let mut group = c.benchmark_group("broadcast");

    for &size in ROOM_SIZES {
        let rooms = populate_room(size);
        let room = rooms.get(&RoomId::from("bench")).unwrap();
        let notice = Envelope::new("stream-started", serde_json::json!({"label": "screen"}));

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("members", size), &size, |b, _| {
            b.iter(|| rooms.broadcast(black_box(&room), black_box(&notice), None));
        });
    }

    group.finish();
}

/// Joins `size` clients whose writers discard every frame.
fn populate_room(size: usize) -> Arc<RoomManager> {
    let connections = ConnectionRegistry::new();
    let rooms = RoomManager::new(ClientRegistry::new(Arc::clone(&connections)));

    for _ in 0..size {
        let writer = sink::drain::<Message>();
        let reader = stream::pending::<Result<Message, Infallible>>();
        let pending = connections.establish(writer, reader);
        rooms.connect_to_room(RoomId::from("bench"), pending);
    }

    rooms
}

criterion_group!(benches, bench_decode, bench_broadcast);
criterion_main!(benches);

//! Throughput benchmarks for tlslink
//!
//! Measures bytes per second for:
//! - The incoming queue alone (push then pop)
//! - Records sent across a connected client/server pair at several sizes

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tlslink::backpressure::{IncomingQueue, Popped};
use tlslink::engine::Identity;
use tlslink::transport::{MemoryTransport, Message, TlsTransport, Transport, TransportState};

fn bench_incoming_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("incoming_queue");

    for size in [64usize, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let queue = IncomingQueue::new(1024 * 1024);
            let message = vec![0u8; size];
            b.iter(|| {
                queue.push(black_box(message.clone()));
                match queue.pop() {
                    Popped::Message(message) => black_box(message),
                    other => panic!("unexpected {other:?}"),
                };
            });
        });
    }

    group.finish();
}

struct Link {
    client: Arc<TlsTransport>,
    _server: Arc<TlsTransport>,
    received: mpsc::Receiver<Option<Message>>,
}

/// Connects a client and server over a memory pipe on the shared pool.
fn connect() -> Link {
    let generated = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let identity = Identity::from_der(
        vec![generated.cert.der().to_vec()],
        generated.key_pair.serialize_der(),
    )
    .unwrap();

    let (client_lower, server_lower) = MemoryTransport::pair();
    let (state_tx, states) = mpsc::channel();
    let state_tx = Mutex::new(state_tx);
    let client = TlsTransport::builder(client_lower)
        .on_state_change(move |state| {
            let _ = state_tx.lock().unwrap().send(state);
        })
        .build()
        .unwrap();
    let server = TlsTransport::builder(server_lower)
        .identity(Arc::new(identity))
        .build()
        .unwrap();

    let (tx, received) = mpsc::channel();
    let tx = Mutex::new(tx);
    server.on_recv(Some(Arc::new(move |message| {
        let _ = tx.lock().unwrap().send(message);
    })));

    server.start().unwrap();
    client.start().unwrap();
    while states.recv_timeout(Duration::from_secs(10)).unwrap() != TransportState::Connected {}

    Link {
        client,
        _server: server,
        received,
    }
}

fn bench_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    group.measurement_time(Duration::from_secs(10));

    let link = connect();
    for size in [100usize, 1024, 10 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let payload = vec![0xA5u8; size];
            b.iter(|| {
                link.client.send(Some(payload.clone())).unwrap();
                let mut seen = 0;
                while seen < size {
                    match link.received.recv().unwrap() {
                        Some(message) => seen += message.len(),
                        None => panic!("link closed"),
                    }
                }
                black_box(seen)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_incoming_queue, bench_records);
criterion_main!(benches);

//! 신뢰성 시스템 벤치마크: ack 비트 생성, ack 처리, 틱 갱신

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rudp::reliability::{generate_ack_bits, ReliabilitySystem};
use rudp::PacketQueue;
use rudp::PacketRecord;

/// 최신 `count`개 시퀀스를 받은 수신 큐
fn received_queue(latest: u32, count: u32) -> PacketQueue {
    let mut queue = PacketQueue::new(u32::MAX);
    for sequence in latest.saturating_sub(count - 1)..=latest {
        queue.insert_sorted(PacketRecord::new(sequence, 256));
    }
    queue
}

fn ack_bits(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_ack_bits");

    for &count in &[8u32, 33, 34] {
        let queue = received_queue(1000, count);
        group.bench_with_input(BenchmarkId::new("received", count), &queue, |b, queue| {
            b.iter(|| generate_ack_bits(black_box(1000), queue.iter(), u32::MAX));
        });
    }

    group.finish();
}

fn process_ack(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_ack");

    for &in_flight in &[8usize, 32, 128] {
        group.throughput(Throughput::Elements(in_flight as u64));
        group.bench_with_input(
            BenchmarkId::new("pending", in_flight),
            &in_flight,
            |b, &in_flight| {
                b.iter(|| {
                    let mut system = ReliabilitySystem::default();
                    for _ in 0..in_flight {
                        system.packet_sent(256);
                    }
                    let latest = system.local_sequence() - 1;
                    system.process_ack(black_box(latest), u32::MAX);
                    system.acked_packets()
                });
            },
        );
    }

    group.finish();
}

/// 양방향 교환 후 틱 갱신 (30Hz 1초)
fn exchange_rounds(c: &mut Criterion) {
    c.bench_function("exchange_30_ticks", |b| {
        b.iter(|| {
            let mut a = ReliabilitySystem::default();
            let mut z = ReliabilitySystem::default();
            for _ in 0..30 {
                let sequence = a.local_sequence();
                a.packet_sent(256);
                z.packet_received(sequence, 256);

                let sequence = z.local_sequence();
                let (ack, bits) = (z.remote_sequence(), z.generate_ack_bits());
                z.packet_sent(256);
                a.packet_received(sequence, 256);
                a.process_ack(ack, bits);

                a.update(1.0 / 30.0);
                z.update(1.0 / 30.0);
            }
            a.stats()
        });
    });
}

criterion_group!(benches, ack_bits, process_ack, exchange_rounds);
criterion_main!(benches);

//! Benchmarks for control header encoding
//!
//! Measures the per-transaction cost of:
//! - USB setup field placement
//! - Stream frame encoding and decoding

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use protocol::{Command, ControlHeader, Direction, ResourceId, build_header, decode_frame, encode_frame};

fn benchmark_usb_setup(c: &mut Criterion) {
    let mut group = c.benchmark_group("usb_setup");

    let header = ControlHeader::read(ResourceId(5), Command(0x12), 64);
    group.bench_function("usb_setup", |b| b.iter(|| black_box(&header).usb_setup()));

    group.bench_function("build_header", |b| {
        b.iter(|| {
            build_header(
                black_box(ResourceId(5)),
                black_box(Command(0x12)),
                Direction::Write,
                black_box(64),
            )
        })
    });

    group.finish();
}

fn benchmark_stream_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_frames");

    for size in [1usize, 16, 64, 255] {
        let payload = vec![0xA5u8; size];
        let header = ControlHeader::write(ResourceId(5), Command(0), size as u8);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| encode_frame(black_box(&header), black_box(payload)))
        });

        let frame = encode_frame(&header, &payload);
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| decode_frame(black_box(frame)))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_usb_setup, benchmark_stream_frames);
criterion_main!(benches);

//! Benchmarks for the depth frame decoder

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use twentydepth_feed::book::DepthBook;
use twentydepth_feed::parser::{decode_message, FRAME_LEN, HEADER_LEN, SLOT_LEN};

fn frame(feed_code: u8, levels: usize) -> Vec<u8> {
    let mut buf = vec![0u8; FRAME_LEN];
    buf[0..2].copy_from_slice(&(FRAME_LEN as i16).to_le_bytes());
    buf[2] = feed_code;
    buf[4..8].copy_from_slice(&2885i32.to_le_bytes());
    for i in 0..levels {
        let base = HEADER_LEN + i * SLOT_LEN;
        let price = 100.0 + i as f64 * 0.05;
        buf[base..base + 8].copy_from_slice(&price.to_le_bytes());
        buf[base + 8..base + 12].copy_from_slice(&(10u32 + i as u32).to_le_bytes());
        buf[base + 12..base + 16].copy_from_slice(&2u32.to_le_bytes());
    }
    buf
}

fn double_frame_message() -> Vec<u8> {
    let mut buf = frame(41, 20);
    buf.extend(frame(51, 20));
    buf
}

fn benchmark_decode_single_frame(c: &mut Criterion) {
    let buf = frame(41, 20);

    c.bench_function("decode_single_frame", |b| {
        b.iter(|| decode_message(black_box(&buf)).unwrap())
    });
}

fn benchmark_decode_double_frame(c: &mut Criterion) {
    let buf = double_frame_message();

    c.bench_function("decode_double_frame", |b| {
        b.iter(|| decode_message(black_box(&buf)).unwrap())
    });
}

fn benchmark_decode_and_apply(c: &mut Criterion) {
    let buf = double_frame_message();

    c.bench_function("decode_and_apply", |b| {
        b.iter(|| {
            let mut book = DepthBook::new();
            for event in decode_message(black_box(&buf)).unwrap() {
                book.apply(event);
            }
            book.snapshot()
        })
    });
}

criterion_group!(
    benches,
    benchmark_decode_single_frame,
    benchmark_decode_double_frame,
    benchmark_decode_and_apply
);
criterion_main!(benches);

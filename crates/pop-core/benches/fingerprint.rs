//! Fingerprinting benchmarks.
//!
//! Run with: cargo bench -p pop-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use pop_core::{canonicalize_image, fingerprint_text, ContentInput};

fn sample_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("Paragraph {} of generated prose.   \r\n\r\n\r\n", i))
        .collect()
}

fn sample_png(side: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(side, side, |x, y| Rgba([x as u8, y as u8, (x ^ y) as u8, 255]));
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, CompressionType::Fast, FilterType::NoFilter)
        .write_image(img.as_raw(), side, side, ExtendedColorType::Rgba8)
        .expect("encode sample png");
    out
}

fn bench_text_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_fingerprint");

    for paragraphs in [1usize, 100, 10_000].iter() {
        let text = sample_text(*paragraphs);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &text, |b, text| {
            b.iter(|| black_box(fingerprint_text(text)));
        });
    }

    group.finish();
}

fn bench_image_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("image_canonicalize");
    group.sample_size(20);

    for side in [64u32, 512].iter() {
        let png = sample_png(*side);
        group.throughput(Throughput::Elements((*side as u64) * (*side as u64)));
        group.bench_with_input(BenchmarkId::from_parameter(side), &png, |b, png| {
            b.iter(|| black_box(canonicalize_image(png).expect("canonicalize")));
        });
    }

    group.finish();
}

fn bench_content_sniffing(c: &mut Criterion) {
    let png = bytes::Bytes::from(sample_png(64));
    c.bench_function("content_sniff_png", |b| {
        b.iter(|| black_box(ContentInput::from_bytes(png.clone()).expect("sniff")));
    });
}

criterion_group!(
    benches,
    bench_text_fingerprint,
    bench_image_canonicalize,
    bench_content_sniffing
);
criterion_main!(benches);

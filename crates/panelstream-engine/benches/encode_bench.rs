use criterion::{Criterion, criterion_group, criterion_main};
use panelstream_catalog::PixelFormat;
use panelstream_engine::{Bitmap, BitmapFormat, FrameEncoder};
use std::hint::black_box;

fn bench_encode(c: &mut Criterion) {
    let encoder = FrameEncoder::default();
    let Ok(rgba) = Bitmap::filled(480, 480, [0x20, 0x80, 0xE0, 0xFF]) else {
        return;
    };
    let Ok(le) = Bitmap::new(480, 480, BitmapFormat::Rgb565Le, vec![0x1F; 480 * 480 * 2]) else {
        return;
    };

    let mut group = c.benchmark_group("encode_480");
    group.bench_function("rgba_to_jpeg", |b| {
        b.iter(|| encoder.encode(black_box(&rgba), PixelFormat::Jpeg));
    });
    group.bench_function("rgba_to_rgb565", |b| {
        b.iter(|| encoder.encode(black_box(&rgba), PixelFormat::Rgb565));
    });
    group.bench_function("rgb565_swap", |b| {
        b.iter(|| encoder.encode(black_box(&le), PixelFormat::Rgb565BigEndian));
    });
    group.finish();
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);

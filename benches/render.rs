//! Software device throughput: plane upload and full frame render

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use video_renderer::backend::{SoftAdapter, SoftBackend};
use video_renderer::pattern::Pattern;
use video_renderer::{
    ColorMatrix, FrameRenderer, HeadlessWindow, PixelFormat, RenderOptions, Renderer, ShaderLibrary,
};

const FORMATS: [PixelFormat; 4] = [
    PixelFormat::Argb,
    PixelFormat::I420,
    PixelFormat::I444,
    PixelFormat::Nv12,
];

fn bench_pattern(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern");
    for format in FORMATS {
        group.bench_with_input(BenchmarkId::from_parameter(format), &format, |b, format| {
            b.iter(|| Pattern::Bars.frame(320, 180, *format, ColorMatrix::Bt601, 0))
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    group.sample_size(20);

    for format in FORMATS {
        let frame = Pattern::Bars.frame(320, 180, format, ColorMatrix::Bt601, 0);
        let renderer =
            FrameRenderer::<SoftBackend>::new(SoftAdapter::new(), ShaderLibrary::new(), RenderOptions::default());
        if renderer.init(Arc::new(HeadlessWindow::new(320, 180))).is_err() {
            continue;
        }

        group.throughput(Throughput::Bytes(frame.size_bytes() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format), &frame, |b, frame| {
            b.iter(|| renderer.render(&frame.as_frame()))
        });
        renderer.destroy();
    }
    group.finish();
}

fn bench_sharpen(c: &mut Criterion) {
    let frame = Pattern::Ramp.frame(320, 180, PixelFormat::Nv12, ColorMatrix::Bt709, 0);
    let options = RenderOptions {
        sharpen: 1.5,
        color_matrix: ColorMatrix::Bt709,
        ..RenderOptions::default()
    };
    let renderer = FrameRenderer::<SoftBackend>::new(SoftAdapter::new(), ShaderLibrary::new(), options);
    if renderer.init(Arc::new(HeadlessWindow::new(320, 180))).is_err() {
        return;
    }

    c.bench_function("render/nv12+sharpen", |b| b.iter(|| renderer.render(&frame.as_frame())));
    renderer.destroy();
}

criterion_group!(benches, bench_pattern, bench_render, bench_sharpen);
criterion_main!(benches);

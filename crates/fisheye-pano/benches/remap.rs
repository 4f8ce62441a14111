use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fisheye_pano::{
    build_map, resample, resample_with, ChannelOrder, Interpolation, LensConfig, PixelBuffer,
    RemapConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn make_fixture(w: u32, h: u32, seed: u64) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..w * h * 3).map(|_| rng.gen()).collect();
    PixelBuffer::from_raw(w, h, ChannelOrder::Rgb, data).expect("fixture size")
}

fn bench_build_map(c: &mut Criterion) {
    let lens = LensConfig::default();

    c.bench_function("build_map_1280x720", |b| {
        b.iter(|| {
            let map = build_map(black_box(1280), black_box(720), black_box(&lens)).unwrap();
            black_box(map.len())
        })
    });

    c.bench_function("build_map_4000x1200", |b| {
        b.iter(|| {
            let map = build_map(black_box(4000), black_box(1200), black_box(&lens)).unwrap();
            black_box(map.len())
        })
    });
}

fn bench_resample(c: &mut Criterion) {
    let img = make_fixture(1920, 1080, 7);
    let map = build_map(1920, 1080, &LensConfig::default()).unwrap();
    let nearest = RemapConfig {
        interpolation: Interpolation::Nearest,
        ..RemapConfig::default()
    };

    c.bench_function("resample_bilinear_1920x1080", |b| {
        b.iter(|| {
            let out = resample(black_box(&img), black_box(&map)).unwrap();
            black_box(out.width())
        })
    });

    c.bench_function("resample_nearest_1920x1080", |b| {
        b.iter(|| {
            let out = resample_with(black_box(&img), black_box(&map), black_box(&nearest)).unwrap();
            black_box(out.width())
        })
    });
}

criterion_group!(benches, bench_build_map, bench_resample);
criterion_main!(benches);

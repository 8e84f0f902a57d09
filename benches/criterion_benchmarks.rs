use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use p2bin::build::{BuildOptions, build_rom};
use p2bin::codec::{Codec, CompressBackend, kosinski};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// Z80-like code: a small opcode alphabet with recurring sequences.
fn gen_driver(size: usize, seed: u64) -> Vec<u8> {
    const OPS: [&[u8]; 6] = [
        &[0x3E, 0x00],
        &[0xDD, 0x7E, 0x00],
        &[0xCD, 0x40, 0x01],
        &[0x10, 0xFB],
        &[0x32, 0x00, 0x1C],
        &[0xC9],
    ];
    let noise = gen_data(size, seed);
    let mut out = Vec::with_capacity(size + 3);
    let mut i = 0;
    while out.len() < size {
        let op = OPS[noise[i] as usize % OPS.len()];
        out.extend_from_slice(op);
        if noise[i] & 0x80 != 0 {
            out.push(noise[(i + 1) % size]);
        }
        i = (i + 1) % size;
    }
    out.truncate(size);
    out
}

fn object_file(main_size: usize, driver: &[u8]) -> Vec<u8> {
    let mut out = vec![0x89, 0x14];
    let main = gen_data(main_size, 99);
    out.push(0x01);
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0x200u16.to_le_bytes());
    out.extend_from_slice(&main[..0x200]);

    out.push(0x51);
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&(driver.len() as u16).to_le_bytes());
    out.extend_from_slice(driver);

    let mut start = 0x8000i32;
    for chunk in main[0x200..].chunks(0x8000) {
        out.push(0x01);
        out.extend_from_slice(&start.to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
        out.extend_from_slice(chunk);
        start += chunk.len() as i32;
    }
    out.push(0x00);
    out
}

fn available_codecs() -> Vec<Codec> {
    ["kosinski", "zlib", "lzma"]
        .iter()
        .filter_map(|name| name.parse().ok())
        .collect()
}

fn write_ratio_snapshot() {
    let mut csv = String::from("codec,driver_bytes,packed_bytes,ratio\n");
    let driver = gen_driver(0x1800, 7);
    for codec in available_codecs() {
        let Ok(packed) = codec.backend().compress(&driver) else {
            continue;
        };
        let ratio = packed.len() as f64 / driver.len() as f64;
        csv.push_str(&format!(
            "{},{},{},{ratio}\n",
            codec.name(),
            driver.len(),
            packed.len()
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("driver_ratio.csv"), csv);
}

fn bench_kosinski_compress(c: &mut Criterion) {
    let mut g = c.benchmark_group("kosinski_compress");
    for size in [0x800usize, 0x1800, 0x8000, 0xFFFF] {
        let driver = gen_driver(size, size as u64);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(kosinski::compress(black_box(&driver))));
        });
    }
    g.finish();
}

fn bench_kosinski_decompress(c: &mut Criterion) {
    let mut g = c.benchmark_group("kosinski_decompress");
    for size in [0x800usize, 0x1800, 0x8000, 0xFFFF] {
        let packed = kosinski::compress(&gen_driver(size, size as u64));
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(kosinski::decompress(black_box(&packed)).unwrap()));
        });
    }
    g.finish();
}

fn bench_codec_compare(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("driver_codecs");
    let driver = gen_driver(0x1800, 7);
    for codec in available_codecs() {
        let backend = codec.backend();
        g.bench_function(codec.name(), |b| {
            b.iter(|| black_box(backend.compress(black_box(&driver))));
        });
    }
    g.finish();
}

fn bench_build_rom(c: &mut Criterion) {
    let mut g = c.benchmark_group("build_rom");
    let driver = gen_driver(0x1800, 3);
    for size in [256 * 1024usize, 1024 * 1024, 4 * 1024 * 1024] {
        let object = object_file(size, &driver);
        g.throughput(Throughput::Bytes(object.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let result = build_rom(black_box(&object[..]), &BuildOptions::default()).unwrap();
                black_box(result.image.len());
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_kosinski_compress,
    bench_kosinski_decompress,
    bench_codec_compare,
    bench_build_rom
);
criterion_main!(benches);

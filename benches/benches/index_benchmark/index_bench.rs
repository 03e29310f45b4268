use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emdgm_core::{
    build_index, Attitude, AttitudeDatagram, DatagramKind, DepthBeams, DepthDatagram, Endian,
    IndexBuilder, IndexConfig, Record,
};

/// 2016-10-16 18:43:28 UTC
const T0: f64 = 1_476_643_408.0;

fn attitude(t: f64) -> Record {
    let mut body = AttitudeDatagram::new();
    for i in 0..100 {
        let row = Attitude::row()
            .with("Time", t + 0.01 * i as f64)
            .unwrap()
            .with("Roll", (i % 20) as f64 * 0.1)
            .unwrap();
        body.attitude.push(row).unwrap();
    }
    Record::at_time(body, 2040, t).unwrap()
}

fn depth(t: f64) -> Record {
    let mut body = DepthDatagram::new(1, 2).unwrap();
    for i in 0..254 {
        let row = DepthBeams::row()
            .with("Depth", 40.0 + (i % 10) as f64 * 0.01)
            .unwrap()
            .with("AcrossTrack", -127.0 + i as f64)
            .unwrap();
        body.beams.push(row).unwrap();
    }
    Record::at_time(body, 2040, t).unwrap()
}

/// Синтетический файл: пинг глубин и пакет ориентации на секунду.
fn make_file(pings: usize) -> Vec<u8> {
    (0..pings)
        .flat_map(|n| {
            let t = T0 + n as f64;
            let mut bytes = depth(t).to_bytes().unwrap();
            bytes.extend(attitude(t).to_bytes().unwrap());
            bytes
        })
        .collect()
}

// ===========================================================================
// Индекс
// ===========================================================================

fn bench_build_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_index");
    for pings in [100, 1000] {
        let data = make_file(pings);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(pings), &data, |b, data| {
            b.iter(|| build_index(black_box(data)).unwrap())
        });
    }
    group.finish();
}

fn bench_resync(c: &mut Criterion) {
    // Мусор между записями заставляет сканировать побайтно
    let mut data = Vec::new();
    for n in 0..200 {
        data.extend([0xA5u8; 333]);
        data.extend(depth(T0 + n as f64).to_bytes().unwrap());
    }
    let config = IndexConfig {
        byte_order: Some(Endian::Little),
        ..IndexConfig::default()
    };

    c.bench_function("build_index_with_garbage", |b| {
        b.iter(|| {
            IndexBuilder::new(config.clone())
                .build(black_box(&data))
                .unwrap()
        })
    });
}

// ===========================================================================
// Декодирование записей
// ===========================================================================

fn bench_decode(c: &mut Criterion) {
    let data = make_file(100);
    let index = build_index(&data).unwrap();

    c.bench_function("decode_depth", |b| {
        b.iter(|| {
            index
                .get_record(&data, DatagramKind::Depth, black_box(50))
                .unwrap()
        })
    });

    c.bench_function("decode_attitude", |b| {
        b.iter(|| {
            index
                .get_record(&data, DatagramKind::Attitude, black_box(50))
                .unwrap()
        })
    });

    let rec = depth(T0);
    c.bench_function("encode_depth", |b| b.iter(|| black_box(&rec).to_bytes().unwrap()));
}

criterion_group!(benches, bench_build_index, bench_resync, bench_decode);
criterion_main!(benches);

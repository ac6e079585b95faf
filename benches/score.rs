use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use g6::score::Score;

/// Format 1 file with `tracks` tracks of `notes` note pairs each
fn score_bytes(tracks: u16, notes: usize) -> Vec<u8> {
    let mut out = b"MThd".to_vec();
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&tracks.to_be_bytes());
    out.extend_from_slice(&96u16.to_be_bytes());

    for channel in 0..tracks {
        let mut track = vec![0x00, 0xC0 | (channel as u8 & 0x0F), 0x09];
        for i in 0..notes {
            let key = 40 + (i % 40) as u8;
            track.extend_from_slice(&[0x18, 0x90 | (channel as u8 & 0x0F), key, 0x40]);
            // Release through running status
            track.extend_from_slice(&[0x18, key, 0x00]);
        }
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track.len() as u32).to_be_bytes());
        out.extend_from_slice(&track);
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    let source = score_bytes(8, 500);
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("parse_8x500", |b| {
        b.iter(|| black_box(Score::parse(source.clone()).unwrap()));
    });

    group.finish();
}

fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("score");

    let score = Score::parse(score_bytes(8, 500)).unwrap();
    group.throughput(Throughput::Elements(8 * 1_002));
    group.bench_function("mix_8x500", |b| {
        b.iter(|| black_box(score.mixer().unwrap().last()));
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_mix);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rmerge_common::InputFile;
use rmerge_core::{DecodeChain, MergeEngine};

// Helper to build a line batch where roughly half of the lines repeat across files
fn create_line_batch(files: usize, lines_per_file: usize) -> Vec<InputFile> {
    (0..files)
        .map(|f| {
            let content = (0..lines_per_file)
                .map(|i| format!("entry-{}", (i + f * lines_per_file / 2) % (lines_per_file * 2)))
                .collect::<Vec<_>>()
                .join("\n");
            InputFile::new(format!("part_{}.txt", f), content)
        })
        .collect()
}

// Helper to build a CSV batch with overlapping rows
fn create_csv_batch(files: usize, rows_per_file: usize) -> Vec<InputFile> {
    (0..files)
        .map(|f| {
            let mut content = String::from("id,name,city\n");
            for i in 0..rows_per_file {
                let id = (i + f * rows_per_file / 2) % (rows_per_file * 2);
                content.push_str(&format!("{},name_{},city_{}\n", id, id, id % 17));
            }
            InputFile::new(format!("part_{}.csv", f), content)
        })
        .collect()
}

fn bench_line_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_merge");
    let engine = MergeEngine::new();

    for lines in [1_000, 10_000] {
        let batch = create_line_batch(4, lines);
        group.bench_with_input(BenchmarkId::from_parameter(lines), &batch, |b, batch| {
            b.iter(|| {
                let report = engine.merge(black_box(batch)).unwrap();
                black_box(report);
            });
        });
    }

    group.finish();
}

fn bench_tabular_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("tabular_merge");
    let engine = MergeEngine::new();

    for rows in [1_000, 10_000] {
        let batch = create_csv_batch(4, rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &batch, |b, batch| {
            b.iter(|| {
                let report = engine.merge(black_box(batch)).unwrap();
                black_box(report);
            });
        });
    }

    group.finish();
}

fn bench_encoding_fallback(c: &mut Criterion) {
    c.bench_function("decode_latin1_fallback_64kb", |b| {
        let chain = DecodeChain::default();
        let bytes: Vec<u8> = (0..65_536).map(|i| if i % 64 == 0 { 0xFF } else { b'a' }).collect();

        b.iter(|| {
            let decoded = chain.decode(black_box(&bytes)).unwrap();
            black_box(decoded);
        });
    });
}

criterion_group!(
    benches,
    bench_line_merge,
    bench_tabular_merge,
    bench_encoding_fallback
);
criterion_main!(benches);

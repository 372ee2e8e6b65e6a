use std::fs;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use spvocab::{ModelType, NormalizerConfig, Trainer, TrainerConfig};

const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "vocabulary", "sentence",
    "piece", "coverage", "normalize", "reservoir", "sample", "token",
];

fn build_corpus(lines: usize) -> String {
    let mut body = String::with_capacity(lines * 48);
    for line in 0..lines {
        for word in 0..8 {
            if word > 0 {
                body.push(' ');
            }
            body.push_str(WORDS[(line * 7 + word * 3) % WORDS.len()]);
        }
        body.push('\n');
    }
    body
}

fn bench_training(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("corpus.txt");
    let corpus = build_corpus(20_000);
    fs::write(&path, &corpus).expect("write corpus");

    let mut group = c.benchmark_group("train_text_corpus");
    group.throughput(Throughput::Bytes(corpus.len() as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(10);
    for model_type in [ModelType::Char, ModelType::Word] {
        let cfg = TrainerConfig::builder()
            .model_prefix("bench")
            .inputs([path.clone()])
            .model_type(model_type)
            .vocab_size(64)
            .hard_vocab_limit(false)
            .num_threads(4)
            .show_progress(false)
            .build()
            .expect("configuration");
        group.bench_function(BenchmarkId::from_parameter(model_type), |b| {
            b.iter(|| {
                let trainer =
                    Trainer::new(cfg.clone(), NormalizerConfig::default()).expect("trainer");
                let artifacts = trainer.train().expect("training");
                let _ = black_box(artifacts);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_training);
criterion_main!(benches);

use certigen::{
    GenerationPipeline, IntegritySigner, MemoryStore, NewParticipant, ParticipantStore, PiiCipher,
    PipelineConfig, QrImage, QrToken, SecretKey, TemplateRenderer,
};
use core::hint::black_box;
use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;

const IDENTIFIER: &str = "12345678901";

// Participants per pipeline iteration.
const BATCH: usize = 256;

fn bench_cipher(c: &mut Criterion) {
    let cipher = PiiCipher::new(&SecretKey::from_bytes([1; 32]));
    let sealed = cipher.encrypt(IDENTIFIER).unwrap();

    let mut group = c.benchmark_group("cipher");
    group.throughput(Throughput::Elements(1));
    group.bench_function("encrypt", |b| {
        b.iter(|| black_box(cipher.encrypt(black_box(IDENTIFIER)).unwrap()))
    });
    group.bench_function("decrypt", |b| {
        b.iter(|| black_box(cipher.decrypt(black_box(&sealed)).unwrap()))
    });
    group.finish();
}

fn bench_token(c: &mut Criterion) {
    let signer = IntegritySigner::new(SecretKey::from_bytes([2; 32]));
    let token = QrToken::issue(&signer, "CERT-1-1-0", IDENTIFIER, 1_900_000_000).encode();

    let mut group = c.benchmark_group("token");
    group.throughput(Throughput::Elements(1));
    group.bench_function("issue", |b| {
        b.iter(|| {
            black_box(QrToken::issue(
                &signer,
                "CERT-1-1-0",
                IDENTIFIER,
                black_box(1_900_000_000),
            ))
        })
    });
    group.bench_function("verify", |b| {
        b.iter(|| black_box(certigen::verify_token(&signer, black_box(&token), 0).is_ok()))
    });
    group.bench_function("qr_svg", |b| {
        b.iter(|| black_box(QrImage::encode(black_box(&token)).unwrap()))
    });
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let cipher = PiiCipher::new(&SecretKey::from_bytes([1; 32]));
    let signer = IntegritySigner::new(SecretKey::from_bytes([2; 32]));
    let renderer =
        Arc::new(TemplateRenderer::new("<svg>{{FULL_NAME}}{{QRCODE}}</svg>", "svg").unwrap());
    let roster: Vec<NewParticipant> = (0..BATCH)
        .map(|i| NewParticipant {
            full_name: format!("Participant {i}"),
            encrypted_identifier: cipher.encrypt(&format!("{i:011}")).unwrap(),
        })
        .collect();
    let dir = tempfile::TempDir::new().unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.sample_size(10);

    for workers in [1, 4, 10] {
        group.bench_function(format!("workers/{workers}"), |b| {
            b.iter_batched(
                || {
                    let store = MemoryStore::new();
                    let event = store.create_event("Bench", "Bench", &roster).unwrap();
                    let config = PipelineConfig {
                        workers,
                        output_dir: dir.path().join(format!("w{workers}")),
                        ..PipelineConfig::default()
                    };
                    let pipeline = GenerationPipeline::new(
                        store,
                        cipher.clone(),
                        signer.clone(),
                        Arc::clone(&renderer),
                        config,
                    );
                    (pipeline, event.id)
                },
                |(pipeline, event_id)| black_box(pipeline.run(event_id).unwrap()),
                BatchSize::PerIteration,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cipher, bench_token, bench_pipeline);
criterion_main!(benches);

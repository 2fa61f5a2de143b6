//! Benchmarks for the cryptographic primitives.
//!
//! - Block cipher transforms over 64 KiB in CBC and CFB
//! - HMAC and digests over the same buffer
//! - RSA private and public operations with the sample 1024-bit key

extern crate certscope;

use certscope::crypto::{
    asymmetric::{blob::KeyBlob, AsymmetricKey},
    mac::Hmac,
    symmetric::{CipherConfig, CipherContext, CipherMode, Direction, PaddingMode, SymmetricAlgorithm},
    HashAlgorithm,
};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::{fs, hint::black_box, path::PathBuf};

const BUFFER_LEN: usize = 64 * 1024;

fn bench_ciphers(c: &mut Criterion) {
    let data = vec![0xA5u8; BUFFER_LEN];

    let mut group = c.benchmark_group("cipher_encrypt");
    group.throughput(Throughput::Bytes(BUFFER_LEN as u64));
    for (algorithm, key_len, mode) in [
        (SymmetricAlgorithm::Aes, 16, CipherMode::Cbc),
        (SymmetricAlgorithm::Aes, 32, CipherMode::Cfb),
        (SymmetricAlgorithm::TripleDes, 24, CipherMode::Cbc),
    ] {
        let key = vec![0x42u8; key_len];
        group.bench_function(format!("{algorithm}_{mode}"), |b| {
            b.iter(|| {
                let mut context = CipherContext::new(
                    algorithm.create(&key).unwrap(),
                    Direction::Encrypt,
                    CipherConfig::new(mode, PaddingMode::Pkcs7),
                )
                .unwrap();
                black_box(context.finalize(black_box(&data)).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_digests(c: &mut Criterion) {
    let data = vec![0x5Au8; BUFFER_LEN];

    let mut group = c.benchmark_group("digest");
    group.throughput(Throughput::Bytes(BUFFER_LEN as u64));
    for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256] {
        group.bench_function(algorithm.to_string(), |b| {
            b.iter(|| black_box(algorithm.digest(black_box(&data))));
        });
    }
    group.bench_function("HMAC-SHA1", |b| {
        b.iter(|| black_box(Hmac::compute(HashAlgorithm::Sha1, b"key", black_box(&data))));
    });
    group.finish();
}

fn bench_rsa(c: &mut Criterion) {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/samples/rsa1024_keypair.blob");
    let blob = KeyBlob::decode(&fs::read(path).expect("Failed to read key blob")).unwrap();
    let AsymmetricKey::Rsa(key) = blob.key else {
        panic!("sample blob holds an RSA key");
    };
    let hash = HashAlgorithm::Sha1.digest(b"test");
    let signature = key.sign_hash(&hash, HashAlgorithm::Sha1).unwrap();

    let mut group = c.benchmark_group("rsa1024");
    group.bench_function("sign_sha1", |b| {
        b.iter(|| black_box(key.sign_hash(black_box(&hash), HashAlgorithm::Sha1).unwrap()));
    });
    group.bench_function("verify_sha1", |b| {
        b.iter(|| {
            black_box(
                key.verify_hash(black_box(&hash), HashAlgorithm::Sha1, &signature)
                    .unwrap(),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_ciphers, bench_digests, bench_rsa);
criterion_main!(benches);

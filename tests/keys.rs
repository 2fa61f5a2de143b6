//! Key, cipher and MAC behaviour through the public API.

use std::path::PathBuf;

use certscope::{
    crypto::{
        asymmetric::{blob::KeyBlob, AsymmetricKey, DsaKey, RsaKey},
        mac::{CipherMac, Hmac},
        symmetric::{CipherConfig, CipherContext, CipherMode, Direction, PaddingMode,
            SymmetricAlgorithm},
        HashAlgorithm,
    },
    Error,
};

fn sample(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/samples")
        .join(name)
}

fn sample_rsa() -> RsaKey {
    let blob = KeyBlob::decode(&std::fs::read(sample("rsa1024_keypair.blob")).unwrap()).unwrap();
    match blob.key {
        AsymmetricKey::Rsa(key) => key,
        AsymmetricKey::Dsa(_) => panic!("sample blob holds an RSA key"),
    }
}

#[test]
fn rsa_sign_and_verify() {
    let key = sample_rsa();
    assert_eq!(key.key_size(), 1024);
    assert!(key.has_private_key());

    let hash = HashAlgorithm::Sha1.digest(b"test");
    let signature = key.sign_hash(&hash, HashAlgorithm::Sha1).unwrap();
    assert_eq!(signature.len(), 128);
    assert!(key.verify_hash(&hash, HashAlgorithm::Sha1, &signature).unwrap());

    // PKCS #1 v1.5 is deterministic.
    assert_eq!(signature, key.sign_hash(&hash, HashAlgorithm::Sha1).unwrap());

    let public = RsaKey::from_parameters(&key.export_parameters(false).unwrap()).unwrap();
    assert!(!public.has_private_key());
    assert!(public.verify_hash(&hash, HashAlgorithm::Sha1, &signature).unwrap());
    assert!(matches!(
        public.sign_hash(&hash, HashAlgorithm::Sha1),
        Err(Error::NoPrivateKey)
    ));

    let independent = RsaKey::generate(1024).unwrap();
    assert!(!independent
        .verify_hash(&hash, HashAlgorithm::Sha1, &signature)
        .unwrap());

    let other = HashAlgorithm::Sha1.digest(b"Test");
    assert!(!public.verify_hash(&other, HashAlgorithm::Sha1, &signature).unwrap());
    assert!(!public
        .verify_hash(&HashAlgorithm::Md5.digest(b"test"), HashAlgorithm::Md5, &signature)
        .unwrap());
}

#[test]
fn rsa_raw_operations() {
    let key = sample_rsa();
    let value = b"certscope raw value";

    let encrypted = key.encrypt_value(value).unwrap();
    let decrypted = key.decrypt_value(&encrypted).unwrap();
    assert!(decrypted.ends_with(value));

    let signature = key.sign_raw(value).unwrap();
    assert!(key.verify_raw(value, &signature).unwrap());
}

#[test]
fn rsa_parameters() {
    let key = sample_rsa();
    let private = key.export_parameters(true).unwrap();
    assert!(private.d.is_some());
    assert!(private.p.is_some() && private.inverse_q.is_some());
    assert_eq!(private.exponent, vec![0x01, 0x00, 0x01]);

    let public = key.export_parameters(false).unwrap();
    assert!(public.d.is_none());
    assert_eq!(public.modulus, private.modulus);

    let mut incomplete = private.clone();
    incomplete.dq = None;
    assert!(matches!(
        RsaKey::from_parameters(&incomplete),
        Err(Error::InvalidParameters(_))
    ));
}

#[test]
fn key_sizes() {
    assert!(matches!(RsaKey::new(383), Err(Error::InvalidKeySize(383))));
    assert!(matches!(RsaKey::new(1025), Err(Error::InvalidKeySize(1025))));
    assert!(RsaKey::new(2048).is_ok());

    assert!(matches!(DsaKey::new(448), Err(Error::InvalidKeySize(448))));
    assert!(matches!(DsaKey::new(1088), Err(Error::InvalidKeySize(1088))));
    assert!(matches!(DsaKey::new(520), Err(Error::InvalidKeySize(520))));
}

#[test]
fn lazy_generation() {
    let key = RsaKey::new(512).unwrap();
    assert!(!key.is_generated());
    assert_eq!(key.key_size(), 512);

    let hash = HashAlgorithm::Sha1.digest(b"test");
    let signature = key.sign_hash(&hash, HashAlgorithm::Sha1).unwrap();
    assert!(key.is_generated());
    assert!(key.verify_hash(&hash, HashAlgorithm::Sha1, &signature).unwrap());
}

#[test]
fn dsa_sign_and_verify() {
    let key = DsaKey::generate(512).unwrap();
    let hash = HashAlgorithm::Sha1.digest(b"test");

    let signature = key.sign(&hash).unwrap();
    assert_eq!(signature.len(), 40);
    assert!(key.verify(&hash, &signature).unwrap());

    let parameters = key.export_parameters(false).unwrap();
    assert!(parameters.x.is_none());
    assert!(parameters.seed.is_some());
    let public = DsaKey::from_parameters(&parameters).unwrap();
    assert!(public.verify(&hash, &signature).unwrap());
    assert!(matches!(public.sign(&hash), Err(Error::NoPrivateKey)));

    let mut tampered = signature.clone();
    tampered[39] ^= 1;
    assert!(!public.verify(&hash, &tampered).unwrap());

    assert!(matches!(
        key.sign(&hash[..19]),
        Err(Error::InvalidLength { .. })
    ));
}

#[test]
fn blob_round_trip() {
    let data = std::fs::read(sample("rsa1024_keypair.blob")).unwrap();
    let blob = KeyBlob::decode(&data).unwrap();
    assert_eq!(blob.encode(true).unwrap(), data);

    let pvk = blob.to_pvk().unwrap();
    let restored = KeyBlob::from_pvk(&pvk).unwrap();
    assert_eq!(restored.encode(true).unwrap(), data);
}

#[test]
fn cipher_round_trips() {
    let message = b"The quick brown fox jumps over the lazy dog";

    for (algorithm, key_len) in [
        (SymmetricAlgorithm::Aes, 16),
        (SymmetricAlgorithm::Aes, 32),
        (SymmetricAlgorithm::Des, 8),
        (SymmetricAlgorithm::TripleDes, 24),
    ] {
        let key: Vec<u8> = (1..=key_len as u8).collect();
        let iv = vec![0x5A; algorithm.block_size()];
        for (mode, padding) in [
            (CipherMode::Cbc, PaddingMode::Pkcs7),
            (CipherMode::Ecb, PaddingMode::AnsiX923),
            (CipherMode::Cfb, PaddingMode::Iso10126),
            (CipherMode::Ofb, PaddingMode::Pkcs7),
        ] {
            let config = CipherConfig::new(mode, padding).with_iv(&iv);
            let mut encryptor = CipherContext::new(
                algorithm.create(&key).unwrap(),
                Direction::Encrypt,
                config.clone(),
            )
            .unwrap();
            let mut decryptor =
                CipherContext::new(algorithm.create(&key).unwrap(), Direction::Decrypt, config)
                    .unwrap();

            let mut ciphertext = encryptor.update(&message[..10]).unwrap();
            ciphertext.extend(encryptor.finalize(&message[10..]).unwrap());
            assert_eq!(ciphertext.len() % algorithm.block_size(), 0);

            let plaintext = decryptor.finalize(&ciphertext).unwrap();
            assert_eq!(plaintext, message, "{algorithm} {mode} {padding}");
        }
    }
}

#[test]
fn bad_padding_is_rejected() {
    let key = [7u8; 16];
    let config = CipherConfig::new(CipherMode::Cbc, PaddingMode::None);
    let mut encryptor = CipherContext::new(
        SymmetricAlgorithm::Aes.create(&key).unwrap(),
        Direction::Encrypt,
        config,
    )
    .unwrap();
    let ciphertext = encryptor.finalize(&[0x42; 16]).unwrap();

    let mut decryptor = CipherContext::new(
        SymmetricAlgorithm::Aes.create(&key).unwrap(),
        Direction::Decrypt,
        CipherConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        decryptor.finalize(&ciphertext),
        Err(Error::InvalidPadding)
    ));
}

#[test]
fn macs() {
    let mac = Hmac::compute(HashAlgorithm::Sha1, b"key", b"The quick brown fox jumps over the lazy dog");
    assert_eq!(hex::encode(mac), "de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9");

    let mut streaming = Hmac::new(HashAlgorithm::Sha256, b"key");
    streaming.update(b"The quick brown fox ");
    streaming.update(b"jumps over the lazy dog");
    assert_eq!(
        hex::encode(streaming.finalize()),
        "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
    );

    let cipher = SymmetricAlgorithm::TripleDes.create(&[0x11; 24]).unwrap();
    let mut cbc = CipherMac::new(cipher, 64).unwrap();
    cbc.update(b"abc").unwrap();
    let tag = cbc.finalize().unwrap();
    assert_eq!(tag.len(), 8);
}

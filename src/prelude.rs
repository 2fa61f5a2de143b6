//! # certscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the certscope library. Import this module to get quick access to keys, certificates,
//! chains and stores.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all certscope operations
pub use crate::Error;

/// The result type used throughout certscope
pub use crate::Result;

/// Low-level parsing utilities
pub use crate::{file::Input, Parser};

// ================================================================================================
// Cryptography
// ================================================================================================

/// Digest algorithms and the OID registry
pub use crate::crypto::{registry, HashAlgorithm};

/// Asymmetric keys
pub use crate::crypto::asymmetric::{
    blob::KeyBlob, AsymmetricKey, DsaKey, DsaParameters, KeyAlgorithm, RsaKey, RsaParameters,
};

/// Block ciphers and transforms
pub use crate::crypto::symmetric::{
    BlockCipher, CipherConfig, CipherContext, CipherMode, Direction, PaddingMode,
    SymmetricAlgorithm,
};

/// Message authentication codes
pub use crate::crypto::mac::{CipherMac, Hmac};

// ================================================================================================
// X.509
// ================================================================================================

/// Certificates, CRLs and names
pub use crate::x509::{Certificate, Crl, DistinguishedName, RevokedCertificate};

/// Extensions
pub use crate::x509::extensions::{
    BasicConstraints, ExtendedKeyUsage, Extension, ExtensionSet, ExtensionType, KeyUsage,
    SubjectAltName, SubjectKeyIdentifier,
};

/// Chain building
pub use crate::x509::{Chain, ChainBuilder, ChainConfig, ChainStatus};

// ================================================================================================
// Stores
// ================================================================================================

/// Certificate stores
pub use crate::store::{StoreConfig, StoreLocation, StoreName, X509Store, X509Stores};

//! X.509 certificates, CRLs and chain building.
//!
//! This module contains the DER subset needed for RFC 5280 certificates and CRLs, the decoded
//! object model on top of it, and the chain builder that links certificates to trust anchors.
//!
//! # Architecture
//!
//! Decoding is a single pass over borrowed [`asn1::Element`]s. Decoded objects own their raw
//! encoding and remember the byte range of the signed portion, so signature checks hash exactly
//! the bytes the issuer signed. Algorithm OIDs are resolved through
//! [`crate::crypto::registry`], and signatures are verified with
//! [`crate::crypto::asymmetric::AsymmetricKey`].
//!
//! # Key Components
//!
//! - [`asn1`] - DER element reader and the encoders used by PKCS #1
//! - [`oid`] - OID text conversion and well-known identifiers
//! - [`name`] - Distinguished names and their string form
//! - [`extensions`] - Extension set and typed extension views
//! - [`Certificate`] - Decoded certificate with hash, thumbprint and signature verification
//! - [`Crl`] - Decoded certificate revocation list
//! - [`ChainBuilder`] / [`Chain`] - Path building to trust anchors
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::x509::{extensions::SubjectAltName, Certificate};
//! use std::path::Path;
//!
//! let cert = Certificate::from_file(Path::new("tests/samples/leaf_rsa.cer"))?;
//! for extension in cert.extensions() {
//!     println!("{} critical={}", extension.oid, extension.critical);
//! }
//! if let Some(san) = cert.extensions().typed::<SubjectAltName>()? {
//!     println!("DNS names: {:?}", san.dns_names().collect::<Vec<_>>());
//! }
//! # Ok::<(), certscope::Error>(())
//! ```

pub mod asn1;
mod certificate;
mod chain;
mod crl;
pub mod extensions;
pub mod name;
pub mod oid;
mod time;

pub use certificate::{AlgorithmIdentifier, Certificate};
pub use chain::{Chain, ChainBuilder, ChainConfig, ChainStatus};
pub use crl::{Crl, CrlReason, RevokedCertificate};
pub use name::DistinguishedName;
pub use time::decode_time;

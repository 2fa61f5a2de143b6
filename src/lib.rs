// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # certscope
//!
//! A managed X.509 and cryptography stack in pure Rust: RSA and DSA keys on arbitrary-precision
//! integers, block cipher transforms, MACs, DER certificate and CRL decoding, chain building
//! against trust anchors and content-addressed on-disk certificate stores.
//!
//! ## Features
//!
//! - **🔑 Asymmetric keys** - RSA (raw, PKCS #1 v1.5) and FIPS 186-2 DSA, lazy generation,
//!   zeroize-on-drop private material, CryptoAPI blob and PVK persistence
//! - **🔒 Symmetric transforms** - AES, DES and 3DES in ECB, CBC, CFB and OFB with PKCS #7,
//!   zeros, ANSI X9.23 and ISO 10126 padding
//! - **📜 Certificates** - DER and PEM decoding, typed extensions, hashes over the original TBS
//!   bytes, CRLs with revocation lookup
//! - **⛓️ Chains** - Signature-verified parent matching, immune to same-name impostors
//! - **📦 Stores** - User and machine store directories with idempotent imports
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! certscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use certscope::prelude::*;
//! use std::sync::Arc;
//!
//! let root = Arc::new(Certificate::from_file("tests/samples/root_rsa.cer".as_ref())?);
//! let intermediate = Arc::new(Certificate::from_file("tests/samples/intermediate_rsa.cer".as_ref())?);
//! let leaf = Certificate::from_file("tests/samples/leaf_rsa.cer".as_ref())?;
//!
//! let builder = ChainBuilder::new(vec![intermediate], vec![root]);
//! match builder.get_chain(&leaf) {
//!     Some(chain) => println!("trusted, {} intermediates", chain.path.len()),
//!     None => println!("untrusted"),
//! }
//! # Ok::<(), certscope::Error>(())
//! ```
//!
//! ### Keys
//!
//! ```rust
//! use certscope::crypto::{asymmetric::RsaKey, HashAlgorithm};
//!
//! let key = RsaKey::generate(512)?;
//! let hash = HashAlgorithm::Sha1.digest(b"test");
//! let signature = key.sign_hash(&hash, HashAlgorithm::Sha1)?;
//! assert!(key.verify_hash(&hash, HashAlgorithm::Sha1, &signature)?);
//!
//! let public = key.export_parameters(false)?;
//! assert!(public.d.is_none());
//! # Ok::<(), certscope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with the crate-wide [`Error`]. Malformed
//! certificates surface as a single [`Error::CertificateFormat`] carrying the structural cause;
//! an untrusted chain is an absent result rather than an error.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use certscope::prelude::*;
///
/// let cert = Certificate::from_file("tests/samples/leaf_rsa.cer".as_ref())?;
/// println!("{}", cert.subject());
/// # Ok::<(), certscope::Error>(())
/// ```
pub mod prelude;

/// Byte sources and the cursor parser used by every decoder.
pub mod file;

/// Digests, the OID registry, asymmetric keys, block cipher transforms and MACs.
pub mod crypto;

/// Certificates, CRLs, extensions and chain building.
pub mod x509;

/// Directory-backed certificate stores for the user and machine scopes.
pub mod store;

/// `certscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use certscope::{Result, x509::Certificate};
///
/// fn load(path: &str) -> Result<Certificate> {
///     Certificate::from_file(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `certscope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use certscope::{Error, x509::Certificate};
///
/// match Certificate::from_file(std::path::Path::new("tests/samples/forged_leaf.cer")) {
///     Ok(cert) => println!("Loaded {}", cert.subject()),
///     Err(Error::CertificateFormat(cause)) => println!("Malformed: {}", cause),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Cursor over a byte slice, see [`file::parser::Parser`].
pub use file::parser::Parser;

//! Decoded X.509 certificates.
//!
//! [`Certificate`] owns the DER encoding it was decoded from and records the byte range of the
//! TBSCertificate inside it. Signature hashes are always computed over that original span, never
//! over a re-encoding, so certificates with non-canonical but accepted encodings still verify.
//!
//! ```text
//! Certificate ::= SEQUENCE {
//!     tbsCertificate       TBSCertificate,
//!     signatureAlgorithm   AlgorithmIdentifier,
//!     signature            BIT STRING }
//!
//! TBSCertificate ::= SEQUENCE {
//!     version         [0] EXPLICIT INTEGER DEFAULT v1,
//!     serialNumber        INTEGER,
//!     signature           AlgorithmIdentifier,
//!     issuer              Name,
//!     validity            SEQUENCE { notBefore Time, notAfter Time },
//!     subject             Name,
//!     subjectPublicKeyInfo SEQUENCE { AlgorithmIdentifier, BIT STRING },
//!     issuerUniqueID  [1] IMPLICIT BIT STRING OPTIONAL,
//!     subjectUniqueID [2] IMPLICIT BIT STRING OPTIONAL,
//!     extensions      [3] EXPLICIT Extensions OPTIONAL }
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::x509::Certificate;
//! use std::path::Path;
//!
//! let cert = Certificate::from_file(Path::new("tests/samples/leaf_rsa.cer"))?;
//! println!("Subject:    {}", cert.subject());
//! println!("Issuer:     {}", cert.issuer());
//! println!("Serial:     {}", cert.serial_hex());
//! println!("Thumbprint: {}", hex::encode_upper(cert.thumbprint()));
//! println!("Valid now:  {}", cert.is_current_now());
//! # Ok::<(), certscope::Error>(())
//! ```

use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::Range,
    path::Path,
    sync::OnceLock,
};

use base64::Engine;
use chrono::{DateTime, Utc};

use crate::{
    crypto::{asymmetric::AsymmetricKey, asymmetric::KeyAlgorithm, registry, HashAlgorithm},
    file::Input,
    x509::{
        asn1::{self, tag, Element},
        extensions::{ExtensionSet, SubjectKeyIdentifier},
        name::DistinguishedName,
        time::decode_time,
    },
    Error::CertificateFormat,
    Result,
};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Length of each half of an assembled DSA signature.
const DSA_HALF: usize = 20;

/// `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmIdentifier {
    /// Dotted algorithm OID
    pub oid: String,
    /// DER encoding of the parameters; `None` when absent or NULL
    pub parameters: Option<Vec<u8>>,
}

impl AlgorithmIdentifier {
    /// Decodes an `AlgorithmIdentifier`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an invalid structure.
    pub fn decode(element: &Element<'_>) -> Result<AlgorithmIdentifier> {
        element.expect(tag::SEQUENCE)?;
        let mut reader = element.reader();
        let oid = reader.read_tagged(tag::OID)?.as_oid()?;
        let parameters = if reader.has_more() {
            let parameters = reader.read()?;
            (parameters.tag != tag::NULL).then(|| parameters.raw.to_vec())
        } else {
            None
        };
        reader.finish()?;

        Ok(AlgorithmIdentifier { oid, parameters })
    }
}

/// A decoded X.509 v1, v2 or v3 certificate.
///
/// Equality and hashing consider only the DER encoding.
#[derive(Clone)]
pub struct Certificate {
    raw: Vec<u8>,
    tbs: Range<usize>,
    version: u8,
    serial: Vec<u8>,
    issuer: DistinguishedName,
    subject: DistinguishedName,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    key_algorithm: AlgorithmIdentifier,
    key_bytes: Vec<u8>,
    issuer_unique_id: Option<Vec<u8>>,
    subject_unique_id: Option<Vec<u8>>,
    extensions: ExtensionSet,
    signature_algorithm: AlgorithmIdentifier,
    signature: Vec<u8>,
    hash: OnceLock<Vec<u8>>,
    public_key: OnceLock<AsymmetricKey>,
}

impl Certificate {
    /// Decodes a DER certificate from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CertificateFormat`] wrapping the structural cause if the
    /// encoding is invalid.
    pub fn from_der(data: &[u8]) -> Result<Certificate> {
        Self::decode(data.to_vec())
    }

    /// Decodes a certificate from an owned buffer holding DER or PEM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] for an empty buffer and
    /// [`crate::Error::CertificateFormat`] for an invalid encoding.
    pub fn from_mem(data: Vec<u8>) -> Result<Certificate> {
        let input = Input::from_mem(data)?;
        Self::load(input)
    }

    /// Decodes a certificate file holding DER or PEM.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be read,
    /// [`crate::Error::Empty`] for an empty file and [`crate::Error::CertificateFormat`] for an
    /// invalid encoding.
    pub fn from_file(path: &Path) -> Result<Certificate> {
        let input = Input::from_file(path)?;
        Self::load(input)
    }

    /// Decodes the first `CERTIFICATE` block of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CertificateFormat`] if no block is found, the base64 payload is
    /// invalid or the DER inside is malformed.
    pub fn from_pem(text: &str) -> Result<Certificate> {
        let der = pem_payload(text).map_err(|error| CertificateFormat(Box::new(error)))?;
        Self::decode(der)
    }

    fn load(input: Input) -> Result<Certificate> {
        if input.data().starts_with(PEM_BEGIN.as_bytes()) {
            let text = String::from_utf8_lossy(input.data());
            return Self::from_pem(&text);
        }
        Self::decode(input.into_data())
    }

    fn decode(raw: Vec<u8>) -> Result<Certificate> {
        Self::decode_inner(raw).map_err(|error| match error {
            CertificateFormat(_) => error,
            other => CertificateFormat(Box::new(other)),
        })
    }

    fn decode_inner(raw: Vec<u8>) -> Result<Certificate> {
        let certificate = asn1::decode(&raw)?;
        certificate.expect(tag::SEQUENCE)?;

        let mut outer = certificate.reader();
        let tbs_element = outer.read_tagged(tag::SEQUENCE)?;
        let signature_algorithm = AlgorithmIdentifier::decode(&outer.read_tagged(tag::SEQUENCE)?)?;
        let signature_bits = outer.read_tagged(tag::BIT_STRING)?.as_bit_string()?;
        outer.finish()?;

        let tbs_start = certificate.header_len();
        let tbs = tbs_start..tbs_start + tbs_element.raw.len();

        let mut reader = tbs_element.reader();

        let version = match reader.read_optional(tag::context(0))? {
            Some(explicit) => match explicit.unwrap_explicit()?.as_u64()? {
                value @ 0..=2 => value as u8 + 1,
                value => return Err(malformed_error!("Unknown certificate version {}", value)),
            },
            None => 1,
        };

        let serial = reader.read_tagged(tag::INTEGER)?;
        if serial.content.is_empty() {
            return Err(malformed_error!("Empty serial number"));
        }
        let serial = serial.content.to_vec();

        let signed_algorithm = AlgorithmIdentifier::decode(&reader.read_tagged(tag::SEQUENCE)?)?;
        if signed_algorithm != signature_algorithm {
            return Err(malformed_error!(
                "Signed certificate algorithm {} differs from the outer {}",
                signed_algorithm.oid,
                signature_algorithm.oid
            ));
        }

        let issuer = DistinguishedName::decode(&reader.read_tagged(tag::SEQUENCE)?)?;

        let validity = reader.read_tagged(tag::SEQUENCE)?;
        let mut times = validity.reader();
        let not_before = decode_time(&times.read()?)?;
        let not_after = decode_time(&times.read()?)?;
        times.finish()?;

        let subject = DistinguishedName::decode(&reader.read_tagged(tag::SEQUENCE)?)?;

        let spki = reader.read_tagged(tag::SEQUENCE)?;
        let mut spki_reader = spki.reader();
        let key_algorithm = AlgorithmIdentifier::decode(&spki_reader.read_tagged(tag::SEQUENCE)?)?;
        let key_bytes = spki_reader.read_tagged(tag::BIT_STRING)?.as_bit_string()?.to_vec();
        spki_reader.finish()?;

        let issuer_unique_id = reader
            .read_optional(tag::context_primitive(1))?
            .map(|id| unique_id(&id))
            .transpose()?;
        let subject_unique_id = reader
            .read_optional(tag::context_primitive(2))?
            .map(|id| unique_id(&id))
            .transpose()?;
        let extensions = match reader.read_optional(tag::context(3))? {
            Some(explicit) => ExtensionSet::decode(&explicit.unwrap_explicit()?)?,
            None => ExtensionSet::default(),
        };
        reader.finish()?;

        let signature = match registry::signature_algorithm(&signature_algorithm.oid) {
            Ok(algorithm) if algorithm.key == KeyAlgorithm::Dsa => {
                assemble_dsa_signature(signature_bits)?
            }
            _ => signature_bits.to_vec(),
        };

        Ok(Certificate {
            raw,
            tbs,
            version,
            serial,
            issuer,
            subject,
            not_before,
            not_after,
            key_algorithm,
            key_bytes,
            issuer_unique_id,
            subject_unique_id,
            extensions,
            signature_algorithm,
            signature,
            hash: OnceLock::new(),
            public_key: OnceLock::new(),
        })
    }

    /// The complete DER encoding.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The encoded TBSCertificate, exactly as it appears in [`Certificate::raw`].
    #[must_use]
    pub fn tbs(&self) -> &[u8] {
        &self.raw[self.tbs.clone()]
    }

    /// Certificate version, 1 to 3.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Serial number content octets, big-endian as encoded.
    #[must_use]
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number as uppercase hex.
    #[must_use]
    pub fn serial_hex(&self) -> String {
        hex::encode_upper(&self.serial)
    }

    /// Issuer name.
    #[must_use]
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Subject name.
    #[must_use]
    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    /// Start of the validity period, inclusive.
    #[must_use]
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// End of the validity period, exclusive.
    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// True if `at` lies within `[not_before, not_after)`.
    #[must_use]
    pub fn is_current(&self, at: DateTime<Utc>) -> bool {
        self.not_before <= at && at < self.not_after
    }

    /// [`Certificate::is_current`] for the current time.
    #[must_use]
    pub fn is_current_now(&self) -> bool {
        self.is_current(Utc::now())
    }

    /// Algorithm of the subject public key.
    #[must_use]
    pub fn key_algorithm(&self) -> &AlgorithmIdentifier {
        &self.key_algorithm
    }

    /// Content of the `subjectPublicKey` BIT STRING without the unused-bits octet.
    #[must_use]
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.key_bytes
    }

    /// The subject public key, decoded on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedAlgorithm`] for key types other than RSA and DSA and
    /// [`crate::Error::Malformed`] if the key cannot be decoded.
    pub fn public_key(&self) -> Result<&AsymmetricKey> {
        if let Some(key) = self.public_key.get() {
            return Ok(key);
        }
        let key = AsymmetricKey::from_public_key_info(
            &self.key_algorithm.oid,
            self.key_algorithm.parameters.as_deref(),
            &self.key_bytes,
        )?;
        Ok(self.public_key.get_or_init(|| key))
    }

    /// Algorithm the issuer signed with.
    #[must_use]
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    /// Signature value; DSA signatures are in the 40-byte `r || s` form.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// `issuerUniqueID` without the unused-bits octet.
    #[must_use]
    pub fn issuer_unique_id(&self) -> Option<&[u8]> {
        self.issuer_unique_id.as_deref()
    }

    /// `subjectUniqueID` without the unused-bits octet.
    #[must_use]
    pub fn subject_unique_id(&self) -> Option<&[u8]> {
        self.subject_unique_id.as_deref()
    }

    /// The v3 extensions; empty for v1 and v2 certificates.
    #[must_use]
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Subject Key Identifier, if the extension is present and well formed.
    #[must_use]
    pub fn subject_key_identifier(&self) -> Option<Vec<u8>> {
        self.extensions
            .typed::<SubjectKeyIdentifier>()
            .ok()
            .flatten()
            .map(|ski| ski.0)
    }

    /// Digest of the TBSCertificate under the signature algorithm's hash, computed once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedAlgorithm`] for an unknown signature algorithm.
    pub fn hash(&self) -> Result<&[u8]> {
        if let Some(hash) = self.hash.get() {
            return Ok(hash);
        }
        let algorithm = registry::signature_algorithm(&self.signature_algorithm.oid)?;
        let hash = algorithm.hash.digest(self.tbs());
        Ok(self.hash.get_or_init(|| hash))
    }

    /// SHA-1 over the complete encoding.
    #[must_use]
    pub fn thumbprint(&self) -> Vec<u8> {
        HashAlgorithm::Sha1.digest(&self.raw)
    }

    /// Checks the signature against a candidate issuer key.
    ///
    /// A key of the wrong algorithm family simply does not verify.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedAlgorithm`] for an unknown signature algorithm.
    pub fn verify_signature(&self, key: &AsymmetricKey) -> Result<bool> {
        let algorithm = registry::signature_algorithm(&self.signature_algorithm.oid)?;
        if algorithm.key != key.algorithm() {
            return Ok(false);
        }
        key.verify_signature(algorithm.hash, self.hash()?, &self.signature)
    }

    /// Checks the signature against `issuer`'s public key, treating any failure as a mismatch.
    #[must_use]
    pub fn is_signed_by(&self, issuer: &Certificate) -> bool {
        issuer
            .public_key()
            .and_then(|key| self.verify_signature(key))
            .unwrap_or(false)
    }

    /// True if issuer and subject names are equal.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }

    /// True if the certificate is self-issued and verifies under its own key.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        self.is_self_issued() && self.is_signed_by(self)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("version", &self.version)
            .field("serial", &self.serial_hex())
            .field("subject", &self.subject.to_string())
            .field("issuer", &self.issuer.to_string())
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

fn unique_id(element: &Element<'_>) -> Result<Vec<u8>> {
    match element.content.split_first() {
        Some((0..=7, bits)) => Ok(bits.to_vec()),
        _ => Err(malformed_error!("Invalid unique identifier")),
    }
}

/// Converts `Dss-Sig-Value ::= SEQUENCE { r INTEGER, s INTEGER }` into `r || s`, 20 bytes each.
pub(crate) fn assemble_dsa_signature(der: &[u8]) -> Result<Vec<u8>> {
    let sequence = asn1::decode(der)?;
    sequence.expect(tag::SEQUENCE)?;
    let mut reader = sequence.reader();
    let r = reader.read_tagged(tag::INTEGER)?.content;
    let s = reader.read_tagged(tag::INTEGER)?.content;
    reader.finish()?;

    let mut signature = Vec::with_capacity(2 * DSA_HALF);
    for half in [r, s] {
        if half.len() >= DSA_HALF {
            signature.extend_from_slice(&half[half.len() - DSA_HALF..]);
        } else {
            signature.resize(signature.len() + DSA_HALF - half.len(), 0);
            signature.extend_from_slice(half);
        }
    }
    Ok(signature)
}

fn pem_payload(text: &str) -> Result<Vec<u8>> {
    let start = text
        .find(PEM_BEGIN)
        .ok_or_else(|| malformed_error!("Missing PEM certificate header"))?
        + PEM_BEGIN.len();
    let end = text[start..]
        .find(PEM_END)
        .ok_or_else(|| malformed_error!("Missing PEM certificate trailer"))?
        + start;

    let body: String = text[start..end]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|error| malformed_error!("Invalid PEM payload - {}", error))
}

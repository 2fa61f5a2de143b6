//! Certificate revocation lists.
//!
//! ```text
//! CertificateList ::= SEQUENCE {
//!     tbsCertList          TBSCertList,
//!     signatureAlgorithm   AlgorithmIdentifier,
//!     signatureValue       BIT STRING }
//!
//! TBSCertList ::= SEQUENCE {
//!     version              INTEGER OPTIONAL,   -- v2 when present
//!     signature            AlgorithmIdentifier,
//!     issuer               Name,
//!     thisUpdate           Time,
//!     nextUpdate           Time OPTIONAL,
//!     revokedCertificates  SEQUENCE OF SEQUENCE {
//!         userCertificate     INTEGER,
//!         revocationDate      Time,
//!         crlEntryExtensions  Extensions OPTIONAL } OPTIONAL,
//!     crlExtensions    [0] EXPLICIT Extensions OPTIONAL }
//! ```
//!
//! The chain builder never consults CRLs; revocation is a policy decision left to the caller via
//! [`Crl::is_revoked`].

use std::{ops::Range, path::Path, sync::OnceLock};

use chrono::{DateTime, Utc};
use strum::{Display, EnumIter};

use crate::{
    crypto::{asymmetric::AsymmetricKey, asymmetric::KeyAlgorithm, registry, HashAlgorithm},
    file::Input,
    x509::{
        asn1::{self, tag},
        certificate::{assemble_dsa_signature, AlgorithmIdentifier},
        extensions::{AuthorityKeyIdentifier, ExtensionSet},
        name::DistinguishedName,
        oid,
        time::decode_time,
        Certificate,
    },
    Error::CertificateFormat,
    Result,
};

/// Reason code of a revoked entry (RFC 5280 section 5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum CrlReason {
    /// 0
    Unspecified,
    /// 1, the subject key was compromised
    KeyCompromise,
    /// 2, the issuing CA key was compromised
    CaCompromise,
    /// 3
    AffiliationChanged,
    /// 4, replaced by a newer certificate
    Superseded,
    /// 5
    CessationOfOperation,
    /// 6, temporarily suspended
    CertificateHold,
    /// 8, delta CRL only
    RemoveFromCrl,
    /// 9
    PrivilegeWithdrawn,
    /// 10
    AaCompromise,
}

impl CrlReason {
    /// Maps the ENUMERATED value; 7 is unassigned.
    #[must_use]
    pub fn from_code(code: u64) -> Option<CrlReason> {
        Some(match code {
            0 => CrlReason::Unspecified,
            1 => CrlReason::KeyCompromise,
            2 => CrlReason::CaCompromise,
            3 => CrlReason::AffiliationChanged,
            4 => CrlReason::Superseded,
            5 => CrlReason::CessationOfOperation,
            6 => CrlReason::CertificateHold,
            8 => CrlReason::RemoveFromCrl,
            9 => CrlReason::PrivilegeWithdrawn,
            10 => CrlReason::AaCompromise,
            _ => return None,
        })
    }
}

/// One revoked certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedCertificate {
    /// Serial number content octets, big-endian as encoded
    pub serial: Vec<u8>,
    /// When the certificate was revoked
    pub revocation_date: DateTime<Utc>,
    /// Entry extensions
    pub extensions: ExtensionSet,
}

impl RevokedCertificate {
    /// The `reasonCode` entry extension, if present and valid.
    #[must_use]
    pub fn reason(&self) -> Option<CrlReason> {
        let extension = self.extensions.get(oid::CRL_REASON)?;
        let code = asn1::decode(&extension.value).ok()?.as_u64().ok()?;
        CrlReason::from_code(code)
    }
}

/// A decoded v1 or v2 CRL.
#[derive(Debug, Clone)]
pub struct Crl {
    raw: Vec<u8>,
    tbs: Range<usize>,
    version: u8,
    issuer: DistinguishedName,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    entries: Vec<RevokedCertificate>,
    extensions: ExtensionSet,
    signature_algorithm: AlgorithmIdentifier,
    signature: Vec<u8>,
    hash: OnceLock<Vec<u8>>,
}

impl Crl {
    /// Decodes a DER CRL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::CertificateFormat`] wrapping the structural cause.
    pub fn from_der(data: &[u8]) -> Result<Crl> {
        Self::decode(data.to_vec())
    }

    /// Decodes a DER CRL from an owned buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] for an empty buffer and
    /// [`crate::Error::CertificateFormat`] for an invalid encoding.
    pub fn from_mem(data: Vec<u8>) -> Result<Crl> {
        Self::decode(Input::from_mem(data)?.into_data())
    }

    /// Decodes a DER CRL file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be read, plus the errors of
    /// [`Crl::from_mem`].
    pub fn from_file(path: &Path) -> Result<Crl> {
        Self::decode(Input::from_file(path)?.into_data())
    }

    fn decode(raw: Vec<u8>) -> Result<Crl> {
        Self::decode_inner(raw).map_err(|error| CertificateFormat(Box::new(error)))
    }

    fn decode_inner(raw: Vec<u8>) -> Result<Crl> {
        let list = asn1::decode(&raw)?;
        list.expect(tag::SEQUENCE)?;

        let mut outer = list.reader();
        let tbs_element = outer.read_tagged(tag::SEQUENCE)?;
        let signature_algorithm = AlgorithmIdentifier::decode(&outer.read_tagged(tag::SEQUENCE)?)?;
        let signature_bits = outer.read_tagged(tag::BIT_STRING)?.as_bit_string()?;
        outer.finish()?;

        let tbs_start = list.header_len();
        let tbs = tbs_start..tbs_start + tbs_element.raw.len();

        let mut reader = tbs_element.reader();
        let version = match reader.read_optional(tag::INTEGER)? {
            Some(version) => match version.as_u64()? {
                value @ 0..=1 => value as u8 + 1,
                value => return Err(malformed_error!("Unknown CRL version {}", value)),
            },
            None => 1,
        };
        let signed_algorithm = AlgorithmIdentifier::decode(&reader.read_tagged(tag::SEQUENCE)?)?;
        if signed_algorithm != signature_algorithm {
            return Err(malformed_error!(
                "Signed CRL algorithm {} differs from the outer {}",
                signed_algorithm.oid,
                signature_algorithm.oid
            ));
        }
        let issuer = DistinguishedName::decode(&reader.read_tagged(tag::SEQUENCE)?)?;
        let this_update = decode_time(&reader.read()?)?;

        let next_update = match reader.peek_tag() {
            Some(tag::UTC_TIME | tag::GENERALIZED_TIME) => Some(decode_time(&reader.read()?)?),
            _ => None,
        };

        let mut entries = Vec::new();
        if let Some(revoked) = reader.read_optional(tag::SEQUENCE)? {
            for entry in revoked.children()? {
                entry.expect(tag::SEQUENCE)?;
                let mut fields = entry.reader();
                let serial = fields.read_tagged(tag::INTEGER)?.content.to_vec();
                let revocation_date = decode_time(&fields.read()?)?;
                let extensions = match fields.read_optional(tag::SEQUENCE)? {
                    Some(extensions) => ExtensionSet::decode(&extensions)?,
                    None => ExtensionSet::default(),
                };
                fields.finish()?;

                entries.push(RevokedCertificate {
                    serial,
                    revocation_date,
                    extensions,
                });
            }
        }

        let extensions = match reader.read_optional(tag::context(0))? {
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

        Ok(Crl {
            raw,
            tbs,
            version,
            issuer,
            this_update,
            next_update,
            entries,
            extensions,
            signature_algorithm,
            signature,
            hash: OnceLock::new(),
        })
    }

    /// The complete DER encoding.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The encoded TBSCertList.
    #[must_use]
    pub fn tbs(&self) -> &[u8] {
        &self.raw[self.tbs.clone()]
    }

    /// CRL version, 1 or 2.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Issuer name.
    #[must_use]
    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Issue date.
    #[must_use]
    pub fn this_update(&self) -> DateTime<Utc> {
        self.this_update
    }

    /// Date by which the next CRL will be issued.
    #[must_use]
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.next_update
    }

    /// True if `at` lies within `[this_update, next_update)`.
    #[must_use]
    pub fn is_current(&self, at: DateTime<Utc>) -> bool {
        self.this_update <= at && self.next_update.map_or(true, |next| at < next)
    }

    /// Revoked entries in encoding order.
    #[must_use]
    pub fn entries(&self) -> &[RevokedCertificate] {
        &self.entries
    }

    /// CRL extensions.
    #[must_use]
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// The `cRLNumber` extension.
    #[must_use]
    pub fn crl_number(&self) -> Option<u64> {
        let extension = self.extensions.get(oid::CRL_NUMBER)?;
        asn1::decode(&extension.value).ok()?.as_u64().ok()
    }

    /// Key identifier of the Authority Key Identifier extension.
    #[must_use]
    pub fn authority_key_identifier(&self) -> Option<Vec<u8>> {
        self.extensions
            .typed::<AuthorityKeyIdentifier>()
            .ok()
            .flatten()
            .and_then(|aki| aki.key_identifier)
    }

    /// Looks up an entry by serial number content octets.
    #[must_use]
    pub fn entry(&self, serial: &[u8]) -> Option<&RevokedCertificate> {
        self.entries.iter().find(|entry| entry.serial == serial)
    }

    /// True if `certificate` was issued by this CRL's issuer and is listed.
    #[must_use]
    pub fn is_revoked(&self, certificate: &Certificate) -> bool {
        certificate.issuer() == &self.issuer && self.entry(certificate.serial()).is_some()
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

    /// Digest of the TBSCertList under the signature algorithm's hash, computed once.
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
}

impl PartialEq for Crl {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Crl {}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{test::sample, Error};

    fn load(name: &str) -> Crl {
        Crl::from_file(&sample(name)).unwrap()
    }

    #[test]
    fn decode_entries() {
        let crl = load("intermediate.crl");
        assert_eq!(crl.version(), 2);
        assert_eq!(
            crl.issuer().to_string(),
            "C=US, O=certscope, CN=certscope Test Intermediate"
        );
        assert_eq!(
            crl.this_update(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            crl.next_update(),
            Some(Utc.with_ymd_and_hms(2034, 1, 1, 0, 0, 0).unwrap())
        );

        assert_eq!(crl.entries().len(), 2);
        let first = crl.entry(&[0x01, 0x00, 0xAB]).unwrap();
        assert_eq!(
            first.revocation_date,
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(first.reason(), Some(CrlReason::KeyCompromise));

        let second = crl.entry(&[0x4D]).unwrap();
        assert_eq!(second.reason(), None);
        assert!(crl.entry(&[0x4E]).is_none());
    }

    #[test]
    fn crl_extensions() {
        let crl = load("intermediate.crl");
        assert_eq!(crl.crl_number(), Some(42));
        assert_eq!(
            hex::encode_upper(crl.authority_key_identifier().unwrap()),
            "1FDB3C3C1BB17F7069AFD407BB8F9D528674561D"
        );

        let root = load("root_noaki.crl");
        assert!(root.authority_key_identifier().is_none());
        assert!(root.entries().is_empty());
    }

    #[test]
    fn hash_and_thumbprint() {
        let crl = load("intermediate.crl");
        assert_eq!(
            hex::encode_upper(crl.hash().unwrap()),
            "A33267B8A8FC08004D654D620098FB5FA7D3B046"
        );
        assert_eq!(
            hex::encode_upper(crl.thumbprint()),
            "A8BCFBEB99658C53922AB016A634AE29FFFA2730"
        );
    }

    #[test]
    fn signatures_and_revocation() {
        let crl = load("intermediate.crl");
        let intermediate = Certificate::from_file(&sample("intermediate_rsa.cer")).unwrap();
        let root = Certificate::from_file(&sample("root_rsa.cer")).unwrap();
        let leaf = Certificate::from_file(&sample("leaf_rsa.cer")).unwrap();

        assert!(crl.is_signed_by(&intermediate));
        assert!(!crl.is_signed_by(&root));
        assert!(crl.is_revoked(&leaf));
        assert!(!crl.is_revoked(&intermediate));

        let root_crl = load("root_noaki.crl");
        assert!(root_crl.is_signed_by(&root));
    }

    #[test]
    fn validity_window() {
        let crl = load("intermediate.crl");
        assert!(crl.is_current(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(!crl.is_current(Utc.with_ymd_and_hms(2034, 1, 1, 0, 0, 0).unwrap()));
        assert!(!crl.is_current(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()));
    }

    #[test]
    fn malformed() {
        let mut raw = load("intermediate.crl").raw().to_vec();
        raw[0] = tag::SET;
        assert!(matches!(Crl::from_der(&raw), Err(Error::CertificateFormat(_))));
    }

    #[test]
    fn signed_algorithm_must_match_outer() {
        let mut raw = load("intermediate.crl").raw().to_vec();
        let sha1_rsa: [u8; 11] = [0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x05];
        let at = raw
            .windows(sha1_rsa.len())
            .position(|window| window == &sha1_rsa[..])
            .unwrap();
        raw[at + sha1_rsa.len() - 1] = 0x0B;
        assert!(matches!(Crl::from_der(&raw), Err(Error::CertificateFormat(_))));
    }
}

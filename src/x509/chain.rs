//! Certificate chain building against a set of trust anchors.
//!
//! [`ChainBuilder`] walks from a leaf towards a root through a pool of candidate issuers. A
//! candidate is accepted as the parent only if its public key verifies the child's signature;
//! equal names alone never link two certificates, so an impostor with a copied subject name is
//! ignored. The walk stops as soon as a trust anchor signs the current certificate, at a
//! self-signed certificate, which is not added to the path, or when no parent is found. Anchors
//! are checked before the pool, so a renewed root in the pool that shares the anchor's key does
//! not hide the anchor. A terminal that no anchor signs must be an anchor itself to be trusted.
//!
//! Revocation and validity periods are not checked here. Callers apply those policies to the
//! certificates of a trusted [`Chain`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::x509::{Certificate, ChainBuilder};
//! use std::{path::Path, sync::Arc};
//!
//! let load = |name: &str| -> certscope::Result<Arc<Certificate>> {
//!     Ok(Arc::new(Certificate::from_file(&Path::new("tests/samples").join(name))?))
//! };
//! let root = load("root_rsa.cer")?;
//! let intermediate = load("intermediate_rsa.cer")?;
//! let leaf = load("leaf_rsa.cer")?;
//!
//! let builder = ChainBuilder::new(vec![intermediate, root.clone()], vec![root.clone()]);
//! let chain = builder.get_chain(&leaf).expect("trusted");
//! assert_eq!(chain.path.len(), 1);
//! assert_eq!(chain.root.as_deref(), Some(root.as_ref()));
//! # Ok::<(), certscope::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use bitflags::bitflags;
use tracing::{debug, trace};

use crate::{
    store::X509Stores,
    x509::{extensions::BasicConstraints, name::DistinguishedName, Certificate},
    Result,
};

bitflags! {
    /// Problems found while building a chain. Empty for a trusted, well-formed chain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChainStatus: u32 {
        /// The walk ended at a certificate that no anchor signs
        const PARTIAL_CHAIN = 0x0001;
        /// The walk ended at a self-signed certificate that is not an anchor
        const UNTRUSTED_ROOT = 0x0002;
        /// An intermediate is not marked as a CA
        const INVALID_BASIC_CONSTRAINTS = 0x0004;
        /// A certificate named an issuer present in the pool whose key does not verify it
        const NOT_SIGNATURE_VALID = 0x0008;
    }
}

/// Chain building options.
///
/// The default is [`ChainConfig::strict`]. A v3 intermediate without the CA flag sets
/// [`ChainStatus::INVALID_BASIC_CONSTRAINTS`], and [`ChainBuilder::get_chain`] then returns
/// `None` even when an anchor signs the chain. Use [`ChainConfig::legacy`] to accept such chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// Only consider candidates whose subject equals the child's issuer
    pub match_names: bool,
    /// Flag v3 intermediates without `BasicConstraints CA=true`
    pub enforce_basic_constraints: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            match_names: true,
            enforce_basic_constraints: true,
        }
    }
}

impl ChainConfig {
    /// Name pre-filter and basic constraints enforcement.
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Parent matching by signature only; any pool certificate whose key verifies is a parent.
    #[must_use]
    pub fn signature_only() -> Self {
        Self {
            match_names: false,
            enforce_basic_constraints: true,
        }
    }

    /// Name pre-filter without basic constraints enforcement.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            match_names: true,
            enforce_basic_constraints: false,
        }
    }
}

/// Result of a chain build.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    /// Issuers from the leaf's parent upwards, excluding the leaf and any self-signed terminal
    pub path: Vec<Arc<Certificate>>,
    /// The trust anchor the chain resolved to
    pub root: Option<Arc<Certificate>>,
    /// Problems found
    pub status: ChainStatus,
}

impl Chain {
    /// True if an anchor was resolved and no problem was flagged.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        self.root.is_some() && self.status.is_empty()
    }
}

/// Builds chains from a candidate pool to a set of trust anchors.
pub struct ChainBuilder {
    pool: Vec<Arc<Certificate>>,
    anchors: Vec<Arc<Certificate>>,
    by_subject: HashMap<DistinguishedName, Vec<usize>>,
    config: ChainConfig,
}

impl ChainBuilder {
    /// Creates a builder with the default [`ChainConfig`].
    #[must_use]
    pub fn new(
        pool: impl IntoIterator<Item = Arc<Certificate>>,
        anchors: impl IntoIterator<Item = Arc<Certificate>>,
    ) -> ChainBuilder {
        let pool: Vec<Arc<Certificate>> = pool.into_iter().collect();

        let mut by_subject: HashMap<DistinguishedName, Vec<usize>> = HashMap::new();
        for (index, certificate) in pool.iter().enumerate() {
            by_subject
                .entry(certificate.subject().clone())
                .or_default()
                .push(index);
        }

        ChainBuilder {
            pool,
            anchors: anchors.into_iter().collect(),
            by_subject,
            config: ChainConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ChainConfig) -> ChainBuilder {
        self.config = config;
        self
    }

    /// Builds a builder from the intermediate CA and trusted root stores.
    ///
    /// Certificates present in the untrusted stores are excluded from both.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a store directory cannot be listed.
    pub fn from_stores(stores: &X509Stores) -> Result<ChainBuilder> {
        let untrusted = stores.untrusted()?;
        let allowed = |certificate: &Arc<Certificate>| !untrusted.contains(certificate);

        let pool: Vec<_> = stores.intermediate_cas()?.into_iter().filter(allowed).collect();
        let anchors: Vec<_> = stores.trusted_roots()?.into_iter().filter(allowed).collect();
        Ok(ChainBuilder::new(pool, anchors))
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> ChainConfig {
        self.config
    }

    /// Builds the chain for `leaf` and returns it only if it is trusted.
    ///
    /// An untrusted leaf is an expected outcome and yields `None`, never an error.
    #[must_use]
    pub fn get_chain(&self, leaf: &Certificate) -> Option<Chain> {
        let chain = self.build(leaf);
        chain.is_trusted().then_some(chain)
    }

    /// Builds the chain for `leaf` and reports every problem found.
    #[must_use]
    pub fn build(&self, leaf: &Certificate) -> Chain {
        let mut chain = Chain::default();
        let mut terminal: Option<Arc<Certificate>> = None;

        loop {
            let current = terminal.as_deref().unwrap_or(leaf);
            if current.is_self_signed() {
                trace!(subject = %current.subject(), "reached self-signed certificate");
                break;
            }

            // an anchor that signs the current certificate wins over pool candidates
            if let Some(anchor) = self.resolve_root(current) {
                chain.root = Some(anchor);
                break;
            }

            let Some(parent) = self.find_parent(current, &chain) else {
                break;
            };

            if parent.is_self_signed() {
                // roots are resolved against the anchors, never added to the path
                if !self.is_anchor(&parent) {
                    debug!(subject = %parent.subject(), "self-signed issuer is not an anchor");
                    chain.status |= ChainStatus::UNTRUSTED_ROOT;
                }
                break;
            }

            if self.config.enforce_basic_constraints && !is_ca(&parent) {
                debug!(subject = %parent.subject(), "issuer is not a CA");
                chain.status |= ChainStatus::INVALID_BASIC_CONSTRAINTS;
            }
            chain.path.push(parent.clone());
            terminal = Some(parent);
        }

        let terminal = terminal.as_deref().unwrap_or(leaf);
        if chain.root.is_none() {
            chain.root = self.resolve_root(terminal);
        }

        if chain.root.is_none() && !chain.status.contains(ChainStatus::UNTRUSTED_ROOT) {
            if terminal.is_self_signed() {
                chain.status |= ChainStatus::UNTRUSTED_ROOT;
            } else {
                chain.status |= ChainStatus::PARTIAL_CHAIN;
                if self.has_named_issuer(terminal) {
                    chain.status |= ChainStatus::NOT_SIGNATURE_VALID;
                }
            }
        }

        debug!(
            leaf = %leaf.subject(),
            depth = chain.path.len(),
            trusted = chain.root.is_some(),
            status = ?chain.status,
            "built chain"
        );
        chain
    }

    fn candidates<'a>(
        &'a self,
        issuer: &DistinguishedName,
        from: &'a [Arc<Certificate>],
        index: Option<&'a HashMap<DistinguishedName, Vec<usize>>>,
    ) -> Box<dyn Iterator<Item = &'a Arc<Certificate>> + 'a> {
        if !self.config.match_names {
            return Box::new(from.iter());
        }
        match index {
            Some(index) => Box::new(
                index
                    .get(issuer)
                    .into_iter()
                    .flatten()
                    .filter_map(|&i| from.get(i)),
            ),
            None => {
                let issuer = issuer.clone();
                Box::new(from.iter().filter(move |c| c.subject() == &issuer))
            }
        }
    }

    fn find_parent(&self, child: &Certificate, chain: &Chain) -> Option<Arc<Certificate>> {
        self.candidates(child.issuer(), &self.pool, Some(&self.by_subject))
            .filter(|candidate| candidate.as_ref() != child)
            .filter(|candidate| !chain.path.contains(candidate))
            .find(|candidate| {
                let signed = child.is_signed_by(candidate);
                trace!(
                    child = %child.subject(),
                    candidate = %candidate.subject(),
                    signed,
                    "parent candidate"
                );
                signed
            })
            .cloned()
    }

    fn is_anchor(&self, certificate: &Certificate) -> bool {
        self.anchors
            .iter()
            .any(|anchor| anchor.as_ref() == certificate)
    }

    fn resolve_root(&self, terminal: &Certificate) -> Option<Arc<Certificate>> {
        if let Some(anchor) = self
            .anchors
            .iter()
            .find(|anchor| anchor.as_ref() == terminal)
        {
            return Some(anchor.clone());
        }
        self.candidates(terminal.issuer(), &self.anchors, None)
            .find(|anchor| terminal.is_signed_by(anchor))
            .cloned()
    }

    fn has_named_issuer(&self, certificate: &Certificate) -> bool {
        self.by_subject.contains_key(certificate.issuer())
            || self
                .anchors
                .iter()
                .any(|anchor| anchor.subject() == certificate.issuer())
    }
}

/// v1 and v2 certificates cannot carry extensions and are accepted as issuers.
fn is_ca(certificate: &Certificate) -> bool {
    if certificate.version() < 3 {
        return true;
    }
    matches!(
        certificate.extensions().typed::<BasicConstraints>(),
        Ok(Some(BasicConstraints { ca: true, .. }))
    )
}

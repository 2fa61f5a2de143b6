use std::{collections::HashSet, path::PathBuf, sync::Arc};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::{StoreConfig, StoreLocation, X509Store};
use crate::{
    x509::{Certificate, Crl},
    Result,
};

/// Well-known store names. The name is the directory below a location root.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display, IntoStaticStr,
)]
pub enum StoreName {
    /// Personal certificates, usually with private keys
    My,
    /// Certificates of other people
    AddressBook,
    /// Intermediate certification authorities
    #[strum(serialize = "CA")]
    IntermediateCa,
    /// Trusted root certification authorities
    Trust,
    /// Explicitly distrusted certificates
    Disallowed,
}

/// The well-known stores of one location, or of both locations merged.
///
/// Lookups union every scope, user first; writes through the named store accessors go to the
/// first scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Stores {
    roots: Vec<PathBuf>,
}

impl X509Stores {
    /// Stores of a single location.
    #[must_use]
    pub fn new(config: &StoreConfig, location: StoreLocation) -> X509Stores {
        X509Stores {
            roots: vec![config.root(location).to_path_buf()],
        }
    }

    /// User and machine stores merged for lookups.
    #[must_use]
    pub fn merged(config: &StoreConfig) -> X509Stores {
        X509Stores {
            roots: vec![config.user_root.clone(), config.machine_root.clone()],
        }
    }

    /// Store `name` in the first scope.
    #[must_use]
    pub fn store(&self, name: StoreName) -> X509Store {
        let directory: &'static str = name.into();
        let root = self.roots.first().cloned().unwrap_or_default();
        X509Store::open(root.join(directory))
    }

    /// The personal store.
    #[must_use]
    pub fn personal(&self) -> X509Store {
        self.store(StoreName::My)
    }

    /// The other people store.
    #[must_use]
    pub fn other_people(&self) -> X509Store {
        self.store(StoreName::AddressBook)
    }

    /// The intermediate CA store.
    #[must_use]
    pub fn intermediate_ca(&self) -> X509Store {
        self.store(StoreName::IntermediateCa)
    }

    /// The trusted root store.
    #[must_use]
    pub fn trusted_root(&self) -> X509Store {
        self.store(StoreName::Trust)
    }

    /// The untrusted store.
    #[must_use]
    pub fn untrusted_store(&self) -> X509Store {
        self.store(StoreName::Disallowed)
    }

    /// Trusted root certificates across every scope.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a store directory cannot be listed.
    pub fn trusted_roots(&self) -> Result<Vec<Arc<Certificate>>> {
        self.union(StoreName::Trust)
    }

    /// Intermediate CA certificates across every scope.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a store directory cannot be listed.
    pub fn intermediate_cas(&self) -> Result<Vec<Arc<Certificate>>> {
        self.union(StoreName::IntermediateCa)
    }

    /// Untrusted certificates across every scope.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a store directory cannot be listed.
    pub fn untrusted(&self) -> Result<Vec<Arc<Certificate>>> {
        self.union(StoreName::Disallowed)
    }

    /// CRLs of the intermediate CA and trusted root stores across every scope.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if a store directory cannot be listed.
    pub fn crls(&self) -> Result<Vec<Arc<Crl>>> {
        let mut seen = HashSet::new();
        let mut crls = Vec::new();
        for name in [StoreName::IntermediateCa, StoreName::Trust] {
            for store in self.scopes(name) {
                for crl in store.crls()? {
                    if seen.insert(crl.raw().to_vec()) {
                        crls.push(crl);
                    }
                }
            }
        }
        Ok(crls)
    }

    fn scopes(&self, name: StoreName) -> impl Iterator<Item = X509Store> + '_ {
        let directory: &'static str = name.into();
        self.roots
            .iter()
            .map(move |root| X509Store::open(root.join(directory)))
    }

    fn union(&self, name: StoreName) -> Result<Vec<Arc<Certificate>>> {
        let mut seen = HashSet::new();
        let mut certificates = Vec::new();
        for store in self.scopes(name) {
            for certificate in store.certificates()? {
                if seen.insert(certificate.clone()) {
                    certificates.push(certificate);
                }
            }
        }
        Ok(certificates)
    }
}

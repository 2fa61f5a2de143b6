use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    crypto::asymmetric::{blob::KeyBlob, AsymmetricKey},
    x509::{Certificate, Crl},
    Error::{BusyOrLocked, InvalidParameters, NoPrivateKey},
    Result,
};

const LOCK_FILE: &str = ".lock";
const KEYS_DIR: &str = "keys";
const CERTIFICATE_EXTENSION: &str = "cer";
const CRL_EXTENSION: &str = "crl";
const KEY_EXTENSION: &str = "pvk";

/// A directory of certificates, CRLs and private keys.
///
/// Opening a store performs no I/O; the directory is created by the first write. Reads of a
/// missing directory yield empty collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X509Store {
    path: PathBuf,
}

impl X509Store {
    /// Opens the store rooted at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> X509Store {
        X509Store { path: path.into() }
    }

    /// Store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every certificate, skipping files that fail to decode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the directory exists but cannot be listed.
    pub fn certificates(&self) -> Result<Vec<Arc<Certificate>>> {
        self.load(CERTIFICATE_EXTENSION, Certificate::from_file)
    }

    /// Loads every CRL, skipping files that fail to decode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the directory exists but cannot be listed.
    pub fn crls(&self) -> Result<Vec<Arc<Crl>>> {
        self.load(CRL_EXTENSION, Crl::from_file)
    }

    /// Adds a certificate. Returns `false` if it was already present.
    ///
    /// The file is named `ski-<SKI>.cer` after the Subject Key Identifier, or `tbp-<SHA1>.cer`
    /// after the thumbprint when the extension is missing. A different certificate already
    /// holding the SKI name moves the new one to `ski-<SKI>-<SERIAL>.cer`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::BusyOrLocked`] if another writer holds the store lock
    /// - [`crate::Error::FileError`] on I/O failure
    pub fn import(&self, certificate: &Certificate) -> Result<bool> {
        let _lock = self.lock()?;

        for path in self.certificate_paths(certificate) {
            match fs::read(&path) {
                Ok(existing) if existing == certificate.raw() => return Ok(false),
                Ok(_) => continue,
                Err(error) if error.kind() == ErrorKind::NotFound => {
                    fs::write(&path, certificate.raw())?;
                    debug!(path = %path.display(), subject = %certificate.subject(), "imported certificate");
                    return Ok(true);
                }
                Err(error) => return Err(error.into()),
            }
        }
        Ok(false)
    }

    /// Removes a certificate and its private key. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::BusyOrLocked`] if another writer holds the store lock
    /// - [`crate::Error::FileError`] on I/O failure
    pub fn remove(&self, certificate: &Certificate) -> Result<bool> {
        let _lock = self.lock()?;

        let mut removed = false;
        for path in self.certificate_paths(certificate) {
            if read_if_exists(&path)?.is_some_and(|existing| existing == certificate.raw()) {
                fs::remove_file(&path)?;
                debug!(path = %path.display(), "removed certificate");
                removed = true;
            }
        }

        remove_if_exists(&self.key_path(certificate))?;
        Ok(removed)
    }

    /// Adds a CRL. Returns `false` if it was already present or a newer one is stored.
    ///
    /// The file is named `ski-<AKI>.crl` after the Authority Key Identifier, or `tbp-<SHA1>.crl`
    /// when the extension is missing. A CRL with a later `thisUpdate` replaces the stored one.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::BusyOrLocked`] if another writer holds the store lock
    /// - [`crate::Error::FileError`] on I/O failure
    pub fn import_crl(&self, crl: &Crl) -> Result<bool> {
        let _lock = self.lock()?;

        let path = self.crl_path(crl);
        if let Some(existing) = read_if_exists(&path)? {
            if existing == crl.raw() {
                return Ok(false);
            }
            match Crl::from_der(&existing) {
                Ok(stored) if stored.this_update() >= crl.this_update() => return Ok(false),
                Ok(_) => {}
                Err(error) => {
                    warn!(path = %path.display(), %error, "replacing unreadable CRL");
                }
            }
        }

        fs::write(&path, crl.raw())?;
        debug!(path = %path.display(), issuer = %crl.issuer(), "imported CRL");
        Ok(true)
    }

    /// Removes a CRL. Returns `false` if it was not present.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::BusyOrLocked`] if another writer holds the store lock
    /// - [`crate::Error::FileError`] on I/O failure
    pub fn remove_crl(&self, crl: &Crl) -> Result<bool> {
        let _lock = self.lock()?;

        let path = self.crl_path(crl);
        if read_if_exists(&path)?.is_some_and(|existing| existing == crl.raw()) {
            fs::remove_file(&path)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Stores the private key of `certificate` as `keys/<THUMBPRINT>.pvk`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NoPrivateKey`] if `key` holds no private material
    /// - [`crate::Error::InvalidParameters`] if `key` does not match the certificate
    /// - [`crate::Error::BusyOrLocked`] if another writer holds the store lock
    /// - [`crate::Error::FileError`] on I/O failure
    pub fn import_private_key(&self, certificate: &Certificate, key: &AsymmetricKey) -> Result<()> {
        if !key.has_private_key() {
            return Err(NoPrivateKey);
        }
        if !same_public_key(certificate.public_key()?, key)? {
            return Err(InvalidParameters(
                "private key does not belong to the certificate".to_string(),
            ));
        }

        let pvk = KeyBlob::new(key.clone()).to_pvk()?;

        let _lock = self.lock()?;
        let path = self.key_path(certificate);
        fs::create_dir_all(self.path.join(KEYS_DIR))?;
        fs::write(&path, pvk)?;
        debug!(path = %path.display(), "imported private key");
        Ok(())
    }

    /// Loads the private key stored for `certificate`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] on I/O failure and the errors of
    /// [`KeyBlob::from_pvk`] for a corrupt key file.
    pub fn private_key(&self, certificate: &Certificate) -> Result<Option<AsymmetricKey>> {
        match read_if_exists(&self.key_path(certificate))? {
            Some(pvk) => Ok(Some(KeyBlob::from_pvk(&pvk)?.key)),
            None => Ok(None),
        }
    }

    fn load<T, F>(&self, extension: &str, decode: F) -> Result<Vec<Arc<T>>>
    where
        T: Send + Sync,
        F: Fn(&Path) -> Result<T> + Sync,
    {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .par_iter()
            .filter_map(|path| match decode(path) {
                Ok(item) => Some(Arc::new(item)),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable store entry");
                    None
                }
            })
            .collect())
    }

    fn lock(&self) -> Result<StoreLock> {
        fs::create_dir_all(&self.path)?;

        let path = self.path.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(StoreLock { path }),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                Err(BusyOrLocked(self.path.clone()))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn certificate_paths(&self, certificate: &Certificate) -> Vec<PathBuf> {
        let thumbprint = format!(
            "tbp-{}.{CERTIFICATE_EXTENSION}",
            hex::encode_upper(certificate.thumbprint())
        );

        let mut names = Vec::with_capacity(3);
        if let Some(ski) = certificate.subject_key_identifier() {
            let ski = hex::encode_upper(ski);
            names.push(format!("ski-{ski}.{CERTIFICATE_EXTENSION}"));
            names.push(format!(
                "ski-{ski}-{}.{CERTIFICATE_EXTENSION}",
                certificate.serial_hex()
            ));
        }
        names.push(thumbprint);

        names.into_iter().map(|name| self.path.join(name)).collect()
    }

    fn crl_path(&self, crl: &Crl) -> PathBuf {
        let name = match crl.authority_key_identifier() {
            Some(aki) => format!("ski-{}.{CRL_EXTENSION}", hex::encode_upper(aki)),
            None => format!(
                "tbp-{}.{CRL_EXTENSION}",
                hex::encode_upper(crl.thumbprint())
            ),
        };
        self.path.join(name)
    }

    fn key_path(&self, certificate: &Certificate) -> PathBuf {
        self.path.join(KEYS_DIR).join(format!(
            "{}.{KEY_EXTENSION}",
            hex::encode_upper(certificate.thumbprint())
        ))
    }
}

/// Exclusive write access to a store, released on drop.
struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %error, "failed to release store lock");
        }
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error.into()),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
        _ => Ok(()),
    }
}

fn same_public_key(a: &AsymmetricKey, b: &AsymmetricKey) -> Result<bool> {
    Ok(match (a, b) {
        (AsymmetricKey::Rsa(a), AsymmetricKey::Rsa(b)) => {
            let (a, b) = (a.export_parameters(false)?, b.export_parameters(false)?);
            a.modulus == b.modulus && a.exponent == b.exponent
        }
        (AsymmetricKey::Dsa(a), AsymmetricKey::Dsa(b)) => {
            let (a, b) = (a.export_parameters(false)?, b.export_parameters(false)?);
            a.p == b.p && a.q == b.q && a.g == b.g && a.y == b.y
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test::sample, Error};

    fn load(name: &str) -> Certificate {
        Certificate::from_file(&sample(name)).unwrap()
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path().join("absent"));
        assert!(store.certificates().unwrap().is_empty());
        assert!(store.crls().unwrap().is_empty());
    }

    #[test]
    fn naming() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());

        let root = load("root_rsa.cer");
        let noski = load("noski_rsa.cer");
        assert!(store.import(&root).unwrap());
        assert!(store.import(&noski).unwrap());

        assert!(dir
            .path()
            .join("ski-A64D20840EF8765A8C9B067BCDBAEDDEAB2A3BDF.cer")
            .is_file());
        assert!(dir
            .path()
            .join("tbp-9D0FD1CF463D0F67AFDD5E8824AAC98622C84073.cer")
            .is_file());
        assert!(!dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn import_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        let root = load("root_rsa.cer");

        assert!(store.import(&root).unwrap());
        assert!(!store.import(&root).unwrap());
        assert_eq!(store.certificates().unwrap().len(), 1);
    }

    #[test]
    fn ski_collision_appends_serial() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        let leaf = load("leaf_rsa.cer");
        let sha256 = load("leaf_sha256.cer");

        assert!(store.import(&leaf).unwrap());
        assert!(store.import(&sha256).unwrap());
        assert!(!store.import(&sha256).unwrap());

        let collided = dir.path().join(format!(
            "ski-7EE5A6D967761E689FE6192E13BFDE2BA32569B9-{}.cer",
            sha256.serial_hex()
        ));
        assert!(collided.is_file());
        assert_eq!(store.certificates().unwrap().len(), 2);

        assert!(store.remove(&sha256).unwrap());
        assert!(!collided.exists());
        assert_eq!(store.certificates().unwrap().len(), 1);
    }

    #[test]
    fn lock_contention() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        fs::write(dir.path().join(LOCK_FILE), b"").unwrap();

        match store.import(&load("root_rsa.cer")) {
            Err(Error::BusyOrLocked(path)) => assert_eq!(path, dir.path()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn newer_crl_replaces_older() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        let older = Crl::from_file(&sample("renewed/intermediate_2024-01.crl")).unwrap();
        let newer = Crl::from_file(&sample("renewed/intermediate_2024-06.crl")).unwrap();
        assert_eq!(older.issuer(), newer.issuer());
        assert!(older.this_update() < newer.this_update());

        let path = dir
            .path()
            .join("ski-9E2E1036B7F91C2D0D949B2B7BE6631502C23CE9.crl");

        assert!(store.import_crl(&older).unwrap());
        assert_eq!(fs::read(&path).unwrap(), older.raw());

        assert!(store.import_crl(&newer).unwrap());
        assert_eq!(fs::read(&path).unwrap(), newer.raw());

        // An older list never overwrites a newer one.
        assert!(!store.import_crl(&older).unwrap());
        assert_eq!(fs::read(&path).unwrap(), newer.raw());

        let stored = store.crls().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(*stored[0], newer);
    }

    #[test]
    fn crl_import_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        let crl = Crl::from_file(&sample("intermediate.crl")).unwrap();

        assert!(store.import_crl(&crl).unwrap());
        assert!(!store.import_crl(&crl).unwrap());
        assert!(dir
            .path()
            .join("ski-1FDB3C3C1BB17F7069AFD407BB8F9D528674561D.crl")
            .is_file());

        assert!(store.remove_crl(&crl).unwrap());
        assert!(!store.remove_crl(&crl).unwrap());
    }

    #[test]
    fn private_key_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = X509Store::open(dir.path());
        let root = load("root_rsa.cer");

        let public = root.public_key().unwrap().clone();
        assert!(matches!(
            store.import_private_key(&root, &public),
            Err(Error::NoPrivateKey)
        ));

        let blob = fs::read(sample("rsa1024_keypair.blob")).unwrap();
        let unrelated = KeyBlob::decode(&blob).unwrap().key;
        assert!(matches!(
            store.import_private_key(&root, &unrelated),
            Err(Error::InvalidParameters(_))
        ));
        assert!(store.private_key(&root).unwrap().is_none());
    }
}

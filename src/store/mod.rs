//! On-disk certificate stores.
//!
//! A store is a plain directory of DER files. Certificates are content-addressed: the file name
//! derives from the Subject Key Identifier (`ski-<HEX>.cer`) or, without one, from the SHA-1
//! thumbprint (`tbp-<HEX>.cer`), so importing the same certificate twice writes nothing. CRLs
//! follow the same scheme keyed by their Authority Key Identifier, and private keys live in a
//! `keys/` sub-directory as PVK files named after the certificate thumbprint.
//!
//! ```text
//! <user root>/                 <machine root>/
//!   My/                          CA/
//!     ski-7EE5….cer                tbp-9D0F….cer
//!     keys/B54D….pvk               ski-1FDB….crl
//!   Trust/                       Trust/
//!     ski-A64D….cer                ...
//! ```
//!
//! Reads decode files in parallel and skip entries that fail to decode, logging a warning.
//! Writes take an exclusive `.lock` file; a concurrent writer gets
//! [`crate::Error::BusyOrLocked`] instead of waiting.
//!
//! # Key Components
//!
//! - [`X509Store`] - One store directory
//! - [`X509Stores`] / [`StoreName`] - The well-known stores of a location, or both merged
//! - [`StoreConfig`] / [`StoreLocation`] - User and machine root directories
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::store::{StoreConfig, X509Stores};
//! use certscope::x509::ChainBuilder;
//!
//! let stores = X509Stores::merged(&StoreConfig::from_env());
//! println!("{} trusted roots", stores.trusted_roots()?.len());
//!
//! let builder = ChainBuilder::from_stores(&stores)?;
//! # Ok::<(), certscope::Error>(())
//! ```

mod config;
mod directory;
mod stores;

pub use config::{StoreConfig, StoreLocation, MACHINE_STORE_ENV, USER_STORE_ENV};
pub use directory::X509Store;
pub use stores::{StoreName, X509Stores};

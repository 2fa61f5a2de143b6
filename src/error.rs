use std::path::PathBuf;

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every fallible operation in the crate - key generation and import, cipher transforms,
/// certificate and CRL decoding, and store access - reports failures through this enum.
/// Each variant carries enough context to decide how to react to the failure.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::CertificateFormat`] - A certificate or CRL could not be decoded; wraps the cause
/// - [`Error::Malformed`] - Structurally invalid DER or key blob
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the input
/// - [`Error::Empty`] - Empty input provided
///
/// ## Cryptographic Errors
/// - [`Error::UnsupportedAlgorithm`] - OID or algorithm name not in the registry
/// - [`Error::InvalidParameters`] - Missing or inconsistent key / cipher parameters
/// - [`Error::InvalidKeySize`] - Requested key size outside the legal range
/// - [`Error::NoPrivateKey`] - Private operation on a public-only key
/// - [`Error::KeyUnavailable`] - Private export requested but the material is incomplete
/// - [`Error::InvalidLength`] - Hash, signature or cipher input of the wrong length
/// - [`Error::InvalidPadding`] - Padding trailer failed verification on decrypt
/// - [`Error::NotSupported`] - Feature intentionally not implemented (e.g. CTS mode)
///
/// ## Store and I/O Errors
/// - [`Error::BusyOrLocked`] - Another writer holds the store lock
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust,no_run
/// use certscope::{Error, x509::Certificate};
/// use std::path::Path;
///
/// match Certificate::from_file(Path::new("server.cer")) {
///     Ok(cert) => println!("Subject: {}", cert.subject()),
///     Err(Error::CertificateFormat(cause)) => eprintln!("Not a certificate: {}", cause),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Decoding Errors
    /// The input is not a well-formed certificate (or CRL).
    ///
    /// Decoding aborts on the first structural problem. The underlying cause, usually a
    /// [`Error::Malformed`] or [`Error::OutOfBounds`], is kept as the source.
    #[error("Invalid certificate encoding - {0}")]
    CertificateFormat(#[source] Box<Error>),

    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the data.
    ///
    /// This error occurs when a length field points past the end of the buffer or a
    /// fixed-size read runs off the end of the input.
    #[error("Out of bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    // Cryptographic Errors
    /// The algorithm identifier is not known to the algorithm registry.
    #[error("Unsupported algorithm - {0}")]
    UnsupportedAlgorithm(String),

    /// Key or cipher parameters are missing or inconsistent.
    #[error("Invalid parameters - {0}")]
    InvalidParameters(String),

    /// The requested key size is not one of the legal sizes for the algorithm.
    #[error("Invalid key size - {0} bits")]
    InvalidKeySize(usize),

    /// A private-key operation was attempted on a key that only holds public material.
    #[error("No private key available for this operation")]
    NoPrivateKey,

    /// Exporting private parameters was requested but the key does not hold the
    /// complete private material.
    #[error("Private key material is unavailable for export")]
    KeyUnavailable,

    /// An input had the wrong length for the requested operation.
    ///
    /// # Fields
    ///
    /// * `expected` - Length the operation required
    /// * `actual` - Length that was provided
    #[error("Invalid length - expected {expected}, got {actual}")]
    InvalidLength {
        /// The length the operation required
        expected: usize,
        /// The length that was provided
        actual: usize,
    },

    /// The padding trailer of a decrypted message is invalid.
    #[error("Invalid padding")]
    InvalidPadding,

    /// The requested feature is not supported.
    #[error("Not supported - {0}")]
    NotSupported(&'static str),

    // Store and I/O Errors
    /// The store is locked by another writer. The operation is not retried.
    #[error("Store is busy or locked - {}", .0.display())]
    BusyOrLocked(PathBuf),

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or filesystem errors.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Other errors that don't fit specific categories.
    #[error("{0}")]
    Error(String),
}

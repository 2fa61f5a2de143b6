use std::fmt;

use num_bigint_dig::BigUint;
use zeroize::Zeroize;

/// A private big-integer scalar that is wiped when dropped.
///
/// Holds RSA private exponents and CRT values and the DSA private key `x`. The value never
/// appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretScalar(BigUint);

impl SecretScalar {
    /// Wraps a private value.
    #[must_use]
    pub fn new(value: BigUint) -> Self {
        SecretScalar(value)
    }

    /// Borrows the private value for arithmetic.
    #[must_use]
    pub fn expose(&self) -> &BigUint {
        &self.0
    }
}

impl Drop for SecretScalar {
    fn drop(&mut self) {
        self.0.zeroize();
        #[cfg(test)]
        tests::WIPED.with(|wiped| wiped.set(wiped.get() + 1));
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar([REDACTED])")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::crypto::asymmetric::{DsaKey, RsaKey};

    thread_local! {
        /// Number of scalars wiped on this thread.
        pub(crate) static WIPED: Cell<usize> = const { Cell::new(0) };
    }

    fn wiped() -> usize {
        WIPED.with(Cell::get)
    }

    #[test]
    fn debug_is_redacted() {
        let secret = SecretScalar::new(BigUint::from(0xDEAD_BEEF_u32));
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("3735928559"));
        assert!(!rendered.to_lowercase().contains("deadbeef"));
    }

    #[test]
    fn zeroize_clears_limbs() {
        let mut value = BigUint::from(0x0123_4567_89AB_CDEF_u64) << 70;
        value.zeroize();
        // the limbs are wiped in place; the length is not normalised
        assert!(value.to_bytes_be().iter().all(|&byte| byte == 0));
    }

    #[test]
    fn drop_wipes() {
        let before = wiped();
        drop(SecretScalar::new(BigUint::from(7_u32)));
        assert_eq!(wiped(), before + 1);
    }

    #[test]
    fn dropping_keys_wipes_private_scalars() {
        // d plus the five CRT values
        let rsa = RsaKey::generate(512).unwrap();
        let before = wiped();
        drop(rsa);
        assert_eq!(wiped(), before + 6);

        let dsa = DsaKey::generate(512).unwrap();
        let before = wiped();
        drop(dsa);
        assert_eq!(wiped(), before + 1);
    }
}

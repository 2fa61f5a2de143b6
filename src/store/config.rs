use std::{
    env,
    path::{Path, PathBuf},
};

use strum::{Display, EnumIter, EnumString};

/// Environment variable overriding the user store root
pub const USER_STORE_ENV: &str = "CERTSCOPE_USER_STORE";
/// Environment variable overriding the machine store root
pub const MACHINE_STORE_ENV: &str = "CERTSCOPE_MACHINE_STORE";

const MACHINE_STORE_DEFAULT: &str = "/usr/share/certscope/certs";

/// Scope a store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
pub enum StoreLocation {
    /// Stores of the current user
    CurrentUser,
    /// Stores shared by every user of the machine
    LocalMachine,
}

/// Root directories of the user and machine store scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root of the [`StoreLocation::CurrentUser`] stores
    pub user_root: PathBuf,
    /// Root of the [`StoreLocation::LocalMachine`] stores
    pub machine_root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl StoreConfig {
    /// Explicit roots.
    #[must_use]
    pub fn new(user_root: impl Into<PathBuf>, machine_root: impl Into<PathBuf>) -> Self {
        Self {
            user_root: user_root.into(),
            machine_root: machine_root.into(),
        }
    }

    /// Roots from [`USER_STORE_ENV`] and [`MACHINE_STORE_ENV`].
    ///
    /// Without overrides the user root is `$HOME/.config/certscope/certs` and the machine root
    /// `/usr/share/certscope/certs`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::resolve(
            env::var_os(USER_STORE_ENV).map(PathBuf::from),
            env::var_os(MACHINE_STORE_ENV).map(PathBuf::from),
            env::var_os("HOME").map(PathBuf::from),
        )
    }

    fn resolve(user: Option<PathBuf>, machine: Option<PathBuf>, home: Option<PathBuf>) -> Self {
        let user_root = user.unwrap_or_else(|| {
            home.unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join("certscope")
                .join("certs")
        });
        let machine_root = machine.unwrap_or_else(|| PathBuf::from(MACHINE_STORE_DEFAULT));
        Self {
            user_root,
            machine_root,
        }
    }

    /// Root directory of `location`.
    #[must_use]
    pub fn root(&self, location: StoreLocation) -> &Path {
        match location {
            StoreLocation::CurrentUser => &self.user_root,
            StoreLocation::LocalMachine => &self.machine_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_overrides() {
        let config = StoreConfig::resolve(None, None, Some(PathBuf::from("/home/alice")));
        assert_eq!(
            config.user_root,
            PathBuf::from("/home/alice/.config/certscope/certs")
        );
        assert_eq!(config.machine_root, PathBuf::from(MACHINE_STORE_DEFAULT));
    }

    #[test]
    fn overrides_win() {
        let config = StoreConfig::resolve(
            Some(PathBuf::from("/tmp/user")),
            Some(PathBuf::from("/tmp/machine")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(config.root(StoreLocation::CurrentUser), Path::new("/tmp/user"));
        assert_eq!(
            config.root(StoreLocation::LocalMachine),
            Path::new("/tmp/machine")
        );
    }
}

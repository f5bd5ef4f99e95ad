//! Keychain-Backed Secrets
//!
//! Stores per-profile passwords in the system keychain via the `keyring`
//! crate. Entries are keyed by profile name; the local username is folded
//! into the account so the entry identity stays stable on macOS.

use keyring::Entry;

/// Service under which every entry is filed.
const SERVICE_NAME: &str = "hostlink";

#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    #[error("keychain backend: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("no stored secret for profile '{0}'")]
    NotFound(String),

    #[error("stored secret for '{0}' did not read back intact")]
    VerifyFailed(String),
}

/// Keychain manager for per-profile credentials
pub struct Keychain {
    service: String,
}

impl Keychain {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    /// Use a different service name, for tests.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, profile_name: &str) -> Result<Entry, KeychainError> {
        let username = whoami::username();
        Ok(Entry::new(
            &self.service,
            &format!("{}@{}", username, profile_name),
        )?)
    }

    /// Store a secret for a profile, verifying the write by reading it back.
    pub fn store(&self, profile_name: &str, secret: &str) -> Result<(), KeychainError> {
        let entry = self.entry(profile_name)?;
        entry.set_password(secret)?;
        match entry.get_password() {
            Ok(read_back) if read_back == secret => Ok(()),
            Ok(_) => {
                tracing::error!("keychain read-back mismatch for '{}'", profile_name);
                Err(KeychainError::VerifyFailed(profile_name.to_string()))
            }
            Err(e) => {
                tracing::error!("keychain read-back failed for '{}': {:?}", profile_name, e);
                Err(KeychainError::Keyring(e))
            }
        }
    }

    /// Retrieve the secret stored for a profile.
    pub fn get(&self, profile_name: &str) -> Result<String, KeychainError> {
        let entry = self.entry(profile_name)?;
        match entry.get_password() {
            Ok(secret) => Ok(secret),
            Err(keyring::Error::NoEntry) => {
                Err(KeychainError::NotFound(profile_name.to_string()))
            }
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }

    /// Delete a profile's secret. Deleting an absent entry is a no-op.
    pub fn delete(&self, profile_name: &str) -> Result<(), KeychainError> {
        let entry = self.entry(profile_name)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }

    pub fn exists(&self, profile_name: &str) -> Result<bool, KeychainError> {
        let entry = self.entry(profile_name)?;
        match entry.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(KeychainError::Keyring(e)),
        }
    }
}

impl Default for Keychain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "talks to the real system keychain"]
    fn store_get_delete_cycle() {
        let keychain = Keychain::with_service("hostlink-test");

        keychain.store("unit-test-profile", "s3cret").unwrap();
        assert_eq!(keychain.get("unit-test-profile").unwrap(), "s3cret");
        assert!(keychain.exists("unit-test-profile").unwrap());

        keychain.store("unit-test-profile", "rotated").unwrap();
        assert_eq!(keychain.get("unit-test-profile").unwrap(), "rotated");

        keychain.delete("unit-test-profile").unwrap();
        assert!(!keychain.exists("unit-test-profile").unwrap());
        // Deleting again stays a no-op.
        keychain.delete("unit-test-profile").unwrap();
    }
}

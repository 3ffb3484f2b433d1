//! Passwords kept in the system keyring.
//!
//! Uses the platform's native credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailsift";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

fn credential_key(account: &str) -> String {
    format!("imap_{account}")
}

/// Stores an account's IMAP password.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_imap_password(account: &str, password: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(account))?;
    entry.set_password(password)?;
    debug!(account, "stored IMAP password");
    Ok(())
}

/// Looks up an account's IMAP password; `None` if no entry exists.
///
/// # Errors
///
/// Returns an error if the keyring cannot be accessed.
pub fn imap_password(account: &str) -> CredentialResult<Option<String>> {
    let entry = Entry::new(SERVICE_NAME, &credential_key(account))?;
    match entry.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!(account, "no IMAP password in keyring");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_account() {
        assert_eq!(credential_key("work"), "imap_work");
        assert_ne!(credential_key("work"), credential_key("home"));
    }
}

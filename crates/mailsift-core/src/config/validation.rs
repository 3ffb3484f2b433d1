//! Account validation.

use super::account::AccountConfig;

/// A problem with one account's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `host` is blank.
    EmptyHost,
    /// `port` is zero.
    InvalidPort,
    /// `username` is blank.
    EmptyUsername,
    /// `password` is present but empty.
    EmptyPassword,
    /// `inbox` is blank.
    EmptyInbox,
}

impl ValidationError {
    /// Human-readable description.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "IMAP server is required",
            Self::InvalidPort => "IMAP port must be 1-65535",
            Self::EmptyUsername => "IMAP username is required",
            Self::EmptyPassword => "IMAP password must not be empty",
            Self::EmptyInbox => "inbox folder name must not be empty",
        }
    }

    /// Configuration key at fault.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptyPassword => "password",
            Self::EmptyInbox => "inbox",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.field())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account: every problem found, not just the first.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Checks an account's settings.
///
/// # Errors
///
/// Returns all validation errors found.
pub fn validate_account(account: &AccountConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if account.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if account.port == Some(0) {
        errors.push(ValidationError::InvalidPort);
    }
    if account.username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if account.password.as_deref() == Some("") {
        errors.push(ValidationError::EmptyPassword);
    }
    if account.inbox.trim().is_empty() {
        errors.push(ValidationError::EmptyInbox);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

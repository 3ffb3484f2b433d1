//! Per-account settings.

use std::path::PathBuf;

use serde::Deserialize;

use super::{expand_home, one_or_many};

/// Transport security for the IMAP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plaintext TCP (port 143). Only sensible for local servers.
    None,
    /// Implicit TLS (port 993).
    #[default]
    Tls,
    /// STARTTLS upgrade on port 143. Accepted in configuration but not
    /// supported by the connector.
    #[serde(rename = "starttls")]
    StartTls,
}

impl Security {
    /// Conventional port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Tls => 993,
            Self::None | Self::StartTls => 143,
        }
    }
}

/// One `[accounts.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountConfig {
    /// IMAP server host name.
    pub host: String,
    /// Server port; defaults from `security`.
    #[serde(default)]
    pub port: Option<u16>,
    /// Transport security.
    #[serde(default)]
    pub security: Security,
    /// Login name.
    pub username: String,
    /// Password. When absent it is looked up in the system keyring.
    #[serde(default)]
    pub password: Option<String>,
    /// Folder rules are evaluated against.
    #[serde(default = "default_inbox")]
    pub inbox: String,
    /// Rule files, in evaluation order.
    #[serde(default, deserialize_with = "one_or_many")]
    pub rules: Vec<String>,
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

impl AccountConfig {
    /// Effective port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Rule file paths with `~` expanded.
    #[must_use]
    pub fn rule_files(&self) -> Vec<PathBuf> {
        self.rules.iter().map(|path| expand_home(path)).collect()
    }
}

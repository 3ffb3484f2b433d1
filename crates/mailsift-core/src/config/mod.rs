//! Configuration file.
//!
//! ```toml
//! [accounts.work]
//! host = "imap.example.com"
//! username = "me@example.com"
//! password = "secret"          # optional, falls back to the keyring
//! rules = "~/.config/mailsift/work-rules.toml"
//! ```

mod account;
pub mod credentials;
mod validation;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use tracing::debug;

pub use account::{AccountConfig, Security};
pub use validation::{ValidationError, ValidationResult, validate_account};

use crate::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MAILSIFT_CONFIG";

/// Account selector meaning every configured account.
pub const ALL_ACCOUNTS: &str = "all";

/// Parsed configuration: a set of named accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    accounts: BTreeMap<String, AccountConfig>,
}

impl Config {
    /// `$MAILSIFT_CONFIG` if set, else `<config dir>/mailsift/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("mailsift").join("config.toml"))
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// names the same account twice with different case.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text).map_err(|e| match e {
            Error::Toml { source, .. } => Error::Toml {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(path = %path.display(), accounts = config.accounts.len(), "loaded configuration");
        Ok(config)
    }

    /// Parses configuration text. Account names are lower-cased.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid TOML or case-insensitive duplicates.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Self = toml::from_str(text).map_err(|source| Error::Toml {
            path: PathBuf::from("<config>"),
            source,
        })?;
        let mut accounts = BTreeMap::new();
        for (name, account) in raw.accounts {
            let key = name.to_lowercase();
            if accounts.insert(key, account).is_some() {
                return Err(Error::Config(format!("account {name} is defined twice")));
            }
        }
        Ok(Self { accounts })
    }

    /// Looks up an account by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAccount`] if it is not configured.
    pub fn account(&self, name: &str) -> Result<&AccountConfig> {
        self.accounts
            .get(&name.to_lowercase())
            .ok_or_else(|| Error::UnknownAccount(name.to_string()))
    }

    /// Configured account names, sorted.
    pub fn account_names(&self) -> impl Iterator<Item = &str> {
        self.accounts.keys().map(String::as_str)
    }

    /// Expands an account selector: [`ALL_ACCOUNTS`] or a single name.
    /// Unknown names are returned as-is so they fail individually later.
    #[must_use]
    pub fn select(&self, selector: &str) -> Vec<String> {
        if selector.eq_ignore_ascii_case(ALL_ACCOUNTS) {
            self.account_names().map(str::to_string).collect()
        } else {
            vec![selector.to_lowercase()]
        }
    }
}

/// A value that may be written either alone or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Deserializes either a single value or a list of values.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    OneOrMany::deserialize(deserializer).map(OneOrMany::into_vec)
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) => rest.strip_prefix('/'),
        None => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[accounts.Work]
host = "imap.work.example"
username = "me@work.example"
password = "pw"
rules = ["~/rules/work.toml"]

[accounts.home]
host = "imap.home.example"
username = "me"
security = "none"
"#;

    #[test]
    fn account_names_are_case_insensitive() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.account_names().collect::<Vec<_>>(), ["home", "work"]);
        assert_eq!(config.account("WORK").unwrap().host, "imap.work.example");
    }

    #[test]
    fn unknown_account_is_an_error() {
        let config = Config::parse(SAMPLE).unwrap();
        assert!(matches!(config.account("school"), Err(Error::UnknownAccount(_))));
    }

    #[test]
    fn selector_all_expands_to_every_account() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.select("all"), vec!["home", "work"]);
        assert_eq!(config.select("Home"), vec!["home"]);
    }

    #[test]
    fn duplicate_names_differing_in_case_are_rejected() {
        let text = "[accounts.a]\nhost = \"h\"\nusername = \"u\"\n[accounts.A]\nhost = \"h\"\nusername = \"u\"\n";
        assert!(matches!(Config::parse(text), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_toml_is_reported() {
        assert!(matches!(Config::parse("[accounts.a\n"), Err(Error::Toml { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load(Path::new("/nonexistent/mailsift.toml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn empty_file_has_no_accounts() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.account_names().count(), 0);
    }

    #[test]
    fn home_expansion() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        assert_eq!(expand_home("~user/x"), PathBuf::from("~user/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/rules.toml"), home.join("rules.toml"));
            assert_eq!(expand_home("~"), home);
        }
    }
}

//! Rule files and their evaluation.
//!
//! A rule file is TOML with an ordered `[[rule]]` array:
//!
//! ```toml
//! [[rule]]
//! name = "newsletters"
//! senders = ["news@shop.example", "@@"]
//! merge = "or"
//! move = "Newsletters"
//!
//! [[rule]]
//! subject = "You have won"
//! delete = true
//! ```
//!
//! Search keys are the ones [`SpecRecord`] understands; unknown keys are
//! ignored.

mod interpreter;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

pub use interpreter::{
    ActionReport, Outcome, PACING_DELAY, RuleReport, run_rules, run_rules_with_folders,
};

use crate::search::{MergeMode, SearchSpec, SpecRecord};
use crate::{Error, Result};

/// Something a rule does with its matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Move to the named folder, creating it if needed.
    Move(String),
    /// Flag deleted and expunge.
    Delete,
}

/// A search specification with the actions to apply to its matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Name used in reports.
    pub name: String,
    /// What to match.
    pub spec: SearchSpec,
    /// How predicate results combine.
    pub merge: MergeMode,
    /// Actions, moves first.
    pub actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<RuleRecord>,
}

#[derive(Debug, Deserialize)]
struct RuleRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    merge: Option<MergeMode>,
    #[serde(default, rename = "move")]
    move_to: Option<String>,
    #[serde(default)]
    delete: bool,
    #[serde(flatten)]
    spec: SpecRecord,
}

impl RuleRecord {
    fn into_rule(self, default_name: String) -> Result<Rule> {
        let name = self.name.unwrap_or(default_name);
        let spec = SearchSpec::from_record(&self.spec).map_err(|e| match e {
            Error::InvalidSpecification(message) => {
                Error::InvalidSpecification(format!("rule {name}: {message}"))
            }
            other => other,
        })?;

        let mut actions = Vec::new();
        if let Some(folder) = self.move_to {
            if folder.trim().is_empty() {
                return Err(Error::Config(format!("rule {name}: empty move destination")));
            }
            actions.push(Action::Move(folder));
        }
        if self.delete {
            actions.push(Action::Delete);
        }
        if actions.is_empty() {
            return Err(Error::Config(format!("rule {name} has no action")));
        }

        Ok(Rule {
            name,
            spec,
            merge: self.merge.unwrap_or(MergeMode::And),
            actions,
        })
    }
}

/// Parses the rules in one file's contents. `source` names the file in
/// default rule names and errors.
///
/// # Errors
///
/// Returns [`Error::Toml`] for malformed TOML, [`Error::Config`] for rules
/// without actions and [`Error::InvalidSpecification`] for bad predicate
/// values.
pub fn parse_rules(text: &str, source: &Path) -> Result<Vec<Rule>> {
    let file: RuleFile = toml::from_str(text).map_err(|e| Error::Toml {
        path: source.to_path_buf(),
        source: e,
    })?;
    let stem = source
        .file_stem()
        .map_or_else(|| "rules".into(), |s| s.to_string_lossy());

    file.rule
        .into_iter()
        .enumerate()
        .map(|(i, record)| record.into_rule(format!("{stem}#{}", i + 1)))
        .collect()
}

/// Loads rules from each file in order. No files means no rules.
///
/// # Errors
///
/// Returns [`Error::Io`] if a file cannot be read, and the errors of
/// [`parse_rules`].
pub fn load_rules(paths: &[PathBuf]) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Io {
            path: path.clone(),
            source: e,
        })?;
        let parsed = parse_rules(&text, path)?;
        debug!(path = %path.display(), rules = parsed.len(), "loaded rule file");
        rules.extend(parsed);
    }
    Ok(rules)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::search::{PostFilter, Predicate};

    fn parse(text: &str) -> Result<Vec<Rule>> {
        parse_rules(text, Path::new("/home/me/.config/mailsift/spam.toml"))
    }

    #[test]
    fn rules_keep_file_order_and_defaults() {
        let rules = parse(
            r#"
[[rule]]
senders = "spam@bad.com"
move = "Junk"

[[rule]]
name = "old newsletters"
subject = "newsletter"
before = "2023-01-01"
merge = "or"
delete = true
"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "spam#1");
        assert_eq!(rules[0].merge, MergeMode::And);
        assert_eq!(rules[0].actions, [Action::Move("Junk".to_string())]);
        assert_eq!(
            rules[0].spec.predicates(),
            &[Predicate::Senders(vec!["spam@bad.com".to_string()])]
        );

        assert_eq!(rules[1].name, "old newsletters");
        assert_eq!(rules[1].merge, MergeMode::Or);
        assert_eq!(rules[1].actions, [Action::Delete]);
        assert_eq!(rules[1].spec.predicates().len(), 2);
    }

    #[test]
    fn move_comes_before_delete() {
        let rules = parse("[[rule]]\ndelete = true\nmove = \"Archive\"\nno_attachments = true\n")
            .unwrap();
        assert_eq!(
            rules[0].actions,
            [Action::Move("Archive".to_string()), Action::Delete]
        );
        assert_eq!(rules[0].spec.post_filters(), &[PostFilter::NoAttachments]);
    }

    #[test]
    fn rule_without_action_is_a_configuration_error() {
        let err = parse("[[rule]]\nsubject = \"x\"\ndelete = false\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn bad_values_name_the_rule() {
        let err = parse("[[rule]]\nname = \"dates\"\ndate = [\"2024-01-01\"]\ndelete = true\n")
            .unwrap_err();
        match err {
            Error::InvalidSpecification(message) => assert!(message.contains("dates")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_toml_names_the_file() {
        let err = parse("[[rule]\n").unwrap_err();
        match err {
            Error::Toml { path, .. } => assert!(path.ends_with("spam.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_file_has_no_rules() {
        assert!(parse("").unwrap().is_empty());
        assert!(load_rules(&[]).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_rules(&[PathBuf::from("/nonexistent/mailsift/rules.toml")]).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

//! Command-line arguments.

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use clap::{Parser, ValueEnum};
use mailsift_core::config::ALL_ACCOUNTS;
use mailsift_core::search::{DateRange, parse_date};
use mailsift_core::{Error, MergeMode, PostFilter, Predicate, SearchSpec};

/// Search, list and sort IMAP mail.
///
/// Without a mode flag, lists the messages matching the search flags. Search
/// flags are combined with --merge.
#[derive(Debug, Parser)]
#[command(version, max_term_width = 100)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Account to use, or `all`.
    #[arg(short, long, default_value = ALL_ACCOUNTS)]
    pub account: String,

    /// Folder to search, or `*` for every folder.
    #[arg(short, long, default_value = "INBOX")]
    pub mailbox: String,

    /// List folders instead of messages.
    #[arg(short = 'l', long)]
    pub folders: bool,

    /// Print each sender once with its message count.
    #[arg(long)]
    pub unique: bool,

    /// Only unread messages.
    #[arg(short, long)]
    pub unread: bool,

    /// Show sender names instead of addresses.
    #[arg(short, long)]
    pub name: bool,

    /// Received in YYYY, YYYY-MM or YYYY-MM-DD, or between two dates.
    #[arg(short = 'y', long, num_args = 1..=2, value_name = "DATE")]
    pub date: Vec<String>,

    /// Received in the last N days.
    #[arg(short, long, value_name = "N")]
    pub days: Option<u64>,

    /// Sender address; repeat for several. `@@` matches bulk senders.
    #[arg(short, long, value_name = "ADDRESS")]
    pub from: Vec<String>,

    /// Exclude a sender address; repeat for several.
    #[arg(long, value_name = "ADDRESS")]
    pub not_from: Vec<String>,

    /// Recipient address; repeat for several.
    #[arg(long, value_name = "ADDRESS")]
    pub to: Vec<String>,

    /// Subject contains TEXT.
    #[arg(short, long, value_name = "TEXT")]
    pub subject: Option<String>,

    /// Subject does not contain TEXT.
    #[arg(long, value_name = "TEXT")]
    pub not_subject: Option<String>,

    /// Only messages with attachments.
    #[arg(long, conflicts_with = "no_attachments")]
    pub attachments: bool,

    /// Only messages without attachments.
    #[arg(long)]
    pub no_attachments: bool,

    /// Only messages not yet answered.
    #[arg(long)]
    pub not_replied: bool,

    /// How search flags combine.
    #[arg(long, value_enum, default_value_t = Merge::Or)]
    pub merge: Merge,

    /// Run the account's rule files instead of listing.
    #[arg(short, long, conflicts_with_all = ["folders", "unique"])]
    pub rules: bool,

    /// With --rules, report what would happen without changing anything.
    #[arg(short = 'x', long, requires = "rules")]
    pub dry_run: bool,

    /// Store the account's password in the system keyring, read from stdin.
    #[arg(long, conflicts_with_all = ["rules", "folders", "unique"])]
    pub store_password: bool,

    /// Configuration file.
    #[arg(short, long, env = "MAILSIFT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// `--merge` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Merge {
    /// Every flag must match.
    And,
    /// Any flag may match.
    Or,
}

impl From<Merge> for MergeMode {
    fn from(merge: Merge) -> Self {
        match merge {
            Merge::And => Self::And,
            Merge::Or => Self::Or,
        }
    }
}

impl Cli {
    /// Builds the search from the flags. `today` anchors `--days`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] for malformed dates.
    pub fn search_spec(&self, today: NaiveDate) -> mailsift_core::Result<SearchSpec> {
        let mut spec = SearchSpec::new().with_unread(self.unread);

        if !self.from.is_empty() {
            spec = spec.with_senders(self.from.iter().cloned())?;
        }
        if !self.not_from.is_empty() {
            spec.insert(Predicate::NotSenders(self.not_from.clone()));
        }
        if !self.to.is_empty() {
            spec.insert(Predicate::Recipients(self.to.clone()));
        }
        if let Some(days) = self.days {
            let since = today.checked_sub_days(Days::new(days)).ok_or_else(|| {
                Error::InvalidSpecification(format!("--days {days} is too far back"))
            })?;
            spec.insert(Predicate::Since(since));
        }
        match self.date.as_slice() {
            [] => {}
            [single] => spec.insert(Predicate::Date(DateRange::parse(single)?)),
            bounds => {
                let dates = bounds
                    .iter()
                    .map(|d| parse_date(d))
                    .collect::<mailsift_core::Result<Vec<_>>>()?;
                spec.insert(Predicate::Date(DateRange::from_bounds(&dates)?));
            }
        }
        if let Some(subject) = &self.subject {
            spec.insert(Predicate::Subject(subject.clone()));
        }
        if let Some(subject) = &self.not_subject {
            spec.insert(Predicate::NotSubject(subject.clone()));
        }
        if self.not_replied {
            spec.insert(Predicate::NotReplied);
        }
        if self.attachments {
            spec = spec.with_post_filter(PostFilter::Attachments);
        }
        if self.no_attachments {
            spec = spec.with_post_filter(PostFilter::NoAttachments);
        }
        Ok(spec)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mailsift").chain(args.iter().copied())).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = parse(&["-u"]);
        assert_eq!(cli.account, "all");
        assert_eq!(cli.mailbox, "INBOX");
        assert_eq!(cli.merge, Merge::Or);
        assert!(!cli.rules && !cli.dry_run);
    }

    #[test]
    fn repeated_senders_and_bulk_sentinel() {
        let cli = parse(&["-f", "a@x.com", "--from", "@@", "-f", "b@y.com"]);
        let spec = cli.search_spec(today()).unwrap();
        assert_eq!(
            spec.predicates(),
            &[
                Predicate::Senders(vec!["a@x.com".to_string(), "b@y.com".to_string()]),
                Predicate::BulkSenders,
            ]
        );
    }

    #[test]
    fn days_count_back_from_today() {
        let spec = parse(&["-d", "14"]).search_spec(today()).unwrap();
        assert_eq!(
            spec.predicates(),
            &[Predicate::Since(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())]
        );
    }

    #[test]
    fn date_accepts_a_specifier_or_two_bounds() {
        let month = parse(&["-y", "2024-02"]).search_spec(today()).unwrap();
        assert_eq!(
            month.predicates(),
            &[Predicate::Date(DateRange::parse("2024-02").unwrap())]
        );

        let pair = parse(&["--date", "2024-01-01", "2024-01-10"])
            .search_spec(today())
            .unwrap();
        let Predicate::Date(range) = &pair.predicates()[0] else {
            panic!("expected a date range");
        };
        assert_eq!(range.before(), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn bad_date_is_invalid_specification() {
        let err = parse(&["-y", "soon"]).search_spec(today()).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
    }

    #[test]
    fn dry_run_needs_rules() {
        assert!(Cli::try_parse_from(["mailsift", "-x"]).is_err());
        let cli = parse(&["-r", "-x", "-a", "work"]);
        assert!(cli.rules && cli.dry_run);
        assert_eq!(cli.account, "work");
    }

    #[test]
    fn attachment_filters_conflict() {
        assert!(Cli::try_parse_from(["mailsift", "--attachments", "--no-attachments"]).is_err());
        let spec = parse(&["--no-attachments", "--not-replied"])
            .search_spec(today())
            .unwrap();
        assert_eq!(spec.post_filters(), &[PostFilter::NoAttachments]);
        assert_eq!(spec.predicates(), &[Predicate::NotReplied]);
    }

    #[test]
    fn merge_mode_maps() {
        assert_eq!(MergeMode::from(parse(&["--merge", "and"]).merge), MergeMode::And);
    }
}

//! Predicates and search specifications.

use chrono::{Months, NaiveDate};
use serde::Deserialize;

use super::bulk::BULK_SENDER_SENTINEL;
use crate::config::OneOrMany;
use crate::{Error, Result};

/// One search condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// From matches any of the addresses.
    Senders(Vec<String>),
    /// The sender's domain looks machine-generated.
    BulkSenders,
    /// From matches none of the addresses.
    NotSenders(Vec<String>),
    /// To matches any of the addresses.
    Recipients(Vec<String>),
    /// Received on or after the date.
    Since(NaiveDate),
    /// Received strictly before the date.
    Before(NaiveDate),
    /// Received within the range.
    Date(DateRange),
    /// Subject contains the text.
    Subject(String),
    /// Subject does not contain the text.
    NotSubject(String),
    /// Not answered yet.
    NotReplied,
}

impl Predicate {
    /// Key used for this predicate in rule files.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Senders(_) => "senders",
            Self::BulkSenders => "bulk_senders",
            Self::NotSenders(_) => "not_senders",
            Self::Recipients(_) => "recipients",
            Self::Since(_) => "since",
            Self::Before(_) => "before",
            Self::Date(_) => "date",
            Self::Subject(_) => "subject",
            Self::NotSubject(_) => "not_subject",
            Self::NotReplied => "not_replied",
        }
    }

    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Filter applied after merging, on fetched structure metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// At least one attachment.
    Attachments,
    /// No attachments.
    NoAttachments,
}

impl PostFilter {
    /// Whether a message with `attachments` attachments passes.
    #[must_use]
    pub const fn keeps(self, attachments: usize) -> bool {
        match self {
            Self::Attachments => attachments > 0,
            Self::NoAttachments => attachments == 0,
        }
    }
}

/// A half-open date interval `[since, before)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    since: NaiveDate,
    before: NaiveDate,
}

impl DateRange {
    /// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD` into the year, month or day
    /// it names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] for anything else.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || {
            Error::InvalidSpecification(format!(
                "date {spec:?} is not YYYY, YYYY-MM or YYYY-MM-DD"
            ))
        };
        let parts: Vec<&str> = spec.trim().split('-').collect();
        let numbers = parts
            .iter()
            .map(|p| p.parse::<u32>().ok())
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(invalid)?;

        let (since, step) = match numbers.as_slice() {
            &[year] => (ymd(year, 1, 1), Months::new(12)),
            &[year, month] => (ymd(year, month, 1), Months::new(1)),
            &[year, month, day] => {
                let since = ymd(year, month, day).ok_or_else(invalid)?;
                let before = since.succ_opt().ok_or_else(invalid)?;
                return Ok(Self { since, before });
            }
            _ => return Err(invalid()),
        };
        let since = since.ok_or_else(invalid)?;
        let before = since.checked_add_months(step).ok_or_else(invalid)?;
        Ok(Self { since, before })
    }

    /// Builds a range from an explicit `[since, before]` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] unless exactly two dates are
    /// given.
    pub fn from_bounds(bounds: &[NaiveDate]) -> Result<Self> {
        match bounds {
            &[since, before] => Ok(Self { since, before }),
            _ => Err(Error::InvalidSpecification(format!(
                "a date range needs exactly two dates, got {}",
                bounds.len()
            ))),
        }
    }

    /// First day included.
    #[must_use]
    pub const fn since(&self) -> NaiveDate {
        self.since
    }

    /// First day excluded.
    #[must_use]
    pub const fn before(&self) -> NaiveDate {
        self.before
    }

    /// `[since, before]`, in the order the search keywords expect them.
    #[must_use]
    pub const fn bounds(&self) -> [NaiveDate; 2] {
        [self.since, self.before]
    }
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidSpecification`] if the text is not such a date.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidSpecification(format!("date {text:?} is not YYYY-MM-DD")))
}

/// An ordered collection of predicates, at most one per kind, plus the
/// unread restriction and post-filters.
///
/// With no query predicates the specification selects every message in the
/// folder, or every unseen one when `unread` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSpec {
    predicates: Vec<Predicate>,
    unread: bool,
    post_filters: Vec<PostFilter>,
}

impl SearchSpec {
    /// An empty specification: all messages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate, replacing one of the same kind in place.
    pub fn insert(&mut self, predicate: Predicate) {
        match self.predicates.iter_mut().find(|p| p.same_kind(&predicate)) {
            Some(existing) => *existing = predicate,
            None => self.predicates.push(predicate),
        }
    }

    /// Builder form of [`SearchSpec::insert`].
    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.insert(predicate);
        self
    }

    /// Adds sender addresses. A value containing the bulk-sender sentinel
    /// (`@@`) selects [`Predicate::BulkSenders`] instead of an address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] for an empty list.
    pub fn with_senders<I, S>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(Error::InvalidSpecification(
                "senders needs at least one address".to_string(),
            ));
        }
        let (bulk, addresses): (Vec<String>, Vec<String>) = values
            .into_iter()
            .partition(|value| value.contains(BULK_SENDER_SENTINEL));
        if !addresses.is_empty() {
            self.insert(Predicate::Senders(addresses));
        }
        if !bulk.is_empty() {
            self.insert(Predicate::BulkSenders);
        }
        Ok(self)
    }

    /// Restricts every query to unseen messages.
    #[must_use]
    pub const fn with_unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }

    /// Appends a post-filter; a repeated filter is not added twice.
    #[must_use]
    pub fn with_post_filter(mut self, filter: PostFilter) -> Self {
        if !self.post_filters.contains(&filter) {
            self.post_filters.push(filter);
        }
        self
    }

    /// Query predicates in evaluation order.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Whether queries are restricted to unseen messages.
    #[must_use]
    pub const fn unread(&self) -> bool {
        self.unread
    }

    /// Post-filters in application order.
    #[must_use]
    pub fn post_filters(&self) -> &[PostFilter] {
        &self.post_filters
    }

    /// True if there is nothing to evaluate besides the base set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.post_filters.is_empty()
    }

    /// Builds a specification from rule-file keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] for malformed dates, date
    /// ranges of the wrong length, or empty address lists.
    pub fn from_record(record: &SpecRecord) -> Result<Self> {
        let mut spec = Self::new().with_unread(record.unread);

        if let Some(senders) = &record.senders {
            spec = spec.with_senders(senders.clone().into_vec())?;
        }
        if let Some(values) = &record.not_senders {
            spec.insert(Predicate::NotSenders(non_empty("not_senders", values)?));
        }
        if let Some(values) = &record.recipients {
            spec.insert(Predicate::Recipients(non_empty("recipients", values)?));
        }
        if let Some(since) = &record.since {
            spec.insert(Predicate::Since(parse_date(since)?));
        }
        if let Some(before) = &record.before {
            spec.insert(Predicate::Before(parse_date(before)?));
        }
        if let Some(date) = &record.date {
            let range = match date {
                OneOrMany::One(text) => DateRange::parse(text)?,
                OneOrMany::Many(texts) => {
                    let bounds = texts
                        .iter()
                        .map(|t| parse_date(t))
                        .collect::<Result<Vec<_>>>()?;
                    DateRange::from_bounds(&bounds)?
                }
            };
            spec.insert(Predicate::Date(range));
        }
        if let Some(subject) = &record.subject {
            spec.insert(Predicate::Subject(subject.clone()));
        }
        if let Some(subject) = &record.not_subject {
            spec.insert(Predicate::NotSubject(subject.clone()));
        }
        if record.not_replied {
            spec.insert(Predicate::NotReplied);
        }
        if record.attachments {
            spec = spec.with_post_filter(PostFilter::Attachments);
        }
        if record.no_attachments {
            spec = spec.with_post_filter(PostFilter::NoAttachments);
        }
        Ok(spec)
    }
}

fn non_empty(key: &str, values: &OneOrMany<String>) -> Result<Vec<String>> {
    let values = values.clone().into_vec();
    if values.is_empty() {
        Err(Error::InvalidSpecification(format!(
            "{key} needs at least one address"
        )))
    } else {
        Ok(values)
    }
}

/// Predicate keys as written in a rule file. Unknown keys are ignored.
///
/// Dates are quoted strings (`since = "2024-01-31"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpecRecord {
    #[serde(default)]
    senders: Option<OneOrMany<String>>,
    #[serde(default)]
    not_senders: Option<OneOrMany<String>>,
    #[serde(default)]
    recipients: Option<OneOrMany<String>>,
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    date: Option<OneOrMany<String>>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    not_subject: Option<String>,
    #[serde(default)]
    unread: bool,
    #[serde(default)]
    not_replied: bool,
    #[serde(default)]
    attachments: bool,
    #[serde(default)]
    no_attachments: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(text: &str) -> SpecRecord {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn date_range_for_a_year() {
        let range = DateRange::parse("2023").unwrap();
        assert_eq!(range.bounds(), [date(2023, 1, 1), date(2024, 1, 1)]);
    }

    #[test]
    fn date_range_for_a_month_wraps_the_year() {
        let range = DateRange::parse("2023-12").unwrap();
        assert_eq!(range.bounds(), [date(2023, 12, 1), date(2024, 1, 1)]);
    }

    #[test]
    fn date_range_for_a_day() {
        let range = DateRange::parse("2024-02-29").unwrap();
        assert_eq!(range.bounds(), [date(2024, 2, 29), date(2024, 3, 1)]);
    }

    #[test]
    fn bad_date_specifiers_are_rejected() {
        for spec in ["", "20x4", "2023-13", "2023-02-30", "2023-01-01-01", "yesterday"] {
            assert!(
                matches!(DateRange::parse(spec), Err(Error::InvalidSpecification(_))),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn explicit_bounds_need_two_dates() {
        assert!(DateRange::from_bounds(&[date(2024, 1, 1), date(2024, 2, 1)]).is_ok());
        assert!(matches!(
            DateRange::from_bounds(&[date(2024, 1, 1)]),
            Err(Error::InvalidSpecification(_))
        ));
        assert!(matches!(
            DateRange::from_bounds(&[date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]),
            Err(Error::InvalidSpecification(_))
        ));
    }

    #[test]
    fn insert_replaces_same_kind_in_place() {
        let spec = SearchSpec::new()
            .with(Predicate::Subject("a".to_string()))
            .with(Predicate::NotReplied)
            .with(Predicate::Subject("b".to_string()));
        assert_eq!(
            spec.predicates(),
            &[Predicate::Subject("b".to_string()), Predicate::NotReplied]
        );
    }

    #[test]
    fn sentinel_selects_bulk_senders() {
        let spec = SearchSpec::new()
            .with_senders(["@@", "news@shop.example"])
            .unwrap();
        assert_eq!(
            spec.predicates(),
            &[
                Predicate::Senders(vec!["news@shop.example".to_string()]),
                Predicate::BulkSenders,
            ]
        );

        let only_bulk = SearchSpec::new().with_senders(["@@"]).unwrap();
        assert_eq!(only_bulk.predicates(), &[Predicate::BulkSenders]);
    }

    #[test]
    fn empty_sender_list_is_invalid() {
        let err = SearchSpec::new().with_senders(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
    }

    #[test]
    fn post_filters_are_not_duplicated() {
        let spec = SearchSpec::new()
            .with_post_filter(PostFilter::NoAttachments)
            .with_post_filter(PostFilter::NoAttachments);
        assert_eq!(spec.post_filters(), &[PostFilter::NoAttachments]);
    }

    #[test]
    fn record_with_every_key() {
        let spec = SearchSpec::from_record(&record(
            r#"
senders = "spam@bad.example"
not_senders = ["boss@work.example"]
recipients = "me@home.example"
since = "2024-01-01"
before = "2024-06-01"
date = "2024-03"
subject = "invoice"
not_subject = "paid"
unread = true
not_replied = true
attachments = true
"#,
        ))
        .unwrap();

        assert!(spec.unread());
        assert_eq!(spec.post_filters(), &[PostFilter::Attachments]);
        let names: Vec<&str> = spec.predicates().iter().map(Predicate::name).collect();
        assert_eq!(
            names,
            [
                "senders",
                "not_senders",
                "recipients",
                "since",
                "before",
                "date",
                "subject",
                "not_subject",
                "not_replied",
            ]
        );
    }

    #[test]
    fn record_unknown_keys_are_ignored() {
        let spec = SearchSpec::from_record(&record("colour = \"red\"\nsubject = \"x\"\n")).unwrap();
        assert_eq!(spec.predicates(), &[Predicate::Subject("x".to_string())]);
    }

    #[test]
    fn record_false_flags_add_nothing() {
        let spec = SearchSpec::from_record(&record(
            "unread = false\nnot_replied = false\nno_attachments = false\n",
        ))
        .unwrap();
        assert_eq!(spec, SearchSpec::new());
        assert!(spec.is_empty());
    }

    #[test]
    fn record_date_pair() {
        let spec =
            SearchSpec::from_record(&record("date = [\"2024-01-01\", \"2024-01-15\"]\n")).unwrap();
        assert_eq!(
            spec.predicates(),
            &[Predicate::Date(
                DateRange::from_bounds(&[date(2024, 1, 1), date(2024, 1, 15)]).unwrap()
            )]
        );
    }

    #[test]
    fn record_date_list_of_wrong_length_is_invalid() {
        let err = SearchSpec::from_record(&record("date = [\"2024-01-01\"]\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
    }

    #[test]
    fn record_unparsable_date_is_invalid() {
        let err = SearchSpec::from_record(&record("since = \"last week\"\n")).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
    }
}

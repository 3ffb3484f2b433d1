//! Translation of predicates into IMAP search keys.
//!
//! Each predicate becomes a [`Plan`]: either a list of queries whose results
//! are unioned, or an envelope scan for predicates the server cannot
//! evaluate.

use chrono::NaiveDate;
use mailsift_imap::SearchKey;

use super::spec::Predicate;
use crate::{Error, Result};

/// Keywords applied position by position to a date range's bounds.
const DATE_KEYWORDS: [fn(NaiveDate) -> SearchKey; 2] = [SearchKey::Since, SearchKey::Before];

/// How one predicate is evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Run every query; the predicate matches the union of their results.
    /// Keys within one query are ANDed by the server.
    Search(Vec<Vec<SearchKey>>),
    /// Fetch envelopes and test senders locally.
    EnvelopeScan,
}

impl Plan {
    fn single(keys: Vec<SearchKey>) -> Self {
        Self::Search(vec![keys])
    }
}

/// Translates one predicate.
///
/// # Errors
///
/// Returns [`Error::InvalidSpecification`] if a multi-valued predicate has
/// the wrong number of values.
pub fn translate(predicate: &Predicate) -> Result<Plan> {
    let plan = match predicate {
        Predicate::Senders(addresses) => Plan::Search(
            addresses
                .iter()
                .map(|a| vec![SearchKey::From(a.clone())])
                .collect(),
        ),
        Predicate::Recipients(addresses) => Plan::Search(
            addresses
                .iter()
                .map(|a| vec![SearchKey::To(a.clone())])
                .collect(),
        ),
        Predicate::NotSenders(addresses) => Plan::single(
            addresses
                .iter()
                .map(|a| SearchKey::not(SearchKey::From(a.clone())))
                .collect(),
        ),
        Predicate::Since(date) => Plan::single(vec![SearchKey::Since(*date)]),
        Predicate::Before(date) => Plan::single(vec![SearchKey::Before(*date)]),
        Predicate::Date(range) => Plan::single(paired(&DATE_KEYWORDS, &range.bounds())?),
        Predicate::Subject(text) => Plan::single(vec![SearchKey::Subject(text.clone())]),
        Predicate::NotSubject(text) => {
            Plan::single(vec![SearchKey::not(SearchKey::Subject(text.clone()))])
        }
        Predicate::NotReplied => Plan::single(vec![SearchKey::Unanswered]),
        Predicate::BulkSenders => Plan::EnvelopeScan,
    };
    Ok(plan)
}

/// Applies `keywords[i]` to `values[i]`.
fn paired<T: Copy>(keywords: &[fn(T) -> SearchKey], values: &[T]) -> Result<Vec<SearchKey>> {
    if keywords.len() != values.len() {
        return Err(Error::InvalidSpecification(format!(
            "expected {} values, got {}",
            keywords.len(),
            values.len()
        )));
    }
    Ok(keywords
        .iter()
        .zip(values)
        .map(|(keyword, value)| keyword(*value))
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::search::DateRange;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn senders_become_one_query_per_address() {
        let plan = translate(&Predicate::Senders(vec![
            "a@x.com".to_string(),
            "b@y.com".to_string(),
        ]))
        .unwrap();
        assert_eq!(
            plan,
            Plan::Search(vec![
                vec![SearchKey::From("a@x.com".to_string())],
                vec![SearchKey::From("b@y.com".to_string())],
            ])
        );
    }

    #[test]
    fn recipients_use_to() {
        let plan = translate(&Predicate::Recipients(vec!["me@home.example".to_string()])).unwrap();
        assert_eq!(
            plan,
            Plan::Search(vec![vec![SearchKey::To("me@home.example".to_string())]])
        );
    }

    #[test]
    fn not_senders_excludes_every_address_in_one_query() {
        let plan = translate(&Predicate::NotSenders(vec![
            "a@x.com".to_string(),
            "b@y.com".to_string(),
        ]))
        .unwrap();
        assert_eq!(
            plan,
            Plan::Search(vec![vec![
                SearchKey::not(SearchKey::From("a@x.com".to_string())),
                SearchKey::not(SearchKey::From("b@y.com".to_string())),
            ]])
        );
    }

    #[test]
    fn negated_subject_wraps_in_not() {
        let plan = translate(&Predicate::NotSubject("paid".to_string())).unwrap();
        assert_eq!(
            plan,
            Plan::Search(vec![vec![SearchKey::Not(Box::new(SearchKey::Subject(
                "paid".to_string()
            )))]])
        );
    }

    #[test]
    fn date_range_expands_to_since_and_before() {
        let range = DateRange::parse("2024-02").unwrap();
        let plan = translate(&Predicate::Date(range)).unwrap();
        assert_eq!(
            plan,
            Plan::Search(vec![vec![
                SearchKey::Since(date(2024, 2, 1)),
                SearchKey::Before(date(2024, 3, 1)),
            ]])
        );
    }

    #[test]
    fn not_replied_is_unanswered() {
        assert_eq!(
            translate(&Predicate::NotReplied).unwrap(),
            Plan::Search(vec![vec![SearchKey::Unanswered]])
        );
    }

    #[test]
    fn bulk_senders_scan_envelopes() {
        assert_eq!(translate(&Predicate::BulkSenders).unwrap(), Plan::EnvelopeScan);
    }

    #[test]
    fn pairing_rejects_length_mismatch() {
        let err = paired(&DATE_KEYWORDS, &[date(2024, 1, 1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
        let err = paired(
            &DATE_KEYWORDS,
            &[date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(_)));
    }
}

//! Message identifiers.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;

/// Unique identifier of a message within a folder.
///
/// UIDs are assigned by the server and never zero. They only stay meaningful
/// for as long as the folder's UIDVALIDITY does not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(NonZeroU32);

impl Uid {
    /// The smallest valid UID.
    pub const MIN: Self = Self(NonZeroU32::MIN);

    /// Creates a UID, returning `None` for zero.
    #[must_use]
    pub const fn new(n: u32) -> Option<Self> {
        match NonZeroU32::new(n) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-empty set of UIDs, serialized as compressed ranges (`1:3,7,9:10`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UidSet(BTreeSet<Uid>);

impl UidSet {
    /// Builds a set from any UID iterator. Returns `None` when it is empty,
    /// since IMAP has no syntax for an empty set.
    pub fn from_uids(uids: impl IntoIterator<Item = Uid>) -> Option<Self> {
        let set: BTreeSet<Uid> = uids.into_iter().collect();
        if set.is_empty() { None } else { Some(Self(set)) }
    }

    /// Number of UIDs in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates UIDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter().map(|uid| uid.get());
        let Some(first) = iter.next() else {
            return Ok(());
        };

        let (mut start, mut end) = (first, first);
        let mut first_range = true;
        let mut emit = |f: &mut fmt::Formatter<'_>, start: u32, end: u32| -> fmt::Result {
            if !first_range {
                f.write_str(",")?;
            }
            first_range = false;
            if start == end {
                write!(f, "{start}")
            } else {
                write!(f, "{start}:{end}")
            }
        };

        for n in iter {
            if n == end + 1 {
                end = n;
            } else {
                emit(f, start, end)?;
                start = n;
                end = n;
            }
        }
        emit(f, start, end)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn set(values: &[u32]) -> UidSet {
        UidSet::from_uids(values.iter().filter_map(|&n| Uid::new(n))).unwrap()
    }

    #[test]
    fn uid_rejects_zero() {
        assert!(Uid::new(0).is_none());
        assert_eq!(Uid::new(42).unwrap().get(), 42);
    }

    #[test]
    fn empty_set_is_none() {
        assert!(UidSet::from_uids(std::iter::empty()).is_none());
    }

    #[test]
    fn single_uid() {
        assert_eq!(set(&[7]).to_string(), "7");
    }

    #[test]
    fn compresses_runs() {
        assert_eq!(set(&[1, 2, 3, 7, 9, 10]).to_string(), "1:3,7,9:10");
    }

    #[test]
    fn sorts_and_dedups() {
        let uids = set(&[10, 3, 2, 3, 1]);
        assert_eq!(uids.len(), 4);
        assert_eq!(uids.to_string(), "1:3,10");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn display_expands_back_to_same_uids(values in prop::collection::btree_set(1u32..500, 1..60)) {
                let uids = UidSet::from_uids(values.iter().filter_map(|&n| Uid::new(n))).unwrap();
                let mut expanded = BTreeSet::new();
                for part in uids.to_string().split(',') {
                    match part.split_once(':') {
                        Some((a, b)) => {
                            let (a, b): (u32, u32) = (a.parse().unwrap(), b.parse().unwrap());
                            prop_assert!(a < b);
                            expanded.extend(a..=b);
                        }
                        None => {
                            expanded.insert(part.parse::<u32>().unwrap());
                        }
                    }
                }
                prop_assert_eq!(expanded, values);
            }
        }
    }
}

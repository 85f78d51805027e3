//! Datetime interval parsing and the temporal clause.

use crate::{
    Error, Result,
    predicate::{Comparison, FieldRef, Literal, Operand, Predicate},
};
use chrono::{DateTime, FixedOffset};
use std::str::FromStr;

/// A datetime search parameter.
///
/// Either a single instant, or an interval where at most one side is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Matches exactly this instant.
    Instant(DateTime<FixedOffset>),

    /// Matches the inclusive range between the two bounds.
    Range {
        /// The start, or `None` if open.
        start: Option<DateTime<FixedOffset>>,

        /// The end, or `None` if open.
        end: Option<DateTime<FixedOffset>>,
    },
}

impl Interval {
    /// Builds the storage predicate for this interval on a datetime field.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Interval, Queryables};
    ///
    /// let interval: Interval = "2021-01-01T00:00:00Z/..".parse().unwrap();
    /// let predicate = interval.to_predicate(Queryables::skraafoto().datetime());
    /// ```
    pub fn to_predicate(&self, field: FieldRef) -> Predicate {
        match *self {
            Interval::Instant(instant) => {
                Predicate::compare(field, Comparison::Eq, Literal::Timestamp(instant))
            }
            Interval::Range {
                start: Some(start),
                end: Some(end),
            } => Predicate::Between {
                value: Operand::Field(field),
                lower: Operand::Literal(Literal::Timestamp(start)),
                upper: Operand::Literal(Literal::Timestamp(end)),
            },
            Interval::Range {
                start: Some(start),
                end: None,
            } => Predicate::compare(field, Comparison::Gte, Literal::Timestamp(start)),
            Interval::Range {
                start: None,
                end: Some(end),
            } => Predicate::compare(field, Comparison::Lte, Literal::Timestamp(end)),
            Interval::Range {
                start: None,
                end: None,
            } => Predicate::True,
        }
    }
}

impl FromStr for Interval {
    type Err = Error;

    /// Parses a datetime parameter.
    ///
    /// Open sides are written as an empty string or `..`. Intervals with both
    /// sides open are rejected, as are intervals that end before they start.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Error, Interval};
    ///
    /// let _: Interval = "2021-11-22T10:03:41Z".parse().unwrap();
    /// let _: Interval = "../2021-11-22T10:03:41Z".parse().unwrap();
    /// assert!(matches!("../..".parse::<Interval>(), Err(Error::DoubleOpenInterval)));
    /// ```
    fn from_str(s: &str) -> Result<Interval> {
        match s.split_once('/') {
            None => parse_datetime(s).map(Interval::Instant),
            Some((start, end)) => {
                let start = parse_bound(start)?;
                let end = parse_bound(end)?;
                match (start, end) {
                    (None, None) => Err(Error::DoubleOpenInterval),
                    (Some(start), Some(end)) if start > end => {
                        Err(Error::StartIsAfterEnd(start, end))
                    }
                    (start, end) => Ok(Interval::Range { start, end }),
                }
            }
        }
    }
}

fn parse_bound(s: &str) -> Result<Option<DateTime<FixedOffset>>> {
    if s.is_empty() || s == ".." {
        Ok(None)
    } else {
        parse_datetime(s).map(Some)
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).map_err(|_| Error::InvalidDatetime(s.to_string()))
}

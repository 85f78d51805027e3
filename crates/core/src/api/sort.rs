use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt::Display, str::FromStr};

/// A field and the direction to sort it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sortby {
    /// The queryable to sort on.
    pub field: String,

    /// The direction.
    pub direction: Direction,
}

/// The direction of sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Ascending, nulls first.
    #[serde(rename = "asc")]
    #[default]
    Ascending,

    /// Descending, nulls last.
    #[serde(rename = "desc")]
    Descending,
}

impl Sortby {
    /// Creates a new ascending sortby.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Sortby;
    ///
    /// let sortby = Sortby::asc("id");
    /// assert_eq!(sortby.to_string(), "+id");
    /// ```
    pub fn asc(field: impl ToString) -> Sortby {
        Sortby {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    /// Creates a new descending sortby.
    pub fn desc(field: impl ToString) -> Sortby {
        Sortby {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }

    /// Parses a comma-separated GET sortby, e.g. `+datetime,-id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::api::Sortby;
    ///
    /// let sortby = Sortby::parse_list("+datetime,-id").unwrap();
    /// assert_eq!(sortby, vec![Sortby::asc("datetime"), Sortby::desc("id")]);
    /// ```
    pub fn parse_list(s: &str) -> Result<Vec<Sortby>> {
        s.split(',').map(str::parse).collect()
    }
}

impl Direction {
    /// Returns the opposite direction.
    pub fn reverse(self) -> Direction {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }

    /// Orients an ascending ordering in this direction.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }

    /// Returns `asc` or `desc`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "asc",
            Direction::Descending => "desc",
        }
    }
}

impl FromStr for Sortby {
    type Err = Error;

    fn from_str(s: &str) -> Result<Sortby> {
        // An unencoded `+` arrives as a space once the query string is decoded.
        if s.starts_with(' ') {
            return Err(Error::UnencodedSortby(s.to_string()));
        }
        let (direction, field) = if let Some(field) = s.strip_prefix('+') {
            (Direction::Ascending, field)
        } else if let Some(field) = s.strip_prefix('-') {
            (Direction::Descending, field)
        } else {
            (Direction::Ascending, s)
        };
        if field.is_empty() {
            Err(Error::InvalidSortby(s.to_string()))
        } else {
            Ok(Sortby {
                field: field.to_string(),
                direction,
            })
        }
    }
}

impl Display for Sortby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.direction {
            Direction::Ascending => write!(f, "+{}", self.field),
            Direction::Descending => write!(f, "-{}", self.field),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

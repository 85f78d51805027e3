//! Storage-native predicates.
//!
//! A [Predicate] is what the filter compiler, the spatial/temporal clause
//! builder, and the pagination engine produce. Field references are already
//! resolved to their storage location and value type, literals are already
//! cast, and geometries are already in the storage CRS, so backends only have
//! to translate the tree into their own query language.

use crate::{Storage, ValueType, pagination::Keyset};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use geo::{Geometry, Point};
use serde_json::Value;
use std::fmt::Display;

/// A boolean expression over item records.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Always true.
    True,

    /// All of the children are true.
    And(Vec<Predicate>),

    /// Any of the children is true.
    Or(Vec<Predicate>),

    /// The child is false.
    Not(Box<Predicate>),

    /// A binary comparison.
    Compare {
        /// The comparison operator.
        op: Comparison,

        /// The left-hand side.
        lhs: Operand,

        /// The right-hand side.
        rhs: Operand,
    },

    /// `lower <= value <= upper`.
    Between {
        /// The tested value.
        value: Operand,

        /// The inclusive lower bound.
        lower: Operand,

        /// The inclusive upper bound.
        upper: Operand,
    },

    /// The operand is null (or missing).
    IsNull(Operand),

    /// SQL `LIKE` pattern matching, with `%` and `_` wildcards.
    Like {
        /// The tested value.
        value: Operand,

        /// The pattern.
        pattern: String,
    },

    /// The operand equals one of the list values.
    In {
        /// The tested value.
        value: Operand,

        /// The candidates.
        list: Vec<Operand>,
    },

    /// The geometry field intersects the geometry, which is in the storage CRS.
    Intersects {
        /// The geometry field.
        field: FieldRef,

        /// The geometry to test against.
        geometry: Geometry,
    },

    /// The record sorts strictly after (or before) a pagination bookmark.
    Keyset(Keyset),
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
}

/// An arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A resolved field.
    Field(FieldRef),

    /// A constant.
    Literal(Literal),

    /// An arithmetic expression.
    Arithmetic {
        /// The operator.
        op: Arithmetic,

        /// The left-hand side.
        lhs: Box<Operand>,

        /// The right-hand side.
        rhs: Box<Operand>,
    },

    /// The distance between `origin` and the centroid of the field's bounding envelope.
    Distance {
        /// The geometry field.
        field: FieldRef,

        /// The reference point, in the storage CRS.
        origin: Point,
    },
}

/// A constant value, cast to the type of the field it's compared with.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,

    /// A boolean.
    Bool(bool),

    /// A number.
    Number(f64),

    /// A string.
    Text(String),

    /// A timestamp.
    Timestamp(DateTime<FixedOffset>),
}

/// A queryable field, resolved to where it lives in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// The logical name, e.g. `pers:omega`.
    pub name: String,

    /// Where the value is stored.
    pub storage: Storage,

    /// The value type, used to cast document-path projections.
    pub value_type: ValueType,
}

impl Predicate {
    /// Combines predicates with `and`, dropping always-true children.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Predicate;
    ///
    /// assert_eq!(Predicate::and(vec![Predicate::True, Predicate::True]), Predicate::True);
    /// ```
    pub fn and(predicates: Vec<Predicate>) -> Predicate {
        let mut children = Vec::with_capacity(predicates.len());
        for predicate in predicates {
            match predicate {
                Predicate::True => {}
                Predicate::And(nested) => children.extend(nested),
                predicate => children.push(predicate),
            }
        }
        match children.len() {
            0 => Predicate::True,
            1 => children.pop().unwrap_or(Predicate::True),
            _ => Predicate::And(children),
        }
    }

    /// Creates a comparison between a field and a literal.
    pub fn compare(field: FieldRef, op: Comparison, literal: Literal) -> Predicate {
        Predicate::Compare {
            op,
            lhs: Operand::Field(field),
            rhs: Operand::Literal(literal),
        }
    }

    /// Returns true if this predicate or any child is a keyset bound.
    pub fn has_keyset(&self) -> bool {
        match self {
            Predicate::Keyset(_) => true,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().any(Predicate::has_keyset)
            }
            Predicate::Not(child) => child.has_keyset(),
            _ => false,
        }
    }
}

impl Comparison {
    /// Returns the SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        }
    }

    /// Returns true if `ordering` satisfies this comparison.
    pub fn matches(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Eq => ordering == Equal,
            Comparison::Ne => ordering != Equal,
            Comparison::Lt => ordering == Less,
            Comparison::Lte => ordering != Greater,
            Comparison::Gt => ordering == Greater,
            Comparison::Gte => ordering != Less,
        }
    }
}

impl Arithmetic {
    /// Returns the SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Arithmetic::Add => "+",
            Arithmetic::Sub => "-",
            Arithmetic::Mul => "*",
            Arithmetic::Div => "/",
        }
    }

    /// Applies this operator.
    ///
    /// Division by zero yields `None`, which evaluates as null.
    pub fn apply(&self, lhs: f64, rhs: f64) -> Option<f64> {
        match self {
            Arithmetic::Add => Some(lhs + rhs),
            Arithmetic::Sub => Some(lhs - rhs),
            Arithmetic::Mul => Some(lhs * rhs),
            Arithmetic::Div => (rhs != 0.0).then(|| lhs / rhs),
        }
    }
}

impl Literal {
    /// Converts a JSON scalar into a literal, without any cast.
    ///
    /// Returns `None` for arrays and objects.
    pub fn from_json(value: &Value) -> Option<Literal> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => n.as_f64().map(Literal::Number),
            Value::String(s) => Some(Literal::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Converts a JSON value into a literal of the given type.
    ///
    /// Returns `None` if the value can't be cast, e.g. `"abc"` as a number.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Literal, ValueType};
    /// use serde_json::json;
    ///
    /// assert_eq!(
    ///     Literal::cast(&json!("0.075"), ValueType::Number),
    ///     Some(Literal::Number(0.075))
    /// );
    /// assert_eq!(Literal::cast(&json!("abc"), ValueType::Number), None);
    /// ```
    pub fn cast(value: &Value, value_type: ValueType) -> Option<Literal> {
        let literal = Literal::from_json(value)?;
        match (value_type, literal) {
            (_, Literal::Null) => Some(Literal::Null),
            (ValueType::Number, Literal::Text(s)) => s.trim().parse().ok().map(Literal::Number),
            (ValueType::Number, literal @ Literal::Number(_)) => Some(literal),
            (ValueType::Datetime, Literal::Text(s)) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(Literal::Timestamp),
            (ValueType::String | ValueType::Id, Literal::Text(s)) => Some(Literal::Text(s)),
            (ValueType::String | ValueType::Id, Literal::Number(_)) => {
                Some(Literal::Text(value.to_string()))
            }
            (ValueType::String, literal @ Literal::Bool(_)) => Some(literal),
            _ => None,
        }
    }

    /// Converts this literal back to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::from(*n),
            Literal::Text(s) => Value::String(s.clone()),
            Literal::Timestamp(datetime) => {
                Value::String(datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::{Comparison, Literal, Predicate};
    use crate::{Storage, ValueType, predicate::FieldRef};
    use serde_json::json;

    fn gsd() -> FieldRef {
        FieldRef {
            name: "gsd".to_string(),
            storage: Storage::Column("gsd".to_string()),
            value_type: ValueType::Number,
        }
    }

    #[test]
    fn and_flattens() {
        let a = Predicate::compare(gsd(), Comparison::Gt, Literal::Number(0.1));
        let b = Predicate::compare(gsd(), Comparison::Lt, Literal::Number(0.2));
        assert_eq!(
            Predicate::and(vec![Predicate::True, a.clone()]),
            a.clone(),
            "a single child is returned as-is"
        );
        assert_eq!(
            Predicate::and(vec![Predicate::And(vec![a.clone(), b.clone()]), Predicate::True]),
            Predicate::And(vec![a, b])
        );
    }

    #[test]
    fn cast() {
        assert_eq!(
            Literal::cast(&json!("2021-11-22T10:03:41Z"), ValueType::Datetime)
                .unwrap()
                .to_json(),
            json!("2021-11-22T10:03:41Z")
        );
        assert_eq!(Literal::cast(&json!(3), ValueType::Id), Some(Literal::Text("3".into())));
        assert_eq!(Literal::cast(&json!(null), ValueType::Number), Some(Literal::Null));
        assert_eq!(Literal::cast(&json!("tomorrow"), ValueType::Datetime), None);
        assert_eq!(Literal::cast(&json!([1]), ValueType::Number), None);
    }

    #[test]
    fn comparison_matches() {
        use std::cmp::Ordering::*;
        assert!(Comparison::Lte.matches(Equal));
        assert!(Comparison::Lte.matches(Less));
        assert!(!Comparison::Lt.matches(Equal));
        assert!(Comparison::Ne.matches(Greater));
    }
}

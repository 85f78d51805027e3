//! CQL-JSON filters.
//!
//! Filters are parsed into a [FilterNode] tree, then compiled against the
//! queryables registry into a storage-native [Predicate](crate::Predicate).

mod compile;
mod expr;
mod parse;

pub use compile::{CompiledFilter, Compiler};
pub use expr::{Expr, FilterNode, GeometryLiteral, Operator};
pub use parse::parse;

use crate::Crs;
use geo::Geometry;
use serde_json::Value;
use std::fmt::Display;

/// A node of a parsed CQL-JSON filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// An empty filter document, `{}`.
    Empty,

    /// A binary comparison, e.g. `eq`.
    Comparison {
        /// The canonical operator.
        op: Operator,
        /// The left-hand side.
        lhs: Expr,
        /// The right-hand side.
        rhs: Expr,
    },

    /// `and` or `or`.
    Logical {
        /// The canonical operator.
        op: Operator,
        /// The children.
        children: Vec<FilterNode>,
    },

    /// `not`.
    Not(Box<FilterNode>),

    /// A spatial predicate, e.g. `intersects`.
    Spatial {
        /// The canonical operator.
        op: Operator,
        /// The left-hand side.
        lhs: Expr,
        /// The right-hand side.
        rhs: Expr,
    },

    /// `between`, inclusive.
    Between {
        /// The tested value.
        value: Expr,
        /// The lower bound.
        lower: Expr,
        /// The upper bound.
        upper: Expr,
    },

    /// `isNull`.
    IsNull(Expr),

    /// `like`.
    Like {
        /// The tested value.
        value: Expr,
        /// The pattern.
        pattern: Expr,
    },

    /// `in`.
    In {
        /// The tested value.
        value: Expr,
        /// The candidates.
        list: Vec<Expr>,
    },

    /// A temporal predicate, e.g. `before`.
    Temporal {
        /// The canonical operator.
        op: Operator,
        /// The left-hand side.
        lhs: Expr,
        /// The right-hand side.
        rhs: Expr,
    },

    /// An array predicate, e.g. `acontains`.
    Array {
        /// The canonical operator.
        op: Operator,
        /// The left-hand side.
        lhs: Expr,
        /// The right-hand side.
        rhs: Expr,
    },
}

/// A value expression inside a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `{"property": "name"}`
    Property(String),

    /// A JSON scalar or array.
    Literal(Value),

    /// A geometry literal, tagged with the filter CRS of its request.
    Geometry(GeometryLiteral),

    /// `{"+": [lhs, rhs]}` and friends.
    Arithmetic {
        /// The canonical operator.
        op: Operator,
        /// The left-hand side.
        lhs: Box<Expr>,
        /// The right-hand side.
        rhs: Box<Expr>,
    },

    /// `{"function": {"name": ..., "args": [...]}}`
    Function {
        /// The function name.
        name: String,
        /// The arguments.
        args: Vec<Expr>,
    },
}

/// A geometry from a filter document and the CRS it was declared in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryLiteral {
    /// The geometry.
    pub geometry: Geometry,

    /// The CRS of the coordinates.
    pub crs: Crs,
}

macro_rules! operators {
    ($($variant:ident => $name:literal $(| $alias:literal)*, $supported:literal;)*) => {
        /// A canonical filter operator.
        ///
        /// Several spellings map to the same operator, e.g. `ge`, `gte`, and
        /// `>=`. Everything downstream of parsing only sees canonical operators.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[allow(missing_docs)]
        pub enum Operator {
            $($variant,)*
        }

        impl Operator {
            /// Looks up an operator by any of its spellings.
            ///
            /// # Examples
            ///
            /// ```
            /// use flyfoto::filter::Operator;
            ///
            /// assert_eq!(Operator::from_name("ge"), Some(Operator::Gte));
            /// assert_eq!(Operator::from_name("gte"), Some(Operator::Gte));
            /// assert_eq!(Operator::from_name("invalid_op"), None);
            /// ```
            pub fn from_name(name: &str) -> Option<Operator> {
                match name {
                    $($name $(| $alias)* => Some(Operator::$variant),)*
                    _ => None,
                }
            }

            /// Returns the canonical name.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Operator::$variant => $name,)*
                }
            }

            /// Returns true if filters can use this operator.
            pub fn is_supported(&self) -> bool {
                match self {
                    $(Operator::$variant => $supported,)*
                }
            }
        }
    };
}

operators! {
    Eq => "eq" | "=", true;
    Ne => "ne" | "neq" | "<>", true;
    Lt => "lt" | "<", true;
    Lte => "lte" | "le" | "<=", true;
    Gt => "gt" | ">", true;
    Gte => "gte" | "ge" | ">=", true;
    And => "and", true;
    Or => "or", true;
    Not => "not", true;
    IsNull => "isNull" | "isnull", true;
    Between => "between", true;
    Like => "like", true;
    In => "in", true;
    Intersects => "intersects" | "s_intersects", true;
    Equals => "equals" | "s_equals", false;
    Disjoint => "disjoint" | "s_disjoint", false;
    Touches => "touches" | "s_touches", false;
    Within => "within" | "s_within", false;
    Overlaps => "overlaps" | "s_overlaps", false;
    Crosses => "crosses" | "s_crosses", false;
    Contains => "contains" | "s_contains", false;
    After => "after" | "t_after", false;
    Before => "before" | "t_before", false;
    Begins => "begins" | "t_starts", false;
    BegunBy => "begunby" | "begunBy" | "t_startedby", false;
    TContains => "tcontains" | "t_contains", false;
    During => "during" | "t_during", false;
    EndedBy => "endedby" | "endedBy" | "t_finishedby", false;
    Ends => "ends" | "t_finishes", false;
    TEquals => "tequals" | "t_equals", false;
    Meets => "meets" | "t_meets", false;
    MetBy => "metby" | "metBy" | "t_metby", false;
    TOverlaps => "toverlaps" | "t_overlaps", false;
    OverlappedBy => "overlappedby" | "overlappedBy" | "t_overlappedby", false;
    AnyInteracts => "anyinteracts" | "t_intersects", false;
    AEquals => "aequals" | "a_equals", false;
    AContains => "acontains" | "a_contains", false;
    AContainedBy => "acontainedBy" | "acontainedby" | "a_containedby", false;
    AOverlaps => "aoverlaps" | "a_overlaps", false;
    Add => "+" | "add", true;
    Sub => "-" | "sub", true;
    Mul => "*" | "mul", true;
    Div => "/" | "div", true;
    Function => "function", false;
}

/// How an operator's arguments are shaped in a filter document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    Comparison,
    Logical,
    Not,
    IsNull,
    Between,
    Like,
    In,
    Spatial,
    Temporal,
    Array,
    Arithmetic,
    Function,
}

impl Operator {
    pub(crate) fn arity(&self) -> Arity {
        use Operator::*;
        match self {
            Eq | Ne | Lt | Lte | Gt | Gte => Arity::Comparison,
            And | Or => Arity::Logical,
            Not => Arity::Not,
            IsNull => Arity::IsNull,
            Between => Arity::Between,
            Like => Arity::Like,
            In => Arity::In,
            Intersects | Equals | Disjoint | Touches | Within | Overlaps | Crosses | Contains => {
                Arity::Spatial
            }
            After | Before | Begins | BegunBy | TContains | During | EndedBy | Ends | TEquals
            | Meets | MetBy | TOverlaps | OverlappedBy | AnyInteracts => Arity::Temporal,
            AEquals | AContains | AContainedBy | AOverlaps => Arity::Array,
            Add | Sub | Mul | Div => Arity::Arithmetic,
            Function => Arity::Function,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

enum Visited<'a> {
    Node(&'a FilterNode),
    Expr(&'a Expr),
}

impl FilterNode {
    /// Returns the names of all referenced properties, in pre-order, without duplicates.
    pub fn properties(&self) -> Vec<&str> {
        let mut properties = Vec::new();
        self.visit(&mut |visited| {
            if let Visited::Expr(Expr::Property(name)) = visited
                && !properties.contains(&name.as_str())
            {
                properties.push(name.as_str());
            }
        });
        properties
    }

    /// Returns all operators used, in pre-order, without duplicates.
    pub fn operators(&self) -> Vec<Operator> {
        let mut operators = Vec::new();
        self.visit(&mut |visited| {
            let op = match visited {
                Visited::Node(node) => node.operator(),
                Visited::Expr(expr) => expr.operator(),
            };
            if let Some(op) = op
                && !operators.contains(&op)
            {
                operators.push(op);
            }
        });
        operators
    }

    /// Returns the operator of this node, if it has one.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            FilterNode::Empty => None,
            FilterNode::Comparison { op, .. }
            | FilterNode::Logical { op, .. }
            | FilterNode::Spatial { op, .. }
            | FilterNode::Temporal { op, .. }
            | FilterNode::Array { op, .. } => Some(*op),
            FilterNode::Not(_) => Some(Operator::Not),
            FilterNode::Between { .. } => Some(Operator::Between),
            FilterNode::IsNull(_) => Some(Operator::IsNull),
            FilterNode::Like { .. } => Some(Operator::Like),
            FilterNode::In { .. } => Some(Operator::In),
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(Visited<'a>)) {
        f(Visited::Node(self));
        match self {
            FilterNode::Empty => {}
            FilterNode::Comparison { lhs, rhs, .. }
            | FilterNode::Spatial { lhs, rhs, .. }
            | FilterNode::Temporal { lhs, rhs, .. }
            | FilterNode::Array { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            FilterNode::Logical { children, .. } => {
                for child in children {
                    child.visit(f);
                }
            }
            FilterNode::Not(child) => child.visit(f),
            FilterNode::Between {
                value,
                lower,
                upper,
            } => {
                value.visit(f);
                lower.visit(f);
                upper.visit(f);
            }
            FilterNode::IsNull(value) => value.visit(f),
            FilterNode::Like { value, pattern } => {
                value.visit(f);
                pattern.visit(f);
            }
            FilterNode::In { value, list } => {
                value.visit(f);
                for item in list {
                    item.visit(f);
                }
            }
        }
    }
}

impl Expr {
    /// Returns the operator of this expression, if it has one.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Expr::Arithmetic { op, .. } => Some(*op),
            Expr::Function { .. } => Some(Operator::Function),
            Expr::Property(_) | Expr::Literal(_) | Expr::Geometry(_) => None,
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(Visited<'a>)) {
        f(Visited::Expr(self));
        match self {
            Expr::Arithmetic { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.visit(f);
                }
            }
            Expr::Property(_) | Expr::Literal(_) | Expr::Geometry(_) => {}
        }
    }
}

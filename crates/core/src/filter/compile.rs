use super::{
    expr::{Expr, FilterNode, Operator},
    parse,
};
use crate::{
    Crs, Error, Queryables, Reproject, Result, ValueType,
    predicate::{Arithmetic, Comparison, FieldRef, Literal, Operand, Predicate},
};
use geo::{Centroid, Geometry, Point};
use serde_json::Value;
use std::collections::HashMap;

/// The result of compiling a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    /// The storage-native predicate.
    pub predicate: Predicate,

    /// The centroid of the first spatial predicate's geometry, in the storage
    /// CRS, used for "closest first" ordering.
    pub ordering_point: Option<Point>,
}

/// Compiles CQL-JSON filters against a queryables registry.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'a> {
    /// The queryables registry.
    pub queryables: &'a Queryables,

    /// The collections the search targets. Empty means all collections.
    pub collections: &'a [String],

    /// The CRS of stored geometries.
    pub storage_crs: Crs,

    /// Brings geometry literals into the storage CRS.
    pub reprojector: &'a dyn Reproject,
}

impl Compiler<'_> {
    /// Parses and compiles a filter document.
    ///
    /// Errors are reported in this order: parse errors, unknown fields,
    /// unsupported operators, and finally literal casts.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Crs, Queryables, TransverseMercator, filter::Compiler};
    /// use serde_json::json;
    ///
    /// let queryables = Queryables::skraafoto();
    /// let compiler = Compiler {
    ///     queryables: &queryables,
    ///     collections: &[],
    ///     storage_crs: Crs::Crs84,
    ///     reprojector: &TransverseMercator,
    /// };
    /// let compiled = compiler
    ///     .compile(&json!({"lte": [{"property": "gsd"}, "0.075"]}), Crs::Crs84)
    ///     .unwrap();
    /// assert!(compiled.ordering_point.is_none());
    ///
    /// let err = compiler
    ///     .compile(&json!({"eq": [{"property": "invalid-field"}, 50]}), Crs::Crs84)
    ///     .unwrap_err();
    /// assert_eq!(err.to_string(), "Cannot search on field: invalid-field");
    /// ```
    pub fn compile(&self, document: &Value, filter_crs: Crs) -> Result<CompiledFilter> {
        let node = parse(document, filter_crs)?;
        self.compile_node(&node)
    }

    /// Compiles an already-parsed filter.
    pub fn compile_node(&self, node: &FilterNode) -> Result<CompiledFilter> {
        let mut fields = HashMap::new();
        for name in node.properties() {
            let field = self
                .queryables
                .resolve(name, self.collections)
                .map_err(|_| Error::CannotSearchOnField(name.to_string()))?;
            let _ = fields.insert(name, field);
        }
        if let Some(op) = node.operators().into_iter().find(|op| !op.is_supported()) {
            return Err(Error::UnsupportedOperation(op.name().to_string()));
        }
        let predicate = Translator {
            compiler: self,
            fields,
        }
        .node(node)?;
        let ordering_point = first_intersection(&predicate).and_then(Geometry::centroid);
        Ok(CompiledFilter {
            predicate,
            ordering_point,
        })
    }
}

struct Translator<'a, 'b> {
    compiler: &'a Compiler<'b>,
    fields: HashMap<&'a str, FieldRef>,
}

/// The type a literal should be cast to, and the name to report if it can't be.
type Hint<'h> = Option<(ValueType, &'h str)>;

impl Translator<'_, '_> {
    fn node(&self, node: &FilterNode) -> Result<Predicate> {
        match node {
            FilterNode::Empty => Ok(Predicate::True),
            FilterNode::Comparison { op, lhs, rhs } => {
                let hint = self.hint(lhs).or(self.hint(rhs));
                self.reject_geometry(*op, hint)?;
                Ok(Predicate::Compare {
                    op: comparison(*op)?,
                    lhs: self.operand(lhs, hint)?,
                    rhs: self.operand(rhs, hint)?,
                })
            }
            FilterNode::Logical { op, children } => {
                let children = children
                    .iter()
                    .map(|child| self.node(child))
                    .collect::<Result<Vec<_>>>()?;
                match op {
                    Operator::And => Ok(Predicate::And(children)),
                    Operator::Or => Ok(Predicate::Or(children)),
                    op => Err(Error::UnsupportedOperation(op.name().to_string())),
                }
            }
            FilterNode::Not(child) => Ok(Predicate::Not(Box::new(self.node(child)?))),
            FilterNode::Spatial {
                op: Operator::Intersects,
                lhs,
                rhs,
            } => self.intersects(lhs, rhs),
            FilterNode::Between {
                value,
                lower,
                upper,
            } => {
                let hint = self.hint(value);
                self.reject_geometry(Operator::Between, hint)?;
                Ok(Predicate::Between {
                    value: self.operand(value, hint)?,
                    lower: self.operand(lower, hint)?,
                    upper: self.operand(upper, hint)?,
                })
            }
            FilterNode::IsNull(value) => Ok(Predicate::IsNull(self.operand(value, None)?)),
            FilterNode::Like { value, pattern } => {
                let hint = self.hint(value);
                self.reject_geometry(Operator::Like, hint)?;
                let Expr::Literal(Value::String(pattern)) = pattern else {
                    return Err(Error::InvalidLiteral {
                        field: hint.map(|(_, name)| name).unwrap_or("like").to_string(),
                        expected: "string pattern",
                        value: literal_value(pattern),
                    });
                };
                Ok(Predicate::Like {
                    value: self.operand(value, hint)?,
                    pattern: pattern.clone(),
                })
            }
            FilterNode::In { value, list } => {
                let hint = self.hint(value);
                self.reject_geometry(Operator::In, hint)?;
                Ok(Predicate::In {
                    value: self.operand(value, hint)?,
                    list: list
                        .iter()
                        .map(|item| self.operand(item, hint))
                        .collect::<Result<_>>()?,
                })
            }
            FilterNode::Spatial { op, .. }
            | FilterNode::Temporal { op, .. }
            | FilterNode::Array { op, .. } => {
                Err(Error::UnsupportedOperation(op.name().to_string()))
            }
        }
    }

    fn operand(&self, expr: &Expr, hint: Hint<'_>) -> Result<Operand> {
        match expr {
            Expr::Property(name) => self.field(name).map(Operand::Field),
            Expr::Literal(value) => {
                let literal = match hint {
                    Some((value_type, field)) => {
                        Literal::cast(value, value_type).ok_or_else(|| Error::InvalidLiteral {
                            field: field.to_string(),
                            expected: value_type.name(),
                            value: value.clone(),
                        })?
                    }
                    None => Literal::from_json(value).ok_or_else(|| Error::InvalidLiteral {
                        field: "literal".to_string(),
                        expected: "scalar",
                        value: value.clone(),
                    })?,
                };
                Ok(Operand::Literal(literal))
            }
            Expr::Arithmetic { op, lhs, rhs } => {
                let hint = Some((ValueType::Number, op.name()));
                Ok(Operand::Arithmetic {
                    op: arithmetic(*op)?,
                    lhs: Box::new(self.operand(lhs, hint)?),
                    rhs: Box::new(self.operand(rhs, hint)?),
                })
            }
            Expr::Geometry(_) => Err(Error::UnsupportedOperation(
                "geometry literal outside of a spatial predicate".to_string(),
            )),
            Expr::Function { name, .. } => Err(Error::UnsupportedOperation(format!(
                "function {name}"
            ))),
        }
    }

    fn intersects(&self, lhs: &Expr, rhs: &Expr) -> Result<Predicate> {
        let ((Expr::Property(name), Expr::Geometry(literal))
        | (Expr::Geometry(literal), Expr::Property(name))) = (lhs, rhs)
        else {
            return Err(Error::UnsupportedOperation(
                "intersects requires a geometry property and a geometry literal".to_string(),
            ));
        };
        let field = self.field(name)?;
        if field.value_type != ValueType::Geometry {
            return Err(Error::UnsupportedOperation(format!(
                "intersects on non-geometry field {name}"
            )));
        }
        let mut geometry = literal.geometry.clone();
        self.compiler
            .reprojector
            .reproject(&mut geometry, literal.crs, self.compiler.storage_crs)?;
        Ok(Predicate::Intersects { field, geometry })
    }

    fn field(&self, name: &str) -> Result<FieldRef> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CannotSearchOnField(name.to_string()))
    }

    fn hint<'e>(&'e self, expr: &'e Expr) -> Hint<'e> {
        match expr {
            Expr::Property(name) => self
                .fields
                .get(name.as_str())
                .map(|field| (field.value_type, name.as_str())),
            Expr::Arithmetic { op, .. } => Some((ValueType::Number, op.name())),
            _ => None,
        }
    }

    fn reject_geometry(&self, op: Operator, hint: Hint<'_>) -> Result<()> {
        match hint {
            Some((ValueType::Geometry, name)) => Err(Error::UnsupportedOperation(format!(
                "{op} on geometry field {name}"
            ))),
            _ => Ok(()),
        }
    }
}

fn comparison(op: Operator) -> Result<Comparison> {
    match op {
        Operator::Eq => Ok(Comparison::Eq),
        Operator::Ne => Ok(Comparison::Ne),
        Operator::Lt => Ok(Comparison::Lt),
        Operator::Lte => Ok(Comparison::Lte),
        Operator::Gt => Ok(Comparison::Gt),
        Operator::Gte => Ok(Comparison::Gte),
        op => Err(Error::UnsupportedOperation(op.name().to_string())),
    }
}

fn arithmetic(op: Operator) -> Result<Arithmetic> {
    match op {
        Operator::Add => Ok(Arithmetic::Add),
        Operator::Sub => Ok(Arithmetic::Sub),
        Operator::Mul => Ok(Arithmetic::Mul),
        Operator::Div => Ok(Arithmetic::Div),
        op => Err(Error::UnsupportedOperation(op.name().to_string())),
    }
}

fn literal_value(expr: &Expr) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Property(name) => serde_json::json!({ "property": name }),
        _ => Value::Null,
    }
}

fn first_intersection(predicate: &Predicate) -> Option<&Geometry> {
    match predicate {
        Predicate::Intersects { geometry, .. } => Some(geometry),
        Predicate::And(children) | Predicate::Or(children) => {
            children.iter().find_map(first_intersection)
        }
        Predicate::Not(child) => first_intersection(child),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::Compiler;
    use crate::{
        Crs, Error, ErrorKind, Queryables, TransverseMercator,
        predicate::{Comparison, Literal, Operand, Predicate},
    };
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn queryables() -> Queryables {
        Queryables::skraafoto()
    }

    fn compiler(queryables: &Queryables) -> Compiler<'_> {
        Compiler {
            queryables,
            collections: &[],
            storage_crs: Crs::Crs84,
            reprojector: &TransverseMercator,
        }
    }

    #[rstest]
    fn empty_is_always_true(queryables: Queryables) {
        let compiled = compiler(&queryables).compile(&json!({}), Crs::Crs84).unwrap();
        assert_eq!(compiled.predicate, Predicate::True);
    }

    #[rstest]
    fn literal_cast_to_field_type(queryables: Queryables) {
        let compiled = compiler(&queryables)
            .compile(&json!({"eq": [{"property": "gsd"}, "0.075"]}), Crs::Crs84)
            .unwrap();
        let Predicate::Compare { op, rhs, .. } = compiled.predicate else {
            panic!("not a comparison");
        };
        assert_eq!(op, Comparison::Eq);
        assert_eq!(rhs, Operand::Literal(Literal::Number(0.075)));
    }

    #[rstest]
    fn parse_errors_come_first(queryables: Queryables) {
        let err = compiler(&queryables)
            .compile(
                &json!({"and": [
                    {"eq": [{"property": "invalid-field"}, 1]},
                    {"invalid_op": [{"property": "gsd"}, 1]}
                ]}),
                Crs::Crs84,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FilterParse);
    }

    #[rstest]
    fn unknown_field(queryables: Queryables) {
        let err = compiler(&queryables)
            .compile(&json!({"eq": [{"property": "invalid-field"}, 50]}), Crs::Crs84)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldNotFound);
        assert_eq!(err.to_string(), "Cannot search on field: invalid-field");
    }

    #[rstest]
    fn fields_are_validated_before_operators(queryables: Queryables) {
        let err = compiler(&queryables)
            .compile(
                &json!({"before": [{"property": "nope"}, {"timestamp": "2021-01-01T00:00:00Z"}]}),
                Crs::Crs84,
            )
            .unwrap_err();
        assert!(matches!(err, Error::CannotSearchOnField(_)));
    }

    #[rstest]
    fn unsupported_operator(queryables: Queryables) {
        let err = compiler(&queryables)
            .compile(
                &json!({"within": [
                    {"property": "geometry"},
                    {"type": "Point", "coordinates": [10.0, 56.0]}
                ]}),
                Crs::Crs84,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.to_string(), "Unsupported operation: within");
    }

    #[rstest]
    fn alias_is_supported(queryables: Queryables) {
        let compiled = compiler(&queryables)
            .compile(&json!({"le": [{"property": "view:azimuth"}, 90]}), Crs::Crs84)
            .unwrap();
        assert!(matches!(
            compiled.predicate,
            Predicate::Compare {
                op: Comparison::Lte,
                ..
            }
        ));
    }

    #[rstest]
    fn intersects_is_reprojected_and_gives_ordering_point(queryables: Queryables) {
        let compiled = compiler(&queryables)
            .compile(
                &json!({"intersects": [
                    {"property": "geometry"},
                    {"type": "Point", "coordinates": [500000.0, 6200000.0]}
                ]}),
                Crs::ETRS89_UTM32N,
            )
            .unwrap();
        let point = compiled.ordering_point.unwrap();
        assert!((point.x() - 9.0).abs() < 1e-9, "{point:?}");
        assert!((55.0..57.0).contains(&point.y()), "{point:?}");
    }

    #[rstest]
    fn invalid_literal(queryables: Queryables) {
        let err = compiler(&queryables)
            .compile(
                &json!({"gt": [{"property": "datetime"}, "last tuesday"]}),
                Crs::Crs84,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidLiteral { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[rstest]
    fn arithmetic(queryables: Queryables) {
        let compiled = compiler(&queryables)
            .compile(
                &json!({"gt": [{"+": [{"property": "pers:omega"}, 1]}, 2]}),
                Crs::Crs84,
            )
            .unwrap();
        assert!(matches!(
            compiled.predicate,
            Predicate::Compare {
                lhs: Operand::Arithmetic { .. },
                ..
            }
        ));
    }

    #[rstest]
    fn collection_scoped_fields(queryables: Queryables) {
        let collections = ["not-a-collection".to_string()];
        let compiler = Compiler {
            collections: &collections,
            ..compiler(&queryables)
        };
        let _ = compiler
            .compile(&json!({"eq": [{"property": "gsd"}, 1]}), Crs::Crs84)
            .unwrap_err();
        let _ = compiler
            .compile(&json!({"eq": [{"property": "id"}, "a"]}), Crs::Crs84)
            .unwrap();
    }
}

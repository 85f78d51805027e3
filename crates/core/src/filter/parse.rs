use super::expr::{Arity, Expr, FilterNode, GeometryLiteral, Operator};
use crate::{Bbox, Crs, Error, Result};
use serde_json::{Map, Value};

/// Parses a CQL-JSON document into a filter tree.
///
/// Every geometry literal is tagged with `crs`, the filter CRS of the request.
///
/// # Examples
///
/// ```
/// use flyfoto::{Crs, filter::{self, FilterNode}};
/// use serde_json::json;
///
/// let node = filter::parse(&json!({"eq": [{"property": "direction"}, "north"]}), Crs::Crs84).unwrap();
/// assert!(matches!(node, FilterNode::Comparison { .. }));
/// let err = filter::parse(&json!({"invalid_op": [{"property": "gsd"}, 1]}), Crs::Crs84).unwrap_err();
/// assert_eq!(err.to_string(), r#"Unable to parse expression node {"invalid_op":[{"property":"gsd"},1]}"#);
/// ```
pub fn parse(document: &Value, crs: Crs) -> Result<FilterNode> {
    match document {
        Value::Object(object) if object.is_empty() => Ok(FilterNode::Empty),
        _ => Parser { crs }.node(document),
    }
}

struct Parser {
    crs: Crs,
}

impl Parser {
    fn node(&self, value: &Value) -> Result<FilterNode> {
        let invalid = || Error::FilterParse(value.clone());
        let (op, args) = single_entry(value).ok_or_else(invalid)?;
        let op = Operator::from_name(op).ok_or_else(invalid)?;
        match op.arity() {
            Arity::Comparison => {
                let [lhs, rhs] = self.pair(args)?.ok_or_else(invalid)?;
                Ok(FilterNode::Comparison { op, lhs, rhs })
            }
            Arity::Spatial => {
                let [lhs, rhs] = self.pair(args)?.ok_or_else(invalid)?;
                Ok(FilterNode::Spatial { op, lhs, rhs })
            }
            Arity::Temporal => {
                let [lhs, rhs] = self.pair(args)?.ok_or_else(invalid)?;
                Ok(FilterNode::Temporal { op, lhs, rhs })
            }
            Arity::Array => {
                let [lhs, rhs] = self.pair(args)?.ok_or_else(invalid)?;
                Ok(FilterNode::Array { op, lhs, rhs })
            }
            Arity::Logical => {
                let children = args.as_array().filter(|a| !a.is_empty()).ok_or_else(invalid)?;
                Ok(FilterNode::Logical {
                    op,
                    children: children
                        .iter()
                        .map(|child| self.node(child))
                        .collect::<Result<_>>()?,
                })
            }
            Arity::Not => {
                let child = unwrap_single(args).ok_or_else(invalid)?;
                Ok(FilterNode::Not(Box::new(self.node(child)?)))
            }
            Arity::IsNull => {
                let value = unwrap_single(args).ok_or_else(invalid)?;
                Ok(FilterNode::IsNull(self.expr(value)?))
            }
            Arity::Between => {
                let [value, lower, upper] = match args {
                    Value::Array(array) => <[Value; 3]>::try_from(array.clone()).ok(),
                    Value::Object(object) => match (
                        object.get("value"),
                        object.get("lower"),
                        object.get("upper"),
                    ) {
                        (Some(value), Some(lower), Some(upper)) => {
                            Some([value.clone(), lower.clone(), upper.clone()])
                        }
                        _ => None,
                    },
                    _ => None,
                }
                .ok_or_else(invalid)?;
                Ok(FilterNode::Between {
                    value: self.expr(&value)?,
                    lower: self.expr(&lower)?,
                    upper: self.expr(&upper)?,
                })
            }
            Arity::Like => {
                let [value, pattern] = match args {
                    Value::Object(object) => match (object.get("value"), object.get("pattern")) {
                        (Some(value), Some(pattern)) => {
                            Some([self.expr(value)?, self.expr(pattern)?])
                        }
                        _ => None,
                    },
                    _ => self.pair(args)?,
                }
                .ok_or_else(invalid)?;
                Ok(FilterNode::Like { value, pattern })
            }
            Arity::In => {
                let (value, list) = match args {
                    Value::Object(object) => (object.get("value"), object.get("list")),
                    Value::Array(array) if array.len() == 2 => (array.first(), array.get(1)),
                    _ => (None, None),
                };
                let (Some(value), Some(Value::Array(list))) = (value, list) else {
                    return Err(invalid());
                };
                Ok(FilterNode::In {
                    value: self.expr(value)?,
                    list: list.iter().map(|v| self.expr(v)).collect::<Result<_>>()?,
                })
            }
            Arity::Arithmetic | Arity::Function => Err(invalid()),
        }
    }

    fn expr(&self, value: &Value) -> Result<Expr> {
        let invalid = || Error::FilterParse(value.clone());
        let Value::Object(object) = value else {
            return Ok(Expr::Literal(value.clone()));
        };
        if let Some(property) = object.get("property") {
            return property
                .as_str()
                .map(|name| Expr::Property(name.to_string()))
                .ok_or_else(invalid);
        }
        if object.contains_key("type")
            && (object.contains_key("coordinates") || object.contains_key("geometries"))
        {
            return self.geometry(value);
        }
        if let Some(bbox) = object.get("bbox") {
            let bbox: Bbox = serde_json::from_value(bbox.clone()).map_err(|_| invalid())?;
            return Ok(Expr::Geometry(GeometryLiteral {
                geometry: bbox.valid()?.to_polygon().into(),
                crs: self.crs,
            }));
        }
        if let Some(literal) = object
            .get("timestamp")
            .or_else(|| object.get("date"))
            .or_else(|| object.get("interval"))
        {
            return Ok(Expr::Literal(literal.clone()));
        }
        let (name, args) = single_entry(value).ok_or_else(invalid)?;
        let op = Operator::from_name(name).ok_or_else(invalid)?;
        match op.arity() {
            Arity::Arithmetic => {
                let [lhs, rhs] = self.pair(args)?.ok_or_else(invalid)?;
                Ok(Expr::Arithmetic {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Arity::Function => {
                let name = args.get("name").and_then(Value::as_str).ok_or_else(invalid)?;
                let args = match args.get("args") {
                    Some(Value::Array(args)) => {
                        args.iter().map(|arg| self.expr(arg)).collect::<Result<_>>()?
                    }
                    None => Vec::new(),
                    Some(_) => return Err(invalid()),
                };
                Ok(Expr::Function {
                    name: name.to_string(),
                    args,
                })
            }
            _ => Err(invalid()),
        }
    }

    fn geometry(&self, value: &Value) -> Result<Expr> {
        let invalid = || Error::FilterParse(value.clone());
        let geometry: geojson::Geometry =
            serde_json::from_value(value.clone()).map_err(|_| invalid())?;
        let geometry = geo::Geometry::try_from(geometry).map_err(|_| invalid())?;
        Ok(Expr::Geometry(GeometryLiteral {
            geometry,
            crs: self.crs,
        }))
    }

    /// Parses a two-element argument array.
    ///
    /// Returns `Ok(None)` for the wrong shape, so the caller can report the
    /// enclosing node.
    fn pair(&self, args: &Value) -> Result<Option<[Expr; 2]>> {
        match args.as_array().map(Vec::as_slice) {
            Some([lhs, rhs]) => Ok(Some([self.expr(lhs)?, self.expr(rhs)?])),
            _ => Ok(None),
        }
    }
}

fn single_entry(value: &Value) -> Option<(&str, &Value)> {
    let object: &Map<String, Value> = value.as_object()?;
    if object.len() == 1 {
        object.iter().next().map(|(k, v)| (k.as_str(), v))
    } else {
        None
    }
}

fn unwrap_single(args: &Value) -> Option<&Value> {
    match args {
        Value::Array(array) if array.len() == 1 => array.first(),
        Value::Array(_) => None,
        value => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::{
        Crs, Error,
        filter::{Expr, FilterNode, Operator},
    };
    use serde_json::json;

    #[test]
    fn empty() {
        assert_eq!(parse(&json!({}), Crs::Crs84).unwrap(), FilterNode::Empty);
    }

    #[test]
    fn comparison_alias() {
        let node = parse(&json!({"ge": [{"property": "gsd"}, 0.1]}), Crs::Crs84).unwrap();
        assert_eq!(
            node,
            FilterNode::Comparison {
                op: Operator::Gte,
                lhs: Expr::Property("gsd".into()),
                rhs: Expr::Literal(json!(0.1)),
            }
        );
    }

    #[test]
    fn between_object_and_array() {
        let a = parse(
            &json!({"between": {"value": {"property": "gsd"}, "lower": 0.1, "upper": 0.2}}),
            Crs::Crs84,
        )
        .unwrap();
        let b = parse(
            &json!({"between": [{"property": "gsd"}, 0.1, 0.2]}),
            Crs::Crs84,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn geometry_is_tagged_with_filter_crs() {
        let node = parse(
            &json!({"intersects": [
                {"property": "geometry"},
                {"type": "Point", "coordinates": [600000.0, 6200000.0]}
            ]}),
            Crs::ETRS89_UTM32N,
        )
        .unwrap();
        let FilterNode::Spatial {
            rhs: Expr::Geometry(literal),
            ..
        } = node
        else {
            panic!("not a spatial node");
        };
        assert_eq!(literal.crs, Crs::ETRS89_UTM32N);
    }

    #[test]
    fn nested_unknown_operator() {
        let err = parse(
            &json!({"and": [
                {"eq": [{"property": "direction"}, "north"]},
                {"nope": [1, 2]}
            ]}),
            Crs::Crs84,
        )
        .unwrap_err();
        assert!(matches!(err, Error::FilterParse(ref node) if node == &json!({"nope": [1, 2]})));
    }

    #[test]
    fn in_and_like() {
        let _ = parse(
            &json!({"in": {"value": {"property": "direction"}, "list": ["north", "south"]}}),
            Crs::Crs84,
        )
        .unwrap();
        let _ = parse(&json!({"like": [{"property": "id"}, "2021_%"]}), Crs::Crs84).unwrap();
    }

    #[test]
    fn wrong_shape() {
        let _ = parse(&json!({"eq": [{"property": "gsd"}]}), Crs::Crs84).unwrap_err();
        let _ = parse(&json!({"and": []}), Crs::Crs84).unwrap_err();
        let _ = parse(&json!({"+": [1, 2]}), Crs::Crs84).unwrap_err();
        let _ = parse(&json!([1, 2]), Crs::Crs84).unwrap_err();
    }
}

//! Renders logical queries as parameterized PostgreSQL.

use flyfoto::{
    Literal, Predicate, Storage, ValueType,
    api::Direction,
    backend::Query,
    pagination::SortKey,
    predicate::{FieldRef, Operand},
};
use std::fmt::Write;
use tokio_postgres::types::ToSql;

/// A bound query parameter.
pub type Param = Box<dyn ToSql + Sync + Send>;

/// The table layout of the item store.
///
/// # Examples
///
/// ```
/// use flyfoto_postgres::Layout;
///
/// let layout = Layout::default();
/// assert_eq!(layout.items, "stac_api.images_mvw");
/// assert_eq!(layout.srid, 4326);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// The (possibly schema-qualified) items table or view.
    pub items: String,

    /// The (possibly schema-qualified) collections table.
    pub collections: String,

    /// The SRID of the footprint column.
    pub srid: u32,
}

/// A SQL statement and its parameters.
pub struct Statement {
    /// The SQL text, with `$n` placeholders.
    pub sql: String,

    /// The parameters, in placeholder order.
    pub params: Vec<Param>,
}

struct Renderer<'a> {
    layout: &'a Layout,
    sql: String,
    params: Vec<Param>,
}

/// The fixed columns every fetched row starts with.
const SELECT_RECORD: &str = "t.id, t.collection_id, t.datetime, \
     ST_AsGeoJSON(t.footprint)::jsonb AS footprint, t.properties, \
     to_jsonb(t) - 'id' - 'collection_id' - 'datetime' - 'footprint' - 'properties' AS columns";

/// A collection row as a document, without its null columns.
const SELECT_COLLECTION: &str = "jsonb_strip_nulls(to_jsonb(c)) AS collection";

impl Default for Layout {
    fn default() -> Layout {
        Layout {
            items: "stac_api.images_mvw".to_string(),
            collections: "stac_api.collections".to_string(),
            srid: 4326,
        }
    }
}

impl Layout {
    /// Renders the select of a query, with one `k{n}` column per sort key.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Predicate, Queryables, api::Direction, backend::Query, pagination::SortKey};
    /// use flyfoto_postgres::Layout;
    ///
    /// let queryables = Queryables::skraafoto();
    /// let query = Query::new(
    ///     Predicate::True,
    ///     vec![SortKey::field(queryables.datetime(), Direction::Descending)],
    /// )
    /// .fetch(11);
    /// let statement = Layout::default().select(&query);
    /// assert!(statement.sql.ends_with(
    ///     "WHERE TRUE ORDER BY t.\"datetime\" DESC NULLS LAST LIMIT 11"
    /// ));
    /// ```
    pub fn select(&self, query: &Query) -> Statement {
        let mut renderer = Renderer::new(self);
        renderer.push("SELECT ");
        renderer.push(SELECT_RECORD);
        for (i, key) in query.sort.iter().enumerate() {
            renderer.push(", to_jsonb(");
            renderer.operand(&key.operand);
            let _ = write!(renderer.sql, ") AS k{i}");
        }
        let _ = write!(renderer.sql, " FROM {} t WHERE ", self.items);
        renderer.predicate(&query.predicate);
        renderer.order_by(&query.sort);
        if let Some(fetch) = query.fetch {
            let _ = write!(renderer.sql, " LIMIT {fetch}");
        }
        renderer.finish()
    }

    /// Renders a count of the rows matching a query's predicate.
    pub fn count(&self, query: &Query) -> Statement {
        let mut renderer = Renderer::new(self);
        let _ = write!(renderer.sql, "SELECT count(*) FROM {} t WHERE ", self.items);
        renderer.predicate(&query.predicate);
        renderer.finish()
    }

    /// Renders the lookup of a single record.
    pub fn record(&self, collection: &str, id: &str) -> Statement {
        let mut renderer = Renderer::new(self);
        let _ = write!(
            renderer.sql,
            "SELECT {SELECT_RECORD} FROM {} t WHERE t.collection_id = ",
            self.items
        );
        renderer.bind(collection.to_string(), "text");
        renderer.push(" AND t.id = ");
        renderer.bind(id.to_string(), "text");
        renderer.finish()
    }

    /// Renders the existence check of a collection.
    pub fn collection_exists(&self, collection: &str) -> Statement {
        let mut renderer = Renderer::new(self);
        let _ = write!(
            renderer.sql,
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = ",
            self.collections
        );
        renderer.bind(collection.to_string(), "text");
        renderer.push(")");
        renderer.finish()
    }

    /// Renders the select of every collection document, as one `jsonb` column.
    pub fn collections(&self) -> Statement {
        let mut renderer = Renderer::new(self);
        let _ = write!(
            renderer.sql,
            "SELECT {SELECT_COLLECTION} FROM {} c ORDER BY c.id",
            self.collections
        );
        renderer.finish()
    }

    /// Renders the lookup of one collection document.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto_postgres::Layout;
    ///
    /// let statement = Layout::default().collection("skraafotos2021");
    /// assert_eq!(
    ///     statement.sql,
    ///     "SELECT jsonb_strip_nulls(to_jsonb(c)) AS collection FROM stac_api.collections c WHERE c.id = $1::text"
    /// );
    /// ```
    pub fn collection(&self, id: &str) -> Statement {
        let mut renderer = Renderer::new(self);
        let _ = write!(
            renderer.sql,
            "SELECT {SELECT_COLLECTION} FROM {} c WHERE c.id = ",
            self.collections
        );
        renderer.bind(id.to_string(), "text");
        renderer.finish()
    }
}

impl<'a> Renderer<'a> {
    fn new(layout: &'a Layout) -> Renderer<'a> {
        Renderer {
            layout,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn bind(&mut self, param: impl ToSql + Sync + Send + 'static, cast: &str) {
        self.params.push(Box::new(param));
        let _ = write!(self.sql, "${}::{cast}", self.params.len());
    }

    fn join(&mut self, predicates: &[Predicate], separator: &str, empty: &str) {
        if predicates.is_empty() {
            self.push(empty);
            return;
        }
        self.push("(");
        for (i, predicate) in predicates.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.predicate(predicate);
        }
        self.push(")");
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::True => self.push("TRUE"),
            Predicate::And(children) => self.join(children, " AND ", "TRUE"),
            Predicate::Or(children) => self.join(children, " OR ", "FALSE"),
            Predicate::Not(child) => {
                self.push("NOT ");
                self.predicate(child);
            }
            Predicate::Compare { op, lhs, rhs } => {
                self.push("(");
                self.operand(lhs);
                let _ = write!(self.sql, " {op} ");
                self.operand(rhs);
                self.push(")");
            }
            Predicate::Between {
                value,
                lower,
                upper,
            } => {
                self.push("(");
                self.operand(value);
                self.push(" BETWEEN ");
                self.operand(lower);
                self.push(" AND ");
                self.operand(upper);
                self.push(")");
            }
            Predicate::IsNull(operand) => {
                self.push("(");
                self.operand(operand);
                self.push(" IS NULL)");
            }
            Predicate::Like { value, pattern } => {
                self.push("(");
                self.operand(value);
                self.push(" LIKE ");
                self.bind(pattern.clone(), "text");
                self.push(")");
            }
            Predicate::In { list, .. } if list.is_empty() => self.push("FALSE"),
            Predicate::In { value, list } => {
                self.push("(");
                self.operand(value);
                self.push(" IN (");
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.operand(item);
                }
                self.push("))");
            }
            Predicate::Intersects { field, geometry } => {
                let geojson = geojson::Geometry::new(geojson::Value::from(geometry)).to_string();
                self.push("ST_Intersects(");
                self.field(field);
                self.push(", ST_SetSRID(ST_GeomFromGeoJSON(");
                self.bind(geojson, "text");
                let _ = write!(self.sql, "), {}))", self.layout.srid);
            }
            Predicate::Keyset(keyset) => self.predicate(&keyset.expand()),
        }
    }

    fn operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Field(field) => self.field(field),
            Operand::Literal(literal) => self.literal(literal),
            Operand::Arithmetic { op, lhs, rhs } => {
                self.push("(");
                self.operand(lhs);
                let _ = write!(self.sql, " {} ", op.as_sql());
                self.operand(rhs);
                self.push(")");
            }
            Operand::Distance { field, origin } => {
                self.push("ST_Distance(ST_Centroid(ST_Envelope(");
                self.field(field);
                self.push(")), ST_SetSRID(ST_MakePoint(");
                self.bind(origin.x(), "double precision");
                self.push(", ");
                self.bind(origin.y(), "double precision");
                let _ = write!(self.sql, "), {}))", self.layout.srid);
            }
        }
    }

    fn field(&mut self, field: &FieldRef) {
        match &field.storage {
            Storage::Column(column) => {
                let _ = write!(self.sql, "t.\"{}\"", column.replace('"', "\"\""));
                // String queryables may sit on numeric or date columns.
                if field.value_type == ValueType::String {
                    self.push("::text");
                }
            }
            Storage::Property(path) => {
                let path: Vec<String> = path.split('.').map(String::from).collect();
                match field.value_type {
                    ValueType::Geometry => {
                        self.push("ST_GeomFromGeoJSON((t.properties #> ");
                        self.bind(path, "text[]");
                        self.push(")::text)");
                    }
                    value_type => {
                        self.push("(t.properties #>> ");
                        self.bind(path, "text[]");
                        self.push(")");
                        match value_type {
                            ValueType::Number => self.push("::double precision"),
                            ValueType::Datetime => self.push("::timestamptz"),
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Null => self.push("NULL"),
            Literal::Bool(b) => self.bind(*b, "boolean"),
            Literal::Number(n) => self.bind(*n, "double precision"),
            Literal::Text(s) => self.bind(s.clone(), "text"),
            Literal::Timestamp(datetime) => self.bind(*datetime, "timestamptz"),
        }
    }

    fn order_by(&mut self, keys: &[SortKey]) {
        for (i, key) in keys.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            self.operand(&key.operand);
            self.push(match key.direction {
                Direction::Ascending => " ASC NULLS FIRST",
                Direction::Descending => " DESC NULLS LAST",
            });
        }
    }
}

//! The spatial and temporal clauses of a search.

use crate::{
    Bbox, Crs, Error, Interval, Predicate, Reproject, Result, predicate::FieldRef,
};
use geo::{Centroid, Geometry, Point};

/// The spatial parameter of a search.
#[derive(Debug, Clone, Copy)]
pub enum Spatial<'a> {
    /// A bounding box, 2D or 3D.
    Bbox(Bbox),

    /// A GeoJSON geometry.
    Intersects(&'a geojson::Geometry),
}

/// A compiled spatial parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialClause {
    /// An intersects predicate on the geometry field.
    pub predicate: Predicate,

    /// The centroid of the input geometry in the storage CRS, used to order
    /// results by distance.
    pub centroid: Option<Point>,
}

/// Builds the spatial clause of a search.
///
/// Three dimensional bboxes are reduced to their 2D projection. Inputs in
/// another CRS than the storage CRS are reprojected first.
///
/// # Examples
///
/// ```
/// use flyfoto::{Bbox, Crs, Queryables, TransverseMercator, spatial::{Spatial, spatial_clause}};
///
/// let clause = spatial_clause(
///     Spatial::Bbox(Bbox::new(9.0, 55.0, 10.0, 56.0)),
///     Crs::Crs84,
///     Crs::Crs84,
///     &TransverseMercator,
///     Queryables::skraafoto().geometry(),
/// )
/// .unwrap();
/// let centroid = clause.centroid.unwrap();
/// assert_eq!((centroid.x(), centroid.y()), (9.5, 55.5));
/// ```
pub fn spatial_clause(
    spatial: Spatial<'_>,
    input_crs: Crs,
    storage_crs: Crs,
    reprojector: &dyn Reproject,
    field: FieldRef,
) -> Result<SpatialClause> {
    let mut geometry = match spatial {
        Spatial::Bbox(bbox) => Geometry::Polygon(bbox.valid()?.to_polygon()),
        Spatial::Intersects(geometry) => {
            Geometry::try_from(geometry.clone()).map_err(|err| Error::Geojson(Box::new(err)))?
        }
    };
    reprojector.reproject(&mut geometry, input_crs, storage_crs)?;
    let centroid = geometry.centroid();
    tracing::debug!(?centroid, %input_crs, %storage_crs, "built spatial clause");
    Ok(SpatialClause {
        predicate: Predicate::Intersects { field, geometry },
        centroid,
    })
}

/// Builds the temporal clause of a search from its `datetime` parameter.
///
/// # Examples
///
/// ```
/// use flyfoto::{Queryables, spatial::temporal_clause};
///
/// let datetime = Queryables::skraafoto().datetime();
/// let _ = temporal_clause("2021-01-01T00:00:00Z/2021-12-31T23:59:59Z", datetime.clone()).unwrap();
/// let err = temporal_clause("../..", datetime).unwrap_err();
/// assert_eq!(err.to_string(), "Double open-ended intervals are not allowed.");
/// ```
pub fn temporal_clause(datetime: &str, field: FieldRef) -> Result<Predicate> {
    let interval: Interval = datetime.parse()?;
    Ok(interval.to_predicate(field))
}

//! Geometry reprojection between supported reference systems.

use crate::{Crs, Error, Result};
use geo::{Coord, Geometry, MapCoordsInPlace};
use std::fmt::Debug;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const GRS80_FLATTENING: f64 = 1.0 / 298.257_222_101;
const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;
const UTM_SCALE: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// Reprojects geometries from one CRS to another.
///
/// The engine uses this twice per request: once to bring input geometries
/// (bbox, intersects, filter literals) into the storage CRS, and once to
/// bring result footprints into the requested output CRS.
pub trait Reproject: Debug + Send + Sync {
    /// Reprojects a geometry in place.
    fn reproject(&self, geometry: &mut Geometry, from: Crs, to: Crs) -> Result<()>;

    /// Returns true if geometries can be reprojected to and from this CRS.
    fn supports(&self, crs: Crs) -> bool;
}

/// Transverse Mercator reprojection for UTM zones.
///
/// Supports CRS84 and the northern UTM zones of ETRS89 (`EPSG:258xx`) and WGS
/// 84 (`EPSG:326xx`), using the Krüger series to third order in `n`.
///
/// # Examples
///
/// ```
/// use flyfoto::{Crs, Reproject, TransverseMercator};
/// use geo::{Geometry, Point};
///
/// let mut geometry = Geometry::Point(Point::new(9.0, 56.0));
/// TransverseMercator
///     .reproject(&mut geometry, Crs::Crs84, Crs::ETRS89_UTM32N)
///     .unwrap();
/// let Geometry::Point(point) = geometry else { unreachable!() };
/// assert!((point.x() - 500_000.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TransverseMercator;

impl Reproject for TransverseMercator {
    fn reproject(&self, geometry: &mut Geometry, from: Crs, to: Crs) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let unsupported = || Error::UnsupportedReprojection { from, to };
        let source = Projection::from_crs(from).ok_or_else(unsupported)?;
        let target = Projection::from_crs(to).ok_or_else(unsupported)?;
        if let Projection::Utm(zone) = source {
            geometry.map_coords_in_place(|coord| zone.inverse(coord));
        }
        if let Projection::Utm(zone) = target {
            geometry.map_coords_in_place(|coord| zone.forward(coord));
        }
        Ok(())
    }

    fn supports(&self, crs: Crs) -> bool {
        Projection::from_crs(crs).is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Projection {
    Geographic,
    Utm(Zone),
}

impl Projection {
    fn from_crs(crs: Crs) -> Option<Projection> {
        match crs {
            Crs::Crs84 => Some(Projection::Geographic),
            Crs::Epsg(code @ 25828..=25838) => {
                Some(Projection::Utm(Zone::new(code - 25800, GRS80_FLATTENING)))
            }
            Crs::Epsg(code @ 32601..=32660) => {
                Some(Projection::Utm(Zone::new(code - 32600, WGS84_FLATTENING)))
            }
            Crs::Epsg(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Zone {
    central_meridian: f64,
    n: f64,
    radius: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl Zone {
    fn new(number: u32, flattening: f64) -> Zone {
        let n = flattening / (2.0 - flattening);
        let n2 = n * n;
        let n3 = n2 * n;
        Zone {
            central_meridian: (f64::from(number) * 6.0 - 183.0).to_radians(),
            n,
            radius: SEMI_MAJOR_AXIS / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    /// Longitude/latitude degrees to easting/northing metres.
    fn forward(&self, coord: Coord) -> Coord {
        let phi = coord.y.to_radians();
        let lambda = coord.x.to_radians() - self.central_meridian;
        let e = 2.0 * self.n.sqrt() / (1.0 + self.n);
        let t = (phi.sin().atanh() - e * (e * phi.sin()).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();
        let mut easting = eta_prime;
        let mut northing = xi_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            easting += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
            northing += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
        }
        Coord {
            x: UTM_FALSE_EASTING + UTM_SCALE * self.radius * easting,
            y: UTM_SCALE * self.radius * northing,
        }
    }

    /// Easting/northing metres to longitude/latitude degrees.
    fn inverse(&self, coord: Coord) -> Coord {
        let xi = coord.y / (UTM_SCALE * self.radius);
        let eta = (coord.x - UTM_FALSE_EASTING) / (UTM_SCALE * self.radius);
        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }
        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += delta * (k * chi).sin();
        }
        let lambda = self.central_meridian + eta_prime.sinh().atan2(xi_prime.cos());
        Coord {
            x: lambda.to_degrees(),
            y: phi.to_degrees(),
        }
    }
}

use crate::{Error, Result};
use geo::{Polygon, Rect, coord};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A bounding box.
///
/// Three dimensional boxes are accepted, but only their two dimensional
/// projection takes part in spatial filtering.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub enum Bbox {
    /// A two-dimensional bounding box: `[xmin, ymin, xmax, ymax]`.
    TwoDimensional([f64; 4]),

    /// A three-dimensional bounding box: `[xmin, ymin, zmin, xmax, ymax, zmax]`.
    ThreeDimensional([f64; 6]),
}

impl Bbox {
    /// Creates a new two-dimensional bbox.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Bbox;
    ///
    /// let bbox = Bbox::new(9.0, 55.0, 10.0, 56.0);
    /// ```
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Bbox {
        Bbox::TwoDimensional([xmin, ymin, xmax, ymax])
    }

    /// Returns the two-dimensional projection of this bbox.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Bbox;
    ///
    /// let bbox: Bbox = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].try_into().unwrap();
    /// assert_eq!(bbox.to_2d(), [1.0, 2.0, 4.0, 5.0]);
    /// ```
    pub fn to_2d(&self) -> [f64; 4] {
        match *self {
            Bbox::TwoDimensional(bbox) => bbox,
            Bbox::ThreeDimensional([xmin, ymin, _, xmax, ymax, _]) => [xmin, ymin, xmax, ymax],
        }
    }

    /// Returns an error if any minimum is greater than its maximum.
    ///
    /// Equal bounds are allowed (a degenerate box is a line or a point).
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Bbox;
    ///
    /// Bbox::new(9.0, 55.0, 9.0, 56.0).valid().unwrap();
    /// Bbox::new(10.0, 55.0, 9.0, 56.0).valid().unwrap_err();
    /// ```
    pub fn valid(self) -> Result<Bbox> {
        let [xmin, ymin, xmax, ymax] = self.to_2d();
        if xmin > xmax {
            Err(Error::BboxMinGreaterThanMax("longitude"))
        } else if ymin > ymax {
            Err(Error::BboxMinGreaterThanMax("latitude"))
        } else if let Bbox::ThreeDimensional([_, _, zmin, _, _, zmax]) = self
            && zmin > zmax
        {
            Err(Error::BboxMinGreaterThanMax("elevation"))
        } else {
            Ok(self)
        }
    }

    /// Returns this bbox's 2D projection as a polygon.
    pub fn to_polygon(&self) -> Polygon {
        let [xmin, ymin, xmax, ymax] = self.to_2d();
        Rect::new(coord! { x: xmin, y: ymin }, coord! { x: xmax, y: ymax }).to_polygon()
    }
}

impl TryFrom<Vec<f64>> for Bbox {
    type Error = Error;

    fn try_from(value: Vec<f64>) -> Result<Bbox> {
        if let Ok(bbox) = <[f64; 4]>::try_from(value.as_slice()) {
            Ok(Bbox::TwoDimensional(bbox))
        } else if let Ok(bbox) = <[f64; 6]>::try_from(value.as_slice()) {
            Ok(Bbox::ThreeDimensional(bbox))
        } else {
            Err(Error::InvalidBbox(value))
        }
    }
}

impl From<Bbox> for Vec<f64> {
    fn from(bbox: Bbox) -> Vec<f64> {
        match bbox {
            Bbox::TwoDimensional(bbox) => bbox.to_vec(),
            Bbox::ThreeDimensional(bbox) => bbox.to_vec(),
        }
    }
}

impl FromStr for Bbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Bbox> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidBbox(Vec::new()))?;
        values.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::Bbox;
    use crate::Error;

    #[test]
    fn from_str() {
        let bbox: Bbox = "8.0, 55.0,9.0,56.0".parse().unwrap();
        assert_eq!(bbox, Bbox::new(8.0, 55.0, 9.0, 56.0));
        let bbox: Bbox = "8,55,0,9,56,100".parse().unwrap();
        assert_eq!(bbox.to_2d(), [8.0, 55.0, 9.0, 56.0]);
        let _ = "8,55,9".parse::<Bbox>().unwrap_err();
        let _ = "8,55,9,a".parse::<Bbox>().unwrap_err();
    }

    #[test]
    fn min_greater_than_max() {
        let err = Bbox::new(11.0, 55.0, 10.0, 56.0).valid().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Maximum longitude must be greater than minimum longitude"
        );
        assert!(matches!(
            Bbox::new(10.0, 57.0, 11.0, 56.0).valid(),
            Err(Error::BboxMinGreaterThanMax("latitude"))
        ));
    }

    #[test]
    fn deserialize() {
        let bbox: Bbox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(bbox, Bbox::new(1.0, 2.0, 3.0, 4.0));
        let _ = serde_json::from_str::<Bbox>("[1, 2, 3]").unwrap_err();
    }
}

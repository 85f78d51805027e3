//! Coordinate reference system identifiers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// The OGC URI of WGS 84 longitude/latitude.
pub const CRS84_URI: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

/// The prefix of OGC URIs for EPSG codes.
pub const EPSG_URI_PREFIX: &str = "http://www.opengis.net/def/crs/EPSG/0/";

/// A coordinate reference system.
///
/// CRS values are accepted as OGC URIs or as `EPSG:<code>` shorthands, and
/// are always written back as OGC URIs.
///
/// # Examples
///
/// ```
/// use flyfoto::Crs;
///
/// let crs: Crs = "EPSG:25832".parse().unwrap();
/// assert_eq!(crs, Crs::ETRS89_UTM32N);
/// assert_eq!(crs.to_string(), "http://www.opengis.net/def/crs/EPSG/0/25832");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// WGS 84 with longitude/latitude axis order.
    Crs84,

    /// An EPSG code.
    Epsg(u32),
}

impl Crs {
    /// ETRS89 / UTM zone 32N, the projected CRS of Danish mapping data.
    pub const ETRS89_UTM32N: Crs = Crs::Epsg(25832);

    /// Returns this CRS's OGC URI.
    pub fn uri(&self) -> String {
        match self {
            Crs::Crs84 => CRS84_URI.to_string(),
            Crs::Epsg(code) => format!("{EPSG_URI_PREFIX}{code}"),
        }
    }

    /// Returns the spatial reference id used by PostGIS for this CRS.
    ///
    /// CRS84 shares its datum with EPSG:4326, and PostGIS stores
    /// longitude/latitude in both, so it maps to 4326.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Crs;
    ///
    /// assert_eq!(Crs::Crs84.srid(), 4326);
    /// assert_eq!(Crs::ETRS89_UTM32N.srid(), 25832);
    /// ```
    pub fn srid(&self) -> u32 {
        match self {
            Crs::Crs84 => 4326,
            Crs::Epsg(code) => *code,
        }
    }

    /// Resolves an optional request argument against a list of supported CRS.
    ///
    /// Returns `default` if the argument wasn't provided.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::Crs;
    ///
    /// let supported = [Crs::Crs84, Crs::ETRS89_UTM32N];
    /// let crs = Crs::resolve(Some("EPSG:25832"), "crs", &supported, Crs::Crs84).unwrap();
    /// assert_eq!(crs, Crs::ETRS89_UTM32N);
    /// let crs = Crs::resolve(None, "crs", &supported, Crs::Crs84).unwrap();
    /// assert_eq!(crs, Crs::Crs84);
    /// let _ = Crs::resolve(Some("EPSG:4326"), "crs", &supported, Crs::Crs84).unwrap_err();
    /// ```
    pub fn resolve(
        value: Option<&str>,
        argument: &'static str,
        supported: &[Crs],
        default: Crs,
    ) -> Result<Crs> {
        let Some(value) = value else {
            return Ok(default);
        };
        match value.parse::<Crs>() {
            Ok(crs) if supported.contains(&crs) => Ok(crs),
            _ => Err(Error::InvalidCrs {
                argument,
                value: value.to_string(),
                valid: supported.iter().map(Crs::uri).collect(),
            }),
        }
    }
}

impl FromStr for Crs {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Crs, String> {
        let s = s.trim();
        let https = s.replacen("https://", "http://", 1);
        if https == CRS84_URI || s.eq_ignore_ascii_case("OGC:CRS84") || s == "CRS84" {
            return Ok(Crs::Crs84);
        }
        let code = if let Some(code) = https.strip_prefix(EPSG_URI_PREFIX) {
            code
        } else if let Some((authority, code)) = s.split_once(':')
            && authority.eq_ignore_ascii_case("EPSG")
        {
            code
        } else {
            return Err(format!("unknown crs: {s}"));
        };
        code.parse::<u32>()
            .map(Crs::Epsg)
            .map_err(|_| format!("invalid EPSG code: {code}"))
    }
}

impl TryFrom<String> for Crs {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Crs, String> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> String {
        crs.uri()
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri())
    }
}

impl Default for Crs {
    fn default() -> Crs {
        Crs::Crs84
    }
}

#[cfg(test)]
mod tests {
    use super::Crs;
    use crate::{Error, ErrorKind};
    use rstest::rstest;

    #[rstest]
    #[case("http://www.opengis.net/def/crs/OGC/1.3/CRS84", Crs::Crs84)]
    #[case("https://www.opengis.net/def/crs/OGC/1.3/CRS84", Crs::Crs84)]
    #[case("OGC:CRS84", Crs::Crs84)]
    #[case("http://www.opengis.net/def/crs/EPSG/0/25832", Crs::Epsg(25832))]
    #[case("EPSG:25832", Crs::Epsg(25832))]
    #[case("epsg:4326", Crs::Epsg(4326))]
    fn parse(#[case] value: &str, #[case] expected: Crs) {
        assert_eq!(value.parse::<Crs>().unwrap(), expected);
    }

    #[rstest]
    #[case("EPSG:abc")]
    #[case("http://www.opengis.net/def/crs/EPSG/0/")]
    #[case("not a crs")]
    fn parse_invalid(#[case] value: &str) {
        let _ = value.parse::<Crs>().unwrap_err();
    }

    #[test]
    fn invalid_crs_lists_valid_options() {
        let err = Crs::resolve(
            Some("EPSG:3857"),
            "bbox-crs",
            &[Crs::Crs84, Crs::ETRS89_UTM32N],
            Crs::Crs84,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(err, Error::InvalidCrs { argument: "bbox-crs", .. }));
        assert_eq!(
            err.to_string(),
            "CRS provided for argument bbox-crs is invalid, valid options are: \
             http://www.opengis.net/def/crs/OGC/1.3/CRS84, \
             http://www.opengis.net/def/crs/EPSG/0/25832"
        );
    }

    #[test]
    fn serde() {
        let crs: Crs = serde_json::from_str("\"EPSG:25832\"").unwrap();
        assert_eq!(
            serde_json::to_string(&crs).unwrap(),
            "\"http://www.opengis.net/def/crs/EPSG/0/25832\""
        );
    }
}

use crate::{Crs, Error, Reproject, Result};
use serde::{Deserialize, Serialize};

/// The default page size.
pub const DEFAULT_LIMIT: u64 = 10;

/// The largest page size, larger limits are clamped to this.
pub const MAX_LIMIT: u64 = 10_000;

/// Search engine configuration.
///
/// # Examples
///
/// ```
/// use flyfoto::{Config, Crs};
///
/// let config: Config = serde_json::from_str(r#"{"max_limit": 1000, "cursor_policy": "lenient"}"#).unwrap();
/// assert_eq!(config.max_limit, 1000);
/// assert_eq!(config.default_limit, 10);
/// assert_eq!(config.storage_crs, Crs::Crs84);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The page size when a search has no limit.
    pub default_limit: u64,

    /// The largest page size.
    pub max_limit: u64,

    /// Whether searches count their matches.
    pub context: bool,

    /// The CRS of stored geometries.
    pub storage_crs: Crs,

    /// The CRSs accepted for `crs`, `bbox-crs`, and `filter-crs`.
    pub supported_crs: Vec<Crs>,

    /// What to do with unusable pagination tokens.
    pub cursor_policy: CursorPolicy,
}

/// What to do with a pagination token that can't be decoded, or that was
/// produced under a different sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorPolicy {
    /// Reject the request.
    #[default]
    Strict,

    /// Serve the first page and log a warning.
    Lenient,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            context: true,
            storage_crs: Crs::Crs84,
            supported_crs: vec![Crs::Crs84, Crs::ETRS89_UTM32N],
            cursor_policy: CursorPolicy::Strict,
        }
    }
}

impl Config {
    /// Checks that this configuration can be served with this reprojector.
    ///
    /// Limits must be positive, and the storage CRS and every supported CRS
    /// must be handled by `reprojector`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flyfoto::{Config, Crs, TransverseMercator};
    ///
    /// let mut config = Config::default();
    /// config.validate(&TransverseMercator).unwrap();
    /// config.supported_crs.push(Crs::Epsg(3857));
    /// assert!(config.validate(&TransverseMercator).is_err());
    /// ```
    pub fn validate(&self, reprojector: &dyn Reproject) -> Result<()> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(Error::InvalidConfig("limits must be positive".to_string()));
        }
        if let Some(crs) = std::iter::once(&self.storage_crs)
            .chain(&self.supported_crs)
            .find(|crs| !reprojector.supports(**crs))
        {
            return Err(Error::InvalidConfig(format!(
                "{} can't be reprojected",
                crs.uri()
            )));
        }
        Ok(())
    }
}

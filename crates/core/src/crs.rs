//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system of a raster or ROI geometry.
///
/// Stores an EPSG code when one is known and falls back to WKT for
/// projections GDAL reports without an authority code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crs {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl Crs {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get the EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get the WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check whether two CRS refer to the same reference system.
    ///
    /// EPSG codes are compared when both sides carry one; otherwise the WKT
    /// strings are compared verbatim, which can report false negatives for
    /// equivalent but differently-formatted definitions.
    pub fn is_equivalent(&self, other: &Crs) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Short string identifier for reports and error messages
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{code}");
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(40)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsg_identifier() {
        let crs = Crs::from_epsg(32619);
        assert_eq!(crs.epsg(), Some(32619));
        assert_eq!(crs.identifier(), "EPSG:32619");
    }

    #[test]
    fn equivalence_by_epsg() {
        assert!(Crs::from_epsg(4326).is_equivalent(&Crs::wgs84()));
        assert!(!Crs::from_epsg(4326).is_equivalent(&Crs::from_epsg(32619)));
    }

    #[test]
    fn wkt_only_compares_verbatim() {
        let a = Crs::from_wkt("PROJCS[\"X\"]");
        let b = Crs::from_wkt("PROJCS[\"X\"]");
        assert!(a.is_equivalent(&b));
    }
}

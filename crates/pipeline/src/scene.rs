//! Landsat scene identifier grammar
//!
//! Raw scene files follow the Collection-2 Level-2 product naming
//! convention:
//!
//! ```text
//! LXSS_LLLL_PPPRRR_YYYYMMDD_yyyymmdd_CC_TX_SX_BX.TIF
//! ```
//!
//! - `LXSS` — L (Landsat), sensor, satellite number
//! - `LLLL` — processing correction level (`L2SP` | `L2SR`)
//! - `PPPRRR` — WRS-2 path and row
//! - `YYYYMMDD` / `yyyymmdd` — acquisition / processing date
//! - `CC` — collection number
//! - `TX` — collection category (`RT` | `T1` | `T2`)
//! - `SX` — surface kind (`ST` surface temperature, `SR` surface
//!   reflectance)
//! - `BX` — band code (`B2`, `B10`, `QA_AEROSOL`, ...)
//!
//! Parsing produces a validated [`BandFile`]; formatting a parsed value
//! reproduces the input string exactly (parse/format bijection).

use crate::error::{Error, Result};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static BAND_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    const DATE: &str = r"(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])";
    Regex::new(&format!(
        r"(?x)^
        (?P<satellite>L[COTEM]\d{{2}})_
        (?P<level>L2SP|L2SR)_
        (?P<path>\d{{3}})(?P<row>\d{{3}})_
        (?P<acq>{DATE})_
        (?P<proc>{DATE})_
        (?P<coll>\d{{2}})_
        (?P<cat>RT|T1|T2)_
        (?P<surface>ST|SR)_
        (?P<band>[A-Z0-9_]+)
        \.TIF$"
    ))
    .expect("band filename regex is valid")
});

/// Processing correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrectionLevel {
    /// Level-2 Science Product (reflectance + temperature)
    L2SP,
    /// Level-2 Surface Reflectance only
    L2SR,
}

impl fmt::Display for CorrectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionLevel::L2SP => write!(f, "L2SP"),
            CorrectionLevel::L2SR => write!(f, "L2SR"),
        }
    }
}

/// Collection category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CollectionCategory {
    /// Real-time
    RT,
    /// Tier 1
    T1,
    /// Tier 2
    T2,
}

impl fmt::Display for CollectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionCategory::RT => write!(f, "RT"),
            CollectionCategory::T1 => write!(f, "T1"),
            CollectionCategory::T2 => write!(f, "T2"),
        }
    }
}

/// Surface kind of a band file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Surface {
    /// Surface temperature
    ST,
    /// Surface reflectance
    SR,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surface::ST => write!(f, "ST"),
            Surface::SR => write!(f, "SR"),
        }
    }
}

/// Parsed, validated Landsat scene identifier.
///
/// Identifies one acquisition; all band files of a scene share one
/// `SceneId`. Immutable once parsed. `Display` reconstructs the product
/// identifier string, which is also the tag-store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SceneId {
    /// Satellite code, e.g. `LC08`
    pub satellite: String,
    pub correction_level: CorrectionLevel,
    /// WRS-2 path (001-251)
    pub wrs_path: u16,
    /// WRS-2 row (001-248)
    pub wrs_row: u16,
    pub acquisition_date: NaiveDate,
    pub processing_date: NaiveDate,
    /// Collection number, e.g. 2
    pub collection_number: u8,
    pub collection_category: CollectionCategory,
}

impl SceneId {
    /// The product identifier string, used as the tag-store key
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// WRS path and row as the 6-digit `PPPRRR` string
    pub fn wrs(&self) -> String {
        format!("{:03}{:03}", self.wrs_path, self.wrs_row)
    }

    /// Acquisition year
    pub fn year(&self) -> i32 {
        self.acquisition_date.year()
    }

    /// Acquisition month as the zero-padded `"01"`..`"12"` string used by
    /// the catalog's missing-month bookkeeping
    pub fn month(&self) -> String {
        format!("{:02}", self.acquisition_date.month())
    }

    /// Acquisition date in compact `YYYYMMDD` form
    pub fn acquisition_compact(&self) -> String {
        self.acquisition_date.format("%Y%m%d").to_string()
    }

    /// File name of a derived product for this scene, e.g.
    /// `20130813_008067_NDSI.TIF`
    pub fn product_file_name(&self, suffix: &str) -> String {
        format!("{}_{}_{}.TIF", self.acquisition_compact(), self.wrs(), suffix)
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{:02}_{}",
            self.satellite,
            self.correction_level,
            self.wrs(),
            self.acquisition_date.format("%Y%m%d"),
            self.processing_date.format("%Y%m%d"),
            self.collection_number,
            self.collection_category,
        )
    }
}

/// One band raster file of a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandFile {
    pub scene: SceneId,
    pub surface: Surface,
    /// Band code, e.g. `B3`, `B10`, `QA_AEROSOL`
    pub band: String,
}

impl BandFile {
    /// Parse a raw scene file name.
    ///
    /// Fails with [`Error::Parse`] naming the offending file for anything
    /// that does not match the grammar, including calendar-invalid dates
    /// that pass the shape check.
    pub fn parse(filename: &str) -> Result<Self> {
        let caps = BAND_FILE_RE
            .captures(filename)
            .ok_or_else(|| Error::Parse {
                filename: filename.to_string(),
                reason: "does not match the Landsat Collection-2 naming convention".to_string(),
            })?;

        let parse_date = |name: &str| -> Result<NaiveDate> {
            NaiveDate::parse_from_str(&caps[name], "%Y%m%d").map_err(|_| Error::Parse {
                filename: filename.to_string(),
                reason: format!("invalid calendar date {:?}", &caps[name]),
            })
        };

        let correction_level = match &caps["level"] {
            "L2SP" => CorrectionLevel::L2SP,
            _ => CorrectionLevel::L2SR,
        };
        let collection_category = match &caps["cat"] {
            "RT" => CollectionCategory::RT,
            "T1" => CollectionCategory::T1,
            _ => CollectionCategory::T2,
        };
        let surface = match &caps["surface"] {
            "ST" => Surface::ST,
            _ => Surface::SR,
        };

        Ok(Self {
            scene: SceneId {
                satellite: caps["satellite"].to_string(),
                correction_level,
                wrs_path: caps["path"].parse().expect("three digits"),
                wrs_row: caps["row"].parse().expect("three digits"),
                acquisition_date: parse_date("acq")?,
                processing_date: parse_date("proc")?,
                collection_number: caps["coll"].parse().expect("two digits"),
                collection_category,
            },
            surface,
            band: caps["band"].to_string(),
        })
    }

    /// The raw file name this band was parsed from
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.TIF", self.scene, self.surface, self.band)
    }

    /// Combined surface/band key as listed in the catalog, e.g. `SR_B3`
    pub fn band_key(&self) -> String {
        format!("{}_{}", self.surface, self.band)
    }

    /// File name of this band after ROI clipping, e.g.
    /// `20130813_008067_SR_B3_CROPPED.TIF`
    pub fn clipped_file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_CROPPED.TIF",
            self.scene.acquisition_compact(),
            self.scene.wrs(),
            self.surface,
            self.band,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "LC08_L2SP_008067_20130813_20200912_02_T1_ST_B10.TIF";

    #[test]
    fn parse_well_formed_name() {
        let band = BandFile::parse(NAME).unwrap();
        assert_eq!(band.scene.satellite, "LC08");
        assert_eq!(band.scene.correction_level, CorrectionLevel::L2SP);
        assert_eq!(band.scene.wrs_path, 8);
        assert_eq!(band.scene.wrs_row, 67);
        assert_eq!(
            band.scene.acquisition_date,
            NaiveDate::from_ymd_opt(2013, 8, 13).unwrap()
        );
        assert_eq!(band.scene.collection_number, 2);
        assert_eq!(band.scene.collection_category, CollectionCategory::T1);
        assert_eq!(band.surface, Surface::ST);
        assert_eq!(band.band, "B10");
    }

    #[test]
    fn parse_format_bijection() {
        for name in [
            NAME,
            "LC09_L2SR_231094_20220101_20220115_02_T2_SR_B2.TIF",
            "LE07_L2SP_008067_19990704_20200912_02_RT_SR_QA_AEROSOL.TIF",
        ] {
            let band = BandFile::parse(name).unwrap();
            assert_eq!(band.file_name(), name);
        }
    }

    #[test]
    fn scene_id_string() {
        let band = BandFile::parse(NAME).unwrap();
        assert_eq!(band.scene.id(), "LC08_L2SP_008067_20130813_20200912_02_T1");
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "random.TIF",
            "LC08_L2SP_008067_20130813_20200912_02_T1_ST_B10.tif", // lowercase extension
            "LX08_L2SP_008067_20130813_20200912_02_T1_ST_B10.TIF", // bad sensor letter
            "LC08_L3SP_008067_20130813_20200912_02_T1_ST_B10.TIF", // bad level
            "LC08_L2SP_08067_20130813_20200912_02_T1_ST_B10.TIF",  // short WRS
            "LC08_L2SP_008067_20131341_20200912_02_T1_ST_B10.TIF", // month 13
        ] {
            assert!(BandFile::parse(name).is_err(), "{name} should not parse");
        }
    }

    #[test]
    fn rejects_calendar_invalid_date() {
        // Shape-valid but not a real date
        let err =
            BandFile::parse("LC08_L2SP_008067_20130230_20200912_02_T1_ST_B10.TIF").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn derived_names_follow_convention() {
        let band = BandFile::parse(NAME).unwrap();
        assert_eq!(band.clipped_file_name(), "20130813_008067_ST_B10_CROPPED.TIF");
        assert_eq!(band.band_key(), "ST_B10");
        assert_eq!(
            band.scene.product_file_name("NDSI"),
            "20130813_008067_NDSI.TIF"
        );
    }
}

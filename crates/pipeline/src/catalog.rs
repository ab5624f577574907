//! Scene catalog builder
//!
//! Scans a directory of raw scene files, parses every file name into its
//! [`BandFile`] components and organizes the result by acquisition year:
//! which satellites and collections were seen, which scenes exist with
//! which bands, and which calendar months have no acquisition at all.
//!
//! The catalog is a derived reporting artifact: every build regenerates it
//! from scratch, nothing is merged with a previous run. Pipeline state
//! lives in the tag store, not here.

use crate::error::{Error, Result};
use crate::scene::{BandFile, SceneId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Thermal-band calibration constants for one satellite.
///
/// `radiance_mult`/`radiance_add` convert digital numbers to top-of-
/// atmosphere spectral radiance; `k1`/`k2` are the sensor response
/// constants of the logarithmic brightness-temperature inversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalCalibration {
    pub radiance_mult: f64,
    pub radiance_add: f64,
    pub k1: f64,
    pub k2: f64,
}

/// Calibration constants for the thermal band of a satellite, by satellite
/// code. Values from the USGS Landsat handbooks (TIRS band 10 for
/// Landsat 8/9, band 6 for the older missions).
pub fn thermal_calibration(satellite: &str) -> Option<ThermalCalibration> {
    match satellite {
        "LC08" | "LC09" => Some(ThermalCalibration {
            radiance_mult: 3.3420e-4,
            radiance_add: 0.1,
            k1: 774.8853,
            k2: 1321.0789,
        }),
        "LE07" => Some(ThermalCalibration {
            radiance_mult: 0.067087,
            radiance_add: -0.06709,
            k1: 666.09,
            k2: 1282.71,
        }),
        "LT05" => Some(ThermalCalibration {
            radiance_mult: 0.055375,
            radiance_add: 1.18243,
            k1: 607.76,
            k2: 1260.56,
        }),
        "LT04" => Some(ThermalCalibration {
            radiance_mult: 0.055158,
            radiance_add: 1.2378,
            k1: 671.62,
            k2: 1284.30,
        }),
        _ => None,
    }
}

/// One catalogued scene: identifier, available bands, calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene: SceneId,
    /// Sorted surface/band keys, e.g. `["SR_B2", "SR_B3", "ST_B10"]`
    pub bands: Vec<String>,
    /// Thermal calibration resolved from the satellite code; `None` when
    /// the satellite is not in the constants table
    pub calibration: Option<ThermalCalibration>,
}

impl SceneRecord {
    /// Reconstruct the band file for a catalogued band key
    pub fn band_file(&self, band_key: &str) -> Option<BandFile> {
        if !self.bands.iter().any(|b| b == band_key) {
            return None;
        }
        let (surface, band) = band_key.split_once('_')?;
        let surface = match surface {
            "ST" => crate::scene::Surface::ST,
            "SR" => crate::scene::Surface::SR,
            _ => return None,
        };
        Some(BandFile {
            scene: self.scene.clone(),
            surface,
            band: band.to_string(),
        })
    }

    /// Find a band by its bare code (`B3`, `B10`), whatever its surface kind
    pub fn band_with_code(&self, code: &str) -> Option<BandFile> {
        let suffix = format!("_{code}");
        let key = self.bands.iter().find(|b| b.ends_with(&suffix))?;
        self.band_file(key)
    }
}

/// All scenes of one acquisition year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub satellites: BTreeSet<String>,
    pub correction_levels: BTreeSet<String>,
    pub collection_numbers: BTreeSet<String>,
    pub collection_categories: BTreeSet<String>,
    /// Scene records ordered by acquisition date
    pub scenes: Vec<SceneRecord>,
    /// Calendar months (`"01"`..`"12"`) with zero acquisitions, ascending
    pub missing_months: Vec<String>,
}

const ALL_MONTHS: [&str; 12] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
];

/// The scene catalog: one entry per acquisition year
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub years: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from raw scene file names.
    ///
    /// Names that do not match the scene grammar are excluded from the
    /// catalog and returned alongside it for the report; they never abort
    /// the build.
    pub fn build<I, S>(filenames: I) -> (Catalog, Vec<(String, Error)>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_scene: BTreeMap<SceneId, BTreeSet<String>> = BTreeMap::new();
        let mut malformed = Vec::new();

        for filename in filenames {
            let filename = filename.as_ref();
            match BandFile::parse(filename) {
                Ok(band) => {
                    by_scene
                        .entry(band.scene.clone())
                        .or_default()
                        .insert(band.band_key());
                }
                Err(err) => {
                    warn!(filename, %err, "excluding malformed scene file");
                    malformed.push((filename.to_string(), err));
                }
            }
        }

        let mut years: BTreeMap<String, CatalogEntry> = BTreeMap::new();
        for (scene, bands) in by_scene {
            let entry = years.entry(scene.year().to_string()).or_default();
            entry.satellites.insert(scene.satellite.clone());
            entry
                .correction_levels
                .insert(scene.correction_level.to_string());
            entry
                .collection_numbers
                .insert(format!("{:02}", scene.collection_number));
            entry
                .collection_categories
                .insert(scene.collection_category.to_string());
            entry.scenes.push(SceneRecord {
                calibration: thermal_calibration(&scene.satellite),
                scene,
                bands: bands.into_iter().collect(),
            });
        }

        for entry in years.values_mut() {
            entry
                .scenes
                .sort_by(|a, b| a.scene.acquisition_date.cmp(&b.scene.acquisition_date));
            let present: BTreeSet<String> =
                entry.scenes.iter().map(|r| r.scene.month()).collect();
            entry.missing_months = ALL_MONTHS
                .iter()
                .filter(|m| !present.contains(**m))
                .map(|m| m.to_string())
                .collect();
        }

        debug!(
            years = years.len(),
            malformed = malformed.len(),
            "catalog built"
        );
        (Catalog { years }, malformed)
    }

    /// Iterate over all scene records, oldest year first
    pub fn scenes(&self) -> impl Iterator<Item = &SceneRecord> {
        self.years.values().flat_map(|entry| entry.scenes.iter())
    }

    /// Total number of catalogued scenes
    pub fn scene_count(&self) -> usize {
        self.years.values().map(|e| e.scenes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Load a catalog document written by [`Catalog::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the catalog document, replacing any previous one
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

/// List raw scene file names (`.TIF`) in a directory
pub fn scan_raw_directory(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", dir.display())))?
    {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(".TIF") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Render the human-readable catalog report
pub fn text_report(catalog: &Catalog, malformed: &[(String, Error)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scene catalog — {} scenes", catalog.scene_count());

    for (year, entry) in &catalog.years {
        let _ = writeln!(out);
        let _ = writeln!(out, "== {year} ==");
        let _ = writeln!(
            out,
            "satellites: {}",
            entry.satellites.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        let _ = writeln!(
            out,
            "correction levels: {} | collections: {} ({})",
            entry
                .correction_levels
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            entry
                .collection_numbers
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            entry
                .collection_categories
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        );
        for record in &entry.scenes {
            let _ = writeln!(
                out,
                "  {} — {} band(s): {}",
                record.scene,
                record.bands.len(),
                record.bands.join(", ")
            );
        }
        let _ = writeln!(out, "missing months: {}", entry.missing_months.join(", "));
    }

    if !malformed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "== Excluded files ==");
        for (name, err) in malformed {
            let _ = writeln!(out, "  {name}: {err}");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band_name(date: &str, band: &str) -> String {
        format!("LC08_L2SP_008067_{date}_20200912_02_T1_{band}.TIF")
    }

    #[test]
    fn groups_bands_by_scene_and_year() {
        let (catalog, malformed) = Catalog::build([
            band_name("20130813", "ST_B10"),
            band_name("20130813", "SR_B3"),
            band_name("20130902", "SR_B3"),
        ]);

        assert!(malformed.is_empty());
        assert_eq!(catalog.years.len(), 1);
        let entry = &catalog.years["2013"];
        assert_eq!(entry.scenes.len(), 2);
        assert_eq!(entry.scenes[0].bands, vec!["SR_B3", "ST_B10"]);
        assert_eq!(entry.scenes[1].bands, vec!["SR_B3"]);
        assert_eq!(entry.satellites.len(), 1);
        assert!(entry.satellites.contains("LC08"));
    }

    #[test]
    fn missing_months_for_three_acquisitions() {
        let (catalog, _) = Catalog::build([
            band_name("20130315", "ST_B10"),
            band_name("20130704", "ST_B10"),
            band_name("20131120", "ST_B10"),
        ]);

        let entry = &catalog.years["2013"];
        assert_eq!(
            entry.missing_months,
            vec!["01", "02", "04", "05", "06", "08", "09", "10", "12"]
        );
    }

    #[test]
    fn two_scene_year_missing_all_but_august_september() {
        let (catalog, _) = Catalog::build([
            band_name("20130813", "ST_B10"),
            band_name("20130902", "ST_B10"),
        ]);

        let entry = &catalog.years["2013"];
        let expected: Vec<String> = ["01", "02", "03", "04", "05", "06", "07", "10", "11", "12"]
            .iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(entry.missing_months, expected);
    }

    #[test]
    fn malformed_names_are_logged_not_fatal() {
        let (catalog, malformed) = Catalog::build([
            band_name("20130813", "ST_B10"),
            "notascene.TIF".to_string(),
        ]);

        assert_eq!(catalog.scene_count(), 1);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].0, "notascene.TIF");
    }

    #[test]
    fn calibration_resolved_per_satellite() {
        let (catalog, _) = Catalog::build([band_name("20130813", "ST_B10")]);
        let record = catalog.scenes().next().unwrap();
        let cal = record.calibration.unwrap();
        assert!((cal.k1 - 774.8853).abs() < 1e-4);

        assert!(thermal_calibration("LM01").is_none());
    }

    #[test]
    fn build_is_pure_and_regenerates_fully() {
        let names = [
            band_name("20130813", "ST_B10"),
            band_name("20130902", "SR_B3"),
        ];
        let (a, _) = Catalog::build(names.clone());
        let (b, _) = Catalog::build(names);
        assert_eq!(a, b);
    }

    #[test]
    fn band_lookup_by_code() {
        let (catalog, _) = Catalog::build([
            band_name("20130813", "ST_B10"),
            band_name("20130813", "SR_B3"),
        ]);
        let record = catalog.scenes().next().unwrap();

        let b3 = record.band_with_code("B3").unwrap();
        assert_eq!(b3.band_key(), "SR_B3");
        let b10 = record.band_with_code("B10").unwrap();
        assert_eq!(b10.band_key(), "ST_B10");
        assert!(record.band_with_code("B7").is_none());
    }

    #[test]
    fn report_lists_scenes_and_exclusions() {
        let (catalog, malformed) = Catalog::build([
            band_name("20130813", "ST_B10"),
            "junk.TIF".to_string(),
        ]);
        let report = text_report(&catalog, &malformed);
        assert!(report.contains("== 2013 =="));
        assert!(report.contains("LC08_L2SP_008067_20130813_20200912_02_T1"));
        assert!(report.contains("junk.TIF"));
    }
}

//! Pipeline configuration
//!
//! Directory layout, band codes and calibration constants. Defaults mirror
//! a conventional `dataset/` tree next to the working directory; a YAML
//! file can override any subset of fields.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the dataset tree
    pub dataset_dir: PathBuf,
    /// ROI polygon, GeoJSON
    pub roi_file: PathBuf,
    /// EPSG code of the ROI coordinates
    pub roi_epsg: u32,

    /// Resample clipped bands to this cell size; `None` keeps the native
    /// resolution
    pub target_resolution: Option<f64>,
    /// NDSI cutoff for the binary snow mask
    pub ndsi_threshold: f64,
    /// Collection-2 Level-2 reflectance calibration
    pub reflectance_scale: f64,
    pub reflectance_offset: f64,
    /// Surface emissivity for the temperature correction; `None` yields
    /// brightness temperature
    pub emissivity: Option<f64>,
    /// Nodata sentinel written into clipped bands (Landsat fill DN)
    pub clip_nodata: f64,

    /// Band codes per product role
    pub green_band: String,
    pub swir_band: String,
    pub thermal_band: String,
    pub red_band: String,
    pub blue_band: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_dir: PathBuf::from("dataset"),
            roi_file: PathBuf::from("roi/roi.geojson"),
            roi_epsg: 4326,
            target_resolution: None,
            ndsi_threshold: 0.4,
            reflectance_scale: 2.75e-5,
            reflectance_offset: -0.2,
            emissivity: None,
            clip_nodata: 0.0,
            green_band: "B3".to_string(),
            swir_band: "B6".to_string(),
            thermal_band: "B10".to_string(),
            red_band: "B4".to_string(),
            blue_band: "B2".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read config {}: {e}", path.display())))?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Raw scene directory
    pub fn original_dir(&self) -> PathBuf {
        self.dataset_dir.join("original")
    }

    /// Clipped band directory
    pub fn clipped_dir(&self) -> PathBuf {
        self.dataset_dir.join("roi_clipped")
    }

    pub fn ndsi_dir(&self) -> PathBuf {
        self.dataset_dir.join("roi_clipped_ndsi")
    }

    pub fn binary_dir(&self) -> PathBuf {
        self.dataset_dir.join("roi_clipped_binary")
    }

    pub fn color_dir(&self) -> PathBuf {
        self.dataset_dir.join("roi_clipped_color")
    }

    pub fn temperature_dir(&self) -> PathBuf {
        self.dataset_dir.join("roi_clipped_temperature")
    }

    /// Catalog document
    pub fn catalog_file(&self) -> PathBuf {
        self.dataset_dir.join("scene_catalog.json")
    }

    /// Human-readable catalog report
    pub fn report_file(&self) -> PathBuf {
        self.dataset_dir.join("scene_catalog_report.txt")
    }

    /// Tag store document
    pub fn tags_file(&self) -> PathBuf {
        self.dataset_dir.join("scene_tags.json")
    }

    /// Global temperature min/max across scenes, for the visualization
    /// layer
    pub fn temperature_boundaries_file(&self) -> PathBuf {
        self.dataset_dir.join("temperature_roi_boundaries.txt")
    }
}

//! Pipeline error taxonomy
//!
//! Per-scene errors (`Parse`, `SpatialMismatch`, `EmptyRoi`,
//! `CalibrationMissing`, `MissingBand`) are caught at the scene boundary
//! inside a stage and recorded in the stage report; they never abort a
//! batch. The remaining variants are configuration-level and fatal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed scene identifier {filename:?}: {reason}")]
    Parse { filename: String, reason: String },

    #[error("raster does not intersect the ROI: {detail}")]
    SpatialMismatch { detail: String },

    #[error("no valid pixels inside the ROI")]
    EmptyRoi,

    #[error("no thermal calibration constants for satellite {satellite}")]
    CalibrationMissing { satellite: String },

    #[error("scene {scene} is missing required band {band}")]
    MissingBand { scene: String, band: String },

    #[error("invalid ROI geometry: {0}")]
    Geometry(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] nivis_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

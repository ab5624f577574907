//! # nivis pipeline
//!
//! Staged, metadata-driven processing of a multi-year Landsat Collection-2
//! Level-2 archive over one fixed region of interest.
//!
//! The pipeline is a set of independently invocable stages over a directory
//! of raw scenes:
//!
//! 1. **catalog** — parse scene identifiers, group by acquisition year,
//!    detect months without acquisitions, resolve thermal calibration
//!    constants ([`catalog`])
//! 2. **clip** — reduce every band raster to the ROI's grid ([`clip`])
//! 3. **band algebra** — surface temperature, NDSI, true color, binary snow
//!    mask ([`products`])
//! 4. **zonal statistics** — mean ROI temperature, snow-cover percentage
//!    ([`stats`])
//!
//! Stage progress and scalar results live in the [`tags`] store, one record
//! per scene; a stage skips scenes whose record already carries its fields,
//! which makes every stage idempotent and resumable.

mod maybe_rayon;

pub mod catalog;
pub mod clip;
pub mod config;
pub mod error;
pub mod products;
pub mod roi;
pub mod scene;
pub mod stage;
pub mod stats;
pub mod tags;

pub use config::Config;
pub use error::{Error, Result};
pub use scene::{BandFile, SceneId};
pub use tags::{TagRecord, TagStore};

//! Stage orchestration
//!
//! Each pipeline stage iterates its scene set sequentially, driven by what
//! the tag store already records: scenes whose record carries the stage's
//! fields are skipped, per-scene errors are caught at the scene boundary
//! and collected into the stage report, and the tag store is merged and
//! persisted after every scene so an interrupted run resumes where it
//! stopped.
//!
//! Only configuration-level failures — unreadable ROI, corrupt tag
//! document, missing catalog — abort a stage before any scene is
//! processed.

use crate::catalog::{scan_raw_directory, text_report, Catalog, SceneRecord};
use crate::clip::{clip_band_to_grid, output_grid, roi_in_band_crs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::products::{
    binary_mask, ndsi, surface_temperature, true_color, TemperatureParams, TrueColorParams,
    MASK_SNOW,
};
use crate::roi::Roi;
use crate::scene::BandFile;
use crate::stats::{class_percentage, mean_valid, min_max_valid};
use crate::tags::{TagRecord, TagStore};
use nivis_core::io::{read_geotiff, write_geotiff, write_rgb_geotiff};
use nivis_core::Raster;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Per-stage summary: which scenes succeeded, were skipped, or failed,
/// with reasons. Failures make the CLI exit nonzero; the detail lives
/// here, not in the exit code.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: &'static str,
    pub succeeded: Vec<String>,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
}

impl StageReport {
    fn new(stage: &'static str) -> Self {
        Self {
            stage,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn ok(&mut self, scene: String) {
        self.succeeded.push(scene);
    }

    fn skip(&mut self, scene: String, reason: impl Into<String>) {
        self.skipped.push((scene, reason.into()));
    }

    fn fail(&mut self, scene: String, err: &Error) {
        warn!(stage = self.stage, scene = %scene, %err, "scene failed");
        self.failed.push((scene, err.to_string()));
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "stage '{}': {} succeeded, {} skipped, {} failed",
            self.stage,
            self.succeeded.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        for (scene, reason) in &self.skipped {
            writeln!(f, "  skipped {scene}: {reason}")?;
        }
        for (scene, reason) in &self.failed {
            writeln!(f, "  failed {scene}: {reason}")?;
        }
        Ok(())
    }
}

fn load_catalog(config: &Config) -> Result<Catalog> {
    let path = config.catalog_file();
    if !path.exists() {
        return Err(Error::Config(format!(
            "catalog {} not found, run the catalog stage first",
            path.display()
        )));
    }
    Catalog::load(&path)
}

fn read_clipped_band(config: &Config, band: &BandFile) -> Result<Raster<f64>> {
    let path = config.clipped_dir().join(band.clipped_file_name());
    if !path.exists() {
        return Err(Error::MissingBand {
            scene: band.scene.id(),
            band: band.band_key(),
        });
    }
    Ok(read_geotiff(&path, None)?)
}

fn require_band(record: &SceneRecord, code: &str) -> Result<BandFile> {
    record
        .band_with_code(code)
        .ok_or_else(|| Error::MissingBand {
            scene: record.scene.id(),
            band: code.to_string(),
        })
}

/// Build the scene catalog and its report.
///
/// Fully regenerates both artifacts; malformed file names are recorded as
/// failures in the stage report and in the text report, but never abort
/// the scan. An entirely empty dataset is a configuration error.
pub fn run_catalog(config: &Config) -> Result<StageReport> {
    let mut report = StageReport::new("catalog");

    let filenames = scan_raw_directory(&config.original_dir())?;
    if filenames.is_empty() {
        return Err(Error::Config(format!(
            "no raw scenes in {}; expected Landsat Collection-2 .TIF files",
            config.original_dir().display()
        )));
    }

    let (catalog, malformed) = Catalog::build(&filenames);
    fs::create_dir_all(&config.dataset_dir)?;
    catalog.save(&config.catalog_file())?;
    fs::write(config.report_file(), text_report(&catalog, &malformed))?;

    for record in catalog.scenes() {
        report.ok(record.scene.id());
    }
    for (filename, err) in &malformed {
        report.failed.push((filename.clone(), err.to_string()));
    }

    info!(
        scenes = catalog.scene_count(),
        years = catalog.years.len(),
        malformed = malformed.len(),
        "catalog written"
    );
    Ok(report)
}

/// Clip every band of every catalogued scene to the ROI grid.
pub fn run_clip(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    let mut report = StageReport::new("clip");
    let catalog = load_catalog(config)?;
    let roi = Roi::from_geojson_file(&config.roi_file, config.roi_epsg)?;
    fs::create_dir_all(config.clipped_dir())?;

    for record in catalog.scenes() {
        let scene_id = record.scene.id();

        if store.get(&scene_id).and_then(|t| t.clipped) == Some(true) {
            report.skip(scene_id, "already clipped");
            continue;
        }

        match clip_scene(config, record, &roi) {
            Ok(()) => {
                store.merge(
                    &scene_id,
                    &TagRecord {
                        clipped: Some(true),
                        ..TagRecord::default()
                    },
                );
                store.persist()?;
                report.ok(scene_id);
            }
            Err(err) => report.fail(scene_id, &err),
        }
    }

    Ok(report)
}

fn clip_scene(config: &Config, record: &SceneRecord, roi: &Roi) -> Result<()> {
    let mut grid = None;
    let mut roi_native = None;

    for band_key in &record.bands {
        let band_file = record
            .band_file(band_key)
            .ok_or_else(|| Error::MissingBand {
                scene: record.scene.id(),
                band: band_key.clone(),
            })?;
        let path = config.original_dir().join(band_file.file_name());
        let raster: Raster<f64> = read_geotiff(&path, None)?;

        // The first band fixes the scene's output grid; every other band
        // is sampled onto it so the spatial-alignment invariant holds.
        if grid.is_none() {
            let reprojected = roi_in_band_crs(roi, raster.crs())?;
            grid = Some(output_grid(&raster, &reprojected, config.target_resolution)?);
            roi_native = Some(reprojected);
        }
        let grid = grid.as_ref().expect("grid set above");
        let roi_native = roi_native.as_ref().expect("set with grid");

        let clipped = clip_band_to_grid(&raster, grid, roi_native, config.clip_nodata)?;
        let out_path = config.clipped_dir().join(band_file.clipped_file_name());
        write_geotiff(&clipped, &out_path, None)?;
    }

    Ok(())
}

/// Shared loop of the product and statistics stages: iterate catalogued
/// scenes, honor tag-store skip conditions, run the body, merge the
/// returned tag update, persist.
fn run_over_catalog(
    stage: &'static str,
    config: &Config,
    store: &mut dyn TagStore,
    already_done: impl Fn(&TagRecord) -> bool,
    mut body: impl FnMut(&SceneRecord) -> Result<TagRecord>,
) -> Result<StageReport> {
    let mut report = StageReport::new(stage);
    let catalog = load_catalog(config)?;

    for record in catalog.scenes() {
        let scene_id = record.scene.id();
        let tags = store.get(&scene_id).cloned().unwrap_or_default();

        if already_done(&tags) {
            report.skip(scene_id, "already processed");
            continue;
        }
        if tags.clipped != Some(true) {
            report.skip(scene_id, "scene not clipped yet");
            continue;
        }

        match body(record) {
            Ok(update) => {
                store.merge(&scene_id, &update);
                store.persist()?;
                report.ok(scene_id);
            }
            Err(err) => report.fail(scene_id, &err),
        }
    }

    Ok(report)
}

/// Write the NDSI raster product for every clipped scene.
pub fn run_ndsi(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    fs::create_dir_all(config.ndsi_dir())?;
    run_over_catalog(
        "ndsi",
        config,
        store,
        |t| t.ndsi_image == Some(true),
        |record| {
            let green = read_clipped_band(config, &require_band(record, &config.green_band)?)?;
            let swir = read_clipped_band(config, &require_band(record, &config.swir_band)?)?;
            let index = ndsi(&green, &swir)?;

            let path = config.ndsi_dir().join(record.scene.product_file_name("NDSI"));
            write_geotiff(&index, &path, None)?;
            Ok(TagRecord {
                ndsi_image: Some(true),
                ..TagRecord::default()
            })
        },
    )
}

/// Write the binary snow mask product for every clipped scene.
pub fn run_binary(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    fs::create_dir_all(config.binary_dir())?;
    run_over_catalog(
        "binary",
        config,
        store,
        |t| t.binary_mask == Some(true),
        |record| {
            let green = read_clipped_band(config, &require_band(record, &config.green_band)?)?;
            let swir = read_clipped_band(config, &require_band(record, &config.swir_band)?)?;
            let index = ndsi(&green, &swir)?;
            let mask = binary_mask(&index, config.ndsi_threshold)?;

            let path = config
                .binary_dir()
                .join(record.scene.product_file_name("BINARY"));
            write_geotiff(&mask, &path, None)?;
            Ok(TagRecord {
                binary_mask: Some(true),
                ..TagRecord::default()
            })
        },
    )
}

/// Write the true-color composite for every clipped scene.
pub fn run_true_color(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    fs::create_dir_all(config.color_dir())?;
    let params = TrueColorParams {
        reflectance_scale: config.reflectance_scale,
        reflectance_offset: config.reflectance_offset,
    };
    run_over_catalog(
        "true-color",
        config,
        store,
        |t| t.true_color == Some(true),
        move |record| {
            let red = read_clipped_band(config, &require_band(record, &config.red_band)?)?;
            let green = read_clipped_band(config, &require_band(record, &config.green_band)?)?;
            let blue = read_clipped_band(config, &require_band(record, &config.blue_band)?)?;
            let image = true_color(&red, &green, &blue, &params)?;

            let path = config
                .color_dir()
                .join(record.scene.product_file_name("COLOR"));
            write_rgb_geotiff(&image.red, &image.green, &image.blue, &path, None)?;
            Ok(TagRecord {
                true_color: Some(true),
                ..TagRecord::default()
            })
        },
    )
}

fn scene_temperature(config: &Config, record: &SceneRecord) -> Result<Raster<f64>> {
    let calibration = record.calibration.ok_or_else(|| Error::CalibrationMissing {
        satellite: record.scene.satellite.clone(),
    })?;
    let thermal = read_clipped_band(config, &require_band(record, &config.thermal_band)?)?;
    surface_temperature(
        &thermal,
        &TemperatureParams {
            calibration,
            emissivity: config.emissivity,
        },
    )
}

/// Write the surface-temperature raster product for every clipped scene.
pub fn run_temperature_image(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    fs::create_dir_all(config.temperature_dir())?;
    run_over_catalog(
        "temperature-image",
        config,
        store,
        |t| t.temperature_image == Some(true),
        |record| {
            let temperature = scene_temperature(config, record)?;
            let path = config
                .temperature_dir()
                .join(record.scene.product_file_name("TEMPERATURE"));
            write_geotiff(&temperature, &path, None)?;
            Ok(TagRecord {
                temperature_image: Some(true),
                ..TagRecord::default()
            })
        },
    )
}

/// Compute the mean ROI temperature per scene and maintain the global
/// min/max boundaries file.
pub fn run_temperature_stats(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    let boundaries_path = config.temperature_boundaries_file();
    let mut boundaries = read_boundaries(&boundaries_path);

    let report = run_over_catalog(
        "temperature-stats",
        config,
        store,
        |t| t.temperature_roi.is_some(),
        |record| {
            let temperature = scene_temperature(config, record)?;
            let mean = mean_valid(&temperature)?;
            let (min, max) = min_max_valid(&temperature)?;
            boundaries = Some(match boundaries {
                Some((lo, hi)) => (lo.min(min), hi.max(max)),
                None => (min, max),
            });

            Ok(TagRecord {
                temperature_roi: Some((mean * 100.0).round() / 100.0),
                ..TagRecord::default()
            })
        },
    )?;

    if let Some((min, max)) = boundaries {
        fs::write(
            &boundaries_path,
            format!("temperature_roi_min: {min}, temperature_roi_max: {max}"),
        )?;
    }
    Ok(report)
}

fn read_boundaries(path: &Path) -> Option<(f64, f64)> {
    let text = fs::read_to_string(path).ok()?;
    let mut min = None;
    let mut max = None;
    for part in text.split(',') {
        let (key, value) = part.split_once(':')?;
        match key.trim() {
            "temperature_roi_min" => min = value.trim().parse().ok(),
            "temperature_roi_max" => max = value.trim().parse().ok(),
            _ => {}
        }
    }
    Some((min?, max?))
}

/// Compute the snow-cover percentage per scene from its binary mask
/// product.
pub fn run_snow_stats(config: &Config, store: &mut dyn TagStore) -> Result<StageReport> {
    run_over_catalog(
        "snow-stats",
        config,
        store,
        |t| t.snow_cover_per.is_some(),
        |record| {
            let path = config
                .binary_dir()
                .join(record.scene.product_file_name("BINARY"));
            if !path.exists() {
                return Err(Error::MissingBand {
                    scene: record.scene.id(),
                    band: "BINARY".to_string(),
                });
            }
            let mask: Raster<u8> = read_geotiff(&path, None)?;
            let percentage = class_percentage(&mask, MASK_SNOW)?;

            Ok(TagRecord {
                snow_cover_per: Some(percentage),
                ..TagRecord::default()
            })
        },
    )
}

//! Per-scene tag store
//!
//! One [`TagRecord`] per scene identifier tracks which stages have run and
//! carries the scalar results they produced. The record is a plain struct
//! with one `Option` field per tag — not an open-ended map — so the
//! additive-merge invariant is visible in the type: merging can only fill
//! or overwrite fields, never remove them.
//!
//! The store is the pipeline's checkpoint. Stages merge and persist after
//! every scene, so a run interrupted after K of N scenes leaves exactly K
//! records updated, and re-running the stage skips those K.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tags accumulated for one scene across pipeline stages.
///
/// Every field is optional; absence means the owning stage has not run for
/// this scene yet. `has_clouds` is the one exogenous field — it is entered
/// manually, never computed, and must survive any pipeline re-run
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    /// All bands of the scene were clipped to the ROI grid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clipped: Option<bool>,

    /// NDSI raster product written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndsi_image: Option<bool>,

    /// Binary snow mask product written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_mask: Option<bool>,

    /// True-color composite written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_color: Option<bool>,

    /// Temperature raster product written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_image: Option<bool>,

    /// Mean surface temperature over the ROI, °C
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_roi: Option<f64>,

    /// Snow-cover percentage of the ROI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snow_cover_per: Option<f64>,

    /// Manual cloud flag, set outside the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_clouds: Option<bool>,
}

impl TagRecord {
    /// Non-destructive union: fields set in `update` overwrite, fields
    /// absent in `update` are preserved.
    pub fn merge(&mut self, update: &TagRecord) {
        macro_rules! take {
            ($field:ident) => {
                if update.$field.is_some() {
                    self.$field = update.$field;
                }
            };
        }
        take!(clipped);
        take!(ndsi_image);
        take!(binary_mask);
        take!(true_color);
        take!(temperature_image);
        take!(temperature_roi);
        take!(snow_cover_per);
        take!(has_clouds);
    }
}

/// Capability the stages require from a tag store: lookup, additive merge,
/// persistence. Injected so stages can run against [`MemoryTagStore`] in
/// tests without touching disk.
pub trait TagStore {
    fn get(&self, scene_id: &str) -> Option<&TagRecord>;

    /// Merge `update` into the record for `scene_id`, creating the record
    /// if it does not exist.
    fn merge(&mut self, scene_id: &str, update: &TagRecord);

    /// Write the current state to the backing document
    fn persist(&mut self) -> Result<()>;

    fn records(&self) -> &BTreeMap<String, TagRecord>;
}

/// In-memory store for tests; `persist` is a no-op
#[derive(Debug, Default)]
pub struct MemoryTagStore {
    records: BTreeMap<String, TagRecord>,
}

impl TagStore for MemoryTagStore {
    fn get(&self, scene_id: &str) -> Option<&TagRecord> {
        self.records.get(scene_id)
    }

    fn merge(&mut self, scene_id: &str, update: &TagRecord) {
        self.records
            .entry(scene_id.to_string())
            .or_default()
            .merge(update);
    }

    fn persist(&mut self) -> Result<()> {
        Ok(())
    }

    fn records(&self) -> &BTreeMap<String, TagRecord> {
        &self.records
    }
}

/// File-backed store: one JSON document keyed by scene identifier covering
/// all scenes, loaded fully at open and rewritten atomically on persist.
#[derive(Debug)]
pub struct JsonTagStore {
    path: PathBuf,
    records: BTreeMap<String, TagRecord>,
}

impl JsonTagStore {
    /// Open the tag document.
    ///
    /// A missing file yields an empty store; an unparseable document is a
    /// fatal configuration error — stages abort before touching any scene
    /// rather than risk clobbering manually entered tags.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                Error::Config(format!(
                    "tag store {} is corrupt: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = records.len(), "tag store opened");
        Ok(Self { path, records })
    }
}

impl TagStore for JsonTagStore {
    fn get(&self, scene_id: &str) -> Option<&TagRecord> {
        self.records.get(scene_id)
    }

    fn merge(&mut self, scene_id: &str, update: &TagRecord) {
        self.records
            .entry(scene_id.to_string())
            .or_default()
            .merge(update);
    }

    fn persist(&mut self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.records)?;
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        // Write-then-rename so an interrupted persist never truncates the
        // previous document.
        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(text.as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn records(&self) -> &BTreeMap<String, TagRecord> {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_update(temp: f64) -> TagRecord {
        TagRecord {
            temperature_roi: Some(temp),
            ..TagRecord::default()
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let mut record = TagRecord::default();
        record.merge(&stats_update(12.5));
        let once = record.clone();
        record.merge(&stats_update(12.5));
        assert_eq!(record, once);
    }

    #[test]
    fn merge_is_associative() {
        let a = TagRecord {
            clipped: Some(true),
            ..TagRecord::default()
        };
        let b = stats_update(5.0);
        let c = TagRecord {
            snow_cover_per: Some(41.0),
            temperature_roi: Some(6.0),
            ..TagRecord::default()
        };

        let mut ab_c = a.clone();
        ab_c.merge(&b);
        ab_c.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut a_bc = a.clone();
        a_bc.merge(&bc);

        assert_eq!(ab_c, a_bc);
    }

    #[test]
    fn disjoint_merges_commute() {
        let clip = TagRecord {
            clipped: Some(true),
            ..TagRecord::default()
        };
        let stats = stats_update(3.25);

        let mut ab = TagRecord::default();
        ab.merge(&clip);
        ab.merge(&stats);

        let mut ba = TagRecord::default();
        ba.merge(&stats);
        ba.merge(&clip);

        assert_eq!(ab, ba);
        assert_eq!(ab.clipped, Some(true));
        assert_eq!(ab.temperature_roi, Some(3.25));
    }

    #[test]
    fn merge_never_removes_fields() {
        let mut record = TagRecord {
            has_clouds: Some(true),
            temperature_roi: Some(-4.0),
            ..TagRecord::default()
        };

        record.merge(&TagRecord {
            snow_cover_per: Some(88.1),
            ..TagRecord::default()
        });

        // The manual cloud flag and the earlier stage's field both survive
        assert_eq!(record.has_clouds, Some(true));
        assert_eq!(record.temperature_roi, Some(-4.0));
        assert_eq!(record.snow_cover_per, Some(88.1));
    }

    #[test]
    fn overlapping_field_takes_new_value() {
        let mut record = stats_update(10.0);
        record.merge(&stats_update(11.0));
        assert_eq!(record.temperature_roi, Some(11.0));
    }

    #[test]
    fn json_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");

        let mut store = JsonTagStore::open(&path).unwrap();
        store.merge("SCENE_A", &stats_update(1.5));
        store.merge(
            "SCENE_A",
            &TagRecord {
                has_clouds: Some(false),
                ..TagRecord::default()
            },
        );
        store.persist().unwrap();

        let reopened = JsonTagStore::open(&path).unwrap();
        let record = reopened.get("SCENE_A").unwrap();
        assert_eq!(record.temperature_roi, Some(1.5));
        assert_eq!(record.has_clouds, Some(false));
        assert!(record.clipped.is_none());
    }

    #[test]
    fn missing_document_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonTagStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.records().is_empty());
    }

    #[test]
    fn corrupt_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonTagStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn absent_fields_stay_out_of_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");

        let mut store = JsonTagStore::open(&path).unwrap();
        store.merge("SCENE_A", &stats_update(7.0));
        store.persist().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("temperature_roi"));
        assert!(!text.contains("snow_cover_per"));
    }

    #[test]
    fn interrupted_batch_keeps_earlier_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");

        // First "run" persists after each of two scenes, then stops
        let mut store = JsonTagStore::open(&path).unwrap();
        store.merge("SCENE_A", &stats_update(1.0));
        store.persist().unwrap();
        store.merge("SCENE_B", &stats_update(2.0));
        store.persist().unwrap();
        drop(store);

        let reopened = JsonTagStore::open(&path).unwrap();
        assert_eq!(reopened.records().len(), 2);
        assert_eq!(reopened.get("SCENE_B").unwrap().temperature_roi, Some(2.0));
    }
}

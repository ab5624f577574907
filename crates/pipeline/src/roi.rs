//! Region-of-interest geometry
//!
//! The ROI is a fixed polygon (or multipolygon) read from a GeoJSON file,
//! together with the CRS its coordinates are expressed in. The clipper
//! tests pixel centers against the polygon itself, not just its bounding
//! box.

use crate::error::{Error, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo_types::{Geometry, MultiPolygon, Point};
use nivis_core::Crs;
use std::fs;
use std::path::Path;

/// The region of interest all products are computed over
#[derive(Debug, Clone)]
pub struct Roi {
    geometry: MultiPolygon<f64>,
    crs: Crs,
}

impl Roi {
    pub fn new(geometry: MultiPolygon<f64>, crs: Crs) -> Self {
        Self { geometry, crs }
    }

    /// Read the ROI from a GeoJSON file.
    ///
    /// All polygonal geometries in the document are collected; anything
    /// else (points, lines) is rejected. `epsg` names the CRS the
    /// coordinates are in.
    pub fn from_geojson_file(path: &Path, epsg: u32) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read ROI {}: {e}", path.display())))?;
        Self::from_geojson_str(&text, epsg)
    }

    /// Parse the ROI from GeoJSON text
    pub fn from_geojson_str(text: &str, epsg: u32) -> Result<Self> {
        let geojson: geojson::GeoJson = text
            .parse()
            .map_err(|e| Error::Geometry(format!("invalid GeoJSON: {e}")))?;

        let mut polygons = Vec::new();
        collect_polygons(&geojson, &mut polygons)?;
        if polygons.is_empty() {
            return Err(Error::Geometry(
                "ROI file contains no polygon geometry".to_string(),
            ));
        }

        Ok(Self::new(MultiPolygon(polygons), Crs::from_epsg(epsg)))
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of the ROI
    pub fn bounds(&self) -> Result<(f64, f64, f64, f64)> {
        let rect = self
            .geometry
            .bounding_rect()
            .ok_or_else(|| Error::Geometry("ROI has an empty bounding box".to_string()))?;
        Ok((rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Whether a point lies inside the ROI polygon
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&Point::new(x, y))
    }

    /// Reproject the ROI geometry into a target CRS.
    ///
    /// Available with the `gdal` feature; the clipper calls this when a
    /// raster's CRS differs from the ROI's.
    #[cfg(feature = "gdal")]
    pub fn transformed_to(&self, target: &Crs) -> Result<Roi> {
        use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};

        fn spatial_ref(crs: &Crs) -> Result<SpatialRef> {
            let srs = if let Some(epsg) = crs.epsg() {
                SpatialRef::from_epsg(epsg)
            } else if let Some(wkt) = crs.wkt() {
                SpatialRef::from_wkt(wkt)
            } else {
                return Err(Error::Geometry("CRS without EPSG or WKT".to_string()));
            }
            .map_err(|e| Error::Geometry(e.to_string()))?;
            srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
            Ok(srs)
        }

        if self.crs.is_equivalent(target) {
            return Ok(self.clone());
        }

        let src = spatial_ref(&self.crs)?;
        let dst = spatial_ref(target)?;
        let transform =
            CoordTransform::new(&src, &dst).map_err(|e| Error::Geometry(e.to_string()))?;

        let mut polygons = Vec::with_capacity(self.geometry.0.len());
        for polygon in &self.geometry.0 {
            let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
            for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
                let mut xs: Vec<f64> = ring.coords().map(|c| c.x).collect();
                let mut ys: Vec<f64> = ring.coords().map(|c| c.y).collect();
                let mut zs = vec![0.0; xs.len()];
                transform
                    .transform_coords(&mut xs, &mut ys, &mut zs)
                    .map_err(|e| Error::Geometry(e.to_string()))?;
                rings.push(geo_types::LineString::from(
                    xs.into_iter().zip(ys).collect::<Vec<(f64, f64)>>(),
                ));
            }
            let exterior = rings.remove(0);
            polygons.push(geo_types::Polygon::new(exterior, rings));
        }

        Ok(Roi::new(MultiPolygon(polygons), target.clone()))
    }
}

fn collect_polygons(
    geojson: &geojson::GeoJson,
    out: &mut Vec<geo_types::Polygon<f64>>,
) -> Result<()> {
    match geojson {
        geojson::GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(geometry) = &feature.geometry {
                    push_geometry(geometry, out)?;
                }
            }
        }
        geojson::GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                push_geometry(geometry, out)?;
            }
        }
        geojson::GeoJson::Geometry(geometry) => push_geometry(geometry, out)?,
    }
    Ok(())
}

fn push_geometry(
    geometry: &geojson::Geometry,
    out: &mut Vec<geo_types::Polygon<f64>>,
) -> Result<()> {
    let geometry: Geometry<f64> = (&geometry.value)
        .try_into()
        .map_err(|e| Error::Geometry(format!("unsupported GeoJSON geometry: {e}")))?;
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        other => {
            return Err(Error::Geometry(format!(
                "ROI must be polygonal, found {other:?}"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[10.0, 10.0], [30.0, 10.0], [30.0, 30.0], [10.0, 30.0], [10.0, 10.0]]]
            }
        }]
    }"#;

    #[test]
    fn parses_polygon_feature_collection() {
        let roi = Roi::from_geojson_str(SQUARE, 32619).unwrap();
        assert_eq!(roi.crs().epsg(), Some(32619));
        assert_eq!(roi.bounds().unwrap(), (10.0, 10.0, 30.0, 30.0));
    }

    #[test]
    fn containment_tests_polygon_not_bbox() {
        let roi = Roi::from_geojson_str(SQUARE, 32619).unwrap();
        assert!(roi.contains(20.0, 20.0));
        assert!(!roi.contains(5.0, 20.0));
        assert!(!roi.contains(31.0, 31.0));
    }

    #[test]
    fn rejects_non_polygonal_roi() {
        let point = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(Roi::from_geojson_str(point, 4326).is_err());
    }

    #[test]
    fn rejects_empty_document() {
        let empty = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(Roi::from_geojson_str(empty, 4326).is_err());
    }
}

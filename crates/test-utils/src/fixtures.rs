//! Common test fixtures for parcelviz tests.
//!
//! A small square parcel in geographic coordinates, a matching source
//! configuration and helpers for writing it to a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};

use parcel_common::{CrsCode, Geometry, LayerConfig, ParcelRecord};
use projection::{buffered_extent, Extent};

/// Identifier of the fixture parcel.
pub const SAMPLE_APN: &str = "123-456-789";

pub const SAMPLE_ADDRESS: &str = "100 Main St, Raleigh, NC";

pub const SAMPLE_COUNTY: &str = "Wake";

/// South-west corner of the fixture parcel (lon, lat).
pub const SAMPLE_ORIGIN: (f64, f64) = (-78.64, 35.78);

/// Side length of the fixture parcel in degrees (roughly 110 m).
pub const SAMPLE_SIDE_DEG: f64 = 0.001;

/// Closed square ring starting at `SAMPLE_ORIGIN`.
pub fn square_geometry() -> Geometry {
    let (x, y) = SAMPLE_ORIGIN;
    let d = SAMPLE_SIDE_DEG;
    Geometry::polygon(vec![[x, y], [x, y + d], [x + d, y + d], [x + d, y], [x, y]])
}

/// The fixture parcel as an EPSG:4326 record.
pub fn square_parcel() -> ParcelRecord {
    parcel_with_apn(SAMPLE_APN)
}

pub fn parcel_with_apn(apn: &str) -> ParcelRecord {
    ParcelRecord::new(
        apn,
        Some(SAMPLE_ADDRESS.to_string()),
        Some(SAMPLE_COUNTY.to_string()),
        square_geometry(),
        CrsCode::WGS84,
    )
    .expect("fixture parcel is valid")
}

/// Buffered extent of the fixture parcel in `target`.
pub fn sample_extent(target: CrsCode, buffer_feet: f64) -> Extent {
    buffered_extent(&square_geometry(), CrsCode::WGS84, target, buffer_feet)
        .expect("fixture extent is computable")
        .1
}

pub fn layer_config(name: &str, layer_type: &str) -> LayerConfig {
    LayerConfig::new(name, layer_type, CrsCode::WGS84)
}

/// Source configuration wired to the stub adapter types.
///
/// Layers:
/// - `zoning`: type `arcgis_feature` pointing at an unreachable host
/// - `empty`: `stub_empty`, zero features
/// - `buildings`: `stub_vector`, three features
/// - `aerial`: `stub_raster` in Web Mercator
/// - `broken`: `stub_failing`
/// - `unregistered`: a type no registry knows
pub const SAMPLE_SOURCES_YAML: &str = r##"
default_crs: 4326
buffer_feet: 200
cache:
  path: cache/http_cache.sqlite
  expire_after: 86400
map:
  width_px: 320
  height_px: 240
  dpi: 220
parcels:
  provider: arcgis
  url: https://gis.example.com/arcgis/rest/services/Parcels/FeatureServer/0
  id_field: PIN
  address_field: SITE_ADDR
layers:
  zoning:
    type: arcgis_feature
    title: Zoning Districts
    url: http://127.0.0.1:9/arcgis/rest/services/Zoning/FeatureServer/0
    out_fields: ZONE_CLASS
    style:
      fill_color: "#f4a582"
      line_width: 1.0
  empty:
    type: stub_empty
  buildings:
    type: stub_vector
    style:
      color: "#888888"
  aerial:
    type: stub_raster
    target_epsg: 3857
    title: Aerial Imagery
    style:
      opacity: 0.8
  broken:
    type: stub_failing
  unregistered:
    type: vector_tiles
"##;

/// Write `contents` as `sources.yaml` under `dir`.
pub fn write_sources(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("sources.yaml");
    fs::write(&path, contents).expect("write fixture config");
    path
}

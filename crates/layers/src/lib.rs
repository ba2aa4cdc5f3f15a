//! Layer data sources for parcel map rendering.
//!
//! Each configured layer is served by an adapter selected by its type tag:
//! - `arcgis_feature`: vector features from an ArcGIS FeatureServer query
//! - `wms`: raster imagery from an OGC WMS GetMap request

pub mod adapter;
pub mod feature;
pub mod registry;
pub mod wms;

pub use adapter::{build_client, AdapterContext, LayerAdapter, LayerData, FETCH_TIMEOUT};
pub use feature::ArcGisFeatureAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry, AdapterRegistryBuilder};
pub use wms::WmsAdapter;

//! In-process layer adapters for exercising the pipeline without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use layers::{AdapterContext, AdapterRegistry, AdapterRegistryBuilder, LayerAdapter, LayerData};
use parcel_common::{
    Feature, FeatureCollection, Geometry, LayerConfig, ParcelVizError, ParcelVizResult,
};
use projection::Extent;
use serde_json::json;

pub const STUB_VECTOR: &str = "stub_vector";
pub const STUB_EMPTY: &str = "stub_empty";
pub const STUB_RASTER: &str = "stub_raster";
pub const STUB_FAILING: &str = "stub_failing";
pub const STUB_DELAYED: &str = "stub_delayed";

/// Shared record of the order in which fetches finished.
pub type CompletionLog = Arc<Mutex<Vec<String>>>;

/// Returns `count` rectangles tiled across the requested extent.
pub struct StubVectorAdapter {
    name: String,
    count: usize,
    calls: Arc<AtomicUsize>,
}

impl StubVectorAdapter {
    pub fn new(name: impl Into<String>, count: usize) -> Self {
        Self {
            name: name.into(),
            count,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shares a fetch counter with the caller.
    pub fn with_counter(mut self, calls: Arc<AtomicUsize>) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl LayerAdapter for StubVectorAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        extent: &Extent,
        _image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = extent.width() / self.count.max(1) as f64;
        let features = (0..self.count)
            .map(|i| {
                let x0 = extent.min_x() + step * i as f64;
                let bbox = parcel_common::BoundingBox::new(
                    x0,
                    extent.min_y(),
                    x0 + step * 0.8,
                    extent.min_y() + extent.height() * 0.5,
                );
                let mut feature = Feature::new(Geometry::rectangle(&bbox));
                feature.id = Some(json!(i));
                feature
            })
            .collect();

        Ok(LayerData::Vector {
            features: FeatureCollection::new(features),
            crs: extent.crs(),
        })
    }
}

/// Returns a solid image at the requested size.
pub struct StubRasterAdapter {
    name: String,
    color: [u8; 4],
}

impl StubRasterAdapter {
    pub fn new(name: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }
}

#[async_trait]
impl LayerAdapter for StubRasterAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _extent: &Extent,
        image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        let (width, height) = image_size.unwrap_or((64, 64));
        Ok(LayerData::Raster(RgbaImage::from_pixel(
            width.max(1),
            height.max(1),
            Rgba(self.color),
        )))
    }
}

/// Always fails with an adapter response error.
pub struct FailingAdapter {
    name: String,
    message: String,
}

impl FailingAdapter {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl LayerAdapter for FailingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        _extent: &Extent,
        _image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        Err(ParcelVizError::AdapterResponse(self.message.clone()))
    }
}

/// Sleeps for `delay`, logs its name, then returns one feature.
///
/// Registered as `stub_delayed`; the delay comes from the layer's
/// `delay_ms` parameter.
pub struct DelayedAdapter {
    inner: StubVectorAdapter,
    delay: Duration,
    log: CompletionLog,
}

impl DelayedAdapter {
    pub fn new(name: impl Into<String>, delay: Duration, log: CompletionLog) -> Self {
        Self {
            inner: StubVectorAdapter::new(name, 1),
            delay,
            log,
        }
    }
}

#[async_trait]
impl LayerAdapter for DelayedAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(
        &self,
        extent: &Extent,
        image_size: Option<(u32, u32)>,
    ) -> ParcelVizResult<LayerData> {
        tokio::time::sleep(self.delay).await;
        self.log
            .lock()
            .expect("completion log poisoned")
            .push(self.inner.name().to_string());
        self.inner.fetch(extent, image_size).await
    }
}

fn context() -> AdapterContext {
    AdapterContext::with_client(Default::default(), None)
}

/// The built-in adapters plus every stub type.
pub fn stub_registry() -> AdapterRegistry {
    stub_registry_with_counter(Arc::new(AtomicUsize::new(0)))
}

/// Like [`stub_registry`], with `stub_delayed` layers writing to `log`.
pub fn stub_registry_with_log(log: CompletionLog) -> AdapterRegistry {
    stub_builder(Arc::new(AtomicUsize::new(0)))
        .register(STUB_DELAYED, move |config: &LayerConfig, _: &AdapterContext| {
            let delay_ms = config
                .param_str("delay_ms")
                .and_then(|ms| ms.parse::<u64>().ok())
                .unwrap_or(0);
            Ok(Box::new(DelayedAdapter::new(
                &config.name,
                Duration::from_millis(delay_ms),
                log.clone(),
            )))
        })
        .build()
}

/// Like [`stub_registry`], counting `stub_vector` and `stub_empty` fetches.
pub fn stub_registry_with_counter(calls: Arc<AtomicUsize>) -> AdapterRegistry {
    stub_builder(calls).build()
}

fn stub_builder(calls: Arc<AtomicUsize>) -> AdapterRegistryBuilder {
    let vector_calls = calls.clone();
    let empty_calls = calls;

    AdapterRegistry::builder(context())
        .register(layers::ArcGisFeatureAdapter::TYPE, |config, ctx| {
            Ok(Box::new(layers::ArcGisFeatureAdapter::new(config, ctx)?))
        })
        .register(layers::WmsAdapter::TYPE, |config, ctx| {
            Ok(Box::new(layers::WmsAdapter::new(config, ctx)?))
        })
        .register(STUB_VECTOR, move |config: &LayerConfig, _: &AdapterContext| {
            Ok(Box::new(
                StubVectorAdapter::new(&config.name, 3).with_counter(vector_calls.clone()),
            ))
        })
        .register(STUB_EMPTY, move |config: &LayerConfig, _: &AdapterContext| {
            Ok(Box::new(
                StubVectorAdapter::new(&config.name, 0).with_counter(empty_calls.clone()),
            ))
        })
        .register(STUB_RASTER, |config: &LayerConfig, _: &AdapterContext| {
            Ok(Box::new(StubRasterAdapter::new(&config.name, [30, 120, 60, 255])))
        })
        .register(STUB_FAILING, |config: &LayerConfig, _: &AdapterContext| {
            Ok(Box::new(FailingAdapter::new(&config.name, "upstream service unavailable")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_extent;
    use parcel_common::CrsCode;

    #[tokio::test]
    async fn test_stub_vector_counts_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = StubVectorAdapter::new("buildings", 3).with_counter(calls.clone());
        let data = adapter
            .fetch(&sample_extent(CrsCode::WGS84, 100.0), None)
            .await
            .unwrap();
        assert_eq!(data.feature_count(), Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delayed_adapter_logs_completion() {
        let log = CompletionLog::default();
        let adapter = DelayedAdapter::new("slow", Duration::from_millis(5), log.clone());
        let data = adapter
            .fetch(&sample_extent(CrsCode::WGS84, 100.0), None)
            .await
            .unwrap();
        assert_eq!(data.feature_count(), Some(1));
        assert_eq!(*log.lock().unwrap(), vec!["slow".to_string()]);
    }

    #[test]
    fn test_stub_registry_types() {
        let registry = stub_registry();
        assert!(registry.contains(STUB_FAILING));
        assert!(registry.contains("arcgis_feature"));
        assert!(!registry.contains("vector_tiles"));
    }
}

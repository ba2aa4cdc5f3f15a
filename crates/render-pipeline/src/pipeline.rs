//! Render pipeline orchestration.
//!
//! A request is validated, its parcel resolved, then every requested layer is
//! rendered independently: extent, adapter, fetch, composition. A failing
//! layer is replaced by a placeholder image and a warning; only validation and
//! resolution failures abort the whole request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use layers::{AdapterContext, AdapterRegistry, LayerData};
use metrics::{counter, histogram};
use parcel_common::{
    Feature, FeatureCollection, Geometry, ImageMap, LayerConfig, LayerResult, ParcelRecord,
    ParcelVizError, ParcelVizResult, RenderRequest, RenderResponse,
};
use projection::{buffered_extent_with, BuiltinReprojector, Extent, Reprojector};
use renderer::{compose_placeholder, compose_raster, compose_vector, FigureSpec};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{load_source_config, SourceConfig};
use crate::output::OutputStore;
use crate::resolver::{GeocodeService, ParcelResolver};
use crate::settings::AppSettings;

/// What happened to one requested layer.
#[derive(Debug)]
pub enum LayerOutcome {
    /// Composed from real data
    Rendered(LayerResult),
    /// A placeholder was written in place of the layer
    Failed {
        result: LayerResult,
        error: ParcelVizError,
    },
    /// No configuration exists for the layer; nothing was written
    Skipped { layer: String, reason: String },
}

impl LayerOutcome {
    pub fn layer_name(&self) -> &str {
        match self {
            LayerOutcome::Rendered(result) | LayerOutcome::Failed { result, .. } => &result.name,
            LayerOutcome::Skipped { layer, .. } => layer,
        }
    }

    /// The result entry, absent for skipped layers.
    pub fn result(&self) -> Option<&LayerResult> {
        match self {
            LayerOutcome::Rendered(result) | LayerOutcome::Failed { result, .. } => Some(result),
            LayerOutcome::Skipped { .. } => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LayerOutcome::Rendered(_) => "rendered",
            LayerOutcome::Failed { .. } => "failed",
            LayerOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// A completed run: the resolved parcel and per-layer outcomes in request order.
#[derive(Debug)]
pub struct PipelineRun {
    pub parcel: ParcelRecord,
    pub outcomes: Vec<LayerOutcome>,
}

/// High-level orchestrator translating requests into rendered outputs.
///
/// Everything it holds is read-only and shared, so one pipeline serves
/// concurrent requests.
#[derive(Clone)]
pub struct RenderPipeline {
    settings: Arc<AppSettings>,
    config: Arc<SourceConfig>,
    registry: Arc<AdapterRegistry>,
    resolver: Arc<dyn ParcelResolver>,
    reprojector: Arc<dyn Reprojector>,
    store: OutputStore,
}

impl RenderPipeline {
    pub fn new(
        settings: AppSettings,
        config: SourceConfig,
        registry: AdapterRegistry,
        resolver: Arc<dyn ParcelResolver>,
    ) -> Self {
        let store = OutputStore::new(settings.output_root.clone());
        Self {
            settings: Arc::new(settings),
            config: Arc::new(config),
            registry: Arc::new(registry),
            resolver,
            reprojector: Arc::new(BuiltinReprojector),
            store,
        }
    }

    /// Load the source config named by `settings` and wire up the default
    /// adapters and resolver backends.
    pub fn from_settings(settings: AppSettings) -> ParcelVizResult<Self> {
        let config = load_source_config(&settings.config_path)?;
        let registry =
            AdapterRegistry::with_defaults(AdapterContext::new(settings.arcgis_token.clone())?);
        let resolver =
            GeocodeService::from_settings(&settings, config.parcels(), config.default_crs())?;
        info!(
            layers = config.layers().len(),
            adapters = ?registry.types(),
            output_root = %settings.output_root.display(),
            "Render pipeline ready"
        );
        Ok(Self::new(settings, config, registry, Arc::new(resolver)))
    }

    /// Swap the reprojection engine.
    pub fn with_reprojector(mut self, reprojector: Arc<dyn Reprojector>) -> Self {
        self.reprojector = reprojector;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn output_store(&self) -> &OutputStore {
        &self.store
    }

    /// Execute the full render flow and aggregate the response.
    pub async fn render(&self, request: RenderRequest) -> ParcelVizResult<RenderResponse> {
        let run = self.execute(request).await?;
        Ok(self.aggregate(&run))
    }

    /// Execute the render flow, keeping per-layer outcomes.
    #[instrument(skip(self, request), fields(apn = ?request.apn, layers = request.layers.len()))]
    pub async fn execute(&self, request: RenderRequest) -> ParcelVizResult<PipelineRun> {
        let started = Instant::now();
        counter!("parcelviz_render_requests_total").increment(1);

        let request = request.validated()?;

        let parcel = match self
            .resolver
            .resolve(request.address.as_deref(), request.apn.as_deref())
            .await
        {
            Ok(parcel) => parcel,
            Err(e) => {
                counter!("parcelviz_resolution_failures_total").increment(1);
                warn!(error = %e, "Parcel resolution failed");
                return Err(e);
            }
        };
        info!(apn = %parcel.apn(), crs = %parcel.crs, "Resolved parcel");

        let parcel_dir = self.store.parcel_dir(&parcel).await?;

        // Boxed eagerly so the request future stays Send.
        let layer_jobs: Vec<BoxFuture<'_, LayerOutcome>> = request
            .layers
            .iter()
            .map(|layer| {
                self.render_layer(layer, &parcel, &request, &parcel_dir)
                    .boxed()
            })
            .collect();
        let outcomes: Vec<LayerOutcome> = stream::iter(layer_jobs)
            .buffered(self.settings.max_concurrent_layers.max(1))
            .collect()
            .await;

        for outcome in &outcomes {
            counter!("parcelviz_layers_total", "outcome" => outcome.label()).increment(1);
        }
        histogram!("parcelviz_render_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            rendered = outcomes
                .iter()
                .filter(|o| matches!(o, LayerOutcome::Rendered(_)))
                .count(),
            "Render complete"
        );

        Ok(PipelineRun { parcel, outcomes })
    }

    /// Build the response for a finished run.
    pub fn aggregate(&self, run: &PipelineRun) -> RenderResponse {
        let mut images = ImageMap::new();
        let mut warnings = Vec::new();
        for result in run.outcomes.iter().filter_map(LayerOutcome::result) {
            images.insert(result.name.clone(), self.store.public_url(&result.path));
            warnings.extend(result.warnings.iter().cloned());
        }

        RenderResponse {
            parcel: run.parcel.summary(),
            images,
            contact_sheet: None,
            created_at: Utc::now(),
            warnings,
        }
    }

    fn figure(&self, parcel: &ParcelRecord, layer: &LayerConfig, dpi: u32) -> FigureSpec {
        let map = self.config.map();
        FigureSpec::new(map.width_px, map.height_px, dpi)
            .with_title(format!("{} - {}", parcel.apn(), layer.display_title()))
    }

    #[instrument(skip_all, fields(layer = %name))]
    async fn render_layer(
        &self,
        name: &str,
        parcel: &ParcelRecord,
        request: &RenderRequest,
        parcel_dir: &Path,
    ) -> LayerOutcome {
        let config = match self.config.layer(name) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Skipping layer");
                return LayerOutcome::Skipped {
                    layer: name.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        let path = self.store.layer_path(parcel_dir, name);
        let figure = self.figure(parcel, config, request.output_dpi);

        match self
            .compose_layer(config, parcel, request.buffer_feet, &path, &figure)
            .await
        {
            Ok(warnings) => {
                debug!(path = %path.display(), "Layer rendered");
                let mut result = LayerResult::new(name, path, config.target_crs);
                result.warnings = warnings;
                LayerOutcome::Rendered(result)
            }
            Err(error) => {
                warn!(error = %error, "Layer failed, writing placeholder");
                let mut result = LayerResult::new(name, path.clone(), config.target_crs)
                    .with_warning(format!("Layer '{}' failed: {}", name, error));

                let message = format!("Layer '{}' unavailable:\n{}", config.display_title(), error);
                if let Err(placeholder_error) = write_placeholder(path, figure, message).await {
                    error!(error = %placeholder_error, "Placeholder render failed");
                    result.warnings.push(format!(
                        "Layer '{}' placeholder could not be written: {}",
                        name, placeholder_error
                    ));
                }
                LayerOutcome::Failed { result, error }
            }
        }
    }

    /// Extent, fetch and composition for one layer. Returns the layer's warnings.
    async fn compose_layer(
        &self,
        config: &LayerConfig,
        parcel: &ParcelRecord,
        buffer_feet: f64,
        path: &Path,
        figure: &FigureSpec,
    ) -> ParcelVizResult<Vec<String>> {
        let (outline, extent) = buffered_extent_with(
            self.reprojector.as_ref(),
            &parcel.geometry,
            parcel.crs,
            config.target_crs,
            buffer_feet,
        )?;

        let adapter = self.registry.build(config)?;
        let data = adapter
            .fetch(&extent, Some((figure.width, figure.height)))
            .await?;

        let mut warnings = Vec::new();
        if data.feature_count() == Some(0) {
            warnings.push(format!("Layer '{}': no features returned", config.name));
        }
        let data = self.align_to_extent(data, &extent)?;

        let path = path.to_path_buf();
        let figure = figure.clone();
        let style = config.style.clone();
        tokio::task::spawn_blocking(move || match data {
            LayerData::Vector { features, .. } => {
                compose_vector(&path, &figure, &extent, &outline, &features, &style)
            }
            LayerData::Raster(image) => {
                compose_raster(&path, &figure, &extent, &outline, &image, &style)
            }
        })
        .await
        .map_err(|e| ParcelVizError::Composition(format!("composition task failed: {}", e)))??;

        Ok(warnings)
    }

    /// Reproject vector features returned in a CRS other than the extent's.
    fn align_to_extent(&self, data: LayerData, extent: &Extent) -> ParcelVizResult<LayerData> {
        match data {
            LayerData::Vector { features, crs } if crs != extent.crs() => {
                debug!(from = %crs, to = %extent.crs(), "Reprojecting features");
                let features = features
                    .features
                    .into_iter()
                    .map(|feature| self.reproject_feature(feature, crs, extent))
                    .collect::<ParcelVizResult<Vec<_>>>()?;
                Ok(LayerData::Vector {
                    features: FeatureCollection::new(features),
                    crs: extent.crs(),
                })
            }
            other => Ok(other),
        }
    }

    fn reproject_feature(
        &self,
        mut feature: Feature,
        from: parcel_common::CrsCode,
        extent: &Extent,
    ) -> ParcelVizResult<Feature> {
        feature.geometry = feature
            .geometry
            .as_ref()
            .map(|g: &Geometry| self.reprojector.reproject(g, from, extent.crs()))
            .transpose()?;
        Ok(feature)
    }
}

async fn write_placeholder(
    path: PathBuf,
    figure: FigureSpec,
    message: String,
) -> ParcelVizResult<()> {
    tokio::task::spawn_blocking(move || compose_placeholder(&path, &figure, &message))
        .await
        .map_err(|e| ParcelVizError::Composition(format!("placeholder task failed: {}", e)))?
}

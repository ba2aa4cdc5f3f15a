//! Application state and shared resources.

use render_pipeline::{AppSettings, RenderPipeline};

/// Shared application state.
pub struct AppState {
    pub pipeline: RenderPipeline,
}

impl AppState {
    pub fn new(pipeline: RenderPipeline) -> Self {
        Self { pipeline }
    }

    /// Build the pipeline from settings, loading the source config.
    pub fn from_settings(settings: AppSettings) -> anyhow::Result<Self> {
        Ok(Self::new(RenderPipeline::from_settings(settings)?))
    }
}

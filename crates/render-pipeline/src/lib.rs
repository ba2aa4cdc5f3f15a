//! Parcel map render pipeline.
//!
//! Turns an address or APN into one rendered map image per requested layer:
//!
//! - [`resolver`]: parcel lookup backends behind [`ParcelResolver`]
//! - [`config`]: YAML source configuration (parcel service, map size, layers)
//! - [`settings`]: environment-driven process settings
//! - [`output`]: output directory layout and public URLs
//! - [`pipeline`]: the [`RenderPipeline`] orchestrator

pub mod config;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod settings;

pub use config::{expand_env_vars, load_source_config, MapSpec, ParcelSourceConfig, SourceConfig};
pub use output::{OutputStore, PUBLIC_PREFIX};
pub use pipeline::{LayerOutcome, PipelineRun, RenderPipeline};
pub use resolver::{GeocodeService, LightBoxClient, ParcelResolver, ParcelService};
pub use settings::AppSettings;

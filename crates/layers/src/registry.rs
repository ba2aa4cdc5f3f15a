//! Adapter selection by layer type tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parcel_common::{LayerConfig, ParcelVizError, ParcelVizResult};

use crate::adapter::{AdapterContext, LayerAdapter};
use crate::feature::ArcGisFeatureAdapter;
use crate::wms::WmsAdapter;

/// Builds an adapter for one layer configuration.
pub type AdapterConstructor = Arc<
    dyn Fn(&LayerConfig, &AdapterContext) -> ParcelVizResult<Box<dyn LayerAdapter>> + Send + Sync,
>;

/// Immutable map of type tag to adapter constructor.
#[derive(Clone)]
pub struct AdapterRegistry {
    context: AdapterContext,
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterRegistry {
    /// Registry holding the built-in `arcgis_feature` and `wms` adapters.
    pub fn with_defaults(context: AdapterContext) -> Self {
        Self::builder(context)
            .register(ArcGisFeatureAdapter::TYPE, |config, ctx| {
                Ok(Box::new(ArcGisFeatureAdapter::new(config, ctx)?))
            })
            .register(WmsAdapter::TYPE, |config, ctx| {
                Ok(Box::new(WmsAdapter::new(config, ctx)?))
            })
            .build()
    }

    pub fn builder(context: AdapterContext) -> AdapterRegistryBuilder {
        AdapterRegistryBuilder {
            context,
            constructors: HashMap::new(),
        }
    }

    /// Construct the adapter for `config`.
    pub fn build(&self, config: &LayerConfig) -> ParcelVizResult<Box<dyn LayerAdapter>> {
        let constructor = self
            .constructors
            .get(&config.layer_type)
            .ok_or_else(|| ParcelVizError::UnregisteredLayerType(config.layer_type.clone()))?;
        constructor(config, &self.context)
    }

    pub fn contains(&self, layer_type: &str) -> bool {
        self.constructors.contains_key(layer_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("types", &self.types())
            .finish()
    }
}

pub struct AdapterRegistryBuilder {
    context: AdapterContext,
    constructors: HashMap<String, AdapterConstructor>,
}

impl AdapterRegistryBuilder {
    /// Register (or replace) the constructor for `layer_type`.
    pub fn register<F>(mut self, layer_type: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&LayerConfig, &AdapterContext) -> ParcelVizResult<Box<dyn LayerAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(layer_type.into(), Arc::new(constructor));
        self
    }

    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            context: self.context,
            constructors: self.constructors,
        }
    }
}

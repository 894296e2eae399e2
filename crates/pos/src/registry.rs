//! Lookup from provider identifier to adapter instance.
//!
//! Built once at startup and shared read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use boutique_core::provider::PosProvider;

use crate::adapter::PosAdapter;
use crate::config::PosConfig;
use crate::error::PosError;
use crate::http::build_client;
use crate::lightspeed::LightspeedAdapter;
use crate::shopify::ShopifyAdapter;
use crate::square::SquareAdapter;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<PosProvider, Arc<dyn PosAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for the provider it reports. Replaces any
    /// existing entry.
    pub fn register(&mut self, adapter: Arc<dyn PosAdapter>) {
        let provider = adapter.provider();
        if self.adapters.insert(provider, adapter).is_some() {
            tracing::warn!(provider = %provider, "Replacing registered POS adapter");
        }
    }

    pub fn get(&self, provider: PosProvider) -> Result<Arc<dyn PosAdapter>, PosError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or_else(|| PosError::NotRegistered(provider.to_string()))
    }

    /// Resolve a raw identifier (path segment, stored column) to a
    /// registered adapter.
    pub fn resolve(&self, raw: &str) -> Result<(PosProvider, Arc<dyn PosAdapter>), PosError> {
        let provider: PosProvider = raw
            .parse()
            .map_err(|_| PosError::NotRegistered(raw.to_string()))?;
        Ok((provider, self.get(provider)?))
    }

    pub fn is_supported(&self, raw: &str) -> bool {
        self.resolve(raw).is_ok()
    }

    /// Registered providers in [`PosProvider::ALL`] order.
    pub fn list_supported(&self) -> Vec<PosProvider> {
        PosProvider::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }

    /// Register an adapter for every provider that has configuration.
    pub fn from_config(config: &PosConfig) -> Result<Self, PosError> {
        let client = build_client(config.http_timeout)?;
        let mut registry = Self::new();

        if let Some(square) = &config.square {
            registry.register(Arc::new(SquareAdapter::new(square.clone(), client.clone())));
        }
        if let Some(shopify) = &config.shopify {
            registry.register(Arc::new(ShopifyAdapter::new(shopify.clone(), client.clone())));
        }
        if let Some(lightspeed) = &config.lightspeed {
            registry.register(Arc::new(LightspeedAdapter::new(lightspeed.clone(), client)));
        }

        let providers: Vec<&str> = registry
            .list_supported()
            .into_iter()
            .map(PosProvider::as_str)
            .collect();
        tracing::info!(providers = ?providers, "POS provider registry initialized");
        Ok(registry)
    }
}

//! Source client registry and the reputation-source capability contract
//!
//! Each intelligence source is an opaque client behind the
//! [`ReputationSource`] trait. Clients are constructed once at startup from
//! configuration; a source that is absent or disabled in configuration is
//! omitted from the registry. Adding a source means adding a trait
//! implementation and a registry entry, not branching logic.

pub mod dshield;

pub use dshield::DshieldClient;

use crate::config::Config;
use crate::error::Result;
use crate::models::{SourceId, SourceOutcome};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Uniform capability contract for one intelligence source.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently; rate limiting is enforced by the caller, not the client.
#[async_trait]
pub trait ReputationSource: Send + Sync {
    /// Stable identifier of this source
    fn id(&self) -> SourceId;

    /// Concrete client type name, for status reporting
    fn client_type(&self) -> &'static str;

    /// Default confidence weight for scores reported by this source
    fn confidence(&self) -> f64;

    /// Look up reputation data for one IP address.
    ///
    /// `Ok(SourceOutcome::NoData)` means the source answered but knows
    /// nothing about the indicator; transport-level problems are `Err`.
    async fn ip_reputation(&self, ip: IpAddr) -> Result<SourceOutcome>;
}

/// Registry of the source clients enabled by configuration
pub struct SourceRegistry {
    clients: BTreeMap<SourceId, Arc<dyn ReputationSource>>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self {
            clients: BTreeMap::new(),
        }
    }

    /// Build the registry from configuration.
    ///
    /// Sources with a config entry but no client implementation yet are
    /// reported and skipped, mirroring how the platform rolls sources out.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::empty();

        for (name, source_config) in &config.sources {
            let id: SourceId = match name.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(source = %name, "Ignoring unknown source in configuration");
                    continue;
                }
            };

            if !source_config.enabled {
                debug!(source = %id, "Source disabled in configuration");
                continue;
            }

            match id {
                SourceId::Dshield => {
                    let client = DshieldClient::new(source_config, &config.http)?;
                    registry.register(Arc::new(client));
                    info!(source = %id, "Registered source client");
                }
                other => {
                    warn!(source = %other, "Source enabled but no client implementation exists");
                }
            }
        }

        Ok(registry)
    }

    pub fn register(&mut self, client: Arc<dyn ReputationSource>) {
        self.clients.insert(client.id(), client);
    }

    /// Registered source ids, in stable order
    pub fn available_sources(&self) -> Vec<SourceId> {
        self.clients.keys().copied().collect()
    }

    pub fn get(&self, id: SourceId) -> Option<&Arc<dyn ReputationSource>> {
        self.clients.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &Arc<dyn ReputationSource>)> {
        self.clients.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn default_config_registers_dshield_only() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();
        assert_eq!(registry.available_sources(), vec![SourceId::Dshield]);
    }

    #[test]
    fn disabled_source_is_omitted() {
        let mut config = Config::default();
        config.sources.get_mut("dshield").unwrap().enabled = false;

        let registry = SourceRegistry::from_config(&config).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn sources_without_clients_are_skipped() {
        let mut config = Config::default();
        let mut vt = crate::config::SourceConfig::default();
        vt.enabled = true;
        config.sources.insert("virustotal".to_string(), vt);

        let registry = SourceRegistry::from_config(&config).unwrap();
        // virustotal has no client implementation yet
        assert_eq!(registry.available_sources(), vec![SourceId::Dshield]);
    }

    #[test]
    fn unknown_source_names_are_ignored() {
        let mut config = Config::default();
        config
            .sources
            .insert("mystery_feed".to_string(), crate::config::SourceConfig::default());

        let registry = SourceRegistry::from_config(&config).unwrap();
        assert_eq!(registry.len(), 1);
    }
}

use std::sync::{Arc, RwLock};
use crate::config::{EngineConfig, IndexConfig};
use crate::config::weights::WeightTable;
use crate::error::{Error, Result};

/// Shared, swappable configuration.
///
/// Readers get an `Arc<IndexConfig>` that never changes under them. The
/// engine takes one at the start of a tick, so a swap is only observed at
/// the next tick boundary.
pub struct ConfigHandle {
    current: RwLock<Arc<IndexConfig>>,
}

impl ConfigHandle {
    pub fn new(engine: EngineConfig, weights: WeightTable) -> Result<Self> {
        let config = IndexConfig::new(1, engine, weights)?;
        Ok(ConfigHandle {
            current: RwLock::new(Arc::new(config)),
        })
    }

    pub fn current(&self) -> Arc<IndexConfig> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&*guard)
    }

    pub fn version(&self) -> u64 {
        self.current().version
    }

    /// Install a new configuration if the active version is still `expected_version`.
    pub fn compare_and_swap(
        &self,
        expected_version: u64,
        engine: EngineConfig,
        weights: WeightTable,
    ) -> Result<Arc<IndexConfig>> {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());

        if guard.version != expected_version {
            return Err(Error::ConfigVersionConflict {
                expected: expected_version,
                current: guard.version,
            });
        }

        let next = Arc::new(IndexConfig::new(expected_version + 1, engine, weights)?);
        *guard = Arc::clone(&next);

        tracing::info!(
            "Index configuration swapped: version {} -> {}",
            expected_version,
            next.version
        );

        Ok(next)
    }

    /// Parse a TOML document with `[engine]` and `[weights]` tables and swap it in.
    pub fn reload_from_toml(&self, expected_version: u64, document: &str) -> Result<Arc<IndexConfig>> {
        #[derive(serde::Deserialize)]
        struct ReloadDocument {
            #[serde(default)]
            engine: EngineConfig,
            weights: WeightTable,
        }

        let parsed: ReloadDocument = toml::from_str(document)
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        self.compare_and_swap(expected_version, parsed.engine, parsed.weights)
    }
}

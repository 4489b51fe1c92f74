use std::sync::{PoisonError, RwLock};

use tracing::{info, warn};

use crate::{config::LoadBalancingConfig, error::CoreError};

use super::{Bundler, BundlerRegistry, FixedSizeBundler, Stamp, next_generation};

#[derive(Debug)]
struct Template {
    config: LoadBalancingConfig,
    bundler: Box<dyn Bundler>,
}

/// Holds the driver-wide template bundler and hands out per-channel copies.
///
/// Every successful [`update_configuration`](Self::update_configuration)
/// stamps the new template with a fresh generation; channel copies older than
/// it are stale and get replaced before their next dispatch, unless they were
/// built from a node override.
#[derive(Debug)]
pub struct BundlerFactory {
    registry: BundlerRegistry,
    current: RwLock<Template>,
}

impl BundlerFactory {
    pub fn new(registry: BundlerRegistry, config: &LoadBalancingConfig) -> Result<Self, CoreError> {
        let bundler = Self::stamped(&registry, config, false)?;
        Ok(Self {
            registry,
            current: RwLock::new(Template {
                config: config.clone(),
                bundler,
            }),
        })
    }

    fn stamped(
        registry: &BundlerRegistry,
        config: &LoadBalancingConfig,
        overridden: bool,
    ) -> Result<Box<dyn Bundler>, CoreError> {
        let mut bundler = registry.build(&config.algorithm, &config.profile)?;
        bundler.set_stamp(Stamp {
            created_at: next_generation(),
            overridden,
        });
        Ok(bundler)
    }

    /// Copy of the current template.
    pub fn new_bundler(&self) -> Box<dyn Bundler> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bundler
            .copy()
    }

    /// Generation of the current template.
    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .bundler
            .created_at()
    }

    pub fn is_stale(&self, bundler: &dyn Bundler) -> bool {
        !bundler.is_overridden() && bundler.created_at() < self.generation()
    }

    /// Replaces the template. On error the previous template stays in place.
    ///
    /// Returns the new generation.
    pub fn update_configuration(&self, config: LoadBalancingConfig) -> Result<u64, CoreError> {
        let bundler = Self::stamped(&self.registry, &config, false)?;
        let generation = bundler.created_at();
        info!(
            algorithm = %config.algorithm,
            generation,
            "load-balancing configuration updated"
        );
        *self.current.write().unwrap_or_else(PoisonError::into_inner) =
            Template { config, bundler };
        Ok(generation)
    }

    /// Bundler for a node that supplied its own configuration.
    ///
    /// An unusable override falls back to [`fallback`](Self::fallback), still
    /// marked overridden so driver updates leave it alone.
    pub fn build_override(&self, config: &LoadBalancingConfig) -> Box<dyn Bundler> {
        match Self::stamped(&self.registry, config, true) {
            Ok(b) => b,
            Err(e) => {
                warn!(algorithm = %config.algorithm, error = %e, "node override rejected, using fallback");
                let mut b = Self::fallback();
                b.set_stamp(Stamp {
                    created_at: next_generation(),
                    overridden: true,
                });
                b
            }
        }
    }

    /// Single-task bundler used when nothing better can be built.
    pub fn fallback() -> Box<dyn Bundler> {
        Box::new(FixedSizeBundler::new(1))
    }

    pub fn current_config(&self) -> LoadBalancingConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config
            .clone()
    }

    pub fn algorithm_names(&self) -> Vec<String> {
        self.registry.names()
    }
}

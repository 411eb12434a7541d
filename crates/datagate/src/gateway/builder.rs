use super::Gateway;
use crate::Config;

use datagate_core::{Driver, Manifest, Result};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Builder {
    manifest: Option<Manifest>,
    config: Config,
}

impl Builder {
    pub fn manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds a gateway on top of `driver`. Tables are not created; call
    /// [`Gateway::reset_db`] for a fresh database.
    pub async fn build(self, driver: impl Driver) -> Result<Gateway> {
        let Some(manifest) = self.manifest else {
            datagate_core::bail!("a gateway needs a manifest");
        };
        tracing::debug!(
            models = manifest.models().count(),
            capability = ?driver.capability(),
            "gateway built"
        );

        Ok(Gateway {
            manifest: Arc::new(manifest),
            config: Arc::new(self.config),
            driver: Arc::new(driver),
        })
    }
}

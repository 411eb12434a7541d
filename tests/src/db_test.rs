use crate::{
    logging_driver::{DriverOp, LoggingDriver},
    ExecLog, Setup,
};
use datagate::{Config, Gateway, Manifest, Result};
use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

/// Runs one test against one backend.
///
/// Tests use `#[test]` instead of `#[tokio::test]` so the runtime is created
/// here, and every gateway is built over a [`LoggingDriver`] so tests can
/// assert on the operations the backend received.
pub struct DbTest {
    setup: Box<dyn Setup>,
    ops_log: Arc<Mutex<Vec<DriverOp>>>,
}

impl DbTest {
    pub fn new(setup: Box<dyn Setup>) -> Self {
        // Set `RUST_LOG=datagate=debug` to see what the gateway does.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            setup,
            ops_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The backend this test runs against
    pub fn backend(&self) -> &'static str {
        self.setup.name()
    }

    /// Build a gateway over a fresh database, returning errors to the caller
    pub async fn try_setup_gateway(&mut self, manifest: Manifest, config: Config) -> Result<Gateway> {
        let driver = LoggingDriver::new(self.setup.driver()?);
        self.ops_log = driver.ops_log_handle();

        let gateway = Gateway::builder()
            .manifest(manifest)
            .config(config)
            .build(driver)
            .await?;
        gateway.reset_db().await?;

        Ok(gateway)
    }

    /// Build a gateway with the default configuration
    pub async fn setup_gateway(&mut self, manifest: Manifest) -> Gateway {
        self.setup_gateway_with(manifest, Config::default()).await
    }

    pub async fn setup_gateway_with(&mut self, manifest: Manifest, config: Config) -> Gateway {
        self.try_setup_gateway(manifest, config).await.unwrap()
    }

    /// Operations sent to the backend of the last gateway built
    pub fn log(&self) -> ExecLog {
        ExecLog::new(self.ops_log.clone())
    }

    /// Run a test function with a mutable reference to self on a
    /// current-thread runtime.
    pub fn run_test<F>(&mut self, test_fn: F)
    where
        F: for<'a> FnOnce(&'a mut DbTest) -> Pin<Box<dyn Future<Output = ()> + 'a>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime");

        runtime.block_on(test_fn(self));
    }
}

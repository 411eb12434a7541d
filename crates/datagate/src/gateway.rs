mod builder;
pub use builder::Builder;

mod read;

mod response;
pub use response::Response;

mod write;

use crate::{
    access::AccessGate,
    context::Context,
    transaction::Conn,
    url::{self, Format},
    Action, Config, Request,
};

use datagate_core::{Driver, Error, ErrorCode, Manifest, Result};
use std::sync::Arc;
use tracing::debug;

/// Answers requests against a manifest, reading and writing through a
/// storage backend.
#[derive(Debug, Clone)]
pub struct Gateway {
    manifest: Arc<Manifest>,
    config: Arc<Config>,
    driver: Arc<dyn Driver>,
}

impl Gateway {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drops and recreates every table of the manifest.
    pub async fn reset_db(&self) -> Result<()> {
        self.driver.reset_db(&self.manifest.db).await
    }

    /// Handles a request. Failures are turned into error responses.
    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(status = err.status(), error = %err, "request failed");
                Response::error(&err)
            }
        }
    }

    async fn dispatch(&self, request: &Request) -> Result<Response> {
        let cx = self.context(request);
        let params = url::bind(&self.manifest, cx.capability.id_format, &self.config, request)?;

        if !Response::renders(&params.format) {
            return Err(not_implemented(format!("format({})", params.format.name)));
        }

        let conn = self.connect().await?;
        let mut response = match params.action {
            Action::GetAll if params.ns.is_some() => read::namespace(&cx, &params)?,
            Action::GetAll | Action::Search => read::getall(conn, &cx, &params).await?,
            Action::GetOne => read::getone(conn, &cx, &params).await?,
            Action::Changes => read::changes(conn, &cx, &params).await?,
            Action::Wipe => write::wipe(conn, &cx, &params).await?,
            Action::Insert
            | Action::Upsert
            | Action::Update
            | Action::Patch
            | Action::Delete
            | Action::Move
            | Action::Check => write::write(conn, cx, params.clone(), request).await?,
            action => return Err(not_implemented(action.name())),
        };

        if request.method == crate::Method::Head {
            response.body = None;
        }
        Ok(response)
    }

    fn context(&self, request: &Request) -> Context {
        Context {
            manifest: self.manifest.clone(),
            config: self.config.clone(),
            capability: self.driver.capability(),
            gate: AccessGate::new(request.scopes.clone(), &self.config),
        }
    }

    async fn connect(&self) -> Result<Conn> {
        Ok(Conn::new(self.manifest.clone(), self.driver.connect().await?))
    }
}

fn not_implemented(feature: impl ToString) -> Error {
    Error::new(ErrorCode::NotImplementedFeature).with("feature", feature)
}

/// The format errors are rendered in.
fn json() -> Format {
    Format {
        name: "json".to_string(),
        params: Default::default(),
    }
}

#[cfg(test)]
mod tests;

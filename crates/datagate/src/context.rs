use crate::{access::AccessGate, Config};

use datagate_core::{driver::Capability, Manifest};
use std::sync::Arc;

/// Per-request state handed to the read and write paths.
///
/// The manifest and config are shared by every request; the access gate
/// carries the scopes of the calling client.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) manifest: Arc<Manifest>,
    pub(crate) config: Arc<Config>,
    pub(crate) capability: &'static Capability,
    pub(crate) gate: AccessGate,
}

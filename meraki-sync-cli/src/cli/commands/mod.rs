pub mod apply;
pub mod pull;
pub mod sfp;

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::api::client::MerakiClient;
use crate::api::discovery::Discovery;
use crate::api::transport::RateLimitedTransport;
use crate::config::Settings;

/// Client and transport shared by every call of one command
pub(crate) fn connect(settings: &Settings) -> Result<RateLimitedTransport> {
    let client = MerakiClient::new(&settings.client_settings()?)?;
    Ok(RateLimitedTransport::new(Arc::new(client), &settings.resilience))
}

pub(crate) fn discovery(transport: &RateLimitedTransport, cancel: &CancellationToken) -> Discovery {
    Discovery::new(transport.clone(), cancel.clone())
}

//! Getting a `--target` ready before records are replayed onto it
//!
//! The target is looked up once so a typo in the serial fails the run
//! before any record is sent. A device can first be claimed into a network
//! (only when writes are enabled).

use log::{info, warn};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::engine::RunMode;
use super::fields::ResourceKind;
use crate::api::discovery::{Device, Discovery, DiscoveryError, Network};
use crate::api::request::ApiRequest;
use crate::api::transport::{RateLimitedTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("--claim-network-id needs a device target, but {0} targets a network")]
    ClaimNeedsDevice(ResourceKind),
    #[error("claiming {serial} into network {network_id} failed: {source}")]
    Claim {
        serial: String,
        network_id: String,
        #[source]
        source: TransportError,
    },
    #[error("target {id} lookup failed: {source}")]
    Lookup {
        id: String,
        #[source]
        source: DiscoveryError,
    },
}

/// What the lookup found
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Device(Device),
    Network(Network),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Device(device) => {
                let model = match device.model.as_str() {
                    "" => "unknown model",
                    model => model,
                };
                write!(f, "{} ({}, {})", device.serial, model, device.display_name())
            }
            Target::Network(network) => write!(f, "{} ({})", network.id, network.name),
        }
    }
}

/// Result of preparing the target
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// The target answered the lookup; `claimed` is set when a claim was sent first
    Ready { target: Target, claimed: bool },
    /// Dry-run with a claim requested. An unclaimed device cannot be looked up
    /// yet, so nothing was called.
    ClaimPending { serial: String, network_id: String },
}

pub struct TargetPreparer<'a> {
    transport: &'a RateLimitedTransport,
    cancel: &'a CancellationToken,
}

impl<'a> TargetPreparer<'a> {
    pub fn new(transport: &'a RateLimitedTransport, cancel: &'a CancellationToken) -> Self {
        Self { transport, cancel }
    }

    /// Claim (when asked and writing), then look the target up
    pub async fn prepare(
        &self,
        kind: ResourceKind,
        target: &str,
        claim_network_id: Option<&str>,
        mode: RunMode,
    ) -> Result<Prepared, TargetError> {
        let target = target.trim();

        let claimed = match claim_network_id.map(str::trim) {
            Some(_) if kind == ResourceKind::Ospf => {
                return Err(TargetError::ClaimNeedsDevice(kind));
            }
            Some(network_id) if mode == RunMode::DryRun => {
                return Ok(Prepared::ClaimPending {
                    serial: target.to_ascii_uppercase(),
                    network_id: network_id.to_string(),
                });
            }
            Some(network_id) => {
                self.claim(network_id, target).await?;
                true
            }
            None => false,
        };

        let target = self.lookup(kind, target).await?;
        if let (Target::Device(device), Some(expected)) = (&target, claim_network_id) {
            match device.network_id.as_deref() {
                Some(actual) if actual == expected.trim() => {}
                actual => warn!(
                    "{} reports network {}, not {}; the claim may still be in progress",
                    device.serial,
                    actual.unwrap_or("none"),
                    expected.trim()
                ),
            }
        }
        Ok(Prepared::Ready { target, claimed })
    }

    /// `POST /networks/{networkId}/devices/claim` for one serial
    async fn claim(&self, network_id: &str, target: &str) -> Result<(), TargetError> {
        let serial = target.to_ascii_uppercase();
        let request = ApiRequest::post(
            format!("/networks/{}/devices/claim", urlencoding::encode(network_id)),
            json!({ "serials": [serial] }),
        );
        info!("Claiming {} into network {}", serial, network_id);
        self.transport
            .call(&request, self.cancel)
            .await
            .map_err(|source| TargetError::Claim {
                serial,
                network_id: network_id.to_string(),
                source,
            })?;
        Ok(())
    }

    async fn lookup(&self, kind: ResourceKind, target: &str) -> Result<Target, TargetError> {
        let discovery = Discovery::new(self.transport.clone(), self.cancel.clone());
        let lookup_failed = |source: DiscoveryError| TargetError::Lookup {
            id: target.to_string(),
            source,
        };
        match kind {
            ResourceKind::Ospf => discovery
                .network(target)
                .await
                .map(Target::Network)
                .map_err(lookup_failed),
            _ => discovery
                .device(&target.to_ascii_uppercase())
                .await
                .map(Target::Device)
                .map_err(lookup_failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::request::ApiResponse;
    use crate::api::resilience::ResilienceConfig;
    use crate::api::transport::testing::*;
    use reqwest::Method;
    use std::sync::Arc;

    fn transport(script: Vec<ApiResponse>) -> (RateLimitedTransport, Arc<ScriptedExecutor>) {
        let exec = Arc::new(ScriptedExecutor::new(script.into_iter().map(Ok).collect()));
        let transport = RateLimitedTransport::new(exec.clone(), &ResilienceConfig::default());
        (transport, exec)
    }

    fn device(network_id: &str) -> ApiResponse {
        ApiResponse::new(
            200,
            json!({"serial": "Q2SW-NEW", "model": "MS225-48", "name": "IDF-3", "networkId": network_id}),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_only() {
        let (transport, exec) = transport(vec![device("N_1")]);
        let cancel = CancellationToken::new();

        let prepared = TargetPreparer::new(&transport, &cancel)
            .prepare(ResourceKind::SwitchPort, " q2sw-new ", None, RunMode::Apply)
            .await
            .unwrap();

        let Prepared::Ready { target, claimed } = prepared else {
            panic!("expected a looked-up target");
        };
        assert!(!claimed);
        assert_eq!(target.to_string(), "Q2SW-NEW (MS225-48, IDF-3)");
        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.method, Method::GET);
        assert_eq!(calls[0].0.path, "/devices/Q2SW-NEW");
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_then_lookup() {
        let (transport, exec) = transport(vec![ApiResponse::new(200, json!({})), device("N_9")]);
        let cancel = CancellationToken::new();

        let prepared = TargetPreparer::new(&transport, &cancel)
            .prepare(ResourceKind::SwitchPort, "q2sw-new", Some("N_9"), RunMode::Apply)
            .await
            .unwrap();

        assert!(matches!(prepared, Prepared::Ready { claimed: true, .. }));
        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls[0].0.method, Method::POST);
        assert_eq!(calls[0].0.path, "/networks/N_9/devices/claim");
        assert_eq!(calls[0].0.body, Some(json!({"serials": ["Q2SW-NEW"]})));
        assert_eq!(calls[1].0.path, "/devices/Q2SW-NEW");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_never_claims() {
        let (transport, exec) = transport(vec![]);
        let cancel = CancellationToken::new();

        let prepared = TargetPreparer::new(&transport, &cancel)
            .prepare(ResourceKind::Device, "q2aa-0001", Some("N_9"), RunMode::DryRun)
            .await
            .unwrap();

        assert_eq!(
            prepared,
            Prepared::ClaimPending { serial: "Q2AA-0001".into(), network_id: "N_9".into() }
        );
        assert_eq!(exec.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_claim_stops_before_lookup() {
        let (transport, exec) = transport(vec![status(400)]);
        let cancel = CancellationToken::new();

        let err = TargetPreparer::new(&transport, &cancel)
            .prepare(ResourceKind::SwitchPort, "Q2SW-NEW", Some("N_9"), RunMode::Apply)
            .await
            .unwrap_err();

        assert!(matches!(err, TargetError::Claim { .. }));
        assert_eq!(exec.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_target_is_an_error() {
        let (transport, _) = transport(vec![status(404)]);
        let cancel = CancellationToken::new();

        let err = TargetPreparer::new(&transport, &cancel)
            .prepare(ResourceKind::SwitchPort, "Q2SW-TYPO", None, RunMode::DryRun)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("target Q2SW-TYPO lookup failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ospf_target_is_a_network() {
        let (transport, exec) =
            transport(vec![ApiResponse::new(200, json!({"id": "N_1", "name": "HQ"}))]);
        let cancel = CancellationToken::new();
        let preparer = TargetPreparer::new(&transport, &cancel);

        let prepared = preparer
            .prepare(ResourceKind::Ospf, "N_1", None, RunMode::Apply)
            .await
            .unwrap();
        assert_eq!(
            prepared,
            Prepared::Ready {
                target: Target::Network(Network { id: "N_1".into(), name: "HQ".into() }),
                claimed: false,
            }
        );
        assert_eq!(exec.calls.lock().unwrap()[0].0.path, "/networks/N_1");

        assert!(matches!(
            preparer.prepare(ResourceKind::Ospf, "N_1", Some("N_2"), RunMode::Apply).await,
            Err(TargetError::ClaimNeedsDevice(ResourceKind::Ospf))
        ));
    }
}

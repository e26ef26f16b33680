//! Active health checking.
//!
//! # Responsibilities
//! - Build probe URLs from the per-service check settings
//! - Probe every endpoint that is not Passing
//! - Promote endpoints whose probe succeeded
//!
//! # Design Decisions
//! - One request per endpoint per round; no retry, no backoff
//! - A failed probe is logged at debug and otherwise ignored
//! - Already-passing endpoints are never probed, so probing cannot demote

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::CheckConfig;
use crate::error::ProbeError;
use crate::health::state::HealthState;
use crate::load_balancer::endpoint::Endpoint;
use crate::observability::metrics;

/// A single best-effort health probe.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    /// Succeeds when the target answered without a transport error.
    async fn probe(&self, url: &str) -> Result<(), ProbeError>;
}

/// HTTP GET probe. Any 2xx answer counts as success.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let mut builder = reqwest::Client::builder().user_agent("service-router-health-check");
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        let url = reqwest::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", url, e)))?;
        self.client.get(url).send().await?.error_for_status()?;
        Ok(())
    }
}

/// Probe URL for an endpoint: `protocol://address:port/path`.
pub fn probe_url(check: &CheckConfig, endpoint: &Endpoint) -> String {
    format!("{}://{}{}", check.protocol, endpoint.authority(), check.path)
}

/// One pending probe: which service it belongs to, the endpoint, and the target URL.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub service: String,
    pub endpoint: Arc<Endpoint>,
    pub url: String,
}

/// Probe one endpoint and promote it on success.
pub async fn probe_endpoint(prober: &dyn HealthProbe, target: &ProbeTarget) -> bool {
    match prober.probe(&target.url).await {
        Ok(()) => {
            if target.endpoint.health_cell().probe_succeeded() {
                tracing::info!(
                    service = %target.service,
                    endpoint = %target.endpoint.id(),
                    "Endpoint passed health probe"
                );
            }
            metrics::record_probe(&target.service, target.endpoint.id().as_str(), true);
            metrics::record_endpoint_health(
                &target.service,
                target.endpoint.id().as_str(),
                HealthState::Passing,
            );
            true
        }
        Err(e) => {
            tracing::debug!(
                service = %target.service,
                endpoint = %target.endpoint.id(),
                url = %target.url,
                error = %e,
                "Health probe failed"
            );
            metrics::record_probe(&target.service, target.endpoint.id().as_str(), false);
            false
        }
    }
}

/// Probe all targets concurrently. Returns how many endpoints passed.
pub async fn probe_all(prober: Arc<dyn HealthProbe>, targets: Vec<ProbeTarget>) -> usize {
    let probes = targets.iter().map(|target| probe_endpoint(prober.as_ref(), target));
    join_all(probes).await.into_iter().filter(|ok| *ok).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Scripted {
        healthy: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HealthProbe for Scripted {
        async fn probe(&self, url: &str) -> Result<(), ProbeError> {
            self.seen.lock().unwrap().push(url.to_string());
            if self.healthy.iter().any(|h| h == url) {
                Ok(())
            } else {
                Err(ProbeError::Failed("connection refused".into()))
            }
        }
    }

    fn target(address: &str, status: HealthState) -> ProbeTarget {
        let endpoint = Arc::new(Endpoint::new(address, 8080, status));
        ProbeTarget {
            service: "orders".into(),
            url: probe_url(&CheckConfig::default(), &endpoint),
            endpoint,
        }
    }

    #[test]
    fn test_probe_url() {
        let endpoint = Endpoint::new("10.0.0.2", 8080, HealthState::Critical);
        assert_eq!(
            probe_url(&CheckConfig::default(), &endpoint),
            "http://10.0.0.2:8080/health"
        );

        let check = CheckConfig {
            protocol: "https".into(),
            path: "/status".into(),
        };
        assert_eq!(probe_url(&check, &endpoint), "https://10.0.0.2:8080/status");
    }

    #[tokio::test]
    async fn test_success_promotes_failure_is_noop() {
        let prober = Arc::new(Scripted {
            healthy: vec!["http://10.0.0.2:8080/health".into()],
            ..Default::default()
        });

        let recovering = target("10.0.0.2", HealthState::Critical);
        let dead = target("10.0.0.3", HealthState::Warning);

        let passed = probe_all(prober.clone(), vec![recovering.clone(), dead.clone()]).await;
        assert_eq!(passed, 1);
        assert_eq!(recovering.endpoint.status(), HealthState::Passing);
        assert_eq!(dead.endpoint.status(), HealthState::Warning);
        assert_eq!(prober.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_http_probe_rejects_bad_url() {
        let probe = HttpProbe::new(Some(Duration::from_millis(200))).unwrap();
        let err = probe.probe("not a url").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(Some(Duration::from_secs(2))).unwrap();
        let result = probe.probe(&format!("http://{}/health", addr)).await;
        assert!(matches!(result, Err(ProbeError::Http(_))));
    }
}

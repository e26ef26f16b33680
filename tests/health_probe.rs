mod common;

use std::sync::Arc;
use std::time::Duration;

use service_router::config::schema::{CheckConfig, RuleConfig};
use service_router::health::HttpProbe;
use service_router::{HealthState, MemoryDiscovery, Node, Orchestrator};

fn node(addr: std::net::SocketAddr, status: HealthState) -> Node {
    Node::new(addr.ip().to_string(), addr.port(), status)
}

fn status_of(lb: &Orchestrator, service: &str, port: u16) -> HealthState {
    lb.snapshot()[service]
        .iter()
        .find(|e| e.port == port)
        .map(|e| e.status)
        .unwrap()
}

async fn orchestrator(discovery: &MemoryDiscovery) -> Orchestrator {
    let probe = HttpProbe::new(Some(Duration::from_secs(2))).unwrap();
    Orchestrator::builder(Arc::new(discovery.clone()))
        .prober(Arc::new(probe))
        .build()
}

#[tokio::test]
async fn test_probe_promotes_only_healthy_endpoints() {
    let healthy = common::start_health_backend("/health", 200).await;
    let failing = common::start_health_backend("/health", 503).await;

    let discovery = MemoryDiscovery::new();
    discovery.set_nodes(
        "svc",
        vec![
            node(healthy, HealthState::Critical),
            node(failing, HealthState::Critical),
        ],
    );

    let lb = orchestrator(&discovery).await;
    lb.init(&[], "round_robin").await.unwrap();

    assert_eq!(lb.probe_now().await, 1);
    assert_eq!(status_of(&lb, "svc", healthy.port()), HealthState::Passing);
    assert_eq!(status_of(&lb, "svc", failing.port()), HealthState::Critical);
}

#[tokio::test]
async fn test_probe_uses_configured_path() {
    let backend = common::start_health_backend("/status", 200).await;

    let discovery = MemoryDiscovery::new();
    discovery.set_nodes("svc", vec![node(backend, HealthState::Warning)]);
    let lb = orchestrator(&discovery).await;

    // Default path 404s against this backend
    lb.init(&[], "round_robin").await.unwrap();
    assert_eq!(lb.probe_now().await, 0);
    assert_eq!(status_of(&lb, "svc", backend.port()), HealthState::Warning);

    let rules = vec![RuleConfig {
        service: "svc".into(),
        rule: None,
        check: CheckConfig {
            protocol: "http".into(),
            path: "/status".into(),
        },
    }];
    lb.init(&rules, "round_robin").await.unwrap();
    assert_eq!(lb.probe_now().await, 1);
    assert_eq!(status_of(&lb, "svc", backend.port()), HealthState::Passing);
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_status() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);

    let discovery = MemoryDiscovery::new();
    discovery.set_nodes("svc", vec![node(closed, HealthState::Critical)]);
    let lb = orchestrator(&discovery).await;
    lb.init(&[], "round_robin").await.unwrap();

    assert_eq!(lb.probe_now().await, 0);
    assert_eq!(status_of(&lb, "svc", closed.port()), HealthState::Critical);
}

#[tokio::test]
async fn test_discovery_report_overrides_probe() {
    let backend = common::start_health_backend("/health", 200).await;

    let discovery = MemoryDiscovery::new();
    discovery.set_nodes("svc", vec![node(backend, HealthState::Critical)]);
    let lb = orchestrator(&discovery).await;
    lb.init(&[], "round_robin").await.unwrap();

    assert_eq!(lb.probe_now().await, 1);
    assert_eq!(status_of(&lb, "svc", backend.port()), HealthState::Passing);

    // A newer report from discovery wins over the probe result
    discovery.set_nodes("svc", vec![node(backend, HealthState::Warning)]);
    for _ in 0..50 {
        if status_of(&lb, "svc", backend.port()) == HealthState::Warning {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status_of(&lb, "svc", backend.port()), HealthState::Warning);
}

mod common;

use service_router::config::schema::ConsulConfig;
use service_router::error::DiscoveryError;
use service_router::{ConsulDiscovery, Discovery, HealthState};

async fn consul_at(body: &'static str) -> ConsulDiscovery {
    let addr = common::start_programmable_backend(move |_| async move { (200, body.to_string()) }).await;
    ConsulDiscovery::new(&ConsulConfig {
        url: format!("http://{}", addr),
        ..ConsulConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_service_nodes() {
    let consul = consul_at(
        r#"[{
            "Node": {"Node": "node-1", "Address": "10.0.0.1"},
            "Service": {"ID": "orders-1", "Service": "orders", "Address": "", "Port": 8080},
            "Checks": [{"Status": "passing"}]
        }]"#,
    )
    .await;

    let nodes = consul.list_service_nodes("orders").await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].address, "10.0.0.1");
    assert_eq!(nodes[0].port, 8080);
    assert_eq!(nodes[0].status, HealthState::Passing);
}

#[tokio::test]
async fn test_malformed_agent_answer() {
    let consul = consul_at("<html>502 Bad Gateway</html>").await;

    let err = consul.list_service_nodes("orders").await.unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidResponse(_)));
    let err = consul.list_service_names().await.unwrap_err();
    assert!(matches!(err, DiscoveryError::InvalidResponse(_)));
}

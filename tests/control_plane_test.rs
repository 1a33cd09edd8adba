//! Integration tests for the control plane.

use std::net::SocketAddr;

use serde_json::json;

mod common;

#[tokio::test]
async fn test_register_then_proxy_round_trip() {
    let upstream: SocketAddr = "127.0.0.1:28511".parse().unwrap();
    common::start_mock_upstream(upstream, "registered upstream").await;

    let config = common::gateway_config(28512);
    let shutdown = common::start_gateway(config).await;
    let client = common::http_client();

    // Unknown before registration.
    let res = client
        .get("http://127.0.0.1:28512/svc1/foo")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    let res = client
        .post("http://127.0.0.1:28512/services/register")
        .json(&json!({
            "name": "svc1",
            "addr": "127.0.0.1:28511",
            "whitelist": ["ALL"],
            "health": {"enabled": false, "uri": "/health"},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "service svc1 registered");

    let res = client
        .get("http://127.0.0.1:28512/svc1/foo")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "registered upstream");

    shutdown.trigger();
}

#[tokio::test]
async fn test_register_rejects_incomplete_body() {
    let config = common::gateway_config(28521);
    let shutdown = common::start_gateway(config).await;

    // Missing the required addr/whitelist/health fields.
    let res = common::http_client()
        .post("http://127.0.0.1:28521/services/register")
        .json(&json!({"name": "svc1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_update_unknown_service_rejected() {
    let config = common::gateway_config(28531);
    let shutdown = common::start_gateway(config).await;

    let res = common::http_client()
        .post("http://127.0.0.1:28531/services/update")
        .json(&json!({
            "name": "ghost",
            "addr": "127.0.0.1:1",
            "whitelist": ["ALL"],
            "health": {"enabled": false, "uri": ""},
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    assert_eq!(res.text().await.unwrap(), "service doesn't exists");

    shutdown.trigger();
}

#[tokio::test]
async fn test_update_repoints_service() {
    let old_upstream: SocketAddr = "127.0.0.1:28541".parse().unwrap();
    let new_upstream: SocketAddr = "127.0.0.1:28542".parse().unwrap();
    common::start_mock_upstream(old_upstream, "old").await;
    common::start_mock_upstream(new_upstream, "new").await;

    let mut config = common::gateway_config(28543);
    config
        .registry
        .services
        .push(common::service_config("svc1", "127.0.0.1:28541"));
    let shutdown = common::start_gateway(config).await;
    let client = common::http_client();

    let res = client
        .get("http://127.0.0.1:28543/svc1/foo")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "old");

    let res = client
        .post("http://127.0.0.1:28543/services/update")
        .json(&json!({
            "name": "svc1",
            "addr": "127.0.0.1:28542",
            "whitelist": ["ALL"],
            "health": {"enabled": false, "uri": ""},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get("http://127.0.0.1:28543/svc1/foo")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "new");

    shutdown.trigger();
}

#[tokio::test]
async fn test_deregister_removes_service() {
    let upstream: SocketAddr = "127.0.0.1:28551".parse().unwrap();
    common::start_mock_upstream(upstream, "ok").await;

    let mut config = common::gateway_config(28552);
    config
        .registry
        .services
        .push(common::service_config("svc1", "127.0.0.1:28551"));
    let shutdown = common::start_gateway(config).await;
    let client = common::http_client();

    let res = client
        .post("http://127.0.0.1:28552/services/deregister")
        .json(&json!({"name": "svc1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "service svc1 deregistered");

    let res = client
        .get("http://127.0.0.1:28552/svc1/foo")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    shutdown.trigger();
}

#[tokio::test]
async fn test_list_services_snapshot() {
    let mut config = common::gateway_config(28561);
    let mut service = common::service_config("svc1", "127.0.0.1:9000");
    service.fallback_uri = "127.0.0.1:9100".to_string();
    config.registry.services.push(service);
    let shutdown = common::start_gateway(config).await;

    let res = common::http_client()
        .get("http://127.0.0.1:28561/services")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["svc1"]["addr"], "127.0.0.1:9000");
    assert_eq!(body["svc1"]["fallbackUri"], "127.0.0.1:9100");
    assert_eq!(body["svc1"]["whitelist"][0], "ALL");
    assert_eq!(body["svc1"]["circuitBreaker"]["state"], "closed");

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_config_and_metrics_endpoints() {
    let config = common::gateway_config(28571);
    let shutdown = common::start_gateway(config).await;
    let client = common::http_client();

    let res = client
        .get("http://127.0.0.1:28571/health")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "OK");

    let res = client
        .get("http://127.0.0.1:28571/config")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["server"]["host"], "127.0.0.1");
    assert_eq!(body["server"]["port"], 28571);

    let res = client
        .get("http://127.0.0.1:28571/metrics")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

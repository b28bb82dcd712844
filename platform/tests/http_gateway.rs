use std::time::Duration;

use agent_platform_lib::services::gateway::{HttpPluginGateway, PluginGateway};
use agent_platform_lib::AppError;
use mockito::Matcher;
use serde_json::json;

fn gateway(base_url: &str) -> HttpPluginGateway {
    HttpPluginGateway::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn loads_marketplace_listing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/plugins/marketplace")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "plugins": [{
                    "id": "webhook-handler",
                    "name": "Webhook Handler",
                    "description": "Advanced webhook processing",
                    "version": "2.1.0",
                    "author": "ADK Team",
                    "category": "integration",
                    "tags": ["webhook"],
                    "rating": 4.8,
                    "downloads": 1250,
                    "price": 0,
                    "isInstalled": true,
                    "isActive": false,
                    "dependencies": [],
                    "status": "installed"
                }],
                "categories": ["integration", "utility"]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let listing = gateway(&server.url()).load_marketplace().await.unwrap();
    mock.assert_async().await;

    assert_eq!(listing.plugins.len(), 1);
    assert!(listing.plugins[0].is_installed);
    assert_eq!(listing.categories, vec!["integration", "utility"]);
}

#[tokio::test]
async fn install_posts_camel_case_plugin_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/plugins/install")
        .match_body(Matcher::Json(json!({ "pluginId": "slack-integration" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true}"#)
        .create_async()
        .await;

    gateway(&server.url())
        .install("slack-integration")
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_maps_to_gateway_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("DELETE", "/api/plugins/slack-integration")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let err = gateway(&server.url())
        .uninstall("slack-integration")
        .await
        .unwrap_err();
    match err {
        AppError::Gateway(message) => {
            assert!(message.contains("500"));
            assert!(message.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn config_lookup_treats_404_as_missing() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("GET", "/api/plugins/auto-scheduler/config")
        .with_status(404)
        .create_async()
        .await;
    let _present = server
        .mock("GET", "/api/plugins/webhook-handler/config")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "pluginId": "webhook-handler",
                "config": { "retries": 3 },
                "enabled": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let gateway = gateway(&server.url());
    assert!(gateway.get_config("auto-scheduler").await.unwrap().is_none());

    let config = gateway.get_config("webhook-handler").await.unwrap().unwrap();
    assert!(config.enabled);
    assert_eq!(config.config["retries"], json!(3));
}

#[tokio::test]
async fn config_update_and_activation_routes() {
    let mut server = mockito::Server::new_async().await;
    let put = server
        .mock("PUT", "/api/plugins/webhook-handler/config")
        .match_body(Matcher::Json(json!({ "config": { "retries": 5 } })))
        .with_status(200)
        .create_async()
        .await;
    let activate = server
        .mock("POST", "/api/plugins/webhook-handler/activate")
        .with_status(200)
        .create_async()
        .await;
    let deactivate = server
        .mock("POST", "/api/plugins/webhook-handler/deactivate")
        .with_status(200)
        .create_async()
        .await;

    let gateway = gateway(&server.url());
    let mut config = serde_json::Map::new();
    config.insert("retries".into(), json!(5));
    gateway.update_config("webhook-handler", &config).await.unwrap();
    gateway.activate("webhook-handler").await.unwrap();
    gateway.deactivate("webhook-handler").await.unwrap();

    put.assert_async().await;
    activate.assert_async().await;
    deactivate.assert_async().await;
}

#[tokio::test]
async fn unreachable_backend_is_a_gateway_error() {
    let gateway = HttpPluginGateway::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    assert!(matches!(
        gateway.load_marketplace().await,
        Err(AppError::Gateway(_) | AppError::Timeout(_))
    ));
}

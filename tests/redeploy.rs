//! Live redeployment against a running server.

use exchange_adapter::adapter::StaticProvider;
use exchange_adapter::config::AdapterConfig;
use exchange_adapter::{inject, Adapter, AdapterError};

mod common;

fn greeting_adapter() -> Adapter {
    Adapter::builder()
        .add_injection_provider(
            "words",
            StaticProvider::new()
                .with("hello", "hello".to_string())
                .with("goodbye", "goodbye".to_string())
                .with("hey", "hey".to_string()),
        )
        .deploy(|routes, _| {
            routes
                .alias("greeting", "words:goodbye")?
                .alias("greeting", "words:hello")?
                .on_get(
                    "/greet",
                    inject(["greeting"], |ex, params| {
                        let word = params.get::<String>(0).cloned();
                        Ok(ex.send(word)?)
                    }),
                )?;
            Ok(())
        })
        .build()
        .unwrap()
}

fn config_with_alias(name: &str, specifier: &str) -> AdapterConfig {
    let mut config = AdapterConfig::default();
    config.aliases.insert(name.to_string(), specifier.to_string());
    config
}

async fn get_text(server: &common::TestServer, path: &str) -> String {
    common::client()
        .get(server.url(path))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_duplicate_alias_last_registration_wins() {
    let server = common::start_server(greeting_adapter(), AdapterConfig::default()).await;
    assert_eq!(get_text(&server, "/greet").await, "hello");
}

#[tokio::test]
async fn test_redeploy_swaps_alias_target() {
    let server = common::start_server(greeting_adapter(), AdapterConfig::default()).await;
    assert_eq!(get_text(&server, "/greet").await, "hello");
    assert_eq!(server.adapter.generation(), 1);

    server
        .adapter
        .redeploy(&config_with_alias("greeting", "words:hey"))
        .unwrap();

    assert_eq!(server.adapter.generation(), 2);
    assert_eq!(get_text(&server, "/greet").await, "hey");
}

#[tokio::test]
async fn test_failed_redeploy_keeps_serving_old_routes() {
    let server = common::start_server(greeting_adapter(), AdapterConfig::default()).await;

    let err = server
        .adapter
        .redeploy(&config_with_alias("greeting", ":missing-prefix"))
        .unwrap_err();
    assert!(matches!(err, AdapterError::InvalidSpecifier { .. }));

    assert_eq!(server.adapter.generation(), 1);
    assert_eq!(get_text(&server, "/greet").await, "hello");
}

#[tokio::test]
async fn test_alias_cycle_rejects_deployment() {
    let server = common::start_server(greeting_adapter(), AdapterConfig::default()).await;

    let mut config = config_with_alias("greeting", "loop");
    config.aliases.insert("loop".to_string(), "greeting".to_string());

    let err = server.adapter.redeploy(&config).unwrap_err();
    assert!(matches!(err, AdapterError::AliasCycle(_)));
    assert_eq!(get_text(&server, "/greet").await, "hello");
}

#[tokio::test]
async fn test_alias_to_unknown_provider_is_absent() {
    let server = common::start_server(greeting_adapter(), AdapterConfig::default()).await;

    server
        .adapter
        .redeploy(&config_with_alias("greeting", "nowhere:hello"))
        .unwrap();

    let res = common::client().get(server.url("/greet")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "");
}

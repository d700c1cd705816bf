//! End-to-end tests: real listener, real HTTP client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use exchange_adapter::adapter::{provider_fn, StaticProvider};
use exchange_adapter::config::AdapterConfig;
use exchange_adapter::http::ResponseHandler;
use exchange_adapter::{handler, inject, Adapter};

mod common;

fn adapter() -> Adapter {
    Adapter::builder()
        .add_injection_provider(
            "jndi",
            StaticProvider::new().with("java:datasources/DefaultDS", "DefaultDS".to_string()),
        )
        .with_fallback(ResponseHandler::new(200, "Default Response"))
        .deploy(|routes, _| {
            routes
                .on_get("/hello", handler(|ex, _| Ok(ex.send("hi")?)))?
                .on_get(
                    "/echo",
                    handler(|ex, _| {
                        let value = ex.get_request_header("X-Test").map(str::to_owned);
                        Ok(ex.send(value)?)
                    }),
                )?
                .on_get(
                    "/testResponseHeaders",
                    handler(|ex, _| Ok(ex.set_response_header("my-header", "my-header-value")?)),
                )?
                .on_get(
                    "/testSendRedirect",
                    handler(|ex, _| Ok(ex.send_redirect("/hello")?)),
                )?
                .on_get(
                    "/params",
                    handler(|ex, _| {
                        let single = ex.query_param("missing").unwrap_or("<none>").to_owned();
                        let multi = ex.query_params("multi").map(|v| v.join(",")).unwrap_or_default();
                        Ok(ex.send(format!("{single}|{multi}"))?)
                    }),
                )?
                .on_get(
                    "/users/{id}",
                    handler(|ex, _| {
                        let id = ex.query_param("id").unwrap_or_default().to_owned();
                        Ok(ex.send(format!("user {id}"))?)
                    }),
                )?
                .on_get(
                    "/testArrayParam",
                    inject(
                        ["$entity:json", "jndi:java:datasources/DefaultDS", "nope:thing"],
                        |ex, params| {
                            let ds = params.get::<String>(1).cloned().unwrap_or_default();
                            let json = params.is_present(0);
                            let unknown = params.is_present(2);
                            Ok(ex.send(format!("Array Param {ds} {json} {unknown}"))?)
                        },
                    ),
                )?
                .on_post(
                    "/json",
                    inject(["$entity:json"], |ex, params| {
                        let name = params
                            .get::<serde_json::Value>(0)
                            .and_then(|v| v["name"].as_str())
                            .unwrap_or("?")
                            .to_owned();
                        Ok(ex.send(name)?)
                    }),
                )?
                .on_get_if(
                    "/negotiate",
                    "header[accept, application/json]",
                    handler(|ex, _| {
                        ex.set_response_header("content-type", "application/json")?;
                        Ok(ex.send(r#"{"kind":"json"}"#)?)
                    }),
                )?
                .on_get("/negotiate", handler(|ex, _| Ok(ex.send("plain")?)))?
                .on_delete("/items/{id}", handler(|ex, _| {
                    ex.set_status(204)?;
                    ex.end_exchange();
                    Ok(())
                }))?
                .on_get("/fail", handler(|_, _| Err("handler exploded".into())))?;
            Ok(())
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_hello() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client().get(server.url("/hello")).send().await.unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "hi");
}

#[tokio::test]
async fn test_echo_request_header() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let client = common::client();

    let res = client
        .get(server.url("/echo"))
        .header("X-Test", "abc")
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "abc");

    let res = client.get(server.url("/echo")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "");
}

#[tokio::test]
async fn test_response_header_without_send() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client()
        .get(server.url("/testResponseHeaders"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["my-header"], "my-header-value");
}

#[tokio::test]
async fn test_send_redirect() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client()
        .get(server.url("/testSendRedirect"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 302);
    assert_eq!(res.headers()["location"], "/hello");
}

#[tokio::test]
async fn test_query_params() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client()
        .get(server.url("/params?multi=b&multi=a&multi=c"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "<none>|b,a,c");
}

#[tokio::test]
async fn test_path_params_visible_as_query_params() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client().get(server.url("/users/42")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "user 42");

    let res = common::client()
        .delete(server.url("/items/7"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 204);
}

#[tokio::test]
async fn test_unmatched_requests_reach_fallback() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let client = common::client();

    let res = client.get(server.url("/nowhere")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "Default Response");

    let res = client.post(server.url("/hello")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "Default Response");
}

#[tokio::test]
async fn test_injections() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let client = common::client();

    let res = client
        .get(server.url("/testArrayParam"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "Array Param DefaultDS false false");

    let res = client
        .post(server.url("/json"))
        .json(&serde_json::json!({ "name": "rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.text().await.unwrap(), "rust");
}

#[tokio::test]
async fn test_predicated_route_precedence() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let client = common::client();

    let res = client
        .get(server.url("/negotiate"))
        .header("accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.text().await.unwrap(), r#"{"kind":"json"}"#);

    let res = client.get(server.url("/negotiate")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "plain");
}

#[tokio::test]
async fn test_handler_error_is_500() {
    let server = common::start_server(adapter(), AdapterConfig::default()).await;
    let res = common::client().get(server.url("/fail")).send().await.unwrap();
    assert_eq!(res.status(), 500);
}

#[tokio::test]
async fn test_handler_invoked_once_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lookups = Arc::new(AtomicUsize::new(0));
    let lookup_counter = lookups.clone();

    let adapter = Adapter::builder()
        .add_injection_provider(
            "count",
            provider_fn(move |_: &str| {
                lookup_counter.fetch_add(1, Ordering::SeqCst);
                None
            }),
        )
        .deploy(move |routes, _| {
            let counter = counter.clone();
            routes.on_get(
                "/once",
                inject(["count:x"], move |ex, params| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert!(!params.is_present(0));
                    Ok(ex.send("ok")?)
                }),
            )?;
            Ok(())
        })
        .build()
        .unwrap();

    let server = common::start_server(adapter, AdapterConfig::default()).await;
    let client = common::client();
    for _ in 0..3 {
        let res = client.get(server.url("/once")).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(lookups.load(Ordering::SeqCst), 3);
}

//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use exchange_adapter::config::AdapterConfig;
use exchange_adapter::http::HttpServer;
use exchange_adapter::lifecycle::Shutdown;
use exchange_adapter::Adapter;
use tokio::net::TcpListener;

/// A running server on an ephemeral port. Shuts down when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    #[allow(dead_code)]
    pub adapter: Arc<Adapter>,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Deploy `adapter` with `config` and serve it on 127.0.0.1:0.
pub async fn start_server(adapter: Adapter, config: AdapterConfig) -> TestServer {
    let adapter = Arc::new(adapter);
    adapter.start(&config).expect("initial deployment failed");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, adapter.handler());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        adapter,
        shutdown,
    }
}

/// A client that never follows redirects and bypasses system proxies.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

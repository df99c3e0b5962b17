#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;

pub const ENGINE_BODY: &str = "\
# HELP engine_started engine start count
# TYPE engine_started counter
engine_started 3
# HELP pool_count
# TYPE pool_count gauge
pool_count 0
";

/// Serves `router` on an ephemeral loopback port for the rest of the test.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    addr
}

pub async fn metrics_server(body: &'static str) -> SocketAddr {
    spawn_server(Router::new().route("/metrics", get(move || async move { body }))).await
}

pub async fn failing_server(status: StatusCode) -> SocketAddr {
    spawn_server(Router::new().route("/metrics", get(move || async move { (status, "boom") }))).await
}

pub async fn slow_server(delay: Duration) -> SocketAddr {
    spawn_server(Router::new().route(
        "/metrics",
        get(move || async move {
            tokio::time::sleep(delay).await;
            ENGINE_BODY
        }),
    ))
    .await
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind probe listener");
    let port = listener.local_addr().expect("probe address").port();
    drop(listener);
    port
}

#![allow(dead_code)]

use std::net::SocketAddr;
use std::process::Command;
use std::sync::mpsc;
use std::thread;

use assert_cmd::prelude::*;
use axum::{routing::get, Router};
use tokio::net::TcpListener;

pub fn cli() -> Command {
    let mut cmd = Command::cargo_bin("telemetry-admin").expect("binary exists");
    cmd.env_remove("TELEMETRY_HOST_LIST")
        .env_remove("TELEMETRY_PORT")
        .env_remove("TELEMETRY_MAX_CONCURRENCY");
    cmd
}

/// Serves `router` on an ephemeral loopback port from a background runtime.
///
/// The CLI runs as a blocking child process, so the server gets its own
/// thread and lives until the test binary exits.
pub fn spawn_server(router: Router) -> SocketAddr {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime");
        runtime.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test listener");
            tx.send(listener.local_addr().expect("listener address"))
                .expect("report listener address");
            axum::serve(listener, router).await.expect("test server");
        });
    });
    rx.recv().expect("test server started")
}

/// Serves `body` at `/metrics` and returns the port.
pub fn serve_body(body: &'static str) -> u16 {
    spawn_server(Router::new().route("/metrics", get(move || async move { body }))).port()
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    listener.local_addr().expect("probe address").port()
}

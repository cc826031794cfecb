//! Demo server binary.
//!
//! Serves a couple of JSON endpoints on the port given as the first argument
//! (default 8080) and shuts down gracefully on Ctrl-C.

use std::env;

use micro_api::{CorsMode, HttpApp, HttpOptions, JsonHandler};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let port = env::args().nth(1).and_then(|value| value.parse().ok()).unwrap_or(8080);

    let app = HttpApp::builder()
        .options(HttpOptions { cors_mode: CorsMode::Allow, ..Default::default() })
        .service(
            "/api/echo",
            JsonHandler::new(|action, payload| async move {
                Ok(Some(json!({ "action": action, "payload": payload })))
            }),
        )
        .service("/api/ping", JsonHandler::new(|_action, _payload| async move { Ok(None) }))
        .build();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    if let Err(e) = app.start_server(port, shutdown).await {
        error!(cause = %e, "server failed");
        std::process::exit(1);
    }
}

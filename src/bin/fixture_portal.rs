// Standalone fixture portal binary

use std::net::SocketAddr;
use tracing::{Level, info};

// Include the shared portal app
include!("../../tests/portal_app.rs");

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let app = create_app().await;

    // Parse port from args or use default
    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    info!("Fixture portal listening on http://{}", addr);
    info!("  WMS:    http://{}/wms/", addr);
    info!("  Labels: http://{}/label/task/", addr);
    info!("  Store:  http://{}/store/ECGO/C2CPickup", addr);

    axum::serve(listener, app).await.expect("Server failed");
}

// Finance Dashboard - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use finance_dashboard::api::{self, AppState};
use finance_dashboard::config::Settings;
use finance_dashboard::db;
use finance_dashboard::logging::{init_tracing, LogSink};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log_filter, LogSink::Stderr)?;

    println!("🌐 Finance Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = db::open_database(&settings.database_path)?;
    println!("✓ Database opened: {}", settings.database_path.display());
    tracing::info!(transactions = db::verify_count(&conn)?, "store ready");

    let app = api::router(AppState::new(conn)).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_address))?;

    println!("\n🚀 Server running on http://{}", settings.bind_address);
    println!("   API: http://{}/api/transactions", settings.bind_address);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server stopped with an error")?;
    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use parish_giving::config::AppConfig;
use parish_giving::database::connection::get_db_pool;
use parish_giving::services::mpesa_service::MpesaService;
use parish_giving::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("🔧 Config: {}", config.get_config_info());

    let db = get_db_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let app_state = initialize_app_state(db, &config).await;
    let app = parish_giving::build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("HOST/PORT do not form a socket address")?;
    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn initialize_app_state(db: sqlx::PgPool, config: &AppConfig) -> AppState {
    let app_state = AppState::new(db, config);

    let Some(mpesa_config) = config.mpesa.clone() else {
        tracing::warn!("M-Pesa credentials not configured, giving will be disabled");
        return app_state;
    };

    tracing::info!("🔧 Attempting to initialize M-Pesa service...");
    tracing::info!("📱 Short code: {}", mpesa_config.short_code);
    tracing::info!("🌐 Environment: {}", mpesa_config.environment);

    let mpesa_service = match MpesaService::new(mpesa_config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            tracing::error!("❌ Failed to create M-Pesa client: {}", e);
            return app_state;
        }
    };

    // Verify credentials up front so a bad key shows in the boot log.
    match mpesa_service.get_access_token().await {
        Ok(_) => tracing::info!("✅ M-Pesa access token obtained"),
        Err(e) => tracing::warn!("⚠️ M-Pesa token check failed, will retry per request: {}", e),
    }

    app_state.with_mpesa(mpesa_service)
}

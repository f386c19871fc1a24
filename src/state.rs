use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::database::{GivingRepository, PgGivingRepository};
use crate::services::giving_service::GivingService;
use crate::services::mpesa_service::MpesaGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub giving: GivingService,
    pub jwt_secret: Arc<str>,
    pub session_ttl_hours: i64,
    pub cors_origins: Arc<[String]>,
}

impl AppState {
    pub fn new(db: PgPool, config: &AppConfig) -> Self {
        let repository: Arc<dyn GivingRepository> = Arc::new(PgGivingRepository::new(db.clone()));

        AppState {
            giving: GivingService::new(repository, None, config.min_giving_amount),
            db,
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
            session_ttl_hours: config.session_ttl_hours,
            cors_origins: Arc::from(config.cors_origins.as_slice()),
        }
    }

    pub fn with_mpesa(mut self, gateway: Arc<dyn MpesaGateway>) -> Self {
        self.giving = self.giving.with_gateway(gateway);
        self
    }
}

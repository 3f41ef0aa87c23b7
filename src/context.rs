/// Application context and dependency injection
use crate::{
    catalog::ProductCatalog,
    config::AppConfig,
    db,
    error::ApiResult,
    inventory::InventoryManager,
    mailer::Mailer,
    orders::OrderStore,
    payments::StripeClient,
    users::UserDirectory,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: SqlitePool,
    pub users: Arc<UserDirectory>,
    pub catalog: Arc<ProductCatalog>,
    pub inventory: Arc<InventoryManager>,
    pub orders: Arc<OrderStore>,
    pub mailer: Arc<Mailer>,
    /// Present only when STRIPE_SECRET_KEY is configured
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: AppConfig) -> ApiResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize database
        let pool = db::create_pool(&config.database.path, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let users = Arc::new(UserDirectory::new(pool.clone()));

        // Seed or upgrade the statically configured admin account
        if let Some(admin) = &config.auth.admin {
            users.ensure_admin(admin).await?;
            tracing::info!("Admin account ensured for {}", admin.email);
        }

        let catalog = Arc::new(ProductCatalog::new(pool.clone()));
        let inventory = Arc::new(InventoryManager::new(pool.clone()));
        let orders = Arc::new(OrderStore::new(pool.clone()));

        let mailer = Arc::new(Mailer::new(config.email.clone())?);
        if !mailer.is_configured() {
            tracing::info!("Email delivery disabled; codes will be logged instead");
        }

        let stripe = match &config.payments.stripe_secret_key {
            Some(key) => Some(Arc::new(StripeClient::new(key.clone())?)),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set; payment endpoints disabled");
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            users,
            catalog,
            inventory,
            orders,
            mailer,
            stripe,
        })
    }
}

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use subchat_agent::{ChatService, LlmClient, OpenAiClient};
use subchat_core::admission::AdmissionGate;
use subchat_core::config::{AppConfig, ConfigError, LoadOptions};
use subchat_db::repositories::{
    SqlBillingRepository, SqlCustomerRepository, SqlPlanRepository, SqlSubscriptionRepository,
};
use subchat_db::{connect_with_settings, migrations, seed_demo_data, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub gate: Arc<AdmissionGate>,
    pub chat: Arc<ChatService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("demo data seeding failed: {0}")]
    Seed(#[source] sqlx::Error),
    #[error("model backend client could not be built: {0}")]
    Llm(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let seeded = seed_demo_data(&db_pool).await.map_err(BootstrapError::Seed)?;
    info!(
        event_name = "system.bootstrap.demo_data_seeded",
        plans = seeded.plans,
        customers = seeded.customers,
        "demo catalog available"
    );

    let llm: Option<Arc<dyn LlmClient>> = if config.llm.enabled {
        let client = OpenAiClient::from_config(&config.llm)
            .map_err(|error| BootstrapError::Llm(error.to_string()))?;
        info!(
            event_name = "system.bootstrap.llm_enabled",
            model = %config.llm.model,
            base_url = %config.llm.base_url,
            "model backend configured"
        );
        Some(Arc::new(client))
    } else {
        info!(
            event_name = "system.bootstrap.llm_disabled",
            "running with lexical resolution only"
        );
        None
    };

    let chat = Arc::new(ChatService::new(
        Arc::new(SqlCustomerRepository::new(db_pool.clone())),
        Arc::new(SqlPlanRepository::new(db_pool.clone())),
        Arc::new(SqlSubscriptionRepository::new(db_pool.clone())),
        Arc::new(SqlBillingRepository::new(db_pool.clone())),
        llm,
    ));

    let gate = Arc::new(AdmissionGate::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_secs),
    ));
    spawn_gate_sweeper(gate.clone(), Duration::from_secs(config.rate_limit.sweep_interval_secs));

    Ok(Application { config, db_pool, gate, chat })
}

/// The gate evicts expired windows lazily on access; this task bounds
/// memory for identities that never come back.
fn spawn_gate_sweeper(gate: Arc<AdmissionGate>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = gate.sweep_expired();
            if swept > 0 {
                info!(
                    event_name = "admission.sweep",
                    swept,
                    tracked = gate.tracked_identities(),
                    "expired rate-limit windows evicted"
                );
            }
        }
    });
}

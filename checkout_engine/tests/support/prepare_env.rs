use checkout_engine::{
    events::EventProducers,
    PaymentFlowApi,
    SettlementConfig,
    SettlementDatabase,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::support::fakes::{FixedPricing, ScriptedCharger};

pub type TestApi = PaymentFlowApi<SqliteDatabase, FixedPricing, ScriptedCharger>;

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/checkout_it_{}.db", dir.display(), rand::random::<u64>())
}

/// Loads `.env.test`, starts logging, and returns a freshly migrated database at `url`.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping stale database");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    debug!("🚀️ Created Sqlite database {url}");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}

/// Short timeouts so that the slow-path tests finish quickly.
pub fn test_config() -> SettlementConfig {
    SettlementConfig::default()
        .with_pricing_timeout(std::time::Duration::from_millis(500))
        .with_charge_timeout(std::time::Duration::from_millis(500))
        .with_lease_duration(std::time::Duration::from_secs(5))
}

pub async fn setup(pricing: FixedPricing, charger: ScriptedCharger, producers: EventProducers) -> TestApi {
    let db = prepare_test_env(&random_db_path()).await;
    PaymentFlowApi::new(db, pricing, charger, test_config(), producers)
}

pub async fn tear_down<P, C>(mut api: PaymentFlowApi<SqliteDatabase, P, C>) {
    let url = api.db().url().to_string();
    if let Err(e) = api.db_mut().close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not remove {url}: {e}");
    }
}

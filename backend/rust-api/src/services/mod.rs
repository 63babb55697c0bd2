use crate::config::Config;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::{Clock, SystemClock};
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // The Redis container may still be coming up when we are.
        let ping_conn = redis.clone();
        retry_async_with_config(RetryConfig::startup(), || {
            let mut conn = ping_conn.clone();
            async move {
                tokio::time::timeout(
                    std::time::Duration::from_secs(5),
                    redis::cmd("PING").query_async::<String>(&mut conn),
                )
                .await
                .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))?
                .map_err(anyhow::Error::from)
            }
        })
        .await?;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
            clock: Arc::new(SystemClock),
        })
    }
}

pub mod account_service;
pub mod auth_service;
pub mod catalog_service;
pub mod dashboard_service;
pub mod goal_service;
pub mod progress_service;
pub mod quiz_service;

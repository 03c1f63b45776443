use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::store::{FsImageStore, ImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let opts = SqliteConnectOptions::from_str(&config.database_url)
            .context("parse DATABASE_URL")?
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .context("connect to database")?;

        let images = Arc::new(
            FsImageStore::new(config.upload_dir.clone())
                .await
                .context("create upload directory")?,
        ) as Arc<dyn ImageStore>;

        Ok(Self { db, config, images })
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, images: Arc<dyn ImageStore>) -> Self {
        Self { db, config, images }
    }
}

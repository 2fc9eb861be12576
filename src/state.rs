use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::password::CredentialHasher;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer};
use crate::posts::repo::{PgPostStore, PostStore};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    pub mailer: Arc<dyn Mailer>,
    pub clock: Arc<dyn Clock>,
    pub hasher: CredentialHasher,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let hasher = CredentialHasher::new(&config.hashing)?;

        Ok(Self {
            config,
            users: Arc::new(PgUserStore::new(db.clone())),
            posts: Arc::new(PgPostStore::new(db)),
            mailer: Arc::new(LogMailer),
            clock: Arc::new(SystemClock),
            hasher,
        })
    }

    pub fn now(&self) -> time::OffsetDateTime {
        self.clock.now()
    }

    pub fn reset_window(&self) -> time::Duration {
        time::Duration::minutes(self.config.reset_expiry_minutes)
    }
}

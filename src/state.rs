use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::access::AccessControl;
use crate::config::AppConfig;
use crate::mail::{LogMailer, Mailer};
use crate::store::{DocumentStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
    pub access: Arc<AccessControl>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let store = Arc::new(PgStore::new(
            pool,
            Duration::from_secs(config.store_timeout_secs),
        )) as Arc<dyn DocumentStore>;
        let access = Arc::new(AccessControl::new(config.admin_emails.clone()));
        let mailer = Arc::new(LogMailer) as Arc<dyn Mailer>;

        Ok(Self {
            store,
            config,
            access,
            mailer,
        })
    }

    pub fn from_parts(
        store: Arc<dyn DocumentStore>,
        config: Arc<AppConfig>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let access = Arc::new(AccessControl::new(config.admin_emails.clone()));
        Self {
            store,
            config,
            access,
            mailer,
        }
    }

    /// In-memory state for unit tests: no database, no real mail.
    pub fn fake() -> Self {
        use crate::config::JwtConfig;

        let config = Arc::new(AppConfig {
            database_url: "postgres://localhost/unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_hours: 24,
            },
            admin_emails: vec!["admin@studyhive.test".into()],
            store_timeout_secs: 5,
        });
        Self::from_parts(
            Arc::new(MemoryStore::new()),
            config,
            Arc::new(LogMailer),
        )
    }
}

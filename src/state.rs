use std::sync::Arc;

use tracing::info;

use crate::{
    auth::{jwt::TokenService, password::Hasher, sessions::SessionRegistry},
    config::{AppConfig, StoreBackend},
    db::{self, Deadline},
    tasks::{memory::MemoryTaskStore, repo::PgTaskStore, repo::TaskStore},
    users::{memory::MemoryUserStore, repo::PgUserStore, repo::UserStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub tokens: TokenService,
    pub sessions: SessionRegistry,
    pub hasher: Hasher,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let (users, tasks): (Arc<dyn UserStore>, Arc<dyn TaskStore>) = match config.backend {
            StoreBackend::Postgres => {
                let pool = db::connect(&config).await?;
                info!(max_connections = config.db_max_connections, "postgres store ready");
                (
                    Arc::new(PgUserStore::new(pool.clone())),
                    Arc::new(PgTaskStore::new(pool)),
                )
            }
            StoreBackend::Memory => {
                info!("in-memory store ready; data is lost on exit");
                (
                    Arc::new(MemoryUserStore::default()),
                    Arc::new(MemoryTaskStore::default()),
                )
            }
        };
        let hasher = Hasher::from_config(&config.hash)?;
        Ok(Self::from_parts(Arc::new(config), users, tasks, hasher))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        hasher: Hasher,
    ) -> Self {
        Self {
            tokens: TokenService::new(&config.jwt),
            sessions: SessionRegistry::new(users.clone()),
            config,
            users,
            tasks,
            hasher,
        }
    }

    /// Budget for every storage call made while serving one request.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.storage_timeout())
    }

    /// In-memory stores, a fixed test JWT config and cheap argon2 parameters.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{HashConfig, JwtConfig};

        let hash = HashConfig {
            memory_kib: Some(1024),
            iterations: Some(1),
        };
        let config = Arc::new(AppConfig {
            backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            storage_timeout_ms: 5_000,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            hash: hash.clone(),
        });
        let hasher = Hasher::from_config(&hash).expect("cheap argon2 params are valid");
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::default()),
            Arc::new(MemoryTaskStore::default()),
            hasher,
        )
    }
}

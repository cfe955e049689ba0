use std::sync::Arc;

use tracing::warn;

use crate::auth::service::AuthService;
use crate::config::AppConfig;
use crate::db::{MemoryUserStore, PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub auth: AuthService,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = match &config.database_url {
            Some(url) => Arc::new(PgUserStore::connect(url).await?) as Arc<dyn UserStore>,
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on restart");
                Arc::new(MemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };
        Ok(Self::from_parts(Arc::new(config), store))
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> Self {
        let auth = AuthService::new(store.clone());
        Self {
            config,
            store,
            auth,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(MemoryUserStore::new()))
    }

    #[cfg(test)]
    pub fn fake_with(store: Arc<dyn UserStore>) -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: None,
            session: crate::config::SessionConfig {
                ttl_minutes: 5,
                cookie_secure: false,
            },
        });
        Self::from_parts(config, store)
    }
}

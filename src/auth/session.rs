//! Server-side sessions via `tower-sessions`. The `sid` cookie only carries
//! the session id; the record holds the user id under [`USER_ID_KEY`] and
//! any pending flash message.

use time::Duration;
use tower_sessions::{cookie::SameSite, session, Expiry, MemoryStore, Session, SessionManagerLayer};
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;

pub const SESSION_COOKIE: &str = "sid";
pub const USER_ID_KEY: &str = "user_id";

/// Session middleware. Records expire after `ttl_minutes` of inactivity.
pub fn layer(cfg: &SessionConfig) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(cfg.cookie_secure)
        .with_expiry(Expiry::OnInactivity(Duration::minutes(cfg.ttl_minutes)))
}

/// Binds the session to `user_id`. The id is cycled so a pre-login
/// session id never becomes an authenticated one.
pub async fn start(session: &Session, user_id: Uuid) -> Result<(), session::Error> {
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user_id).await?;
    debug!(%user_id, "session started");
    Ok(())
}

pub async fn user_id(session: &Session) -> Result<Option<Uuid>, session::Error> {
    session.get(USER_ID_KEY).await
}

/// Deletes the record; a replayed cookie then resolves to nothing.
pub async fn end(session: &Session) -> Result<(), session::Error> {
    session.flush().await
}

#[cfg(test)]
pub fn detached() -> Session {
    Session::new(None, std::sync::Arc::new(MemoryStore::default()), None)
}

use std::sync::Arc;

use anyhow::Context;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};

use super::{
    dto::Credentials,
    password::{hash_password, verify_password},
    session,
};
use crate::{
    db::{StoreError, User, UserStore},
    error::AppError,
};

/// Why an authentication step failed. Unknown user and wrong password stay
/// distinct here for logging; clients only ever see "Invalid credentials".
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown username")]
    UnknownUser,
    #[error("incorrect password")]
    WrongPassword,
    #[error("no active session")]
    NoSession,
    #[error("session: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Credential checks and session binding over an injected store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, creds), fields(username = %creds.username))]
    pub async fn signup(&self, creds: Credentials) -> Result<User, AppError> {
        if self.store.find_by_username(&creds.username).await?.is_some() {
            warn!("username already registered");
            return Err(StoreError::DuplicateUsername(creds.username).into());
        }

        let password = creds.password;
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("hash task")??;

        let user = self.store.insert(&creds.username, &hash).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Checks the credentials and, on a match, binds `session` to the user.
    #[instrument(skip(self, session, creds), fields(username = %creds.username))]
    pub async fn authenticate(
        &self,
        session: &Session,
        creds: &Credentials,
    ) -> Result<User, AuthError> {
        let user = match self.store.find_by_username(&creds.username).await? {
            Some(u) => u,
            None => {
                warn!("login unknown username");
                return Err(AuthError::UnknownUser);
            }
        };

        let password = creds.password.clone();
        let hash = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("verify task")??;
        if !ok {
            warn!(user_id = %user.id, "login incorrect password");
            return Err(AuthError::WrongPassword);
        }

        session::start(session, user.id).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    /// Re-fetches the session's user on every call. A session whose user is
    /// gone is destroyed.
    pub async fn resolve(&self, session: &Session) -> Result<User, AuthError> {
        let user_id = session::user_id(session)
            .await?
            .ok_or(AuthError::NoSession)?;
        match self.store.find_by_id(user_id).await? {
            Some(user) => Ok(user),
            None => {
                warn!(%user_id, "session user no longer exists");
                session::end(session).await?;
                Err(AuthError::NoSession)
            }
        }
    }

    pub async fn logout(&self, session: &Session) -> Result<(), AuthError> {
        session::end(session).await?;
        debug!("user logged out");
        Ok(())
    }
}

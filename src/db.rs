use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// A user document. Activities are embedded and saved together with the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never plaintext
    pub activities: Vec<Activity>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Activity {
    pub id: Uuid,
    #[schema(example = "Yoga")]
    pub name: String,
    #[serde(with = "iso_date")]
    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub date: Date,
}

impl User {
    pub fn activity(&self, id: Uuid) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    pub fn add_activity(&mut self, name: String, date: Date) -> &Activity {
        self.activities.push(Activity {
            id: Uuid::new_v4(),
            name,
            date,
        });
        &self.activities[self.activities.len() - 1]
    }

    /// Only the name changes; id and date are kept.
    pub fn rename_activity(&mut self, id: Uuid, name: String) -> Option<&Activity> {
        let activity = self.activities.iter_mut().find(|a| a.id == id)?;
        activity.name = name;
        Some(activity)
    }

    pub fn remove_activity(&mut self, id: Uuid) -> Option<Activity> {
        let idx = self.activities.iter().position(|a| a.id == id)?;
        Some(self.activities.remove(idx))
    }
}

pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::{macros::format_description, Date};

    pub fn format(date: &Date) -> String {
        date.format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_default()
    }

    pub fn parse(text: &str) -> Option<Date> {
        Date::parse(text, format_description!("[year]-[month]-[day]")).ok()
    }

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let text = String::deserialize(d)?;
        parse(&text).ok_or_else(|| serde::de::Error::custom(format!("invalid date `{text}`")))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username `{0}` is already taken")]
    DuplicateUsername(String),
    #[error("user {0} does not exist")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for user documents. `save` replaces the whole document.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// The user whose collection holds `activity_id`, whoever that is.
    async fn find_by_activity(&self, activity_id: Uuid) -> Result<Option<User>, StoreError>;
    async fn save(&self, user: &User) -> Result<(), StoreError>;
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    activities: Json<Vec<Activity>>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            activities: r.activities.0,
            created_at: r.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        Ok(Self { db })
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash, activities)
            VALUES ($1, $2, $3, '[]'::jsonb)
            RETURNING id, username, password_hash, activities, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateUsername(username.to_string())
            }
            other => StoreError::Database(other),
        })?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, activities, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, activities, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_activity(&self, activity_id: Uuid) -> Result<Option<User>, StoreError> {
        let needle = serde_json::json!([{ "id": activity_id }]);
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, activities, created_at
            FROM users
            WHERE activities @> $1
            "#,
        )
        .bind(Json(needle))
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::from))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let res = sqlx::query(r#"UPDATE users SET activities = $2 WHERE id = $1"#)
            .bind(user.id)
            .bind(Json(&user.activities))
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound(user.id));
        }
        debug!(user_id = %user.id, activities = user.activities.len(), "user saved");
        Ok(())
    }
}

/// In-process store with the same contract as [`PgUserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn remove(&self, id: Uuid) -> Option<User> {
        self.users.write().await.remove(&id)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            activities: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_activity(&self, activity_id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.activity(activity_id).is_some())
            .cloned())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(user.id)),
        }
    }
}

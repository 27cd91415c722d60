use authhub_core::AuthError;
use crate::{Session, SessionData, SessionStore};
use async_trait::async_trait;
use sqlx::Database;

/// A session store backed by a SQL table.
///
/// Session data is kept as a JSON document next to a unix-seconds expiry column:
///
/// ```sql
/// CREATE TABLE authhub_sessions (id TEXT PRIMARY KEY, data TEXT NOT NULL, expires_at BIGINT NOT NULL)
/// ```
#[derive(Clone, Debug)]
pub struct SqlStore<DB: Database> {
    pool: sqlx::Pool<DB>,
    table_name: String,
}

impl<DB: Database> SqlStore<DB> {
    pub fn new(pool: sqlx::Pool<DB>) -> Self {
        Self {
            pool,
            table_name: "authhub_sessions".to_string(),
        }
    }

    pub fn with_table_name(pool: sqlx::Pool<DB>, table_name: String) -> Self {
        Self { pool, table_name }
    }
}

fn encode(session: &Session) -> Result<String, AuthError> {
    serde_json::to_string(&session.data)
        .map_err(|e| AuthError::Session(format!("Session serialization error: {}", e)))
}

fn decode(id: String, data: &str, expires_at: i64) -> Result<Session, AuthError> {
    let data: SessionData = serde_json::from_str(data)
        .map_err(|e| AuthError::Session(format!("Session deserialization error: {}", e)))?;
    let expires_at = chrono::DateTime::from_timestamp(expires_at, 0)
        .ok_or_else(|| AuthError::Session(format!("Invalid expiry timestamp {}", expires_at)))?;
    Ok(Session {
        id,
        data,
        expires_at,
    })
}

#[cfg(feature = "postgres")]
impl SqlStore<sqlx::Postgres> {
    /// Create the session table if it does not exist.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, data TEXT NOT NULL, expires_at BIGINT NOT NULL)",
            self.table_name
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Postgres migrate error: {}", e)))?;
        Ok(())
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl SessionStore for SqlStore<sqlx::Postgres> {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, AuthError> {
        let query = format!(
            "SELECT id, data, expires_at FROM {} WHERE id = $1 AND expires_at > $2",
            self.table_name
        );
        let row: Option<(String, String, i64)> = sqlx::query_as(&query)
            .bind(id)
            .bind(chrono::Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Postgres load_session error: {}", e)))?;

        row.map(|(id, data, expires_at)| decode(id, &data, expires_at))
            .transpose()
    }

    async fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        let query = format!(
            "INSERT INTO {} (id, data, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT(id) DO UPDATE SET data = $2, expires_at = $3",
            self.table_name
        );
        sqlx::query(&query)
            .bind(&session.id)
            .bind(encode(session)?)
            .bind(session.expires_at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Postgres save_session error: {}", e)))?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), AuthError> {
        let query = format!("DELETE FROM {} WHERE id = $1", self.table_name);
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Postgres delete_session error: {}", e)))?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AuthError> {
        let query = format!("DELETE FROM {} WHERE expires_at <= $1", self.table_name);
        let result = sqlx::query(&query)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Postgres delete_expired error: {}", e)))?;
        Ok(result.rows_affected())
    }
}

#[cfg(feature = "sqlite")]
impl SqlStore<sqlx::Sqlite> {
    /// Create the session table if it does not exist.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, data TEXT NOT NULL, expires_at INTEGER NOT NULL)",
            self.table_name
        );
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Sqlite migrate error: {}", e)))?;
        Ok(())
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl SessionStore for SqlStore<sqlx::Sqlite> {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, AuthError> {
        let query = format!(
            "SELECT id, data, expires_at FROM {} WHERE id = ?1 AND expires_at > ?2",
            self.table_name
        );
        let row: Option<(String, String, i64)> = sqlx::query_as(&query)
            .bind(id)
            .bind(chrono::Utc::now().timestamp())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Sqlite load_session error: {}", e)))?;

        row.map(|(id, data, expires_at)| decode(id, &data, expires_at))
            .transpose()
    }

    async fn save_session(&self, session: &Session) -> Result<(), AuthError> {
        let query = format!(
            "INSERT INTO {} (id, data, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = ?2, expires_at = ?3",
            self.table_name
        );
        sqlx::query(&query)
            .bind(&session.id)
            .bind(encode(session)?)
            .bind(session.expires_at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Sqlite save_session error: {}", e)))?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), AuthError> {
        let query = format!("DELETE FROM {} WHERE id = ?1", self.table_name);
        sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Sqlite delete_session error: {}", e)))?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AuthError> {
        let query = format!("DELETE FROM {} WHERE expires_at <= ?1", self.table_name);
        let result = sqlx::query(&query)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Session(format!("Sqlite delete_expired error: {}", e)))?;
        Ok(result.rows_affected())
    }
}

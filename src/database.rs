// SQLite-backed session journal, available with the `database` feature

#[cfg(feature = "database")]
use anyhow::Result;
#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Row, SqlitePool};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::session::{Session, SessionJournal, StoreError};

#[cfg(feature = "database")]
/// Durable session snapshots in SQLite, one row per session version
pub struct SqliteJournal {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteJournal {
    /// Open (creating if needed) the database and run embedded migrations
    pub async fn connect(database_url: &str, max_connections: u32, auto_migrate: bool) -> Result<Self> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl SessionJournal for SqliteJournal {
    async fn append(&self, session: &Session) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(session)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO session_snapshots (session_id, version, machine_id, state, snapshot, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            "#,
        )
        .bind(&session.id)
        .bind(session.version as i64)
        .bind(session.machine_id.as_str())
        .bind(&session.state)
        .bind(snapshot)
        .execute(&self.pool)
        .await
        .map_err(StoreError::unavailable)?;

        Ok(())
    }

    async fn latest(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT snapshot
            FROM session_snapshots
            WHERE session_id = ?1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::unavailable)?;

        match row {
            Some(row) => {
                let snapshot: String = row.get("snapshot");
                Ok(Some(serde_json::from_str(&snapshot)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::machine::MachineId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn snapshots_round_trip_through_sqlite() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("sessions.db").display());
        let journal = SqliteJournal::connect(&url, 1, true).await.unwrap();

        let mut session = Session::new("S1", "+254700000001", "*384#", MachineId::Main, "mainMenu", 180);
        journal.append(&session).await.unwrap();
        session.version = 2;
        session.state = "help".to_string();
        journal.append(&session).await.unwrap();

        let latest = journal.latest("S1").await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.state, "help");
        assert!(journal.latest("S2").await.unwrap().is_none());
    }
}

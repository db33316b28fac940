use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::db::models::{ImageRecord, ImageUpsert, UserDetailsInsert, UserDetailsRow};

const WRITER_QUEUE_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    sender: mpsc::Sender<UserDetailsInsert>,
}

impl Database {
    pub async fn init(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS images (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                username TEXT NOT NULL UNIQUE,\
                image_url TEXT NOT NULL,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_images_created_at ON images(created_at);")
            .execute(&pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_details (\
                username TEXT PRIMARY KEY,\
                content TEXT NOT NULL,\
                updated_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        info!("Database tables created successfully");

        let (sender, receiver) = mpsc::channel(WRITER_QUEUE_CAPACITY);
        let writer_pool = pool.clone();
        tokio::spawn(async move {
            db_writer(writer_pool, receiver).await;
        });

        info!("Database writer task started");

        Ok(Database { pool, sender })
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRecord>(
            "SELECT id, username, image_url, created_at FROM images ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        debug!("list_images found {} records", rows.len());
        Ok(rows)
    }

    pub async fn get_image_by_username(&self, username: &str) -> Result<Option<ImageRecord>> {
        let row = sqlx::query_as::<_, ImageRecord>(
            "SELECT id, username, image_url, created_at FROM images WHERE username = ?",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Inserts a gallery entry or replaces the image of an existing one.
    pub async fn upsert_image(&self, upsert: ImageUpsert) -> Result<ImageRecord> {
        let username = upsert.username.to_lowercase();
        let record = sqlx::query_as::<_, ImageRecord>(
            "INSERT INTO images (username, image_url, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(username) DO UPDATE SET \
             image_url = excluded.image_url, \
             created_at = excluded.created_at \
             RETURNING id, username, image_url, created_at",
        )
        .bind(&username)
        .bind(&upsert.image_url)
        .bind(upsert.created_at)
        .fetch_one(&self.pool)
        .await?;
        info!("upsert_image stored image for {}", username);
        Ok(record)
    }

    pub async fn get_user_details(&self, username: &str) -> Result<Option<UserDetailsRow>> {
        let row = sqlx::query_as::<_, UserDetailsRow>(
            "SELECT username, content, updated_at FROM user_details WHERE username = ?",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn save_user_details(&self, insert: UserDetailsInsert) -> Result<()> {
        write_user_details(&self.pool, insert).await
    }

    /// Hands the cache write to the background writer.
    pub async fn queue_user_details(&self, username: &str, content: &str) -> Result<()> {
        let insert = UserDetailsInsert {
            username: username.to_lowercase(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        self.sender
            .send(insert)
            .await
            .map_err(|err| anyhow::anyhow!("Failed to queue user details write: {err}"))
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn write_user_details(pool: &SqlitePool, insert: UserDetailsInsert) -> Result<()> {
    sqlx::query(
        "INSERT INTO user_details (username, content, updated_at) VALUES (?, ?, ?) \
         ON CONFLICT(username) DO UPDATE SET \
         content = excluded.content, \
         updated_at = excluded.updated_at",
    )
    .bind(insert.username)
    .bind(insert.content)
    .bind(insert.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

async fn db_writer(pool: SqlitePool, mut receiver: mpsc::Receiver<UserDetailsInsert>) {
    while let Some(insert) = receiver.recv().await {
        let username = insert.username.clone();
        if let Err(err) = write_user_details(&pool, insert).await {
            warn!("Error caching user details for {username}: {err}");
        }
    }

    info!("Database writer task stopped");
}

#[cfg(test)]
pub(crate) async fn memory_database() -> Database {
    Database::init("sqlite::memory:", 1)
        .await
        .expect("in-memory database")
}

//! Durable key/value store with serialized access
//!
//! All reads and writes go through one worker task that owns the database
//! pool. The worker drains its command channel in submission order, so
//! interleaved operations from concurrent callers execute FIFO and a
//! read-after-write from the same caller always observes the write.
//! `set_many` applies several writes inside a single transaction for the
//! callers that need two keys to move together.

use drift_common::{Error, Result};
use sqlx::{Pool, Sqlite};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

enum StoreCommand {
    Get {
        key: String,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    Set {
        key: String,
        value: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetMany {
        pairs: Vec<(String, String)>,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cheaply cloneable handle submitting commands to the store worker
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    /// Spawn the store worker on the given pool and return a handle to it
    pub fn spawn(pool: Pool<Sqlite>) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(run_store(pool, rx));
        Self { tx }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            StoreCommand::Get {
                key: key.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            StoreCommand::Set {
                key: key.to_string(),
                value: value.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Apply several writes as one unit, in order, inside a transaction
    pub async fn set_many(&self, pairs: Vec<(String, String)>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(StoreCommand::SetMany { pairs, reply }, rx).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.submit(
            StoreCommand::Remove {
                key: key.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    async fn submit<T>(&self, command: StoreCommand, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.tx.send(command).await.map_err(|_| worker_gone())?;
        rx.await.map_err(|_| worker_gone())?
    }
}

fn worker_gone() -> Error {
    Error::Internal("durable store worker is gone".to_string())
}

async fn run_store(pool: Pool<Sqlite>, mut rx: mpsc::Receiver<StoreCommand>) {
    debug!("Durable store worker started");

    while let Some(command) = rx.recv().await {
        match command {
            StoreCommand::Get { key, reply } => {
                let _ = reply.send(get_value(&pool, &key).await);
            }
            StoreCommand::Set { key, value, reply } => {
                let _ = reply.send(set_value(&pool, &key, &value).await);
            }
            StoreCommand::SetMany { pairs, reply } => {
                let _ = reply.send(set_values(&pool, &pairs).await);
            }
            StoreCommand::Remove { key, reply } => {
                let _ = reply.send(remove_value(&pool, &key).await);
            }
        }
    }

    debug!("Durable store worker stopped");
}

async fn get_value(pool: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

async fn set_value(pool: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

async fn set_values(pool: &Pool<Sqlite>, pairs: &[(String, String)]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for (key, value) in pairs {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value)
            VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn remove_value(pool: &Pool<Sqlite>, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

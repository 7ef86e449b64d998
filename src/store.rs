//! Task store: append-only insert surface over the `tasks` table.
//!
//! Completed tasks are write-once: there is no update or delete surface.
//! Concurrent inserts are independent single-row statements and rely on the
//! storage engine's own write serialization.

use async_trait::async_trait;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::DbPool;
use crate::error::StoreError;
use crate::models::NewTask;

/// Persistence surface the processor depends on.
///
/// Abstracted behind a trait so tests can substitute an in-memory store for
/// the PostgreSQL-backed one.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Write one completed task. Exactly one row per call.
    async fn insert(&self, task: NewTask) -> Result<(), StoreError>;
}

/// Connect to the database and build the connection pool.
pub fn initialize_db_pool(database_url: &str, max_size: usize) -> Result<DbPool, StoreError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    DbPool::builder(manager)
        .max_size(max_size)
        .build()
        .map_err(|e| StoreError::Pool(e.to_string()))
}

/// Create the `tasks` table if it does not already exist.
///
/// Idempotent; the consumer runs this once at startup before serving. A
/// failure here means the store is unreachable and the process must not
/// start.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), StoreError> {
    let mut conn = pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))?;
    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS tasks (
            id SERIAL PRIMARY KEY,
            type INTEGER NOT NULL,
            value INTEGER NOT NULL,
            state TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    )
    .execute(&mut conn)
    .await?;
    Ok(())
}

/// PostgreSQL-backed store.
pub struct PgTaskStore {
    pool: DbPool,
}

impl PgTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: NewTask) -> Result<(), StoreError> {
        use crate::schema::tasks::dsl::*;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        diesel::insert_into(tasks)
            .values(&task)
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

/// In-memory store for tests and database-less local runs.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    rows: std::sync::Mutex<Vec<NewTask>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything inserted so far, in insertion order.
    pub fn rows(&self) -> Vec<NewTask> {
        self.rows.lock().expect("store lock poisoned").clone()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: NewTask) -> Result<(), StoreError> {
        self.rows.lock().expect("store lock poisoned").push(task);
        Ok(())
    }
}

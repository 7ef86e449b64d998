//! Task dispatch pipeline.
//!
//! A producer generates synthetic work items and forwards them over HTTP to a
//! consumer, which rate-limits admission with a token bucket, simulates
//! processing, records state transitions and persists completed results to
//! PostgreSQL. Diesel queries run through `diesel-async`, so request handlers
//! never block the server on database work.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod processor;
pub mod schema;
pub mod store;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;

/// Short-hand for the database pool type to use throughout the app.
pub type DbPool = deadpool::managed::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

//! Database abstraction layer.
//!
//! Only SQLite is supported. The pool wrapper owns connection tuning (WAL,
//! busy timeout, in-memory handling) so store facades only see `inner()`.
//!
//! # Example
//!
//! ```ignore
//! let pool = SqlitePool::connect("sqlite:data/portstat.db?mode=rwc", 5).await?;
//! let row = sqlx::query("SELECT 1").fetch_one(pool.inner()).await?;
//! ```

mod sqlite;

pub use sqlite::{DEFAULT_MAX_CONNECTIONS, SqlitePool};

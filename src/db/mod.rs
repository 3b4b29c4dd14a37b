mod manuscripts;
mod models;
mod reviews;

pub use manuscripts::*;
pub use models::*;
pub use reviews::*;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::domain::Role;

pub type DbPool = Arc<SqlitePool>;

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    Ok(Arc::new(pool))
}

/// Private in-memory database with the schema applied.
///
/// A single connection is kept alive for the pool's lifetime, since every
/// SQLite `:memory:` connection is its own database.
pub async fn create_memory_pool() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(pool))
}

/// Starts a transaction that holds the write lock from its first statement.
///
/// Workflow operations read state before writing it. Under a deferred
/// transaction two racing writers both read, and the loser fails its lock
/// upgrade with `SQLITE_BUSY` instead of seeing the winner's row.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// =========================================================================
// Members
// =========================================================================

pub async fn insert_user(
    conn: &mut SqliteConnection,
    id: &str,
    name: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO users (id, name, email, created_at) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn find_user(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>("SELECT id, name, email, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn email_taken(conn: &mut SqliteConnection, email: &str) -> Result<bool, sqlx::Error> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
    Ok(taken)
}

pub async fn user_roles(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_scalar::<_, Role>("SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

/// Replaces the member's role set.
pub async fn replace_roles(
    conn: &mut SqliteConnection,
    user_id: &str,
    roles: &[Role],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    for role in roles {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES ($1, $2)")
            .bind(user_id)
            .bind(role)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn count_role_holders(
    conn: &mut SqliteConnection,
    role: Role,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role = $1")
        .bind(role)
        .fetch_one(&mut *conn)
        .await
}

/// Rows that reference the member and must outlive them.
pub async fn user_history_count(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT (SELECT COUNT(*) FROM submissions WHERE created_by = $1)
             + (SELECT COUNT(*) FROM review_assignments WHERE reviewer_id = $1)
             + (SELECT COUNT(*) FROM decisions WHERE decided_by = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn delete_user(conn: &mut SqliteConnection, user_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =========================================================================
// Conferences
// =========================================================================

pub async fn insert_conference(
    conn: &mut SqliteConnection,
    id: &str,
    name: &str,
    year: i32,
    is_active: bool,
    tracks: &[String],
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conferences (id, name, year, is_active, tracks, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(year)
    .bind(is_active)
    .bind(encode_string_list(tracks))
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_conference(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ConferenceRow>, sqlx::Error> {
    sqlx::query_as::<_, ConferenceRow>("SELECT * FROM conferences WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn conference_by_year(
    conn: &mut SqliteConnection,
    year: i32,
) -> Result<Option<ConferenceRow>, sqlx::Error> {
    sqlx::query_as::<_, ConferenceRow>("SELECT * FROM conferences WHERE year = $1")
        .bind(year)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn set_conference_active(
    conn: &mut SqliteConnection,
    id: &str,
    active: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE conferences SET is_active = $2 WHERE id = $1")
        .bind(id)
        .bind(active)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

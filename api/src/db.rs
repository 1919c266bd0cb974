use hive_shared::{Author, Category, VoteType};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{types::Type, Connection, Row};

use crate::error::ApiResult;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

fn with_foreign_keys(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"))
}

/// Open a pool on `database_url`; `:memory:` gives a single-connection in-memory database.
pub fn open(database_url: &str) -> Result<DbPool, r2d2::Error> {
    if database_url == ":memory:" {
        return open_in_memory();
    }
    let manager = with_foreign_keys(SqliteConnectionManager::file(database_url));
    r2d2::Pool::new(manager)
}

/// Every connection of an in-memory manager is its own database, so the pool holds one.
pub fn open_in_memory() -> Result<DbPool, r2d2::Error> {
    let manager = with_foreign_keys(SqliteConnectionManager::memory());
    r2d2::Pool::builder().max_size(1).build(manager)
}

pub fn run_migrations(pool: &DbPool) -> ApiResult<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            github_id   INTEGER UNIQUE NOT NULL,
            username    TEXT NOT NULL,
            avatar_url  TEXT NOT NULL DEFAULT '',
            email       TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS threads (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            category    TEXT NOT NULL CHECK (category IN ('Free', 'Honey', 'Boasts')),
            author_id   INTEGER NOT NULL REFERENCES profiles(id),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            views       INTEGER NOT NULL DEFAULT 0,
            hide_embed  INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_threads_created ON threads(created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   INTEGER NOT NULL REFERENCES threads(id),
            author_id   INTEGER NOT NULL REFERENCES profiles(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            hide_embed  INTEGER NOT NULL DEFAULT 0,
            parent_id   INTEGER REFERENCES comments(id) ON DELETE CASCADE
        );
        CREATE INDEX IF NOT EXISTS idx_comments_thread ON comments(thread_id);
        CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);

        CREATE TABLE IF NOT EXISTS votes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   INTEGER NOT NULL REFERENCES threads(id),
            user_id     INTEGER NOT NULL REFERENCES profiles(id),
            vote_type   TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
            created_at  TEXT NOT NULL,
            UNIQUE(thread_id, user_id)
        );
        ",
    )?;

    Ok(())
}

/// Run `f` against a pooled connection on the blocking thread pool.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> ApiResult<T>
where
    F: FnOnce(&mut Connection) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

// ── Row decoding ──

pub fn category_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Category> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn vote_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<VoteType> {
    let raw: String = row.get(idx)?;
    raw.parse::<VoteType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Author columns `(id, username, avatar_url)` starting at `idx`, from a LEFT JOIN on profiles.
pub fn author_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Author> {
    let id: i64 = row.get(idx)?;
    let username: Option<String> = row.get(idx + 1)?;
    let avatar_url: Option<String> = row.get(idx + 2)?;
    Ok(Author {
        id,
        username: username.unwrap_or_else(|| "Anonymous".to_string()),
        avatar_url: avatar_url.unwrap_or_default(),
    })
}

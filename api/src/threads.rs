use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use hive_shared::*;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Deserialize;

use crate::{
    auth, comments, profiles,
    db::{self, author_at, category_at},
    error::{ApiError, ApiResult},
    AppState,
};

// ── Query params ──

#[derive(Deserialize)]
pub struct ThreadListParams {
    category: Option<Category>,
}

// ── Repository ──

const THREAD_VIEW_SELECT: &str = "
    SELECT t.id, t.title, t.content, t.category, t.created_at, t.updated_at,
           t.views, t.hide_embed,
           t.author_id, p.username, p.avatar_url,
           (SELECT COUNT(*) FROM comments c WHERE c.thread_id = t.id),
           (SELECT COUNT(*) FROM votes v WHERE v.thread_id = t.id AND v.vote_type = 'up'),
           (SELECT COUNT(*) FROM votes v WHERE v.thread_id = t.id AND v.vote_type = 'down')
    FROM threads t
    LEFT JOIN profiles p ON p.id = t.author_id";

fn thread_view_from_row(row: &Row<'_>, now: DateTime<Utc>) -> rusqlite::Result<ThreadView> {
    let created_at: DateTime<Utc> = row.get(4)?;
    let upvotes: i64 = row.get(12)?;
    let downvotes: i64 = row.get(13)?;
    Ok(ThreadView {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        category: category_at(row, 3)?,
        created_at,
        updated_at: row.get(5)?,
        views: row.get(6)?,
        hide_embed: row.get(7)?,
        author: author_at(row, 8)?,
        comment_count: row.get(11)?,
        upvotes,
        downvotes,
        net_score: upvotes - downvotes,
        time_label: format_age_label(seconds_between(created_at, now)),
    })
}

/// All threads newest first; the category filter is applied to the fetched set.
pub fn list(conn: &Connection, filter: CategoryFilter, now: DateTime<Utc>) -> ApiResult<Vec<ThreadView>> {
    let mut stmt =
        conn.prepare(&format!("{THREAD_VIEW_SELECT} ORDER BY t.created_at DESC, t.id DESC"))?;
    let threads = stmt
        .query_map([], |row| thread_view_from_row(row, now))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(threads
        .into_iter()
        .filter(|t| filter.matches(t.category))
        .collect())
}

pub fn get(conn: &Connection, id: i64, now: DateTime<Utc>) -> ApiResult<ThreadView> {
    conn.query_row(&format!("{THREAD_VIEW_SELECT} WHERE t.id = ?1"), [id], |row| {
        thread_view_from_row(row, now)
    })
    .optional()?
    .ok_or(ApiError::NotFound("thread"))
}

pub fn exists(conn: &Connection, id: i64) -> ApiResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM threads WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Sanitize and trim user input; both fields must survive non-empty.
pub fn validate(payload: CreateThread) -> ApiResult<CreateThread> {
    let title = ammonia::clean(&payload.title).trim().to_string();
    let content = ammonia::clean(&payload.content).trim().to_string();

    if title.is_empty() || content.is_empty() {
        return Err(ApiError::Validation("title and content are required".into()));
    }

    Ok(CreateThread {
        title,
        content,
        category: payload.category,
    })
}

pub fn insert(
    conn: &Connection,
    author_id: i64,
    thread: &CreateThread,
    now: DateTime<Utc>,
) -> ApiResult<ThreadView> {
    conn.execute(
        "INSERT INTO threads (title, content, category, author_id, created_at, updated_at, views, hide_embed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0, 0)",
        rusqlite::params![thread.title, thread.content, thread.category.as_str(), author_id, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(thread_id = id, author_id, category = %thread.category, "thread created");

    get(conn, id, now)
}

/// Remove a thread with its votes and comments in one transaction.
///
/// Only the author may delete; a refused request touches nothing.
pub fn delete(conn: &mut Connection, id: i64, requester_id: i64) -> ApiResult<()> {
    let tx = conn.transaction()?;

    let author_id: i64 = tx
        .query_row("SELECT author_id FROM threads WHERE id = ?1", [id], |row| row.get(0))
        .optional()?
        .ok_or(ApiError::NotFound("thread"))?;

    if author_id != requester_id {
        tracing::warn!(thread_id = id, requester_id, "refused thread deletion by non-author");
        return Err(ApiError::Forbidden("thread"));
    }

    let votes = tx.execute("DELETE FROM votes WHERE thread_id = ?1", [id])?;
    let comments = tx.execute("DELETE FROM comments WHERE thread_id = ?1", [id])?;
    tx.execute("DELETE FROM threads WHERE id = ?1", [id])?;
    tx.commit()?;

    tracing::info!(thread_id = id, votes, comments, "thread deleted");
    Ok(())
}

pub fn stats(conn: &Connection, now: DateTime<Utc>) -> ApiResult<ThreadStats> {
    let start_of_day = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);

    let total: i64 = conn.query_row("SELECT COUNT(*) FROM threads", [], |row| row.get(0))?;
    let today: i64 = conn.query_row(
        "SELECT COUNT(*) FROM threads WHERE created_at >= ?1",
        [start_of_day],
        |row| row.get(0),
    )?;

    let mut by_category = CategoryCounts::default();
    let mut stmt = conn.prepare("SELECT category, COUNT(*) FROM threads GROUP BY category")?;
    let rows = stmt.query_map([], |row| Ok((category_at(row, 0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (category, count) = row?;
        by_category.bump(category, count);
    }

    Ok(ThreadStats {
        total,
        today,
        by_category,
    })
}

// ── Handlers ──

/// GET /api/threads?category=Free
pub async fn list_threads(
    State(state): State<AppState>,
    Query(params): Query<ThreadListParams>,
) -> ApiResult<Json<Vec<ThreadView>>> {
    let filter = CategoryFilter::from(params.category);
    let threads = db::with_conn(&state.db, move |conn| list(conn, filter, Utc::now())).await?;
    Ok(Json(threads))
}

/// POST /api/threads
pub async fn create_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateThread>,
) -> ApiResult<(StatusCode, Json<ThreadView>)> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;
    let thread = validate(payload)?;

    let view = db::with_conn(&state.db, move |conn| {
        profiles::authenticated(conn, user_id)?;
        insert(conn, user_id, &thread, Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/threads/stats
pub async fn thread_stats(State(state): State<AppState>) -> ApiResult<Json<ThreadStats>> {
    let stats = db::with_conn(&state.db, |conn| stats(conn, Utc::now())).await?;
    Ok(Json(stats))
}

/// GET /api/threads/{id}
pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ThreadDetail>> {
    let detail = db::with_conn(&state.db, move |conn| {
        let thread = get(conn, id, Utc::now())?;
        let comments = comments::list_for_thread(conn, id)?;
        Ok(ThreadDetail { thread, comments })
    })
    .await?;
    Ok(Json(detail))
}

/// DELETE /api/threads/{id}
pub async fn delete_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;
    db::with_conn(&state.db, move |conn| delete(conn, id, user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing;
    use chrono::{Duration, TimeZone};

    fn count(conn: &Connection, sql: &str, id: i64) -> i64 {
        conn.query_row(sql, [id], |row| row.get(0)).unwrap()
    }

    fn vote(conn: &Connection, thread: i64, user: i64, kind: &str) {
        conn.execute(
            "INSERT INTO votes (thread_id, user_id, vote_type, created_at) VALUES (?1, ?2, ?3, 'now')",
            rusqlite::params![thread, user, kind],
        )
        .unwrap();
    }

    fn comment(conn: &Connection, thread: i64, author: i64, parent: Option<i64>) -> i64 {
        conn.execute(
            "INSERT INTO comments (thread_id, author_id, content, created_at, parent_id)
             VALUES (?1, ?2, 'c', 'now', ?3)",
            rusqlite::params![thread, author, parent],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn list_is_newest_first_with_counts() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ada = testing::profile(&conn, 1, "ada");
        let bob = testing::profile(&conn, 2, "bob");

        let old = testing::thread_at(&conn, ada, "old", Category::Free, now - Duration::days(2));
        let new = testing::thread_at(&conn, bob, "new", Category::Honey, now - Duration::minutes(5));
        vote(&conn, old, ada, "up");
        vote(&conn, old, bob, "down");
        vote(&conn, new, ada, "up");
        let root = comment(&conn, old, bob, None);
        comment(&conn, old, ada, Some(root));

        let threads = list(&conn, CategoryFilter::All, now).unwrap();
        assert_eq!(threads.iter().map(|t| t.id).collect::<Vec<_>>(), vec![new, old]);

        let old_view = &threads[1];
        assert_eq!(old_view.author.username, "ada");
        assert_eq!(old_view.comment_count, 2);
        assert_eq!((old_view.upvotes, old_view.downvotes, old_view.net_score), (1, 1, 0));
        assert_eq!(old_view.time_label, "2 days ago");
        assert_eq!(threads[0].time_label, "just now");
        assert_eq!(threads[0].net_score, 1);
    }

    #[test]
    fn category_filter_applies_after_fetch() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let now = Utc::now();
        let ada = testing::profile(&conn, 1, "ada");
        testing::thread_at(&conn, ada, "a", Category::Free, now);
        testing::thread_at(&conn, ada, "b", Category::Boasts, now);
        testing::thread_at(&conn, ada, "c", Category::Free, now);

        let free = list(&conn, CategoryFilter::Only(Category::Free), now).unwrap();
        assert_eq!(free.len(), 2);
        assert!(free.iter().all(|t| t.category == Category::Free));
        assert!(list(&conn, CategoryFilter::Only(Category::Honey), now).unwrap().is_empty());
    }

    #[test]
    fn validation_rejects_blank_fields() {
        let blank = CreateThread {
            title: "   ".into(),
            content: "body".into(),
            category: Category::Free,
        };
        assert!(matches!(validate(blank), Err(ApiError::Validation(_))));

        let scripted = CreateThread {
            title: "<script>alert(1)</script>".into(),
            content: "body".into(),
            category: Category::Free,
        };
        assert!(matches!(validate(scripted), Err(ApiError::Validation(_))));

        let ok = validate(CreateThread {
            title: "  Hello  ".into(),
            content: "world".into(),
            category: Category::Honey,
        })
        .unwrap();
        assert_eq!(ok.title, "Hello");
    }

    #[test]
    fn insert_returns_fresh_view() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let ada = testing::profile(&conn, 1, "ada");
        let payload = CreateThread {
            title: "Hello".into(),
            content: "first!".into(),
            category: Category::Free,
        };
        let view = insert(&conn, ada, &payload, Utc::now()).unwrap();
        assert_eq!(view.title, "Hello");
        assert_eq!(view.author.id, ada);
        assert_eq!((view.comment_count, view.net_score, view.views), (0, 0, 0));
        assert_eq!(view.created_at, view.updated_at);
        assert!(!view.hide_embed);
    }

    #[test]
    fn non_author_delete_is_refused_and_touches_nothing() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let ada = testing::profile(&conn, 1, "ada");
        let bob = testing::profile(&conn, 2, "bob");
        let thread = testing::thread_at(&conn, ada, "mine", Category::Free, Utc::now());
        vote(&conn, thread, bob, "up");
        comment(&conn, thread, bob, None);

        assert!(matches!(delete(&mut conn, thread, bob), Err(ApiError::Forbidden(_))));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM threads WHERE id = ?1", thread), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM votes WHERE thread_id = ?1", thread), 1);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM comments WHERE thread_id = ?1", thread), 1);
    }

    #[test]
    fn author_delete_cascades() {
        let pool = testing::pool();
        let mut conn = pool.get().unwrap();
        let ada = testing::profile(&conn, 1, "ada");
        let bob = testing::profile(&conn, 2, "bob");
        let thread = testing::thread_at(&conn, ada, "mine", Category::Free, Utc::now());
        let other = testing::thread_at(&conn, bob, "theirs", Category::Free, Utc::now());
        vote(&conn, thread, bob, "up");
        vote(&conn, other, ada, "up");
        let root = comment(&conn, thread, bob, None);
        comment(&conn, thread, ada, Some(root));

        delete(&mut conn, thread, ada).unwrap();
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM threads WHERE id = ?1", thread), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM votes WHERE thread_id = ?1", thread), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM comments WHERE thread_id = ?1", thread), 0);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM votes WHERE thread_id = ?1", other), 1);

        assert!(matches!(delete(&mut conn, thread, ada), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn stats_count_today_and_categories() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ada = testing::profile(&conn, 1, "ada");
        testing::thread_at(&conn, ada, "a", Category::Free, now - Duration::hours(1));
        testing::thread_at(&conn, ada, "b", Category::Honey, now - Duration::hours(13));
        testing::thread_at(&conn, ada, "c", Category::Free, now - Duration::days(3));

        let s = stats(&conn, now).unwrap();
        assert_eq!(s.total, 3);
        assert_eq!(s.today, 1);
        assert_eq!(s.by_category.get(Category::Free), 2);
        assert_eq!(s.by_category.get(Category::Honey), 1);
        assert_eq!(s.by_category.get(Category::Boasts), 0);
    }
}

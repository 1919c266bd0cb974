use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use hive_shared::{Comment, CreateComment};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    auth,
    db::{self, author_at},
    error::{ApiError, ApiResult},
    profiles, threads, AppState,
};

const COMMENT_SELECT: &str = "
    SELECT c.id, c.thread_id, c.content, c.created_at, c.parent_id,
           c.author_id, p.username, p.avatar_url
    FROM comments c
    LEFT JOIN profiles p ON p.id = c.author_id";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        parent_id: row.get(4)?,
        author: author_at(row, 5)?,
    })
}

/// Flat list for a thread in creation order; callers group it with `build_tree`.
pub fn list_for_thread(conn: &Connection, thread_id: i64) -> ApiResult<Vec<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT} WHERE c.thread_id = ?1 ORDER BY c.created_at ASC, c.id ASC"
    ))?;
    let comments = stmt
        .query_map([thread_id], comment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn insert(
    conn: &Connection,
    thread_id: i64,
    author_id: i64,
    payload: &CreateComment,
    now: DateTime<Utc>,
) -> ApiResult<Comment> {
    let content = ammonia::clean(&payload.content).trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("comment cannot be empty".into()));
    }

    if !threads::exists(conn, thread_id)? {
        return Err(ApiError::NotFound("thread"));
    }

    // A reply must hang off a comment of the same thread. Parents always
    // predate their replies, so parent chains cannot loop.
    if let Some(parent_id) = payload.parent_id {
        let parent_thread: Option<i64> = conn
            .query_row(
                "SELECT thread_id FROM comments WHERE id = ?1",
                [parent_id],
                |row| row.get(0),
            )
            .optional()?;
        if parent_thread != Some(thread_id) {
            return Err(ApiError::Validation(
                "reply target is not a comment of this thread".into(),
            ));
        }
    }

    conn.execute(
        "INSERT INTO comments (thread_id, author_id, content, created_at, hide_embed, parent_id)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        rusqlite::params![thread_id, author_id, content, now, payload.parent_id],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(comment_id = id, thread_id, parent_id = ?payload.parent_id, "comment created");

    let comment = conn.query_row(&format!("{COMMENT_SELECT} WHERE c.id = ?1"), [id], comment_from_row)?;
    Ok(comment)
}

/// Delete a comment owned by `requester_id`; its replies go with it.
pub fn delete(conn: &Connection, id: i64, requester_id: i64) -> ApiResult<()> {
    let author_id: i64 = conn
        .query_row("SELECT author_id FROM comments WHERE id = ?1", [id], |row| row.get(0))
        .optional()?
        .ok_or(ApiError::NotFound("comment"))?;

    if author_id != requester_id {
        return Err(ApiError::Forbidden("comment"));
    }

    conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
    Ok(())
}

// ── Handlers ──

/// GET /api/threads/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    Path(thread_id): Path<i64>,
) -> ApiResult<Json<Vec<Comment>>> {
    let comments = db::with_conn(&state.db, move |conn| {
        if !threads::exists(conn, thread_id)? {
            return Err(ApiError::NotFound("thread"));
        }
        list_for_thread(conn, thread_id)
    })
    .await?;
    Ok(Json(comments))
}

/// POST /api/threads/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<i64>,
    Json(payload): Json<CreateComment>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;

    let comment = db::with_conn(&state.db, move |conn| {
        profiles::authenticated(conn, user_id)?;
        insert(conn, thread_id, user_id, &payload, Utc::now())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/{id}
pub async fn delete_comment(
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
    use chrono::Duration;
    use hive_shared::{build_tree, Category};

    struct Fixture {
        pool: db::DbPool,
        ada: i64,
        bob: i64,
        thread: i64,
    }

    fn fixture() -> Fixture {
        let pool = testing::pool();
        let (ada, bob, thread) = {
            let conn = pool.get().unwrap();
            let ada = testing::profile(&conn, 1, "ada");
            let bob = testing::profile(&conn, 2, "bob");
            let thread = testing::thread_at(&conn, ada, "t", Category::Free, Utc::now());
            (ada, bob, thread)
        };
        Fixture { pool, ada, bob, thread }
    }

    fn reply(content: &str, parent_id: Option<i64>) -> CreateComment {
        CreateComment {
            content: content.into(),
            parent_id,
        }
    }

    #[test]
    fn nested_replies_come_back_in_order() {
        let f = fixture();
        let conn = f.pool.get().unwrap();
        let t0 = Utc::now();

        let root = insert(&conn, f.thread, f.bob, &reply("root", None), t0).unwrap();
        let child = insert(&conn, f.thread, f.ada, &reply("child", Some(root.id)), t0 + Duration::seconds(1)).unwrap();
        insert(&conn, f.thread, f.bob, &reply("grandchild", Some(child.id)), t0 + Duration::seconds(2)).unwrap();
        insert(&conn, f.thread, f.ada, &reply("second root", None), t0 + Duration::seconds(3)).unwrap();

        let flat = list_for_thread(&conn, f.thread).unwrap();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0].author.username, "bob");

        let tree = build_tree(flat);
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.replies(root.id)[0].content, "child");
        assert_eq!(tree.replies(child.id)[0].content, "grandchild");
    }

    #[test]
    fn empty_content_is_rejected() {
        let f = fixture();
        let conn = f.pool.get().unwrap();
        let err = insert(&conn, f.thread, f.bob, &reply("  \n ", None), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn parent_must_belong_to_same_thread() {
        let f = fixture();
        let conn = f.pool.get().unwrap();
        let other = testing::thread_at(&conn, f.bob, "other", Category::Honey, Utc::now());
        let foreign = insert(&conn, other, f.bob, &reply("elsewhere", None), Utc::now()).unwrap();

        let err = insert(&conn, f.thread, f.ada, &reply("hi", Some(foreign.id)), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = insert(&conn, f.thread, f.ada, &reply("hi", Some(9999)), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn unknown_thread_is_not_found() {
        let f = fixture();
        let conn = f.pool.get().unwrap();
        let err = insert(&conn, 4242, f.ada, &reply("hi", None), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound("thread")));
    }

    #[test]
    fn only_author_deletes_and_replies_follow() {
        let f = fixture();
        let conn = f.pool.get().unwrap();
        let root = insert(&conn, f.thread, f.bob, &reply("root", None), Utc::now()).unwrap();
        insert(&conn, f.thread, f.ada, &reply("answer", Some(root.id)), Utc::now()).unwrap();

        assert!(matches!(delete(&conn, root.id, f.ada), Err(ApiError::Forbidden(_))));
        assert_eq!(list_for_thread(&conn, f.thread).unwrap().len(), 2);

        delete(&conn, root.id, f.bob).unwrap();
        assert!(list_for_thread(&conn, f.thread).unwrap().is_empty());
        assert!(matches!(delete(&conn, root.id, f.bob), Err(ApiError::NotFound(_))));
    }
}

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use hive_shared::{CastVote, VoteResponse, VoteTransition, VoteType};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use crate::{
    auth,
    db::{self, vote_type_at},
    error::{ApiError, ApiResult},
    profiles, threads, AppState,
};

/// Tally recomputed from the vote rows, plus the caller's own vote if known.
pub fn tally(conn: &Connection, thread_id: i64, user_id: Option<i64>) -> ApiResult<VoteResponse> {
    let (upvotes, downvotes): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(vote_type = 'up'), 0), COALESCE(SUM(vote_type = 'down'), 0)
         FROM votes WHERE thread_id = ?1",
        [thread_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let user_vote = match user_id {
        Some(uid) => current_vote(conn, thread_id, uid)?,
        None => None,
    };

    Ok(VoteResponse {
        upvotes,
        downvotes,
        net_score: upvotes - downvotes,
        user_vote,
    })
}

fn current_vote(conn: &Connection, thread_id: i64, user_id: i64) -> ApiResult<Option<VoteType>> {
    let vote = conn
        .query_row(
            "SELECT vote_type FROM votes WHERE thread_id = ?1 AND user_id = ?2",
            [thread_id, user_id],
            |row| vote_type_at(row, 0),
        )
        .optional()?;
    Ok(vote)
}

/// Record `requested` for (thread, user): insert, switch in place, or retract
/// when it repeats the existing vote.
///
/// Runs in an IMMEDIATE transaction so concurrent casts by the same user
/// serialize on the write lock instead of racing the read.
pub fn cast(
    conn: &mut Connection,
    thread_id: i64,
    user_id: i64,
    requested: VoteType,
    now: DateTime<Utc>,
) -> ApiResult<(VoteTransition, VoteResponse)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !threads::exists(&tx, thread_id)? {
        return Err(ApiError::NotFound("thread"));
    }

    let transition = VoteTransition::resolve(current_vote(&tx, thread_id, user_id)?, requested);

    match transition {
        VoteTransition::Cast(vote) => {
            tx.execute(
                "INSERT INTO votes (thread_id, user_id, vote_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![thread_id, user_id, vote.as_str(), now],
            )?;
        }
        VoteTransition::Retract(_) => {
            tx.execute(
                "DELETE FROM votes WHERE thread_id = ?1 AND user_id = ?2",
                [thread_id, user_id],
            )?;
        }
        VoteTransition::Switch { to, .. } => {
            tx.execute(
                "UPDATE votes SET vote_type = ?3 WHERE thread_id = ?1 AND user_id = ?2",
                rusqlite::params![thread_id, user_id, to.as_str()],
            )?;
        }
    }

    let response = tally(&tx, thread_id, Some(user_id))?;
    tx.commit()?;

    tracing::debug!(
        thread_id,
        user_id,
        ?transition,
        delta = transition.delta(),
        net_score = response.net_score,
        "vote recorded"
    );
    Ok((transition, response))
}

// ── Handlers ──

/// GET /api/threads/{id}/votes
pub async fn get_votes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<i64>,
) -> ApiResult<Json<VoteResponse>> {
    let user_id = auth::optional_user_id(&headers, &state.config.jwt_secret);

    let resp = db::with_conn(&state.db, move |conn| {
        if !threads::exists(conn, thread_id)? {
            return Err(ApiError::NotFound("thread"));
        }
        tally(conn, thread_id, user_id)
    })
    .await?;
    Ok(Json(resp))
}

/// POST /api/threads/{id}/votes: toggle on re-vote with the same direction
pub async fn cast_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(thread_id): Path<i64>,
    Json(payload): Json<CastVote>,
) -> ApiResult<Json<VoteResponse>> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;

    let (_, resp) = db::with_conn(&state.db, move |conn| {
        profiles::authenticated(conn, user_id)?;
        cast(conn, thread_id, user_id, payload.vote_type, Utc::now())
    })
    .await?;
    Ok(Json(resp))
}

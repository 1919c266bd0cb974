use chrono::{DateTime, Utc};
use hive_shared::Profile;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{ApiError, ApiResult};

/// Identity reported by the OAuth provider on sign-in.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub github_id: i64,
    pub username: String,
    pub avatar_url: String,
    pub email: Option<String>,
}

/// Provider login, else the local part of the email, else a name derived from the provider id.
pub fn pick_username(login: Option<&str>, email: Option<&str>, github_id: i64) -> String {
    login
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .or_else(|| {
            email
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("user_{github_id}"))
}

/// Create the profile on first sign-in; later sign-ins leave it as is. Returns the profile id.
pub fn ensure_profile(conn: &Connection, new: &NewProfile, now: DateTime<Utc>) -> ApiResult<i64> {
    let created = conn.execute(
        "INSERT INTO profiles (github_id, username, avatar_url, email, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(github_id) DO NOTHING",
        rusqlite::params![new.github_id, new.username, new.avatar_url, new.email, now],
    )?;
    if created > 0 {
        tracing::info!(github_id = new.github_id, username = %new.username, "created profile");
    }

    let id = conn.query_row(
        "SELECT id FROM profiles WHERE github_id = ?1",
        [new.github_id],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn get_profile(conn: &Connection, id: i64) -> ApiResult<Profile> {
    conn.query_row(
        "SELECT id, username, avatar_url, email, created_at FROM profiles WHERE id = ?1",
        [id],
        |row| {
            Ok(Profile {
                id: row.get(0)?,
                username: row.get(1)?,
                avatar_url: row.get(2)?,
                email: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(ApiError::NotFound("profile"))
}

/// Profile behind an authenticated id. A token whose profile is gone no longer authenticates.
pub fn authenticated(conn: &Connection, id: i64) -> ApiResult<Profile> {
    match get_profile(conn, id) {
        Err(ApiError::NotFound(_)) => {
            tracing::debug!(profile_id = id, "token names a missing profile");
            Err(ApiError::Unauthenticated)
        }
        other => other,
    }
}

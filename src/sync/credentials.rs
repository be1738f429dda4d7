//! Refresh-token storage in `cache_metadata`.
//!
//! The token is base64 encoded so it is not stored as plain text. This is
//! an encoding, not encryption: anyone who can read the database file can
//! recover the token.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::storage::repository;
use crate::storage::Database;

pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";
pub const TOKEN_UPDATED_KEY: &str = "token_updated_at";

pub fn encode_token(token: &str) -> String {
    B64.encode(token.as_bytes())
}

/// `None` when `encoded` is not valid base64 or not UTF-8.
pub fn decode_token(encoded: &str) -> Option<String> {
    let bytes = B64.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

/// Persist `token` with an expiry of `ttl` from now.
pub async fn store_credential(db: &Database, token: &str, ttl: Duration) -> Result<()> {
    store_credential_at(db, token, ttl, Utc::now()).await
}

pub async fn store_credential_at(
    db: &Database,
    token: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<()> {
    let encoded = encode_token(token);
    let expiry = (now + ttl).timestamp().to_string();
    let updated = now.to_rfc3339();

    db.conn()
        .call(move |conn| {
            let tx = conn.transaction()?;
            repository::set_metadata(&tx, REFRESH_TOKEN_KEY, &encoded)?;
            repository::set_metadata(&tx, TOKEN_EXPIRY_KEY, &expiry)?;
            repository::set_metadata(&tx, TOKEN_UPDATED_KEY, &updated)?;
            tx.commit()
        })
        .await
        .map_err(|e| {
            log::error!("Failed to store refresh credential: {e}");
            Error::Database(e.to_string())
        })
}

/// The stored refresh token. A value that fails to decode reads as absent.
pub async fn get_credential(db: &Database) -> Result<Option<String>> {
    let stored = db
        .conn()
        .call(|conn| repository::get_metadata(conn, REFRESH_TOKEN_KEY))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(stored.and_then(|encoded| {
        let decoded = decode_token(&encoded);
        if decoded.is_none() {
            log::warn!("Stored refresh token could not be decoded; treating as absent");
        }
        decoded
    }))
}

pub async fn credential_expiry(db: &Database) -> Result<Option<DateTime<Utc>>> {
    let stored = db
        .conn()
        .call(|conn| repository::get_metadata(conn, TOKEN_EXPIRY_KEY))
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

    Ok(stored.and_then(|s| {
        let parsed = s
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        if parsed.is_none() {
            log::warn!("Ignoring unparsable token expiry {s:?}");
        }
        parsed
    }))
}

/// True when no expiry is recorded or `now` has reached it.
pub async fn credential_expired(db: &Database, now: DateTime<Utc>) -> Result<bool> {
    Ok(match credential_expiry(db).await? {
        Some(expiry) => now >= expiry,
        None => true,
    })
}

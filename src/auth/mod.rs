pub mod access;
pub mod permission;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::config;
use crate::database::StoreError;

/// Claims embedded in an auth token. Both identity claims must be present
/// for the token to count as valid.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub group_id: i64,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: i64, group_id: i64) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self {
            user_id,
            group_id,
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Claims embedded in a refresh token; carries identity only.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: i64,
    pub exp: i64,
    pub iat: i64,
}

impl RefreshClaims {
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.refresh_expiry_hours;
        Self {
            user_id,
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed, expired or missing required claims")]
    Invalid,

    #[error("token does not match the stored token for this user")]
    Revoked,

    #[error("JWT secret is not configured")]
    MissingSecret,

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn secret() -> Result<&'static [u8], TokenError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }
    Ok(secret.as_bytes())
}

pub fn mint_auth_token(claims: &Claims) -> Result<String, TokenError> {
    let key = EncodingKey::from_secret(secret()?);
    encode(&Header::default(), claims, &key).map_err(|_| TokenError::Invalid)
}

pub fn mint_refresh_token(claims: &RefreshClaims) -> Result<String, TokenError> {
    let key = EncodingKey::from_secret(secret()?);
    encode(&Header::default(), claims, &key).map_err(|_| TokenError::Invalid)
}

/// Signature + claims verification (HS256, expiry enforced). The stored-token
/// second factor is `verify_stored`.
pub fn decode_auth_claims(token: &str) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(secret()?);
    decode::<Claims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
}

pub fn decode_refresh_claims(token: &str) -> Result<RefreshClaims, TokenError> {
    let key = DecodingKey::from_secret(secret()?);
    decode::<RefreshClaims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| TokenError::Invalid)
}

/// A cryptographically valid token is only accepted while it equals the
/// currently stored token for its user; anything else is a hard failure,
/// not a downgrade.
pub async fn verify_stored(
    pool: &PgPool,
    table: &str,
    column: &str,
    user_id: i64,
    token: &str,
) -> Result<(), TokenError> {
    let statement = format!("SELECT \"{}\" FROM \"{}\" WHERE user_id = $1", column, table);
    let row = sqlx::query(&statement)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?;
    let stored: Option<String> = row.and_then(|r| r.try_get(0).ok());
    match stored {
        Some(stored) if stored == token => Ok(()),
        _ => Err(TokenError::Revoked),
    }
}

/// Replace the stored token for a user (delete-then-insert). A failing
/// delete because no prior row existed is swallowed.
pub async fn replace_stored(
    pool: &PgPool,
    table: &str,
    column: &str,
    user_id: i64,
    token: &str,
) -> Result<(), StoreError> {
    let delete = format!("DELETE FROM \"{}\" WHERE user_id = $1", table);
    if let Err(err) = sqlx::query(&delete).bind(user_id).execute(pool).await {
        tracing::debug!("No stored token replaced for user {}: {}", user_id, err);
    }
    let insert = format!("INSERT INTO \"{}\" (user_id, \"{}\") VALUES ($1, $2)", table, column);
    sqlx::query(&insert).bind(user_id).bind(token).execute(pool).await?;
    Ok(())
}

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::actions;
use crate::error::ApiError;
use crate::handlers::bearer_token;
use crate::model::models::CREDENTIALS;
use crate::model::Model;

pub fn routes() -> Router<PgPool> {
    Router::new().route("/login", post(login)).route("/refresh_token", post(refresh))
}

async fn login(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    if bearer_token(&headers).is_some() {
        return Err(ApiError::unauthorized("You are already logged in"));
    }
    let credentials = Model::from_json(&CREDENTIALS, &payload)?;
    let tokens = actions::login(&pool, &credentials).await?;
    Ok(Json(json!({
        "auth_token": tokens.auth_token,
        "refresh_token": tokens.refresh_token,
    })))
}

async fn refresh(
    State(pool): State<PgPool>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let refresh_token = payload
        .get("refresh_token")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::invalid_params("Refresh token missing"))?;
    let auth_token = actions::refresh_session(&pool, refresh_token).await?;
    Ok(Json(json!({ "auth_token": auth_token })))
}

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;

use crate::actions;
use crate::auth::permission::{PermissionParams, UserGroup};
use crate::error::ApiError;
use crate::handlers::{bearer_token, success};
use crate::model::field::FieldValue;
use crate::model::models::USER;
use crate::model::{validation_info, Model};

pub fn routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(list_users).post(register_user))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
}

fn params() -> PermissionParams {
    PermissionParams::owned_by("id")
}

async fn list_users(
    State(pool): State<PgPool>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let users =
        actions::get_models(&pool, &USER, "users", token.as_deref(), params(), "*", "").await?;
    Ok(Json(Value::Array(users.iter().map(Model::to_json).collect())))
}

async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let filter = format!("id = {}", id);
    let users =
        actions::get_models(&pool, &USER, "users", token.as_deref(), params(), "*", &filter)
            .await?;
    let user = users
        .into_iter()
        .next_back()
        .ok_or_else(|| ApiError::not_found("User with that id is not found"))?;
    Ok(Json(user.to_json()))
}

async fn register_user(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut user = Model::from_json(&USER, &payload)?;

    // Constraint failures outrank everything else, including authorization.
    let errors = user.validate_all();
    if !errors.is_empty() {
        return Err(ApiError::validation(validation_info(&errors)));
    }
    let duplicates = actions::check_uniqueness(&pool, "users", &user).await?;
    if !duplicates.is_empty() {
        return Err(ApiError::duplicates(&duplicates));
    }

    if let Some(password) = user.get("password").and_then(FieldValue::as_text) {
        let digest = actions::password_digest(password);
        user.set_value_by_name("password", FieldValue::Text(digest))?;
    }
    user.set_value_by_name(
        "join_date",
        FieldValue::Text(Utc::now().format("%Y-%m-%d").to_string()),
    )?;
    user.set_value_by_name("permission_group", FieldValue::Int(UserGroup::User as i64))?;

    actions::insert_model(&pool, "users", token.as_deref(), params(), user).await?;
    Ok(success("Registration successfully completed"))
}

async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut user = Model::from_json(&USER, &payload)?;

    // Partial update: absent fields stay untouched, so Required is not
    // enforced here; present fields still have to satisfy their constraints.
    let errors = user.validate_updates();
    if !errors.is_empty() {
        return Err(ApiError::validation(validation_info(&errors)));
    }

    if let Some(password) = user.get("password").and_then(FieldValue::as_text) {
        let digest = actions::password_digest(password);
        user.set_value_by_name("password", FieldValue::Text(digest))?;
    }
    user.set_value_by_name("id", FieldValue::Int(i64::from(id)))?;

    let filter = format!("id = {}", id);
    actions::update_models(&pool, "users", token.as_deref(), params(), &filter, user).await?;
    Ok(success("User information updated"))
}

async fn delete_user(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut user = USER.instance();
    user.set_value_by_name("id", FieldValue::Int(i64::from(id)))?;

    let filter = format!("id = {}", id);
    actions::delete_models(&pool, "users", token.as_deref(), params(), &filter, user).await?;
    Ok(success(format!("User with id {} deleted", id)))
}

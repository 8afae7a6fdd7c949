use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use sqlx::PgPool;

use crate::actions;
use crate::auth::access;
use crate::auth::permission::PermissionParams;
use crate::error::ApiError;
use crate::handlers::{bearer_token, success};
use crate::model::field::FieldValue;
use crate::model::models::PHOTO;
use crate::model::{validation_info, Model};

pub fn routes() -> Router<PgPool> {
    Router::new()
        .route("/photos", get(list_photos).post(upload_photo))
        .route("/photos/:id", get(get_photo).put(update_photo).delete(delete_photo))
        .route("/photos_by/:user_id", get(photos_by_user))
}

fn params() -> PermissionParams {
    PermissionParams::owned_by("uploaded_by")
}

async fn list_photos(
    State(pool): State<PgPool>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let photos =
        actions::get_models(&pool, &PHOTO, "photos", token.as_deref(), params(), "*", "").await?;
    Ok(Json(Value::Array(photos.iter().map(Model::to_json).collect())))
}

async fn get_photo(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let filter = format!("id = {}", id);
    let photos =
        actions::get_models(&pool, &PHOTO, "photos", token.as_deref(), params(), "*", &filter)
            .await?;
    let photo = photos
        .into_iter()
        .next_back()
        .ok_or_else(|| ApiError::not_found("Photo with that id is not found"))?;
    Ok(Json(photo.to_json()))
}

async fn photos_by_user(
    State(pool): State<PgPool>,
    Path(user_id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let filter = format!("uploaded_by = {}", user_id);
    let photos =
        actions::get_models(&pool, &PHOTO, "photos", token.as_deref(), params(), "*", &filter)
            .await?;
    Ok(Json(Value::Array(photos.iter().map(Model::to_json).collect())))
}

/// Create the photo record. The image bytes themselves live with the file
/// storage collaborator; this resource carries the metadata only.
async fn upload_photo(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut photo = Model::from_json(&PHOTO, &payload)?;

    let photo_id = i64::from(rand::thread_rng().gen_range(1..=i32::MAX));
    photo.set_value_by_name("id", FieldValue::Int(photo_id))?;
    photo.set_value_by_name(
        "upload_time",
        FieldValue::Text(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
    )?;

    // Record who uploads; anonymous callers leave it NULL.
    let resolved = access::resolve_params(&pool, token.as_deref(), params()).await?;
    if let Some(user_id) = resolved.user_id {
        photo.set_value_by_name("uploaded_by", FieldValue::Int(user_id))?;
    }

    let errors = photo.validate_all();
    if !errors.is_empty() {
        return Err(ApiError::validation(validation_info(&errors)));
    }

    actions::insert_model(&pool, "photos", token.as_deref(), params(), photo).await?;
    Ok(success(photo_id.to_string()))
}

async fn update_photo(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut photo = Model::from_json(&PHOTO, &payload)?;

    let errors = photo.validate_updates();
    if !errors.is_empty() {
        return Err(ApiError::validation(validation_info(&errors)));
    }
    photo.set_value_by_name("id", FieldValue::Int(i64::from(id)))?;

    // Ownership is pinned from the stored row so the caller cannot reassign
    // it, and so the owner tier evaluates against the real uploader.
    let filter = format!("id = {}", id);
    let existing = actions::get_models(
        &pool,
        &PHOTO,
        "photos",
        token.as_deref(),
        params(),
        "uploaded_by",
        &filter,
    )
    .await?;
    let current = existing
        .into_iter()
        .next_back()
        .ok_or_else(|| ApiError::invalid_params("Photo with that id does not exist"))?;
    if let Some(owner) = current.get("uploaded_by") {
        photo.set_value_by_name("uploaded_by", owner.clone())?;
    }

    actions::update_models(&pool, "photos", token.as_deref(), params(), &filter, photo).await?;
    Ok(success("Photo information updated"))
}

async fn delete_photo(
    State(pool): State<PgPool>,
    Path(id): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers);
    let mut photo = PHOTO.instance();
    photo.set_value_by_name("id", FieldValue::Int(i64::from(id)))?;

    let filter = format!("id = {}", id);
    let existing = actions::get_models(
        &pool,
        &PHOTO,
        "photos",
        token.as_deref(),
        params(),
        "uploaded_by",
        &filter,
    )
    .await?;
    let current = existing
        .into_iter()
        .next_back()
        .ok_or_else(|| ApiError::invalid_params("Photo with that id does not exist"))?;
    if let Some(owner) = current.get("uploaded_by") {
        photo.set_value_by_name("uploaded_by", owner.clone())?;
    }

    actions::delete_models(&pool, "photos", token.as_deref(), params(), &filter, photo).await?;
    Ok(success(format!("Photo with id {} deleted", id)))
}

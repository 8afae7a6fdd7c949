//! Self-describing schema routes, generated purely from model and
//! permission metadata.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::auth::permission::PermissionMatrix;
use crate::error::ApiError;
use crate::model::models::{CREDENTIALS, PHOTO, USER};
use crate::model::schema::ModelSchema;

pub fn routes() -> Router<PgPool> {
    Router::new()
        .route("/describe", get(describe_routes))
        .route("/describe/permissions/:table", get(describe_permissions))
}

async fn describe_routes() -> Json<Value> {
    Json(json!({
        "/users": USER.describe(),
        "/photos": PHOTO.describe(),
        "/login": CREDENTIALS.describe(),
    }))
}

fn schema_for(table: &str) -> Option<&'static ModelSchema> {
    match table {
        "users" => Some(&USER),
        "photos" => Some(&PHOTO),
        _ => None,
    }
}

async fn describe_permissions(
    State(pool): State<PgPool>,
    Path(table): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let schema = schema_for(&table)
        .ok_or_else(|| ApiError::not_found(format!("No such table: {}", table)))?;
    let matrix = PermissionMatrix::load(&pool, schema, &table).await?;
    Ok(Json(matrix.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_known_tables_resolve() {
        assert!(schema_for("users").is_some());
        assert!(schema_for("photos").is_some());
        assert!(schema_for("auth_tokens").is_none());
    }
}

//! Generic CRUD actions: the only code path that talks to the relational
//! store. Each action validates authorization through `AuthorizedAccess`,
//! synthesizes a statement from the fields that survived filtering, and
//! executes it. Field values are always bind parameters; table names are
//! crate-internal literals and `projection`/`filter` fragments are opaque
//! pass-through strings owned by the caller.

use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::postgres::PgArguments;
use sqlx::{PgPool, Row};

use crate::auth::access::AuthorizedAccess;
use crate::auth::permission::{PermissionParams, Permissions};
use crate::auth::{self, Claims, RefreshClaims};
use crate::database::StoreError;
use crate::error::ApiError;
use crate::model::field::{FieldKind, FieldValue};
use crate::model::models;
use crate::model::schema::ModelSchema;
use crate::model::Model;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

/// Tokens returned by a successful login.
#[derive(Debug, Serialize)]
pub struct SessionTokens {
    pub auth_token: String,
    pub refresh_token: String,
}

/// Read records with the caller's effective field mask applied to every
/// returned row.
pub async fn get_models(
    pool: &PgPool,
    schema: &'static ModelSchema,
    table: &str,
    token: Option<&str>,
    params: PermissionParams,
    projection: &str,
    filter: &str,
) -> Result<Vec<Model>, ApiError> {
    let access =
        AuthorizedAccess::begin(pool, schema, table, Permissions::READ, token, params).await?;

    let statement = select_statement(table, projection, filter);
    let rows = sqlx::query(&statement).fetch_all(pool).await.map_err(StoreError::from)?;

    let mut result = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut model = Model::from_row(schema, row);
        access.filter_fields(&mut model)?;
        result.push(model);
    }
    Ok(result)
}

/// Insert one record. Every schema column is named in the statement; unset
/// fields bind NULL so column and value arity always match.
pub async fn insert_model(
    pool: &PgPool,
    table: &str,
    token: Option<&str>,
    params: PermissionParams,
    mut model: Model,
) -> Result<(), ApiError> {
    let access =
        AuthorizedAccess::begin(pool, model.schema(), table, Permissions::CREATE, token, params)
            .await?;
    access.filter_fields(&mut model)?;

    let (statement, binds) = insert_statement(table, &model);
    let mut query = sqlx::query(&statement);
    for (kind, value) in binds {
        query = bind_optional(query, kind, value);
    }
    query.execute(pool).await.map_err(StoreError::from)?;
    Ok(())
}

/// Update records matching `filter`, setting only the fields that hold a
/// value after authorization filtering.
pub async fn update_models(
    pool: &PgPool,
    table: &str,
    token: Option<&str>,
    params: PermissionParams,
    filter: &str,
    mut model: Model,
) -> Result<(), ApiError> {
    let access =
        AuthorizedAccess::begin(pool, model.schema(), table, Permissions::UPDATE, token, params)
            .await?;
    access.filter_fields(&mut model)?;

    let (statement, binds) = update_statement(table, &model, filter)?;
    let mut query = sqlx::query(&statement);
    for value in binds {
        query = bind_value(query, value);
    }
    query.execute(pool).await.map_err(StoreError::from)?;
    Ok(())
}

/// Delete records matching the authorized model's set fields (AND-ed with
/// `filter` when one is given).
pub async fn delete_models(
    pool: &PgPool,
    table: &str,
    token: Option<&str>,
    params: PermissionParams,
    filter: &str,
    mut model: Model,
) -> Result<(), ApiError> {
    let access =
        AuthorizedAccess::begin(pool, model.schema(), table, Permissions::DELETE, token, params)
            .await?;
    access.filter_fields(&mut model)?;

    let (statement, binds) = delete_statement(table, &model, filter)?;
    let mut query = sqlx::query(&statement);
    for value in binds {
        query = bind_value(query, value);
    }
    query.execute(pool).await.map_err(StoreError::from)?;
    Ok(())
}

/// Pre-insert duplicate probe: one COUNT per `Unique` field holding a value.
/// Returns the names of fields whose value already exists.
pub async fn check_uniqueness(
    pool: &PgPool,
    table: &str,
    model: &Model,
) -> Result<Vec<&'static str>, ApiError> {
    let mut duplicates = Vec::new();
    for (name, field) in model.fields() {
        if !field.is_unique() {
            continue;
        }
        let Some(value) = field.value() else { continue };
        let statement = format!("SELECT COUNT(*) FROM \"{}\" WHERE \"{}\" = $1", table, name);
        let row = bind_value(sqlx::query(&statement), value.clone())
            .fetch_one(pool)
            .await
            .map_err(StoreError::from)?;
        let count: i64 = row.try_get(0).map_err(StoreError::from)?;
        if count > 0 {
            duplicates.push(name);
        }
    }
    Ok(duplicates)
}

/// Authenticate by credentials, mint auth and refresh tokens embedding the
/// user's identity and group, and replace any previously stored tokens.
pub async fn login(pool: &PgPool, credentials: &Model) -> Result<SessionTokens, ApiError> {
    let (Some(username), Some(password)) =
        (credentials.get("username"), credentials.get("password"))
    else {
        return Err(ApiError::invalid_params("Username or password missing"));
    };

    let statement = "SELECT id, password, permission_group FROM \"users\" WHERE username = $1";
    let row = bind_value(sqlx::query(statement), username.clone())
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?;

    let stored = row.map(|r| Model::from_row(&models::USER, &r));
    let credentials_match = stored.as_ref().is_some_and(|user| {
        user.get("password").and_then(FieldValue::as_text)
            == password.as_text().map(password_digest).as_deref()
    });
    if !credentials_match {
        return Err(ApiError::invalid_params("Invalid username or password"));
    }

    let user = stored.unwrap_or_else(|| models::USER.instance());
    let (Some(user_id), Some(group_id)) = (
        user.get("id").and_then(FieldValue::as_int),
        user.get("permission_group").and_then(FieldValue::as_int),
    ) else {
        return Err(ApiError::invalid_params("Invalid username or password"));
    };

    let auth_token = auth::mint_auth_token(&Claims::new(user_id, group_id))?;
    auth::replace_stored(pool, "auth_tokens", "auth_token", user_id, &auth_token).await?;

    let refresh_token = auth::mint_refresh_token(&RefreshClaims::new(user_id))?;
    auth::replace_stored(pool, "refresh_tokens", "refresh_token", user_id, &refresh_token).await?;

    Ok(SessionTokens { auth_token, refresh_token })
}

/// Exchange a stored refresh token for a fresh auth token.
pub async fn refresh_session(pool: &PgPool, refresh_token: &str) -> Result<String, ApiError> {
    let claims = auth::decode_refresh_claims(refresh_token)
        .map_err(|e| ApiError::invalid_refresh_token(e.to_string()))?;
    auth::verify_stored(pool, "refresh_tokens", "refresh_token", claims.user_id, refresh_token)
        .await
        .map_err(|e| match e {
            auth::TokenError::Store(store) => store.into(),
            other => ApiError::invalid_refresh_token(other.to_string()),
        })?;

    let row = sqlx::query("SELECT permission_group FROM \"users\" WHERE id = $1")
        .bind(claims.user_id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::from)?;
    let group_id = row
        .and_then(|r| r.try_get::<i64, _>(0).ok().or_else(|| r.try_get::<i32, _>(0).ok().map(i64::from)))
        .ok_or_else(|| ApiError::invalid_refresh_token("Unknown user"))?;

    let auth_token = auth::mint_auth_token(&Claims::new(claims.user_id, group_id))?;
    auth::replace_stored(pool, "auth_tokens", "auth_token", claims.user_id, &auth_token).await?;
    Ok(auth_token)
}

/// SHA-256 hex digest used for stored passwords.
pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ---------------------------------------------------------------------------
// Statement synthesis. Pure, so the SQL shape is testable without a store.
// ---------------------------------------------------------------------------

fn select_statement(table: &str, projection: &str, filter: &str) -> String {
    if filter.is_empty() {
        format!("SELECT {} FROM \"{}\"", projection, table)
    } else {
        format!("SELECT {} FROM \"{}\" WHERE {}", projection, table, filter)
    }
}

fn insert_statement(table: &str, model: &Model) -> (String, Vec<(FieldKind, Option<FieldValue>)>) {
    let schema = model.schema();
    let columns: Vec<String> = schema.field_names().map(|n| format!("\"{}\"", n)).collect();
    let placeholders: Vec<String> = (1..=schema.len()).map(|n| format!("${}", n)).collect();
    let statement = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        columns.join(","),
        placeholders.join(",")
    );
    (statement, model.to_row())
}

fn update_statement(
    table: &str,
    model: &Model,
    filter: &str,
) -> Result<(String, Vec<FieldValue>), ApiError> {
    let mut assignments = Vec::new();
    let mut binds = Vec::new();
    for (name, field) in model.fields() {
        if let Some(value) = field.value() {
            assignments.push(format!("\"{}\" = ${}", name, binds.len() + 1));
            binds.push(value.clone());
        }
    }
    if assignments.is_empty() {
        return Err(ApiError::invalid_params("No valid parameters to modify"));
    }
    let mut statement = format!("UPDATE \"{}\" SET {}", table, assignments.join(","));
    if !filter.is_empty() {
        statement.push_str(&format!(" WHERE {}", filter));
    }
    Ok((statement, binds))
}

fn delete_statement(
    table: &str,
    model: &Model,
    filter: &str,
) -> Result<(String, Vec<FieldValue>), ApiError> {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();
    for (name, field) in model.fields() {
        if let Some(value) = field.value() {
            conditions.push(format!("\"{}\" = ${}", name, binds.len() + 1));
            binds.push(value.clone());
        }
    }
    if conditions.is_empty() {
        return Err(ApiError::invalid_params("No valid filter parameters"));
    }
    if !filter.is_empty() {
        conditions.push(format!("({})", filter));
    }
    let statement = format!("DELETE FROM \"{}\" WHERE {}", table, conditions.join(" AND "));
    Ok((statement, binds))
}

fn bind_value(query: PgQuery<'_>, value: FieldValue) -> PgQuery<'_> {
    match value {
        FieldValue::Int(i) => query.bind(i),
        FieldValue::Text(s) => query.bind(s),
        FieldValue::Bool(b) => query.bind(b),
    }
}

fn bind_optional(query: PgQuery<'_>, kind: FieldKind, value: Option<FieldValue>) -> PgQuery<'_> {
    match value {
        Some(value) => bind_value(query, value),
        // NULLs are typed so the statement's parameter types stay aligned
        // with the column types.
        None => match kind {
            FieldKind::Int => query.bind(None::<i64>),
            FieldKind::Text => query.bind(None::<String>),
            FieldKind::Bool => query.bind(None::<bool>),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::models::{PHOTO, USER};
    use serde_json::json;

    #[test]
    fn select_statement_appends_filter_only_when_present() {
        assert_eq!(select_statement("users", "*", ""), "SELECT * FROM \"users\"");
        assert_eq!(
            select_statement("users", "id,username", "id = 7"),
            "SELECT id,username FROM \"users\" WHERE id = 7"
        );
    }

    #[test]
    fn insert_names_every_column_and_binds_null_for_unset() {
        let user = Model::from_json(&USER, &json!({"username": "abc"})).unwrap();
        let (statement, binds) = insert_statement("users", &user);
        assert!(statement.starts_with("INSERT INTO \"users\" (\"id\",\"username\""));
        assert!(statement.ends_with("VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)"));
        assert_eq!(binds.len(), USER.len());
        assert!(binds[0].1.is_none());
        assert_eq!(binds[1].1, Some(FieldValue::Text("abc".to_string())));
    }

    #[test]
    fn update_includes_only_set_fields() {
        let user =
            Model::from_json(&USER, &json!({"firstname": "Ada", "lastname": "Lovelace"})).unwrap();
        let (statement, binds) = update_statement("users", &user, "id = 7").unwrap();
        assert_eq!(
            statement,
            "UPDATE \"users\" SET \"firstname\" = $1,\"lastname\" = $2 WHERE id = 7"
        );
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn update_with_no_settable_fields_is_invalid_params() {
        let user = USER.instance();
        let err = update_statement("users", &user, "id = 7").err().unwrap();
        assert_eq!(err.error_id(), "InvalidParamsError");
    }

    #[test]
    fn delete_builds_conditions_from_set_fields() {
        let photo = Model::from_json(&PHOTO, &json!({"id": 4})).unwrap();
        let (statement, binds) = delete_statement("photos", &photo, "").unwrap();
        assert_eq!(statement, "DELETE FROM \"photos\" WHERE \"id\" = $1");
        assert_eq!(binds, vec![FieldValue::Int(4)]);
    }

    #[test]
    fn delete_without_criteria_is_rejected() {
        let photo = PHOTO.instance();
        let err = delete_statement("photos", &photo, "").err().unwrap();
        assert_eq!(err.error_id(), "InvalidParamsError");
    }

    #[test]
    fn password_digest_is_stable_hex() {
        let digest = password_digest("Abcdef12");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, password_digest("Abcdef12"));
        assert_ne!(digest, password_digest("Abcdef13"));
    }
}

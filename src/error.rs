// HTTP API error taxonomy
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Map, Value};

use crate::auth::permission::Permissions;
use crate::auth::TokenError;
use crate::database::StoreError;
use crate::model::ModelError;

/// API error with wire identity, client-safe message and optional
/// structured `info` payload.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    Validation(Value),
    DuplicateValue(Value),
    JsonParse(String),
    InvalidParams(Value),
    InvalidAuthToken(String),
    InvalidRefreshToken(String),

    // 403 Forbidden
    Unauthorized(Value),

    // 404 Not Found
    NotFound(String),

    // 400/500 depending on who caused it
    Store { message: String, client_fault: bool },
}

impl ApiError {
    /// Per-field constraint failures, `info` as `{field: [descriptions]}`.
    pub fn validation(info: Value) -> Self {
        ApiError::Validation(info)
    }

    /// Unique-field pre-check hits, one entry per duplicated field.
    pub fn duplicates(fields: &[&str]) -> Self {
        let mut info = Map::new();
        for field in fields {
            info.insert((*field).to_string(), Value::from("Already exist in db"));
        }
        ApiError::DuplicateValue(Value::Object(info))
    }

    pub fn json_parse(message: impl Into<String>) -> Self {
        ApiError::JsonParse(message.into())
    }

    pub fn invalid_params(info: impl Into<Value>) -> Self {
        ApiError::InvalidParams(info.into())
    }

    pub fn invalid_auth_token(message: impl Into<String>) -> Self {
        ApiError::InvalidAuthToken(message.into())
    }

    pub fn invalid_refresh_token(message: impl Into<String>) -> Self {
        ApiError::InvalidRefreshToken(message.into())
    }

    /// Authorization failure carrying the minimum permission mask that would
    /// have allowed the operation, e.g. `"R---"`.
    pub fn unauthorized_for(desired: Permissions) -> Self {
        ApiError::Unauthorized(json!({ "required_permissions": desired.to_string() }))
    }

    pub fn unauthorized(info: impl Into<Value>) -> Self {
        ApiError::Unauthorized(info.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::DuplicateValue(_)
            | ApiError::JsonParse(_)
            | ApiError::InvalidParams(_)
            | ApiError::InvalidAuthToken(_)
            | ApiError::InvalidRefreshToken(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store { client_fault: true, .. } => StatusCode::BAD_REQUEST,
            ApiError::Store { client_fault: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable wire identifier for client-side handling.
    pub fn error_id(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::DuplicateValue(_) => "DuplicateValueError",
            ApiError::JsonParse(_) => "JsonParseError",
            ApiError::InvalidParams(_) => "InvalidParamsError",
            ApiError::InvalidAuthToken(_) => "InvalidAuthToken",
            ApiError::InvalidRefreshToken(_) => "InvalidRefreshToken",
            ApiError::Unauthorized(_) => "UnauthorizedError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::Store { .. } => "StoreError",
        }
    }

    /// Fixed client-safe message per error kind; detail goes in `info`.
    pub fn message(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Invalid parameters",
            ApiError::DuplicateValue(_) => "Duplicate value",
            ApiError::JsonParse(_) => "Error parsing JSON",
            ApiError::InvalidParams(_) => "Invalid parameters",
            ApiError::InvalidAuthToken(_) => "Invalid authentication token",
            ApiError::InvalidRefreshToken(_) => "Invalid refresh token",
            ApiError::Unauthorized(_) => "Invalid permissions",
            ApiError::NotFound(_) => "Resource not found",
            ApiError::Store { .. } => "Database error",
        }
    }

    pub fn info(&self) -> Option<Value> {
        match self {
            ApiError::Validation(info)
            | ApiError::DuplicateValue(info)
            | ApiError::InvalidParams(info)
            | ApiError::Unauthorized(info) => Some(info.clone()),
            ApiError::JsonParse(detail)
            | ApiError::InvalidAuthToken(detail)
            | ApiError::InvalidRefreshToken(detail)
            | ApiError::NotFound(detail) => {
                (!detail.is_empty()).then(|| Value::from(detail.clone()))
            }
            ApiError::Store { message, .. } => {
                (!message.is_empty()).then(|| Value::from(message.clone()))
            }
        }
    }

    /// Wire body: `{error_id, message, info?}`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error_id": self.error_id(),
            "message": self.message(),
        });
        if let Some(info) = self.info() {
            body["info"] = info;
        }
        body
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

// Translate module errors at the action boundary; raw driver errors are
// logged server-side and never leaked to the client.

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let client_fault = err.is_client_fault();
        if client_fault {
            tracing::warn!("Store rejected statement: {}", err);
            ApiError::Store {
                message: "The store rejected the request".to_string(),
                client_fault: true,
            }
        } else {
            tracing::error!("Store error: {}", err);
            ApiError::Store {
                message: "An error occurred while processing your request".to_string(),
                client_fault: false,
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Store(store) => store.into(),
            other => ApiError::invalid_auth_token(other.to_string()),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotAnObject => ApiError::json_parse(err.to_string()),
            ModelError::UnknownField(_) | ModelError::Coercion(_) => {
                ApiError::invalid_params(err.to_string())
            }
        }
    }
}

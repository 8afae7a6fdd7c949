pub mod describe;
pub mod photos;
pub mod session;
pub mod users;

use axum::http::{header, HeaderMap};
use axum::Json;
use serde_json::{json, Value};

/// Extract the bearer token string from the Authorization header, if any.
/// The engine only needs "a token string or none"; everything else about the
/// transport stays out here.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// Standard success body: `{"message": "SUCCESS", "info": …}`.
pub(crate) fn success(info: impl Into<Value>) -> Json<Value> {
    Json(json!({ "message": "SUCCESS", "info": info.into() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn success_body_shape() {
        let Json(body) = success("done");
        assert_eq!(body["message"], "SUCCESS");
        assert_eq!(body["info"], "done");
    }
}

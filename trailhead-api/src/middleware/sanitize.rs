//! JSON body sanitization against operator injection.
//!
//! Keys beginning with `$` or containing `.` are query-operator syntax in
//! the document database; they are stripped from request bodies at any depth
//! before handlers deserialize them. Doubles as the JSON body-size limit.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, Method},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::error::{Error, Result};

/// JSON bodies larger than this are refused outright.
pub const JSON_BODY_LIMIT: usize = 10 * 1024;

fn has_json_body(request: &Request<Body>) -> bool {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return false;
    }
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Strip operator-shaped keys, recursively.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !key.starts_with('$') && !key.contains('.'));
            for nested in map.values_mut() {
                sanitize_value(nested);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_value(item);
            }
        }
        _ => {}
    }
}

pub async fn sanitize_json(request: Request<Body>, next: Next) -> Result<Response> {
    if !has_json_body(&request) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, JSON_BODY_LIMIT)
        .await
        .map_err(|_| Error::BadRequest("Request body too large".to_string()))?;

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(mut value) => {
            sanitize_value(&mut value);
            let clean = serde_json::to_vec(&value)
                .map_err(|e| Error::Internal(format!("re-encoding sanitized body failed: {e}")))?;
            parts
                .headers
                .insert(header::CONTENT_LENGTH, clean.len().into());
            Body::from(clean)
        }
        // Not JSON after all; hand it through untouched and let the handler's
        // extractor produce the rejection.
        Err(_) => Body::from(bytes),
    };

    Ok(next.run(Request::from_parts(parts, body)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_keys_are_stripped() {
        let mut value = json!({
            "email": { "$gt": "" },
            "password": "pass1234"
        });
        sanitize_value(&mut value);
        assert_eq!(value, json!({ "email": {}, "password": "pass1234" }));
    }

    #[test]
    fn test_dotted_keys_are_stripped() {
        let mut value = json!({ "role.admin": true, "name": "Alice" });
        sanitize_value(&mut value);
        assert_eq!(value, json!({ "name": "Alice" }));
    }

    #[test]
    fn test_nested_and_array_payloads_are_cleaned() {
        let mut value = json!({
            "filter": { "$where": "sleep(1000)", "safe": { "$ne": 1, "ok": true } },
            "items": [ { "$inc": { "price": -1 } }, { "name": "fine" } ]
        });
        sanitize_value(&mut value);
        assert_eq!(
            value,
            json!({
                "filter": { "safe": { "ok": true } },
                "items": [ {}, { "name": "fine" } ]
            })
        );
    }

    #[test]
    fn test_clean_payloads_are_untouched() {
        let original = json!({
            "name": "The Forest Hiker",
            "price": 397,
            "tags": ["forest", "hike"]
        });
        let mut value = original.clone();
        sanitize_value(&mut value);
        assert_eq!(value, original);
    }

    #[test]
    fn test_scalars_pass_through() {
        let mut value = json!("just a string");
        sanitize_value(&mut value);
        assert_eq!(value, json!("just a string"));
    }
}

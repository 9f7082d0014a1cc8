//! Response body transforms for the token endpoints.
//!
//! Tokens travel in cookies only, so handlers move them out of the JSON body
//! and replace them with a human-readable `detail` message.

use serde_json::{Map, Value};

use crate::jwt::RawToken;

/// Token fields removed from a response body.
#[derive(Debug, Default)]
pub struct StrippedTokens {
    pub access: Option<RawToken>,
    pub refresh: Option<RawToken>,
}

/// Remove the `access` and `refresh` fields from a JSON object body.
/// Non-object bodies are returned unchanged.
pub fn strip_token_fields(body: Value) -> (Value, StrippedTokens) {
    let Value::Object(mut fields) = body else {
        return (body, StrippedTokens::default());
    };

    let mut take = |key: &str| match fields.remove(key) {
        Some(Value::String(token)) if !token.is_empty() => Some(RawToken::from(token)),
        _ => None,
    };
    let tokens = StrippedTokens {
        access: take("access"),
        refresh: take("refresh"),
    };

    (Value::Object(fields), tokens)
}

/// Set `detail` on a JSON object body. Non-object bodies are replaced.
pub fn inject_detail(body: Value, message: &str) -> Value {
    let mut fields = match body {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    fields.insert("detail".to_string(), Value::String(message.to_string()));
    Value::Object(fields)
}

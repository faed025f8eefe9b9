//! Decoded success payloads.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Body of a successful response after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204, or a 2xx with an empty body.
    Empty,
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not JSON; returned verbatim.
    Text(String),
}

impl Payload {
    /// Classify a success body. Never fails.
    pub fn from_body(status: u16, body: &str) -> Self {
        if status == 204 || body.is_empty() {
            return Payload::Empty;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(body.to_string()),
        }
    }

    /// Convert to a JSON value. `Empty` becomes `{}` and text becomes a
    /// JSON string.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Empty => Value::Object(Map::new()),
            Payload::Json(value) => value,
            Payload::Text(text) => Value::String(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Deserialize into a typed record.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Payload::Text(text) => Err(ApiError::Decode(format!(
                "expected JSON, got text: {}",
                truncate(&text, 120)
            ))),
            other => serde_json::from_value(other.into_json())
                .map_err(|e| ApiError::Decode(e.to_string())),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: u64,
    }

    #[test]
    fn no_content_is_empty_regardless_of_body() {
        assert_eq!(Payload::from_body(204, ""), Payload::Empty);
        assert_eq!(Payload::from_body(204, "ignored"), Payload::Empty);
        assert_eq!(Payload::from_body(200, ""), Payload::Empty);
    }

    #[test]
    fn empty_renders_as_empty_object() {
        assert_eq!(Payload::Empty.into_json(), json!({}));
    }

    #[test]
    fn non_json_body_is_kept_verbatim() {
        assert_eq!(
            Payload::from_body(200, "pong"),
            Payload::Text("pong".to_string())
        );
    }

    #[test]
    fn decode_typed_record() {
        let thing: Thing = Payload::Json(json!({"id": 7, "extra": true})).decode().unwrap();
        assert_eq!(thing, Thing { id: 7 });
    }

    #[test]
    fn decode_text_is_an_error() {
        let err = Payload::Text("hello".to_string()).decode::<Thing>().unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}

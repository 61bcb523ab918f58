//! The normalized result of every call through the client.
//!
//! # Design
//! An `ApiResponse` is the JSON object the caller sees: on success it is the
//! server's payload untouched, on failure it is `{isError, message, ...}`.
//! It serializes transparently to that object, so anything the server sent
//! (`data`, `message`, `errors`, or fields this crate does not know about)
//! survives a round trip. Where the failure came from is kept beside the
//! object as an `ErrorKind` and never leaks into the JSON.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, ErrorKind};

pub(crate) const GENERIC_ERROR_MESSAGE: &str = "The response to your request was an error.";

const IS_ERROR: &str = "isError";
const MESSAGE: &str = "message";
const DATA: &str = "data";
const ERRORS: &str = "errors";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiResponse {
    body: Map<String, Value>,
    #[serde(skip)]
    kind: Option<ErrorKind>,
    #[serde(skip)]
    status: Option<u16>,
}

impl ApiResponse {
    /// A successful payload, passed through verbatim. A payload that flags
    /// itself with `isError` but carries no string `message` gets the
    /// generic one, so every error envelope has a message.
    pub(crate) fn success(mut body: Map<String, Value>, status: u16) -> Self {
        let flagged = body.get(IS_ERROR).and_then(Value::as_bool) == Some(true);
        if flagged && !body.get(MESSAGE).is_some_and(Value::is_string) {
            body.insert(
                MESSAGE.to_string(),
                Value::String(GENERIC_ERROR_MESSAGE.to_string()),
            );
        }
        Self {
            body,
            kind: flagged.then_some(ErrorKind::Rejected),
            status: Some(status),
        }
    }

    /// A non-2xx payload. The server's `message` wins over the generic text;
    /// every other field (notably `errors`) flows through unchanged.
    pub(crate) fn rejected(mut payload: Map<String, Value>, status: u16) -> Self {
        let message = match payload.remove(MESSAGE) {
            Some(Value::String(message)) => message,
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        };
        payload.insert(IS_ERROR.to_string(), Value::Bool(true));
        payload.insert(MESSAGE.to_string(), Value::String(message));
        Self {
            body: payload,
            kind: Some(ErrorKind::Rejected),
            status: Some(status),
        }
    }

    pub fn is_error(&self) -> bool {
        self.body
            .get(IS_ERROR)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn message(&self) -> Option<&str> {
        self.body.get(MESSAGE).and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&Value> {
        self.body.get(DATA)
    }

    /// Deserialize `data` into `T`. A missing `data` deserializes from
    /// `null`, so `Option<T>` targets accept it.
    pub fn data_as<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(self.data().unwrap_or(&Value::Null))
    }

    /// The raw `errors` object of a validation failure.
    pub fn errors(&self) -> Option<&Map<String, Value>> {
        self.body.get(ERRORS).and_then(Value::as_object)
    }

    /// First message per field of `errors`, the form the UI shows next to
    /// each input. Fields without a string message are skipped.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let Some(errors) = self.errors() else {
            return BTreeMap::new();
        };
        errors
            .iter()
            .filter_map(|(field, messages)| {
                let first = match messages {
                    Value::Array(list) => list.first()?.as_str()?,
                    Value::String(single) => single.as_str(),
                    _ => return None,
                };
                Some((field.clone(), first.to_string()))
            })
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Where the call failed; `None` for successes.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    /// Status of the HTTP response behind this envelope, if one arrived.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.body
    }
}

impl From<ApiError> for ApiResponse {
    fn from(err: ApiError) -> Self {
        let mut body = Map::new();
        body.insert(IS_ERROR.to_string(), Value::Bool(true));
        body.insert(MESSAGE.to_string(), Value::String(err.to_string()));
        Self {
            body,
            kind: Some(err.kind()),
            status: err.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn success_serializes_to_payload_only() {
        let response = ApiResponse::success(object(json!({"data": {"id": 42}})), 200);
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"data": {"id": 42}}));
        assert!(!response.is_error());
        assert_eq!(response.kind(), None);
        assert_eq!(response.status(), Some(200));
    }

    #[test]
    fn flagged_success_payload_always_has_message() {
        let response = ApiResponse::success(object(json!({"isError": true})), 200);
        assert!(response.is_error());
        assert_eq!(response.message(), Some(GENERIC_ERROR_MESSAGE));
        assert_eq!(response.kind(), Some(ErrorKind::Rejected));

        let response =
            ApiResponse::success(object(json!({"isError": true, "message": "Quota"})), 200);
        assert_eq!(response.message(), Some("Quota"));
    }

    #[test]
    fn rejected_keeps_server_message_and_errors() {
        let response = ApiResponse::rejected(
            object(json!({"message": "Invalid", "errors": {"title": ["Required"]}})),
            422,
        );
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"isError": true, "message": "Invalid", "errors": {"title": ["Required"]}})
        );
        assert_eq!(response.kind(), Some(ErrorKind::Rejected));
    }

    #[test]
    fn rejected_without_string_message_uses_generic_text() {
        let response = ApiResponse::rejected(object(json!({"message": 5, "detail": "x"})), 500);
        assert_eq!(response.message(), Some(GENERIC_ERROR_MESSAGE));
        assert_eq!(response.get("detail"), Some(&json!("x")));
    }

    #[test]
    fn api_error_becomes_error_envelope() {
        let response = ApiResponse::from(ApiError::Unauthorized { status: 401 });
        assert!(response.is_error());
        assert_eq!(
            response.message(),
            Some("Your request was not authorized. Try logging in.")
        );
        assert_eq!(response.kind(), Some(ErrorKind::Unauthorized));
        assert_eq!(response.status(), Some(401));
    }

    #[test]
    fn field_errors_take_first_message() {
        let response = ApiResponse::rejected(
            object(json!({"errors": {
                "title": ["Required", "Too short"],
                "servings": "Must be positive",
                "notes": [],
                "rating": [3],
            }})),
            422,
        );
        let fields = response.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["title"], "Required");
        assert_eq!(fields["servings"], "Must be positive");
    }

    #[test]
    fn data_as_deserializes_payload() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Matches {
            matches: Vec<String>,
        }

        let response = ApiResponse::success(object(json!({"data": {"matches": ["cup"]}})), 200);
        let matches: Matches = response.data_as().unwrap();
        assert_eq!(matches.matches, vec!["cup".to_string()]);

        let empty = ApiResponse::default();
        let missing: Option<Matches> = empty.data_as().unwrap();
        assert!(missing.is_none());
    }
}

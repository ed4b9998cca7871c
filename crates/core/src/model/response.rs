use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::form::FormName;
use crate::model::ids::{FormProgressId, ResponseRecordId, UserId};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResponseError {
    #[error("response payload must be a JSON object")]
    NotAnObject,

    #[error("malformed response payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A user's answers to one form, keyed by question identifier.
///
/// The values are stored as given; nothing here knows the question set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponsePayload(Map<String, Value>);

impl ResponsePayload {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `ResponseError::NotAnObject` for arrays, scalars and null.
    pub fn from_value(value: Value) -> Result<Self, ResponseError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ResponseError::NotAnObject),
        }
    }

    /// Parse the stored JSON text form.
    ///
    /// # Errors
    ///
    /// Returns `ResponseError` if the text is not a JSON object.
    pub fn from_json_str(raw: &str) -> Result<Self, ResponseError> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// Serialize to JSON text for storage.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    #[must_use]
    pub fn get(&self, question_id: &str) -> Option<&Value> {
        self.0.get(question_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stored answers for one (user, form) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub id: ResponseRecordId,
    pub user_id: UserId,
    pub form_id: FormProgressId,
    pub form_name: FormName,
    pub responses: ResponsePayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_accepts_objects_only() {
        assert!(ResponsePayload::from_value(json!({"q1": "yes"})).is_ok());
        assert!(matches!(
            ResponsePayload::from_value(json!(["q1"])),
            Err(ResponseError::NotAnObject)
        ));
        assert!(matches!(
            ResponsePayload::from_value(Value::Null),
            Err(ResponseError::NotAnObject)
        ));
    }

    #[test]
    fn payload_keeps_nested_values_verbatim() {
        let raw = r#"{"q1":"yes","q2":{"choice":3,"note":null},"q3":[1,2]}"#;
        let payload = ResponsePayload::from_json_str(raw).unwrap();
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.get("q2"), Some(&json!({"choice": 3, "note": null})));

        let reparsed = ResponsePayload::from_json_str(&payload.to_json_string()).unwrap();
        assert_eq!(reparsed, payload);
    }

    #[test]
    fn malformed_text_is_reported() {
        assert!(matches!(
            ResponsePayload::from_json_str("{not json"),
            Err(ResponseError::Malformed(_))
        ));
    }
}

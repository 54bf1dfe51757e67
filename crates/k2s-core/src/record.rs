//! Records and record normalization.
//!
//! Inbound payloads arrive either already structured or as encoded text
//! that still needs a parse step (producers that JSON-encode a JSON body end
//! up double-encoded). [`RecordInput`] tags the two shapes and
//! [`Record::normalize`] turns either into a [`Record`].

use crate::RecordError;
use serde_json::{Map, Value};

/// Shape of an inbound record before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordInput {
    /// Already a decoded JSON value
    Structured(Value),
    /// JSON text that still needs parsing
    Encoded(String),
}

impl From<Value> for RecordInput {
    fn from(value: Value) -> Self {
        RecordInput::Structured(value)
    }
}

impl From<String> for RecordInput {
    fn from(text: String) -> Self {
        RecordInput::Encoded(text)
    }
}

impl From<Map<String, Value>> for RecordInput {
    fn from(map: Map<String, Value>) -> Self {
        RecordInput::Structured(Value::Object(map))
    }
}

/// An ordered mapping from field name to value.
///
/// Field order is the order fields appeared in the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Normalize an input into a record.
    ///
    /// A structured JSON string is parsed once more, so a double-encoded
    /// object is accepted. Anything that does not end up as a JSON object
    /// with at least one field is [`RecordError::Malformed`].
    pub fn normalize(input: RecordInput) -> Result<Self, RecordError> {
        match input {
            RecordInput::Structured(Value::Object(fields)) => Self::from_fields(fields),
            RecordInput::Structured(Value::String(text)) | RecordInput::Encoded(text) => {
                match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Object(fields)) => Self::from_fields(fields),
                    Ok(other) => Err(RecordError::Malformed(format!(
                        "expected a JSON object, found {}",
                        kind_of(&other)
                    ))),
                    Err(e) => Err(RecordError::Malformed(format!(
                        "text is not a JSON object: {}",
                        e
                    ))),
                }
            }
            RecordInput::Structured(other) => Err(RecordError::Malformed(format!(
                "expected a JSON object, found {}",
                kind_of(&other)
            ))),
        }
    }

    // An empty object would establish a zero-column header for its window
    fn from_fields(fields: Map<String, Value>) -> Result<Self, RecordError> {
        if fields.is_empty() {
            return Err(RecordError::Malformed("object has no fields".into()));
        }
        Ok(Self { fields })
    }

    /// Field names in encountered order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Render one field as a table cell.
    ///
    /// Missing fields and JSON `null` yield `None` (an empty cell).
    pub fn cell(&self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            nested @ (Value::Array(_) | Value::Object(_)) => Some(nested.to_string()),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Selection payload decoding

use serde_json::{Map, Value};

/// Internal store signal the engine keeps per selection parameter.
pub fn store_signal_name(param: &str) -> String {
    format!("{param}_store")
}

/// Decoded user-selection payload emitted by a view signal.
///
/// The engine reports selections as duck-typed JSON; the runtime narrows
/// them to this closed set before anything touches the state store, with
/// `Passthrough` covering shapes it does not recognize.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionPayload {
    /// Discrete point selection, unwrapped from the disjunctive wrapper
    /// to just the selected-point list
    Points(Vec<Value>),

    /// Interval selection: per-field bound lists
    Interval(Map<String, Value>),

    /// Anything unrecognized, forwarded untouched
    Passthrough(Value),
}

impl SelectionPayload {
    /// Decode a raw signal value
    pub fn from_signal(value: &Value) -> Self {
        if let Some(points) = value
            .get("vlPoint")
            .and_then(|p| p.get("or"))
            .and_then(|or| or.as_array())
        {
            return SelectionPayload::Points(points.clone());
        }
        if let Some(fields) = value.as_object() {
            if !fields.is_empty() && fields.values().all(Value::is_array) {
                return SelectionPayload::Interval(fields.clone());
            }
        }
        SelectionPayload::Passthrough(value.clone())
    }

    /// The JSON form stored in the externally visible selection state
    pub fn into_value(self) -> Value {
        match self {
            SelectionPayload::Points(points) => Value::Array(points),
            SelectionPayload::Interval(fields) => Value::Object(fields),
            SelectionPayload::Passthrough(value) => value,
        }
    }
}

//! Wire envelope codec
//!
//! Every frame exchanged with the server is a JSON object tagged by an
//! `event` field:
//!
//! ```json
//! {"event": "init", "map": {"a": 1}}
//! {"event": "put", "key": "a", "value": 1}
//! {"event": "remove", "key": "a"}
//! {"event": "clear"}
//! ```

use crate::error::{Result, SharedMapError};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;

/// Decoded wire unit
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Full snapshot of the server map
    Init { map: HashMap<String, Value> },
    /// Single key write
    Put { key: String, value: Value },
    /// Single key removal
    Remove { key: String },
    /// Empty the map
    Clear,
    /// Tag this client does not understand; carried so it can be logged
    Unknown { event: String },
}

/// Event tag of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    Put,
    Remove,
    Clear,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Put => "put",
            Self::Remove => "remove",
            Self::Clear => "clear",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Envelope {
    /// Event tag, `None` for unknown envelopes
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Init { .. } => Some(EventKind::Init),
            Self::Put { .. } => Some(EventKind::Put),
            Self::Remove { .. } => Some(EventKind::Remove),
            Self::Clear => Some(EventKind::Clear),
            Self::Unknown { .. } => None,
        }
    }

    /// Convert to the JSON object sent on the wire
    pub fn to_json(&self) -> Value {
        match self {
            Self::Init { map } => json!({"event": "init", "map": map}),
            Self::Put { key, value } => json!({"event": "put", "key": key, "value": value}),
            Self::Remove { key } => json!({"event": "remove", "key": key}),
            Self::Clear => json!({"event": "clear"}),
            Self::Unknown { event } => json!({"event": event}),
        }
    }
}

/// Serialize an envelope to its JSON text frame
pub fn encode(envelope: &Envelope) -> Result<String> {
    Ok(serde_json::to_string(&envelope.to_json())?)
}

/// Decode a text frame
pub fn decode(text: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SharedMapError::MalformedEnvelope(format!("invalid JSON: {e}")))?;
    from_value(value)
}

/// Decode an already-parsed JSON value
pub fn from_value(value: Value) -> Result<Envelope> {
    let Value::Object(mut object) = value else {
        return Err(malformed("envelope is not a JSON object"));
    };

    let event = match object.remove("event") {
        Some(Value::String(event)) => event,
        Some(_) => return Err(malformed("`event` is not a string")),
        None => return Err(malformed("missing `event` tag")),
    };

    match event.as_str() {
        "init" => {
            let map = match object.remove("map") {
                Some(Value::Object(map)) => map,
                _ => return Err(malformed("`init` requires an object `map`")),
            };
            Ok(Envelope::Init {
                map: snapshot(map)?,
            })
        }
        "put" => Ok(Envelope::Put {
            key: take_key(&mut object, "put")?,
            value: object.remove("value").unwrap_or(Value::Null),
        }),
        "remove" => Ok(Envelope::Remove {
            key: take_key(&mut object, "remove")?,
        }),
        "clear" => Ok(Envelope::Clear),
        _ => Ok(Envelope::Unknown { event }),
    }
}

fn take_key(object: &mut Map<String, Value>, event: &str) -> Result<String> {
    match object.remove("key") {
        Some(Value::String(key)) if !key.is_empty() => Ok(key),
        Some(Value::String(_)) => Err(malformed(&format!("`{event}` has an empty key"))),
        _ => Err(malformed(&format!("`{event}` requires a string `key`"))),
    }
}

fn snapshot(map: Map<String, Value>) -> Result<HashMap<String, Value>> {
    if map.contains_key("") {
        return Err(malformed("`init` map contains an empty key"));
    }
    Ok(map.into_iter().collect())
}

fn malformed(reason: &str) -> SharedMapError {
    SharedMapError::MalformedEnvelope(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_init() {
        let envelope = decode(r#"{"event":"init","map":{"a":1,"b":"two"}}"#).unwrap();
        let Envelope::Init { map } = envelope else {
            panic!("expected init");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], json!(1));
        assert_eq!(map["b"], json!("two"));
    }

    #[test]
    fn test_decode_put_keeps_structured_value() {
        let envelope = decode(r#"{"event":"put","key":"k","value":{"nested":[1,2]}}"#).unwrap();
        assert_eq!(
            envelope,
            Envelope::Put {
                key: "k".into(),
                value: json!({"nested": [1, 2]}),
            }
        );
    }

    #[test]
    fn test_decode_put_without_value_is_null() {
        let envelope = decode(r#"{"event":"put","key":"k"}"#).unwrap();
        assert_eq!(
            envelope,
            Envelope::Put {
                key: "k".into(),
                value: Value::Null,
            }
        );
    }

    #[test]
    fn test_decode_remove_and_clear() {
        assert_eq!(
            decode(r#"{"event":"remove","key":"gone"}"#).unwrap(),
            Envelope::Remove { key: "gone".into() }
        );
        assert_eq!(decode(r#"{"event":"clear"}"#).unwrap(), Envelope::Clear);
    }

    #[test]
    fn test_decode_unknown_event_is_not_an_error() {
        let envelope = decode(r#"{"event":"snapshot-v2","data":[]}"#).unwrap();
        assert_eq!(
            envelope,
            Envelope::Unknown {
                event: "snapshot-v2".into()
            }
        );
        assert_eq!(envelope.kind(), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for frame in [
            "not json",
            "[1,2,3]",
            r#"{"key":"a"}"#,
            r#"{"event":7}"#,
            r#"{"event":"put","value":1}"#,
            r#"{"event":"put","key":"","value":1}"#,
            r#"{"event":"remove","key":null}"#,
            r#"{"event":"init","map":[]}"#,
            r#"{"event":"init","map":{"":1}}"#,
        ] {
            let err = decode(frame).unwrap_err();
            assert!(
                matches!(err, SharedMapError::MalformedEnvelope(_)),
                "{frame} -> {err:?}"
            );
        }
    }

    #[test]
    fn test_encode_put() {
        let frame = encode(&Envelope::Put {
            key: "a".into(),
            value: json!([true, null]),
        })
        .unwrap();
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed, json!({"event": "put", "key": "a", "value": [true, null]}));
    }

    #[test]
    fn test_encode_clear_has_no_payload() {
        let frame = encode(&Envelope::Clear).unwrap();
        assert_eq!(frame, r#"{"event":"clear"}"#);
    }
}

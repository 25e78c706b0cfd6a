use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChannelError;

/// Wire types for the object-proxy protocol.
///
/// Every message is a flat JSON object tagged by a small integer `type`
/// field. Requests that expect a reply additionally carry a caller-assigned
/// integer `id` which the host echoes back on the matching response. The
/// structs here are transport-agnostic; framing is the transport's problem.
///
/// Message shapes:
///
/// | type | name           | fields                                |
/// |------|----------------|---------------------------------------|
/// | 1    | Init           | `id` (reply maps object name → schema)|
/// | 2    | Signal         | `object`, `signal`, `args`            |
/// | 3    | PropertyUpdate | `object`, `data`                      |
/// | 4    | InvokeMethod   | `object`, `method`, `args`, `id?`     |
/// | 5    | Response       | `id`, `data`                          |
pub const OBJECT_REF_KEY: &str = "__id__";

/// Integer `type` tags used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Init = 1,
    Signal = 2,
    PropertyUpdate = 3,
    InvokeMethod = 4,
    Response = 5,
}

impl MessageType {
    pub const fn tag(self) -> u64 {
        self as u64
    }

    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(MessageType::Init),
            2 => Some(MessageType::Signal),
            3 => Some(MessageType::PropertyUpdate),
            4 => Some(MessageType::InvokeMethod),
            5 => Some(MessageType::Response),
            _ => None,
        }
    }
}

/// One protocol message. All fields are optional at the serde level so a
/// single shape covers every message kind; [`classify`] decides the routing.
/// Unknown extra fields on inbound messages are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// The handshake request. The reply's `data` maps object names to their
    /// [`ObjectSchema`].
    pub fn init() -> Self {
        Self {
            kind: Some(MessageType::Init.tag()),
            ..Default::default()
        }
    }

    /// An `InvokeMethod` request. Leave `id` unset for fire-and-forget.
    pub fn invoke(object: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            kind: Some(MessageType::InvokeMethod.tag()),
            object: Some(object.into()),
            method: Some(method.into()),
            args: Some(args),
            ..Default::default()
        }
    }
}

/// Routing classification of an inbound message.
///
/// A message whose `type` is missing or unrecognized but which carries an
/// `id` is still treated as a response; hosts predating the `type` field on
/// replies depend on this. Do not extend the fallback beyond that.
#[derive(Debug)]
pub enum Inbound {
    Response { id: u64, data: Value },
    Signal { object: String, signal: String, args: Vec<Value> },
    PropertyUpdate { object: String, data: Value },
    /// Nothing to route on: no usable type and no id. Dropped silently.
    Ignored,
}

pub fn classify(envelope: Envelope) -> Inbound {
    let kind = envelope.kind.and_then(MessageType::from_tag);
    match kind {
        Some(MessageType::Response) => match envelope.id {
            Some(id) => Inbound::Response {
                id,
                data: envelope.data.unwrap_or(Value::Null),
            },
            None => Inbound::Ignored,
        },
        Some(MessageType::Signal) => match (envelope.object, envelope.signal) {
            (Some(object), Some(signal)) => Inbound::Signal {
                object,
                signal,
                args: envelope.args.unwrap_or_default(),
            },
            _ => Inbound::Ignored,
        },
        Some(MessageType::PropertyUpdate) => match (envelope.object, envelope.data) {
            (Some(object), Some(data)) => Inbound::PropertyUpdate { object, data },
            _ => Inbound::Ignored,
        },
        // Init, InvokeMethod or anything unknown: fall back to id routing.
        _ => match envelope.id {
            Some(id) => Inbound::Response {
                id,
                data: envelope.data.unwrap_or(Value::Null),
            },
            None => Inbound::Ignored,
        },
    }
}

/// An outbound payload handed to the codec: already-serialized text passes
/// through, structured data is serialized.
#[derive(Debug, Clone)]
pub enum OutboundPayload {
    Text(String),
    Message(Value),
}

/// An inbound payload as delivered by the transport: either raw text or a
/// message the transport already parsed.
#[derive(Debug, Clone)]
pub enum InboundPayload {
    Text(String),
    Message(Value),
}

/// Normalize an outbound payload to wire text.
pub fn encode(payload: OutboundPayload) -> Result<String, ChannelError> {
    match payload {
        OutboundPayload::Text(text) => Ok(text),
        OutboundPayload::Message(value) => Ok(serde_json::to_string(&value)?),
    }
}

/// Normalize an inbound payload to an [`Envelope`]. Parse failures propagate;
/// this layer does not catch them.
pub fn decode(payload: InboundPayload) -> Result<Envelope, ChannelError> {
    match payload {
        InboundPayload::Text(text) => Ok(serde_json::from_str(&text)?),
        InboundPayload::Message(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Per-object schema carried in the init reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// If `value` is an object-reference marker, return the referenced object's
/// name.
pub fn object_ref(value: &Value) -> Option<&str> {
    value.as_object()?.get(OBJECT_REF_KEY)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invoke_serializes_with_numeric_type_tag() {
        let mut env = Envelope::invoke("calc", "add", vec![json!(2), json!(3)]);
        env.id = Some(7);
        let value: Value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            value,
            json!({"type": 4, "id": 7, "object": "calc", "method": "add", "args": [2, 3]})
        );
    }

    #[test]
    fn fire_and_forget_omits_id_field() {
        let env = Envelope::invoke("calc", "reset", vec![]);
        let text = encode(OutboundPayload::Message(serde_json::to_value(&env).unwrap())).unwrap();
        assert!(!text.contains("\"id\""));
    }

    #[test]
    fn decode_accepts_text_and_structured_payloads() {
        let text = r#"{"type":2,"object":"calc","signal":"overflowed","args":[99]}"#;
        let from_text = decode(InboundPayload::Text(text.into())).unwrap();
        let from_value = decode(InboundPayload::Message(
            json!({"type": 2, "object": "calc", "signal": "overflowed", "args": [99]}),
        ))
        .unwrap();
        assert_eq!(from_text.signal.as_deref(), Some("overflowed"));
        assert_eq!(from_value.args, Some(vec![json!(99)]));
    }

    #[test]
    fn malformed_text_is_a_json_error() {
        let err = decode(InboundPayload::Text("{not json".into())).unwrap_err();
        assert!(matches!(err, ChannelError::Json(_)));
    }

    #[test]
    fn untyped_message_with_id_classifies_as_response() {
        let env = decode(InboundPayload::Message(json!({"id": 3, "data": "late"}))).unwrap();
        match classify(env) {
            Inbound::Response { id, data } => {
                assert_eq!(id, 3);
                assert_eq!(data, json!("late"));
            }
            other => panic!("expected response fallback, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_without_id_is_ignored() {
        let env = decode(InboundPayload::Message(json!({"type": 42}))).unwrap();
        assert!(matches!(classify(env), Inbound::Ignored));
    }

    #[test]
    fn object_ref_marker_is_recognized() {
        assert_eq!(object_ref(&json!({"__id__": "calc"})), Some("calc"));
        assert_eq!(object_ref(&json!({"value": 1})), None);
        assert_eq!(object_ref(&json!(5)), None);
    }

    #[test]
    fn schema_fields_all_default_when_absent() {
        let schema: ObjectSchema = serde_json::from_value(json!({})).unwrap();
        assert!(schema.methods.is_empty());
        assert!(schema.signals.is_empty());
        assert!(schema.properties.is_empty());
    }
}

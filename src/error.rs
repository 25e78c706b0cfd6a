use thiserror::Error;

/// Errors surfaced by the channel and its transport boundary.
///
/// Inbound anomalies that the protocol treats as benign races (responses for
/// unknown ids, signals for unknown objects) are *not* errors; they are
/// logged and dropped. Only malformed payloads and misuse of the outbound
/// API surface here.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Something went wrong encoding or decoding JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport refused or failed to accept an outbound frame.
    #[error("transport send failed: {0}")]
    Transport(String),

    /// The init reply did not carry an object-name → schema mapping.
    #[error("malformed init reply: {0}")]
    Handshake(String),

    /// No remote object with this name was announced in the init reply.
    #[error("unknown remote object '{0}'")]
    UnknownObject(String),

    /// The object exists but its schema declares no such method.
    #[error("object '{object}' has no method '{method}'")]
    UnknownMethod { object: String, method: String },

    /// The object exists but its schema declares no such signal.
    #[error("object '{object}' has no signal '{signal}'")]
    UnknownSignal { object: String, signal: String },

    /// The object exists but its schema declares no such property.
    #[error("object '{object}' has no property '{property}'")]
    UnknownProperty { object: String, property: String },
}

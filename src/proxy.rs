use serde_json::{Map, Value};

use crate::wire::ObjectSchema;

/// One mirrored property slot.
///
/// Property values referencing other remote objects are stored as keys into
/// the channel's object map, never as owning pointers, so reference cycles
/// between proxies are representable. A reference to an object the channel
/// does not know stays in [`PropertyValue::UnresolvedRef`] with the raw
/// marker intact; the protocol assumes every referenced object arrives in
/// the same init reply but does not enforce it.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain data, kept as received.
    Data(Value),
    /// A live reference: look the name up via `Channel::object`.
    ObjectRef(String),
    /// A reference marker naming an object the channel has not seen.
    UnresolvedRef(Value),
}

impl PropertyValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            PropertyValue::Data(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object_ref(&self) -> Option<&str> {
        match self {
            PropertyValue::ObjectRef(name) => Some(name),
            _ => None,
        }
    }
}

/// Local mirror of one remote object: its declared method and signal names
/// plus the last-known value of every property.
///
/// Construction is pure local assembly from already-received schema data;
/// no I/O happens here. Property values start empty and are filled in by
/// the channel's bulk snapshot pass once every proxy from the init reply
/// exists, so cross-references resolve no matter the declaration order.
#[derive(Debug)]
pub struct ProxyObject {
    name: String,
    methods: Vec<String>,
    signals: Vec<String>,
    values: std::collections::HashMap<String, PropertyValue>,
    /// Full property map from the schema, kept for the no-argument refresh.
    snapshot: Map<String, Value>,
}

impl ProxyObject {
    pub(crate) fn build(name: &str, schema: ObjectSchema) -> Self {
        Self {
            name: name.to_string(),
            methods: schema.methods,
            signals: schema.signals,
            values: std::collections::HashMap::new(),
            snapshot: schema.properties,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn signals(&self) -> &[String] {
        &self.signals
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    pub fn has_signal(&self, signal: &str) -> bool {
        self.signals.iter().any(|s| s == signal)
    }

    /// Declared property names, in schema order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.snapshot.keys().map(String::as_str)
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.snapshot.contains_key(property)
    }

    /// Last-known mirrored value, or `None` before the snapshot pass has
    /// run for this proxy.
    pub fn property(&self, property: &str) -> Option<&PropertyValue> {
        self.values.get(property)
    }

    pub(crate) fn set_property(&mut self, property: &str, value: PropertyValue) {
        self.values.insert(property.to_string(), value);
    }

    pub(crate) fn snapshot(&self) -> &Map<String, Value> {
        &self.snapshot
    }
}

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::ChannelError;
use crate::pending::PendingCalls;
use crate::properties::PropertyRouter;
use crate::proxy::{PropertyValue, ProxyObject};
use crate::signals::{SignalRouter, Subscription};
use crate::transport::Transport;
use crate::wire::{self, Envelope, Inbound, InboundPayload, ObjectSchema, OutboundPayload};

/// Handshake progress. The channel never leaves `Ready` once it gets there;
/// later messages are routed by their type without touching this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    AwaitingSchema,
    Ready,
}

/// Completion stored in the correlation table for one outstanding request.
enum ReplyHandler {
    /// The init reply: the controller finishes the handshake itself.
    InitSchema,
    /// A caller-supplied closure. It gets the channel back so it can issue
    /// follow-up calls.
    Callback(Box<dyn FnOnce(&mut Channel, Value) + Send>),
    /// Bridge to an awaiting caller. A dropped receiver is fine; the send
    /// result is ignored like any other late reply.
    Reply(oneshot::Sender<Value>),
}

/// Ready-callback invoked once every proxy exists and all property
/// snapshots are resolved.
pub type ReadyHandler = Box<dyn FnOnce(&mut Channel) + Send>;

/// The root session object: owns the transport, the correlation table, the
/// signal and property routers and the object map.
///
/// All state is behind `&mut self`, mirroring the single logical thread of
/// control the protocol assumes: inbound work happens inside
/// [`Channel::handle_message`], outbound work inside the invoke/connect
/// methods, and the borrow checker rules out interleaving. Embedders with a
/// genuinely concurrent transport must funnel both directions through one
/// task or lock.
pub struct Channel {
    transport: Box<dyn Transport>,
    pending: PendingCalls<ReplyHandler>,
    signals: SignalRouter,
    properties: PropertyRouter,
    objects: HashMap<String, ProxyObject>,
    /// Object names in discovery order (iteration order of the init reply).
    discovery_order: Vec<String>,
    state: ChannelState,
    on_ready: Option<ReadyHandler>,
}

impl Channel {
    /// Open a channel over `transport`: sends the init request through the
    /// correlation table and moves to `AwaitingSchema`. Fails loudly if the
    /// transport cannot take the init frame.
    pub fn open(transport: Box<dyn Transport>) -> Result<Self, ChannelError> {
        Self::start(transport, None)
    }

    /// Like [`Channel::open`], with a callback run once the handshake has
    /// completed and every proxy's properties are resolved.
    pub fn open_with(
        transport: Box<dyn Transport>,
        on_ready: impl FnOnce(&mut Channel) + Send + 'static,
    ) -> Result<Self, ChannelError> {
        Self::start(transport, Some(Box::new(on_ready)))
    }

    fn start(transport: Box<dyn Transport>, on_ready: Option<ReadyHandler>) -> Result<Self, ChannelError> {
        let mut channel = Self {
            transport,
            pending: PendingCalls::new(),
            signals: SignalRouter::new(),
            properties: PropertyRouter::new(),
            objects: HashMap::new(),
            discovery_order: Vec::new(),
            state: ChannelState::Uninitialized,
            on_ready,
        };
        let id = channel.pending.register(ReplyHandler::InitSchema);
        let mut init = Envelope::init();
        init.id = Some(id);
        channel.send_envelope(&init)?;
        channel.state = ChannelState::AwaitingSchema;
        Ok(channel)
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    // ------------------------------------------------------------------
    // Inbound routing
    // ------------------------------------------------------------------

    /// The single inbound entry point. Every transport-delivered payload
    /// goes through here, in delivery order. Malformed payloads propagate;
    /// whether that tears the channel down is the embedder's call.
    pub fn handle_message(&mut self, payload: InboundPayload) -> Result<(), ChannelError> {
        let envelope = wire::decode(payload)?;
        match wire::classify(envelope) {
            Inbound::Response { id, data } => self.handle_response(id, data)?,
            Inbound::Signal { object, signal, args } => {
                self.signals.dispatch(&object, &signal, &args);
            }
            Inbound::PropertyUpdate { object, data } => {
                self.apply_property_update(&object, data);
            }
            Inbound::Ignored => trace!("inbound message with no routable shape dropped"),
        }
        Ok(())
    }

    fn handle_response(&mut self, id: u64, data: Value) -> Result<(), ChannelError> {
        // Take the completion out first so it can re-enter the channel.
        match self.pending.resolve(id) {
            Some(ReplyHandler::InitSchema) => self.finish_handshake(data),
            Some(ReplyHandler::Callback(callback)) => {
                callback(self, data);
                Ok(())
            }
            Some(ReplyHandler::Reply(tx)) => {
                let _ = tx.send(data);
                Ok(())
            }
            None => {
                debug!("response for unknown or already-resolved request {} ignored", id);
                Ok(())
            }
        }
    }

    /// `AwaitingSchema → Ready`: build one proxy per schema entry, then
    /// resolve every proxy's property snapshot in a second pass so that
    /// cross-references between objects of the same reply land on live
    /// proxies, then hand the channel to the ready callback.
    fn finish_handshake(&mut self, data: Value) -> Result<(), ChannelError> {
        let Value::Object(schemas) = data else {
            return Err(ChannelError::Handshake(
                "init reply data is not an object map".to_string(),
            ));
        };

        for (name, raw_schema) in schemas {
            let schema: ObjectSchema = serde_json::from_value(raw_schema)?;
            self.signals.register_object(&name, &schema.signals);
            self.properties.register_object(&name, schema.properties.keys());
            self.objects.insert(name.clone(), ProxyObject::build(&name, schema));
            self.discovery_order.push(name);
        }

        let names = self.discovery_order.clone();
        for name in &names {
            self.apply_snapshot(name)?;
        }

        self.state = ChannelState::Ready;
        debug!("channel ready with {} remote object(s)", names.len());
        if let Some(on_ready) = self.on_ready.take() {
            on_ready(self);
        }
        Ok(())
    }

    /// Overwrite mirrored values from a `PropertyUpdate` message and fire
    /// the change watchers. Unknown object or property names are dropped.
    fn apply_property_update(&mut self, object: &str, data: Value) {
        let Value::Object(updates) = data else {
            warn!("property update for '{}' without a value map dropped", object);
            return;
        };
        if !self.objects.contains_key(object) {
            debug!("property update for unknown object '{}' ignored", object);
            return;
        }
        for (property, raw) in updates {
            let declared = self
                .objects
                .get(object)
                .is_some_and(|proxy| proxy.has_property(&property));
            if !declared {
                debug!("update for undeclared property {}::{} ignored", object, property);
                continue;
            }
            let value = self.resolve_value(&raw);
            if let Some(proxy) = self.objects.get_mut(object) {
                proxy.set_property(&property, value.clone());
            }
            self.properties.notify(object, &property, &value);
        }
    }

    /// Initialize (or re-initialize) every declared property of `object`
    /// from the schema's full property map. Object-reference markers are
    /// resolved against the current object map; watchers are not fired, the
    /// snapshot is state transfer, not a change.
    fn apply_snapshot(&mut self, object: &str) -> Result<(), ChannelError> {
        let snapshot = match self.objects.get(object) {
            Some(proxy) => proxy.snapshot().clone(),
            None => return Err(ChannelError::UnknownObject(object.to_string())),
        };
        for (property, raw) in snapshot {
            let value = self.resolve_value(&raw);
            if let Some(proxy) = self.objects.get_mut(object) {
                proxy.set_property(&property, value);
            }
        }
        Ok(())
    }

    /// Resolution happens at assignment time: a marker naming a known proxy
    /// becomes a live reference, a marker naming anything else is kept
    /// verbatim as unresolved.
    fn resolve_value(&self, raw: &Value) -> PropertyValue {
        match wire::object_ref(raw) {
            Some(target) if self.objects.contains_key(target) => {
                PropertyValue::ObjectRef(target.to_string())
            }
            Some(target) => {
                warn!("property references undeclared object '{}'; kept unresolved", target);
                PropertyValue::UnresolvedRef(raw.clone())
            }
            None => PropertyValue::Data(raw.clone()),
        }
    }

    // ------------------------------------------------------------------
    // Outbound calls
    // ------------------------------------------------------------------

    /// Fire-and-forget invocation: no id is allocated, no response is ever
    /// consumed for this call.
    pub fn invoke(
        &mut self,
        object: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(), ChannelError> {
        self.check_method(object, method)?;
        let envelope = Envelope::invoke(object, method, args);
        self.send_envelope(&envelope)
    }

    /// Correlated invocation. `handler` runs exactly once, when (and only
    /// when) the matching response arrives; a host that never answers
    /// leaves it retained until [`Channel::cancel_pending`]. Returns the
    /// allocated request id.
    pub fn invoke_with(
        &mut self,
        object: &str,
        method: &str,
        args: Vec<Value>,
        handler: impl FnOnce(&mut Channel, Value) + Send + 'static,
    ) -> Result<u64, ChannelError> {
        self.check_method(object, method)?;
        let id = self.pending.register(ReplyHandler::Callback(Box::new(handler)));
        let mut envelope = Envelope::invoke(object, method, args);
        envelope.id = Some(id);
        if let Err(err) = self.send_envelope(&envelope) {
            self.pending.cancel(id);
            return Err(err);
        }
        Ok(id)
    }

    /// Correlated invocation with a one-shot reply handle instead of a
    /// closure. Awaiting the receiver suspends until the host answers;
    /// there is no built-in timeout.
    pub fn invoke_for_reply(
        &mut self,
        object: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<oneshot::Receiver<Value>, ChannelError> {
        self.check_method(object, method)?;
        let (tx, rx) = oneshot::channel();
        let id = self.pending.register(ReplyHandler::Reply(tx));
        let mut envelope = Envelope::invoke(object, method, args);
        envelope.id = Some(id);
        if let Err(err) = self.send_envelope(&envelope) {
            self.pending.cancel(id);
            return Err(err);
        }
        Ok(rx)
    }

    fn check_method(&self, object: &str, method: &str) -> Result<(), ChannelError> {
        let proxy = self
            .objects
            .get(object)
            .ok_or_else(|| ChannelError::UnknownObject(object.to_string()))?;
        if !proxy.has_method(method) {
            return Err(ChannelError::UnknownMethod {
                object: object.to_string(),
                method: method.to_string(),
            });
        }
        Ok(())
    }

    fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), ChannelError> {
        let frame = wire::encode(OutboundPayload::Message(serde_json::to_value(envelope)?))?;
        self.transport.send(frame)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Subscribe to a remote signal. Emissions reach subscribers in
    /// connection order.
    pub fn connect(
        &mut self,
        object: &str,
        signal: &str,
        handler: impl FnMut(&[Value]) + Send + 'static,
    ) -> Result<Subscription, ChannelError> {
        self.signals.connect(object, signal, Box::new(handler))
    }

    /// Drop one signal subscription. No-op if it is already gone.
    pub fn disconnect(&mut self, object: &str, signal: &str, subscription: Subscription) -> bool {
        self.signals.disconnect(object, signal, subscription)
    }

    /// Subscribe to change notifications for one mirrored property.
    pub fn watch_property(
        &mut self,
        object: &str,
        property: &str,
        handler: impl FnMut(&PropertyValue) + Send + 'static,
    ) -> Result<Subscription, ChannelError> {
        self.properties.watch(object, property, Box::new(handler))
    }

    /// Drop one property watcher. No-op if it is already gone.
    pub fn unwatch_property(
        &mut self,
        object: &str,
        property: &str,
        subscription: Subscription,
    ) -> bool {
        self.properties.unwatch(object, property, subscription)
    }

    // ------------------------------------------------------------------
    // Object and pending-call access
    // ------------------------------------------------------------------

    /// Look up a proxy by its registry name.
    pub fn object(&self, name: &str) -> Option<&ProxyObject> {
        self.objects.get(name)
    }

    /// Object names in discovery order.
    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.discovery_order.iter().map(String::as_str)
    }

    /// Last-known mirrored value of `object.property`.
    pub fn property(&self, object: &str, property: &str) -> Option<&PropertyValue> {
        self.objects.get(object)?.property(property)
    }

    /// Re-apply the init-time property snapshot for one object (the
    /// no-argument "full refresh"). Watchers are not fired.
    pub fn refresh_properties(&mut self, object: &str) -> Result<(), ChannelError> {
        self.apply_snapshot(object)
    }

    /// Number of requests still waiting for a response. Grows by one per
    /// unanswered correlated call; this layer never expires them.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Explicitly drop the completion for one outstanding request. A
    /// response arriving later for this id is then silently ignored.
    pub fn cancel_pending(&mut self, id: u64) -> bool {
        self.pending.cancel(id)
    }
}

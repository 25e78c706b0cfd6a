use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ChannelError;

/// Callback invoked with the arguments of one signal emission.
pub type SignalHandler = Box<dyn FnMut(&[Value]) + Send>;

/// Token identifying one subscription. Closures are not comparable, so
/// disconnection goes by token rather than by callback identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(pub(crate) u64);

/// Per (object, signal) fanout of incoming signal emissions.
///
/// Subscribers are kept in connection order and invoked in that order.
/// Dispatch iterates the list as it stands when the emission arrives;
/// handlers hold no reference back to the router, so they cannot mutate it
/// mid-dispatch.
#[derive(Default)]
pub struct SignalRouter {
    next_token: u64,
    routes: HashMap<String, HashMap<String, Vec<(u64, SignalHandler)>>>,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce an object and its declared signal names. Connecting to a
    /// name that was never announced is rejected.
    pub(crate) fn register_object(&mut self, object: &str, signals: &[String]) {
        let per_object = self.routes.entry(object.to_string()).or_default();
        for signal in signals {
            per_object.entry(signal.clone()).or_default();
        }
    }

    /// Append `handler` to the subscriber list for `(object, signal)`.
    pub fn connect(
        &mut self,
        object: &str,
        signal: &str,
        handler: SignalHandler,
    ) -> Result<Subscription, ChannelError> {
        let Some(subscribers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(signal))
        else {
            warn!("connect rejected: no signal '{}' on object '{}'", signal, object);
            return Err(ChannelError::UnknownSignal {
                object: object.to_string(),
                signal: signal.to_string(),
            });
        };
        self.next_token += 1;
        subscribers.push((self.next_token, handler));
        Ok(Subscription(self.next_token))
    }

    /// Remove the subscription, if it is still present. Returns whether an
    /// entry was removed; disconnecting twice is a no-op.
    pub fn disconnect(&mut self, object: &str, signal: &str, subscription: Subscription) -> bool {
        let Some(subscribers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(signal))
        else {
            return false;
        };
        match subscribers.iter().position(|(token, _)| *token == subscription.0) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every current subscriber with `args`, in connection order.
    /// Unknown object or signal names are dropped; a late emission for an
    /// object the channel never knew is a benign race, not a fault.
    pub fn dispatch(&mut self, object: &str, signal: &str, args: &[Value]) {
        let Some(subscribers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(signal))
        else {
            debug!("signal '{}' on unknown route '{}' ignored", signal, object);
            return;
        };
        for (_, handler) in subscribers.iter_mut() {
            handler(args);
        }
    }
}

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::proxy::PropertyValue;
use crate::signals::Subscription;

/// Callback invoked with a property's new mirrored value.
pub type PropertyHandler = Box<dyn FnMut(&PropertyValue) + Send>;

/// Change-notification side of property synchronization. The mirrored
/// values themselves live on the proxy objects; this router only holds the
/// per (object, property) watcher lists and fires them when the channel
/// applies an update.
#[derive(Default)]
pub struct PropertyRouter {
    next_token: u64,
    routes: HashMap<String, HashMap<String, Vec<(u64, PropertyHandler)>>>,
}

impl PropertyRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce an object and its declared property names.
    pub(crate) fn register_object<'a>(
        &mut self,
        object: &str,
        properties: impl Iterator<Item = &'a String>,
    ) {
        let per_object = self.routes.entry(object.to_string()).or_default();
        for property in properties {
            per_object.entry(property.clone()).or_default();
        }
    }

    /// Subscribe to changes of `(object, property)`.
    pub fn watch(
        &mut self,
        object: &str,
        property: &str,
        handler: PropertyHandler,
    ) -> Result<Subscription, ChannelError> {
        let Some(watchers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(property))
        else {
            warn!("watch rejected: no property '{}' on object '{}'", property, object);
            return Err(ChannelError::UnknownProperty {
                object: object.to_string(),
                property: property.to_string(),
            });
        };
        self.next_token += 1;
        watchers.push((self.next_token, handler));
        Ok(Subscription(self.next_token))
    }

    /// Remove one watcher. No-op if it was already removed.
    pub fn unwatch(&mut self, object: &str, property: &str, subscription: Subscription) -> bool {
        let Some(watchers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(property))
        else {
            return false;
        };
        match watchers.iter().position(|(token, _)| *token == subscription.0) {
            Some(index) => {
                watchers.remove(index);
                true
            }
            None => false,
        }
    }

    /// Fire every watcher of `(object, property)` with the new value, in
    /// registration order.
    pub(crate) fn notify(&mut self, object: &str, property: &str, value: &PropertyValue) {
        let Some(watchers) = self
            .routes
            .get_mut(object)
            .and_then(|per_object| per_object.get_mut(property))
        else {
            debug!("update for unwatched route {}::{} ignored", object, property);
            return;
        };
        for (_, handler) in watchers.iter_mut() {
            handler(value);
        }
    }
}

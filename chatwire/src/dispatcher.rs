//! Routing of unsolicited server pushes to one handler per kind.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::hash::Hash;

/// Handler for one notification kind. An `Err` means the payload did not
/// convert to the handler's type.
pub type NotificationHandler = Box<dyn FnMut(Value) -> Result<()>>;

/// Discriminator of a push message.
pub trait NotificationKind: Copy + Eq + Hash {
    /// Map a wire discriminator to a kind.
    fn from_wire(name: &str) -> Option<Self>;

    /// Wire discriminator for this kind.
    fn wire_name(&self) -> &'static str;
}

/// Wrap a typed callback into a handler that deserializes the payload first.
pub fn typed_handler<T, F>(mut handler: F) -> NotificationHandler
where
    T: DeserializeOwned,
    F: FnMut(T) + 'static,
{
    Box::new(move |payload| {
        let parsed = serde_json::from_value(payload)?;
        handler(parsed);
        Ok(())
    })
}

/// One replaceable handler slot per notification kind.
pub struct NotificationDispatcher<K> {
    handlers: HashMap<K, NotificationHandler>,
}

impl<K: NotificationKind> Default for NotificationDispatcher<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: NotificationKind> NotificationDispatcher<K> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Install a handler, returns true if it replaced an existing one.
    pub fn set(&mut self, kind: K, handler: NotificationHandler) -> bool {
        self.handlers.insert(kind, handler).is_some()
    }

    pub fn remove(&mut self, kind: K) -> bool {
        self.handlers.remove(&kind).is_some()
    }

    pub fn contains(&self, kind: K) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Invoke the handler for `kind`.
    ///
    /// `Ok(false)` when nothing is registered; the event is dropped.
    pub fn dispatch(&mut self, kind: K, payload: Value) -> Result<bool> {
        match self.handlers.get_mut(&kind) {
            Some(handler) => {
                handler(payload)?;
                Ok(true)
            }
            None => {
                trace_debug!("no handler for {}", kind.wire_name());
                Ok(false)
            }
        }
    }
}

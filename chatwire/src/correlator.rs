//! Request/response correlation by message id.

use crate::error::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Correlation id carried by a request and echoed by its response.
pub type MessageId = String;

/// One-shot continuation for a pending request.
pub type Continuation = Box<dyn FnOnce(Result<Value>)>;

struct PendingRequest {
    method: String,
    continuation: Continuation,
}

/// Pending requests keyed by message id.
///
/// Ids come from a counter that is never reset, so an id is unique for the
/// lifetime of the correlator even across reconnects.
pub struct RequestCorrelator {
    pending: HashMap<MessageId, PendingRequest>,
    next_id: u64,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
        }
    }

    /// Mint a new id, tagged with `prefix` for readability in logs.
    pub fn next_message_id(&mut self, prefix: &str) -> MessageId {
        let n = self.next_id;
        self.next_id += 1;
        if prefix.is_empty() {
            n.to_string()
        } else {
            format!("{prefix}-{n}")
        }
    }

    /// Register a continuation. Returns false, and drops `continuation`, if the
    /// id is already pending.
    pub fn register(&mut self, id: MessageId, method: &str, continuation: Continuation) -> bool {
        if self.pending.contains_key(&id) {
            return false;
        }
        self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                continuation,
            },
        );
        true
    }

    /// Deliver a response.
    ///
    /// Fires and removes the entry when `id` is pending and `method`, if the
    /// response carries one, names the same family. Anything else is left
    /// alone and reported as unmatched.
    pub fn resolve(&mut self, id: &str, method: Option<&str>, outcome: Result<Value>) -> bool {
        match (self.pending.get(id), method) {
            (None, _) => return false,
            (Some(entry), Some(m)) if entry.method != m => {
                trace_debug!("response {} names {} but {} is pending", id, m, entry.method);
                return false;
            }
            _ => {}
        }

        match self.pending.remove(id) {
            Some(entry) => {
                (entry.continuation)(outcome);
                true
            }
            None => false,
        }
    }

    /// Forget a request without firing it.
    pub fn cancel(&mut self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Fail every pending request with the error produced by `make_error`.
    pub fn fail_all(&mut self, make_error: impl Fn() -> Error) -> usize {
        let drained: Vec<PendingRequest> = self.pending.drain().map(|(_, p)| p).collect();
        let count = drained.len();
        for entry in drained {
            (entry.continuation)(Err(make_error()));
        }
        count
    }

    /// Forget every pending request without firing any of them.
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

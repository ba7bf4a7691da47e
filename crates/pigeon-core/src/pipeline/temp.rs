//! Bounded map of in-flight locally-sent messages.
//!
//! The send pipeline registers a message here while it waits for the server
//! echo; the classifier evicts it once the echo reaches a terminal state
//! (sequenced or duplicate). The bound protects against echoes that never
//! arrive.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::message::Message;

/// Default capacity of the in-flight map.
pub const DEFAULT_TEMP_CAPACITY: usize = 1024;

struct TempInner {
    map: HashMap<String, Message>,
    order: VecDeque<String>,
}

/// Bounded concurrent mapping keyed by client msg id.
pub struct TempMessageMap {
    inner: Mutex<TempInner>,
    capacity: usize,
}

impl Default for TempMessageMap {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TEMP_CAPACITY)
    }
}

impl TempMessageMap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TempInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    /// Register an in-flight message. The oldest entry is dropped when the
    /// map is full.
    pub fn insert(&self, msg: Message) {
        let mut inner = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = msg.client_msg_id.clone();
        if inner.map.insert(key.clone(), msg).is_none() {
            inner.order.push_back(key);
        }
        while inner.map.len() > self.capacity {
            // skip order entries whose key was already evicted
            match inner.order.pop_front() {
                Some(old) => {
                    inner.map.remove(&old);
                }
                None => break,
            }
        }
    }

    /// Evict an entry that reached a terminal status.
    pub fn remove(&self, client_msg_id: &str) -> Option<Message> {
        let mut inner = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let evicted = inner.map.remove(client_msg_id);
        if evicted.is_some() {
            inner.order.retain(|k| k != client_msg_id);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(g) => g.map.len(),
            Err(poisoned) => poisoned.into_inner().map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

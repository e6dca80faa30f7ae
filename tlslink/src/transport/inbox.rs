//! Upward delivery point shared by the transports in this crate.

use crate::transport::{Message, RecvCallback};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Receiving side of a transport link.
///
/// Messages that arrive before a callback is registered are kept in the
/// backlog and flushed, in order, on registration. The registered callback
/// must not re-register from inside a delivery.
#[derive(Default)]
pub(crate) struct Inbox {
    callback: Mutex<Option<RecvCallback>>,
    backlog: Mutex<VecDeque<Option<Message>>>,
    /// Serializes delivery between producers and backlog flushes.
    delivery: Mutex<()>,
}

impl Inbox {
    pub(crate) fn deliver(&self, message: Option<Message>) {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match callback {
            Some(callback) => callback(message),
            None => self
                .backlog
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(message),
        }
    }

    pub(crate) fn register(&self, callback: Option<RecvCallback>) {
        let Some(callback) = callback else {
            *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = None;
            return;
        };

        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback.clone());
        let backlog: Vec<_> = self
            .backlog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for message in backlog {
            callback(message);
        }
    }

    pub(crate) fn has_callback(&self) -> bool {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for Inbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inbox")
            .field("has_callback", &self.has_callback())
            .field(
                "backlog",
                &self
                    .backlog
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len(),
            )
            .finish()
    }
}

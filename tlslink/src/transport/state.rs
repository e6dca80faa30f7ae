//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Connection state machine shared by every link in a chain.

use std::sync::{Arc, Mutex, PoisonError};

/// Connection state of a transport.
///
/// A link starts `Disconnected`, moves to `Connecting` on start, then to
/// `Connected` once the handshake completes. A connected link may close back
/// to `Disconnected`; any non-terminal state may move to `Failed`. Both the
/// closed `Disconnected` state and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportState {
    /// Not started yet, or closed after having been connected
    Disconnected,

    /// Handshake in progress
    Connecting,

    /// Handshake complete; application data may flow
    Connected,

    /// The link failed before (or while) being usable
    Failed,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Observer invoked synchronously, once per state transition.
///
/// The callback must not block and must not call back into the transport
/// that reported the change.
pub type StateCallback = Arc<dyn Fn(TransportState) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    state: TransportState,
    terminal: bool,
    connected_once: bool,
}

/// Enforces the legal transitions of [`TransportState`] and notifies the
/// observer for each one that takes effect.
pub struct StateMachine {
    inner: Mutex<Inner>,
    observer: Option<StateCallback>,
}

impl StateMachine {
    /// Creates a state machine in the initial `Disconnected` state.
    pub fn new(observer: Option<StateCallback>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: TransportState::Disconnected,
                terminal: false,
                connected_once: false,
            }),
            observer,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> TransportState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Returns `true` once a final state has been reached.
    pub fn is_terminal(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .terminal
    }

    /// Returns `true` if `Connected` was reached at any point.
    pub fn was_connected(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected_once
    }

    /// Attempts to move to `next`.
    ///
    /// Returns `true` and notifies the observer if the transition is legal,
    /// `false` (without notification) otherwise.
    pub fn transition(&self, next: TransportState) -> bool {
        {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.terminal || !Self::is_legal(inner.state, next) {
                return false;
            }
            match next {
                TransportState::Connected => inner.connected_once = true,
                TransportState::Disconnected | TransportState::Failed => inner.terminal = true,
                TransportState::Connecting => {}
            }
            inner.state = next;
        }

        if let Some(observer) = &self.observer {
            observer(next);
        }
        true
    }

    fn is_legal(from: TransportState, to: TransportState) -> bool {
        use TransportState::*;
        matches!(
            (from, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connected, Disconnected)
                | (Disconnected | Connecting | Connected, Failed)
        )
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StateMachine")
            .field("state", &inner.state)
            .field("terminal", &inner.terminal)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

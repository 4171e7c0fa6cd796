//! Keypad events.
//!
//! Debouncing happens elsewhere; the runner only consumes finished
//! [`ButtonValue`]s from a [`ButtonSource`].

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Button queue depth. Presses beyond this are dropped.
pub const QUEUE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    F1,
    F2,
    F3,
    F4,
    Select,
}

impl Button {
    /// Function key index 0..=3, `None` for select.
    pub fn function_index(self) -> Option<usize> {
        match self {
            Button::F1 => Some(0),
            Button::F2 => Some(1),
            Button::F3 => Some(2),
            Button::F4 => Some(3),
            Button::Select => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonValue {
    pub button: Button,
    /// Auto-repeat while the key is held.
    pub repeating: bool,
}

impl ButtonValue {
    pub fn pressed(button: Button) -> Self {
        Self {
            button,
            repeating: false,
        }
    }

    pub fn repeat(button: Button) -> Self {
        Self {
            button,
            repeating: true,
        }
    }

    /// A fresh press of `button`, ignoring auto-repeat.
    pub fn is_press_of(&self, button: Button) -> bool {
        self.button == button && !self.repeating
    }
}

pub trait ButtonSource: Send + Sync {
    /// Wait up to `timeout` for the next button.
    fn get_button(&self, timeout: Duration) -> Option<ButtonValue>;
}

/// Bounded queue between the debouncer and the consumer.
pub struct ButtonQueue {
    tx: Sender<ButtonValue>,
    rx: Receiver<ButtonValue>,
}

impl Default for ButtonQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonQueue {
    pub fn new() -> Self {
        let (tx, rx) = bounded(QUEUE_DEPTH);
        Self { tx, rx }
    }

    /// Producer handle for the debouncer side.
    pub fn sender(&self) -> ButtonSender {
        ButtonSender {
            tx: self.tx.clone(),
        }
    }

    /// Discard pending presses.
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl ButtonSource for ButtonQueue {
    fn get_button(&self, timeout: Duration) -> Option<ButtonValue> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Never blocks; a full queue drops the press.
#[derive(Clone)]
pub struct ButtonSender {
    tx: Sender<ButtonValue>,
}

impl ButtonSender {
    /// Returns false if the press was dropped.
    pub fn push(&self, value: ButtonValue) -> bool {
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(v)) => {
                warn!(button = ?v.button, "button queue full; press dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

//! Blocking input channel
//!
//! One waiter slot shared by the conversation (consumer) and the inbound
//! router (producer). Each wait installs a fresh oneshot sender in the slot;
//! the producer takes it to deliver either a line of text or an interrupt.
//! Whoever takes the sender first decides the outcome of that wait, so data
//! and interrupts are mutually exclusive per cycle.

use crate::command::interrupt::Interrupt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

/// What a single wait cycle can yield
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Data(String),
    Interrupt(Interrupt),
}

#[derive(Default)]
struct Slot {
    waiter: Option<oneshot::Sender<InputEvent>>,
    closed: bool,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create a connected producer/consumer pair
pub fn input_channel() -> (InputHandle, InputReceiver) {
    let slot = Arc::new(Mutex::new(Slot::default()));
    (
        InputHandle { slot: slot.clone() },
        InputReceiver { slot },
    )
}

/// Producer side, held by whoever receives the remote user's replies
#[derive(Clone)]
pub struct InputHandle {
    slot: Arc<Mutex<Slot>>,
}

impl InputHandle {
    /// Whether a wait is currently outstanding
    pub fn is_pending(&self) -> bool {
        lock(&self.slot)
            .waiter
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }

    /// Hand a line to the pending wait. Gives the text back when nobody is
    /// waiting.
    pub fn deliver(&self, text: String) -> Result<(), String> {
        match self.take() {
            Some(tx) => tx.send(InputEvent::Data(text)).map_err(|event| match event {
                InputEvent::Data(text) => text,
                InputEvent::Interrupt(_) => String::new(),
            }),
            None => Err(text),
        }
    }

    /// Raise an interrupt in the pending wait. Returns false when nobody is
    /// waiting.
    pub fn signal(&self, interrupt: Interrupt) -> bool {
        match self.take() {
            Some(tx) => tx.send(InputEvent::Interrupt(interrupt)).is_ok(),
            None => false,
        }
    }

    /// Cancel the pending wait and make every later wait fail with
    /// [`Interrupt::Cancel`]
    pub fn close(&self) {
        let mut slot = lock(&self.slot);
        slot.closed = true;
        if let Some(tx) = slot.waiter.take() {
            let _ = tx.send(InputEvent::Interrupt(Interrupt::Cancel));
        }
    }

    fn take(&self) -> Option<oneshot::Sender<InputEvent>> {
        let mut slot = lock(&self.slot);
        // A sender whose wait was abandoned is as good as no wait at all
        match slot.waiter.take() {
            Some(tx) if !tx.is_closed() => Some(tx),
            _ => None,
        }
    }
}

/// Consumer side, owned by the conversation
pub struct InputReceiver {
    slot: Arc<Mutex<Slot>>,
}

impl InputReceiver {
    /// Wait for the next line
    ///
    /// Fails with [`Interrupt::Timeout`] when nothing arrives within
    /// `timeout` (`None` waits forever), or with whatever interrupt the
    /// producer signalled. A dropped producer reads as [`Interrupt::Cancel`].
    pub async fn request(&mut self, timeout: Option<Duration>) -> Result<String, Interrupt> {
        let (tx, mut rx) = oneshot::channel();
        {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return Err(Interrupt::Cancel);
            }
            // Fresh slot for every wait; a stale sender is simply replaced
            slot.waiter = Some(tx);
        }

        let outcome = match timeout {
            None => (&mut rx).await,
            Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    if lock(&self.slot).waiter.take().is_some() {
                        tracing::debug!(?limit, "input wait timed out");
                        return Err(Interrupt::Timeout);
                    }
                    // The producer took the sender just before the deadline
                    rx.await
                }
            },
        };

        match outcome {
            Ok(InputEvent::Data(text)) => Ok(text),
            Ok(InputEvent::Interrupt(interrupt)) => Err(interrupt),
            Err(_) => Err(Interrupt::Cancel),
        }
    }
}

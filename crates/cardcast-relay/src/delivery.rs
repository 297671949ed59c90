//! Outbound delivery contract.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use cardcast_core::MessageHandle;
use serde::Serialize;

use crate::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Rows of buttons, serialised as a Bot API `reply_markup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.inline_keyboard.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.iter().all(Vec::is_empty)
    }
}

/// Sends and edits chat messages on the engine's behalf.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a new message and return the id the platform assigned to it.
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageHandle, RelayError>;

    /// Replace the text of an existing message, dropping any keyboard.
    async fn edit(&self, chat_id: i64, handle: MessageHandle, text: &str)
    -> Result<(), RelayError>;

    async fn answer_callback(&self, query_id: &str, text: &str) -> Result<(), RelayError>;
}

/// One call made against a [`RecordingDelivery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Sent {
        chat_id: i64,
        handle: MessageHandle,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edited {
        chat_id: i64,
        handle: MessageHandle,
        text: String,
    },
    Answered {
        query_id: String,
        text: String,
    },
}

/// Delivery that records calls instead of talking to a chat platform.
///
/// Used for dry-run replays and tests. Handles are assigned sequentially
/// from 1. [`fail_all`](Self::fail_all) makes every later call fail.
#[derive(Debug)]
pub struct RecordingDelivery {
    log: Mutex<Vec<Delivered>>,
    next_handle: AtomicI64,
    failing: AtomicBool,
}

impl Default for RecordingDelivery {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            next_handle: AtomicI64::new(1),
            failing: AtomicBool::new(false),
        }
    }
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Delivered> {
        self.lock().clone()
    }

    pub fn take(&self) -> Vec<Delivered> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Delivered>> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RelayError::Delivery("recording delivery set to fail".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<MessageHandle, RelayError> {
        self.check()?;
        let handle = MessageHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        self.lock().push(Delivered::Sent {
            chat_id,
            handle,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(handle)
    }

    async fn edit(
        &self,
        chat_id: i64,
        handle: MessageHandle,
        text: &str,
    ) -> Result<(), RelayError> {
        self.check()?;
        self.lock().push(Delivered::Edited {
            chat_id,
            handle,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn answer_callback(&self, query_id: &str, text: &str) -> Result<(), RelayError> {
        self.check()?;
        self.lock().push(Delivered::Answered {
            query_id: query_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handles_are_sequential() {
        let delivery = RecordingDelivery::new();
        assert_eq!(delivery.send(1, "a", None).await.unwrap(), MessageHandle(1));
        assert_eq!(delivery.send(1, "b", None).await.unwrap(), MessageHandle(2));
        assert_eq!(delivery.take().len(), 2);
        assert!(delivery.calls().is_empty());
    }

    #[tokio::test]
    async fn failing_delivery_records_nothing() {
        let delivery = RecordingDelivery::new();
        delivery.fail_all(true);
        assert!(delivery.send(1, "a", None).await.is_err());
        assert!(delivery.edit(1, MessageHandle(1), "a").await.is_err());
        assert!(delivery.calls().is_empty());
    }

    #[test]
    fn keyboard_serialises_as_reply_markup() {
        let keyboard =
            InlineKeyboard::default().row(vec![InlineButton::new("Apply", "inter_apply")]);
        let json = serde_json::to_value(&keyboard).unwrap();
        assert_eq!(
            json["inline_keyboard"][0][0]["callback_data"],
            "inter_apply"
        );
        assert!(InlineKeyboard::default().is_empty());
    }
}

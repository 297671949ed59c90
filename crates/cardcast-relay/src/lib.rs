//! Relay layer: Telegram update intake, operator commands, and delivery of
//! the engine's outbound actions.

pub mod delivery;
pub mod dispatch;
mod error;
pub mod update;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use delivery::{Delivered, Delivery, InlineButton, InlineKeyboard, RecordingDelivery};
pub use dispatch::{DeliveryReport, Dispatcher, Outcome};
pub use error::RelayError;
pub use update::{CallbackAction, Command, Event, Update};

#[cfg(feature = "telegram")]
pub use telegram::TelegramClient;

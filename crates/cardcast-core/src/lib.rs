//! Core prediction logic: message tokens, N-2 trigger correlation, rule engine,
//! prediction book and the persistence contract.

pub mod action;
pub mod card;
pub mod config;
pub mod correlate;
pub mod engine;
mod error;
pub mod extract;
pub mod learned;
pub mod persist;
pub mod predictor;
pub mod ratelimit;
pub mod rules;
pub mod state;
pub mod verify;

pub use action::{
    ActionKind, ChannelBindingAction, ChannelRole, InboundMessage, MessageHandle, OutboundAction,
    RuleControl, StatusReport,
};
pub use card::{CardPair, CardToken, Rank, Suit};
pub use config::EngineConfig;
pub use engine::{DisabledEngine, Engine, select_engine};
pub use error::CoreError;
pub use extract::ParsedMessage;
pub use persist::{FlushReport, StateStore};
pub use predictor::Predictor;
pub use ratelimit::RateLimiter;
pub use state::{Aggregate, BotState, ChannelBinding, Dirty};

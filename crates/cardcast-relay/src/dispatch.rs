//! Per-update dispatch: classify, route to the engine or an operator
//! command, deliver the resulting messages, and store message handles back.
//!
//! Nothing that goes wrong inside one update escapes it: malformed payloads
//! and delivery failures are logged and the update is abandoned.

use cardcast_core::{
    ActionKind, ChannelBindingAction, ChannelRole, Engine, MessageHandle, OutboundAction,
    RateLimiter, RuleControl, StatusReport,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::RelayError;
use crate::delivery::{Delivery, InlineButton, InlineKeyboard};
use crate::update::{CallbackAction, Command, Event, Update};

const SWEEP_THRESHOLD: usize = 1024;

pub const WELCOME_MESSAGE: &str = "👋 Card prediction bot.\n\n\
Add me to the channel that publishes game results and to the channel where \
predictions should appear, then pick each channel's role from the prompt.\n\n\
/stat shows the configured channels, /bilan the prediction tally, \
/inter the learned trigger history.";

/// Counts of delivery calls made for one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub edited: usize,
    pub failed: usize,
}

impl DeliveryReport {
    fn record<T>(&mut self, result: &Result<T, RelayError>, edited: bool) {
        match (result, edited) {
            (Err(_), _) => self.failed += 1,
            (Ok(_), true) => self.edited += 1,
            (Ok(_), false) => self.sent += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled(DeliveryReport),
    RateLimited { user_id: i64 },
    Ignored(&'static str),
    Rejected(String),
}

pub struct Dispatcher<D: Delivery> {
    engine: Box<dyn Engine>,
    delivery: D,
    limiter: RateLimiter,
    bot_id: Option<i64>,
}

impl<D: Delivery> Dispatcher<D> {
    pub fn new(engine: Box<dyn Engine>, delivery: D) -> Self {
        Self {
            engine,
            delivery,
            limiter: RateLimiter::default(),
            bot_id: None,
        }
    }

    pub fn with_bot_id(mut self, bot_id: Option<i64>) -> Self {
        self.bot_id = bot_id;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    pub fn delivery(&self) -> &D {
        &self.delivery
    }

    /// Parse and handle one JSON-encoded update.
    pub async fn handle_raw(&mut self, raw: &str, now: DateTime<Utc>) -> Outcome {
        match serde_json::from_str::<Update>(raw) {
            Ok(update) => self.handle_update(&update, now).await,
            Err(e) => {
                let e = RelayError::MalformedUpdate(e.to_string());
                warn!(error = %e, "update rejected");
                Outcome::Rejected(e.to_string())
            }
        }
    }

    pub async fn handle_update(&mut self, update: &Update, now: DateTime<Utc>) -> Outcome {
        let event = match update.classify(self.bot_id) {
            Ok(event) => event,
            Err(e) => {
                warn!(update_id = update.update_id, error = %e, "update rejected");
                return Outcome::Rejected(e.to_string());
            }
        };

        match event {
            Event::Post(msg) => {
                let actions = self.engine.handle_message(&msg, now);
                Outcome::Handled(self.execute(actions).await)
            }
            Event::Command {
                command,
                chat_id,
                user_id,
            } => {
                if self.limiter.tracked_users() > SWEEP_THRESHOLD {
                    self.limiter.sweep(now);
                }
                if !self.limiter.check(user_id, now) {
                    warn!(user_id, ?command, "command rate limited");
                    return Outcome::RateLimited { user_id };
                }
                Outcome::Handled(self.run_command(command, chat_id).await)
            }
            Event::Callback {
                query_id,
                chat_id,
                chat_label,
                message_id,
                action,
                ..
            } => Outcome::Handled(
                self.run_callback(action, &query_id, chat_id, &chat_label, message_id)
                    .await,
            ),
            Event::Joined {
                chat_id,
                chat_label,
            } => {
                info!(chat_id, chat = %chat_label, "added to chat, prompting for role");
                let mut report = DeliveryReport::default();
                let text = format!(
                    "🚨 Channel setup\n\nI was added to {chat_label} (ID: {chat_id}).\n\
                     Choose this chat's role:"
                );
                let result = self
                    .delivery
                    .send(chat_id, &text, Some(&config_keyboard()))
                    .await;
                log_failure(&result, chat_id);
                report.record(&result, false);
                Outcome::Handled(report)
            }
            Event::Ignored(reason) => {
                debug!(update_id = update.update_id, reason, "update ignored");
                Outcome::Ignored(reason)
            }
        }
    }

    /// Deliver engine actions. Handles of sent predictions are attached back
    /// to their records; a failed send leaves the record without one.
    pub async fn execute(&mut self, actions: Vec<OutboundAction>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for action in actions {
            match (action.kind, action.reference_message_id) {
                (ActionKind::EditMessage, Some(handle)) => {
                    let result = self
                        .delivery
                        .edit(action.target_chat_id, handle, &action.text)
                        .await;
                    log_failure(&result, action.target_chat_id);
                    report.record(&result, true);
                }
                (ActionKind::EditMessage, None) | (ActionKind::NewMessage, _) => {
                    let result = self
                        .delivery
                        .send(action.target_chat_id, &action.text, None)
                        .await;
                    log_failure(&result, action.target_chat_id);
                    report.record(&result, false);
                    if action.kind == ActionKind::NewMessage
                        && let (Ok(handle), Some(target)) = (&result, action.target_game)
                    {
                        self.engine.attach_handle(target, *handle);
                    }
                }
            }
        }
        report
    }

    async fn run_command(&mut self, command: Command, chat_id: i64) -> DeliveryReport {
        debug!(?command, chat_id, "running command");
        let (text, keyboard) = match command {
            Command::Start => (WELCOME_MESSAGE.to_string(), None),
            Command::Stat => (self.stat_text(), None),
            Command::Bilan => (self.bilan_text(), None),
            Command::Inter => {
                let report = self.engine.status();
                let keyboard = status_keyboard(&report);
                (report.text, keyboard)
            }
        };
        let mut report = DeliveryReport::default();
        let result = self.delivery.send(chat_id, &text, keyboard.as_ref()).await;
        log_failure(&result, chat_id);
        report.record(&result, false);
        report
    }

    fn stat_text(&self) -> String {
        let channels = self.engine.channels();
        let show = |id: Option<i64>| id.map_or("❌ not configured".to_string(), |id| id.to_string());
        let learned = self.engine.status().learned_active;
        format!(
            "📈 STATUS\nSource channel (read): {}\nPrediction channel (write): {}\nLearned mode: {}",
            show(channels.source_channel_id),
            show(channels.output_channel_id),
            if learned { "✅ ON" } else { "❌ OFF" }
        )
    }

    fn bilan_text(&self) -> String {
        let tally = self.engine.tally();
        format!(
            "📋 TALLY\nPredictions stored: {}\nConfirmed: {}\nFailed: {}\nPending: {}",
            tally.pending + tally.confirmed + tally.failed,
            tally.confirmed,
            tally.failed,
            tally.pending
        )
    }

    async fn run_callback(
        &mut self,
        action: CallbackAction,
        query_id: &str,
        chat_id: i64,
        chat_label: &str,
        message_id: i64,
    ) -> DeliveryReport {
        let (text, toast) = match action {
            CallbackAction::ConfigSource | CallbackAction::ConfigPrediction => {
                let role = if action == CallbackAction::ConfigSource {
                    ChannelRole::Source
                } else {
                    ChannelRole::Output
                };
                if self.engine.bind_channel(ChannelBindingAction { role, chat_id }) {
                    info!(chat_id, %role, "channel role assigned");
                }
                let text = match role {
                    ChannelRole::Source => format!(
                        "🟢 {chat_label} (ID: {chat_id}) is now the source channel; games are read from here."
                    ),
                    ChannelRole::Output => format!(
                        "🔵 {chat_label} (ID: {chat_id}) is now the prediction channel; predictions are posted here."
                    ),
                };
                (text, "Configuration saved.")
            }
            CallbackAction::ConfigCancel => (
                format!("❌ Setup cancelled. {chat_label} was not configured."),
                "Setup cancelled.",
            ),
            CallbackAction::InterApply => {
                let report = self.engine.apply_control(RuleControl::ApplyLearnedRules);
                (
                    format!(
                        "✅ Learned rules applied; predictions now use the top triggers from history.\n\n---\n{}",
                        report.text
                    ),
                    "Rules applied.",
                )
            }
            CallbackAction::InterDefault => {
                self.engine.apply_control(RuleControl::RevertToStaticOnly);
                (
                    "❌ Static rules only; learned triggers are ignored.".to_string(),
                    "Static mode enabled.",
                )
            }
        };

        let mut report = DeliveryReport::default();
        let handle = MessageHandle(message_id);
        let edited = self.delivery.edit(chat_id, handle, &text).await;
        log_failure(&edited, chat_id);
        report.record(&edited, true);

        if let Err(e) = self.delivery.answer_callback(query_id, toast).await {
            warn!(query_id, error = %e, "callback answer failed");
        }
        report
    }
}

fn log_failure<T>(result: &Result<T, RelayError>, chat_id: i64) {
    if let Err(e) = result {
        warn!(chat_id, error = %e, "delivery failed");
    }
}

fn config_keyboard() -> InlineKeyboard {
    InlineKeyboard::default()
        .row(vec![
            InlineButton::new("✅ Source channel (read)", CallbackAction::ConfigSource.as_str()),
            InlineButton::new(
                "✅ Prediction channel (write)",
                CallbackAction::ConfigPrediction.as_str(),
            ),
        ])
        .row(vec![InlineButton::new(
            "❌ Cancel",
            CallbackAction::ConfigCancel.as_str(),
        )])
}

fn status_keyboard(report: &StatusReport) -> Option<InlineKeyboard> {
    let buttons: Vec<_> = report
        .actions
        .iter()
        .map(|control| match control {
            RuleControl::ApplyLearnedRules => {
                InlineButton::new("✅ Apply learned rules", CallbackAction::InterApply.as_str())
            }
            RuleControl::RevertToStaticOnly => {
                InlineButton::new("❌ Static rules only", CallbackAction::InterDefault.as_str())
            }
        })
        .collect();
    (!buttons.is_empty()).then(|| InlineKeyboard::default().row(buttons))
}

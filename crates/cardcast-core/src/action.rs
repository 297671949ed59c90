//! Values exchanged with the messaging collaborator: inbound messages,
//! outbound actions, operator actions and the status report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::card::Rank;
use crate::correlate::TriggerSample;
use crate::learned::SmartRule;
use crate::verify::{PredictionStatus, Verdict};

/// Platform-assigned id of a message the bot sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub edited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    NewMessage,
    EditMessage,
}

/// Something for the delivery collaborator to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundAction {
    pub kind: ActionKind,
    pub target_chat_id: i64,
    pub text: String,
    pub reference_message_id: Option<MessageHandle>,
    /// Prediction this message belongs to; the returned handle is stored on it.
    pub target_game: Option<u32>,
}

impl OutboundAction {
    pub fn new_message(chat_id: i64, text: String, target_game: Option<u32>) -> Self {
        Self {
            kind: ActionKind::NewMessage,
            target_chat_id: chat_id,
            text,
            reference_message_id: None,
            target_game,
        }
    }

    pub fn edit_message(
        chat_id: i64,
        handle: MessageHandle,
        text: String,
        target_game: Option<u32>,
    ) -> Self {
        Self {
            kind: ActionKind::EditMessage,
            target_chat_id: chat_id,
            text,
            reference_message_id: Some(handle),
            target_game,
        }
    }
}

/// Text of a freshly sent prediction.
pub fn prediction_text(target_game: u32, rank: Rank) -> String {
    format!("🔵{target_game}🔵 {rank} statut : ⏳")
}

/// Text of a resolved prediction.
pub fn verdict_text(verdict: &Verdict) -> String {
    let mark = match verdict.status {
        PredictionStatus::Pending => "⏳",
        PredictionStatus::Confirmed => "✅",
        PredictionStatus::Failed => "❌",
    };
    format!(
        "🔵{}🔵 {} statut : {mark}",
        verdict.target_game, verdict.predicted_rank
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRole {
    /// Channel the game messages are read from.
    Source,
    /// Channel predictions are written to.
    Output,
}

impl ChannelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Output => "output",
        }
    }
}

impl FromStr for ChannelRole {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "output" | "prediction" => Ok(Self::Output),
            other => Err(CoreError::Other(format!("unknown channel role: {other}"))),
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBindingAction {
    pub role: ChannelRole,
    pub chat_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleControl {
    ApplyLearnedRules,
    RevertToStaticOnly,
}

impl RuleControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplyLearnedRules => "apply_learned_rules",
            Self::RevertToStaticOnly => "revert_to_static_only",
        }
    }
}

/// Learned-mode summary for display plus the controls currently offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub text: String,
    pub sample_count: usize,
    pub learned_active: bool,
    pub rules: Vec<SmartRule>,
    pub recent_samples: Vec<TriggerSample>,
    pub actions: Vec<RuleControl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_text_carries_blue_marker() {
        let text = prediction_text(52, Rank::King);
        assert_eq!(crate::extract::game_number(&text), Some(52));
        assert!(text.contains('K'));
    }

    #[test]
    fn verdict_text_marks_outcome() {
        let verdict = Verdict {
            target_game: 52,
            predicted_rank: Rank::King,
            status: PredictionStatus::Failed,
            handle: None,
        };
        assert!(verdict_text(&verdict).ends_with('❌'));
    }

    #[test]
    fn channel_role_parses_aliases() {
        assert_eq!("prediction".parse::<ChannelRole>().unwrap(), ChannelRole::Output);
        assert_eq!("SOURCE".parse::<ChannelRole>().unwrap(), ChannelRole::Source);
        assert!("sink".parse::<ChannelRole>().is_err());
    }

    #[test]
    fn outbound_action_json_shape() {
        let action = OutboundAction::edit_message(-100, MessageHandle(9), "x".into(), Some(52));
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "edit_message");
        assert_eq!(json["reference_message_id"], 9);
    }
}

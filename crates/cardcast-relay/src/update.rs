//! Telegram update payloads and their classification into relay events.
//!
//! Only the fields the relay reads are modelled; everything else in the
//! Bot API payload is ignored by serde.

use cardcast_core::InboundMessage;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::RelayError;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub edited_message: Option<Message>,
    #[serde(default)]
    pub channel_post: Option<Message>,
    #[serde(default)]
    pub edited_channel_post: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
    #[serde(default)]
    pub my_chat_member: Option<ChatMemberUpdated>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    /// Unix time the message was sent.
    #[serde(default)]
    pub date: Option<i64>,
    /// Unix time of the last edit.
    #[serde(default)]
    pub edit_date: Option<i64>,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

impl Message {
    fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    /// Title for display, falling back to the id.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| format!("Chat ID: {}", self.id))
    }

    fn is_shared(&self) -> bool {
        matches!(self.kind.as_str(), "channel" | "group" | "supergroup")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMemberUpdated {
    pub chat: Chat,
    pub new_chat_member: ChatMember,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    pub status: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stat,
    Bilan,
    Inter,
}

impl Command {
    /// Parse a leading `/command`, ignoring any `@botname` suffix and arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name {
            "start" => Some(Self::Start),
            "stat" => Some(Self::Stat),
            "bilan" => Some(Self::Bilan),
            n if n.starts_with("inter") => Some(Self::Inter),
            _ => None,
        }
    }
}

/// Inline-keyboard callback payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    ConfigSource,
    ConfigPrediction,
    ConfigCancel,
    InterApply,
    InterDefault,
}

impl CallbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigSource => "config_source",
            Self::ConfigPrediction => "config_prediction",
            Self::ConfigCancel => "config_cancel",
            Self::InterApply => "inter_apply",
            Self::InterDefault => "inter_default",
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "config_source" => Some(Self::ConfigSource),
            "config_prediction" => Some(Self::ConfigPrediction),
            "config_cancel" => Some(Self::ConfigCancel),
            "inter_apply" => Some(Self::InterApply),
            "inter_default" => Some(Self::InterDefault),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A text post for the engine.
    Post(InboundMessage),
    Command {
        command: Command,
        chat_id: i64,
        user_id: i64,
    },
    Callback {
        query_id: String,
        user_id: i64,
        chat_id: i64,
        chat_label: String,
        message_id: i64,
        action: CallbackAction,
    },
    /// The bot was added to (or promoted in) a group or channel.
    Joined { chat_id: i64, chat_label: String },
    Ignored(&'static str),
}

impl Update {
    /// When the carried message was sent or last edited, if the payload says.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let msg = self
            .message
            .as_ref()
            .or(self.channel_post.as_ref())
            .or(self.edited_message.as_ref())
            .or(self.edited_channel_post.as_ref())?;
        DateTime::from_timestamp(msg.edit_date.or(msg.date)?, 0)
    }

    /// Classify this update. `bot_id` identifies the bot's own membership
    /// changes; without it any bot member counts.
    pub fn classify(&self, bot_id: Option<i64>) -> Result<Event, RelayError> {
        if let Some(query) = &self.callback_query {
            return classify_callback(query);
        }
        if let Some(member) = &self.my_chat_member {
            return Ok(classify_membership(member, bot_id));
        }
        if let Some(msg) = self.message.as_ref().or(self.channel_post.as_ref()) {
            return Ok(classify_message(msg, false));
        }
        if let Some(msg) = self
            .edited_message
            .as_ref()
            .or(self.edited_channel_post.as_ref())
        {
            return Ok(classify_message(msg, true));
        }
        Ok(Event::Ignored("unsupported update kind"))
    }
}

fn classify_callback(query: &CallbackQuery) -> Result<Event, RelayError> {
    let data = query
        .data
        .as_deref()
        .ok_or_else(|| RelayError::MalformedUpdate("callback query without data".into()))?;
    let action = CallbackAction::parse(data)
        .ok_or_else(|| RelayError::MalformedUpdate(format!("unknown callback data {data:?}")))?;
    let message = query.message.as_ref().ok_or_else(|| {
        RelayError::MalformedUpdate("callback query without originating message".into())
    })?;
    Ok(Event::Callback {
        query_id: query.id.clone(),
        user_id: query.from.id,
        chat_id: message.chat.id,
        chat_label: message.chat.label(),
        message_id: message.message_id,
        action,
    })
}

fn classify_membership(member: &ChatMemberUpdated, bot_id: Option<i64>) -> Event {
    let joined = matches!(
        member.new_chat_member.status.as_str(),
        "member" | "administrator"
    );
    let is_self = match bot_id {
        Some(id) => member.new_chat_member.user.id == id,
        None => member.new_chat_member.user.is_bot,
    };
    if joined && is_self && member.chat.is_shared() {
        Event::Joined {
            chat_id: member.chat.id,
            chat_label: member.chat.label(),
        }
    } else {
        Event::Ignored("membership change not relevant")
    }
}

fn classify_message(msg: &Message, edited: bool) -> Event {
    let Some(body) = msg.body() else {
        return Event::Ignored("message without text");
    };
    if !edited && let Some(command) = Command::parse(body) {
        return Event::Command {
            command,
            chat_id: msg.chat.id,
            user_id: msg.from.as_ref().map_or(msg.chat.id, |u| u.id),
        };
    }
    if body.trim_start().starts_with('/') {
        return Event::Ignored("unknown command");
    }
    Event::Post(InboundMessage {
        chat_id: msg.chat.id,
        message_id: msg.message_id,
        text: body.to_string(),
        edited,
    })
}

/// The numeric bot id is the token prefix before `:`.
pub fn bot_id_from_token(token: &str) -> Option<i64> {
    token.split_once(':')?.0.parse().ok()
}

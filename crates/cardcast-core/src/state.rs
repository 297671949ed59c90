//! The bot's complete mutable state as one typed aggregate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::{ChannelBindingAction, ChannelRole};
use crate::correlate::{Frontier, GameWindow, TriggerSample};
use crate::learned::LearnedRules;
use crate::rules::Cooldown;
use crate::verify::PredictionBook;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub source_channel_id: Option<i64>,
    pub output_channel_id: Option<i64>,
}

impl ChannelBinding {
    /// Apply an operator binding. Returns `true` if the binding changed.
    pub fn apply(&mut self, action: ChannelBindingAction) -> bool {
        let slot = match action.role {
            ChannelRole::Source => &mut self.source_channel_id,
            ChannelRole::Output => &mut self.output_channel_id,
        };
        let changed = *slot != Some(action.chat_id);
        *slot = Some(action.chat_id);
        changed
    }

    pub fn is_source(&self, chat_id: i64) -> bool {
        self.source_channel_id == Some(chat_id)
    }
}

/// Named unit of persistence. Each aggregate is stored and loaded on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Aggregate {
    Samples,
    Rules,
    Predictions,
    GameWindow,
    Channels,
    Cooldown,
    LearnedMode,
    Frontier,
}

impl Aggregate {
    pub const ALL: [Aggregate; 8] = [
        Self::Samples,
        Self::Rules,
        Self::Predictions,
        Self::GameWindow,
        Self::Channels,
        Self::Cooldown,
        Self::LearnedMode,
        Self::Frontier,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Samples => "samples",
            Self::Rules => "rules",
            Self::Predictions => "predictions",
            Self::GameWindow => "game_window",
            Self::Channels => "channels",
            Self::Cooldown => "cooldown",
            Self::LearnedMode => "learned_mode",
            Self::Frontier => "frontier",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Aggregates touched by an operation and awaiting a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dirty(BTreeSet<Aggregate>);

impl Dirty {
    pub fn all() -> Self {
        Self(Aggregate::ALL.into_iter().collect())
    }

    pub fn mark(&mut self, aggregate: Aggregate) {
        self.0.insert(aggregate);
    }

    pub fn contains(&self, aggregate: Aggregate) -> bool {
        self.0.contains(&aggregate)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Aggregate> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Aggregate> for Dirty {
    fn from_iter<I: IntoIterator<Item = Aggregate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotState {
    pub samples: Vec<TriggerSample>,
    pub learned: LearnedRules,
    pub predictions: PredictionBook,
    pub window: GameWindow,
    pub channels: ChannelBinding,
    pub cooldown: Cooldown,
    pub frontier: Option<Frontier>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_reports_change() {
        let mut channels = ChannelBinding::default();
        let bind = ChannelBindingAction {
            role: ChannelRole::Output,
            chat_id: -100,
        };
        assert!(channels.apply(bind));
        assert!(!channels.apply(bind));
        assert_eq!(channels.output_channel_id, Some(-100));
        assert_eq!(channels.source_channel_id, None);
    }

    #[test]
    fn aggregate_names_unique() {
        let names: BTreeSet<&str> = Aggregate::ALL.iter().map(|a| a.name()).collect();
        assert_eq!(names.len(), Aggregate::ALL.len());
    }

    #[test]
    fn dirty_all_covers_every_aggregate() {
        let dirty = Dirty::all();
        assert!(Aggregate::ALL.iter().all(|a| dirty.contains(*a)));
    }
}

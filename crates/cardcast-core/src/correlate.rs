//! N-2 trigger correlation.
//!
//! Every game's lead pair is kept in a sliding window. When the target rank
//! shows up in the first group of game N, the pair seen at game N-2 is
//! recorded as the trigger for that outcome. Samples are unique per outcome
//! game, so redelivered or edited messages never produce a second sample.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::card::{CardPair, CardToken};
use crate::config::EngineConfig;
use crate::extract::ParsedMessage;

/// Lead pair observed for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_number: u32,
    pub lead_cards: CardPair,
    pub observed_at: DateTime<Utc>,
}

/// One observed (trigger -> outcome) correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSample {
    pub outcome_game: u32,
    pub trigger_game: u32,
    pub trigger_cards: CardPair,
    pub outcome_card: CardToken,
    pub recorded_at: DateTime<Utc>,
}

/// Recent games keyed by game number.
pub type GameWindow = BTreeMap<u32, GameRecord>;

/// What a single call to [`observe`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub recorded: bool,
    pub sample: Option<TriggerSample>,
    pub evicted: usize,
}

/// Feed one message bearing `game` through the correlator.
pub fn observe(
    window: &mut GameWindow,
    samples: &mut Vec<TriggerSample>,
    game: u32,
    msg: &ParsedMessage,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Observation {
    let mut obs = Observation::default();

    if let Some(pair) = msg.lead_pair()
        && !window.contains_key(&game)
    {
        window.insert(
            game,
            GameRecord {
                game_number: game,
                lead_cards: pair,
                observed_at: now,
            },
        );
        obs.recorded = true;
        debug!(game, pair = %pair, "recorded lead pair");
    }

    if let Some(outcome_card) = msg.first_group_rank(config.target_rank)
        && let Some(trigger_game) = game.checked_sub(config.offset)
    {
        match window.get(&trigger_game) {
            None => debug!(game, trigger_game, "outcome without trigger in window"),
            Some(_) if samples.iter().any(|s| s.outcome_game == game) => {
                debug!(game, "outcome already sampled")
            }
            Some(trigger) => {
                let sample = TriggerSample {
                    outcome_game: game,
                    trigger_game,
                    trigger_cards: trigger.lead_cards,
                    outcome_card,
                    recorded_at: now,
                };
                info!(
                    outcome_game = game,
                    trigger_game,
                    trigger = %sample.trigger_cards,
                    outcome = %outcome_card,
                    "trigger sample recorded"
                );
                samples.push(sample.clone());
                obs.sample = Some(sample);
            }
        }
    }

    obs.evicted = evict(window, game, config.window);
    obs
}

/// Drop games more than `span` behind the game currently being handled.
///
/// Returns the number of evicted records.
pub fn evict(window: &mut GameWindow, current: u32, span: u32) -> usize {
    let limit = current.saturating_sub(span);
    let kept = window.split_off(&limit);
    let evicted = window.len();
    *window = kept;
    evicted
}

/// Newest game number seen, with the message time it carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontier {
    pub game: u32,
    pub seen_at: DateTime<Utc>,
}

/// Where a message's game falls relative to the [`Frontier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Current,
    /// A fresh message far behind the frontier: the numbering restarted.
    Reset { previous: u32 },
    /// A redelivered or edited message for a game already out of the window.
    Stale { newest: u32 },
}

/// Place `game` against the frontier and move the frontier forward.
///
/// A game more than `span` behind the newest one is a numbering reset only
/// when it arrives unedited and carries a later time than the frontier;
/// otherwise it is stale and the frontier is left alone.
pub fn advance(
    frontier: &mut Option<Frontier>,
    game: u32,
    edited: bool,
    now: DateTime<Utc>,
    span: u32,
) -> Position {
    let position = match *frontier {
        None => Position::Current,
        Some(f) if game >= f.game.saturating_sub(span) => Position::Current,
        Some(f) if !edited && now > f.seen_at => Position::Reset { previous: f.game },
        Some(f) => return Position::Stale { newest: f.game },
    };
    if let Position::Reset { previous } = position {
        warn!(previous, game, "game numbering restarted");
    }
    if matches!(position, Position::Reset { .. }) || frontier.is_none_or(|f| game > f.game) {
        *frontier = Some(Frontier { game, seen_at: now });
    }
    position
}

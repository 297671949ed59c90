//! Outstanding predictions and their verification.
//!
//! A prediction is keyed by the game it forecasts. When a message for that
//! game arrives in its final form, the record is resolved exactly once; later
//! edits or redeliveries of the same message find it already resolved.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::MessageHandle;
use crate::card::Rank;
use crate::extract::ParsedMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub target_game: u32,
    /// Game whose message fired the prediction.
    pub source_game: u32,
    pub predicted_rank: Rank,
    pub message_handle: Option<MessageHandle>,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of resolving a pending prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub target_game: u32,
    pub predicted_rank: Rank,
    pub status: PredictionStatus,
    /// Handle of the original prediction message, if its send succeeded.
    pub handle: Option<MessageHandle>,
}

/// Counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub pending: usize,
    pub confirmed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionBook {
    records: BTreeMap<u32, PredictionRecord>,
}

impl PredictionBook {
    /// Store a new pending prediction for `target_game`.
    ///
    /// An existing record for the same game is left untouched and returned.
    pub fn record(
        &mut self,
        target_game: u32,
        source_game: u32,
        rank: Rank,
        now: DateTime<Utc>,
    ) -> PredictionRecord {
        self.records
            .entry(target_game)
            .or_insert_with(|| PredictionRecord {
                target_game,
                source_game,
                predicted_rank: rank,
                message_handle: None,
                status: PredictionStatus::Pending,
                created_at: now,
            })
            .clone()
    }

    /// Store the delivery-assigned message id. Returns `false` if no record exists.
    pub fn attach_handle(&mut self, target_game: u32, handle: MessageHandle) -> bool {
        match self.records.get_mut(&target_game) {
            Some(record) => {
                record.message_handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Resolve the pending record matching this message's game number.
    ///
    /// Only a final message (completion glyph, no pending glyph) resolves;
    /// the record is confirmed if the predicted rank appears in the first group.
    pub fn verify(&mut self, msg: &ParsedMessage) -> Option<Verdict> {
        let game = msg.game_number?;
        let record = self.records.get_mut(&game)?;
        if record.status != PredictionStatus::Pending || msg.pending || !msg.completed {
            return None;
        }

        record.status = if msg.first_group_rank(record.predicted_rank).is_some() {
            PredictionStatus::Confirmed
        } else {
            PredictionStatus::Failed
        };
        info!(
            target_game = game,
            status = record.status.as_str(),
            "prediction resolved"
        );

        Some(Verdict {
            target_game: game,
            predicted_rank: record.predicted_rank,
            status: record.status,
            handle: record.message_handle,
        })
    }

    /// Drop records for games before `horizon`.
    ///
    /// A pending record that falls behind the horizon will never see its
    /// result message and is expired with a warning.
    pub fn prune(&mut self, horizon: u32) -> usize {
        let kept = self.records.split_off(&horizon);
        let dropped = std::mem::replace(&mut self.records, kept);
        expire(dropped.values());
        dropped.len()
    }

    /// Drop every record. Used when the game numbering restarts, after
    /// which the old target games no longer refer to the same games.
    pub fn clear(&mut self) -> usize {
        let dropped = std::mem::take(&mut self.records);
        expire(dropped.values());
        dropped.len()
    }

    /// Every record is stored under its own target game.
    pub(crate) fn keys_consistent(&self) -> bool {
        self.records.iter().all(|(k, r)| *k == r.target_game)
    }

    pub fn contains(&self, target_game: u32) -> bool {
        self.records.contains_key(&target_game)
    }

    pub fn get(&self, target_game: u32) -> Option<&PredictionRecord> {
        self.records.get(&target_game)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.values()
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for record in self.records.values() {
            match record.status {
                PredictionStatus::Pending => tally.pending += 1,
                PredictionStatus::Confirmed => tally.confirmed += 1,
                PredictionStatus::Failed => tally.failed += 1,
            }
        }
        tally
    }
}

fn expire<'a>(records: impl Iterator<Item = &'a PredictionRecord>) {
    for r in records.filter(|r| r.status == PredictionStatus::Pending) {
        warn!(
            target_game = r.target_game,
            source_game = r.source_game,
            "prediction expired unresolved"
        );
    }
}

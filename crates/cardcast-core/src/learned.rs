//! Learned trigger rules: the most frequent trigger pairs in the sample log.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::card::CardPair;
use crate::correlate::TriggerSample;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartRule {
    pub trigger_cards: CardPair,
    pub frequency: u32,
}

/// Rank distinct trigger pairs by count, descending.
///
/// Ties keep the order in which the pair first appeared in the log.
pub fn rank_triggers(samples: &[TriggerSample], top: usize) -> Vec<SmartRule> {
    let mut order: Vec<CardPair> = Vec::new();
    let mut counts: HashMap<CardPair, u32> = HashMap::new();
    for sample in samples {
        let count = counts.entry(sample.trigger_cards).or_insert_with(|| {
            order.push(sample.trigger_cards);
            0
        });
        *count += 1;
    }

    let mut rules: Vec<SmartRule> = order
        .into_iter()
        .map(|pair| SmartRule {
            trigger_cards: pair,
            frequency: counts[&pair],
        })
        .collect();
    // Stable sort preserves first-seen order among equal counts.
    rules.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    rules.truncate(top);
    rules
}

/// Active learned rule set plus the learned-mode flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnedRules {
    pub rules: Vec<SmartRule>,
    pub active: bool,
}

impl LearnedRules {
    /// Replace the rule set from the sample log.
    ///
    /// A non-empty result activates learned mode. An empty result deactivates
    /// it, except on the implicit startup pass (`initial`), which leaves the
    /// flag untouched.
    pub fn recompute(&mut self, samples: &[TriggerSample], top: usize, initial: bool) {
        self.rules = rank_triggers(samples, top);
        if !self.rules.is_empty() {
            self.active = true;
        } else if !initial {
            self.active = false;
        }
        info!(
            rules = self.rules.len(),
            active = self.active,
            initial,
            "learned rules recomputed"
        );
    }

    /// Leave the rules stored but stop consulting them.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_live(&self) -> bool {
        self.active && !self.rules.is_empty()
    }

    /// Rule whose trigger equals `pair`, when learned mode is live.
    pub fn matching(&self, pair: &CardPair) -> Option<&SmartRule> {
        if !self.is_live() {
            return None;
        }
        self.rules.iter().find(|r| &r.trigger_cards == pair)
    }
}

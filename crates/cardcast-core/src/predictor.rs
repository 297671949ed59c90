//! Per-message pipeline: tokenize, correlate, verify, decide, record, flush.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::action::{
    self, ChannelBindingAction, InboundMessage, MessageHandle, OutboundAction, RuleControl,
    StatusReport,
};
use crate::card::Rank;
use crate::config::EngineConfig;
use crate::correlate::{self, Position};
use crate::extract::ParsedMessage;
use crate::persist::{FlushReport, StateStore};
use crate::rules::{self, Decision, DecisionContext};
use crate::state::{Aggregate, BotState, Dirty};
use crate::verify::{PredictionRecord, Verdict};

/// The live prediction engine over a persistent store.
pub struct Predictor<S: StateStore> {
    store: S,
    state: BotState,
    config: EngineConfig,
}

impl<S: StateStore> Predictor<S> {
    /// Load state from `store`.
    ///
    /// If samples exist but learned mode is off, the rule set is recomputed
    /// once as an initial pass.
    pub fn new(store: S, config: EngineConfig) -> Self {
        let state = BotState::load(&store);
        let mut predictor = Self {
            store,
            state,
            config,
        };
        if !predictor.state.samples.is_empty() && !predictor.state.learned.active {
            predictor.state.learned.recompute(
                &predictor.state.samples,
                predictor.config.top_rules,
                true,
            );
            predictor.flush(&Dirty::from_iter([Aggregate::Rules, Aggregate::LearnedMode]));
        }
        info!(
            samples = predictor.state.samples.len(),
            predictions = predictor.state.predictions.len(),
            learned = predictor.state.learned.is_live(),
            "predictor loaded"
        );
        predictor
    }

    pub fn state(&self) -> &BotState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn flush(&self, dirty: &Dirty) -> FlushReport {
        self.state.flush(&self.store, dirty)
    }

    /// Process one source message and return the actions to deliver.
    pub fn handle_message(
        &mut self,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Vec<OutboundAction> {
        if !self.state.channels.is_source(msg.chat_id) {
            debug!(chat_id = msg.chat_id, "message outside source channel");
            return Vec::new();
        }
        let parsed = ParsedMessage::parse(&msg.text);
        let Some(game) = parsed.game_number else {
            debug!(message_id = msg.message_id, "no game number");
            return Vec::new();
        };

        let mut dirty = Dirty::default();
        let mut actions = Vec::new();

        let frontier = self.state.frontier;
        match correlate::advance(
            &mut self.state.frontier,
            game,
            msg.edited,
            now,
            self.config.window,
        ) {
            Position::Current => {}
            Position::Reset { .. } => {
                self.state.window.clear();
                let expired = self.state.predictions.clear();
                info!(game, expired, "state from previous numbering discarded");
                dirty.mark(Aggregate::GameWindow);
                dirty.mark(Aggregate::Predictions);
            }
            Position::Stale { newest } => {
                debug!(game, newest, edited = msg.edited, "stale game ignored");
                return Vec::new();
            }
        }
        if self.state.frontier != frontier {
            dirty.mark(Aggregate::Frontier);
        }

        let obs = correlate::observe(
            &mut self.state.window,
            &mut self.state.samples,
            game,
            &parsed,
            &self.config,
            now,
        );
        if obs.recorded || obs.evicted > 0 {
            dirty.mark(Aggregate::GameWindow);
        }
        if obs.sample.is_some() {
            // New samples are flushed straight away, ahead of the rest.
            self.flush(&Dirty::from_iter([Aggregate::Samples, Aggregate::GameWindow]));
        }

        if let Some(verdict) = self.state.predictions.verify(&parsed) {
            dirty.mark(Aggregate::Predictions);
            match self.verdict_action(&verdict) {
                Some(action) => actions.push(action),
                None => warn!(target_game = game, "verdict not delivered: no output channel"),
            }
        }

        match self.decide(&parsed, now) {
            Decision::Predict(p) => {
                self.record(p.target_game, p.game_number, p.rank, now);
                self.state.cooldown.mark(now);
                dirty.mark(Aggregate::Predictions);
                dirty.mark(Aggregate::Cooldown);
                info!(
                    game = p.game_number,
                    target_game = p.target_game,
                    rank = %p.rank,
                    rule = p.rule.as_str(),
                    edited = msg.edited,
                    "prediction made"
                );
                if let Some(chat) = self.state.channels.output_channel_id {
                    actions.push(OutboundAction::new_message(
                        chat,
                        action::prediction_text(p.target_game, p.rank),
                        Some(p.target_game),
                    ));
                }
            }
            Decision::Skip(reason) => debug!(game, ?reason, "no prediction"),
        }

        if let Some(horizon) = game.checked_sub(self.config.window)
            && self.state.predictions.prune(horizon) > 0
        {
            dirty.mark(Aggregate::Predictions);
        }

        if !dirty.is_empty() {
            self.flush(&dirty);
        }
        actions
    }

    /// Rule-engine decision for an already-parsed message, without side effects.
    pub fn decide(&self, parsed: &ParsedMessage, now: DateTime<Utc>) -> Decision {
        let ctx = DecisionContext {
            config: &self.config,
            learned: &self.state.learned,
            samples: &self.state.samples,
            book: &self.state.predictions,
            cooldown: self.state.cooldown,
            output_bound: self.state.channels.output_channel_id.is_some(),
            now,
        };
        rules::decide(parsed, &ctx)
    }

    fn verdict_action(&self, verdict: &Verdict) -> Option<OutboundAction> {
        let chat = self.state.channels.output_channel_id?;
        let text = action::verdict_text(verdict);
        Some(match verdict.handle {
            Some(handle) => {
                OutboundAction::edit_message(chat, handle, text, Some(verdict.target_game))
            }
            None => OutboundAction::new_message(chat, text, Some(verdict.target_game)),
        })
    }

    /// Store a pending prediction for `target_game`.
    pub fn record(
        &mut self,
        target_game: u32,
        source_game: u32,
        rank: Rank,
        now: DateTime<Utc>,
    ) -> PredictionRecord {
        self.state
            .predictions
            .record(target_game, source_game, rank, now)
    }

    /// Store the message id the delivery collaborator assigned to a prediction.
    pub fn attach_handle(&mut self, target_game: u32, handle: MessageHandle) -> bool {
        let attached = self.state.predictions.attach_handle(target_game, handle);
        if attached {
            self.flush(&Dirty::from_iter([Aggregate::Predictions]));
        } else {
            warn!(target_game, "no prediction to attach handle to");
        }
        attached
    }

    pub fn bind_channel(&mut self, action: ChannelBindingAction) -> bool {
        let changed = self.state.channels.apply(action);
        info!(role = %action.role, chat_id = action.chat_id, changed, "channel bound");
        self.flush(&Dirty::from_iter([Aggregate::Channels]));
        changed
    }

    pub fn apply_control(&mut self, control: RuleControl) -> StatusReport {
        match control {
            RuleControl::ApplyLearnedRules => {
                self.state
                    .learned
                    .recompute(&self.state.samples, self.config.top_rules, false);
                self.flush(&Dirty::from_iter([Aggregate::Rules, Aggregate::LearnedMode]));
            }
            RuleControl::RevertToStaticOnly => {
                self.state.learned.deactivate();
                info!("learned rules disabled, static rules only");
                self.flush(&Dirty::from_iter([Aggregate::LearnedMode]));
            }
        }
        self.status()
    }

    pub fn status(&self) -> StatusReport {
        let state = &self.state;
        let sample_count = state.samples.len();
        let recent_samples: Vec<_> = state
            .samples
            .iter()
            .rev()
            .take(self.config.status_samples)
            .rev()
            .cloned()
            .collect();

        let mut lines = vec![
            "📋 LEARNED TRIGGER HISTORY".to_string(),
            format!(
                "Learned mode: {}",
                if state.learned.active { "✅ ON" } else { "❌ OFF" }
            ),
            format!("Samples collected: {sample_count}"),
        ];

        if recent_samples.is_empty() {
            lines.push(format!(
                "No {} outcome recorded yet; learned rules cannot be built.",
                self.config.target_rank
            ));
        } else {
            lines.push(format!(
                "Latest samples (N-{} → {} at N):",
                self.config.offset, self.config.target_rank
            ));
            for s in &recent_samples {
                lines.push(format!(
                    "• N{} ({}) → trigger N{} ({})",
                    s.outcome_game, s.outcome_card, s.trigger_game, s.trigger_cards
                ));
            }
        }

        if state.learned.is_live() {
            lines.push(format!("🎯 Active rules (top {}):", self.config.top_rules));
            for rule in &state.learned.rules {
                lines.push(format!("- {} (x{})", rule.trigger_cards, rule.frequency));
            }
        }

        let actions = if sample_count > 0 {
            vec![RuleControl::ApplyLearnedRules, RuleControl::RevertToStaticOnly]
        } else {
            lines.push("No actions available until samples are collected.".to_string());
            Vec::new()
        };

        StatusReport {
            text: lines.join("\n"),
            sample_count,
            learned_active: state.learned.active,
            rules: state.learned.rules.clone(),
            recent_samples,
            actions,
        }
    }
}

//! Engine selection.
//!
//! The relay talks to an [`Engine`]. With a valid configuration that is the
//! [`Predictor`]; otherwise a [`DisabledEngine`] that accepts every call,
//! never predicts, and says why in its status.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::action::{
    ChannelBindingAction, InboundMessage, MessageHandle, OutboundAction, RuleControl,
    StatusReport,
};
use crate::config::EngineConfig;
use crate::persist::StateStore;
use crate::predictor::Predictor;
use crate::state::ChannelBinding;
use crate::verify::Tally;

pub trait Engine: Send {
    fn handle_message(&mut self, msg: &InboundMessage, now: DateTime<Utc>)
    -> Vec<OutboundAction>;

    fn attach_handle(&mut self, target_game: u32, handle: MessageHandle) -> bool;

    fn bind_channel(&mut self, action: ChannelBindingAction) -> bool;

    fn apply_control(&mut self, control: RuleControl) -> StatusReport;

    fn status(&self) -> StatusReport;

    fn channels(&self) -> ChannelBinding;

    /// Prediction counts by status.
    fn tally(&self) -> Tally;

    fn is_enabled(&self) -> bool {
        true
    }
}

impl<S: StateStore + Send> Engine for Predictor<S> {
    fn handle_message(
        &mut self,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Vec<OutboundAction> {
        Predictor::handle_message(self, msg, now)
    }

    fn attach_handle(&mut self, target_game: u32, handle: MessageHandle) -> bool {
        Predictor::attach_handle(self, target_game, handle)
    }

    fn bind_channel(&mut self, action: ChannelBindingAction) -> bool {
        Predictor::bind_channel(self, action)
    }

    fn apply_control(&mut self, control: RuleControl) -> StatusReport {
        Predictor::apply_control(self, control)
    }

    fn status(&self) -> StatusReport {
        Predictor::status(self)
    }

    fn channels(&self) -> ChannelBinding {
        self.state().channels
    }

    fn tally(&self) -> Tally {
        self.state().predictions.tally()
    }
}

/// Stand-in used when the predictor cannot be built.
#[derive(Debug, Clone)]
pub struct DisabledEngine {
    reason: String,
}

impl DisabledEngine {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Engine for DisabledEngine {
    fn handle_message(&mut self, _: &InboundMessage, _: DateTime<Utc>) -> Vec<OutboundAction> {
        Vec::new()
    }

    fn attach_handle(&mut self, _: u32, _: MessageHandle) -> bool {
        false
    }

    fn bind_channel(&mut self, _: ChannelBindingAction) -> bool {
        false
    }

    fn apply_control(&mut self, _: RuleControl) -> StatusReport {
        self.status()
    }

    fn status(&self) -> StatusReport {
        StatusReport {
            text: format!("Prediction engine unavailable: {}", self.reason),
            sample_count: 0,
            learned_active: false,
            rules: Vec::new(),
            recent_samples: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn channels(&self) -> ChannelBinding {
        ChannelBinding::default()
    }

    fn tally(&self) -> Tally {
        Tally::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Build the predictor over `store`, or a disabled engine if `config` is invalid.
pub fn select_engine<S>(store: S, config: EngineConfig) -> Box<dyn Engine>
where
    S: StateStore + Send + 'static,
{
    match config.validate() {
        Ok(()) => {
            info!(target_rank = %config.target_rank, offset = config.offset, "prediction engine enabled");
            Box::new(Predictor::new(store, config))
        }
        Err(e) => {
            warn!(error = %e, "prediction engine disabled");
            Box::new(DisabledEngine::new(e.to_string()))
        }
    }
}

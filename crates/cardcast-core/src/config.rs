//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::card::{CardToken, Rank, Suit};

/// Games kept in the correlation window behind the newest game.
pub const DEFAULT_WINDOW: u32 = 50;

/// Minimum gap, in games, since the last recorded outcome before the gap rule
/// fires. The comparison is strict: `current - last > threshold`.
pub const DEFAULT_GAP_THRESHOLD: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rank being forecast and detected as an outcome.
    pub target_rank: Rank,
    /// Card whose presence in the first group triggers a static prediction.
    pub trigger_card: CardToken,
    pub score_threshold: u32,
    pub gap_threshold: u32,
    /// Distance between the trigger game and the predicted game.
    pub offset: u32,
    pub window: u32,
    pub cooldown_secs: i64,
    pub top_rules: usize,
    /// Number of samples listed in the status report.
    pub status_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_rank: Rank::King,
            trigger_card: CardToken::new(Rank::Ten, Suit::Heart),
            score_threshold: 45,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            offset: 2,
            window: DEFAULT_WINDOW,
            cooldown_secs: 30,
            top_rules: 3,
            status_samples: 10,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.offset == 0 {
            return Err(CoreError::InvalidConfig("offset must be at least 1".into()));
        }
        if self.window < self.offset {
            return Err(CoreError::InvalidConfig(format!(
                "window ({}) must cover the offset ({})",
                self.window, self.offset
            )));
        }
        if self.top_rules == 0 {
            return Err(CoreError::InvalidConfig("top_rules must be at least 1".into()));
        }
        if self.cooldown_secs < 0 {
            return Err(CoreError::InvalidConfig("cooldown_secs must not be negative".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_offset_rejected() {
        let cfg = EngineConfig {
            offset: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn window_smaller_than_offset_rejected() {
        let cfg = EngineConfig {
            window: 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"gap_threshold": 7}"#).unwrap();
        assert_eq!(cfg.gap_threshold, 7);
        assert_eq!(cfg.score_threshold, 45);
        assert_eq!(cfg.trigger_card.to_string(), "10♥\u{FE0F}");
    }
}

//! Prediction decision: learned trigger rules first, then static heuristics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{CardPair, Rank};
use crate::config::EngineConfig;
use crate::correlate::TriggerSample;
use crate::extract::ParsedMessage;
use crate::learned::LearnedRules;
use crate::verify::PredictionBook;

/// Time of the last prediction sent; gates the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cooldown {
    pub last_prediction: Option<DateTime<Utc>>,
}

impl Cooldown {
    /// Seconds left before another prediction is allowed, if any.
    pub fn remaining(&self, now: DateTime<Utc>, interval_secs: i64) -> Option<i64> {
        let last = self.last_prediction?;
        let elapsed = (now - last).num_seconds();
        (elapsed < interval_secs).then(|| interval_secs - elapsed)
    }

    pub fn mark(&mut self, now: DateTime<Utc>) {
        self.last_prediction = Some(now);
    }
}

/// Which rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Learned { trigger: CardPair, frequency: u32 },
    TriggerCard,
    ScoreThreshold { score: u32 },
    Gap { gap: u32 },
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learned { .. } => "learned",
            Self::TriggerCard => "trigger_card",
            Self::ScoreThreshold { .. } => "score",
            Self::Gap { .. } => "gap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoOutputChannel,
    NoGameNumber,
    Pending,
    NotFinal,
    NoCards,
    Cooldown { remaining_secs: i64 },
    AlreadyPredicted { target_game: u32 },
    NoRuleMatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub game_number: u32,
    pub target_game: u32,
    pub rank: Rank,
    pub rule: RuleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Predict(Prediction),
    Skip(SkipReason),
}

impl Decision {
    pub fn should_predict(&self) -> bool {
        matches!(self, Self::Predict(_))
    }

    /// `(should_predict, game_number, predicted_rank)`.
    pub fn as_tuple(&self) -> (bool, Option<u32>, Option<Rank>) {
        match self {
            Self::Predict(p) => (true, Some(p.game_number), Some(p.rank)),
            Self::Skip(_) => (false, None, None),
        }
    }
}

/// Everything the decision reads besides the message itself.
pub struct DecisionContext<'a> {
    pub config: &'a EngineConfig,
    pub learned: &'a LearnedRules,
    pub samples: &'a [TriggerSample],
    pub book: &'a PredictionBook,
    pub cooldown: Cooldown,
    pub output_bound: bool,
    pub now: DateTime<Utc>,
}

pub fn decide(msg: &ParsedMessage, ctx: &DecisionContext<'_>) -> Decision {
    if !ctx.output_bound {
        return Decision::Skip(SkipReason::NoOutputChannel);
    }
    let Some(game) = msg.game_number else {
        return Decision::Skip(SkipReason::NoGameNumber);
    };
    if msg.pending {
        return Decision::Skip(SkipReason::Pending);
    }
    if !msg.completed {
        return Decision::Skip(SkipReason::NotFinal);
    }
    if msg.first_cards().is_empty() {
        return Decision::Skip(SkipReason::NoCards);
    }
    if let Some(remaining_secs) = ctx.cooldown.remaining(ctx.now, ctx.config.cooldown_secs) {
        return Decision::Skip(SkipReason::Cooldown { remaining_secs });
    }
    let Some(target_game) = game.checked_add(ctx.config.offset) else {
        return Decision::Skip(SkipReason::NoGameNumber);
    };
    if ctx.book.contains(target_game) {
        return Decision::Skip(SkipReason::AlreadyPredicted { target_game });
    }

    match match_rule(game, msg, ctx) {
        Some(rule) => Decision::Predict(Prediction {
            game_number: game,
            target_game,
            rank: ctx.config.target_rank,
            rule,
        }),
        None => Decision::Skip(SkipReason::NoRuleMatched),
    }
}

fn match_rule(game: u32, msg: &ParsedMessage, ctx: &DecisionContext<'_>) -> Option<RuleKind> {
    if let Some(pair) = msg.lead_pair()
        && let Some(rule) = ctx.learned.matching(&pair)
    {
        return Some(RuleKind::Learned {
            trigger: rule.trigger_cards,
            frequency: rule.frequency,
        });
    }

    if msg.first_group_contains(ctx.config.trigger_card) {
        return Some(RuleKind::TriggerCard);
    }

    if let Some(score) = msg.total_score
        && score >= ctx.config.score_threshold
    {
        return Some(RuleKind::ScoreThreshold { score });
    }

    let last_outcome = ctx.samples.iter().map(|s| s.outcome_game).max()?;
    let gap = game.checked_sub(last_outcome)?;
    (gap > ctx.config.gap_threshold).then_some(RuleKind::Gap { gap })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::card::CardToken;
    use crate::learned::SmartRule;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn pair(a: &str, b: &str) -> CardPair {
        CardPair(a.parse::<CardToken>().unwrap(), b.parse().unwrap())
    }

    fn sample(outcome: u32) -> TriggerSample {
        TriggerSample {
            outcome_game: outcome,
            trigger_game: outcome - 2,
            trigger_cards: pair("2♣️", "3♣️"),
            outcome_card: "K♠️".parse().unwrap(),
            recorded_at: now(),
        }
    }

    struct Fixture {
        config: EngineConfig,
        learned: LearnedRules,
        samples: Vec<TriggerSample>,
        book: PredictionBook,
        cooldown: Cooldown,
        output_bound: bool,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: EngineConfig::default(),
                learned: LearnedRules::default(),
                samples: Vec::new(),
                book: PredictionBook::default(),
                cooldown: Cooldown::default(),
                output_bound: true,
            }
        }

        fn decide(&self, text: &str) -> Decision {
            let ctx = DecisionContext {
                config: &self.config,
                learned: &self.learned,
                samples: &self.samples,
                book: &self.book,
                cooldown: self.cooldown,
                output_bound: self.output_bound,
                now: now(),
            };
            decide(&ParsedMessage::parse(text), &ctx)
        }
    }

    #[test]
    fn king_lead_without_rules_does_not_predict() {
        let fx = Fixture::new();
        assert_eq!(
            fx.decide("#N100. (K♠️ 5♥️) ✅"),
            Decision::Skip(SkipReason::NoRuleMatched)
        );
    }

    #[test]
    fn ten_of_hearts_predicts_two_ahead() {
        let fx = Fixture::new();
        let Decision::Predict(p) = fx.decide("#N50. (10♥️ 3♦️) ✅") else {
            panic!("expected a prediction");
        };
        assert_eq!(p.target_game, 52);
        assert_eq!(p.rank, Rank::King);
        assert_eq!(p.rule, RuleKind::TriggerCard);
        assert_eq!(fx.decide("#N50. (10♥️ 3♦️) ✅").as_tuple(), (true, Some(50), Some(Rank::King)));
    }

    #[test]
    fn alternate_heart_glyph_matches_trigger_card() {
        let fx = Fixture::new();
        assert!(fx.decide("#N50. (3♦️ 10❤️) ✅").should_predict());
    }

    #[test]
    fn pending_indicator_never_predicts() {
        let fx = Fixture::new();
        assert_eq!(
            fx.decide("#N10. (K♠️ 2♥️) 🕐"),
            Decision::Skip(SkipReason::Pending)
        );
        assert_eq!(
            fx.decide("#N10. (10♥️ 2♥️) #T50 ✅ 🕐"),
            Decision::Skip(SkipReason::Pending)
        );
    }

    #[test]
    fn requires_completion_indicator() {
        let fx = Fixture::new();
        assert_eq!(
            fx.decide("#N50. (10♥️ 3♦️)"),
            Decision::Skip(SkipReason::NotFinal)
        );
    }

    #[test]
    fn empty_first_group_has_no_cards() {
        let fx = Fixture::new();
        assert_eq!(
            fx.decide("#N50. () #T50 ✅"),
            Decision::Skip(SkipReason::NoCards)
        );
        assert_eq!(
            fx.decide("#N50. ( ) - (K♠️ 3♦️) #T50 ✅"),
            Decision::Skip(SkipReason::NoCards)
        );
    }

    #[test]
    fn requires_output_channel() {
        let mut fx = Fixture::new();
        fx.output_bound = false;
        assert_eq!(
            fx.decide("#N50. (10♥️ 3♦️) ✅"),
            Decision::Skip(SkipReason::NoOutputChannel)
        );
    }

    #[test]
    fn score_threshold_inclusive() {
        let fx = Fixture::new();
        let Decision::Predict(p) = fx.decide("#N20. (2♣️ 3♦️) #T45 ✅") else {
            panic!("expected a prediction");
        };
        assert_eq!(p.rule, RuleKind::ScoreThreshold { score: 45 });
        assert!(!fx.decide("#N20. (2♣️ 3♦️) #T44 ✅").should_predict());
    }

    #[test]
    fn learned_rule_takes_priority_over_static() {
        let mut fx = Fixture::new();
        let trigger = pair("10♥️", "3♦️");
        fx.learned = LearnedRules {
            rules: vec![SmartRule {
                trigger_cards: trigger,
                frequency: 3,
            }],
            active: true,
        };
        let Decision::Predict(p) = fx.decide("#N50. (10♥️ 3♦️) #T50 ✅") else {
            panic!("expected a prediction");
        };
        assert_eq!(
            p.rule,
            RuleKind::Learned {
                trigger,
                frequency: 3
            }
        );
    }

    #[test]
    fn inactive_learned_rules_fall_back_to_static() {
        let mut fx = Fixture::new();
        fx.learned = LearnedRules {
            rules: vec![SmartRule {
                trigger_cards: pair("10♥️", "3♦️"),
                frequency: 3,
            }],
            active: false,
        };
        let Decision::Predict(p) = fx.decide("#N50. (10♥️ 3♦️) ✅") else {
            panic!("expected a prediction");
        };
        assert_eq!(p.rule, RuleKind::TriggerCard);
    }

    #[test]
    fn learned_rule_is_order_sensitive() {
        let mut fx = Fixture::new();
        fx.learned = LearnedRules {
            rules: vec![SmartRule {
                trigger_cards: pair("7♦️", "9♠️"),
                frequency: 3,
            }],
            active: true,
        };
        assert!(fx.decide("#N30. (7♦️ 9♠️) ✅").should_predict());
        assert!(!fx.decide("#N30. (9♠️ 7♦️) ✅").should_predict());
    }

    // The gap threshold is configurable; these pin the strict `>` comparison
    // at the default of 4.
    #[test]
    fn gap_rule_fires_beyond_threshold() {
        let mut fx = Fixture::new();
        fx.samples = vec![sample(10), sample(20)];
        assert!(!fx.decide("#N24. (2♣️ 3♦️) ✅").should_predict());
        let Decision::Predict(p) = fx.decide("#N25. (2♣️ 3♦️) ✅") else {
            panic!("expected a prediction");
        };
        assert_eq!(p.rule, RuleKind::Gap { gap: 5 });
    }

    #[test]
    fn gap_rule_threshold_configurable() {
        let mut fx = Fixture::new();
        fx.samples = vec![sample(20)];
        fx.config.gap_threshold = 10;
        assert!(!fx.decide("#N25. (2♣️ 3♦️) ✅").should_predict());
        assert!(fx.decide("#N31. (2♣️ 3♦️) ✅").should_predict());
    }

    #[test]
    fn gap_rule_needs_samples() {
        let fx = Fixture::new();
        assert!(!fx.decide("#N500. (2♣️ 3♦️) ✅").should_predict());
    }

    #[test]
    fn cooldown_blocks_then_releases() {
        let mut fx = Fixture::new();
        fx.cooldown.mark(now() - Duration::seconds(10));
        assert_eq!(
            fx.decide("#N50. (10♥️ 3♦️) ✅"),
            Decision::Skip(SkipReason::Cooldown { remaining_secs: 20 })
        );

        fx.cooldown.mark(now() - Duration::seconds(30));
        assert!(fx.decide("#N50. (10♥️ 3♦️) ✅").should_predict());
    }

    #[test]
    fn existing_record_blocks_double_fire() {
        let mut fx = Fixture::new();
        fx.book.record(52, 50, Rank::King, now());
        assert_eq!(
            fx.decide("#N50. (10♥️ 3♦️) ✅"),
            Decision::Skip(SkipReason::AlreadyPredicted { target_game: 52 })
        );
    }
}

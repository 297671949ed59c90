//! Token extraction from raw game messages.
//!
//! Source messages look like `#N812. ✅3(K♠️ 10♥️) - 5(2♣️ 3♦️) #T45`. Every
//! extractor is pure and returns `None` (or an empty list) when its token is
//! absent; a missing field is an expected outcome, never an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::card::{CardPair, CardToken, Rank, Suit};

/// `#N812.` game marker (case-insensitive).
static GAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)#N(\d+)\.").unwrap());

/// `🔵812🔵` marker used by prediction messages.
static BLUE_GAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"🔵(\d+)🔵").unwrap());

/// `#T45` total score marker (case-insensitive).
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)#T(\d+)").unwrap());

static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]*)\)").unwrap());

/// Rank then suit glyph, variation selector optional.
static CARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+|[AKQJ])([♠♥♦♣])\x{FE0F}?").unwrap());

const PENDING_GLYPHS: &[char] = &['🕐', '⏰'];
const COMPLETION_GLYPHS: &[char] = &['✅', '🔰'];

/// Game number from `#N<digits>.`, falling back to `🔵<digits>🔵`.
pub fn game_number(text: &str) -> Option<u32> {
    let caps = GAME_RE
        .captures(text)
        .or_else(|| BLUE_GAME_RE.captures(text))?;
    caps[1].parse().ok()
}

/// Total score from `#T<digits>`.
pub fn total_score(text: &str) -> Option<u32> {
    let caps = SCORE_RE.captures(text)?;
    caps[1].parse().ok()
}

/// Raw contents of the first two parenthesised groups.
pub fn groups(text: &str) -> (Option<&str>, Option<&str>) {
    let mut iter = GROUP_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()));
    let first = iter.next();
    let second = iter.next();
    (first, second)
}

/// Scan a group for `<rank><suit>` tokens in order.
///
/// The alternate heart `❤` is normalised to `♥` before matching. Tokens whose
/// rank is not a playing-card rank (e.g. `11♠️`) are skipped.
pub fn parse_cards(content: &str) -> Vec<CardToken> {
    let normalized = content.replace('❤', "♥");
    CARD_RE
        .captures_iter(&normalized)
        .filter_map(|caps| {
            let rank = Rank::parse(&caps[1])?;
            let suit = Suit::from_glyph(caps[2].chars().next()?)?;
            Some(CardToken::new(rank, suit))
        })
        .collect()
}

pub fn has_pending_indicator(text: &str) -> bool {
    text.contains(PENDING_GLYPHS)
}

pub fn has_completion_indicator(text: &str) -> bool {
    text.contains(COMPLETION_GLYPHS)
}

/// All tokens of one message, extracted once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub game_number: Option<u32>,
    pub total_score: Option<u32>,
    /// `None` when the message has no parenthesised group at all.
    pub first_group: Option<Vec<CardToken>>,
    pub second_group: Option<Vec<CardToken>>,
    pub pending: bool,
    pub completed: bool,
}

impl ParsedMessage {
    pub fn parse(text: &str) -> Self {
        let (first, second) = groups(text);
        Self {
            game_number: game_number(text),
            total_score: total_score(text),
            first_group: first.map(parse_cards),
            second_group: second.map(parse_cards),
            pending: has_pending_indicator(text),
            completed: has_completion_indicator(text),
        }
    }

    pub fn first_cards(&self) -> &[CardToken] {
        self.first_group.as_deref().unwrap_or_default()
    }

    /// First two cards of the first group, only when it holds exactly two.
    pub fn lead_pair(&self) -> Option<CardPair> {
        CardPair::from_exact(self.first_cards())
    }

    /// First card of `rank` in the first group.
    pub fn first_group_rank(&self, rank: Rank) -> Option<CardToken> {
        self.first_cards().iter().copied().find(|c| c.rank == rank)
    }

    pub fn first_group_contains(&self, card: CardToken) -> bool {
        self.first_cards().contains(&card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(s: &str) -> CardToken {
        s.parse().unwrap()
    }

    #[test]
    fn game_number_hash_n() {
        assert_eq!(game_number("#N812. ✅3(K♠️ 10♥️)"), Some(812));
        assert_eq!(game_number("#n7. (2♣️ 3♦️)"), Some(7));
    }

    #[test]
    fn game_number_requires_dot() {
        assert_eq!(game_number("#N812 (K♠️)"), None);
    }

    #[test]
    fn game_number_blue_marker() {
        assert_eq!(game_number("🔵52🔵 K statut :⏳"), Some(52));
    }

    #[test]
    fn game_number_prefers_hash_n() {
        assert_eq!(game_number("🔵9🔵 #N10."), Some(10));
    }

    #[test]
    fn game_number_overflow_is_none() {
        assert_eq!(game_number("#N99999999999999999999."), None);
    }

    #[test]
    fn total_score_found() {
        assert_eq!(total_score("#N1. (2♣️ 3♦️) #T45"), Some(45));
        assert_eq!(total_score("#t36"), Some(36));
        assert_eq!(total_score("#N1. (2♣️ 3♦️)"), None);
    }

    #[test]
    fn groups_first_and_second() {
        let (a, b) = groups("#N1. 3(K♠️ 10♥️) - 5(2♣️ 3♦️)");
        assert_eq!(a, Some("K♠️ 10♥️"));
        assert_eq!(b, Some("2♣️ 3♦️"));
        assert_eq!(groups("no groups"), (None, None));
    }

    #[test]
    fn cards_in_order_with_heart_normalised() {
        let cards = parse_cards("10❤️ J♣️ a♠️");
        assert_eq!(cards, vec![card("10♥️"), card("J♣️"), card("A♠️")]);
    }

    #[test]
    fn cards_skip_invalid_rank() {
        assert_eq!(parse_cards("11♠️ 4♦️"), vec![card("4♦️")]);
    }

    #[test]
    fn indicators() {
        assert!(has_pending_indicator("#N1. 🕐"));
        assert!(has_pending_indicator("#N1. ⏰"));
        assert!(!has_pending_indicator("#N1. ✅"));
        assert!(has_completion_indicator("#N1. ✅"));
        assert!(has_completion_indicator("#N1. 🔰"));
        assert!(!has_completion_indicator("#N1. 🕐"));
    }

    #[test]
    fn parsed_message_lead_pair() {
        let msg = ParsedMessage::parse("#N50. (10♥️ 3♦️) ✅");
        assert_eq!(msg.game_number, Some(50));
        assert_eq!(msg.lead_pair(), Some(CardPair(card("10♥️"), card("3♦️"))));
        assert!(msg.completed);
        assert!(!msg.pending);
    }

    #[test]
    fn lead_pair_absent_with_three_cards() {
        let msg = ParsedMessage::parse("#N50. (10♥️ 3♦️ 4♣️) ✅");
        assert_eq!(msg.lead_pair(), None);
        assert_eq!(msg.first_cards().len(), 3);
    }

    #[test]
    fn rank_lookup_in_first_group_only() {
        let msg = ParsedMessage::parse("#N5. (2♣️ 3♦️) - (K♠️ 4♥️)");
        assert_eq!(msg.first_group_rank(Rank::King), None);
        assert_eq!(msg.second_group.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn empty_message_parses_to_nothing() {
        assert_eq!(ParsedMessage::parse(""), ParsedMessage::default());
    }
}

//! Card values as they appear in game messages.
//!
//! A card is written as a rank followed by a suit glyph, e.g. `10♥️`, `K♠️`.
//! Suit glyphs normally carry the U+FE0F variation selector; it is accepted
//! but not required when parsing, and always emitted when displaying.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

const VARIATION_SELECTOR: char = '\u{FE0F}';

/// Serialised in message notation (`"K"`, `"10"`), as card tokens are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Rank {
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    /// Parse a rank token: `2`..`10` or `J`/`Q`/`K`/`A` (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let rank = match s.to_ascii_uppercase().as_str() {
            "2" => Self::Two,
            "3" => Self::Three,
            "4" => Self::Four,
            "5" => Self::Five,
            "6" => Self::Six,
            "7" => Self::Seven,
            "8" => Self::Eight,
            "9" => Self::Nine,
            "10" => Self::Ten,
            "J" => Self::Jack,
            "Q" => Self::Queen,
            "K" => Self::King,
            "A" => Self::Ace,
            _ => return None,
        };
        Some(rank)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
            Self::Five => "5",
            Self::Six => "6",
            Self::Seven => "7",
            Self::Eight => "8",
            Self::Nine => "9",
            Self::Ten => "10",
            Self::Jack => "J",
            Self::Queen => "Q",
            Self::King => "K",
            Self::Ace => "A",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.as_str().to_string()
    }
}

impl TryFrom<String> for Rank {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Rank::parse(&s).ok_or(CoreError::InvalidCard(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Suit {
    Spade,
    Heart,
    Diamond,
    Club,
}

impl Suit {
    /// Map a suit glyph to a suit. `❤` is an alternate heart.
    pub fn from_glyph(c: char) -> Option<Self> {
        match c {
            '♠' => Some(Self::Spade),
            '♥' | '❤' => Some(Self::Heart),
            '♦' => Some(Self::Diamond),
            '♣' => Some(Self::Club),
            _ => None,
        }
    }

    /// Canonical glyph including the emoji variation selector.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Spade => "♠\u{FE0F}",
            Self::Heart => "♥\u{FE0F}",
            Self::Diamond => "♦\u{FE0F}",
            Self::Club => "♣\u{FE0F}",
        }
    }
}

/// A single card: rank plus suit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CardToken {
    pub rank: Rank,
    pub suit: Suit,
}

impl CardToken {
    pub const fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for CardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit.symbol())
    }
}

impl FromStr for CardToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches(VARIATION_SELECTOR);
        let mut chars = trimmed.chars();
        let glyph = chars
            .next_back()
            .ok_or_else(|| CoreError::InvalidCard(s.to_string()))?;
        let suit = Suit::from_glyph(glyph).ok_or_else(|| CoreError::InvalidCard(s.to_string()))?;
        let rank = Rank::parse(chars.as_str()).ok_or_else(|| CoreError::InvalidCard(s.to_string()))?;
        Ok(Self { rank, suit })
    }
}

impl From<CardToken> for String {
    fn from(card: CardToken) -> Self {
        card.to_string()
    }
}

impl TryFrom<String> for CardToken {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Ordered pair of cards. Equality is order-sensitive: `(7♦️, 9♠️) != (9♠️, 7♦️)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardPair(pub CardToken, pub CardToken);

impl CardPair {
    /// Build a pair from a card list holding exactly two cards.
    pub fn from_exact(cards: &[CardToken]) -> Option<Self> {
        match cards {
            [a, b] => Some(Self(*a, *b)),
            _ => None,
        }
    }
}

impl fmt::Display for CardPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_selector() {
        let a: CardToken = "K♠️".parse().unwrap();
        let b: CardToken = "K♠".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, CardToken::new(Rank::King, Suit::Spade));
    }

    #[test]
    fn alternate_heart_is_heart() {
        let card: CardToken = "10❤️".parse().unwrap();
        assert_eq!(card, CardToken::new(Rank::Ten, Suit::Heart));
        assert_eq!(card.to_string(), "10♥\u{FE0F}");
    }

    #[test]
    fn lowercase_rank_accepted() {
        let card: CardToken = "q♦️".parse().unwrap();
        assert_eq!(card.rank, Rank::Queen);
    }

    #[test]
    fn rejects_unknown_rank_and_suit() {
        assert!("11♠️".parse::<CardToken>().is_err());
        assert!("1♠️".parse::<CardToken>().is_err());
        assert!("K".parse::<CardToken>().is_err());
        assert!("".parse::<CardToken>().is_err());
    }

    #[test]
    fn card_serialises_as_text() {
        let card = CardToken::new(Rank::Seven, Suit::Diamond);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"7♦\u{FE0F}\"");
        let back: CardToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);
    }

    #[test]
    fn pair_is_order_sensitive() {
        let a = CardToken::new(Rank::Seven, Suit::Diamond);
        let b = CardToken::new(Rank::Nine, Suit::Spade);
        assert_ne!(CardPair(a, b), CardPair(b, a));
    }

    #[test]
    fn pair_requires_exactly_two() {
        let a = CardToken::new(Rank::Two, Suit::Club);
        assert!(CardPair::from_exact(&[a]).is_none());
        assert!(CardPair::from_exact(&[a, a, a]).is_none());
        assert_eq!(CardPair::from_exact(&[a, a]), Some(CardPair(a, a)));
    }

    #[test]
    fn rank_serializes_in_card_notation() {
        assert_eq!(serde_json::to_string(&Rank::King).unwrap(), r#""K""#);
        assert_eq!(serde_json::from_str::<Rank>(r#""10""#).unwrap(), Rank::Ten);
        assert!(serde_json::from_str::<Rank>(r#""King""#).is_err());

        let card = CardToken::new(Rank::King, Suit::Heart);
        let rank_json = serde_json::to_string(&card.rank).unwrap();
        let card_json = serde_json::to_string(&card).unwrap();
        assert!(card_json.starts_with(rank_json.trim_end_matches('"')));
    }
}

//! Sides, piece kinds and the one-character client notation.
//!
//! ```text
//! Revealed red:    K A B N R C P      Revealed black:  k a b n r c p
//! Covered red:     D E F G H I        Covered black:   d e f g h i
//!                  | | | | | `- soldier slot
//!                  | | | | `--- cannon slot
//!                  | | | `----- advisor slot
//!                  | | `------- minister slot
//!                  | `--------- horse slot
//!                  `----------- chariot slot
//! ```

use serde::{Deserialize, Serialize};

/// Player identifier. Red moves first.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Red = 0,
    Black = 1,
}

impl Side {
    /// Get the opponent side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse the client's `currentPlayer` string.
    pub fn from_name(name: &str) -> Option<Side> {
        match name {
            "red" => Some(Side::Red),
            "black" => Some(Side::Black),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Red => "red",
            Side::Black => "black",
        }
    }

    pub fn all() -> impl Iterator<Item = Side> {
        [Side::Red, Side::Black].into_iter()
    }
}

/// Piece kind. For a covered piece this is the starting-slot role, not
/// its true identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    General = 0,
    Advisor = 1,
    Minister = 2,
    Horse = 3,
    Chariot = 4,
    Cannon = 5,
    Soldier = 6,
}

impl Kind {
    pub const COUNT: usize = 7;

    /// Every kind that can start the game face down.
    pub const COVERABLE: [Kind; 6] = [
        Kind::Advisor,
        Kind::Minister,
        Kind::Horse,
        Kind::Chariot,
        Kind::Cannon,
        Kind::Soldier,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of pieces of this kind each side starts with.
    #[inline]
    pub const fn initial_count(self) -> u8 {
        match self {
            Kind::General => 1,
            Kind::Soldier => 5,
            _ => 2,
        }
    }

    /// Letter of the revealed red piece; black uses the lowercase form.
    const fn revealed_letter(self) -> char {
        match self {
            Kind::General => 'K',
            Kind::Advisor => 'A',
            Kind::Minister => 'B',
            Kind::Horse => 'N',
            Kind::Chariot => 'R',
            Kind::Cannon => 'C',
            Kind::Soldier => 'P',
        }
    }

    /// Letter of a red covered piece sitting on this kind's slot.
    const fn covered_letter(self) -> Option<char> {
        match self {
            Kind::General => None,
            Kind::Chariot => Some('D'),
            Kind::Horse => Some('E'),
            Kind::Minister => Some('F'),
            Kind::Advisor => Some('G'),
            Kind::Cannon => Some('H'),
            Kind::Soldier => Some('I'),
        }
    }

    /// Parse a revealed kind from its letter, ignoring case.
    pub fn from_letter(letter: char) -> Option<Kind> {
        match letter.to_ascii_uppercase() {
            'K' => Some(Kind::General),
            'A' => Some(Kind::Advisor),
            'B' => Some(Kind::Minister),
            'N' => Some(Kind::Horse),
            'R' => Some(Kind::Chariot),
            'C' => Some(Kind::Cannon),
            'P' => Some(Kind::Soldier),
            _ => None,
        }
    }
}

/// Whether a piece's identity is known to both players.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Revealed,
    Covered,
}

/// A piece on the board.
///
/// Build through [`Piece::revealed`], [`Piece::covered`] or
/// [`Piece::from_symbol`]; none of them can produce a covered general.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Piece {
    side: Side,
    kind: Kind,
    visibility: Visibility,
}

impl Piece {
    #[inline]
    pub const fn revealed(side: Side, kind: Kind) -> Piece {
        Piece {
            side,
            kind,
            visibility: Visibility::Revealed,
        }
    }

    /// A face-down piece on a `slot` starting square. Returns None for the
    /// general, which is never covered.
    #[inline]
    pub fn covered(side: Side, slot: Kind) -> Option<Piece> {
        match slot {
            Kind::General => None,
            _ => Some(Piece {
                side,
                kind: slot,
                visibility: Visibility::Covered,
            }),
        }
    }

    #[inline]
    pub fn side(self) -> Side {
        self.side
    }

    /// The revealed kind, or the slot kind for a covered piece.
    #[inline]
    pub fn kind(self) -> Kind {
        self.kind
    }

    #[inline]
    pub fn visibility(self) -> Visibility {
        self.visibility
    }

    #[inline]
    pub fn is_covered(self) -> bool {
        self.visibility == Visibility::Covered
    }

    /// Same piece owned by the other side.
    #[inline]
    pub fn with_side_swapped(self) -> Piece {
        Piece {
            side: self.side.opponent(),
            ..self
        }
    }

    /// Parse a board symbol. `.` and unknown letters give None.
    pub fn from_symbol(symbol: char) -> Option<Piece> {
        let side = if symbol.is_ascii_uppercase() {
            Side::Red
        } else {
            Side::Black
        };
        let piece = match symbol.to_ascii_uppercase() {
            'K' => Piece::revealed(side, Kind::General),
            'A' => Piece::revealed(side, Kind::Advisor),
            'B' => Piece::revealed(side, Kind::Minister),
            'N' => Piece::revealed(side, Kind::Horse),
            'R' => Piece::revealed(side, Kind::Chariot),
            'C' => Piece::revealed(side, Kind::Cannon),
            'P' => Piece::revealed(side, Kind::Soldier),
            'D' => Piece::covered(side, Kind::Chariot)?,
            'E' => Piece::covered(side, Kind::Horse)?,
            'F' => Piece::covered(side, Kind::Minister)?,
            'G' => Piece::covered(side, Kind::Advisor)?,
            'H' => Piece::covered(side, Kind::Cannon)?,
            'I' => Piece::covered(side, Kind::Soldier)?,
            _ => return None,
        };
        Some(piece)
    }

    /// The client symbol for this piece.
    pub fn symbol(self) -> char {
        let letter = match self.visibility {
            Visibility::Revealed => self.kind.revealed_letter(),
            // covered() never builds a covered general
            Visibility::Covered => self.kind.covered_letter().unwrap_or('?'),
        };
        match self.side {
            Side::Red => letter,
            Side::Black => letter.to_ascii_lowercase(),
        }
    }
}

/// Symbol used for an empty square.
pub const EMPTY_SYMBOL: char = '.';

/// Client symbol for an optional square occupant.
#[inline]
pub fn symbol_of(cell: Option<Piece>) -> char {
    cell.map_or(EMPTY_SYMBOL, Piece::symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SYMBOLS: &str = "KABNRCPDEFGHIkabnrcpdefghi";

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Red.opponent(), Side::Black);
        assert_eq!(Side::Black.opponent(), Side::Red);
    }

    #[test]
    fn test_symbol_roundtrip() {
        for symbol in ALL_SYMBOLS.chars() {
            let piece = Piece::from_symbol(symbol).unwrap();
            assert_eq!(piece.symbol(), symbol);
        }
    }

    #[test]
    fn test_symbol_classification() {
        let dark = Piece::from_symbol('e').unwrap();
        assert_eq!(dark.side(), Side::Black);
        assert_eq!(dark.kind(), Kind::Horse);
        assert!(dark.is_covered());

        let cannon = Piece::from_symbol('C').unwrap();
        assert_eq!(cannon.side(), Side::Red);
        assert_eq!(cannon.kind(), Kind::Cannon);
        assert!(!cannon.is_covered());
    }

    #[test]
    fn test_unknown_symbols_rejected() {
        for symbol in ['.', 'x', 'Z', '1', ' ', 'j'] {
            assert_eq!(Piece::from_symbol(symbol), None, "{symbol:?}");
        }
    }

    #[test]
    fn test_general_never_covered() {
        assert_eq!(Piece::covered(Side::Red, Kind::General), None);
        for kind in Kind::COVERABLE {
            assert!(Piece::covered(Side::Black, kind).is_some());
        }
    }

    #[test]
    fn test_kind_from_letter_ignores_case() {
        assert_eq!(Kind::from_letter('r'), Some(Kind::Chariot));
        assert_eq!(Kind::from_letter('R'), Some(Kind::Chariot));
        assert_eq!(Kind::from_letter('d'), None);
    }

    #[test]
    fn test_initial_counts() {
        let total: u8 = Kind::COVERABLE.iter().map(|k| k.initial_count()).sum();
        assert_eq!(total, 15);
        assert_eq!(Kind::General.initial_count(), 1);
    }
}

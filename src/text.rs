//! Reserved characters and small text helpers shared by the pipeline stages.

use crate::config::TrainerConfig;

/// Visible whitespace marker that replaces spaces during normalisation (U+2581).
pub const WS_CHAR: char = '\u{2581}';
/// UTF-8 form of [`WS_CHAR`].
pub const WS_STR: &str = "\u{2581}";

/// Marker substituted for characters outside the required alphabet (U+2585).
pub const UNK_CHAR: char = '\u{2585}';
/// UTF-8 form of [`UNK_CHAR`].
pub const UNK_STR: &str = "\u{2585}";

/// Boundary marker written wherever a meta piece occurred in a sentence.
pub const BOUNDARY_CHAR: char = '\t';
/// UTF-8 form of [`BOUNDARY_CHAR`].
pub const BOUNDARY_STR: &str = "\t";

/// Describes why a piece text cannot be stored in a model, or `None` if it can.
#[must_use]
pub fn piece_defect(piece: &str) -> Option<&'static str> {
    if piece.is_empty() {
        return Some("piece must not be empty");
    }
    if piece == UNK_STR || piece.contains(UNK_CHAR) {
        return Some("piece must not contain the unknown-character marker");
    }
    if piece.contains(' ') {
        return Some("piece must not contain a raw space");
    }
    if piece.contains('\0') {
        return Some("piece must not contain NUL");
    }
    None
}

/// Returns `true` when `piece` may be proposed by a learner as a candidate piece.
///
/// The piece must be non-empty and at most `max_piece_length` characters
/// long. It must not contain the unknown-character marker, NUL, the meta
/// piece boundary or a raw space, and [`WS_CHAR`] may only appear as its
/// first character.
#[must_use]
pub fn is_valid_piece(piece: &str, cfg: &TrainerConfig) -> bool {
    if piece.is_empty() {
        return false;
    }
    for (pos, c) in piece.chars().enumerate() {
        if pos >= cfg.max_piece_length {
            return false;
        }
        match c {
            UNK_CHAR | '\0' | BOUNDARY_CHAR | ' ' => return false,
            WS_CHAR if pos > 0 => return false,
            _ => {}
        }
    }
    true
}

/// Splits a normalised sentence into words, each starting at a [`WS_CHAR`].
///
/// Boundary markers separate words as well and are dropped from the output.
pub fn split_into_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(BOUNDARY_CHAR).flat_map(|segment| {
        let mut starts: Vec<usize> = segment
            .char_indices()
            .filter(|&(idx, c)| c == WS_CHAR && idx > 0)
            .map(|(idx, _)| idx)
            .collect();
        starts.insert(0, 0);
        starts.push(segment.len());
        starts
            .windows(2)
            .map(|w| &segment[w[0]..w[1]])
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_defects_are_reported() {
        assert_eq!(piece_defect("a"), None);
        assert_eq!(piece_defect("\u{2581}abc"), None);
        assert!(piece_defect("").is_some());
        assert!(piece_defect("a b").is_some());
        assert!(piece_defect(UNK_STR).is_some());
        assert!(piece_defect("x\u{2585}").is_some());
    }

    fn limits(max_piece_length: usize) -> TrainerConfig {
        TrainerConfig {
            max_piece_length,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn valid_pieces_are_accepted() {
        let cfg = limits(16);
        assert!(is_valid_piece("a", &cfg));
        assert!(is_valid_piece("\u{2581}", &cfg));
        assert!(is_valid_piece("\u{2581}apple", &cfg));
    }

    #[test]
    fn long_pieces_are_rejected() {
        let cfg = limits(4);
        assert!(is_valid_piece("abcd", &cfg));
        assert!(!is_valid_piece("abcde", &cfg));
        assert!(is_valid_piece("\u{2581}\u{e9}\u{e9}\u{e9}", &cfg));
    }

    #[test]
    fn reserved_characters_are_rejected() {
        let cfg = limits(16);
        assert!(!is_valid_piece("", &cfg));
        assert!(!is_valid_piece("a\u{2585}", &cfg));
        assert!(!is_valid_piece("a\0", &cfg));
        assert!(!is_valid_piece("a\tb", &cfg));
        assert!(!is_valid_piece("a b", &cfg));
    }

    #[test]
    fn whitespace_marker_only_leads() {
        let cfg = limits(16);
        assert!(!is_valid_piece("a\u{2581}", &cfg));
        assert!(!is_valid_piece("\u{2581}\u{2581}", &cfg));
        assert!(!is_valid_piece("a\u{2581}b", &cfg));
    }

    #[test]
    fn words_split_before_whitespace_marker() {
        let words: Vec<&str> = split_into_words("\u{2581}I\u{2581}have\u{2581}a").collect();
        assert_eq!(words, vec!["\u{2581}I", "\u{2581}have", "\u{2581}a"]);
    }

    #[test]
    fn boundary_marker_separates_words() {
        let words: Vec<&str> = split_into_words("\u{2581}foo\tbar").collect();
        assert_eq!(words, vec!["\u{2581}foo", "bar"]);
    }
}

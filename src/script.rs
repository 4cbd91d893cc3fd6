//! Script classification for Japanese text
//!
//! Character-level predicates over the Unicode blocks that matter for
//! furigana detection. Anything outside the three blocks (punctuation,
//! Latin, full-width digits) answers `false` to every predicate.

/// Hiragana block (U+3040 - U+309F)
const HIRAGANA: (char, char) = ('\u{3040}', '\u{309F}');

/// Katakana block (U+30A0 - U+30FF)
const KATAKANA: (char, char) = ('\u{30A0}', '\u{30FF}');

/// CJK unified ideographs as used for kanji (U+4E00 - U+9FAF)
const KANJI: (char, char) = ('\u{4E00}', '\u{9FAF}');

#[inline]
fn in_block(ch: char, block: (char, char)) -> bool {
    block.0 <= ch && ch <= block.1
}

/// Check if a character is hiragana
pub fn is_hiragana(ch: char) -> bool {
    in_block(ch, HIRAGANA)
}

/// Check if a character is katakana
pub fn is_katakana(ch: char) -> bool {
    in_block(ch, KATAKANA)
}

/// Check if a character is kanji
pub fn is_kanji(ch: char) -> bool {
    in_block(ch, KANJI)
}

/// Hiragana or katakana, and never kanji
pub fn is_kana_like(ch: char) -> bool {
    (is_hiragana(ch) || is_katakana(ch)) && !is_kanji(ch)
}

/// True when every character of `text` is kana-like.
///
/// Empty text is not kana: a symbol with no characters carries no reading.
pub fn is_kana_text(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_kana_like)
}

//! Char-offset helpers. Caret offsets are counted in Unicode scalar values,
//! string slicing needs byte indices.

/// Number of chars in `text`
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the char at `offset`, clamped to the end of `text`
pub(crate) fn byte_index(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

/// Split `text` at a char offset (clamped)
pub(crate) fn split_at_char(text: &str, offset: usize) -> (&str, &str) {
    text.split_at(byte_index(text, offset))
}

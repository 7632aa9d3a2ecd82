//! Netlist line tokenizer.
//!
//! A [`Cursor`] walks one logical netlist line. Tokens are separated by
//! whitespace, `=` and `,`; parentheses stay inside tokens so that
//! `poly(2)` and `v(1)` arrive whole. The cursor position can be saved and
//! restored, which is how callers peek for model names without consuming.

use crate::units::parse_value;

fn is_delim(c: char) -> bool {
    c.is_whitespace() || c == '=' || c == ','
}

/// Position-tracking token reader over a single line.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// Byte offset into the line.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Return to an earlier position.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.text.len());
    }

    /// Unread text from the current position.
    pub fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Skip `n` bytes of raw text.
    pub fn advance(&mut self, n: usize) {
        self.set_position(self.pos + n);
    }

    fn delims_end(&self, from: usize) -> usize {
        self.text[from..]
            .char_indices()
            .find(|&(_, c)| !is_delim(c))
            .map_or(self.text.len(), |(i, _)| from + i)
    }

    fn token_end(&self, from: usize) -> usize {
        self.text[from..]
            .char_indices()
            .find(|&(_, c)| is_delim(c))
            .map_or(self.text.len(), |(i, _)| from + i)
    }

    /// Skip whitespace, `=` and `,`.
    pub fn skip_delims(&mut self) {
        self.pos = self.delims_end(self.pos);
    }

    /// Skip whitespace only.
    pub fn skip_blanks(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    /// True when only delimiters remain.
    pub fn at_end(&self) -> bool {
        self.delims_end(self.pos) == self.text.len()
    }

    /// Read the next token.
    pub fn next_token(&mut self) -> Option<&'a str> {
        let start = self.delims_end(self.pos);
        if start == self.text.len() {
            self.pos = start;
            return None;
        }
        let end = self.token_end(start);
        self.pos = end;
        Some(&self.text[start..end])
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&self) -> Option<&'a str> {
        self.clone().next_token()
    }

    /// The first non-blank character following the next token, if any.
    ///
    /// Only whitespace is skipped, so `v = 1` reports `=` and `v (1)`
    /// reports `(`.
    pub fn char_after_token(&self) -> Option<char> {
        let mut ahead = self.clone();
        ahead.next_token()?;
        ahead.rest().trim_start().chars().next()
    }

    /// Next non-blank raw character at the cursor.
    pub fn peek_char(&self) -> Option<char> {
        self.rest().trim_start().chars().next()
    }

    /// Read the next token as a value. Nothing is consumed on failure.
    pub fn next_value(&mut self) -> Option<f64> {
        let mut ahead = self.clone();
        let value = parse_value(ahead.next_token()?)?;
        *self = ahead;
        Some(value)
    }

    /// Whether the next token parses as a value.
    pub fn peek_is_value(&self) -> bool {
        self.clone().next_value().is_some()
    }

    /// Read the next token if it matches `word` case-insensitively.
    pub fn accept(&mut self, word: &str) -> bool {
        match self.peek_token() {
            Some(tok) if tok.eq_ignore_ascii_case(word) => {
                self.next_token();
                true
            }
            _ => false,
        }
    }

    /// Count the remaining tokens.
    pub fn remaining_tokens(&self) -> usize {
        let mut ahead = self.clone();
        let mut n = 0;
        while ahead.next_token().is_some() {
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_split_on_delimiters() {
        let mut c = Cursor::new("V1 1 0 dc=5, ac 1");
        let toks: Vec<_> = std::iter::from_fn(|| c.next_token()).collect();
        assert_eq!(toks, vec!["V1", "1", "0", "dc", "5", "ac", "1"]);
    }

    #[test]
    fn test_parentheses_stay_in_token() {
        let mut c = Cursor::new("G1 3 0 poly(1) 1 2");
        c.next_token();
        c.next_token();
        c.next_token();
        assert_eq!(c.next_token(), Some("poly(1)"));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut c = Cursor::new("a b");
        assert_eq!(c.peek_token(), Some("a"));
        assert_eq!(c.next_token(), Some("a"));
        assert_eq!(c.peek_token(), Some("b"));
    }

    #[test]
    fn test_next_value_restores_on_failure() {
        let mut c = Cursor::new("1k model");
        assert_eq!(c.next_value(), Some(1000.0));
        let pos = c.position();
        assert_eq!(c.next_value(), None);
        assert_eq!(c.position(), pos);
        assert_eq!(c.next_token(), Some("model"));
    }

    #[test]
    fn test_char_after_token() {
        assert_eq!(Cursor::new("v (1)").char_after_token(), Some('('));
        assert_eq!(Cursor::new("v = 2").char_after_token(), Some('='));
        assert_eq!(Cursor::new("v)").char_after_token(), None);
        assert_eq!(Cursor::new("v").char_after_token(), None);
    }

    #[test]
    fn test_save_and_restore() {
        let mut c = Cursor::new("x y z");
        c.next_token();
        let save = c.position();
        c.next_token();
        c.next_token();
        assert!(c.at_end());
        c.set_position(save);
        assert_eq!(c.remaining_tokens(), 2);
    }
}

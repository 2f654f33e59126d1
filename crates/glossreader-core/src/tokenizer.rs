//! Whitespace-preserving tokenizer.
//!
//! Text is split into alternating runs of content and whitespace. The
//! whitespace runs are kept as tokens of their own so the concatenation of
//! every token reproduces the input byte for byte, and token indices stay
//! stable for as long as the source text does.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Classification of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TokenKind {
    /// Any run of non-whitespace characters.
    Word,
    /// A whitespace run without line breaks.
    Space,
    /// A whitespace run containing at least one line break.
    Newline,
}

/// One addressable fragment of the document. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    text: String,
    kind: TokenKind,
}

impl Token {
    /// Build a token from a fragment, classifying it by content.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        debug_assert!(!text.is_empty(), "tokens are never empty");
        let kind = classify(&text);
        Self { text, kind }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn is_whitespace(&self) -> bool {
        !matches!(self.kind, TokenKind::Word)
    }

    pub fn has_newline(&self) -> bool {
        matches!(self.kind, TokenKind::Newline)
    }

    /// Length in Unicode scalar values, the unit speech engines report.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Token::new(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split `text` into content and whitespace runs.
///
/// `join_tokens(&tokenize(s)) == s` holds for every input.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run_start = 0usize;
    let mut run_is_space: Option<bool> = None;

    for (pos, ch) in text.char_indices() {
        let is_space = ch.is_whitespace();
        match run_is_space {
            Some(current) if current != is_space => {
                tokens.push(Token::new(&text[run_start..pos]));
                run_start = pos;
                run_is_space = Some(is_space);
            }
            None => run_is_space = Some(is_space),
            _ => {}
        }
    }

    if run_start < text.len() {
        tokens.push(Token::new(&text[run_start..]));
    }

    tokens
}

/// Concatenate a token slice back into text.
pub fn join_tokens(tokens: &[Token]) -> String {
    let capacity = tokens.iter().map(|token| token.text.len()).sum();
    let mut out = String::with_capacity(capacity);
    for token in tokens {
        out.push_str(&token.text);
    }
    out
}

fn classify(text: &str) -> TokenKind {
    if !text.chars().all(char::is_whitespace) {
        TokenKind::Word
    } else if text.contains(['\n', '\r']) {
        TokenKind::Newline
    } else {
        TokenKind::Space
    }
}

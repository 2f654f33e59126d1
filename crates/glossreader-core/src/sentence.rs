//! Sentence boundary resolution over a token sequence.
//!
//! A sentence ends at a line break or at a word ending in `.`, `!` or `?`
//! (optionally followed by closing quotes or parentheses), unless that word is
//! a known abbreviation such as `Mr.` or `etc.`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::tokenizer::Token;

static RE_TERMINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[.!?]['"”’)]*$"#).unwrap());
static RE_TRAILING_CLOSERS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"”’)]+$"#).unwrap());
static DEFAULT_RESOLVER: Lazy<SentenceResolver> = Lazy::new(SentenceResolver::default);

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
    "inc.", "ltd.", "co.", "corp.", "mt.", "no.", "fig.", "approx.", "dept.", "est.", "sra.",
    "srta.", "ud.", "uds.", "z.b.", "bzw.", "ca.", "usw.", "mme.", "mlle.", "av.", "p.ej.",
];

/// Inclusive token bounds of one sentence.
pub type SentenceRange = (usize, usize);

/// Sentence boundary resolver with a configurable abbreviation table.
#[derive(Debug, Clone)]
pub struct SentenceResolver {
    abbreviations: HashSet<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
struct AbbreviationFile {
    extra: Vec<String>,
    disabled: Vec<String>,
}

impl Default for SentenceResolver {
    fn default() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|entry| entry.to_string())
                .collect(),
        }
    }
}

impl SentenceResolver {
    /// Load the built-in table merged with `extra`/`disabled` lists from a
    /// TOML file. A missing or invalid file leaves the built-ins in place.
    pub fn load(path: &Path) -> Self {
        let mut resolver = Self::default();
        let file = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AbbreviationFile>(&contents) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(path = %path.display(), "Invalid abbreviations TOML: {err}");
                    return resolver;
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    "Falling back to built-in abbreviations: {err}"
                );
                return resolver;
            }
        };

        for entry in file.disabled.iter().filter_map(|raw| normalize_entry(raw)) {
            resolver.abbreviations.remove(&entry);
        }
        for entry in file.extra.iter().filter_map(|raw| normalize_entry(raw)) {
            resolver.abbreviations.insert(entry);
        }
        tracing::info!(
            path = %path.display(),
            count = resolver.abbreviations.len(),
            "Loaded abbreviation table"
        );
        resolver
    }

    pub fn is_abbreviation(&self, word: &str) -> bool {
        let stripped = RE_TRAILING_CLOSERS.replace(word, "");
        self.abbreviations.contains(&stripped.to_lowercase())
    }

    /// True when `token` closes a sentence.
    pub fn is_boundary(&self, token: &Token) -> bool {
        if token.has_newline() {
            return true;
        }
        if token.is_whitespace() {
            return false;
        }
        RE_TERMINAL.is_match(token.as_str()) && !self.is_abbreviation(token.as_str())
    }

    /// Inclusive bounds of the sentence containing `index`, trimmed of
    /// whitespace at both ends. `None` when the sentence holds no content
    /// (empty or all-whitespace input) or `index` is out of range.
    pub fn sentence_range(&self, index: usize, tokens: &[Token]) -> Option<SentenceRange> {
        if index >= tokens.len() {
            return None;
        }

        let mut start = 0usize;
        for i in (0..index).rev() {
            if self.is_boundary(&tokens[i]) {
                start = i + 1;
                break;
            }
        }

        let mut end = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate().skip(index) {
            if token.has_newline() {
                // The break itself belongs to neither sentence.
                if i == 0 {
                    return None;
                }
                end = i - 1;
                break;
            }
            if self.is_boundary(token) {
                end = i;
                break;
            }
        }

        while start <= end && tokens[start].is_whitespace() {
            start += 1;
        }
        while end > start && tokens[end].is_whitespace() {
            end -= 1;
        }
        if start > end || tokens[start].is_whitespace() {
            return None;
        }
        Some((start, end))
    }

    /// Sentence bounds covering every index in `first..=last`.
    pub fn span_range(&self, first: usize, last: usize, tokens: &[Token]) -> Option<SentenceRange> {
        let start = self
            .sentence_range(first, tokens)
            .map(|(start, _)| start)
            .unwrap_or(first);
        let end = self
            .sentence_range(last, tokens)
            .map(|(_, end)| end)
            .unwrap_or(last);
        (start <= end).then_some((start, end))
    }
}

/// `sentence_range` with the built-in abbreviation table.
pub fn sentence_range(index: usize, tokens: &[Token]) -> Option<SentenceRange> {
    DEFAULT_RESOLVER.sentence_range(index, tokens)
}

fn normalize_entry(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.ends_with('.') {
        Some(trimmed)
    } else {
        Some(format!("{trimmed}."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn tokens(parts: &[&str]) -> Vec<Token> {
        parts.iter().map(|part| Token::new(*part)).collect()
    }

    #[test]
    fn abbreviation_does_not_end_sentence() {
        let toks = tokens(&["Hello", " ", "Mr.", " ", "Smith", ".", " ", "Next", "."]);
        assert_eq!(sentence_range(4, &toks), Some((0, 5)));
    }

    #[test]
    fn basic_sentence_from_first_word() {
        let toks = tokens(&["Hello", " ", "world", ".", " ", "Next", " ", "sentence", "."]);
        assert_eq!(sentence_range(2, &toks), Some((0, 3)));
        assert_eq!(sentence_range(7, &toks), Some((5, 8)));
    }

    #[test]
    fn mid_document_sentence_is_trimmed() {
        let toks = tokens(&[
            "First", ".", " ", "Second", " ", "sentence", ".", " ", "Third", ".",
        ]);
        assert_eq!(sentence_range(5, &toks), Some((3, 6)));
    }

    #[test]
    fn newline_breaks_sentences_without_punctuation() {
        let toks = tokenize("A title\nBody text here");
        // ["A"," ","title","\n","Body"," ","text"," ","here"]
        assert_eq!(sentence_range(0, &toks), Some((0, 2)));
        assert_eq!(sentence_range(6, &toks), Some((4, 8)));
    }

    #[test]
    fn closing_quotes_after_terminal_punctuation_still_close() {
        let toks = tokenize("He said “stop.” Then ran.");
        let last = toks.len() - 1;
        assert_eq!(sentence_range(0, &toks), Some((0, 4)));
        assert_eq!(sentence_range(last, &toks), Some((6, last)));
    }

    #[test]
    fn quoted_abbreviation_is_still_an_abbreviation() {
        let resolver = SentenceResolver::default();
        assert!(resolver.is_abbreviation("etc.”"));
        assert!(resolver.is_abbreviation("Dr."));
        assert!(!resolver.is_abbreviation("end."));
    }

    #[test]
    fn text_end_closes_open_sentence() {
        let toks = tokenize("no punctuation at all");
        assert_eq!(sentence_range(2, &toks), Some((0, toks.len() - 1)));
    }

    #[test]
    fn empty_and_whitespace_only_inputs_have_no_range() {
        assert_eq!(sentence_range(0, &[]), None);
        let toks = tokenize("   \n  ");
        for idx in 0..toks.len() {
            assert_eq!(sentence_range(idx, &toks), None);
        }
    }

    #[test]
    fn span_range_covers_both_ends() {
        let toks = tokenize("One two. Three four. Five.");
        // "two." is index 2, "Three" is index 4
        assert_eq!(
            SentenceResolver::default().span_range(2, 4, &toks),
            Some((0, 6))
        );
    }

    #[test]
    fn load_merges_extra_and_disabled_entries() {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("glossreader-abbrev-{nonce}.toml"));
        fs::write(&path, "extra = [\"Capt\", \"gen.\"]\ndisabled = [\"no.\"]\n")
            .expect("write abbreviation file");

        let resolver = SentenceResolver::load(&path);
        assert!(resolver.is_abbreviation("Capt."));
        assert!(resolver.is_abbreviation("Gen."));
        assert!(!resolver.is_abbreviation("No."));
        assert!(resolver.is_abbreviation("Mr."));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_falls_back_to_builtins() {
        let resolver = SentenceResolver::load(Path::new("/nonexistent/abbreviations.toml"));
        assert!(resolver.is_abbreviation("vs."));
    }
}

//! Offline translation backend driven by a TOML word list.
//!
//! `conf/glossary.toml` maps lowercase words to translations and may carry
//! canned practice texts keyed by prompt. Words missing from the list are
//! echoed back bracketed with the target language so gaps stay visible.

use anyhow::{Result, bail};
use glossreader_core::translation::{
    GrammarInfo, RichDetailResult, SegmentRequest, TextGenerator, TranslationService,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct GlossaryFile {
    words: HashMap<String, String>,
    samples: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct GlossaryTranslator {
    words: HashMap<String, String>,
    samples: HashMap<String, String>,
}

impl GlossaryTranslator {
    /// Load the glossary. A missing or invalid file yields an empty glossary.
    pub fn load(path: &Path) -> Self {
        let file = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<GlossaryFile>(&contents) {
                Ok(file) => file,
                Err(err) => {
                    warn!(path = %path.display(), "Invalid glossary TOML: {err}");
                    return Self::default();
                }
            },
            Err(err) => {
                warn!(path = %path.display(), "Glossary unavailable: {err}");
                return Self::default();
            }
        };
        let translator = Self {
            words: file
                .words
                .into_iter()
                .map(|(word, translation)| (word.trim().to_lowercase(), translation))
                .collect(),
            samples: file
                .samples
                .into_iter()
                .map(|(prompt, text)| (prompt.trim().to_lowercase(), text))
                .collect(),
        };
        info!(
            path = %path.display(),
            words = translator.words.len(),
            samples = translator.samples.len(),
            "Loaded glossary"
        );
        translator
    }

    fn translate_word(&self, word: &str, target: &str) -> String {
        let start = word
            .find(|ch: char| ch.is_alphanumeric())
            .unwrap_or(word.len());
        let end = word
            .rfind(|ch: char| ch.is_alphanumeric())
            .map(|idx| idx + word[idx..].chars().next().map_or(1, char::len_utf8))
            .unwrap_or(start);
        if start >= end {
            return word.to_string();
        }
        let core = &word[start..end];
        let translated = self
            .words
            .get(&core.to_lowercase())
            .cloned()
            .unwrap_or_else(|| format!("[{core}:{target}]"));
        format!("{}{translated}{}", &word[..start], &word[end..])
    }
}

impl TranslationService for GlossaryTranslator {
    fn translate_segment(&self, request: &SegmentRequest) -> Result<String> {
        Ok(request
            .text
            .split_whitespace()
            .map(|word| self.translate_word(word, &request.target_lang))
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn rich_analyze(&self, request: &SegmentRequest) -> Result<RichDetailResult> {
        let translation = self.translate_segment(request)?;
        let known = request
            .text
            .split_whitespace()
            .filter(|word| {
                let core = word.trim_matches(|ch: char| !ch.is_alphanumeric());
                self.words.contains_key(&core.to_lowercase())
            })
            .count();
        Ok(RichDetailResult {
            translation,
            segment: request.text.clone(),
            grammar: GrammarInfo {
                part_of_speech: "unknown".to_string(),
                explanation: format!(
                    "{known} of {} words found in the offline glossary.",
                    request.text.split_whitespace().count()
                ),
                ..GrammarInfo::default()
            },
            examples: Vec::new(),
            alternatives: Vec::new(),
        })
    }

    fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec!["offline-glossary".to_string()])
    }

    fn health_check(&self) -> bool {
        !self.words.is_empty()
    }
}

impl TextGenerator for GlossaryTranslator {
    fn generate(&self, prompt: &str) -> Result<String> {
        match self.samples.get(&prompt.trim().to_lowercase()) {
            Some(text) => Ok(text.clone()),
            None => bail!("no sample text for prompt {prompt:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossreader_core::translation::LanguagePair;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn glossary() -> GlossaryTranslator {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("glossreader-glossary-{nonce}.toml"));
        fs::write(
            &path,
            r#"
[words]
hola = "hello"
Mundo = "world"

[samples]
"Greeting" = "Hola mundo."
"#,
        )
        .expect("write glossary");
        let glossary = GlossaryTranslator::load(&path);
        let _ = fs::remove_file(&path);
        glossary
    }

    fn request(text: &str) -> SegmentRequest {
        SegmentRequest::new(text, None, &LanguagePair::new("es", "en"))
    }

    #[test]
    fn known_words_translate_and_punctuation_survives() {
        let glossary = glossary();
        let text = glossary
            .translate_segment(&request("¡Hola, mundo!"))
            .expect("translate");
        assert_eq!(text, "¡hello, world!");
    }

    #[test]
    fn unknown_words_echo_with_target_language() {
        let glossary = glossary();
        let text = glossary
            .translate_segment(&request("hola gato"))
            .expect("translate");
        assert_eq!(text, "hello [gato:en]");
    }

    #[test]
    fn rich_analysis_reports_coverage() {
        let detail = glossary()
            .rich_analyze(&request("hola gato"))
            .expect("analyze");
        assert_eq!(detail.segment, "hola gato");
        assert!(detail.grammar.explanation.starts_with("1 of 2"));
    }

    #[test]
    fn samples_are_keyed_case_insensitively() {
        let glossary = glossary();
        assert_eq!(glossary.generate("greeting").expect("sample"), "Hola mundo.");
        assert!(glossary.generate("poem").is_err());
    }

    #[test]
    fn missing_glossary_is_empty_and_unhealthy() {
        let glossary =
            GlossaryTranslator::load(&std::env::temp_dir().join("glossreader-no-glossary.toml"));
        assert!(!glossary.health_check());
    }
}

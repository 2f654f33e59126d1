//! Interfaces of the external AI collaborators and the data they exchange.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Language code meaning "let the service detect the source language".
pub const AUTO_LANGUAGE: &str = "auto";

/// Source and target language of the current reading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Source language to send to the service; `None` for auto-detect.
    pub fn source_hint(&self) -> Option<String> {
        let source = self.source.trim();
        if source.is_empty() || source.eq_ignore_ascii_case(AUTO_LANGUAGE) {
            None
        } else {
            Some(source.to_string())
        }
    }
}

/// Arguments shared by `translate_segment` and `rich_analyze`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub text: String,
    pub target_lang: String,
    pub context: Option<String>,
    pub source_lang: Option<String>,
}

impl SegmentRequest {
    pub fn new(text: impl Into<String>, context: Option<String>, languages: &LanguagePair) -> Self {
        Self {
            text: text.into(),
            target_lang: languages.target.clone(),
            context: context.filter(|ctx| !ctx.trim().is_empty()),
            source_lang: languages.source_hint(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GrammarInfo {
    pub part_of_speech: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub tense: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub infinitive: Option<String>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UsageExample {
    pub sentence: String,
    pub translation: String,
}

/// Structured deep-analysis result shown in a rich detail tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RichDetailResult {
    pub translation: String,
    pub segment: String,
    pub grammar: GrammarInfo,
    #[serde(default)]
    pub examples: Vec<UsageExample>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Translation backend. Calls block; the worker runs them off the owner's
/// thread.
pub trait TranslationService: Send + Sync {
    fn translate_segment(&self, request: &SegmentRequest) -> Result<String>;
    fn rich_analyze(&self, request: &SegmentRequest) -> Result<RichDetailResult>;
    fn list_models(&self) -> Result<Vec<String>>;
    fn health_check(&self) -> bool;
}

/// Free-form text generation, used to produce practice reading material.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_source_is_not_sent() {
        assert_eq!(LanguagePair::new("auto", "en").source_hint(), None);
        assert_eq!(LanguagePair::new(" ", "en").source_hint(), None);
        assert_eq!(
            LanguagePair::new("de", "en").source_hint(),
            Some("de".to_string())
        );
    }

    #[test]
    fn blank_context_is_dropped() {
        let langs = LanguagePair::new("es", "en");
        let request = SegmentRequest::new("hola", Some("  ".to_string()), &langs);
        assert_eq!(request.context, None);
        assert_eq!(request.source_lang.as_deref(), Some("es"));
        assert_eq!(request.target_lang, "en");
    }

    #[test]
    fn rich_detail_parses_camel_case_grammar() {
        let json = r#"{
            "translation": "I ate",
            "segment": "comí",
            "grammar": {"partOfSpeech": "verb", "tense": "preterite", "infinitive": "comer", "explanation": "First person singular."},
            "examples": [{"sentence": "Comí pan.", "translation": "I ate bread."}]
        }"#;
        let parsed: RichDetailResult = serde_json::from_str(json).expect("valid detail json");
        assert_eq!(parsed.grammar.part_of_speech, "verb");
        assert_eq!(parsed.grammar.infinitive.as_deref(), Some("comer"));
        assert_eq!(parsed.grammar.gender, None);
        assert_eq!(parsed.examples.len(), 1);
        assert!(parsed.alternatives.is_empty());
    }
}

//! The reading session: one owner for the token sequence and every state
//! projection built on it (selection, playback, translations).
//!
//! Callers drive it with [`SessionCommand`]s, engine callbacks and a periodic
//! [`ReaderSession::tick`]. Every command answers with a fresh
//! [`ReaderSnapshot`] so a front end never has to reach into the engines.

use anyhow::{Context, Result, ensure};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::config::AppConfig;
use crate::pagination;
use crate::playback::{PlaybackState, PlaybackSynchronizer, SpeechEngine, SpeechEvent, Voice};
use crate::selection::{GroupKey, SelectionEngine, SelectionMode};
use crate::sentence::SentenceResolver;
use crate::tokenizer::{Token, TokenKind, join_tokens, tokenize};
use crate::translation::{
    DocumentView, HoverSlot, LanguagePair, RichDetailTab, TabId, TextGenerator,
    TranslationEntry, TranslationJob, TranslationOrchestrator, TranslationService,
};
use crate::worker::TranslationWorker;

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct TokenView {
    pub index: usize,
    pub text: String,
    pub kind: TokenKind,
    pub selected: bool,
    pub spoken: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct GroupView {
    pub first: usize,
    pub last: usize,
    pub text: String,
    /// `None` until the selection debounce has settled on this group.
    pub translation: Option<TranslationEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, TS)]
#[ts(export)]
pub struct PageView {
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub first_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ReaderSnapshot {
    pub languages: LanguagePair,
    pub mode: SelectionMode,
    pub page: PageView,
    pub tokens: Vec<TokenView>,
    pub selected: Vec<usize>,
    pub groups: Vec<GroupView>,
    pub selection_pending: bool,
    pub hover: Option<HoverSlot>,
    pub playback: PlaybackState,
    pub tabs: Vec<RichDetailTab>,
    pub active_tab: Option<TabId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ServiceStatus {
    pub healthy: bool,
    pub models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    GetSnapshot,
    SetMode { mode: SelectionMode },
    Toggle { index: usize },
    ClearSelection,
    Hover { index: usize },
    HoverEnd,
    Play,
    PlayFrom { index: usize },
    Pause,
    Resume,
    Stop,
    SetRate { rate: f32 },
    SetVoice { voice: Option<String> },
    PlaySingle { text: String },
    OpenDetail { text: String, context: Option<String> },
    OpenDetailForGroup { index: usize },
    CloseTab { id: TabId },
    CloseAllTabs,
    ActivateTab { id: TabId },
    RegenerateTab { id: TabId },
    SetPage { page: usize },
    NextPage,
    PrevPage,
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "reader_get_snapshot",
            Self::SetMode { .. } => "reader_set_mode",
            Self::Toggle { .. } => "reader_toggle",
            Self::ClearSelection => "reader_clear_selection",
            Self::Hover { .. } => "reader_hover",
            Self::HoverEnd => "reader_hover_end",
            Self::Play => "reader_play",
            Self::PlayFrom { .. } => "reader_play_from",
            Self::Pause => "reader_pause",
            Self::Resume => "reader_resume",
            Self::Stop => "reader_stop",
            Self::SetRate { .. } => "reader_set_rate",
            Self::SetVoice { .. } => "reader_set_voice",
            Self::PlaySingle { .. } => "reader_play_single",
            Self::OpenDetail { .. } => "reader_open_detail",
            Self::OpenDetailForGroup { .. } => "reader_open_detail_for_group",
            Self::CloseTab { .. } => "reader_close_tab",
            Self::CloseAllTabs => "reader_close_all_tabs",
            Self::ActivateTab { .. } => "reader_activate_tab",
            Self::RegenerateTab { .. } => "reader_regenerate_tab",
            Self::SetPage { .. } => "reader_set_page",
            Self::NextPage => "reader_next_page",
            Self::PrevPage => "reader_prev_page",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub action: &'static str,
    pub snapshot: ReaderSnapshot,
}

pub struct ReaderSession {
    config: AppConfig,
    text: String,
    fingerprint: String,
    tokens: Arc<[Token]>,
    resolver: Arc<SentenceResolver>,
    languages: LanguagePair,
    current_page: usize,
    selection: SelectionEngine,
    playback: PlaybackSynchronizer,
    translation: TranslationOrchestrator,
    worker: TranslationWorker,
}

impl ReaderSession {
    pub fn new(
        config: AppConfig,
        resolver: SentenceResolver,
        service: Arc<dyn TranslationService>,
        engine: Box<dyn SpeechEngine>,
    ) -> Self {
        let config = config.sanitized();
        let tokens: Arc<[Token]> = Arc::from(Vec::new());
        let resolver = Arc::new(resolver);

        let mut selection = SelectionEngine::new(Arc::clone(&tokens), Arc::clone(&resolver));
        selection.set_mode(config.default_selection_mode);
        let mut playback = PlaybackSynchronizer::new(engine, config.speech_rate, config.voice.clone());
        playback.set_tokens(Arc::clone(&tokens));

        Self {
            languages: config.languages(),
            translation: TranslationOrchestrator::new(
                config.selection_delay(),
                config.hover_delay(),
            ),
            worker: TranslationWorker::new(service, config.worker_mode),
            text: String::new(),
            fingerprint: fingerprint(""),
            tokens,
            resolver,
            current_page: 1,
            selection,
            playback,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn languages(&self) -> &LanguagePair {
        &self.languages
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        pagination::page_count(self.tokens.len(), self.config.page_size)
    }

    pub fn selection(&self) -> &SelectionEngine {
        &self.selection
    }

    pub fn playback(&self) -> &PlaybackSynchronizer {
        &self.playback
    }

    pub fn translation(&self) -> &TranslationOrchestrator {
        &self.translation
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.playback.voices()
    }

    /// Earliest moment `tick` has timer work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.translation.next_deadline()
    }

    /// Replace the reading text. Returns false when the text is identical to
    /// the current one, in which case nothing is reset.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        let fingerprint = fingerprint(&text);
        if fingerprint == self.fingerprint {
            debug!("Text unchanged; keeping session state");
            return false;
        }

        let tokens: Arc<[Token]> = tokenize(&text).into();
        self.selection.reset(Arc::clone(&tokens));
        self.playback.set_tokens(Arc::clone(&tokens));
        self.translation.clear_all();
        self.tokens = tokens;
        self.text = text;
        self.fingerprint = fingerprint;
        self.current_page = 1;
        info!(
            tokens = self.tokens.len(),
            pages = self.total_pages(),
            "Loaded reading text"
        );
        true
    }

    /// Switch languages. Cached translations no longer apply, so they are
    /// dropped along with the hover slot; tabs keep their own languages. A
    /// live selection is scheduled again for one settled batch in the new
    /// language.
    pub fn set_languages(&mut self, source: &str, target: &str, now: Instant) -> bool {
        let languages = LanguagePair::new(source.trim(), target.trim());
        if languages == self.languages {
            return false;
        }
        info!(source = %languages.source, target = %languages.target, "Changed languages");
        self.languages = languages;
        self.translation.clear_all();
        if !self.selection.is_empty() {
            self.translation.on_selection_changed(now);
        }
        true
    }

    /// Ask the generator for practice text and load it. A generator failure
    /// leaves the session untouched.
    pub fn load_generated_text(
        &mut self,
        generator: &dyn TextGenerator,
        prompt: &str,
    ) -> Result<bool> {
        let text = generator
            .generate(prompt)
            .context("Generating reading text")?;
        ensure!(!text.trim().is_empty(), "generator returned no text");
        Ok(self.set_text(text))
    }

    pub fn service_status(&self) -> ServiceStatus {
        let service = self.worker.service();
        let healthy = service.health_check();
        let models = match service.list_models() {
            Ok(models) => models,
            Err(err) => {
                warn!("Failed to list translation models: {err:#}");
                Vec::new()
            }
        };
        ServiceStatus { healthy, models }
    }

    pub fn apply_command(&mut self, command: SessionCommand, now: Instant) -> Result<SessionEvent> {
        let action = command.action();
        match command {
            SessionCommand::GetSnapshot => {}
            SessionCommand::SetMode { mode } => self.selection.set_mode(mode),
            SessionCommand::Toggle { index } => {
                self.ensure_index(index)?;
                if self.selection.toggle(index) {
                    self.translation.on_selection_changed(now);
                }
            }
            SessionCommand::ClearSelection => {
                if !self.selection.is_empty() {
                    self.selection.clear();
                    self.translation.on_selection_changed(now);
                }
            }
            SessionCommand::Hover { index } => {
                self.ensure_index(index)?;
                let page = self.page_range();
                self.translation.on_hover(index, page, now);
            }
            SessionCommand::HoverEnd => self.translation.hover_end(),
            SessionCommand::Play => self.playback.play()?,
            SessionCommand::PlayFrom { index } => self.playback.seek(index)?,
            SessionCommand::Pause => self.playback.pause(),
            SessionCommand::Resume => self.playback.resume()?,
            SessionCommand::Stop => self.playback.stop(),
            SessionCommand::SetRate { rate } => self.playback.set_rate(rate)?,
            SessionCommand::SetVoice { voice } => self.playback.set_voice(voice)?,
            SessionCommand::PlaySingle { text } => self.playback.play_single(&text)?,
            SessionCommand::OpenDetail { text, context } => {
                ensure!(!text.trim().is_empty(), "cannot analyze empty text");
                let (_, job) = self
                    .translation
                    .fetch_rich_detail(&text, context, &self.languages);
                self.submit(job);
            }
            SessionCommand::OpenDetailForGroup { index } => {
                let group = self
                    .selection
                    .group_containing(index)
                    .with_context(|| format!("no selected group contains token {index}"))?;
                let text = self.selection.group_text(group);
                let context = self.group_context(group);
                let (_, job) = self
                    .translation
                    .fetch_rich_detail(&text, context, &self.languages);
                self.submit(job);
            }
            SessionCommand::CloseTab { id } => {
                ensure!(self.translation.close_tab(id), "unknown tab {id}");
            }
            SessionCommand::CloseAllTabs => self.translation.close_all_tabs(),
            SessionCommand::ActivateTab { id } => {
                ensure!(self.translation.activate_tab(id), "unknown tab {id}");
            }
            SessionCommand::RegenerateTab { id } => {
                let job = self
                    .translation
                    .regenerate(id)
                    .with_context(|| format!("unknown tab {id}"))?;
                self.submit(job);
            }
            SessionCommand::SetPage { page } => {
                let total = self.total_pages();
                ensure!(
                    (1..=total).contains(&page),
                    "page {page} out of range 1..={total}"
                );
                self.current_page = page;
            }
            SessionCommand::NextPage => {
                self.current_page = pagination::clamp_page(
                    self.current_page + 1,
                    self.tokens.len(),
                    self.config.page_size,
                );
            }
            SessionCommand::PrevPage => {
                self.current_page = pagination::clamp_page(
                    self.current_page.saturating_sub(1),
                    self.tokens.len(),
                    self.config.page_size,
                );
            }
        }
        self.collect_outcomes();
        Ok(SessionEvent {
            action,
            snapshot: self.snapshot(),
        })
    }

    /// Fire due timers, hand new jobs to the worker, apply finished results
    /// and follow playback across pages. Returns true when anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let view = DocumentView {
            tokens: &self.tokens,
            groups: self.selection.groups(),
            resolver: &self.resolver,
            languages: &self.languages,
        };
        let jobs = self.translation.poll(now, view);
        let dispatched = !jobs.is_empty();
        for job in jobs {
            self.submit(job);
        }
        let settled = self.collect_outcomes();
        let moved = self.follow_playback();
        dispatched || settled || moved
    }

    /// Forward a speech engine callback. Returns true when the spoken word
    /// moved or playback ended.
    pub fn handle_speech_event(&mut self, event: SpeechEvent) -> bool {
        let changed = self.playback.handle_event(event);
        if changed {
            self.follow_playback();
        }
        changed
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        let range = self.page_range();
        let spoken = self.playback.state().current_word_index;
        let tokens = self.tokens[range.clone()]
            .iter()
            .enumerate()
            .map(|(offset, token)| {
                let index = range.start + offset;
                TokenView {
                    index,
                    text: token.as_str().to_string(),
                    kind: token.kind(),
                    selected: self.selection.is_selected(index),
                    spoken: spoken == Some(index),
                }
            })
            .collect();
        let groups = self
            .selection
            .groups()
            .iter()
            .map(|&key| GroupView {
                first: key.first,
                last: key.last,
                text: self.selection.group_text(key),
                translation: self.translation.entry(key).cloned(),
            })
            .collect();

        ReaderSnapshot {
            languages: self.languages.clone(),
            mode: self.selection.mode(),
            page: PageView {
                current_page: self.current_page,
                total_pages: self.total_pages(),
                page_size: self.config.page_size,
                first_index: range.start,
                end_index: range.end,
            },
            tokens,
            selected: self.selection.selected().collect(),
            groups,
            selection_pending: self.translation.selection_pending(),
            hover: self.translation.hover().cloned(),
            playback: self.playback.state().clone(),
            tabs: self.translation.tabs().iter().cloned().collect(),
            active_tab: self.translation.tabs().active_id(),
        }
    }

    fn ensure_index(&self, index: usize) -> Result<()> {
        ensure!(
            index < self.tokens.len(),
            "token index {index} out of range for {} tokens",
            self.tokens.len()
        );
        Ok(())
    }

    fn page_range(&self) -> std::ops::Range<usize> {
        pagination::page_bounds(self.current_page, self.config.page_size, self.tokens.len())
    }

    fn group_context(&self, group: GroupKey) -> Option<String> {
        self.resolver
            .span_range(group.first, group.last, &self.tokens)
            .map(|(start, end)| join_tokens(&self.tokens[start..=end]).trim().to_string())
    }

    fn submit(&self, job: TranslationJob) {
        self.worker.submit(job);
    }

    fn collect_outcomes(&mut self) -> bool {
        let mut applied = false;
        for outcome in self.worker.drain() {
            applied |= self.translation.complete(outcome);
        }
        applied
    }

    fn follow_playback(&mut self) -> bool {
        if !self.config.follow_playback {
            return false;
        }
        match self.playback.page_for(self.config.page_size) {
            Some(page) if page != self.current_page => {
                debug!(from = self.current_page, to = page, "Following playback to page");
                self.current_page = page;
                true
            }
            _ => false,
        }
    }
}

fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

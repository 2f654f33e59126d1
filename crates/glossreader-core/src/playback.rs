//! Speech playback synchronized to token indices.
//!
//! The speech engine reports progress as character offsets relative to the
//! utterance it was given. Playback always starts at a token boundary, so the
//! absolute document offset of that token is recorded as the base and every
//! boundary callback is mapped back onto the token that owns it.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::pagination;
use crate::tokenizer::{Token, join_tokens};

pub const MIN_SPEECH_RATE: f32 = 0.5;
pub const MAX_SPEECH_RATE: f32 = 2.0;

pub type UtteranceId = u64;

/// One request handed to the speech engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEventKind {
    /// The engine reached `char_index` (in chars) within the utterance text.
    Boundary { char_index: usize },
    End,
}

/// Callback from the speech engine, tagged with the utterance it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechEvent {
    pub utterance: UtteranceId,
    pub kind: SpeechEventKind,
}

/// Speech synthesis capability. Engines cannot change rate mid-utterance;
/// progress is reported back to the owner as [`SpeechEvent`]s.
pub trait SpeechEngine {
    fn speak(&mut self, utterance: &Utterance) -> Result<()>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn voices(&self) -> Vec<Voice>;
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_word_index: Option<usize>,
    pub voice: Option<String>,
    pub rate: f32,
}

pub struct PlaybackSynchronizer {
    engine: Box<dyn SpeechEngine>,
    tokens: Arc<[Token]>,
    offsets: Vec<usize>,
    state: PlaybackState,
    base_offset: usize,
    active: Option<UtteranceId>,
    auxiliary: Option<UtteranceId>,
    next_utterance: UtteranceId,
    restart_on_resume: bool,
}

impl PlaybackSynchronizer {
    pub fn new(engine: Box<dyn SpeechEngine>, rate: f32, voice: Option<String>) -> Self {
        Self {
            engine,
            tokens: Arc::from(Vec::new()),
            offsets: Vec::new(),
            state: PlaybackState {
                is_playing: false,
                is_paused: false,
                current_word_index: None,
                voice,
                rate: rate.clamp(MIN_SPEECH_RATE, MAX_SPEECH_RATE),
            },
            base_offset: 0,
            active: None,
            auxiliary: None,
            next_utterance: 0,
            restart_on_resume: false,
        }
    }

    /// Re-seat on a new token sequence. Playback is stopped and offsets are
    /// rebuilt before anything can read them.
    pub fn set_tokens(&mut self, tokens: Arc<[Token]>) {
        self.stop();
        self.offsets = cumulative_offsets(&tokens);
        self.tokens = tokens;
        debug!(tokens = self.tokens.len(), "Playback offsets rebuilt");
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn voices(&self) -> Vec<Voice> {
        self.engine.voices()
    }

    pub fn is_speaking_auxiliary(&self) -> bool {
        self.auxiliary.is_some()
    }

    /// Start speaking from `index` to the end of the document.
    pub fn seek(&mut self, index: usize) -> Result<()> {
        ensure!(
            index < self.tokens.len(),
            "seek index {index} out of range for {} tokens",
            self.tokens.len()
        );
        debug_assert_eq!(self.offsets.len(), self.tokens.len());

        self.engine.stop();
        self.auxiliary = None;
        let utterance = Utterance {
            id: self.allocate_utterance(),
            text: join_tokens(&self.tokens[index..]),
            voice: self.state.voice.clone(),
            rate: self.state.rate,
        };
        self.base_offset = self.offsets[index];
        self.active = Some(utterance.id);
        self.restart_on_resume = false;

        if let Err(err) = self.engine.speak(&utterance) {
            // keep the reading position for the next play
            let position = self.state.current_word_index;
            self.reset_state();
            self.state.current_word_index = position;
            return Err(err).context("Starting speech playback");
        }

        self.state.is_playing = true;
        self.state.is_paused = false;
        self.state.current_word_index = Some(index);
        info!(
            index,
            utterance = utterance.id,
            base_offset = self.base_offset,
            rate = self.state.rate,
            "Started playback from token"
        );
        Ok(())
    }

    /// Play from the current word, or from the start of the document.
    pub fn play(&mut self) -> Result<()> {
        if self.state.is_paused {
            return self.resume();
        }
        let start = self
            .state
            .current_word_index
            .filter(|idx| *idx < self.tokens.len())
            .unwrap_or(0);
        self.seek(start)
    }

    pub fn pause(&mut self) {
        if self.state.is_playing && !self.state.is_paused {
            self.engine.pause();
            self.state.is_paused = true;
            info!(index = ?self.state.current_word_index, "Paused playback");
        }
    }

    pub fn resume(&mut self) -> Result<()> {
        if !self.state.is_paused {
            return Ok(());
        }
        if self.restart_on_resume {
            let index = self.state.current_word_index.unwrap_or(0);
            debug!(index, "Settings changed while paused; restarting utterance");
            return self.seek(index);
        }
        self.engine.resume();
        self.state.is_paused = false;
        info!(index = ?self.state.current_word_index, "Resumed playback");
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.active.is_some() || self.auxiliary.is_some() {
            self.engine.stop();
            info!("Stopped playback");
        }
        self.reset_state();
    }

    /// Speak `text` outside the index-tracking model. Main playback is
    /// stopped so the two never overlap; the current word is left alone.
    pub fn play_single(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        self.engine.stop();
        self.active = None;
        self.state.is_playing = false;
        self.state.is_paused = false;

        let utterance = Utterance {
            id: self.allocate_utterance(),
            text: text.to_string(),
            voice: self.state.voice.clone(),
            rate: self.state.rate,
        };
        self.auxiliary = Some(utterance.id);
        debug!(utterance = utterance.id, chars = text.len(), "Playing excerpt");
        if let Err(err) = self.engine.speak(&utterance) {
            self.auxiliary = None;
            return Err(err).context("Playing excerpt");
        }
        Ok(())
    }

    /// Change the rate. A running utterance is restarted from the current
    /// word because engines cannot apply the new rate in place.
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        let clamped = rate.clamp(MIN_SPEECH_RATE, MAX_SPEECH_RATE);
        if (clamped - self.state.rate).abs() <= f32::EPSILON {
            return Ok(());
        }
        self.state.rate = clamped;
        info!(rate = clamped, "Adjusted speech rate");
        self.restart_if_playing()
    }

    pub fn set_voice(&mut self, voice: Option<String>) -> Result<()> {
        if self.state.voice == voice {
            return Ok(());
        }
        info!(voice = ?voice, "Changed voice");
        self.state.voice = voice;
        self.restart_if_playing()
    }

    /// Apply an engine callback. Returns true when the current word moved or
    /// playback ended. Events for superseded utterances are ignored.
    pub fn handle_event(&mut self, event: SpeechEvent) -> bool {
        if self.auxiliary == Some(event.utterance) {
            if event.kind == SpeechEventKind::End {
                self.auxiliary = None;
            }
            return false;
        }
        if self.active != Some(event.utterance) {
            debug!(utterance = event.utterance, "Ignoring stale speech event");
            return false;
        }

        match event.kind {
            SpeechEventKind::Boundary { char_index } => {
                let absolute = self.base_offset + char_index;
                let Some(index) = self.token_at_char(absolute) else {
                    warn!(absolute, "Boundary outside of token offsets");
                    return false;
                };
                if self.state.current_word_index == Some(index) {
                    return false;
                }
                self.state.current_word_index = Some(index);
                true
            }
            SpeechEventKind::End => {
                info!("Playback reached end of utterance");
                self.reset_state();
                true
            }
        }
    }

    /// Largest token index whose start offset does not exceed `absolute`.
    pub fn token_at_char(&self, absolute: usize) -> Option<usize> {
        token_at_char(&self.offsets, absolute)
    }

    /// Page the UI should show to follow playback, or `None` when navigation
    /// should be left to the user.
    pub fn page_for(&self, page_size: usize) -> Option<usize> {
        if !self.state.is_playing {
            return None;
        }
        self.state
            .current_word_index
            .map(|index| pagination::page_of(index, page_size))
    }

    fn restart_if_playing(&mut self) -> Result<()> {
        if !self.state.is_playing {
            return Ok(());
        }
        if self.state.is_paused {
            self.restart_on_resume = true;
            return Ok(());
        }
        let index = self.state.current_word_index.unwrap_or(0);
        self.seek(index)
    }

    fn reset_state(&mut self) {
        self.active = None;
        self.auxiliary = None;
        self.base_offset = 0;
        self.restart_on_resume = false;
        self.state.is_playing = false;
        self.state.is_paused = false;
        self.state.current_word_index = None;
    }

    fn allocate_utterance(&mut self) -> UtteranceId {
        self.next_utterance = self.next_utterance.wrapping_add(1);
        self.next_utterance
    }
}

/// `offsets[i]` is the char count of `tokens[..i]`.
pub fn cumulative_offsets(tokens: &[Token]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(tokens.len());
    let mut total = 0usize;
    for token in tokens {
        offsets.push(total);
        total += token.char_len();
    }
    offsets
}

pub fn token_at_char(offsets: &[usize], absolute: usize) -> Option<usize> {
    offsets
        .partition_point(|offset| *offset <= absolute)
        .checked_sub(1)
}

//! Speech engine for terminals: nothing is voiced, but word boundaries are
//! scheduled at a reading pace so playback tracking behaves as it would with
//! a real synthesizer.

use anyhow::Result;
use glossreader_core::playback::{SpeechEngine, SpeechEvent, SpeechEventKind, Utterance, Voice};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const BASE_WPM: f64 = 170.0;

#[derive(Debug, Default)]
pub struct SpeechQueue {
    pending: VecDeque<(Instant, SpeechEvent)>,
    paused_at: Option<Instant>,
}

impl SpeechQueue {
    /// Events whose time has come, in order. Nothing is released while
    /// paused.
    pub fn due(&mut self, now: Instant) -> Vec<SpeechEvent> {
        if self.paused_at.is_some() {
            return Vec::new();
        }
        let mut events = Vec::new();
        while let Some((at, _)) = self.pending.front() {
            if *at > now {
                break;
            }
            if let Some((_, event)) = self.pending.pop_front() {
                events.push(event);
            }
        }
        events
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.paused_at = None;
    }
}

pub type SharedSpeechQueue = Rc<RefCell<SpeechQueue>>;

pub struct ConsoleSpeech {
    queue: SharedSpeechQueue,
}

impl ConsoleSpeech {
    pub fn new(queue: SharedSpeechQueue) -> Self {
        Self { queue }
    }
}

impl SpeechEngine for ConsoleSpeech {
    fn speak(&mut self, utterance: &Utterance) -> Result<()> {
        let now = Instant::now();
        let interval = Duration::from_secs_f64(60.0 / (BASE_WPM * f64::from(utterance.rate)));
        let mut queue = self.queue.borrow_mut();
        queue.clear();

        let mut words = 0u32;
        let mut previous_blank = true;
        for (char_index, ch) in utterance.text.chars().enumerate() {
            let blank = ch.is_whitespace();
            if previous_blank && !blank {
                queue.pending.push_back((
                    now + interval * words,
                    SpeechEvent {
                        utterance: utterance.id,
                        kind: SpeechEventKind::Boundary { char_index },
                    },
                ));
                words += 1;
            }
            previous_blank = blank;
        }
        queue.pending.push_back((
            now + interval * words,
            SpeechEvent {
                utterance: utterance.id,
                kind: SpeechEventKind::End,
            },
        ));

        let preview: String = utterance.text.chars().take(60).collect();
        info!(
            utterance = utterance.id,
            voice = ?utterance.voice,
            rate = utterance.rate,
            words,
            "Speaking: {}",
            preview.trim()
        );
        Ok(())
    }

    fn pause(&mut self) {
        let mut queue = self.queue.borrow_mut();
        if queue.paused_at.is_none() {
            queue.paused_at = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        let mut queue = self.queue.borrow_mut();
        if let Some(paused_at) = queue.paused_at.take() {
            let held = paused_at.elapsed();
            for (at, _) in queue.pending.iter_mut() {
                *at += held;
            }
            debug!(held_ms = held.as_millis() as u64, "Shifted speech schedule");
        }
    }

    fn stop(&mut self) {
        self.queue.borrow_mut().clear();
    }

    fn voices(&self) -> Vec<Voice> {
        vec![Voice {
            id: "console".to_string(),
            name: "Console".to_string(),
            lang: "und".to_string(),
        }]
    }
}

//! Token selection with word and sentence granularity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use ts_rs::TS;

use crate::sentence::SentenceResolver;
use crate::tokenizer::{Token, join_tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SelectionMode {
    #[default]
    Word,
    Sentence,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SelectionMode::Word => "word",
            SelectionMode::Sentence => "sentence",
        };
        write!(f, "{}", label)
    }
}

/// Identifies a maximal contiguous run of selected tokens. Also the
/// translation cache key for that run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct GroupKey {
    pub first: usize,
    pub last: usize,
}

impl GroupKey {
    pub fn contains(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }
}

/// Selected token indices over one token sequence.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    tokens: Arc<[Token]>,
    resolver: Arc<SentenceResolver>,
    selected: BTreeSet<usize>,
    mode: SelectionMode,
    groups: Vec<GroupKey>,
    revision: u64,
}

impl SelectionEngine {
    pub fn new(tokens: Arc<[Token]>, resolver: Arc<SentenceResolver>) -> Self {
        Self {
            tokens,
            resolver,
            selected: BTreeSet::new(),
            mode: SelectionMode::default(),
            groups: Vec::new(),
            revision: 0,
        }
    }

    /// Re-seat the engine on a new token sequence. All indices from the
    /// previous sequence are dropped.
    pub fn reset(&mut self, tokens: Arc<[Token]>) {
        self.tokens = tokens;
        self.selected.clear();
        self.commit();
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        if self.mode != mode {
            debug!(%mode, "Selection mode changed");
            self.mode = mode;
        }
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn selected(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().copied()
    }

    /// Bumped on every committed change; observers diff against it.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn tokens(&self) -> &Arc<[Token]> {
        &self.tokens
    }

    /// Toggle `index` under the current mode. Returns true when the
    /// selection changed.
    pub fn toggle(&mut self, index: usize) -> bool {
        self.toggle_with(index, self.mode)
    }

    pub fn toggle_with(&mut self, index: usize, mode: SelectionMode) -> bool {
        if index >= self.tokens.len() {
            debug_assert!(false, "toggle index {index} out of range");
            warn!(index, len = self.tokens.len(), "Ignoring out-of-range toggle");
            return false;
        }

        let changed = match mode {
            SelectionMode::Sentence => self.toggle_sentence(index),
            SelectionMode::Word => self.toggle_word(index),
        };
        if changed {
            self.commit();
            debug!(index, %mode, selected = self.selected.len(), "Selection toggled");
        }
        changed
    }

    pub fn clear(&mut self) {
        if !self.selected.is_empty() {
            self.selected.clear();
            self.commit();
            debug!("Selection cleared");
        }
    }

    /// Maximal contiguous runs, in document order.
    pub fn groups(&self) -> &[GroupKey] {
        &self.groups
    }

    pub fn group_containing(&self, index: usize) -> Option<GroupKey> {
        self.groups.iter().copied().find(|group| group.contains(index))
    }

    /// Text of a group with surrounding whitespace trimmed.
    pub fn group_text(&self, key: GroupKey) -> String {
        let last = key.last.min(self.tokens.len().saturating_sub(1));
        if key.first > last || self.tokens.is_empty() {
            return String::new();
        }
        join_tokens(&self.tokens[key.first..=last]).trim().to_string()
    }

    fn toggle_sentence(&mut self, index: usize) -> bool {
        let Some((start, end)) = self.resolver.sentence_range(index, &self.tokens) else {
            return false;
        };
        if self.selected.contains(&index) {
            let before = self.selected.len();
            self.selected.retain(|idx| !(start..=end).contains(idx));
            before != self.selected.len()
        } else {
            let before = self.selected.len();
            self.selected.extend(start..=end);
            before != self.selected.len()
        }
    }

    fn toggle_word(&mut self, index: usize) -> bool {
        if self.selected.remove(&index) {
            if index > 0 {
                self.drop_orphaned_whitespace(index - 1);
            }
            self.drop_orphaned_whitespace(index + 1);
            return true;
        }
        if self.tokens[index].is_whitespace() {
            return false;
        }
        self.selected.insert(index)
    }

    /// A selected whitespace token survives only while one of its own
    /// neighbours is still selected.
    fn drop_orphaned_whitespace(&mut self, index: usize) {
        let Some(token) = self.tokens.get(index) else {
            return;
        };
        if !token.is_whitespace() || !self.selected.contains(&index) {
            return;
        }
        let left = index > 0 && self.selected.contains(&(index - 1));
        let right = self.selected.contains(&(index + 1));
        if !left && !right {
            self.selected.remove(&index);
        }
    }

    fn commit(&mut self) {
        self.groups = derive_groups(&self.selected, &self.tokens);
        self.revision = self.revision.wrapping_add(1);
    }
}

fn derive_groups(selected: &BTreeSet<usize>, tokens: &[Token]) -> Vec<GroupKey> {
    let mut groups = Vec::new();
    let mut current: Option<GroupKey> = None;

    for &index in selected {
        current = match current {
            Some(mut group) if bridged(tokens, group.last, index) => {
                group.last = index;
                Some(group)
            }
            Some(group) => {
                groups.push(group);
                Some(GroupKey {
                    first: index,
                    last: index,
                })
            }
            None => Some(GroupKey {
                first: index,
                last: index,
            }),
        };
    }
    if let Some(group) = current {
        groups.push(group);
    }
    groups
}

/// Every token strictly between `a` and `b` is whitespace.
fn bridged(tokens: &[Token], a: usize, b: usize) -> bool {
    tokens
        .get(a + 1..b)
        .is_some_and(|between| between.iter().all(Token::is_whitespace))
}

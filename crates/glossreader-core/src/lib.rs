//! Core of the reading aid: tokenization, sentence boundaries, selection,
//! speech synchronization and translation orchestration over one shared
//! token sequence.

pub mod bindings;
pub mod cancellation;
pub mod config;
pub mod debounce;
pub mod pagination;
pub mod playback;
pub mod selection;
pub mod sentence;
pub mod session;
pub mod tokenizer;
pub mod translation;
pub mod worker;

pub use session::{ReaderSession, ReaderSnapshot, SessionCommand, SessionEvent};
pub use tokenizer::{Token, TokenKind, join_tokens, tokenize};

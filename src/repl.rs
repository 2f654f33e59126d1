//! Line commands for the terminal driver and plain-text snapshot rendering.

use anyhow::{Context, Result, anyhow, bail};
use glossreader_core::selection::SelectionMode;
use glossreader_core::session::{ReaderSnapshot, ServiceStatus, SessionCommand};
use glossreader_core::translation::{DetailState, TranslationEntry};
use std::fmt::Write as _;
use std::path::PathBuf;

pub const HELP: &str = "\
Commands:
  show                     print the current page
  mode word|sentence       selection granularity
  toggle <index>           select or deselect a token
  clear                    clear the selection
  hover <index>            look up a single word
  unhover                  end the hover lookup
  play [index]             speak from the current word or from <index>
  pause | resume | stop    playback control
  rate <0.5-2.0>           speech rate
  voice <id>|none          speech voice
  say <text>               speak an excerpt without tracking
  detail <text>            open a rich detail tab
  detail-group <index>     open a tab for the selected group at <index>
  tab <id>                 activate a tab
  regen <id>               regenerate a tab
  close <id> | close-all   close tabs
  page <n> | next | prev   page navigation
  lang <source> <target>   change languages (clears translations)
  load <path>              read new text from a file
  generate <prompt>        load a canned practice text
  status                   translation service health and models
  help                     this list
  quit                     exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplAction {
    Session(SessionCommand),
    Load(PathBuf),
    Languages { source: String, target: String },
    Generate(String),
    Status,
    Help,
    Quit,
}

pub fn parse_line(line: &str) -> Result<Option<ReplAction>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));

    let session = |command: SessionCommand| -> Result<Option<ReplAction>> {
        Ok(Some(ReplAction::Session(command)))
    };
    match verb {
        "show" => session(SessionCommand::GetSnapshot),
        "mode" => {
            let mode = match rest {
                "word" => SelectionMode::Word,
                "sentence" => SelectionMode::Sentence,
                other => bail!("unknown mode {other:?}; expected word or sentence"),
            };
            session(SessionCommand::SetMode { mode })
        }
        "toggle" => session(SessionCommand::Toggle {
            index: number(rest, "index")?,
        }),
        "clear" => session(SessionCommand::ClearSelection),
        "hover" => session(SessionCommand::Hover {
            index: number(rest, "index")?,
        }),
        "unhover" => session(SessionCommand::HoverEnd),
        "play" if rest.is_empty() => session(SessionCommand::Play),
        "play" => session(SessionCommand::PlayFrom {
            index: number(rest, "index")?,
        }),
        "pause" => session(SessionCommand::Pause),
        "resume" => session(SessionCommand::Resume),
        "stop" => session(SessionCommand::Stop),
        "rate" => session(SessionCommand::SetRate {
            rate: rest
                .parse()
                .with_context(|| format!("invalid rate {rest:?}"))?,
        }),
        "voice" => session(SessionCommand::SetVoice {
            voice: match rest {
                "" | "none" => None,
                id => Some(id.to_string()),
            },
        }),
        "say" => session(SessionCommand::PlaySingle {
            text: required(rest, "text")?,
        }),
        "detail" => session(SessionCommand::OpenDetail {
            text: required(rest, "text")?,
            context: None,
        }),
        "detail-group" => session(SessionCommand::OpenDetailForGroup {
            index: number(rest, "index")?,
        }),
        "tab" => session(SessionCommand::ActivateTab {
            id: number(rest, "tab id")?,
        }),
        "regen" => session(SessionCommand::RegenerateTab {
            id: number(rest, "tab id")?,
        }),
        "close" => session(SessionCommand::CloseTab {
            id: number(rest, "tab id")?,
        }),
        "close-all" => session(SessionCommand::CloseAllTabs),
        "page" => session(SessionCommand::SetPage {
            page: number(rest, "page")?,
        }),
        "next" => session(SessionCommand::NextPage),
        "prev" => session(SessionCommand::PrevPage),
        "lang" => {
            let mut parts = rest.split_whitespace();
            let (Some(source), Some(target), None) = (parts.next(), parts.next(), parts.next())
            else {
                bail!("usage: lang <source> <target>");
            };
            Ok(Some(ReplAction::Languages {
                source: source.to_string(),
                target: target.to_string(),
            }))
        }
        "load" => Ok(Some(ReplAction::Load(PathBuf::from(required(rest, "path")?)))),
        "generate" => Ok(Some(ReplAction::Generate(required(rest, "prompt")?))),
        "status" => Ok(Some(ReplAction::Status)),
        "help" | "?" => Ok(Some(ReplAction::Help)),
        "quit" | "exit" => Ok(Some(ReplAction::Quit)),
        other => Err(anyhow!("unknown command {other:?}; type help")),
    }
}

fn number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("expected a numeric {what}, got {value:?}"))
}

fn required(value: &str, what: &str) -> Result<String> {
    if value.is_empty() {
        bail!("missing {what}");
    }
    Ok(value.to_string())
}

/// Page text with `[selected]` tokens, the spoken word as `*word*`, and each
/// word prefixed by its index.
pub fn render_page(snapshot: &ReaderSnapshot) -> String {
    let mut out = String::new();
    let page = &snapshot.page;
    let _ = writeln!(
        out,
        "-- page {}/{} ({} -> {}, mode {}) --",
        page.current_page,
        page.total_pages,
        snapshot.languages.source,
        snapshot.languages.target,
        snapshot.mode
    );
    for token in &snapshot.tokens {
        if token.text.trim().is_empty() {
            out.push_str(&token.text);
            continue;
        }
        let mut word = format!("{}:{}", token.index, token.text);
        if token.spoken {
            word = format!("*{word}*");
        }
        if token.selected {
            word = format!("[{word}]");
        }
        out.push_str(&word);
    }
    out.push('\n');
    out.push_str(&render_translations(snapshot));
    out
}

/// Group translations, hover, playback and tabs.
pub fn render_translations(snapshot: &ReaderSnapshot) -> String {
    let mut out = String::new();
    for group in &snapshot.groups {
        let _ = writeln!(
            out,
            "  {}..{} {:?} => {}",
            group.first,
            group.last,
            group.text,
            entry_label(group.translation.as_ref())
        );
    }
    if snapshot.selection_pending {
        let _ = writeln!(out, "  (selection settling)");
    }
    if let Some(hover) = &snapshot.hover {
        let _ = writeln!(
            out,
            "  hover {} => {}",
            hover.index,
            entry_label(hover.entry.as_ref())
        );
    }
    let playback = &snapshot.playback;
    if playback.is_playing {
        let _ = writeln!(
            out,
            "  playing word {:?}{} at {:.2}x",
            playback.current_word_index,
            if playback.is_paused { " (paused)" } else { "" },
            playback.rate
        );
    }
    for tab in &snapshot.tabs {
        let marker = if snapshot.active_tab == Some(tab.id) {
            ">"
        } else {
            " "
        };
        let state = match &tab.state {
            DetailState::Loading => "loading".to_string(),
            DetailState::Ready { result } => format!(
                "{} | {}",
                result.translation, result.grammar.explanation
            ),
            DetailState::Failed { error } => format!("failed: {error}"),
        };
        let _ = writeln!(out, " {marker}tab {} {:?}: {state}", tab.id, tab.text);
    }
    out
}

pub fn render_status(status: &ServiceStatus) -> String {
    format!(
        "service {} | models: {}",
        if status.healthy { "healthy" } else { "unavailable" },
        if status.models.is_empty() {
            "none".to_string()
        } else {
            status.models.join(", ")
        }
    )
}

fn entry_label(entry: Option<&TranslationEntry>) -> String {
    match entry {
        None => "waiting".to_string(),
        Some(TranslationEntry::Pending) => "translating...".to_string(),
        Some(TranslationEntry::Ready { text }) => text.clone(),
        Some(TranslationEntry::Failed { error }) => format!("error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> ReplAction {
        parse_line(line)
            .expect("valid command")
            .expect("non-empty command")
    }

    #[test]
    fn parses_session_commands() {
        assert_eq!(
            parsed("toggle 4"),
            ReplAction::Session(SessionCommand::Toggle { index: 4 })
        );
        assert_eq!(parsed("play"), ReplAction::Session(SessionCommand::Play));
        assert_eq!(
            parsed("play 12"),
            ReplAction::Session(SessionCommand::PlayFrom { index: 12 })
        );
        assert_eq!(
            parsed("voice none"),
            ReplAction::Session(SessionCommand::SetVoice { voice: None })
        );
        assert_eq!(
            parsed("detail  buenos días "),
            ReplAction::Session(SessionCommand::OpenDetail {
                text: "buenos días".to_string(),
                context: None,
            })
        );
        assert_eq!(
            parsed("mode sentence"),
            ReplAction::Session(SessionCommand::SetMode {
                mode: SelectionMode::Sentence
            })
        );
    }

    #[test]
    fn parses_driver_actions() {
        assert_eq!(
            parsed("lang es de"),
            ReplAction::Languages {
                source: "es".to_string(),
                target: "de".to_string()
            }
        );
        assert_eq!(parsed("quit"), ReplAction::Quit);
        assert_eq!(parsed("generate Greeting"), ReplAction::Generate("Greeting".into()));
        assert!(parse_line("   ").expect("blank line").is_none());
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_line("toggle four").is_err());
        assert!(parse_line("lang es").is_err());
        assert!(parse_line("mode paragraph").is_err());
        assert!(parse_line("say").is_err());
        assert!(parse_line("dance").is_err());
    }
}

//! Entry point for the terminal reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load configuration, the abbreviation table, the glossary and the text.
//! - Run the command loop that feeds stdin lines, speech callbacks and timer
//!   ticks into the reading session.

mod console_speech;
mod glossary;
mod repl;

use crate::console_speech::{ConsoleSpeech, SharedSpeechQueue};
use crate::glossary::GlossaryTranslator;
use crate::repl::{HELP, ReplAction, parse_line, render_page, render_status, render_translations};
use anyhow::{Context, Result, anyhow};
use glossreader_core::ReaderSession;
use glossreader_core::config::{config_path, load_config};
use glossreader_core::sentence::SentenceResolver;
use std::env;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const TICK: Duration = Duration::from_millis(50);
const GLOSSARY_PATH: &str = "conf/glossary.toml";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let Some(text_path) = parse_args()? else {
        println!("Usage: glossreader <text-file>\n\n{HELP}");
        return Ok(());
    };
    let config = load_config(&config_path());
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %text_path.display(),
        level = %config.log_level,
        source = %config.source_lang,
        target = %config.target_lang,
        "Starting reader"
    );

    let text = read_text(&text_path)?;
    let resolver = SentenceResolver::load(Path::new(&config.abbreviations_path));
    let glossary = Arc::new(GlossaryTranslator::load(Path::new(GLOSSARY_PATH)));
    let speech_queue = SharedSpeechQueue::default();
    let engine = ConsoleSpeech::new(Rc::clone(&speech_queue));
    let mut session = ReaderSession::new(config, resolver, glossary.clone(), Box::new(engine));
    session.set_text(text);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; shutting down");
        handler_flag.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    print!("{}", render_page(&session.snapshot()));
    let mut last_update = String::new();
    while running.load(Ordering::SeqCst) {
        match line_rx.recv_timeout(TICK) {
            Ok(line) => {
                let now = Instant::now();
                match handle_line(&mut session, glossary.as_ref(), &line, now) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => println!("error: {err:#}"),
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Input closed");
                break;
            }
        }

        let now = Instant::now();
        let mut changed = false;
        let events = speech_queue.borrow_mut().due(now);
        for event in events {
            changed |= session.handle_speech_event(event);
        }
        changed |= session.tick(now);
        if changed {
            let update = render_translations(&session.snapshot());
            if update != last_update {
                print!("{update}");
                last_update = update;
            }
        }
    }

    info!("Reader stopped");
    Ok(())
}

/// Apply one input line. Returns false when the user asked to quit.
fn handle_line(
    session: &mut ReaderSession,
    glossary: &GlossaryTranslator,
    line: &str,
    now: Instant,
) -> Result<bool> {
    let Some(action) = parse_line(line)? else {
        return Ok(true);
    };
    match action {
        ReplAction::Session(command) => {
            let event = session.apply_command(command, now)?;
            info!(action = event.action, "Applied command");
            print!("{}", render_page(&event.snapshot));
        }
        ReplAction::Load(path) => {
            let text = read_text(&path)?;
            if !session.set_text(text) {
                println!("text unchanged");
            }
            print!("{}", render_page(&session.snapshot()));
        }
        ReplAction::Languages { source, target } => {
            if !session.set_languages(&source, &target, now) {
                println!("languages unchanged");
            }
            print!("{}", render_page(&session.snapshot()));
        }
        ReplAction::Generate(prompt) => {
            session.load_generated_text(glossary, &prompt)?;
            print!("{}", render_page(&session.snapshot()));
        }
        ReplAction::Status => println!("{}", render_status(&session.service_status())),
        ReplAction::Help => println!("{HELP}"),
        ReplAction::Quit => return Ok(false),
    }
    Ok(true)
}

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Err(anyhow!("Usage: glossreader <text-file>"));
    };
    if arg == "--help" || arg == "-h" {
        return Ok(None);
    }
    let path = PathBuf::from(arg);
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }
    Ok(Some(path))
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        info!("RUST_LOG is set; ignoring config log level");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}

//! TypeScript declarations for the snapshot types a front end consumes.

use std::fs;
use std::path::Path;
use ts_rs::TS;

use crate::playback::{PlaybackState, Voice};
use crate::selection::{GroupKey, SelectionMode};
use crate::session::{GroupView, PageView, ReaderSnapshot, ServiceStatus, TokenView};
use crate::tokenizer::TokenKind;
use crate::translation::{
    DetailState, GrammarInfo, HoverSlot, LanguagePair, RichDetailResult, RichDetailTab,
    TranslationEntry, UsageExample,
};

const INDEX_CONTENT: &str = r#"export type { DetailState } from "./DetailState";
export type { GrammarInfo } from "./GrammarInfo";
export type { GroupKey } from "./GroupKey";
export type { GroupView } from "./GroupView";
export type { HoverSlot } from "./HoverSlot";
export type { LanguagePair } from "./LanguagePair";
export type { PageView } from "./PageView";
export type { PlaybackState } from "./PlaybackState";
export type { ReaderSnapshot } from "./ReaderSnapshot";
export type { RichDetailResult } from "./RichDetailResult";
export type { RichDetailTab } from "./RichDetailTab";
export type { SelectionMode } from "./SelectionMode";
export type { ServiceStatus } from "./ServiceStatus";
export type { TokenKind } from "./TokenKind";
export type { TokenView } from "./TokenView";
export type { TranslationEntry } from "./TranslationEntry";
export type { UsageExample } from "./UsageExample";
export type { Voice } from "./Voice";
"#;

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<(), String> {
    T::export_all_to(out_dir).map_err(|err| err.to_string())
}

/// Write one `.ts` file per type plus an `index.ts`, replacing any stale
/// declarations already in `out_dir`.
pub fn export_ts_bindings(out_dir: &Path) -> Result<(), String> {
    fs::create_dir_all(out_dir)
        .map_err(|err| format!("Failed to create {}: {err}", out_dir.display()))?;

    for entry in fs::read_dir(out_dir)
        .map_err(|err| format!("Failed to list {}: {err}", out_dir.display()))?
    {
        let entry = entry.map_err(|err| format!("Failed to read entry: {err}"))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .map_err(|err| format!("Failed to remove {}: {err}", path.display()))?;
        }
    }

    export_single_type::<ReaderSnapshot>(out_dir)?;
    export_single_type::<TokenView>(out_dir)?;
    export_single_type::<GroupView>(out_dir)?;
    export_single_type::<PageView>(out_dir)?;
    export_single_type::<ServiceStatus>(out_dir)?;
    export_single_type::<TokenKind>(out_dir)?;
    export_single_type::<SelectionMode>(out_dir)?;
    export_single_type::<GroupKey>(out_dir)?;
    export_single_type::<PlaybackState>(out_dir)?;
    export_single_type::<Voice>(out_dir)?;
    export_single_type::<TranslationEntry>(out_dir)?;
    export_single_type::<HoverSlot>(out_dir)?;
    export_single_type::<LanguagePair>(out_dir)?;
    export_single_type::<RichDetailTab>(out_dir)?;
    export_single_type::<DetailState>(out_dir)?;
    export_single_type::<RichDetailResult>(out_dir)?;
    export_single_type::<GrammarInfo>(out_dir)?;
    export_single_type::<UsageExample>(out_dir)?;

    let index_path = out_dir.join("index.ts");
    fs::write(&index_path, INDEX_CONTENT)
        .map_err(|err| format!("Failed to write {}: {err}", index_path.display()))?;
    Ok(())
}

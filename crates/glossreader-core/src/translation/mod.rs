//! Translation orchestration: debounced group translation, hover lookups and
//! rich detail tabs.
//!
//! The orchestrator never talks to a service directly. Timers are polled with
//! an explicit `now`; when one fires the orchestrator reads the document as it
//! is at that moment and hands back [`TranslationJob`]s for a worker to run.
//! Outcomes come back through [`TranslationOrchestrator::complete`], which
//! drops anything that no longer matches the slot it was issued for.

mod jobs;
mod service;
mod tabs;

pub use jobs::{JobOutcome, JobPayload, JobResult, JobTarget, TranslationJob};
pub use service::{
    AUTO_LANGUAGE, GrammarInfo, LanguagePair, RichDetailResult, SegmentRequest, TextGenerator,
    TranslationService, UsageExample,
};
pub use tabs::{DetailState, RichDetailTab, RichDetailTabs, TabId};

use serde::Serialize;
use std::collections::HashMap;
use std::ops::Range;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::cancellation::CancellationToken;
use crate::debounce::Debouncer;
use crate::selection::GroupKey;
use crate::sentence::SentenceResolver;
use crate::tokenizer::{Token, join_tokens};

pub type RequestId = u64;

pub const DEFAULT_SELECTION_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_HOVER_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum TranslationEntry {
    Pending,
    Ready { text: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct HoverSlot {
    pub index: usize,
    /// `None` while the hover debounce is still running.
    pub entry: Option<TranslationEntry>,
    #[serde(skip)]
    #[ts(skip)]
    request: Option<RequestId>,
}

/// Snapshot of the document the orchestrator reads when a timer fires.
#[derive(Debug, Clone, Copy)]
pub struct DocumentView<'a> {
    pub tokens: &'a [Token],
    pub groups: &'a [GroupKey],
    pub resolver: &'a SentenceResolver,
    pub languages: &'a LanguagePair,
}

#[derive(Debug, Clone)]
struct HoverKey {
    index: usize,
    page: Range<usize>,
}

#[derive(Debug, Clone)]
struct CacheSlot {
    entry: TranslationEntry,
    request: Option<RequestId>,
}

#[derive(Debug)]
struct InFlight {
    target: JobTarget,
    cancel: CancellationToken,
}

#[derive(Debug)]
pub struct TranslationOrchestrator {
    cache: HashMap<GroupKey, CacheSlot>,
    selection_timer: Debouncer<()>,
    hover_timer: Debouncer<HoverKey>,
    hover: Option<HoverSlot>,
    tabs: RichDetailTabs,
    in_flight: HashMap<RequestId, InFlight>,
    next_request: RequestId,
}

impl Default for TranslationOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTION_DELAY, DEFAULT_HOVER_DELAY)
    }
}

impl TranslationOrchestrator {
    pub fn new(selection_delay: Duration, hover_delay: Duration) -> Self {
        Self {
            cache: HashMap::new(),
            selection_timer: Debouncer::new(selection_delay),
            hover_timer: Debouncer::new(hover_delay),
            hover: None,
            tabs: RichDetailTabs::new(),
            in_flight: HashMap::new(),
            next_request: 0,
        }
    }

    /// Restart the selection debounce. The groups to translate are read when
    /// it fires, not now.
    pub fn on_selection_changed(&mut self, now: Instant) {
        self.selection_timer.schedule((), now);
    }

    /// Start (or keep) a hover lookup for `index`. `page` is the token range
    /// currently on screen and bounds the context sent with the request.
    /// Returns false when `index` is already the hover target.
    pub fn on_hover(&mut self, index: usize, page: Range<usize>, now: Instant) -> bool {
        if self.hover.as_ref().is_some_and(|slot| slot.index == index) {
            return false;
        }
        self.cancel_where(|target| matches!(target, JobTarget::Hover { .. }));
        self.hover = Some(HoverSlot {
            index,
            entry: None,
            request: None,
        });
        self.hover_timer.schedule(HoverKey { index, page }, now);
        true
    }

    pub fn hover_end(&mut self) {
        self.hover_timer.cancel();
        self.cancel_where(|target| matches!(target, JobTarget::Hover { .. }));
        self.hover = None;
    }

    /// Fire due timers against the current document.
    pub fn poll(&mut self, now: Instant, view: DocumentView<'_>) -> Vec<TranslationJob> {
        let mut jobs = Vec::new();
        if self.selection_timer.poll(now).is_some() {
            jobs.extend(self.dispatch_groups(view));
        }
        if let Some(key) = self.hover_timer.poll(now) {
            jobs.extend(self.dispatch_hover(key, view));
        }
        jobs
    }

    /// Earliest pending timer deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.selection_timer.deadline(), self.hover_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Open a rich detail tab and return it with the job that fills it.
    pub fn fetch_rich_detail(
        &mut self,
        text: &str,
        context: Option<String>,
        languages: &LanguagePair,
    ) -> (TabId, TranslationJob) {
        let text = text.trim().to_string();
        let tab = self
            .tabs
            .open(text.clone(), context.clone(), languages.clone());
        let request = SegmentRequest::new(text, context, languages);
        let job = self.track(JobTarget::Detail { tab }, request);
        if let Some(entry) = self.tabs.get_mut(tab) {
            entry.request = Some(job.id);
        }
        info!(tab, request_id = job.id, "Opened rich detail tab");
        (tab, job)
    }

    /// Re-run a tab's original request, replacing whatever it holds.
    pub fn regenerate(&mut self, tab: TabId) -> Option<TranslationJob> {
        let (text, context, languages) = {
            let entry = self.tabs.get(tab)?;
            (
                entry.text.clone(),
                entry.context.clone(),
                entry.languages.clone(),
            )
        };
        self.cancel_where(|target| *target == JobTarget::Detail { tab });
        let request = SegmentRequest::new(text, context, &languages);
        let job = self.track(JobTarget::Detail { tab }, request);
        if let Some(entry) = self.tabs.get_mut(tab) {
            entry.state = DetailState::Loading;
            entry.request = Some(job.id);
        }
        info!(tab, request_id = job.id, "Regenerating rich detail tab");
        Some(job)
    }

    pub fn close_tab(&mut self, tab: TabId) -> bool {
        let closed = self.tabs.close(tab).is_some();
        if closed {
            self.cancel_where(|target| *target == JobTarget::Detail { tab });
            debug!(tab, active = ?self.tabs.active_id(), "Closed rich detail tab");
        }
        closed
    }

    pub fn close_all_tabs(&mut self) {
        let closed = self.tabs.close_all();
        self.cancel_where(|target| matches!(target, JobTarget::Detail { .. }));
        debug!(count = closed.len(), "Closed all rich detail tabs");
    }

    pub fn activate_tab(&mut self, tab: TabId) -> bool {
        self.tabs.activate(tab)
    }

    /// Forget every selection translation and the hover slot. Tabs are kept.
    pub fn clear_all(&mut self) {
        self.selection_timer.cancel();
        self.hover_timer.cancel();
        self.cancel_where(|target| !matches!(target, JobTarget::Detail { .. }));
        let dropped = self.cache.len();
        self.cache.clear();
        self.hover = None;
        info!(dropped, "Cleared translation cache");
    }

    /// Apply a worker outcome. Returns true when it landed in a live slot.
    pub fn complete(&mut self, outcome: JobOutcome) -> bool {
        let Some(flight) = self.in_flight.remove(&outcome.id) else {
            debug!(request_id = outcome.id, "Discarding outcome of retired request");
            return false;
        };
        let id = outcome.id;

        match flight.target {
            JobTarget::Segment { key } => {
                let Some(slot) = self
                    .cache
                    .get_mut(&key)
                    .filter(|slot| slot.request == Some(id))
                else {
                    debug!(request_id = id, ?key, "Discarding stale group translation");
                    return false;
                };
                match outcome.result {
                    JobResult::Cancelled => {
                        self.cache.remove(&key);
                    }
                    result => {
                        slot.entry = entry_from_text(result, id);
                        slot.request = None;
                        debug!(request_id = id, ?key, "Group translation settled");
                    }
                }
                true
            }
            JobTarget::Hover { index } => {
                let Some(slot) = self
                    .hover
                    .as_mut()
                    .filter(|slot| slot.index == index && slot.request == Some(id))
                else {
                    debug!(request_id = id, index, "Discarding stale hover translation");
                    return false;
                };
                slot.request = None;
                slot.entry = match outcome.result {
                    JobResult::Cancelled => None,
                    result => Some(entry_from_text(result, id)),
                };
                true
            }
            JobTarget::Detail { tab } => {
                let Some(entry) = self
                    .tabs
                    .get_mut(tab)
                    .filter(|entry| entry.request == Some(id))
                else {
                    debug!(request_id = id, tab, "Discarding stale rich detail result");
                    return false;
                };
                entry.request = None;
                entry.state = match outcome.result {
                    JobResult::Done(JobPayload::Detail(result)) => DetailState::Ready { result },
                    JobResult::Done(JobPayload::Text(_)) => {
                        warn!(request_id = id, tab, "Rich detail request returned plain text");
                        DetailState::Failed {
                            error: "unexpected response".to_string(),
                        }
                    }
                    JobResult::Failed(error) => {
                        warn!(request_id = id, tab, %error, "Rich detail request failed");
                        DetailState::Failed { error }
                    }
                    JobResult::Cancelled => DetailState::Failed {
                        error: "cancelled".to_string(),
                    },
                };
                true
            }
        }
    }

    pub fn entry(&self, key: GroupKey) -> Option<&TranslationEntry> {
        self.cache.get(&key).map(|slot| &slot.entry)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn hover(&self) -> Option<&HoverSlot> {
        self.hover.as_ref()
    }

    pub fn tabs(&self) -> &RichDetailTabs {
        &self.tabs
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn selection_pending(&self) -> bool {
        self.selection_timer.is_pending()
    }

    fn dispatch_groups(&mut self, view: DocumentView<'_>) -> Vec<TranslationJob> {
        debug!(groups = view.groups.len(), "Selection debounce fired");
        let mut jobs = Vec::new();
        for &key in view.groups {
            if key.last >= view.tokens.len() {
                warn!(?key, "Group outside of token sequence");
                continue;
            }
            if matches!(
                self.entry(key),
                Some(TranslationEntry::Ready { .. } | TranslationEntry::Pending)
            ) {
                continue;
            }
            let text = span_text(view.tokens, key.first, key.last);
            if text.is_empty() {
                continue;
            }
            let context = view
                .resolver
                .span_range(key.first, key.last, view.tokens)
                .map(|(start, end)| span_text(view.tokens, start, end));
            let request = SegmentRequest::new(text, context, view.languages);
            let job = self.track(JobTarget::Segment { key }, request);
            self.cache.insert(
                key,
                CacheSlot {
                    entry: TranslationEntry::Pending,
                    request: Some(job.id),
                },
            );
            jobs.push(job);
        }
        if !jobs.is_empty() {
            info!(count = jobs.len(), "Dispatching group translations");
        }
        jobs
    }

    fn dispatch_hover(&mut self, key: HoverKey, view: DocumentView<'_>) -> Option<TranslationJob> {
        if self.hover.as_ref().map(|slot| slot.index) != Some(key.index) {
            return None;
        }
        let token = view.tokens.get(key.index)?;
        if token.is_whitespace() {
            return None;
        }
        let word = token
            .as_str()
            .trim_matches(|ch: char| !ch.is_alphanumeric())
            .to_string();
        if word.is_empty() {
            return None;
        }

        let context = view
            .resolver
            .sentence_range(key.index, view.tokens)
            .and_then(|(start, end)| {
                let start = start.max(key.page.start);
                let end = end.min(key.page.end.saturating_sub(1));
                (start <= end).then(|| span_text(view.tokens, start, end))
            });
        let request = SegmentRequest::new(word, context, view.languages);
        let job = self.track(JobTarget::Hover { index: key.index }, request);
        if let Some(slot) = self.hover.as_mut() {
            slot.entry = Some(TranslationEntry::Pending);
            slot.request = Some(job.id);
        }
        debug!(index = key.index, request_id = job.id, "Dispatching hover translation");
        Some(job)
    }

    fn track(&mut self, target: JobTarget, request: SegmentRequest) -> TranslationJob {
        self.next_request = self.next_request.wrapping_add(1);
        let id = self.next_request;
        let cancel = CancellationToken::for_request(id);
        self.in_flight.insert(
            id,
            InFlight {
                target,
                cancel: cancel.clone(),
            },
        );
        TranslationJob {
            id,
            target,
            request,
            cancel,
        }
    }

    fn cancel_where(&mut self, predicate: impl Fn(&JobTarget) -> bool) {
        self.in_flight.retain(|id, flight| {
            if predicate(&flight.target) {
                debug!(request_id = *id, target = ?flight.target, "Cancelling request");
                flight.cancel.cancel();
                false
            } else {
                true
            }
        });
    }
}

fn entry_from_text(result: JobResult, id: RequestId) -> TranslationEntry {
    match result {
        JobResult::Done(JobPayload::Text(text)) => TranslationEntry::Ready { text },
        JobResult::Done(JobPayload::Detail(detail)) => TranslationEntry::Ready {
            text: detail.translation,
        },
        JobResult::Failed(error) => {
            warn!(request_id = id, %error, "Translation request failed");
            TranslationEntry::Failed { error }
        }
        JobResult::Cancelled => TranslationEntry::Failed {
            error: "cancelled".to_string(),
        },
    }
}

fn span_text(tokens: &[Token], first: usize, last: usize) -> String {
    join_tokens(&tokens[first..=last]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{SelectionEngine, SelectionMode};
    use crate::tokenizer::tokenize;
    use anyhow::{Result, bail};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct ScriptedService {
        calls: Mutex<Vec<SegmentRequest>>,
        failing: Vec<String>,
    }

    impl TranslationService for ScriptedService {
        fn translate_segment(&self, request: &SegmentRequest) -> Result<String> {
            self.calls.lock().unwrap().push(request.clone());
            if self.failing.contains(&request.text) {
                bail!("backend rejected {}", request.text);
            }
            Ok(format!("<{}:{}>", request.target_lang, request.text))
        }

        fn rich_analyze(&self, request: &SegmentRequest) -> Result<RichDetailResult> {
            self.calls.lock().unwrap().push(request.clone());
            if self.failing.contains(&request.text) {
                bail!("analysis unavailable");
            }
            Ok(RichDetailResult {
                translation: format!("detail:{}", request.text),
                segment: request.text.clone(),
                ..RichDetailResult::default()
            })
        }

        fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["scripted".to_string()])
        }

        fn health_check(&self) -> bool {
            true
        }
    }

    struct Fixture {
        selection: SelectionEngine,
        resolver: SentenceResolver,
        languages: LanguagePair,
        orchestrator: TranslationOrchestrator,
        start: Instant,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            let resolver = SentenceResolver::default();
            Self {
                selection: SelectionEngine::new(tokenize(text).into(), Arc::new(resolver.clone())),
                resolver,
                languages: LanguagePair::new("es", "en"),
                orchestrator: TranslationOrchestrator::default(),
                start: Instant::now(),
            }
        }

        fn at(&self, millis: u64) -> Instant {
            self.start + Duration::from_millis(millis)
        }

        fn click(&mut self, index: usize, millis: u64) {
            self.selection.toggle(index);
            let now = self.at(millis);
            self.orchestrator.on_selection_changed(now);
        }

        fn hover(&mut self, index: usize, page: Range<usize>, millis: u64) -> bool {
            let now = self.at(millis);
            self.orchestrator.on_hover(index, page, now)
        }

        fn poll(&mut self, millis: u64) -> Vec<TranslationJob> {
            let view = DocumentView {
                tokens: self.selection.tokens(),
                groups: self.selection.groups(),
                resolver: &self.resolver,
                languages: &self.languages,
            };
            let now = self.start + Duration::from_millis(millis);
            self.orchestrator.poll(now, view)
        }

        fn run_all(&mut self, jobs: &[TranslationJob], service: &ScriptedService) {
            for job in jobs {
                self.orchestrator.complete(job.run(service));
            }
        }
    }

    fn segment_keys(jobs: &[TranslationJob]) -> Vec<GroupKey> {
        jobs.iter()
            .filter_map(|job| match job.target {
                JobTarget::Segment { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    const TEXT: &str = "Ayer comí pan. Hoy bebo agua fresca.";
    // Ayer(0) _ comí(2) _ pan.(4) _ Hoy(6) _ bebo(8) _ agua(10) _ fresca.(12)

    #[test]
    fn rapid_selection_changes_coalesce_into_one_batch() {
        let mut fx = Fixture::new(TEXT);
        for (step, index) in [0usize, 2, 4, 8, 4].into_iter().enumerate() {
            fx.click(index, step as u64 * 100);
            assert!(fx.poll(step as u64 * 100 + 50).is_empty());
        }

        let jobs = fx.poll(400 + 500);
        assert_eq!(
            segment_keys(&jobs),
            vec![GroupKey { first: 0, last: 2 }, GroupKey { first: 8, last: 8 }]
        );
        assert_eq!(jobs[0].request.text, "Ayer comí");
        assert!(fx.poll(5_000).is_empty());
    }

    #[test]
    fn segment_requests_carry_sentence_context_and_languages() {
        let mut fx = Fixture::new(TEXT);
        fx.click(8, 0);
        let jobs = fx.poll(500);
        assert_eq!(jobs.len(), 1);
        let request = &jobs[0].request;
        assert_eq!(request.text, "bebo");
        assert_eq!(request.context.as_deref(), Some("Hoy bebo agua fresca."));
        assert_eq!(request.source_lang.as_deref(), Some("es"));
        assert_eq!(request.target_lang, "en");
    }

    #[test]
    fn cached_groups_are_reused_and_new_groups_requested() {
        let service = ScriptedService::default();
        let mut fx = Fixture::new(TEXT);
        fx.click(0, 0);
        let jobs = fx.poll(500);
        fx.run_all(&jobs, &service);
        assert_eq!(
            fx.orchestrator.entry(GroupKey { first: 0, last: 0 }),
            Some(&TranslationEntry::Ready {
                text: "<en:Ayer>".to_string()
            })
        );

        fx.click(10, 1_000);
        let jobs = fx.poll(1_500);
        assert_eq!(segment_keys(&jobs), vec![GroupKey { first: 10, last: 10 }]);

        // pending entries are not re-issued either
        fx.click(6, 1_600);
        let first = fx.poll(2_100);
        fx.click(12, 2_200);
        let second = fx.poll(2_700);
        assert_eq!(segment_keys(&first), vec![GroupKey { first: 6, last: 6 }]);
        assert_eq!(segment_keys(&second), vec![GroupKey { first: 10, last: 12 }]);
    }

    #[test]
    fn results_apply_in_any_order_and_failures_stay_local() {
        let service = ScriptedService {
            failing: vec!["Hoy".to_string()],
            ..ScriptedService::default()
        };
        let mut fx = Fixture::new(TEXT);
        fx.click(0, 0);
        fx.click(6, 10);
        let jobs = fx.poll(600);
        assert_eq!(jobs.len(), 2);

        let later = jobs[1].run(&service);
        let earlier = jobs[0].run(&service);
        assert!(fx.orchestrator.complete(later));
        assert_eq!(
            fx.orchestrator.entry(GroupKey { first: 0, last: 0 }),
            Some(&TranslationEntry::Pending)
        );
        assert!(fx.orchestrator.complete(earlier));

        assert!(matches!(
            fx.orchestrator.entry(GroupKey { first: 6, last: 6 }),
            Some(TranslationEntry::Failed { error }) if error.contains("Hoy")
        ));
        assert!(matches!(
            fx.orchestrator.entry(GroupKey { first: 0, last: 0 }),
            Some(TranslationEntry::Ready { .. })
        ));

        // a failed group is retried on the next settled trigger
        fx.click(12, 1_000);
        let retry = fx.poll(1_500);
        assert!(segment_keys(&retry).contains(&GroupKey { first: 6, last: 6 }));
    }

    #[test]
    fn clear_all_drops_cache_and_discards_late_results() {
        let service = ScriptedService::default();
        let mut fx = Fixture::new(TEXT);
        fx.click(0, 0);
        let jobs = fx.poll(500);
        let (tab, detail_job) =
            fx.orchestrator
                .fetch_rich_detail("pan", None, &LanguagePair::new("es", "en"));

        fx.orchestrator.clear_all();
        assert!(jobs[0].cancel.is_cancelled());
        assert_eq!(jobs[0].run(&service).result, JobResult::Cancelled);
        assert!(!fx.orchestrator.complete(JobOutcome {
            id: jobs[0].id,
            result: JobResult::Done(JobPayload::Text("late".to_string())),
        }));
        assert_eq!(fx.orchestrator.cached_len(), 0);

        // tabs survive a cache clear
        assert!(fx.orchestrator.complete(detail_job.run(&service)));
        assert!(matches!(
            fx.orchestrator.tabs().get(tab).map(|t| &t.state),
            Some(DetailState::Ready { .. })
        ));
    }

    #[test]
    fn superseded_selection_timer_issues_nothing() {
        let mut fx = Fixture::new(TEXT);
        fx.click(0, 0);
        fx.orchestrator.clear_all();
        assert!(fx.poll(10_000).is_empty());
    }

    #[test]
    fn hover_same_index_is_noop_and_moving_cancels() {
        let service = ScriptedService::default();
        let mut fx = Fixture::new(TEXT);
        let page = 0..13;

        assert!(fx.hover(2, page.clone(), 0));
        assert!(!fx.hover(2, page.clone(), 100));
        let jobs = fx.poll(300);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].request.text, "comí");
        assert_eq!(jobs[0].request.context.as_deref(), Some("Ayer comí pan."));

        // moving away before the result lands
        assert!(fx.hover(4, page.clone(), 350));
        assert!(jobs[0].cancel.is_cancelled());
        assert!(!fx.orchestrator.complete(JobOutcome {
            id: jobs[0].id,
            result: JobResult::Done(JobPayload::Text("ate".to_string())),
        }));
        assert_eq!(fx.orchestrator.hover().and_then(|h| h.entry.clone()), None);

        let jobs = fx.poll(650);
        assert_eq!(jobs[0].request.text, "pan");
        fx.run_all(&jobs, &service);
        let hover = fx.orchestrator.hover().expect("hover slot");
        assert_eq!(hover.index, 4);
        assert_eq!(
            hover.entry,
            Some(TranslationEntry::Ready {
                text: "<en:pan>".to_string()
            })
        );
        assert_eq!(service.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn hover_debounce_only_fires_for_last_target() {
        let mut fx = Fixture::new(TEXT);
        fx.hover(0, 0..13, 0);
        fx.hover(2, 0..13, 100);
        fx.hover(4, 0..13, 200);
        assert!(fx.poll(450).is_empty());
        let jobs = fx.poll(500);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].target, JobTarget::Hover { index: 4 });
    }

    #[test]
    fn hover_context_is_clipped_to_page_and_whitespace_never_fetches() {
        let mut fx = Fixture::new(TEXT);
        fx.hover(8, 8..13, 0);
        let jobs = fx.poll(300);
        assert_eq!(jobs[0].request.context.as_deref(), Some("bebo agua fresca."));

        fx.hover(9, 0..13, 400);
        assert!(fx.poll(1_000).is_empty());
        fx.orchestrator.hover_end();
        assert!(fx.orchestrator.hover().is_none());
    }

    #[test]
    fn rich_detail_lifecycle() {
        let service = ScriptedService {
            failing: vec!["agua".to_string()],
            ..ScriptedService::default()
        };
        let langs = LanguagePair::new("es", "en");
        let mut orchestrator = TranslationOrchestrator::default();

        let (first, job) = orchestrator.fetch_rich_detail(" pan ", Some("Ayer comí pan.".into()), &langs);
        assert_eq!(orchestrator.tabs().active_id(), Some(first));
        assert_eq!(job.request.text, "pan");
        assert!(orchestrator.complete(job.run(&service)));

        let (second, job) = orchestrator.fetch_rich_detail("agua", None, &langs);
        assert_eq!(orchestrator.tabs().active_id(), Some(second));
        orchestrator.complete(job.run(&service));
        assert!(matches!(
            orchestrator.tabs().get(second).map(|t| &t.state),
            Some(DetailState::Failed { error }) if error.contains("analysis unavailable")
        ));
        assert!(matches!(
            orchestrator.tabs().get(first).map(|t| &t.state),
            Some(DetailState::Ready { result }) if result.translation == "detail:pan"
        ));

        // regenerate supersedes the previous request for the same tab
        let stale = orchestrator.regenerate(first).expect("tab exists");
        let fresh = orchestrator.regenerate(first).expect("tab exists");
        assert_eq!(fresh.request.context.as_deref(), Some("Ayer comí pan."));
        assert!(!orchestrator.complete(stale.run(&service)));
        assert_eq!(
            orchestrator.tabs().get(first).map(|t| &t.state),
            Some(&DetailState::Loading)
        );
        assert!(orchestrator.complete(fresh.run(&service)));

        // results for closed tabs are dropped
        let pending = orchestrator.regenerate(second).expect("tab exists");
        assert!(orchestrator.close_tab(second));
        assert_eq!(orchestrator.tabs().active_id(), Some(first));
        assert!(!orchestrator.complete(pending.run(&service)));
        assert!(orchestrator.regenerate(second).is_none());

        orchestrator.close_all_tabs();
        assert!(orchestrator.tabs().is_empty());
        assert_eq!(orchestrator.in_flight_len(), 0);
    }

    #[test]
    fn sentence_mode_group_is_one_request() {
        let mut fx = Fixture::new(TEXT);
        fx.selection.set_mode(SelectionMode::Sentence);
        fx.click(8, 0);
        let jobs = fx.poll(500);
        assert_eq!(segment_keys(&jobs), vec![GroupKey { first: 6, last: 12 }]);
        assert_eq!(jobs[0].request.text, "Hoy bebo agua fresca.");
    }
}

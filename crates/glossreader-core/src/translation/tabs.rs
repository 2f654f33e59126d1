//! Rich detail tabs: user-opened analysis sessions that outlive the
//! selection they were opened from.

use serde::Serialize;
use ts_rs::TS;

use super::RequestId;
use super::service::{LanguagePair, RichDetailResult};

pub type TabId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "status", rename_all = "snake_case")]
#[ts(export)]
pub enum DetailState {
    Loading,
    Ready { result: RichDetailResult },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct RichDetailTab {
    pub id: TabId,
    pub text: String,
    pub context: Option<String>,
    pub languages: LanguagePair,
    pub state: DetailState,
    #[serde(skip)]
    #[ts(skip)]
    pub(crate) request: Option<RequestId>,
}

/// Ordered tab list with at most one active tab.
#[derive(Debug, Clone, Default)]
pub struct RichDetailTabs {
    tabs: Vec<RichDetailTab>,
    active: Option<TabId>,
    next_id: TabId,
}

impl RichDetailTabs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a loading tab and make it active.
    pub fn open(
        &mut self,
        text: String,
        context: Option<String>,
        languages: LanguagePair,
    ) -> TabId {
        self.next_id += 1;
        let id = self.next_id;
        self.tabs.push(RichDetailTab {
            id,
            text,
            context,
            languages,
            state: DetailState::Loading,
            request: None,
        });
        self.active = Some(id);
        id
    }

    /// Remove a tab. When it was active, the tab that takes its place in the
    /// list becomes active, else the one before it, else none.
    pub fn close(&mut self, id: TabId) -> Option<RichDetailTab> {
        let position = self.tabs.iter().position(|tab| tab.id == id)?;
        let removed = self.tabs.remove(position);
        if self.active == Some(id) {
            self.active = self
                .tabs
                .get(position)
                .or_else(|| position.checked_sub(1).and_then(|prev| self.tabs.get(prev)))
                .map(|tab| tab.id);
        }
        Some(removed)
    }

    pub fn close_all(&mut self) -> Vec<RichDetailTab> {
        self.active = None;
        std::mem::take(&mut self.tabs)
    }

    pub fn activate(&mut self, id: TabId) -> bool {
        if self.tabs.iter().any(|tab| tab.id == id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active(&self) -> Option<&RichDetailTab> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: TabId) -> Option<&RichDetailTab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: TabId) -> Option<&mut RichDetailTab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RichDetailTab> {
        self.tabs.iter()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_three() -> (RichDetailTabs, [TabId; 3]) {
        let mut tabs = RichDetailTabs::new();
        let langs = LanguagePair::new("de", "en");
        let a = tabs.open("a".into(), None, langs.clone());
        let b = tabs.open("b".into(), None, langs.clone());
        let c = tabs.open("c".into(), None, langs);
        (tabs, [a, b, c])
    }

    #[test]
    fn newest_tab_is_active_and_ids_are_unique() {
        let (tabs, [a, b, c]) = open_three();
        assert_eq!(tabs.active_id(), Some(c));
        assert!(a != b && b != c);
        assert_eq!(tabs.get(a).map(|tab| &tab.state), Some(&DetailState::Loading));
    }

    #[test]
    fn closing_active_middle_tab_promotes_next() {
        let (mut tabs, [a, b, c]) = open_three();
        tabs.activate(b);
        tabs.close(b);
        assert_eq!(tabs.active_id(), Some(c));
        assert_eq!(tabs.iter().map(|tab| tab.id).collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn closing_active_last_tab_promotes_previous() {
        let (mut tabs, [_, b, c]) = open_three();
        tabs.close(c);
        assert_eq!(tabs.active_id(), Some(b));
    }

    #[test]
    fn closing_inactive_tab_keeps_active() {
        let (mut tabs, [a, _, c]) = open_three();
        tabs.close(a);
        assert_eq!(tabs.active_id(), Some(c));
    }

    #[test]
    fn closing_everything_leaves_no_active_tab() {
        let (mut tabs, [a, b, c]) = open_three();
        tabs.close(c);
        tabs.close(b);
        tabs.close(a);
        assert_eq!(tabs.active_id(), None);
        assert!(tabs.close(a).is_none());

        let (mut tabs, _) = open_three();
        assert_eq!(tabs.close_all().len(), 3);
        assert!(tabs.is_empty());
        assert_eq!(tabs.active_id(), None);
    }
}

use super::SaveState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// What a page holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageContent {
    #[default]
    Text,
    Choice,
    Skip,
    Phase,
}

/// One screenful of text between two page breaks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub text: String,
    pub content: PageContent,
    /// Snapshot taken when the page started
    pub save_state: Option<SaveState>,
}

impl Page {
    pub fn new(content: PageContent, save_state: Option<SaveState>) -> Self {
        Self {
            text: String::new(),
            content,
            save_state,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Bounded ring of recent pages; the oldest page is evicted first
#[derive(Debug, Clone)]
pub struct History {
    pages: VecDeque<Page>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            pages: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.trim();
    }

    /// Append a page, replacing the previous one if it never got any text
    pub fn push_page(&mut self, page: Page) {
        if self.pages.back().is_some_and(Page::is_empty) {
            self.pages.pop_back();
        }
        self.pages.push_back(page);
        self.trim();
    }

    /// Start a new page at a page break
    pub fn on_page_break(&mut self, save_state: Option<SaveState>, content: PageContent) {
        self.push_page(Page::new(content, save_state));
    }

    /// Add text to the current page, opening one if there is none
    pub fn append_text(&mut self, text: &str) {
        if self.pages.is_empty() {
            self.pages.push_back(Page::default());
        }
        if let Some(page) = self.pages.back_mut() {
            page.text.push_str(text);
        }
    }

    /// Rewind to the page that captured `save_state`: it and every later
    /// page are discarded. Without a match the whole history is cleared.
    pub fn on_save_state_loaded(&mut self, save_state: &SaveState) {
        let fingerprint = save_state.fingerprint();
        let found = self.pages.iter().rposition(|page| {
            page.save_state
                .as_ref()
                .is_some_and(|ss| ss.fingerprint() == fingerprint)
        });
        match found {
            Some(at) => self.pages.truncate(at),
            None => self.pages.clear(),
        }
    }

    pub fn pages(&self) -> impl DoubleEndedIterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn last(&self) -> Option<&Page> {
        self.pages.back()
    }

    pub fn last_mut(&mut self) -> Option<&mut Page> {
        self.pages.back_mut()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    fn trim(&mut self) {
        while self.pages.len() > self.limit {
            self.pages.pop_front();
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::types::Settings::default().history_limit)
    }
}

//! Search box over the static stock list: filtering, pagination and the
//! commit rules for picking a code.

use serde::Serialize;
use tracing::debug;

use crate::catalog::{CatalogEntry, CatalogState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
pub enum SearchKey {
    Enter,
    Escape,
}

/// What the presentation layer renders for the result panel.
#[derive(Clone, Debug, Serialize)]
pub struct SearchView {
    pub query: String,
    pub open: bool,
    pub loading: bool,
    pub page: usize,
    pub total_pages: usize,
    pub items: Vec<CatalogEntry>,
    pub no_results: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_error: Option<String>,
}

pub struct SearchSelector {
    catalog: CatalogState,
    query: String,
    page: usize,
    open: bool,
    page_size: usize,
}

impl SearchSelector {
    pub fn new(page_size: usize) -> Self {
        Self {
            catalog: CatalogState::Loading,
            query: String::new(),
            page: 1,
            open: false,
            page_size: page_size.max(1),
        }
    }

    pub fn set_catalog(&mut self, catalog: CatalogState) {
        self.catalog = catalog;
    }

    pub fn is_loading(&self) -> bool {
        self.catalog.is_loading()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    #[cfg(test)]
    pub fn page(&self) -> usize {
        self.page
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Keystroke in the input. Ignored while the stock list is still loading,
    /// like a disabled input. Returns whether the text was taken.
    pub fn set_query(&mut self, text: &str) -> bool {
        if self.is_loading() {
            debug!("[SEARCH] Input ignored while stock list loads");
            return false;
        }
        self.replace_query(text);
        self.open = !text.trim().is_empty();
        true
    }

    fn replace_query(&mut self, text: &str) {
        if self.query != text {
            self.page = 1;
        }
        self.query = text.to_string();
    }

    /// All entries matching the current query. A blank query matches nothing.
    pub fn matches(&self) -> Vec<&CatalogEntry> {
        if self.query.trim().is_empty() {
            return Vec::new();
        }
        let needle = self.query.to_lowercase();
        self.catalog
            .entries()
            .iter()
            .filter(|entry| entry.matches(&needle))
            .collect()
    }

    pub fn total_pages(&self) -> usize {
        self.matches().len().div_ceil(self.page_size)
    }

    pub fn current_page_items(&self) -> Vec<&CatalogEntry> {
        let start = (self.page - 1) * self.page_size;
        self.matches()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }

    pub fn next_page(&mut self) {
        if self.page < self.total_pages() {
            self.page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        if self.page > 1 {
            self.page -= 1;
        }
    }

    /// Pick the `index`-th item of the current page. Returns the code to load
    /// when it differs from `current_code`.
    pub fn pick(&mut self, index: usize, current_code: &str) -> Option<String> {
        let code = self.current_page_items().get(index)?.code().to_string();
        self.commit_entry(code, current_code)
    }

    fn commit_entry(&mut self, code: String, current_code: &str) -> Option<String> {
        self.replace_query(&code);
        self.open = false;
        if code == current_code {
            debug!("[SEARCH] {} already loaded", code);
            return None;
        }
        Some(code)
    }

    /// Enter picks the first item on the page, or commits the typed text
    /// verbatim when nothing matches. Escape only closes the panel.
    pub fn press(&mut self, key: SearchKey, current_code: &str) -> Option<String> {
        match key {
            SearchKey::Escape => {
                self.open = false;
                None
            }
            SearchKey::Enter => {
                let typed = self.query.trim().to_string();
                if typed.is_empty() {
                    return None;
                }
                if !self.current_page_items().is_empty() {
                    return self.pick(0, current_code);
                }
                self.open = false;
                Some(typed)
            }
        }
    }

    /// Click outside the control.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn view(&self) -> SearchView {
        let items: Vec<CatalogEntry> = self.current_page_items().into_iter().cloned().collect();
        SearchView {
            query: self.query.clone(),
            open: self.open,
            loading: self.is_loading(),
            page: self.page,
            total_pages: self.total_pages(),
            no_results: !self.query.trim().is_empty() && items.is_empty(),
            items,
            catalog_error: self.catalog.error().map(str::to_string),
        }
    }
}

//! Page-wide state owned by the chain coordinator: the search box, the
//! committed selection, the current quote and the pending auto-start.

use serde::Serialize;

use crate::error::QuoteError;
use crate::events::PageParams;
use crate::quote::{is_snapshot_valid, QuoteSnapshot};
use crate::search::{SearchKey, SearchSelector};

/// The committed code and the free-typed query next to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SecuritySelection {
    pub code: String,
    pub query: String,
}

/// Result of a finished fetch, as seen by the session.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A newer fetch was started meanwhile; the result was dropped
    Superseded,
    Loaded {
        snapshot: QuoteSnapshot,
        params: PageParams,
        auto_start: bool,
    },
    Failed {
        reason: String,
    },
}

/// What the quote panel renders.
#[derive(Clone, Debug, Serialize)]
pub struct QuoteView {
    pub code: String,
    pub query: String,
    pub loading: bool,
    pub valid: bool,
    pub snapshot: Option<QuoteSnapshot>,
}

pub struct AppSession {
    pub search: SearchSelector,
    selection: SecuritySelection,
    snapshot: Option<QuoteSnapshot>,
    params: PageParams,
    pending_auto_start: bool,
    fetch_generation: u64,
    fetch_in_flight: bool,
}

impl AppSession {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: SearchSelector::new(page_size),
            selection: SecuritySelection::default(),
            snapshot: None,
            params: PageParams::default(),
            pending_auto_start: false,
            fetch_generation: 0,
            fetch_in_flight: false,
        }
    }

    pub fn selection(&self) -> &SecuritySelection {
        &self.selection
    }

    pub fn snapshot(&self) -> Option<&QuoteSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn params(&self) -> &PageParams {
        &self.params
    }

    pub fn set_params(&mut self, params: PageParams) {
        self.params = params;
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn pending_auto_start(&self) -> bool {
        self.pending_auto_start
    }

    /// Keystroke in the search box; mirrored into the selection query.
    pub fn set_query(&mut self, text: &str) -> bool {
        if !self.search.set_query(text) {
            return false;
        }
        self.selection.query = text.to_string();
        true
    }

    /// Pick the `index`-th item of the result page. Returns the code to fetch.
    pub fn pick(&mut self, index: usize) -> Option<String> {
        let code = self.search.pick(index, &self.selection.code);
        self.selection.query = self.search.query().to_string();
        code
    }

    pub fn press(&mut self, key: SearchKey) -> Option<String> {
        let code = self.search.press(key, &self.selection.code);
        self.selection.query = self.search.query().to_string();
        code
    }

    /// The code a diagnosis request is about: the typed query if any,
    /// otherwise the committed code.
    pub fn diagnosis_target(&self) -> Option<String> {
        [self.selection.query.trim(), self.selection.code.as_str()]
            .into_iter()
            .find(|code| !code.is_empty())
            .map(str::to_string)
    }

    /// Register a new fetch. A newer fetch replaces the auto-start intent of
    /// any fetch still in flight.
    pub fn begin_fetch(&mut self, auto_start: bool) -> u64 {
        self.fetch_generation += 1;
        self.fetch_in_flight = true;
        self.pending_auto_start = auto_start;
        self.fetch_generation
    }

    /// Apply a fetch result. The pending auto-start is consumed either way.
    pub fn finish_fetch(
        &mut self,
        generation: u64,
        code: &str,
        result: Result<QuoteSnapshot, QuoteError>,
    ) -> FetchOutcome {
        if generation != self.fetch_generation {
            return FetchOutcome::Superseded;
        }
        self.fetch_in_flight = false;
        let auto_start = std::mem::take(&mut self.pending_auto_start);

        match result {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot.clone());
                self.selection.code = code.to_string();
                self.selection.query = code.to_string();
                FetchOutcome::Loaded {
                    snapshot,
                    params: self.params.clone(),
                    auto_start,
                }
            }
            Err(e) => FetchOutcome::Failed { reason: e.to_string() },
        }
    }

    pub fn quote_view(&self) -> QuoteView {
        QuoteView {
            code: self.selection.code.clone(),
            query: self.selection.query.clone(),
            loading: self.fetch_in_flight,
            valid: is_snapshot_valid(self.snapshot.as_ref()),
            snapshot: self.snapshot.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogState;
    use crate::testing::valid_snapshot;

    fn http_404(code: &str) -> QuoteError {
        QuoteError::Http {
            code: code.to_string(),
            status: 404,
        }
    }

    #[test]
    fn test_successful_fetch_commits_code() {
        let mut session = AppSession::new(5);
        let generation = session.begin_fetch(true);
        assert!(session.is_fetching());
        assert!(session.pending_auto_start());

        match session.finish_fetch(generation, "8301", Ok(valid_snapshot("8301", "Acme Bank"))) {
            FetchOutcome::Loaded { auto_start, snapshot, .. } => {
                assert!(auto_start);
                assert_eq!(snapshot.info.name, "Acme Bank");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(!session.is_fetching());
        assert!(!session.pending_auto_start());
        assert_eq!(session.selection().code, "8301");
        assert_eq!(session.selection().query, "8301");
        assert!(session.quote_view().valid);
    }

    #[test]
    fn test_failed_fetch_clears_pending_and_keeps_previous_quote() {
        let mut session = AppSession::new(5);
        let first = session.begin_fetch(false);
        session.finish_fetch(first, "8301", Ok(valid_snapshot("8301", "Acme Bank")));

        let second = session.begin_fetch(true);
        let outcome = session.finish_fetch(second, "9999", Err(http_404("9999")));
        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert!(!session.pending_auto_start());
        assert_eq!(session.selection().code, "8301");
        assert_eq!(session.snapshot().unwrap().info.code, "8301");
    }

    #[test]
    fn test_superseded_fetch_is_dropped() {
        let mut session = AppSession::new(5);
        let stale = session.begin_fetch(true);
        let fresh = session.begin_fetch(false);

        assert!(matches!(
            session.finish_fetch(stale, "8301", Ok(valid_snapshot("8301", "Acme Bank"))),
            FetchOutcome::Superseded
        ));
        assert!(session.is_fetching());
        assert_eq!(session.selection().code, "");

        assert!(matches!(
            session.finish_fetch(fresh, "8306", Ok(valid_snapshot("8306", "Beta Bank"))),
            FetchOutcome::Loaded { auto_start: false, .. }
        ));
        assert_eq!(session.selection().code, "8306");
    }

    #[test]
    fn test_diagnosis_target_prefers_typed_query() {
        let mut session = AppSession::new(5);
        assert_eq!(session.diagnosis_target(), None);

        let generation = session.begin_fetch(false);
        session.finish_fetch(generation, "8301", Ok(valid_snapshot("8301", "Acme Bank")));
        assert_eq!(session.diagnosis_target().as_deref(), Some("8301"));

        session.search.set_catalog(CatalogState::Ready(Default::default()));
        assert!(session.set_query(" 6758 "));
        assert_eq!(session.diagnosis_target().as_deref(), Some("6758"));

        assert!(session.set_query("   "));
        assert_eq!(session.diagnosis_target().as_deref(), Some("8301"));
    }

    #[test]
    fn test_query_ignored_while_catalog_loads() {
        let mut session = AppSession::new(5);
        assert!(!session.set_query("toyota"));
        assert_eq!(session.selection().query, "");
    }
}

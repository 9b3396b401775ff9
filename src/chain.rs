//! Glue between the search box, the quote fetch and the diagnosis: picking
//! a new code and asking for a diagnosis fetches first, then starts exactly
//! once with the fresh snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::catalog::CatalogState;
use crate::conversion::{ConversionResult, RedirectApi};
use crate::diagnosis::{DiagnosisOrchestrator, DiagnosisSession};
use crate::events::{ConversionEvent, Event, PageParams, QuoteEvent};
use crate::quote::QuoteApi;
use crate::search::{SearchKey, SearchView};
use crate::session::{AppSession, FetchOutcome, QuoteView};

/// What to do once a quote fetch has succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AfterFetch {
    Show,
    Diagnose,
}

pub struct ChainCoordinator {
    session: Mutex<AppSession>,
    quotes: Arc<dyn QuoteApi>,
    redirects: Arc<dyn RedirectApi>,
    orchestrator: Arc<DiagnosisOrchestrator>,
    bus: EventBus,
}

impl ChainCoordinator {
    pub fn new(
        session: AppSession,
        quotes: Arc<dyn QuoteApi>,
        redirects: Arc<dyn RedirectApi>,
        orchestrator: Arc<DiagnosisOrchestrator>,
        bus: EventBus,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            quotes,
            redirects,
            orchestrator,
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn orchestrator(&self) -> &DiagnosisOrchestrator {
        &self.orchestrator
    }

    // ============= Page =============

    /// Page opened with URL parameters. A `code` parameter loads its quote;
    /// it never starts a diagnosis.
    pub async fn open_page(&self, params: PageParams) -> QuoteView {
        let code = params.code.clone().filter(|c| !c.trim().is_empty());
        self.lock().set_params(params);

        if let Some(code) = code {
            info!("[CHAIN] Page opened for {}", code);
            self.fetch_quote(&code, AfterFetch::Show).await;
        }
        self.quote()
    }

    pub fn set_catalog(&self, catalog: CatalogState) {
        self.lock().search.set_catalog(catalog);
    }

    // ============= Search =============

    pub fn search_input(&self, text: &str) -> SearchView {
        let mut session = self.lock();
        session.set_query(text);
        session.search.view()
    }

    pub async fn search_key(&self, key: SearchKey) -> SearchView {
        let code = self.lock().press(key);
        self.load_selection(code).await
    }

    pub async fn search_pick(&self, index: usize) -> SearchView {
        let code = self.lock().pick(index);
        self.load_selection(code).await
    }

    async fn load_selection(&self, code: Option<String>) -> SearchView {
        if let Some(code) = code {
            debug!("[SEARCH] Selected {}", code);
            self.fetch_quote(&code, AfterFetch::Show).await;
        }
        self.search()
    }

    pub fn search_next(&self) -> SearchView {
        let mut session = self.lock();
        session.search.next_page();
        session.search.view()
    }

    pub fn search_prev(&self) -> SearchView {
        let mut session = self.lock();
        session.search.prev_page();
        session.search.view()
    }

    pub fn search_close(&self) -> SearchView {
        let mut session = self.lock();
        session.search.close();
        session.search.view()
    }

    pub fn search(&self) -> SearchView {
        self.lock().search.view()
    }

    // ============= Quote =============

    pub fn quote(&self) -> QuoteView {
        self.lock().quote_view()
    }

    /// Fetch `code` and, for [`AfterFetch::Diagnose`], start the diagnosis
    /// once the snapshot is stored. Returns the diagnosis run if one started.
    pub async fn fetch_quote(&self, code: &str, after: AfterFetch) -> Option<JoinHandle<()>> {
        let generation = self.lock().begin_fetch(after == AfterFetch::Diagnose);

        let result = self.quotes.fetch_quote(code).await;
        if let Err(e) = &result {
            warn!("⚠️ [QUOTE] Fetch for {} failed: {}", code, e);
        }

        let outcome = self.lock().finish_fetch(generation, code, result);
        match outcome {
            FetchOutcome::Superseded => {
                debug!("[QUOTE] Result for {} superseded by a newer fetch", code);
                None
            }
            FetchOutcome::Failed { reason } => {
                self.bus.publish(Event::Quote(QuoteEvent::Failed {
                    code: code.to_string(),
                    reason,
                }));
                None
            }
            FetchOutcome::Loaded {
                snapshot,
                params,
                auto_start,
            } => {
                info!("📈 [QUOTE] Loaded {} ({})", code, snapshot.info.name);
                self.bus.publish(Event::Quote(QuoteEvent::Loaded {
                    code: code.to_string(),
                    name: snapshot.info.name.clone(),
                    params,
                }));

                if !auto_start {
                    return None;
                }
                if !self.orchestrator.is_idle() {
                    info!("[CHAIN] Diagnosis busy; auto-start for {} dropped", code);
                    return None;
                }
                self.orchestrator.start(code, Some(snapshot))
            }
        }
    }

    // ============= Diagnosis =============

    /// Diagnose `code`. The held snapshot is reused when `code` is already
    /// committed; otherwise the quote is fetched first.
    pub async fn select_and_diagnose(&self, code: &str) -> Option<JoinHandle<()>> {
        let code = code.trim();
        if code.is_empty() {
            warn!("⚠️ [CHAIN] Nothing to diagnose");
            return None;
        }
        if !self.orchestrator.is_idle() {
            debug!("[CHAIN] Diagnosis already active; {} ignored", code);
            return None;
        }

        let held = {
            let session = self.lock();
            (session.selection().code == code).then(|| session.snapshot().cloned())
        };

        match held {
            Some(snapshot) => self.orchestrator.start(code, snapshot),
            None => {
                info!("[CHAIN] Fetching {} before diagnosis", code);
                self.fetch_quote(code, AfterFetch::Diagnose).await
            }
        }
    }

    /// The diagnosis button: the typed query wins over the committed code.
    pub async fn run_diagnosis(&self) -> Option<JoinHandle<()>> {
        let target = self.lock().diagnosis_target().unwrap_or_default();
        self.select_and_diagnose(&target).await
    }

    pub fn diagnosis(&self) -> DiagnosisSession {
        self.orchestrator.session()
    }

    pub fn dismiss(&self) -> bool {
        self.orchestrator.dismiss()
    }

    // ============= Conversion =============

    /// Resolve the active redirect link. The caller navigates to it.
    pub async fn convert(&self) -> ConversionResult<String> {
        let url = match self.redirects.select_redirect().await.and_then(|s| s.into_url()) {
            Ok(url) => url,
            Err(e) => {
                warn!("⚠️ [CONVERSION] {}", e);
                return Err(e);
            }
        };

        let gclid = self.lock().params().gclid.clone();
        info!("🔗 [CONVERSION] Redirecting to {}", url);
        self.bus.publish(Event::Conversion(ConversionEvent {
            gclid,
            redirect_url: url.clone(),
        }));
        Ok(url)
    }
}

//! Diagnosis lifecycle: one attempt at a time, simulated progress alongside
//! the real request, and a fallback narrative on every failure.

use futures_util::StreamExt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::config::DiagnosisTimings;
use crate::error::DiagnosisError;
use crate::events::{DiagnosisEvent, Event};
use crate::quote::types::required_fields;
use crate::quote::QuoteSnapshot;

use super::client::{AnalysisDocument, ChunkStream, DiagnosisApi, DiagnosisReply, DiagnosisRequest, DiagnosisResult};
use super::fallback::fallback_message;
use super::progress::{spawn_animator, ProgressCurve, TaskGuard};
use super::state::{DiagnosisSession, DiagnosisState, SessionCell};
use super::stream::{RecordDecoder, StreamPayload};

pub struct DiagnosisOrchestrator {
    cell: SessionCell,
    api: Arc<dyn DiagnosisApi>,
    bus: EventBus,
    timings: DiagnosisTimings,
    run: Mutex<Option<AbortHandle>>,
}

impl DiagnosisOrchestrator {
    pub fn new(api: Arc<dyn DiagnosisApi>, bus: EventBus, timings: DiagnosisTimings) -> Self {
        Self {
            cell: SessionCell::new(bus.clone()),
            api,
            bus,
            timings,
            run: Mutex::new(None),
        }
    }

    pub fn session(&self) -> DiagnosisSession {
        self.cell.snapshot()
    }

    pub fn state(&self) -> DiagnosisState {
        self.cell.state()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == DiagnosisState::Initial
    }

    /// Begin a diagnosis of `code`. Returns `None` while another attempt is
    /// active; otherwise the handle of the spawned run.
    ///
    /// Without a usable snapshot no request is made: progress is simulated
    /// and the fallback narrative is shown.
    pub fn start(&self, code: &str, snapshot: Option<QuoteSnapshot>) -> Option<JoinHandle<()>> {
        // Held until the handle is stored so a concurrent dismiss cannot
        // abort a run it did not end.
        let mut slot = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(epoch) = self.cell.begin(code) else {
            warn!("⚠️ [DIAGNOSIS] {} ignored: a diagnosis is already active", code);
            return None;
        };

        let run = DiagnosisRun {
            cell: self.cell.clone(),
            api: self.api.clone(),
            bus: self.bus.clone(),
            timings: self.timings.clone(),
            epoch,
            code: code.to_string(),
        };

        let handle = match snapshot.filter(QuoteSnapshot::is_valid) {
            Some(snapshot) => {
                info!("🔍 [DIAGNOSIS] Starting live diagnosis for {}", code);
                tokio::spawn(run.live(snapshot))
            }
            None => {
                info!(
                    "🔍 [DIAGNOSIS] No usable quote data for {} (needs {}), simulating",
                    code,
                    required_fields().join(", ")
                );
                tokio::spawn(run.simulated())
            }
        };

        *slot = Some(handle.abort_handle());
        Some(handle)
    }

    /// Close the result view. Any read still in progress is abandoned.
    pub fn dismiss(&self) -> bool {
        let mut slot = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.cell.dismiss() {
            return false;
        }
        if let Some(run) = slot.take() {
            run.abort();
        }
        drop(slot);
        info!("[DIAGNOSIS] Result dismissed");
        true
    }
}

/// Everything one spawned attempt needs; writes are tagged with `epoch`.
struct DiagnosisRun {
    cell: SessionCell,
    api: Arc<dyn DiagnosisApi>,
    bus: EventBus,
    timings: DiagnosisTimings,
    epoch: u64,
    code: String,
}

impl DiagnosisRun {
    fn animate(&self, curve: ProgressCurve) -> TaskGuard {
        spawn_animator(self.cell.clone(), self.epoch, curve, self.timings.tick_interval())
    }

    async fn simulated(self) {
        let mut animator = self.animate(ProgressCurve::linear(&self.timings));
        sleep(self.timings.simulated_duration()).await;
        self.finish_with_fallback(&mut animator).await;
    }

    async fn live(self, snapshot: QuoteSnapshot) {
        let mut animator = self.animate(ProgressCurve::tiered(&self.timings));

        if let Err(e) = self.consume(&snapshot, &mut animator).await {
            warn!("⚠️ [DIAGNOSIS] {} failed: {}", self.code, e);
            self.finish_with_fallback(&mut animator).await;
        }
    }

    async fn consume(&self, snapshot: &QuoteSnapshot, animator: &mut TaskGuard) -> DiagnosisResult<()> {
        let request = DiagnosisRequest::from_snapshot(&self.code, snapshot);

        let reply = tokio::time::timeout(self.timings.request_timeout(), self.api.request(&request))
            .await
            .map_err(|_| DiagnosisError::Timeout {
                timeout_ms: self.timings.request_timeout_ms,
            })??;

        let name = snapshot.info.name.as_str();
        match reply {
            DiagnosisReply::Stream(chunks) => self.consume_stream(chunks, animator, name).await,
            DiagnosisReply::Document(body) => self.consume_document(&body, animator, name).await,
        }
    }

    async fn consume_stream(
        &self,
        mut chunks: ChunkStream,
        animator: &mut TaskGuard,
        name: &str,
    ) -> DiagnosisResult<()> {
        self.cell.advance(self.epoch, DiagnosisState::Processing);

        let mut decoder = RecordDecoder::new();
        let mut reveal: Option<TaskGuard> = None;

        loop {
            let (records, ended) = match chunks.next().await {
                Some(chunk) => (decoder.feed(&chunk?), false),
                None => (decoder.finish(), true),
            };

            for data in records {
                if self.apply_record(&data, animator, &mut reveal)? {
                    return self.complete_stream(reveal, name).await;
                }
            }

            if ended {
                break;
            }
        }

        if self.cell.has_text(self.epoch) {
            info!("[DIAGNOSIS] Stream for {} ended without done; treating as complete", self.code);
            return self.complete_stream(reveal, name).await;
        }
        Err(DiagnosisError::EmptyAnalysis)
    }

    /// Apply one record. Returns whether it marked the end of the diagnosis.
    fn apply_record(
        &self,
        data: &str,
        animator: &mut TaskGuard,
        reveal: &mut Option<TaskGuard>,
    ) -> DiagnosisResult<bool> {
        let payload = match StreamPayload::parse(data) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("⚠️ [DIAGNOSIS] Skipping malformed record: {}", e);
                return Ok(false);
            }
        };

        if let Some(message) = payload.error() {
            return Err(DiagnosisError::Remote {
                message: message.to_string(),
            });
        }

        if let Some(content) = payload.content() {
            let visible = self.cell.append(self.epoch, content);
            if visible && reveal.is_none() {
                animator.stop();
                self.cell.complete_progress(self.epoch);
                *reveal = Some(self.schedule_reveal());
            }
        }

        Ok(payload.is_done())
    }

    /// Show the text while the stream keeps flowing, once the settle delay
    /// has passed.
    fn schedule_reveal(&self) -> TaskGuard {
        let cell = self.cell.clone();
        let epoch = self.epoch;
        let settle = self.timings.settle_delay();
        TaskGuard::spawn(async move {
            sleep(settle).await;
            cell.hand_off(epoch, DiagnosisState::Streaming, None);
        })
    }

    async fn complete_stream(&self, reveal: Option<TaskGuard>, name: &str) -> DiagnosisResult<()> {
        let Some(reveal) = reveal else {
            return Err(DiagnosisError::EmptyAnalysis);
        };
        // `streaming` must be reached before `results`
        reveal.join().await;

        if self.cell.advance(self.epoch, DiagnosisState::Results) {
            self.report_completion(name);
        }
        Ok(())
    }

    async fn consume_document(&self, body: &str, animator: &mut TaskGuard, name: &str) -> DiagnosisResult<()> {
        let text = serde_json::from_str::<AnalysisDocument>(body)?
            .into_text()
            .ok_or(DiagnosisError::EmptyAnalysis)?;

        self.settle(animator).await;
        if self.cell.hand_off(self.epoch, DiagnosisState::Results, Some(text)) {
            self.report_completion(name);
        }
        Ok(())
    }

    /// Stop the animator, snap to 100 and give the completion animation its
    /// time before anything is hidden.
    async fn settle(&self, animator: &mut TaskGuard) {
        animator.stop();
        self.cell.complete_progress(self.epoch);
        sleep(self.timings.settle_delay()).await;
    }

    async fn finish_with_fallback(&self, animator: &mut TaskGuard) {
        self.settle(animator).await;
        if self
            .cell
            .hand_off(self.epoch, DiagnosisState::Results, Some(fallback_message(&self.code)))
        {
            debug!("[DIAGNOSIS] Fallback narrative shown for {}", self.code);
        }
    }

    fn report_completion(&self, name: &str) {
        let duration_ms = self
            .cell
            .elapsed(self.epoch)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();

        info!("✅ [DIAGNOSIS] {} completed in {}ms", self.code, duration_ms);
        self.bus.publish(Event::Diagnosis(DiagnosisEvent::Completed {
            code: self.code.clone(),
            name: name.to_string(),
            duration_ms,
        }));
    }
}

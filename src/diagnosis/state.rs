use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::bus::EventBus;
use crate::constants::diagnosis::PROGRESS_COMPLETE;
use crate::events::{DiagnosisEvent, Event};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisState {
    #[default]
    Initial,
    Connecting,
    Processing,
    Streaming,
    Results,
}

impl DiagnosisState {
    /// Forward edges of the lifecycle. `Results -> Initial` is not an
    /// advance; only a dismiss resets the session.
    pub fn can_advance_to(self, next: DiagnosisState) -> bool {
        use DiagnosisState::*;
        matches!(
            (self, next),
            (Initial, Connecting)
                | (Connecting, Processing)
                | (Connecting, Results)
                | (Processing, Streaming)
                | (Processing, Results)
                | (Streaming, Results)
        )
    }

    /// The result view is open
    pub fn is_dismissable(self) -> bool {
        matches!(self, DiagnosisState::Streaming | DiagnosisState::Results)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, DiagnosisState::Connecting | DiagnosisState::Processing)
    }
}

/// Mutable state of one diagnosis attempt.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DiagnosisSession {
    pub code: String,
    pub state: DiagnosisState,
    pub result_text: String,
    pub progress: f64,
    pub overlay_visible: bool,
    #[serde(skip)]
    pub started_at: Option<Instant>,
    #[serde(skip)]
    epoch: u64,
}

impl DiagnosisSession {
    /// Identifies the attempt; bumped on every start and dismiss.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Shared handle to the single diagnosis session. Every write names the
/// epoch it belongs to and is dropped if that attempt has been superseded.
#[derive(Clone)]
pub struct SessionCell {
    inner: Arc<Mutex<DiagnosisSession>>,
    bus: EventBus,
}

impl SessionCell {
    pub fn new(bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DiagnosisSession::default())),
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DiagnosisSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: DiagnosisEvent) {
        self.bus.publish(Event::Diagnosis(event));
    }

    pub fn snapshot(&self) -> DiagnosisSession {
        self.lock().clone()
    }

    pub fn state(&self) -> DiagnosisState {
        self.lock().state
    }

    /// Open a fresh attempt. Refused unless the session is `Initial`.
    pub fn begin(&self, code: &str) -> Option<u64> {
        let epoch = {
            let mut session = self.lock();
            if session.state != DiagnosisState::Initial {
                return None;
            }
            let epoch = session.epoch + 1;
            *session = DiagnosisSession {
                code: code.to_string(),
                state: DiagnosisState::Connecting,
                result_text: String::new(),
                progress: 0.0,
                overlay_visible: true,
                started_at: Some(Instant::now()),
                epoch,
            };
            epoch
        };

        self.emit(DiagnosisEvent::Started {
            code: code.to_string(),
        });
        self.emit(DiagnosisEvent::StateChanged {
            code: code.to_string(),
            state: DiagnosisState::Connecting,
        });
        Some(epoch)
    }

    fn with_current<R>(&self, epoch: u64, f: impl FnOnce(&mut DiagnosisSession) -> R) -> Option<R> {
        let mut session = self.lock();
        if session.epoch != epoch {
            return None;
        }
        Some(f(&mut session))
    }

    pub fn advance(&self, epoch: u64, next: DiagnosisState) -> bool {
        let code = self.with_current(epoch, |s| {
            if !s.state.can_advance_to(next) {
                debug!("[DIAGNOSIS] Ignoring {:?} -> {:?}", s.state, next);
                return None;
            }
            s.state = next;
            Some(s.code.clone())
        });

        match code.flatten() {
            Some(code) => {
                self.emit(DiagnosisEvent::StateChanged { code, state: next });
                true
            }
            None => false,
        }
    }

    /// Move progress forward by `step(current)`. The result is clamped to
    /// `[current, 100]`. Returns the new value, or `None` once the attempt is
    /// gone or progress is complete.
    pub fn bump_progress(&self, epoch: u64, step: impl FnOnce(f64) -> f64) -> Option<f64> {
        let (code, progress) = self
            .with_current(epoch, |s| {
                if s.progress >= PROGRESS_COMPLETE {
                    return None;
                }
                let next = step(s.progress).clamp(s.progress, PROGRESS_COMPLETE);
                if next == s.progress {
                    return Some((None, next));
                }
                s.progress = next;
                Some((Some(s.code.clone()), next))
            })
            .flatten()?;

        if let Some(code) = code {
            self.emit(DiagnosisEvent::Progress { code, progress });
        }
        Some(progress)
    }

    pub fn complete_progress(&self, epoch: u64) {
        let code = self
            .with_current(epoch, |s| {
                if s.progress >= PROGRESS_COMPLETE {
                    return None;
                }
                s.progress = PROGRESS_COMPLETE;
                Some(s.code.clone())
            })
            .flatten();

        if let Some(code) = code {
            self.emit(DiagnosisEvent::Progress {
                code,
                progress: PROGRESS_COMPLETE,
            });
        }
    }

    /// Append a stream fragment. Returns whether the accumulated text now has
    /// visible content.
    pub fn append(&self, epoch: u64, chunk: &str) -> bool {
        let appended = self.with_current(epoch, |s| {
            s.result_text.push_str(chunk);
            (s.code.clone(), !s.result_text.trim().is_empty())
        });

        match appended {
            Some((code, has_text)) => {
                self.emit(DiagnosisEvent::Content {
                    code,
                    chunk: chunk.to_string(),
                });
                has_text
            }
            None => false,
        }
    }

    /// Terminal hand-off: hide the overlay, optionally replace the text, and
    /// move to `next`, all under one lock.
    pub fn hand_off(&self, epoch: u64, next: DiagnosisState, text: Option<String>) -> bool {
        let code = self
            .with_current(epoch, |s| {
                if !s.state.can_advance_to(next) {
                    debug!("[DIAGNOSIS] Hand-off {:?} -> {:?} skipped", s.state, next);
                    return None;
                }
                s.progress = PROGRESS_COMPLETE;
                s.overlay_visible = false;
                if let Some(text) = text {
                    s.result_text = text;
                }
                s.state = next;
                Some(s.code.clone())
            })
            .flatten();

        match code {
            Some(code) => {
                self.emit(DiagnosisEvent::OverlayHidden { code: code.clone() });
                self.emit(DiagnosisEvent::StateChanged { code, state: next });
                true
            }
            None => false,
        }
    }

    pub fn has_text(&self, epoch: u64) -> bool {
        self.with_current(epoch, |s| !s.result_text.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn elapsed(&self, epoch: u64) -> Option<Duration> {
        self.with_current(epoch, |s| s.started_at.map(|t| t.elapsed()))
            .flatten()
    }

    /// Close the result view and return to `Initial`. Only legal once the
    /// result is visible.
    pub fn dismiss(&self) -> bool {
        {
            let mut session = self.lock();
            if !session.state.is_dismissable() {
                return false;
            }
            let epoch = session.epoch + 1;
            *session = DiagnosisSession {
                epoch,
                ..DiagnosisSession::default()
            };
        }
        self.emit(DiagnosisEvent::Dismissed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> SessionCell {
        SessionCell::new(EventBus::new(64))
    }

    #[test]
    fn test_lifecycle_edges() {
        use DiagnosisState::*;
        assert!(Initial.can_advance_to(Connecting));
        assert!(Connecting.can_advance_to(Results));
        assert!(Processing.can_advance_to(Streaming));
        assert!(!Connecting.can_advance_to(Streaming));
        assert!(!Results.can_advance_to(Initial));
        assert!(!Streaming.can_advance_to(Processing));
        assert!(!Initial.can_advance_to(Results));
    }

    #[tokio::test]
    async fn test_begin_is_guarded() {
        let cell = cell();
        let epoch = cell.begin("7203").unwrap();
        assert!(cell.begin("7203").is_none());

        let session = cell.snapshot();
        assert_eq!(session.epoch(), epoch);
        assert_eq!(session.state, DiagnosisState::Connecting);
        assert!(session.overlay_visible);
        assert_eq!(session.progress, 0.0);
        assert!(session.started_at.is_some());
    }

    #[tokio::test]
    async fn test_progress_never_regresses() {
        let cell = cell();
        let epoch = cell.begin("7203").unwrap();

        assert_eq!(cell.bump_progress(epoch, |p| p + 40.0), Some(40.0));
        assert_eq!(cell.bump_progress(epoch, |_| 10.0), Some(40.0));
        assert_eq!(cell.bump_progress(epoch, |p| p + 500.0), Some(100.0));
        assert_eq!(cell.bump_progress(epoch, |p| p + 1.0), None);
    }

    #[tokio::test]
    async fn test_stale_epoch_writes_are_dropped() {
        let cell = cell();
        let stale = cell.begin("7203").unwrap();
        cell.hand_off(stale, DiagnosisState::Results, Some("done".into()));
        assert!(cell.dismiss());
        let fresh = cell.begin("6758").unwrap();

        assert!(!cell.append(stale, "late"));
        assert_eq!(cell.bump_progress(stale, |p| p + 50.0), None);
        assert!(!cell.advance(stale, DiagnosisState::Processing));

        let session = cell.snapshot();
        assert_eq!(session.epoch(), fresh);
        assert_eq!(session.code, "6758");
        assert_eq!(session.result_text, "");
        assert_eq!(session.state, DiagnosisState::Connecting);
    }

    #[tokio::test]
    async fn test_hand_off_hides_overlay_and_completes_progress() {
        let cell = cell();
        let epoch = cell.begin("7203").unwrap();
        assert!(cell.hand_off(epoch, DiagnosisState::Results, Some("text".into())));

        let session = cell.snapshot();
        assert!(!session.overlay_visible);
        assert_eq!(session.progress, 100.0);
        assert_eq!(session.result_text, "text");

        // No second hand-off out of Results
        assert!(!cell.hand_off(epoch, DiagnosisState::Streaming, None));
    }

    #[tokio::test]
    async fn test_dismiss_only_when_result_visible() {
        let cell = cell();
        assert!(!cell.dismiss());
        let epoch = cell.begin("7203").unwrap();
        assert!(!cell.dismiss());

        cell.advance(epoch, DiagnosisState::Processing);
        cell.hand_off(epoch, DiagnosisState::Streaming, None);
        assert!(cell.dismiss());

        let session = cell.snapshot();
        assert_eq!(session.state, DiagnosisState::Initial);
        assert!(session.started_at.is_none());
        assert_eq!(session.progress, 0.0);
        assert!(!session.overlay_visible);
    }

    #[tokio::test]
    async fn test_append_reports_visible_text() {
        let cell = cell();
        let epoch = cell.begin("7203").unwrap();
        assert!(!cell.append(epoch, "  \n"));
        assert!(cell.append(epoch, "A"));
        assert_eq!(cell.snapshot().result_text, "  \nA");
    }
}

//! In-crate fakes for the remote collaborators.

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::conversion::{ConversionResult, RedirectApi, RedirectLink, RedirectSelection};
use crate::diagnosis::client::{DiagnosisApi, DiagnosisReply, DiagnosisRequest, DiagnosisResult};
use crate::error::{ConversionError, DiagnosisError, QuoteError, TrackingError};
use crate::events::Event;
use crate::quote::{Figure, QuoteApi, QuoteResult, QuoteSnapshot, StockInfo};
use crate::tracking::{Tracker, TrackingEvent};

pub fn valid_snapshot(code: &str, name: &str) -> QuoteSnapshot {
    QuoteSnapshot {
        info: StockInfo {
            code: code.to_string(),
            name: name.to_string(),
            market: "Prime".to_string(),
            price: Some(Figure::Number(1520.0)),
            change: Some(Figure::Text("+12".to_string())),
            change_percent: Some(Figure::Text("+0.8%".to_string())),
            industry: "Banks".to_string(),
            per: Some(Figure::Number(11.2)),
            pbr: Some(Figure::Text("0.9".to_string())),
            dividend: Some(Figure::Text("3.1%".to_string())),
            market_cap: Some(Figure::Text("2.1T".to_string())),
            ..StockInfo::default()
        },
        prices: Vec::new(),
    }
}

/// A snapshot that fails the validity check (blank name).
pub fn invalid_snapshot(code: &str) -> QuoteSnapshot {
    let mut snapshot = valid_snapshot(code, "");
    snapshot.info.name.clear();
    snapshot
}

pub fn record(json: &str) -> Vec<u8> {
    format!("data: {}\n", json).into_bytes()
}

/// What the fake diagnosis endpoint answers with.
pub enum Script {
    /// Event stream; each chunk is delivered after its delay
    Stream(Vec<(Duration, DiagnosisResult<Vec<u8>>)>),
    Document(String),
    Fail(DiagnosisError),
    /// Never answers
    Hang,
}

impl Script {
    pub fn chunks(chunks: Vec<Vec<u8>>) -> Self {
        Script::Stream(chunks.into_iter().map(|c| (Duration::ZERO, Ok(c))).collect())
    }

    pub fn paced(chunks: Vec<(u64, Vec<u8>)>) -> Self {
        Script::Stream(
            chunks
                .into_iter()
                .map(|(ms, c)| (Duration::from_millis(ms), Ok(c)))
                .collect(),
        )
    }
}

#[derive(Clone, Default)]
pub struct ScriptedDiagnosis {
    script: Arc<Mutex<Option<Script>>>,
    requests: Arc<Mutex<Vec<DiagnosisRequest>>>,
}

impl ScriptedDiagnosis {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(Some(script))),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<DiagnosisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosisApi for ScriptedDiagnosis {
    async fn request(&self, request: &DiagnosisRequest) -> DiagnosisResult<DiagnosisReply> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.script.lock().unwrap().take();

        match script {
            Some(Script::Stream(chunks)) => Ok(DiagnosisReply::Stream(
                stream::iter(chunks)
                    .then(|(delay, chunk)| async move {
                        tokio::time::sleep(delay).await;
                        chunk
                    })
                    .boxed(),
            )),
            Some(Script::Document(body)) => Ok(DiagnosisReply::Document(body)),
            Some(Script::Fail(error)) => Err(error),
            Some(Script::Hang) | None => std::future::pending().await,
        }
    }
}

/// Quote endpoint backed by a map; unknown codes answer 404. Each reply can
/// be delayed to interleave fetches.
#[derive(Clone, Default)]
pub struct FakeQuotes {
    snapshots: Arc<Mutex<HashMap<String, (Duration, QuoteSnapshot)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeQuotes {
    pub fn with(self, code: &str, snapshot: QuoteSnapshot) -> Self {
        self.delayed(code, 0, snapshot)
    }

    pub fn delayed(self, code: &str, ms: u64, snapshot: QuoteSnapshot) -> Self {
        self.snapshots
            .lock()
            .unwrap()
            .insert(code.to_string(), (Duration::from_millis(ms), snapshot));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteApi for FakeQuotes {
    async fn fetch_quote(&self, code: &str) -> QuoteResult<QuoteSnapshot> {
        self.calls.lock().unwrap().push(code.to_string());
        let entry = self.snapshots.lock().unwrap().get(code).cloned();
        match entry {
            Some((delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            None => Err(QuoteError::Http {
                code: code.to_string(),
                status: 404,
            }),
        }
    }
}

pub enum RedirectScript {
    Link(&'static str),
    Inactive,
    Status(u16),
}

pub struct FakeRedirects(pub RedirectScript);

#[async_trait]
impl RedirectApi for FakeRedirects {
    async fn select_redirect(&self) -> ConversionResult<RedirectSelection> {
        match self.0 {
            RedirectScript::Link(url) => Ok(RedirectSelection {
                success: true,
                link: Some(RedirectLink {
                    redirect_url: url.to_string(),
                }),
            }),
            RedirectScript::Inactive => Ok(RedirectSelection {
                success: false,
                link: None,
            }),
            RedirectScript::Status(status) => Err(ConversionError::Http { status }),
        }
    }
}

/// Tracker that remembers what it was sent; optionally fails every send.
#[derive(Clone, Default)]
pub struct RecordingTracker {
    pub sent: Arc<Mutex<Vec<TrackingEvent>>>,
    pub failing: bool,
}

impl RecordingTracker {
    pub fn names(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|e| e.event.clone()).collect()
    }
}

#[async_trait]
impl Tracker for RecordingTracker {
    async fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
        self.sent.lock().unwrap().push(event.clone());
        if self.failing {
            return Err(TrackingError::Http { status: 500 });
        }
        Ok(())
    }
}

/// Everything published so far.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

//! Fire-and-forget user tracking: bus events in, tracking records out.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::constants::{events, runtime};
use crate::error::TrackingError;
use crate::events::{DiagnosisEvent, Event, QuoteEvent};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackingEvent {
    pub id: String,
    pub event: String,
    pub timestamp: String,
    pub payload: Value,
}

impl TrackingEvent {
    pub fn new(event: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event: event.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            payload,
        }
    }

    /// The tracking record for a bus event, if that event is tracked at all.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Quote(QuoteEvent::Loaded { code, name, params }) => Some(Self::new(
                events::PAGE_LOAD,
                json!({
                    "stockCode": code,
                    "stockName": name,
                    "urlParams": {
                        "src": params.src.clone().unwrap_or_default(),
                        "gclid": params.gclid.clone().unwrap_or_default(),
                        "racText": params.rac_text.clone().unwrap_or_default(),
                        "code": params.code.clone().unwrap_or_default(),
                    }
                }),
            )),
            Event::Diagnosis(DiagnosisEvent::Started { code }) => {
                Some(Self::new(events::DIAGNOSIS_START, json!({ "stockCode": code })))
            }
            Event::Diagnosis(DiagnosisEvent::Completed {
                code,
                name,
                duration_ms,
            }) => Some(Self::new(
                events::DIAGNOSIS_CLICK,
                json!({
                    "stockCode": code,
                    "stockName": name,
                    "durationMs": duration_ms,
                }),
            )),
            Event::Conversion(conversion) => Some(Self::new(
                events::CONVERSION,
                json!({ "gclid": conversion.gclid.clone().unwrap_or_default() }),
            )),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Tracker: Send + Sync {
    async fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError>;
}

/// POSTs each record as JSON.
pub struct HttpTracker {
    client: Client,
    url: Url,
}

impl HttpTracker {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Tracker for HttpTracker {
    async fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
        let resp = self
            .client
            .post(self.url.clone())
            .timeout(Duration::from_secs(runtime::TRACKING_TIMEOUT_SECS))
            .json(event)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TrackingError::Http {
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Used when no tracking endpoint is configured.
pub struct LogTracker;

#[async_trait]
impl Tracker for LogTracker {
    async fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
        info!("📊 [TRACKING] {} {}", event.event, event.payload);
        Ok(())
    }
}

#[derive(Clone)]
pub struct TrackingService {
    tracker: Arc<dyn Tracker>,
}

impl TrackingService {
    pub fn new(tracker: Arc<dyn Tracker>) -> Self {
        Self { tracker }
    }

    /// Subscribe to the bus and forward tracked events until it closes.
    pub fn start(&self, event_bus: &EventBus) -> JoinHandle<()> {
        let mut rx = event_bus.subscribe();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            info!("📊 [TRACKING] Service started");
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let Some(record) = TrackingEvent::from_event(&event) else {
                            continue;
                        };
                        if let Err(e) = tracker.send(&record).await {
                            warn!("⚠️ [TRACKING] Failed to send {}: {}", record.event, e);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ [TRACKING] Lagged behind, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("[TRACKING] Service stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConversionEvent, PageParams};
    use crate::testing::RecordingTracker;

    #[test]
    fn test_page_load_payload() {
        let event = Event::Quote(QuoteEvent::Loaded {
            code: "7203".into(),
            name: "Toyota".into(),
            params: PageParams {
                code: Some("7203".into()),
                src: Some("ads".into()),
                gclid: None,
                rac_text: Some("banner".into()),
            },
        });
        let record = TrackingEvent::from_event(&event).unwrap();

        assert_eq!(record.event, "page_load");
        assert_eq!(
            record.payload,
            json!({
                "stockCode": "7203",
                "stockName": "Toyota",
                "urlParams": {"src": "ads", "gclid": "", "racText": "banner", "code": "7203"}
            })
        );
        assert!(Uuid::parse_str(&record.id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&record.timestamp).is_ok());
    }

    #[test]
    fn test_completion_payload() {
        let event = Event::Diagnosis(DiagnosisEvent::Completed {
            code: "7203".into(),
            name: "Toyota".into(),
            duration_ms: 4210,
        });
        let record = TrackingEvent::from_event(&event).unwrap();
        assert_eq!(record.event, "diagnosis_click");
        assert_eq!(
            record.payload,
            json!({"stockCode": "7203", "stockName": "Toyota", "durationMs": 4210})
        );
    }

    #[test]
    fn test_untracked_events() {
        assert!(TrackingEvent::from_event(&Event::Diagnosis(DiagnosisEvent::Dismissed)).is_none());
        assert!(TrackingEvent::from_event(&Event::Diagnosis(DiagnosisEvent::Progress {
            code: "7203".into(),
            progress: 40.0
        }))
        .is_none());
    }

    #[tokio::test]
    async fn test_service_forwards_and_survives_failures() {
        let bus = EventBus::new(16);
        let tracker = RecordingTracker {
            failing: true,
            ..Default::default()
        };
        let handle = TrackingService::new(Arc::new(tracker.clone())).start(&bus);

        bus.publish(Event::Diagnosis(DiagnosisEvent::Started { code: "7203".into() }));
        bus.publish(Event::Diagnosis(DiagnosisEvent::Dismissed));
        bus.publish(Event::Conversion(ConversionEvent {
            gclid: Some("abc".into()),
            redirect_url: "https://line.example/x".into(),
        }));
        drop(bus);
        handle.await.unwrap();

        assert_eq!(tracker.names(), vec!["diagnosis_start", "conversion"]);
        let sent = tracker.sent.lock().unwrap();
        assert_eq!(sent[1].payload, json!({"gclid": "abc"}));
    }
}

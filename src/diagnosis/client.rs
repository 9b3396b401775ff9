use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::endpoint;
use crate::constants::{endpoints, stream::EVENT_STREAM_CONTENT_TYPE};
use crate::error::DiagnosisError;
use crate::quote::{Figure, QuoteSnapshot};

pub type DiagnosisResult<T> = Result<T, DiagnosisError>;

/// Raw body chunks of an incremental reply
pub type ChunkStream = BoxStream<'static, DiagnosisResult<Vec<u8>>>;

/// The fixed projection of a snapshot sent for diagnosis. Price history is
/// deliberately left out.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDataProjection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per: Option<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr: Option<Figure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend: Option<Figure>,
    pub industry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Figure>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosisRequest {
    pub code: String,
    #[serde(rename = "stockData")]
    pub stock_data: StockDataProjection,
}

impl DiagnosisRequest {
    pub fn from_snapshot(code: &str, snapshot: &QuoteSnapshot) -> Self {
        let info = &snapshot.info;
        Self {
            code: code.to_string(),
            stock_data: StockDataProjection {
                name: info.name.clone(),
                price: info.price.clone(),
                change: info.change.clone(),
                change_percent: info.change_percent.clone(),
                per: info.per.clone(),
                pbr: info.pbr.clone(),
                dividend: info.dividend.clone(),
                industry: info.industry.clone(),
                market_cap: info.market_cap.clone(),
            },
        }
    }
}

/// Body of a non-incremental reply
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AnalysisDocument {
    #[serde(default)]
    pub analysis: Option<String>,
}

impl AnalysisDocument {
    /// The analysis text, if it has any visible content.
    pub fn into_text(self) -> Option<String> {
        self.analysis.filter(|a| !a.trim().is_empty())
    }
}

/// The two legal reply shapes, told apart by content type.
pub enum DiagnosisReply {
    Stream(ChunkStream),
    Document(String),
}

impl std::fmt::Debug for DiagnosisReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosisReply::Stream(_) => f.write_str("DiagnosisReply::Stream(..)"),
            DiagnosisReply::Document(body) => f.debug_tuple("DiagnosisReply::Document").field(body).finish(),
        }
    }
}

#[async_trait]
pub trait DiagnosisApi: Send + Sync {
    /// Issue the request and resolve once the response head is in. Non-2xx
    /// statuses are errors.
    async fn request(&self, request: &DiagnosisRequest) -> DiagnosisResult<DiagnosisReply>;
}

/// `POST {base}/api/gemini/diagnosis`
#[derive(Clone)]
pub struct HttpDiagnosisClient {
    client: Client,
    url: Url,
}

impl HttpDiagnosisClient {
    pub fn new(client: Client, base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: endpoint(base, endpoints::DIAGNOSIS)?,
        })
    }
}

pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains(EVENT_STREAM_CONTENT_TYPE))
}

#[async_trait]
impl DiagnosisApi for HttpDiagnosisClient {
    async fn request(&self, request: &DiagnosisRequest) -> DiagnosisResult<DiagnosisReply> {
        info!("🤖 [DIAGNOSIS] Requesting diagnosis for {}", request.code);

        let resp = self.client.post(self.url.clone()).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("⚠️ [DIAGNOSIS] Endpoint returned {}", status);
            return Err(DiagnosisError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if is_event_stream(content_type.as_deref()) {
            let chunks = resp
                .bytes_stream()
                .map(|chunk| {
                    chunk
                        .map(|b| b.to_vec())
                        .map_err(|e| DiagnosisError::Stream(e.to_string()))
                })
                .boxed();
            return Ok(DiagnosisReply::Stream(chunks));
        }

        Ok(DiagnosisReply::Document(resp.text().await?))
    }
}

use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use crate::config::endpoint;
use crate::constants::endpoints;
use crate::error::QuoteError;

use super::types::QuoteSnapshot;

pub type QuoteResult<T> = Result<T, QuoteError>;

#[async_trait]
pub trait QuoteApi: Send + Sync {
    async fn fetch_quote(&self, code: &str) -> QuoteResult<QuoteSnapshot>;
}

/// `GET {base}/api/stock/data?code={code}`
#[derive(Clone)]
pub struct HttpQuoteClient {
    client: Client,
    url: Url,
}

impl HttpQuoteClient {
    pub fn new(client: Client, api_base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: endpoint(api_base, endpoints::QUOTE_DATA)?,
        })
    }
}

#[async_trait]
impl QuoteApi for HttpQuoteClient {
    async fn fetch_quote(&self, code: &str) -> QuoteResult<QuoteSnapshot> {
        info!("📈 [QUOTE] Fetching {}", code);

        let resp = self
            .client
            .get(self.url.clone())
            .query(&[("code", code)])
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("⚠️ [QUOTE] {} returned {}", code, resp.status());
            return Err(QuoteError::Http {
                code: code.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await?;
        let snapshot: QuoteSnapshot = serde_json::from_str(&body)?;
        Ok(snapshot)
    }
}

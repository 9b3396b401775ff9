//! Conversion: ask the backend which messaging redirect link is active.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::config::endpoint;
use crate::constants::endpoints;
use crate::error::ConversionError;

pub type ConversionResult<T> = Result<T, ConversionError>;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RedirectLink {
    #[serde(default)]
    pub redirect_url: String,
}

/// Body of `GET /api/line-redirects/select`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RedirectSelection {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub link: Option<RedirectLink>,
}

impl RedirectSelection {
    /// The URL to navigate to, if the backend reported an active link.
    pub fn into_url(self) -> ConversionResult<String> {
        match self.link {
            Some(link) if self.success && !link.redirect_url.trim().is_empty() => Ok(link.redirect_url),
            _ => Err(ConversionError::NoActiveLink),
        }
    }
}

#[async_trait]
pub trait RedirectApi: Send + Sync {
    async fn select_redirect(&self) -> ConversionResult<RedirectSelection>;
}

#[derive(Clone)]
pub struct HttpRedirectClient {
    client: Client,
    url: Url,
}

impl HttpRedirectClient {
    pub fn new(client: Client, api_base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            url: endpoint(api_base, endpoints::REDIRECT_SELECT)?,
        })
    }
}

#[async_trait]
impl RedirectApi for HttpRedirectClient {
    async fn select_redirect(&self) -> ConversionResult<RedirectSelection> {
        info!("🔗 [CONVERSION] Selecting redirect link");

        let resp = self.client.get(self.url.clone()).send().await?;
        if !resp.status().is_success() {
            warn!("⚠️ [CONVERSION] Redirect endpoint returned {}", resp.status());
            return Err(ConversionError::Http {
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RedirectSelection {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_active_link() {
        let selection = parse(r#"{"success":true,"link":{"id":3,"redirect_url":"https://line.example/abc"}}"#);
        assert_eq!(selection.into_url().unwrap(), "https://line.example/abc");
    }

    #[test]
    fn test_missing_link_is_no_active_link() {
        for body in [
            r#"{"success":false}"#,
            r#"{"success":true}"#,
            r#"{"success":true,"link":null}"#,
            r#"{"success":true,"link":{"redirect_url":""}}"#,
            r#"{"success":false,"link":{"redirect_url":"https://line.example/abc"}}"#,
        ] {
            assert!(matches!(parse(body).into_url(), Err(ConversionError::NoActiveLink)), "{}", body);
        }
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ConversionError::Http { status: 503 }.user_message(),
            "LINEリンクの取得に失敗しました。しばらくしてからもう一度お試しください。"
        );
        assert_eq!(ConversionError::NoActiveLink.user_message(), "現在利用可能なLINEリンクがありません。");
    }
}

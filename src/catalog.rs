//! Static list of tradable instruments backing the search box.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use url::Url;

use crate::error::CatalogError;

/// One instrument of the stock list. `name` is the ticker code, the
/// human-readable company name lives in `description`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(rename = "type", default)]
    pub instrument_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logoid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typespecs: Option<Vec<String>>,
}

impl CatalogEntry {
    /// The code committed when this entry is picked.
    pub fn code(&self) -> &str {
        &self.name
    }

    /// Case-insensitive substring match on code or description.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.description.to_lowercase().contains(needle)
    }
}

#[derive(Clone, Debug)]
pub enum CatalogSource {
    Url(Url),
    File(PathBuf),
}

/// Load progress of the stock list as seen by the search box.
#[derive(Clone, Debug, Default)]
pub enum CatalogState {
    #[default]
    Loading,
    Ready(Arc<Vec<CatalogEntry>>),
    Failed(String),
}

impl CatalogState {
    pub fn from_result(result: Result<Vec<CatalogEntry>, CatalogError>) -> Self {
        match result {
            Ok(entries) => CatalogState::Ready(Arc::new(entries)),
            Err(e) => CatalogState::Failed(e.to_string()),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, CatalogState::Loading)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        match self {
            CatalogState::Ready(entries) => entries.as_slice(),
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CatalogState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

pub fn parse_catalog(body: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    Ok(serde_json::from_str(body)?)
}

/// Fetch the stock list once. Failures are logged and handed back; there is
/// no retry.
pub async fn load_catalog(
    client: &Client,
    source: &CatalogSource,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    let result = match source {
        CatalogSource::Url(url) => fetch_remote(client, url).await,
        CatalogSource::File(path) => {
            let body = tokio::fs::read_to_string(path).await?;
            parse_catalog(&body)
        }
    };

    match &result {
        Ok(entries) => info!("📚 [CATALOG] Loaded {} instruments", entries.len()),
        Err(e) => error!("❌ [CATALOG] Error loading stock list: {}", e),
    }
    result
}

async fn fetch_remote(client: &Client, url: &Url) -> Result<Vec<CatalogEntry>, CatalogError> {
    let resp = client.get(url.clone()).send().await?;
    if !resp.status().is_success() {
        return Err(CatalogError::Http {
            status: resp.status().as_u16(),
        });
    }
    let body = resp.text().await?;
    parse_catalog(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"[
        {"name": "7203", "description": "Toyota Motor Corp", "exchange": "TSE", "type": "stock", "logoid": "toyota", "typespecs": ["common"]},
        {"name": "6758", "description": "Sony Group Corp", "exchange": "TSE", "type": "stock"}
    ]"#;

    #[test]
    fn test_parse_catalog_fields() {
        let entries = parse_catalog(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code(), "7203");
        assert_eq!(entries[0].instrument_type, "stock");
        assert_eq!(entries[0].logoid.as_deref(), Some("toyota"));
        assert_eq!(entries[0].typespecs, Some(vec!["common".to_string()]));
        assert_eq!(entries[1].kind, None);
    }

    #[test]
    fn test_parse_catalog_rejects_non_list() {
        assert!(matches!(
            parse_catalog(r#"{"name": "7203"}"#),
            Err(CatalogError::Deserialization(_))
        ));
    }

    #[test]
    fn test_entry_matches_both_fields() {
        let entries = parse_catalog(SAMPLE).unwrap();
        assert!(entries[0].matches("toyota"));
        assert!(entries[0].matches("720"));
        assert!(!entries[0].matches("sony"));
    }

    #[test]
    fn test_state_from_failure_keeps_message() {
        let state = CatalogState::from_result(Err(CatalogError::Http { status: 404 }));
        assert!(!state.is_loading());
        assert!(state.entries().is_empty());
        assert!(state.error().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn test_load_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = CatalogSource::File(file.path().to_path_buf());
        let entries = load_catalog(&Client::new(), &source).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_load_catalog_missing_file() {
        let source = CatalogSource::File(PathBuf::from("/definitely/not/here/stock.json"));
        let result = load_catalog(&Client::new(), &source).await;
        assert!(matches!(result, Err(CatalogError::Io(_))));
    }
}

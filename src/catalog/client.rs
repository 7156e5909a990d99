use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CatalogPage, CatalogSource};
use crate::config::{HarvesterConfig, DEFAULT_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::error::TransportError;
use crate::normalization::RawRecord;

// ---------- Object listing envelope (minimal) ----------
// Only `records` drives the pipeline; `info` refines end-of-data detection when present.

#[derive(Debug, Deserialize)]
struct ObjectListResponse {
    #[serde(default)]
    info: Option<ObjectListInfo>,
    #[serde(default)]
    records: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ObjectListInfo {
    pages: Option<u64>,
    next: Option<String>,
}

/// reqwest-backed client for the `/object` listing endpoint.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
    only_with_images: bool,
}

impl HttpCatalogClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        Self::with_builder(api_key, base_url, timeout, Client::builder())
    }

    fn with_builder(
        api_key: &str,
        base_url: Option<&str>,
        timeout: Option<Duration>,
        builder: reqwest::ClientBuilder,
    ) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let timeout = timeout.unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        let http = builder
            .user_agent(concat!("artifact-harvester/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            timeout_secs: timeout.as_secs().max(1),
            only_with_images: true,
        })
    }

    pub fn from_config(cfg: &HarvesterConfig) -> Result<Self> {
        let key = cfg.require_api_key()?;
        let mut client = Self::new(&key, Some(&cfg.base_url), Some(cfg.http_timeout))?;
        client.only_with_images = cfg.only_with_images;
        Ok(client)
    }

    fn object_url(&self) -> String {
        format!("{}/object", self.base_url)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogClient {
    async fn fetch_page(
        &self,
        classification: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CatalogPage, TransportError> {
        let mut params: Vec<(&str, String)> = vec![
            ("apikey", self.api_key.clone()),
            ("classification", classification.to_string()),
            ("size", page_size.to_string()),
            ("page", page.to_string()),
        ];
        if self.only_with_images {
            params.push(("hasimage", "1".to_string()));
        }

        debug!(classification, page, page_size, "requesting catalog page");
        let resp = self
            .http
            .get(self.object_url())
            .query(&params)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), page, "catalog page failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body_snippet: snippet(&body),
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, self.timeout_secs))?;
        parse_page(&body, page, page_size)
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX {
        trimmed.to_string()
    } else {
        trimmed.chars().take(MAX).collect::<String>() + "..."
    }
}

/// Decode a listing body. Absent or null `records` is an empty page.
fn parse_page(body: &[u8], page: u32, page_size: u32) -> Result<CatalogPage, TransportError> {
    let parsed: ObjectListResponse =
        serde_json::from_slice(body).map_err(|e| TransportError::Decode(e.to_string()))?;

    let mut records = Vec::new();
    for value in parsed.records.unwrap_or_default() {
        match RawRecord::try_from(value) {
            Ok(raw) => records.push(raw),
            Err(other) => {
                // Keep the slot so the normalizer reports it instead of it vanishing.
                warn!(page, kind = json_kind(&other), "non-object entry in records");
                records.push(RawRecord::default());
            }
        }
    }

    let full = records.len() >= page_size as usize;
    let more_by_envelope = parsed.info.and_then(|info| match (info.pages, info.next) {
        (Some(pages), _) => Some(u64::from(page) < pages),
        (None, Some(_)) => Some(true),
        (None, None) => None,
    });

    Ok(CatalogPage {
        has_more: full && more_by_envelope.unwrap_or(true),
        records,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Admin API HTTP client
//
// Wraps `reqwest::Client` with URL construction and envelope checking.
// Every response carries `status`; `"error"` bodies become `Error::Api`
// even when the HTTP status is 200, which is how the backend reports
// failures.

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{AssetCountsResponse, CardUpload, Endpoint, OneShotResponse};
use crate::transport::TransportConfig;

/// HTTP client for the EcoLearn admin endpoints.
#[derive(Debug, Clone)]
pub struct AssetClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AssetClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root (e.g. `http://localhost:5000`); endpoint
    /// paths are joined onto it.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    /// Parse `base` and wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self::with_client(http, Url::parse(base)?))
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch a read endpoint and return the checked JSON body.
    pub async fn fetch(&self, endpoint: Endpoint) -> Result<Value, Error> {
        self.get_json(endpoint.path()).await
    }

    /// `GET admin/asset-repository`
    pub async fn asset_repository(&self) -> Result<Value, Error> {
        self.fetch(Endpoint::AssetRepository).await
    }

    /// `GET admin/cards-minimal`
    pub async fn cards_minimal(&self) -> Result<Value, Error> {
        self.fetch(Endpoint::CardsMinimal).await
    }

    /// `GET admin/asset-counts`
    pub async fn asset_counts(&self) -> Result<AssetCountsResponse, Error> {
        let body = self.fetch(Endpoint::AssetCounts).await?;
        decode(body)
    }

    /// Send a GET request and check the `{status}` envelope.
    pub async fn get_json(&self, path: &str) -> Result<Value, Error> {
        let url = self.url(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// `POST admin/one-shot-learn`: register a new card or replace one.
    pub async fn one_shot_learn(&self, upload: CardUpload) -> Result<OneShotResponse, Error> {
        let url = self.url("admin/one-shot-learn")?;
        debug!(card = %upload.card_name, replace = ?upload.replace_card_id, "POST {}", url);

        let mut form = Form::new()
            .text("card_name", upload.card_name)
            .text("category_id", upload.category_id.to_string())
            .part("image", Part::bytes(upload.image).file_name(upload.file_name));
        if let Some(id) = upload.replace_card_id {
            form = form.text("replace_card_id", id);
        }

        let resp = self.http.post(url).multipart(form).send().await?;
        let body = parse_response(resp).await?;
        decode(body)
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Check HTTP status, parse the body, and unwrap the `{status}` envelope.
async fn parse_response(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Http {
            status: status.as_u16(),
            url,
            body,
        });
    }

    let value: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.clone(),
    })?;

    match value.get("status").and_then(Value::as_str) {
        Some("error") => Err(Error::Api {
            message: value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified backend error")
                .to_owned(),
        }),
        _ => Ok(value),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, Error> {
    serde_json::from_value(body.clone()).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_string(),
    })
}

//! HTTP backend adapter
//!
//! Talks to the persistence API:
//! - `GET/POST {kind}/templates`
//! - `GET/PUT/DELETE {kind}/templates/{id}`
//! - `PUT {kind}/templates/{id}/default`
//! - `POST import/batches` → `{"results": [{"status": ..., "message": ...}]}`

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{CommitBatch, RecordOutcome, Template, TemplateBody, TemplateDraft};
use crate::ports::{RecordSink, TemplateStore};

/// Shared HTTP client with a base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid backend URL {}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Backend URL must use http or https: {}",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: parsed,
            timeout_secs,
        })
    }

    /// Base URL extended by path segments, each percent-encoded on its own
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Backend URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        Ok(self.client.request(method, self.endpoint(segments)?))
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::backend(format!("Request timed out after {} seconds", self.timeout_secs))
        } else if error.is_connect() {
            Error::backend("Unable to connect to the backend")
        } else {
            Error::backend(format!("Request failed: {}", error))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| self.map_request_error(e))?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(Error::not_found(response.url().path().to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::backend(format!("HTTP {}: {}", status.as_u16(), body.trim())))
            }
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| Error::backend(format!("Unexpected response body: {}", e)))
    }
}

/// Template store served by the backend API
#[derive(Debug, Clone)]
pub struct HttpTemplateStore<B> {
    api: ApiClient,
    _body: PhantomData<fn() -> B>,
}

impl<B: TemplateBody> HttpTemplateStore<B> {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            _body: PhantomData,
        }
    }

    fn collection() -> [&'static str; 2] {
        [B::KIND.as_str(), "templates"]
    }

    fn item(id: &str) -> [&str; 3] {
        [B::KIND.as_str(), "templates", id]
    }
}

#[async_trait]
impl<B: TemplateBody> TemplateStore<B> for HttpTemplateStore<B> {
    async fn list(&self) -> Result<Vec<Template<B>>> {
        self.api.json(self.api.request(Method::GET, &Self::collection())?).await
    }

    async fn get(&self, id: &str) -> Result<Option<Template<B>>> {
        match self.api.json(self.api.request(Method::GET, &Self::item(id))?).await {
            Ok(template) => Ok(Some(template)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, draft: TemplateDraft<B>) -> Result<Template<B>> {
        let request = self.api.request(Method::POST, &Self::collection())?.json(&draft);
        self.api.json(request).await
    }

    async fn update(&self, id: &str, draft: TemplateDraft<B>) -> Result<Template<B>> {
        let request = self.api.request(Method::PUT, &Self::item(id))?.json(&draft);
        self.api.json(request).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.api.send(self.api.request(Method::DELETE, &Self::item(id))?).await?;
        Ok(())
    }

    async fn set_default(&self, id: &str) -> Result<Template<B>> {
        let [kind, templates, id] = Self::item(id);
        self.api.json(self.api.request(Method::PUT, &[kind, templates, id, "default"])?).await
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    results: Vec<RecordOutcome>,
}

/// Commits import batches to `POST import/batches`
#[derive(Debug, Clone)]
pub struct HttpRecordSink {
    api: ApiClient,
}

impl HttpRecordSink {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RecordSink for HttpRecordSink {
    async fn commit_batch(&self, batch: &CommitBatch) -> Result<Vec<RecordOutcome>> {
        let request = self.api.request(Method::POST, &["import", "batches"])?.json(batch);
        let response: CommitResponse = self
            .api
            .json(request)
            .await
            .map_err(|e| Error::Commit(e.to_string()))?;
        Ok(response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExportSpec, ImportSpec};

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = ApiClient::new("https://example.com/api/v1", 30).unwrap();
        assert_eq!(
            api.endpoint(&["import", "templates"]).unwrap().as_str(),
            "https://example.com/api/v1/import/templates"
        );
    }

    #[test]
    fn test_template_paths() {
        let api = ApiClient::new("https://example.com/api/v1/", 30).unwrap();
        let url = |segments: &[&str]| api.endpoint(segments).unwrap().to_string();
        assert_eq!(
            url(&HttpTemplateStore::<ImportSpec>::collection()),
            "https://example.com/api/v1/import/templates"
        );
        assert_eq!(
            url(&HttpTemplateStore::<ExportSpec>::item("t1")),
            "https://example.com/api/v1/export/templates/t1"
        );
    }

    #[test]
    fn test_template_ids_are_encoded() {
        let api = ApiClient::new("https://example.com/api/v1", 30).unwrap();
        let url = api
            .endpoint(&HttpTemplateStore::<ExportSpec>::item("q1/2024 bills?draft"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/api/v1/export/templates/q1%2F2024%20bills%3Fdraft"
        );
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(ApiClient::new("not a url", 30).is_err());
        assert!(ApiClient::new("ftp://example.com", 30).is_err());
    }
}

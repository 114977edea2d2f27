use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PasteConfig;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PasteRequest {
    /// Always the full original message text
    pub content: String,
    pub language: Option<String>,
    /// Days until the paste expires
    pub expiration: u32,
    pub one_time: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteResult {
    pub paste_url: String,
    pub paste_id: String,
}

/// The remote pasting service, as the pipeline sees it
#[async_trait]
pub trait PasteService: Send + Sync {
    async fn create_paste(&self, request: &PasteRequest) -> Result<PasteResult>;

    /// Supported language tags, in the service's order
    async fn supported_languages(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct CreatePasteResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// The languages endpoint has served both bare tags and full records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LanguageEntry {
    Tag(String),
    Record { alias: String },
}

impl LanguageEntry {
    fn into_tag(self) -> String {
        match self {
            LanguageEntry::Tag(tag) => tag,
            LanguageEntry::Record { alias } => alias,
        }
    }
}

/// HTTP client for the pasting service
pub struct PasteClient {
    client: reqwest::Client,
    config: PasteConfig,
}

impl PasteClient {
    pub fn new(config: PasteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn paste_link(&self, id: &str) -> String {
        format!("{}/{}", self.config.website_url.trim_end_matches('/'), id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_token.as_deref() {
            Some(token) if !token.is_empty() => request.header("X-Bot-Token", token),
            _ => request,
        }
    }
}

#[async_trait]
impl PasteService for PasteClient {
    async fn create_paste(&self, request: &PasteRequest) -> Result<PasteResult> {
        debug!(
            "Creating paste at {} ({} chars, language {:?})",
            self.config.api_url,
            request.content.chars().count(),
            request.language
        );

        let response = self
            .authorize(self.client.post(&self.config.api_url))
            .json(request)
            .send()
            .await
            .context("Failed to send request to pasting service")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Pasting service error ({}): {}", status, error_body);
        }

        let body: CreatePasteResponse = response
            .json()
            .await
            .context("Failed to parse pasting service response")?;

        let paste_id = match body.id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => anyhow::bail!("No paste id returned from pasting service"),
        };

        Ok(PasteResult {
            paste_url: self.paste_link(&paste_id),
            paste_id,
        })
    }

    async fn supported_languages(&self) -> Result<Vec<String>> {
        let response = self
            .authorize(self.client.get(&self.config.languages_url))
            .send()
            .await
            .context("Failed to fetch supported languages")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Languages endpoint error ({}): {}", status, error_body);
        }

        let entries: Vec<LanguageEntry> = response
            .json()
            .await
            .context("Failed to parse languages response")?;

        Ok(entries.into_iter().map(LanguageEntry::into_tag).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, token: Option<&str>) -> PasteConfig {
        PasteConfig {
            api_url: format!("{}/api/pastes/", server.uri()),
            languages_url: format!("{}/api/languages/", server.uri()),
            website_url: "https://paste.example/".to_string(),
            api_token: token.map(str::to_string),
            expiration_days: 7,
            one_time: false,
            timeout_secs: 5,
        }
    }

    fn request() -> PasteRequest {
        PasteRequest {
            content: "def foo():\n    return 1".to_string(),
            language: Some("python".to_string()),
            expiration: 7,
            one_time: false,
        }
    }

    #[tokio::test]
    async fn test_create_paste_builds_public_link() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/pastes/"))
            .and(header("X-Bot-Token", "secret"))
            .and(body_json(json!({
                "content": "def foo():\n    return 1",
                "language": "python",
                "expiration": 7,
                "one_time": false
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "id": "aB3x", "url": "/api/pastes/aB3x" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, Some("secret"))).unwrap();
        let result = client.create_paste(&request()).await.unwrap();

        assert_eq!(result.paste_id, "aB3x");
        assert_eq!(result.paste_url, "https://paste.example/aB3x");
    }

    #[tokio::test]
    async fn test_numeric_paste_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 17 })))
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, None)).unwrap();
        let result = client.create_paste(&request()).await.unwrap();
        assert_eq!(result.paste_id, "17");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, None)).unwrap();
        let err = client.create_paste(&request()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_missing_id_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "url": "x" })))
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, None)).unwrap();
        assert!(client.create_paste(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "id": "late" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server, None);
        cfg.timeout_secs = 1;
        let client = PasteClient::new(cfg).unwrap();
        assert!(client.create_paste(&request()).await.is_err());
    }

    #[tokio::test]
    async fn test_languages_accepts_tags_and_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/languages/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "alias": "plaintext", "name": "Plain Text" },
                "python",
                { "id": 3, "alias": "rust" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, None)).unwrap();
        let languages = client.supported_languages().await.unwrap();
        assert_eq!(languages, vec!["plaintext", "python", "rust"]);
    }

    #[tokio::test]
    async fn test_languages_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = PasteClient::new(config(&server, None)).unwrap();
        assert!(client.supported_languages().await.is_err());
    }
}

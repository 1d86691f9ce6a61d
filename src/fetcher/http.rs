use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{FetchError, FetchResult};

/// Shared HTTP client for every source. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &Config) -> Self {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(crate::config::DEFAULT_USER_AGENT));
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// GET an HTML/text page.
    pub async fn get_text(&self, url: &str) -> FetchResult<String> {
        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        resp.text().await.map_err(|e| FetchError::network(url, e))
    }

    /// GET a JSON document as a generic value tree.
    pub async fn get_json(&self, url: &str) -> FetchResult<Value> {
        debug!("GET {} (json)", url);
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "application/json,text/plain,*/*")
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body = resp.text().await.map_err(|e| FetchError::network(url, e))?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::parse(format!("invalid JSON from {}: {}", url, e)))
    }
}

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

const USER_AGENT: &str = concat!("perfcheck/", env!("CARGO_PKG_VERSION"));
const BODY_PREVIEW_CHARS: usize = 180;

const API_USER_HEADER: &str = "api-user";
const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("GET {url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// Client that sends the static `Api-User` / `Api-Key` pair on every request.
pub fn authenticated_client(credentials: &Credentials) -> Result<Client> {
    let mut headers = HeaderMap::new();
    let user = HeaderValue::from_str(&credentials.user)
        .context("API user is not a valid header value")?;
    let mut key = HeaderValue::from_str(&credentials.api_key)
        .context("API key is not a valid header value")?;
    key.set_sensitive(true);
    headers.insert(HeaderName::from_static(API_USER_HEADER), user);
    headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .context("failed to build HTTP client")
}

/// `host` with `segments` appended as percent-encoded path segments.
pub fn endpoint(host: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(host).with_context(|| format!("invalid host URL: {host}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("host URL cannot take a path: {host}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
    query: &[(&str, &str)],
) -> Result<T> {
    let response = client
        .get(url.clone())
        .query(query)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        return Err(SourceError::Status {
            url: url.to_string(),
            status,
            body: preview,
        }
        .into());
    }
    serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
}

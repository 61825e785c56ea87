use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::StoreError;

/// PostgreSQL SQLSTATE for `exclusion_violation`.
const EXCLUSION_VIOLATION: &str = "23P01";

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_base_url(&config.supabase_url, &config.supabase_anon_key)
    }

    pub fn with_base_url(base_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| StoreError::Unavailable(format!("invalid api key header: {}", e)))?;
        headers.insert("apikey", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        let authorization = HeaderValue::from_str(&format!("Bearer {}", bearer))
            .map_err(|e| StoreError::Unavailable(format!("invalid authorization header: {}", e)))?;
        headers.insert(AUTHORIZATION, authorization);

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let (data, _) = self
            .send(method, path, auth_token, body, extra_headers)
            .await?;
        Ok(data)
    }

    /// Issues a read with `Prefer: count=exact` and returns the rows together
    /// with the total reported in `Content-Range`.
    pub async fn request_with_count<T>(
        &self,
        path: &str,
        auth_token: Option<&str>,
    ) -> Result<(T, Option<u64>), StoreError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));
        self.send(Method::GET, path, auth_token, None, Some(headers)).await
    }

    async fn send<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<(T, Option<u64>), StoreError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;

            if status == StatusCode::CONFLICT && error_text.contains(EXCLUSION_VIOLATION) {
                warn!("Write rejected by exclusion constraint: {}", error_text);
                return Err(StoreError::Conflict(error_text));
            }

            error!("API error ({}): {}", status, error_text);
            return Err(StoreError::Unavailable(format!("API error ({}): {}", status, error_text)));
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);

        let data = response.json::<T>().await?;
        Ok((data, total))
    }
}

/// `Content-Range: 0-9/42` → `42`; `*/0` → `0`; an unknown total (`*`) → `None`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/').and_then(|(_, total)| total.parse().ok())
}

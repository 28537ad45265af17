//! Upstash Redis REST client.
//!
//! The hosted store speaks Redis commands over HTTPS: the command and
//! its arguments are URL path segments, large values travel as the
//! request body of a POST, and every reply is a `{"result": ...}`
//! envelope (or `{"error": ...}` on rejection).

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use super::{KvStore, StoreError};

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct RestEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct UpstashStore {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl UpstashStore {
    pub fn new(base_url: String, token: String) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("tipster/0.1.0")
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: SecretString::new(token),
        })
    }

    fn command_url(base_url: &str, parts: &[&str]) -> String {
        let mut url = base_url.to_string();
        for part in parts {
            url.push('/');
            url.push_str(&urlencoding::encode(part));
        }
        url
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        command: &str,
    ) -> Result<Value, StoreError> {
        let response = request
            .bearer_auth(self.token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                command: command.to_string(),
                message: format!("HTTP {status}: {body}"),
            });
        }

        let envelope: RestEnvelope = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(StoreError::Rejected {
                command: command.to_string(),
                message: error,
            });
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }

    /// Command with all arguments in the URL path.
    async fn call(&self, parts: &[&str]) -> Result<Value, StoreError> {
        let url = Self::command_url(&self.base_url, parts);
        self.execute(self.http.get(url), parts[0]).await
    }

    /// Command whose final argument travels as the POST body. Used for
    /// values (bet lists, drafts) too large for a URL.
    async fn call_with_body(&self, parts: &[&str], body: String) -> Result<Value, StoreError> {
        let url = Self::command_url(&self.base_url, parts);
        self.execute(self.http.post(url).body(body), parts[0]).await
    }

    fn unexpected(command: &str, value: &Value) -> StoreError {
        StoreError::UnexpectedResponse {
            command: command.to_string(),
            message: value.to_string(),
        }
    }

    fn coerce_opt_string(command: &str, value: Value) -> Result<Option<String>, StoreError> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(Self::unexpected(command, &other)),
        }
    }

    fn coerce_f64(command: &str, value: Value) -> Result<f64, StoreError> {
        match &value {
            Value::String(s) => s.parse().map_err(|_| Self::unexpected(command, &value)),
            Value::Number(n) => n.as_f64().ok_or_else(|| Self::unexpected(command, &value)),
            _ => Err(Self::unexpected(command, &value)),
        }
    }

    fn coerce_i64(command: &str, value: Value) -> Result<i64, StoreError> {
        match &value {
            Value::String(s) => s.parse().map_err(|_| Self::unexpected(command, &value)),
            Value::Number(n) => n.as_i64().ok_or_else(|| Self::unexpected(command, &value)),
            _ => Err(Self::unexpected(command, &value)),
        }
    }

    fn coerce_string_array(command: &str, value: Value) -> Result<Vec<String>, StoreError> {
        let Value::Array(items) = value else {
            return Err(Self::unexpected(command, &value));
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(Self::unexpected(command, &other)),
            })
            .collect()
    }
}

#[async_trait]
impl KvStore for UpstashStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result = self.call(&["get", key]).await?;
        Self::coerce_opt_string("get", result)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.call_with_body(&["set", key], value.to_string()).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let result = self.call(&["set", key, value, "nx"]).await?;
        // SET .. NX answers OK when the write landed and null otherwise.
        Ok(!result.is_null())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.call(&["del", key]).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let result = self.call(&["keys", pattern]).await?;
        Self::coerce_string_array("keys", result)
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        let delta = delta.to_string();
        let result = self.call(&["incrbyfloat", key, &delta]).await?;
        Self::coerce_f64("incrbyfloat", result)
    }

    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let result = self.call(&["incr", key]).await?;
        Self::coerce_i64("incr", result)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.call_with_body(&["lpush", key], value.to_string()).await?;
        Ok(())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.call(&["ltrim", key, &start, &stop]).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let (start, stop) = (start.to_string(), stop.to_string());
        let result = self.call(&["lrange", key, &start, &stop]).await?;
        Self::coerce_string_array("lrange", result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

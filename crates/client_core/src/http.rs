use async_trait::async_trait;
use reqwest::Client;
use shared::{error::QueryError, protocol::DatasourceResponse, protocol::QueryResult};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::query::QueryService;

/// Query parameter carrying the clause.
const QUERY_PARAM: &str = "tq";
const OUTPUT_PARAM: &str = "tqx";
const OUTPUT_JSON: &str = "out:json";
/// Anti-XSSI guard some datasources put in front of the body.
const XSSI_PREFIX: &str = ")]}'";
const RESPONSE_CALLBACK: &str = "google.visualization.Query.setResponse(";

#[derive(Debug, Error)]
pub enum HttpQueryError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: u16, body: String },
    #[error("invalid datasource response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<HttpQueryError> for QueryError {
    fn from(value: HttpQueryError) -> Self {
        match value {
            HttpQueryError::Transport(err) => QueryError::new("Request failed", err.to_string()),
            HttpQueryError::Status { status, body } => {
                QueryError::new(format!("HTTP {status}"), body)
            }
            HttpQueryError::Decode(err) => QueryError::new("Invalid response", err.to_string()),
        }
    }
}

/// [`QueryService`] speaking the datasource protocol over HTTP GET.
#[derive(Clone, Default)]
pub struct HttpQueryService {
    http: Client,
}

impl HttpQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    pub async fn fetch(&self, url: &Url, clause: &str) -> Result<QueryResult, HttpQueryError> {
        let request_url = request_url(url, clause);
        debug!(url = %request_url, "datasource request");

        let response = self.http.get(request_url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(HttpQueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: DatasourceResponse = serde_json::from_str(unwrap_body(&body))?;
        Ok(envelope.into_result())
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn execute(&self, url: &Url, clause: &str) -> QueryResult {
        match self.fetch(url, clause).await {
            Ok(result) => result,
            Err(err) => {
                warn!(url = %url, "datasource query failed: {err}");
                QueryResult::Error(err.into())
            }
        }
    }
}

/// Endpoint URL with the clause appended; parameters already on the URL
/// (form filters) are kept.
pub fn request_url(url: &Url, clause: &str) -> Url {
    let mut request_url = url.clone();
    request_url
        .query_pairs_mut()
        .append_pair(QUERY_PARAM, clause)
        .append_pair(OUTPUT_PARAM, OUTPUT_JSON);
    request_url
}

/// Strips the XSSI guard and a `google.visualization.Query.setResponse(...);`
/// callback wrapper. A body that already is a JSON object is left alone.
fn unwrap_body(body: &str) -> &str {
    let body = body.trim_start();
    let body = body.strip_prefix(XSSI_PREFIX).unwrap_or(body).trim();
    if body.starts_with('{') {
        return body;
    }

    match body.strip_prefix(RESPONSE_CALLBACK) {
        Some(inner) => {
            let inner = inner.trim_end().trim_end_matches(';').trim_end();
            inner.strip_suffix(')').unwrap_or(inner)
        }
        None => body,
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;

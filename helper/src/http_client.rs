//! HTTP transport posting multi-search batches to the search backend.

use anyhow::Context;
use common::search_const::{DEFAULT_SEARCH_BACKEND_URL, SEARCH_BACKEND_URL_ENV};
use common::search_request::{MultiSearchRequest, MultiSearchResponse};
use common::{SearchRequest, SearchResponse};
use futures::future::BoxFuture;

use crate::search_client::SearchClient;

#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            endpoint: format!("{}/multi_search", base_url.trim_end_matches('/')),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let base_url = std::env::var(SEARCH_BACKEND_URL_ENV).unwrap_or(DEFAULT_SEARCH_BACKEND_URL.to_string());
        Self::new(base_url)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn multi_search(&self, requests: Vec<SearchRequest>) -> anyhow::Result<Vec<SearchResponse>> {
        let expected = requests.len();
        let body = serde_json::to_string(&MultiSearchRequest { requests })?;
        let t0 = std::time::Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let response_txt = response.text().await?;
        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Error: {}: {}", status, response_txt);
        }
        let dt_ms = t0.elapsed().as_millis() as u64;
        tracing::debug!(requests = expected, len = response_txt.len(), dt_ms, "search response received");

        let response: MultiSearchResponse = serde_json::from_str(&response_txt).context("decoding multi-search response")?;
        if response.results.len() != expected {
            anyhow::bail!("backend returned {} results for {} requests", response.results.len(), expected);
        }
        Ok(response.results)
    }
}

impl SearchClient for HttpSearchClient {
    fn search(&self, requests: Vec<SearchRequest>) -> BoxFuture<'static, anyhow::Result<Vec<SearchResponse>>> {
        let client = self.clone();
        Box::pin(async move { client.multi_search(requests).await })
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::post};
    use common::{IndexConfig, ParametersValue};
    use serde_json::{Value, json};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/")
    }

    fn request(query: &str) -> SearchRequest {
        let params = ParametersValue::new(IndexConfig::new("products")).unwrap().set_query(query);
        SearchRequest::from(&params)
    }

    #[test]
    fn endpoint_is_built_from_base_url() {
        assert_eq!(HttpSearchClient::new("http://search:9308/").endpoint(), "http://search:9308/multi_search");
    }

    #[tokio::test]
    async fn posts_batch_and_decodes_results_in_order() {
        let app = Router::new().route(
            "/multi_search",
            post(|Json(body): Json<Value>| async move {
                let results = body["requests"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|request| json!({"query": request["params"]["query"], "nbHits": 7}))
                    .collect::<Vec<_>>();
                Json(json!({ "results": results }))
            }),
        );
        let client = HttpSearchClient::new(serve(app).await);

        let responses = client.search(vec![request("first"), request("second")]).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].query, "first");
        assert_eq!(responses[1].query, "second");
        assert_eq!(responses[1].nb_hits, 7);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let app = Router::new().route("/multi_search", post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "index offline") }));
        let client = HttpSearchClient::new(serve(app).await);

        let err = client.multi_search(vec![request("q")]).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("index offline"));
    }

    #[tokio::test]
    async fn result_count_must_match_request_count() {
        let app = Router::new().route("/multi_search", post(|| async { Json(json!({ "results": [] })) }));
        let client = HttpSearchClient::new(serve(app).await);

        let err = client.multi_search(vec![request("q")]).await.unwrap_err();
        assert!(err.to_string().contains("0 results for 1 requests"));
    }
}

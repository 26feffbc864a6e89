//! Seam between the helper and whatever executes searches.

use std::future::Future;

use common::{SearchRequest, SearchResponse};
use futures::future::BoxFuture;

pub trait SearchClient: Send + Sync + 'static {
    /// Resolves to exactly one response per request, in request order.
    /// Transport failures resolve to `Err`; implementations do not retry.
    fn search(&self, requests: Vec<SearchRequest>) -> BoxFuture<'static, anyhow::Result<Vec<SearchResponse>>>;
}

impl<F, Fut> SearchClient for F
where
    F: Fn(Vec<SearchRequest>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Vec<SearchResponse>>> + Send + 'static,
{
    fn search(&self, requests: Vec<SearchRequest>) -> BoxFuture<'static, anyhow::Result<Vec<SearchResponse>>> {
        Box::pin(self(requests))
    }
}

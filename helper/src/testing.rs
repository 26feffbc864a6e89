//! Test doubles: a search client resolved by hand and an event recorder.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{SearchRequest, SearchResponse};
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::events::{EventKind, HelperEvent};
use crate::helper::Helper;
use crate::search_client::SearchClient;

type Responder = oneshot::Sender<anyhow::Result<Vec<SearchResponse>>>;

struct PendingCall {
    requests: Vec<SearchRequest>,
    responder: Option<Responder>,
}

/// Records every call and leaves it pending until the test resolves it.
#[derive(Clone, Default)]
pub(crate) struct ManualClient {
    calls: Arc<Mutex<Vec<PendingCall>>>,
}

impl SearchClient for ManualClient {
    fn search(&self, requests: Vec<SearchRequest>) -> BoxFuture<'static, anyhow::Result<Vec<SearchResponse>>> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(PendingCall { requests, responder: Some(tx) });
        Box::pin(async move { rx.await.unwrap_or_else(|_| Err(anyhow::anyhow!("request abandoned"))) })
    }
}

impl ManualClient {
    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn requests(&self, call: usize) -> Vec<SearchRequest> {
        self.calls.lock().unwrap()[call].requests.clone()
    }

    /// Answers every request of `call` with a response echoing its query.
    pub(crate) fn respond(&self, call: usize) {
        let responses = self.requests(call).iter().map(echo).collect();
        self.resolve(call, Ok(responses));
    }

    pub(crate) fn fail(&self, call: usize, message: &str) {
        self.resolve(call, Err(anyhow::anyhow!(message.to_string())));
    }

    pub(crate) fn resolve(&self, call: usize, outcome: anyhow::Result<Vec<SearchResponse>>) {
        let responder = self.calls.lock().unwrap()[call].responder.take().expect("call already resolved");
        let _ = responder.send(outcome);
    }
}

pub(crate) fn echo(request: &SearchRequest) -> SearchResponse {
    SearchResponse {
        query: request.params.query.clone(),
        page: request.params.page,
        nb_hits: 1,
        ..Default::default()
    }
}

#[derive(Clone, Default)]
pub(crate) struct Recorder {
    events: Arc<Mutex<Vec<HelperEvent>>>,
}

impl Recorder {
    pub(crate) fn attach(helper: &Helper) -> Self {
        let recorder = Recorder::default();
        for kind in EventKind::ALL {
            let events = recorder.events.clone();
            let _ = helper.on(kind, move |event| events.lock().unwrap().push(event.clone()));
        }
        recorder
    }

    pub(crate) fn handler(&self) -> impl Fn(&HelperEvent) + Send + Sync + 'static {
        let events = self.events.clone();
        move |event| events.lock().unwrap().push(event.clone())
    }

    pub(crate) fn events(&self) -> Vec<HelperEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(HelperEvent::kind).collect()
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }

    pub(crate) fn queries_of_results(&self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|event| match event {
                HelperEvent::Result { results, .. } => Some(results.state().query().to_string()),
                _ => None,
            })
            .collect()
    }

    pub(crate) async fn wait_for(&self, kind: EventKind, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count(kind) < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} {kind} events, got {:?}", self.kinds()));
    }

    pub(crate) async fn wait_for_idle(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.idle_count() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for idle queue, got {:?}", self.kinds()));
    }

    fn idle_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HelperEvent::SearchQueueEmpty { is_empty: true }))
            .count()
    }
}

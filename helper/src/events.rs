//! Helper lifecycle events and the observer capability UI bindings implement.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use common::{ParametersValue, SearchResults};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Change,
    Search,
    Result,
    Error,
    SearchQueueEmpty,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Change,
        EventKind::Search,
        EventKind::Result,
        EventKind::Error,
        EventKind::SearchQueueEmpty,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Change => "change",
            EventKind::Search => "search",
            EventKind::Result => "result",
            EventKind::Error => "error",
            EventKind::SearchQueueEmpty => "searchQueueEmpty",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownEventKind(pub String);

impl Display for UnknownEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown event name: {:?}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum HelperEvent {
    /// The state was replaced by a mutation. Emitted synchronously, never by derived helpers.
    Change {
        state: ParametersValue,
        results: Option<Arc<SearchResults>>,
        is_page_reset: bool,
    },
    Search {
        state: ParametersValue,
        sequence: u64,
    },
    /// An accepted response. `results.state()` holds the originating parameters.
    Result {
        results: Arc<SearchResults>,
        sequence: u64,
    },
    Error {
        error: Arc<anyhow::Error>,
        state: ParametersValue,
        sequence: u64,
    },
    SearchQueueEmpty {
        is_empty: bool,
    },
}

impl HelperEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HelperEvent::Change { .. } => EventKind::Change,
            HelperEvent::Search { .. } => EventKind::Search,
            HelperEvent::Result { .. } => EventKind::Result,
            HelperEvent::Error { .. } => EventKind::Error,
            HelperEvent::SearchQueueEmpty { .. } => EventKind::SearchQueueEmpty,
        }
    }
}

/// Implemented by UI bindings that want every event kind through one object.
pub trait HelperObserver: Send + Sync {
    fn on_change(&self, _state: &ParametersValue, _is_page_reset: bool) {}
    fn on_search(&self, _state: &ParametersValue) {}
    fn on_result(&self, _results: &SearchResults) {}
    fn on_error(&self, _error: &anyhow::Error, _state: &ParametersValue) {}
    fn on_search_queue_empty(&self, _is_empty: bool) {}
}

pub(crate) fn dispatch(observer: &dyn HelperObserver, event: &HelperEvent) {
    match event {
        HelperEvent::Change { state, is_page_reset, .. } => observer.on_change(state, *is_page_reset),
        HelperEvent::Search { state, .. } => observer.on_search(state),
        HelperEvent::Result { results, .. } => observer.on_result(results),
        HelperEvent::Error { error, state, .. } => observer.on_error(error, state),
        HelperEvent::SearchQueueEmpty { is_empty } => observer.on_search_queue_empty(*is_empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(kind.name().parse::<EventKind>(), Ok(kind));
        }
        assert_eq!("searchQueueEmpty".parse::<EventKind>(), Ok(EventKind::SearchQueueEmpty));
        assert!("changed".parse::<EventKind>().is_err());
    }

    #[test]
    fn serialized_names_match_display() {
        for kind in EventKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), serde_json::Value::from(kind.name()));
        }
    }
}

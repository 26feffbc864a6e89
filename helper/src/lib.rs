//! Search-state orchestration: mutations, batched searches and event delivery.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod derived_helper;
pub mod error;
pub mod event_bus;
pub mod events;
pub mod helper;
pub mod http_client;
pub mod search_client;

#[cfg(test)]
mod testing;

pub use derived_helper::DerivedHelper;
pub use error::HelperError;
pub use event_bus::{EventBus, Subscription};
pub use events::{EventKind, HelperEvent, HelperObserver};
pub use helper::Helper;
pub use http_client::HttpSearchClient;
pub use search_client::SearchClient;

/// State guarded here stays consistent across handler panics, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

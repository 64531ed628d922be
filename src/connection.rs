// src/connection.rs
//! Catch-up for late joiners: replay every cached value to one new subscriber.

use std::sync::Arc;

use crate::cache::Cache;
use crate::hub::{Broadcaster, SubscriberId};

#[derive(Clone)]
pub struct ConnectionManager {
    cache: Arc<Cache>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl ConnectionManager {
    pub fn new(cache: Arc<Cache>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { cache, broadcaster }
    }

    /// Unicast the latest value of every populated source to `subscriber`.
    /// Sources that have never been fetched are skipped; the subscriber gets
    /// them with the next successful refresh. Returns the number of events sent.
    ///
    /// The subscriber must already be registered with the broadcaster: each
    /// unicast happens under the entry's lock, so a refresh racing with the
    /// catch-up is delivered either before it (and re-sent by it) or after it.
    pub fn on_connect(&self, subscriber: SubscriberId) -> usize {
        self.cache.for_each(|entry| {
            tracing::info!(
                target: "feed",
                source = %entry.source,
                %subscriber,
                "emit data (catch-up)"
            );
            self.broadcaster
                .unicast(subscriber, &entry.source, entry.payload.clone());
        })
    }
}

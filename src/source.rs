// src/source.rs
//! Static definition of one polled data source.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One named, independently scheduled feed.
///
/// `name` doubles as the event identifier on the wire, so it must be unique
/// across the configured set. `target` is opaque to the scheduler and only
/// interpreted by the fetcher (a procedure name, a URL path, a fixture stem).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub name: String,
    pub target: String,
    pub refresh_interval_secs: u64,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, target: impl Into<String>, refresh_interval_secs: u64) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            refresh_interval_secs,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// The dashboard's stock source set: meter summary plus five chart ranges.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("summary", "GetSummary", 10),
        SourceDescriptor::new("lastHour", "GetDataLastHour", 30),
        SourceDescriptor::new("last24Hours", "GetDataLast24h", 5 * 60),
        SourceDescriptor::new("last7Days", "GetDataLast7Days", 30 * 60),
        SourceDescriptor::new("last30Days", "GetDataLast30Days", 30 * 60),
        SourceDescriptor::new("last365Days", "GetDataLast365Days", 24 * 3600),
    ]
}

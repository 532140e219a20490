//! Sync report written at the end of a session.

use anyhow::Result;
use serde::Serialize;
use spawnsync_core::EndpointId;
use spawnsync_net::SyncStats;
use std::fmt;

use crate::JsonlSink;

/// Counters for one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    /// Endpoint.
    pub endpoint: EndpointId,
    /// Coordinator counters.
    pub stats: SyncStats,
    /// Objects tracked by the coordinator.
    pub tracked: usize,
    /// Objects still waiting for a reply.
    pub awaiting: usize,
}

/// Counters for every endpoint in a session.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Authority time when the report was taken.
    pub time: f32,
    /// One entry per endpoint, authority first.
    pub endpoints: Vec<EndpointReport>,
}

impl SyncReport {
    /// Objects waiting for a reply, summed across endpoints.
    pub fn total_awaiting(&self) -> usize {
        self.endpoints.iter().map(|e| e.awaiting).sum()
    }

    /// Write one JSON line per endpoint.
    pub fn write_jsonl(&self, sink: &mut JsonlSink) -> Result<()> {
        for endpoint in &self.endpoints {
            sink.write_json(endpoint)?;
        }
        Ok(())
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sync report at t={:.2}s", self.time)?;
        for e in &self.endpoints {
            writeln!(
                f,
                "  {:<10} requests={} retries={} served={} applied={} dropped={} awaiting={}/{}",
                e.endpoint.to_string(),
                e.stats.requests_sent,
                e.stats.retries,
                e.stats.replies_served,
                e.stats.records_applied,
                e.stats.records_dropped,
                e.awaiting,
                e.tracked,
            )?;
        }
        Ok(())
    }
}

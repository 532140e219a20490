#![warn(missing_docs)]
//! Headless test harness: multi-endpoint sessions and JSONL event logs.

mod report;
mod session;

use anyhow::Result;
use serde::Serialize;
use spawnsync_core::EndpointId;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub use report::{EndpointReport, SyncReport};
pub use session::{Peer, Session, SyncEvent};

/// Primary event record captured by headless runs.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    /// Endpoint that observed the event.
    pub endpoint: EndpointId,
    /// Human-readable kind label.
    pub kind: &'a str,
    /// Free-form payload.
    pub payload: &'a str,
}

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: File,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent dirs if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self { file })
    }

    /// Append an event to the log.
    pub fn write(&mut self, event: &EventRecord<'_>) -> Result<()> {
        self.write_json(event)
    }

    /// Append any serializable value as one line.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let line = serde_json::to_string(value)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn jsonl_sink_writes_one_line_per_event() {
        let path = std::env::temp_dir().join(format!(
            "spawnsync-events-{}.jsonl",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let mut sink = JsonlSink::create(&path).expect("sink create");
        sink.write(&EventRecord {
            endpoint: EndpointId::SERVER,
            kind: "Spawn",
            payload: "grenade",
        })
        .expect("write succeeds");
        sink.write(&EventRecord {
            endpoint: EndpointId(3),
            kind: "Applied",
            payload: "grenade",
        })
        .expect("write succeeds");
        drop(sink);

        let contents = fs::read_to_string(&path).expect("file readable");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Applied"));
    }
}

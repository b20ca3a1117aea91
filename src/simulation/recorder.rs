//! Event persistence.
//!
//! The controller forwards every [`EventRecord`] here. Records are written
//! as one JSON object per line so downstream tooling can stream-parse the
//! log. Persistence is optional; a disabled log swallows records and the
//! controller's debug logging remains the only trace.

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::types::EventRecord;

/// JSON-lines sink for event records.
pub struct EventLog {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Creates (truncates) the log file at `path`. Creation failures are
    /// fatal configuration errors, surfaced before the simulation starts.
    pub fn create(path: &str) -> anyhow::Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create event log: {}", path))?;
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path: Some(PathBuf::from(path)),
        })
    }

    /// A log that drops every record.
    pub fn disabled() -> Self {
        Self {
            writer: None,
            path: None,
        }
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Appends one record as a JSON line.
    pub fn append(&mut self, record: &EventRecord) -> anyhow::Result<()> {
        if let Some(writer) = &mut self.writer {
            let line = serde_json::to_string(record).context("Failed to serialize event record")?;
            writeln!(writer, "{}", line).context("Failed to append to event log")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if let Some(writer) = &mut self.writer {
            writer.flush().context("Failed to flush event log")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::types::{ActivityKind, SimulationClock};

    #[test]
    fn appends_parseable_json_lines() {
        let path = std::env::temp_dir().join(format!("ens-eventlog-test-{}.jsonl", std::process::id()));
        let path_str = path.to_str().unwrap();
        let clock = SimulationClock::start_now();

        let mut event_log = EventLog::create(path_str).unwrap();
        event_log
            .append(&EventRecord::debit(&clock, 1, ActivityKind::Transmit, 10.0, 990.0))
            .unwrap();
        event_log.append(&EventRecord::depleted(&clock, 1, 0.0)).unwrap();
        event_log.flush().unwrap();
        drop(event_log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "transmit");
        assert_eq!(first["node_id"], 1);
        assert_eq!(first["magnitude"], -10.0);
        assert_eq!(first["resulting_level"], 990.0);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["kind"], "depleted");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn disabled_log_accepts_records() {
        let clock = SimulationClock::start_now();
        let mut event_log = EventLog::disabled();
        assert!(event_log.path().is_none());
        assert!(event_log.append(&EventRecord::credit(&clock, 2, 50.0, 100.0)).is_ok());
        assert!(event_log.flush().is_ok());
    }
}

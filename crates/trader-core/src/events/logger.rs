//! Decision Logger
//!
//! Append-only JSONL log of decisions and the updates their outcomes caused.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use trader_events::{Decision, Outcome, SimTime};

use crate::population::PopulationHook;
use crate::systems::UpdateReport;

/// One line of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub event_id: String,
    pub tick: SimTime,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Decision {
        decision: Decision,
    },
    Outcome {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<Outcome>,
        report: UpdateReport,
    },
}

/// Writes decisions and outcome reports to a JSONL file
pub struct DecisionLog {
    writer: Option<BufWriter<File>>,
    entry_count: u64,
    next_entry_id: u64,
}

impl DecisionLog {
    /// Create a new log writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            entry_count: 0,
            next_entry_id: 1,
        })
    }

    /// Create a log that discards entries
    pub fn null() -> Self {
        Self {
            writer: None,
            entry_count: 0,
            next_entry_id: 1,
        }
    }

    pub fn next_id(&mut self) -> String {
        let id = format!("evt_{:08}", self.next_entry_id);
        self.next_entry_id += 1;
        id
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn log(&mut self, tick: SimTime, entry: LogEntry) -> std::io::Result<()> {
        let record = LogRecord {
            event_id: self.next_id(),
            tick,
            entry,
        };
        self.entry_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(&record)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn log_decision(&mut self, decision: &Decision) -> std::io::Result<()> {
        self.log(
            decision.decided_at,
            LogEntry::Decision {
                decision: decision.clone(),
            },
        )
    }

    pub fn log_outcome(&mut self, tick: SimTime, outcome: Option<&Outcome>, report: &UpdateReport) -> std::io::Result<()> {
        self.log(
            tick,
            LogEntry::Outcome {
                outcome: outcome.cloned(),
                report: report.clone(),
            },
        )
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for DecisionLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "Failed to flush decision log");
        }
    }
}

impl PopulationHook for DecisionLog {
    fn on_decision(&mut self, decision: &Decision) {
        if let Err(e) = self.log_decision(decision) {
            tracing::warn!(agent = %decision.agent_id, error = %e, "Failed to log decision");
        }
    }

    fn on_outcome(&mut self, tick: SimTime, outcome: Option<&Outcome>, report: &UpdateReport) {
        if let Err(e) = self.log_outcome(tick, outcome, report) {
            tracing::warn!(agent = %report.agent_id, error = %e, "Failed to log outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agent::Agent;
    use crate::components::traits::TraitVector;
    use crate::config::{AgentConfig, TuningConfig};
    use crate::systems::decide;
    use std::io::BufRead;
    use trader_events::{fixtures, AgentId, NetworkContext};

    fn sample_decision() -> Decision {
        let mut agent = Agent::new(
            AgentId::from("trader_1"),
            AgentConfig::default(),
            TraitVector::new(),
            SimTime::ZERO,
        );
        decide(
            &mut agent,
            &fixtures::day_trade(),
            &fixtures::steady_market(),
            &NetworkContext::default(),
            SimTime::new(4),
            42,
            &TuningConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_decision_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");

        let mut log = DecisionLog::new(&path).unwrap();
        let decision = sample_decision();
        log.log_decision(&decision).unwrap();
        log.flush().unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 1);

        let parsed: LogRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.event_id, "evt_00000001");
        assert_eq!(parsed.tick, SimTime::new(4));
        match parsed.entry {
            LogEntry::Decision { decision: logged } => {
                assert_eq!(logged.session_id, decision.session_id);
                assert_eq!(logged.action, decision.action);
            }
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(lines[0].contains("\"kind\":\"decision\""));
    }

    #[test]
    fn test_null_log() {
        let mut log = DecisionLog::null();
        log.on_decision(&sample_decision());
        assert_eq!(log.entry_count(), 1);
        assert_eq!(log.next_id(), "evt_00000002");
    }
}

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use calcserve::{Task, TaskId, TaskKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `Task: <id> arg1: <x> [arg2: <n>] Result: <r>`
    Text,
    /// One JSON object per line
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "jsonl",
        }
    }
}

/// One completed (or failed) task as seen by a producer.
#[derive(Debug)]
pub struct Record<'a> {
    pub id: TaskId,
    pub task: Task,
    pub outcome: &'a calcserve::Result<f64>,
}

#[derive(Debug, Serialize)]
struct JsonRecord {
    id: TaskId,
    kind: TaskKind,
    operand: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    exponent: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&Record<'_>> for JsonRecord {
    fn from(record: &Record<'_>) -> Self {
        let (value, error) = match record.outcome {
            Ok(value) => (Some(*value), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            id: record.id,
            kind: record.task.kind,
            operand: record.task.operand,
            exponent: (record.task.kind == TaskKind::Power).then_some(record.task.exponent),
            value,
            error,
        }
    }
}

/// Writes one line per record.
pub struct RecordSink<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl RecordSink<BufWriter<File>> {
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), format))
    }
}

impl<W: Write> RecordSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    pub fn write(&mut self, record: &Record<'_>) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                write!(self.writer, "Task: {} arg1: {}", record.id, record.task.operand)?;
                if record.task.kind == TaskKind::Power {
                    write!(self.writer, " arg2: {}", record.task.exponent)?;
                }
                match record.outcome {
                    Ok(value) => writeln!(self.writer, " Result: {}", value)?,
                    Err(err) => writeln!(self.writer, " Error: {}", err)?,
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, &JsonRecord::from(record))?;
                writeln!(self.writer)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use calcserve::Error;

    use super::*;

    fn render(format: OutputFormat, records: &[Record<'_>]) -> String {
        let mut buf = Vec::new();
        let mut sink = RecordSink::new(&mut buf, format);
        for record in records {
            sink.write(record).unwrap();
        }
        sink.flush().unwrap();
        drop(sink);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_text_format() {
        let ok = Ok(1024.0);
        let sine = Ok(0.5);
        let failed = Err(Error::Domain {
            kind: TaskKind::SquareRoot,
            operand: -1.0,
        });
        let out = render(
            OutputFormat::Text,
            &[
                Record {
                    id: TaskId::from(3),
                    task: Task::power(2.0, 10),
                    outcome: &ok,
                },
                Record {
                    id: TaskId::from(4),
                    task: Task::sine(0.25),
                    outcome: &sine,
                },
                Record {
                    id: TaskId::from(5),
                    task: Task::square_root(-1.0),
                    outcome: &failed,
                },
            ],
        );

        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "Task: 3 arg1: 2 arg2: 10 Result: 1024");
        assert_eq!(lines[1], "Task: 4 arg1: 0.25 Result: 0.5");
        assert_eq!(
            lines[2],
            "Task: 5 arg1: -1 Error: Domain error: sqrt is undefined for operand -1"
        );
    }

    #[test]
    fn test_json_format() {
        let ok = Ok(3.0);
        let out = render(
            OutputFormat::Json,
            &[Record {
                id: TaskId::from(0),
                task: Task::square_root(9.0),
                outcome: &ok,
            }],
        );

        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["id"], 0);
        assert_eq!(value["kind"], "square-root");
        assert_eq!(value["operand"], 9.0);
        assert_eq!(value["value"], 3.0);
        assert!(value.get("exponent").is_none());
        assert!(value.get("error").is_none());
    }
}

//! Upstream reading raw change records from a JSON Lines file.
//!
//! Each line is one record:
//!
//! ```json
//! {"op": "c", "table": "orders", "after": {"id": 1}, "ts": 1700000000000, "unit": "millis"}
//! ```
//!
//! The offset of a record is `{"line": n}` with `n` its 1-based line number.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::{ClockUnit, RawRecord, StreamOffset, UpstreamSource};

#[derive(Debug, Deserialize)]
struct JsonlChange {
    op: String,
    table: String,
    #[serde(default)]
    before: Option<serde_json::Value>,
    #[serde(default)]
    after: Option<serde_json::Value>,
    ts: i64,
    #[serde(default)]
    unit: ClockUnit,
}

pub struct JsonlUpstream {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: u64,
    resume_after: u64,
    watch: HashSet<String>,
}

impl JsonlUpstream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: None,
            line_no: 0,
            resume_after: 0,
            watch: HashSet::new(),
        }
    }

    /// Offset of the record on `line`.
    pub fn offset_for_line(line: u64) -> StreamOffset {
        StreamOffset::new(json!({ "line": line }))
    }
}

#[async_trait]
impl UpstreamSource for JsonlUpstream {
    async fn open(
        &mut self,
        watch: &[String],
        resume: Option<&StreamOffset>,
    ) -> anyhow::Result<()> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open change file {}", self.path.display()))?;

        self.resume_after = match resume {
            Some(offset) => offset
                .get("line")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| {
                    anyhow::anyhow!("Offset {} has no line number", offset.source_offset)
                })?,
            None => 0,
        };
        self.watch = watch.iter().cloned().collect();
        self.line_no = 0;
        self.lines = Some(BufReader::new(file).lines());
        Ok(())
    }

    async fn next_record(&mut self) -> anyhow::Result<Option<RawRecord>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("JSONL upstream is not open"))?;

        while let Some(line) = lines.next_line().await? {
            self.line_no += 1;
            if self.line_no <= self.resume_after || line.trim().is_empty() {
                continue;
            }

            let change: JsonlChange = serde_json::from_str(&line).with_context(|| {
                format!("Malformed change on line {} of {}", self.line_no, self.path.display())
            })?;
            if !self.watch.is_empty() && !self.watch.contains(&change.table) {
                continue;
            }

            return Ok(Some(RawRecord {
                op: change.op,
                table: change.table,
                before: change.before,
                after: change.after,
                source_offset: json!({ "line": self.line_no }),
                source_clock: change.ts,
                clock_unit: change.unit,
            }));
        }
        Ok(None)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.lines = None;
        Ok(())
    }
}

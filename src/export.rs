//! Result export: hand a `ClusterResult` to tabular or JSON storage.
//!
//! The expansion controller never writes files. Callers pick a sink and
//! persist the result themselves:
//!
//! ```text
//! ExpansionOutcome.result → CsvSink  → cell_id,count rows
//!                         → JsonSink → [{"id": .., "count": ..}, ...]
//! ```

use std::io::Write;

use serde::Serialize;

use crate::model::{ClusterResult, EntityId};
use crate::Result;

/// Header row written by [`CsvSink`].
pub const CSV_HEADER: &str = "cell_id,count";

/// Anything that can persist a cluster membership list.
pub trait ResultSink<Id: EntityId> {
    fn persist(&mut self, result: &ClusterResult<Id>) -> Result<()>;
}

// ============================================================================
// CSV
// ============================================================================

/// Writes `cell_id,count` rows in result order.
pub struct CsvSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<Id: EntityId, W: Write> ResultSink<Id> for CsvSink<W> {
    fn persist(&mut self, result: &ClusterResult<Id>) -> Result<()> {
        writeln!(self.writer, "{CSV_HEADER}")?;
        for member in result {
            writeln!(self.writer, "{},{}", csv_field(&member.id.to_string()), member.count)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Quote a field if it contains a delimiter, quote or newline.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Writes the result as a JSON array of `{id, count}` objects.
pub struct JsonSink<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, pretty: false }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<Id: EntityId + Serialize, W: Write> ResultSink<Id> for JsonSink<W> {
    fn persist(&mut self, result: &ClusterResult<Id>) -> Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, result)?;
        } else {
            serde_json::to_writer(&mut self.writer, result)?;
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Conventional file name for a run's membership list:
/// `seed{seed}-list_i{rounds}_l{k}.csv`.
pub fn result_file_name(seed: &impl std::fmt::Display, round_budget: u32, neighbors_per_query: usize) -> String {
    format!("seed{seed}-list_i{round_budget}_l{neighbors_per_query}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClusterMember;

    fn sample() -> ClusterResult<u64> {
        ClusterResult::from_ordered(vec![
            ClusterMember { id: 4, count: 3 },
            ClusterMember { id: 2, count: 2 },
        ])
    }

    #[test]
    fn test_csv_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.persist(&sample()).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "cell_id,count\n4,3\n2,2\n");
    }

    #[test]
    fn test_csv_empty_result_keeps_header() {
        let mut sink = CsvSink::new(Vec::new());
        sink.persist(&ClusterResult::<u64>::default()).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "cell_id,count\n");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_json_shape() {
        let mut sink = JsonSink::new(Vec::new());
        sink.persist(&sample()).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.trim_end(), r#"[{"id":4,"count":3},{"id":2,"count":2}]"#);
    }

    #[test]
    fn test_result_file_name() {
        assert_eq!(result_file_name(&100_825u64, 5, 1024), "seed100825-list_i5_l1024.csv");
    }
}

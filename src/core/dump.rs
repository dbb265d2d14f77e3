//! The table dumper.
//!
//! Walks the fixed list of tables and, for each one, asks a [`QueryTool`]
//! for its schema and then for its rows. Every request stands on its own: a
//! failure is reported on the error stream and the dump moves on.

use crate::core::db::Db;
use crate::core::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Tables of a changes database, in dump order.
pub const TABLES: [&str; 6] = ["branches", "tags", "files", "commits", "backports", "changes"];

/// Default database file, relative to the working directory.
pub const DEFAULT_DB: &str = "changes.sqlite";

/// Something that can answer schema and row requests for a table.
pub trait QueryTool {
    /// Text of the statements defining `table`.
    fn schema(&self, table: &str) -> Result<String>;

    /// Text of every row of `table`.
    fn rows(&self, table: &str) -> Result<String>;
}

/// Query tool backed by a SQLite file.
///
/// Each request opens its own read-only connection and drops it afterwards.
#[derive(Debug, Clone)]
pub struct SqliteTool {
    path: PathBuf,
}

impl SqliteTool {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SqliteTool {
    fn default() -> Self {
        Self::new(DEFAULT_DB)
    }
}

impl QueryTool for SqliteTool {
    fn schema(&self, table: &str) -> Result<String> {
        Db::open_read_only(&self.path)?.schema_text(table)
    }

    fn rows(&self, table: &str) -> Result<String> {
        Db::open_read_only(&self.path)?.rows_text(table)
    }
}

/// The two request kinds issued per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Schema,
    Rows,
}

impl Request {
    fn as_str(self) -> &'static str {
        match self {
            Request::Schema => "schema",
            Request::Rows => "rows",
        }
    }
}

/// Outcome of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    /// Tables visited.
    pub tables: usize,
    /// Requests issued.
    pub requests: usize,
    /// Requests that failed.
    pub failures: usize,
}

impl DumpReport {
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }

    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Dump `tables` in order through `tool`.
///
/// Answers go to `out`, each table followed by one blank line. Failed
/// requests are written to `err` as `Error: <message>`. Only write errors
/// on the streams themselves abort the dump.
pub fn dump_tables<Q, W, E>(tool: &Q, tables: &[&str], out: &mut W, err: &mut E) -> Result<DumpReport>
where
    Q: QueryTool + ?Sized,
    W: Write,
    E: Write,
{
    let mut report = DumpReport::default();

    for &table in tables {
        for request in [Request::Schema, Request::Rows] {
            debug!(table, request = request.as_str(), "issuing request");
            report.requests += 1;

            let answer = match request {
                Request::Schema => tool.schema(table),
                Request::Rows => tool.rows(table),
            };

            match answer {
                Ok(text) => out.write_all(text.as_bytes())?,
                Err(e) => {
                    report.failures += 1;
                    warn!(table, request = request.as_str(), code = e.error_code(), "request failed");
                    out.flush()?;
                    writeln!(err, "Error: {}", e)?;
                }
            }
        }

        writeln!(out)?;
        report.tables += 1;
    }

    out.flush()?;
    info!(
        tables = report.tables,
        requests = report.requests,
        failures = report.failures,
        "dump finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DumpError;
    use std::cell::RefCell;

    /// Records every request and fails the ones listed in `missing`.
    #[derive(Default)]
    struct RecordingTool {
        calls: RefCell<Vec<(String, Request)>>,
        missing: Vec<&'static str>,
    }

    impl RecordingTool {
        fn answer(&self, table: &str, request: Request) -> Result<String> {
            self.calls.borrow_mut().push((table.to_string(), request));
            if request == Request::Rows && self.missing.iter().any(|m| *m == table) {
                return Err(DumpError::Db(rusqlite::Error::InvalidQuery));
            }
            Ok(format!("{}:{}\n", table, request.as_str()))
        }
    }

    impl QueryTool for RecordingTool {
        fn schema(&self, table: &str) -> Result<String> {
            self.answer(table, Request::Schema)
        }

        fn rows(&self, table: &str) -> Result<String> {
            self.answer(table, Request::Rows)
        }
    }

    #[test]
    fn test_requests_follow_table_order() {
        let tool = RecordingTool::default();
        let mut out = Vec::new();
        let mut err = Vec::new();

        let report = dump_tables(&tool, &TABLES, &mut out, &mut err).unwrap();

        let expected: Vec<(String, Request)> = TABLES
            .iter()
            .flat_map(|t| [(t.to_string(), Request::Schema), (t.to_string(), Request::Rows)])
            .collect();
        assert_eq!(*tool.calls.borrow(), expected);
        assert_eq!(
            report,
            DumpReport {
                tables: 6,
                requests: 12,
                failures: 0
            }
        );
        assert!(err.is_empty());
    }

    #[test]
    fn test_blank_line_after_every_table() {
        let tool = RecordingTool::default();
        let mut out = Vec::new();
        let mut err = Vec::new();

        dump_tables(&tool, &TABLES, &mut out, &mut err).unwrap();

        let text = String::from_utf8(out).unwrap();
        let expected: String = TABLES
            .iter()
            .map(|t| format!("{t}:schema\n{t}:rows\n\n"))
            .collect();
        assert_eq!(text, expected);
        assert_eq!(text.matches("\n\n").count(), 6);
        assert!(text.ends_with("changes:rows\n\n"));
    }

    #[test]
    fn test_failed_request_does_not_stop_dump() {
        let tool = RecordingTool {
            missing: vec!["files"],
            ..Default::default()
        };
        let mut out = Vec::new();
        let mut err = Vec::new();

        let report = dump_tables(&tool, &TABLES, &mut out, &mut err).unwrap();

        assert_eq!(tool.calls.borrow().len(), 12);
        assert_eq!(report.failures, 1);
        assert_eq!(report.exit_code(), 1);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("files:schema\n\ncommits:schema\n"));
        assert!(text.ends_with("changes:rows\n\n"));

        let errors = String::from_utf8(err).unwrap();
        assert_eq!(errors.lines().count(), 1);
        assert!(errors.starts_with("Error: "));
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = DumpReport::default();
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_sqlite_tool_defaults_to_changes_sqlite() {
        assert_eq!(SqliteTool::default().path(), Path::new("changes.sqlite"));
    }
}

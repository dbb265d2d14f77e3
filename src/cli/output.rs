//! Output handling for the CLI.

use crate::core::dump::{dump_tables, DumpReport, QueryTool};
use crate::core::error::Result;
use std::io;
use std::path::Path;

/// Dump `tables` to the process's stdout, with request errors on stderr.
pub fn dump_to_stdio<Q: QueryTool + ?Sized>(tool: &Q, tables: &[&str]) -> Result<DumpReport> {
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    dump_tables(tool, tables, &mut out, &mut err)
}

/// Format init output.
pub fn format_init(db_path: &Path, rotated: Option<&Path>) {
    if let Some(old) = rotated {
        println!("Moved previous database to {}", old.display());
    }
    println!("Initialized changes database at {}", db_path.display());
}

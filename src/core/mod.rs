//! Core logic of the changes dumper.
//!
//! The dump loop, the SQLite query tool it talks to and the schema of the
//! changes database live here. The CLI is a thin layer on top.

pub mod db;
pub mod dump;
pub mod error;
pub mod render;

pub use dump::{dump_tables, DumpReport, QueryTool, SqliteTool, TABLES};
pub use error::{DumpError, Result};

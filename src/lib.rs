//! changes-dump - schema and row dump of the kernel changes database.
//!
//! This library holds the dumper, the SQLite query tool behind it and the
//! schema of the changes database.

pub mod cli;
pub mod core;

//! CLI interface for the changes dumper.

pub mod output;

use crate::core::db::Db;
use crate::core::dump::{SqliteTool, DEFAULT_DB, TABLES};
use crate::core::error::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

/// changes-dump - schema and row dump of a changes database
#[derive(Parser, Debug)]
#[command(name = "changes-dump")]
#[command(about = "Dump the tables of a kernel changes database", long_about = None)]
struct Cli {
    /// Database file
    #[arg(long, global = true, env = "CHANGES_DB", default_value = DEFAULT_DB)]
    db: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print schema and rows of every table (default)
    Dump,

    /// Create an empty changes database
    Init,
}

/// Path an existing database is moved to by `init`.
fn rotated_path(db_path: &Path) -> PathBuf {
    let mut old = db_path.as_os_str().to_owned();
    old.push(".OLD");
    PathBuf::from(old)
}

/// Create the database, moving any previous one out of the way.
fn init(db_path: &Path) -> Result<Option<PathBuf>> {
    let rotated = if db_path.exists() {
        let old = rotated_path(db_path);
        std::fs::rename(db_path, &old)?;
        info!(from = %db_path.display(), to = %old.display(), "rotated previous database");
        Some(old)
    } else {
        None
    };

    let db = Db::create(db_path)?;
    db.init_schema()?;
    Ok(rotated)
}

/// Run the CLI and return the process exit status.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Dump) {
        Command::Dump => {
            let tool = SqliteTool::new(&cli.db);
            let report = output::dump_to_stdio(&tool, &TABLES)?;
            Ok(report.exit_code())
        }

        Command::Init => {
            let rotated = init(&cli.db)?;
            output::format_init(&cli.db, rotated.as_deref());
            Ok(0)
        }
    }
}

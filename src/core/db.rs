//! Database layer for the changes dumper.
//!
//! Handles the read-only queries behind a dump, schema creation and the
//! batch inserts used to populate a changes database.

use crate::core::error::{DumpError, Result};
use crate::core::render::render_row;
use rusqlite::{Connection, OpenFlags, Statement};
use std::collections::HashSet;
use std::path::Path;

/// Database connection and operations.
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open an existing database without write access.
    ///
    /// Fails when the file does not exist; it is never created.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open or create a database for writing.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable foreign keys
        conn.pragma_update(None, "foreign_keys", "on")?;

        Ok(Self { conn })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "on")?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Quote a table name as an SQL identifier.
pub fn quote_ident(name: &str) -> Result<String> {
    if name.contains('\0') {
        return Err(DumpError::InvalidTableName(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Queries behind a dump.
impl Db {
    /// Render the `CREATE` statements of a table and its indexes.
    ///
    /// Each statement is followed by `;` and a newline. An unknown table
    /// renders as empty text.
    pub fn schema_text(&self, table: &str) -> Result<String> {
        let mut stmt = self.conn.prepare(
            "SELECT sql FROM sqlite_master
             WHERE tbl_name = ?1 AND sql IS NOT NULL
             ORDER BY rowid",
        )?;
        let statements = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = String::new();
        for sql in statements {
            out.push_str(&sql);
            out.push_str(";\n");
        }
        Ok(out)
    }

    /// Render every row of a table in list mode, in the engine's order.
    pub fn rows_text(&self, table: &str) -> Result<String> {
        let sql = format!("SELECT * FROM {}", quote_ident(table)?);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt.column_count();

        let mut out = String::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let values = (0..columns)
                .map(|i| row.get_ref(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push_str(&render_row(values));
        }
        Ok(out)
    }
}

/// Schema creation.
impl Db {
    /// Initialize the database schema.
    /// Creates all tables and views.
    pub fn init_schema(&self) -> Result<()> {
        self.create_tables()?;
        self.create_base_views()?;
        self.create_backport_views()?;
        self.create_union_views()?;
        Ok(())
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS branches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                tag_id INTEGER NOT NULL,
                FOREIGN KEY (tag_id) REFERENCES tags(id)
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS commits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL
            );

            CREATE TABLE IF NOT EXISTS backports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                commit_id INTEGER NOT NULL,
                branch_id INTEGER NOT NULL,
                FOREIGN KEY (commit_id) REFERENCES commits(id),
                FOREIGN KEY (branch_id) REFERENCES branches(id)
            );

            CREATE TABLE IF NOT EXISTS changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                score INTEGER,
                commit_id INTEGER NOT NULL,
                from_id INTEGER,
                to_id INTEGER,
                tag_id INTEGER,
                FOREIGN KEY (commit_id) REFERENCES commits(id),
                FOREIGN KEY (from_id) REFERENCES files(id),
                FOREIGN KEY (to_id) REFERENCES files(id),
                FOREIGN KEY (tag_id) REFERENCES tags(id)
            );",
        )?;
        Ok(())
    }

    /// Changes that landed with a tag, per branch built on that tag.
    fn create_base_views(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE VIEW IF NOT EXISTS base_added AS
            SELECT b.name AS branch, f.name AS file, ci.name AS sha
            FROM files f
            JOIN changes ch ON ch.to_id = f.id AND ch.from_id IS NULL
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN tags t ON t.id = ch.tag_id
            JOIN branches b ON b.tag_id = t.id;

            CREATE VIEW IF NOT EXISTS base_renamed AS
            SELECT b.name AS branch, f.name AS file, nf.name AS new_file, ci.name AS sha
            FROM files f
            JOIN changes ch ON ch.to_id IS NOT NULL AND ch.from_id = f.id
            JOIN files nf ON ch.to_id = nf.id
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN tags t ON t.id = ch.tag_id
            JOIN branches b ON b.tag_id = t.id;

            CREATE VIEW IF NOT EXISTS base_removed AS
            SELECT b.name AS branch, f.name AS file, ci.name AS sha
            FROM files f
            JOIN changes ch ON ch.to_id IS NULL AND ch.from_id = f.id
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN tags t ON t.id = ch.tag_id
            JOIN branches b ON b.tag_id = t.id;",
        )?;
        Ok(())
    }

    /// Changes carried into a branch by backported commits.
    fn create_backport_views(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE VIEW IF NOT EXISTS backports_added AS
            SELECT b.name AS branch, f.name AS file, ci.name AS sha
            FROM backports bp
            JOIN branches b ON b.id = bp.branch_id
            JOIN changes ch ON ch.commit_id = bp.commit_id
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN files f ON f.id = ch.from_id AND ch.to_id IS NULL;

            CREATE VIEW IF NOT EXISTS backports_renamed AS
            SELECT b.name AS branch, f.name AS file, nf.name AS new_file, ci.name AS sha
            FROM backports bp
            JOIN branches b ON b.id = bp.branch_id
            JOIN changes ch ON ch.commit_id = bp.commit_id
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN files f ON f.id = ch.from_id AND ch.to_id IS NOT NULL
            JOIN files nf ON ch.to_id = nf.id;

            CREATE VIEW IF NOT EXISTS backports_removed AS
            SELECT b.name AS branch, f.name AS file, ci.name AS sha
            FROM backports bp
            JOIN branches b ON b.id = bp.branch_id
            JOIN changes ch ON ch.commit_id = bp.commit_id
            JOIN commits ci ON ci.id = ch.commit_id
            JOIN files f ON f.id = ch.from_id AND ch.to_id IS NULL;",
        )?;
        Ok(())
    }

    fn create_union_views(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE VIEW IF NOT EXISTS added AS
            SELECT branch, file, sha, 'base' AS source FROM base_added
            UNION ALL
            SELECT branch, file, sha, 'backport' AS source FROM backports_added;

            CREATE VIEW IF NOT EXISTS renamed AS
            SELECT branch, file, new_file, sha, 'base' AS source FROM base_renamed
            UNION ALL
            SELECT branch, file, new_file, sha, 'backport' AS source FROM backports_renamed;

            CREATE VIEW IF NOT EXISTS removed AS
            SELECT branch, file, sha, 'base' AS source FROM base_removed
            UNION ALL
            SELECT branch, file, sha, 'backport' AS source FROM backports_removed;",
        )?;
        Ok(())
    }
}

/// A file change introduced by a commit between two tags.
///
/// `from == None` is an added file, `to == None` a removed one, and both set
/// a rename with its similarity `score`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub commit: String,
    pub score: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub tag: String,
}

/// Batch inserts.
impl Db {
    /// Run one prepared statement per item inside a single transaction.
    fn store_batch<T, F>(&mut self, sql: &str, items: &[T], mut bind: F) -> Result<usize>
    where
        F: FnMut(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
    {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(sql)?;
            for item in items {
                inserted += bind(&mut stmt, item)?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Store tag names.
    pub fn store_tags(&mut self, tags: &[&str]) -> Result<usize> {
        self.store_batch("INSERT INTO tags (name) VALUES (?1)", tags, |stmt, tag| {
            stmt.execute([tag])
        })
    }

    /// Store `(branch, tag)` pairs. The tag must already exist.
    pub fn store_branches(&mut self, branches: &[(&str, &str)]) -> Result<usize> {
        self.store_batch(
            "INSERT INTO branches (name, tag_id)
             VALUES (?1, (SELECT id FROM tags WHERE name = ?2))",
            branches,
            |stmt, (branch, tag)| stmt.execute([branch, tag]),
        )
    }

    /// Store commit hashes.
    pub fn store_commits(&mut self, commits: &[&str]) -> Result<usize> {
        self.store_batch(
            "INSERT INTO commits (name) VALUES (?1)",
            commits,
            |stmt, sha| stmt.execute([sha]),
        )
    }

    /// Store file paths. Paths already present are skipped.
    pub fn store_files(&mut self, files: &[&str]) -> Result<usize> {
        self.store_batch(
            "INSERT OR IGNORE INTO files (name) VALUES (?1)",
            files,
            |stmt, path| stmt.execute([path]),
        )
    }

    /// Store changes, resolving commit, file and tag names to ids.
    pub fn store_changes(&mut self, changes: &[Change]) -> Result<usize> {
        self.store_batch(
            "INSERT INTO changes (commit_id, score, from_id, to_id, tag_id) VALUES (
                (SELECT id FROM commits WHERE name = ?1),
                ?2,
                (SELECT id FROM files WHERE name = ?3),
                (SELECT id FROM files WHERE name = ?4),
                (SELECT id FROM tags WHERE name = ?5)
            )",
            changes,
            |stmt, c| {
                stmt.execute(rusqlite::params![c.commit, c.score, c.from, c.to, c.tag])
            },
        )
    }

    /// Store `(commit, branch)` backports.
    ///
    /// Commits unknown to the database are skipped; returns the number stored.
    pub fn store_backports(&mut self, backports: &[(&str, &str)]) -> Result<usize> {
        let known = self.commit_names()?;
        let backports: Vec<(&str, &str)> = backports
            .iter()
            .copied()
            .filter(|(sha, _)| known.contains(*sha))
            .collect();

        self.store_batch(
            "INSERT INTO backports (commit_id, branch_id) VALUES (
                (SELECT id FROM commits WHERE name = ?1),
                (SELECT id FROM branches WHERE name = ?2)
            )",
            &backports,
            |stmt, (sha, branch)| stmt.execute([sha, branch]),
        )
    }

    /// All stored commit hashes.
    pub fn commit_names(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM commits")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(names)
    }
}

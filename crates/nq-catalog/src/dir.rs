//! Directory of SQLite databases laid out as `<root>/<db>/<db>.sqlite`.

use crate::CatalogError;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DatabaseDir {
    root: PathBuf,
}

impl DatabaseDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a database name to its file. Names containing path
    /// separators never resolve.
    pub fn path_for(&self, db: &str) -> Option<PathBuf> {
        if db.is_empty() || db.contains(&['/', '\\'][..]) || db.contains("..") {
            return None;
        }

        let file_name = format!("{db}.sqlite");
        let direct = self.root.join(db).join(&file_name);
        if direct.is_file() {
            return Some(direct);
        }

        // Fall back to `<root>/*/<db>.sqlite`.
        std::fs::read_dir(&self.root)
            .ok()?
            .filter_map(Result::ok)
            .map(|entry| entry.path().join(&file_name))
            .find(|candidate| candidate.is_file())
    }

    /// Sorted names of every `<root>/*/*.sqlite` file.
    pub fn list(&self) -> Result<Vec<String>, CatalogError> {
        if !self.root.is_dir() {
            return Err(CatalogError::Io(format!(
                "database directory not found: {}",
                self.root.display()
            )));
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let sub = entry?.path();
            if !sub.is_dir() {
                continue;
            }
            for file in std::fs::read_dir(&sub)? {
                let path = file?.path();
                if path.extension().is_some_and(|ext| ext == "sqlite") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Open a database read-only.
    pub fn open(&self, db: &str) -> Result<Connection, CatalogError> {
        let path = self
            .path_for(db)
            .ok_or_else(|| CatalogError::DatabaseNotFound(db.to_string()))?;
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// `CREATE TABLE` / `CREATE INDEX` statements for one database,
    /// tables first, separated by blank lines.
    pub fn detailed_schema(&self, db: &str) -> Result<String, CatalogError> {
        let conn = self.open(db)?;
        let mut stmt = conn.prepare(
            "SELECT sql FROM sqlite_master
             WHERE type IN ('table', 'index') AND sql IS NOT NULL
             ORDER BY type DESC, name",
        )?;
        let statements = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(statements.join("\n\n"))
    }

    /// User table names, sorted.
    pub fn tables(&self, db: &str) -> Result<Vec<String>, CatalogError> {
        let conn = self.open(db)?;
        table_names(&conn)
    }
}

pub(crate) fn table_names(conn: &Connection) -> Result<Vec<String>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

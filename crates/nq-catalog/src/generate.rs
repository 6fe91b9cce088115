//! Build the M-Schema catalog by introspecting every SQLite database.

use crate::dir::{table_names, DatabaseDir};
use crate::CatalogError;
use nq_core::schema::{Catalog, DatabaseMeta, FieldMeta, TableMeta};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::path::Path;

/// Introspect every database under `database_dir`. Databases that fail are
/// logged and skipped.
pub fn generate_catalog(
    database_dir: &DatabaseDir,
    sample_values: usize,
) -> Result<Catalog, CatalogError> {
    let mut catalog = Catalog::default();
    for db in database_dir.list()? {
        match database_dir
            .open(&db)
            .and_then(|conn| describe_database(&conn, &db, sample_values))
        {
            Ok(meta) => {
                tracing::info!(db = %db, tables = meta.tables.len(), "Generated schema");
                catalog.databases.insert(db, meta);
            }
            Err(e) => tracing::error!(db = %db, error = %e, "Failed to describe database"),
        }
    }
    Ok(catalog)
}

/// Save the catalog as pretty JSON.
pub fn write_catalog(catalog: &Catalog, path: &Path) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(catalog).map_err(|e| CatalogError::Parse(e.to_string()))?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), databases = catalog.len(), "Wrote catalog");
    Ok(())
}

pub(crate) fn describe_database(
    conn: &Connection,
    db_id: &str,
    sample_values: usize,
) -> Result<DatabaseMeta, CatalogError> {
    let mut meta = DatabaseMeta {
        db_id: db_id.to_string(),
        ..Default::default()
    };

    for table in table_names(conn)? {
        let mut fields = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(&table)))?;
        let columns = stmt
            .query_map([], |row| {
                // (cid, name, type, notnull, dflt_value, pk)
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (name, data_type, notnull, default, pk) in columns {
            let examples = if sample_values == 0 {
                Vec::new()
            } else {
                sample_column(conn, &table, &name, sample_values)
            };
            let data_type = data_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "TEXT".to_string());
            fields.insert(
                name,
                FieldMeta {
                    data_type,
                    primary_key: pk > 0,
                    nullable: notnull == 0,
                    default,
                    comment: String::new(),
                    examples,
                },
            );
        }

        meta.foreign_keys.extend(foreign_keys(conn, &table)?);
        meta.tables.insert(
            table,
            TableMeta {
                fields,
                comment: String::new(),
            },
        );
    }
    Ok(meta)
}

fn foreign_keys(conn: &Connection, table: &str) -> Result<Vec<[String; 4]>, CatalogError> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
    let keys = stmt
        .query_map([], |row| {
            // (id, seq, table, from, to, on_update, on_delete, match)
            Ok([
                table.to_string(),
                row.get::<_, String>(3)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            ])
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

/// Up to `limit` distinct non-blank values. Failures yield no samples.
fn sample_column(conn: &Connection, table: &str, column: &str, limit: usize) -> Vec<String> {
    let sql = format!(
        "SELECT DISTINCT {} FROM {} LIMIT ?1",
        quote_ident(column),
        quote_ident(table)
    );
    let result = conn.prepare(&sql).and_then(|mut stmt| {
        let values = stmt
            .query_map(params![limit as i64], |row| Ok(value_to_sample(row.get_ref(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    });

    match result {
        Ok(values) => values
            .into_iter()
            .flatten()
            .filter(|v| !v.trim().is_empty())
            .take(limit)
            .collect(),
        Err(e) => {
            tracing::warn!(table, column, error = %e, "Failed to sample column");
            Vec::new()
        }
    }
}

fn value_to_sample(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_db, scratch_dir, CONCERT_SINGER};

    #[test]
    fn generates_fields_keys_and_samples() {
        let root = scratch_dir("gen");
        create_db(&root, "concert_singer", CONCERT_SINGER);

        let catalog = generate_catalog(&DatabaseDir::new(&root), 2).unwrap();
        let db = catalog.database("concert_singer").unwrap();
        assert_eq!(db.db_id, "concert_singer");
        assert_eq!(db.tables.len(), 3);

        let stadium = &db.tables["stadium"].fields;
        assert!(stadium["Stadium_ID"].primary_key);
        assert!(!stadium["Name"].nullable);
        assert_eq!(stadium["Capacity"].default.as_deref(), Some("0"));
        assert_eq!(stadium["Capacity"].data_type, "INTEGER");

        let singer = &db.tables["singer"].fields;
        assert_eq!(singer["Country"].examples.len(), 2);

        assert_eq!(
            db.foreign_keys,
            vec![[
                "concert".to_string(),
                "Stadium_ID".to_string(),
                "stadium".to_string(),
                "Stadium_ID".to_string(),
            ]]
        );
    }

    #[test]
    fn zero_samples_skips_sampling() {
        let root = scratch_dir("nosample");
        create_db(&root, "concert_singer", CONCERT_SINGER);
        let catalog = generate_catalog(&DatabaseDir::new(&root), 0).unwrap();
        let singer = &catalog.database("concert_singer").unwrap().tables["singer"];
        assert!(singer.fields.values().all(|f| f.examples.is_empty()));
    }

    #[test]
    fn write_then_read_back() {
        let root = scratch_dir("write");
        create_db(&root, "concert_singer", CONCERT_SINGER);
        let catalog = generate_catalog(&DatabaseDir::new(&root), 3).unwrap();

        let path = root.join("out").join("m_schema.json");
        write_catalog(&catalog, &path).unwrap();
        let back: Catalog =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn quoting_escapes_double_quotes() {
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}

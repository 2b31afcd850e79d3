use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// One row per storage key. Values are serialized JSON documents; the
/// consolidated document lives under a single key, legacy collections under
/// their historical key names. An UPSERT of one row is the whole-document
/// write, so callers never observe a partial save.
pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("classroom.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS storage(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    Ok(conn)
}

pub fn storage_get(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
    let v = conn
        .query_row("SELECT value FROM storage WHERE key = ?", [key], |r| {
            r.get::<_, String>(0)
        })
        .optional()?;
    Ok(v)
}

pub fn storage_set(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO storage(key, value, updated_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           updated_at = excluded.updated_at",
        (key, value),
    )?;
    Ok(())
}

pub fn storage_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    storage_set(conn, key, &serde_json::to_string(value)?)
}

/// Corrupt JSON reads back as None; most readers treat that as an absent key.
pub fn storage_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let Some(raw) = storage_get(conn, key)? else {
        return Ok(None);
    };
    Ok(serde_json::from_str(&raw).ok())
}

pub fn storage_remove(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let changed = conn.execute("DELETE FROM storage WHERE key = ?", [key])?;
    Ok(changed > 0)
}

pub fn storage_keys(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT key FROM storage ORDER BY key")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

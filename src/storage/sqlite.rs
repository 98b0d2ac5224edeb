//! SQLite storage backend

use super::traits::{FactStore, OpenStore, StorageError, StorageResult};
use crate::graph::Fact;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const INSERT_FACT: &str = "INSERT INTO facts (subject, predicate, object) VALUES (?1, ?2, ?3)";

/// SQLite-backed fact store
///
/// Uses a single `facts` table; the integer row id preserves insertion order.
/// There is no uniqueness constraint, so repeated facts become parallel edges.
/// Thread-safe via internal mutex on the connection.
pub struct SqliteFactStore {
    conn: Mutex<Connection>,
}

impl SqliteFactStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS facts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                predicate TEXT NOT NULL,
                object TEXT NOT NULL
            );

            -- Traversal lookups go through subject or object
            CREATE INDEX IF NOT EXISTS idx_facts_subject
                ON facts(subject, predicate);
            CREATE INDEX IF NOT EXISTS idx_facts_object
                ON facts(object, predicate);

            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Ok(())
    }

    fn has_schema(conn: &Connection) -> StorageResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'facts'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select_facts(
        &self,
        column: &str,
        node: &str,
        predicate: Option<&str>,
    ) -> StorageResult<Vec<Fact>> {
        let conn = self.conn();

        let mut sql = format!(
            "SELECT subject, predicate, object FROM facts WHERE {} = ?1",
            column
        );
        if predicate.is_some() {
            sql.push_str(" AND predicate = ?2");
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare_cached(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok(Fact {
                subject: row.get(0)?,
                predicate: row.get(1)?,
                object: row.get(2)?,
            })
        };

        let facts = match predicate {
            Some(pred) => stmt
                .query_map(params![node, pred], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![node], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(facts)
    }
}

impl OpenStore for SqliteFactStore {
    fn create(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let init_error = |reason: String| StorageError::Initialization {
            path: path.display().to_string(),
            reason,
        };

        if path.is_dir() {
            return Err(init_error("path is a directory".to_string()));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| init_error(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| init_error(e.to_string()))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let open_error = |reason: &str| StorageError::OpenFailed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        if !path.is_file() {
            return Err(open_error("no store found (run init first)"));
        }

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| open_error(&e.to_string()))?;

        if !Self::has_schema(&conn)? {
            return Err(open_error("file is not an initialized fact store"));
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl FactStore for SqliteFactStore {
    fn insert(&self, fact: &Fact) -> StorageResult<()> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(INSERT_FACT)?;
        stmt.execute(params![fact.subject, fact.predicate, fact.object])?;
        Ok(())
    }

    fn insert_batch(&self, facts: &[Fact]) -> StorageResult<usize> {
        if facts.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_FACT)?;
            for fact in facts {
                stmt.execute(params![fact.subject, fact.predicate, fact.object])?;
            }
        }
        tx.commit()?;

        Ok(facts.len())
    }

    fn nodes(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn();

        // Subjects sort before objects of the same fact
        let mut stmt = conn.prepare_cached(
            r#"
            SELECT node FROM (
                SELECT subject AS node, id * 2 AS seq FROM facts
                UNION ALL
                SELECT object AS node, id * 2 + 1 AS seq FROM facts
            )
            GROUP BY node
            ORDER BY MIN(seq)
            "#,
        )?;

        let nodes = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(nodes)
    }

    fn outgoing(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
        self.select_facts("subject", node, predicate)
    }

    fn incoming(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
        self.select_facts("object", node, predicate)
    }

    fn fact_count(&self) -> StorageResult<usize> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM facts", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteFactStore {
        SqliteFactStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_count() {
        let store = create_test_store();
        store.insert(&Fact::new("main", "has-var", "argc")).unwrap();
        assert_eq!(store.fact_count().unwrap(), 1);
    }

    #[test]
    fn test_duplicates_are_parallel_edges() {
        let store = create_test_store();
        let fact = Fact::new("a", "calls", "b");
        store.insert(&fact).unwrap();
        store.insert(&fact).unwrap();

        assert_eq!(store.fact_count().unwrap(), 2);
        assert_eq!(store.outgoing("a", Some("calls")).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_batch() {
        let store = create_test_store();
        let facts: Vec<Fact> = (0..50)
            .map(|i| Fact::new("file.c", "has-line", format!("line-{}", i)))
            .collect();

        assert_eq!(store.insert_batch(&facts).unwrap(), 50);
        assert_eq!(store.insert_batch(&[]).unwrap(), 0);
        assert_eq!(store.fact_count().unwrap(), 50);
    }

    #[test]
    fn test_outgoing_and_incoming_preserve_order() {
        let store = create_test_store();
        store
            .insert_batch(&[
                Fact::new("main", "has-var", "x"),
                Fact::new("main", "has-param", "argc"),
                Fact::new("main", "has-var", "y"),
                Fact::new("helper", "has-var", "x"),
            ])
            .unwrap();

        let vars: Vec<String> = store
            .outgoing("main", Some("has-var"))
            .unwrap()
            .into_iter()
            .map(|f| f.object)
            .collect();
        assert_eq!(vars, vec!["x", "y"]);

        assert_eq!(store.outgoing("main", None).unwrap().len(), 3);

        let owners: Vec<String> = store
            .incoming("x", None)
            .unwrap()
            .into_iter()
            .map(|f| f.subject)
            .collect();
        assert_eq!(owners, vec!["main", "helper"]);
    }

    #[test]
    fn test_nodes_first_seen_order() {
        let store = create_test_store();
        store
            .insert_batch(&[
                Fact::new("b", "p", "a"),
                Fact::new("a", "p", "c"),
                Fact::new("c", "p", "b"),
            ])
            .unwrap();

        assert_eq!(store.nodes().unwrap(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pbg.db");

        {
            let store = SqliteFactStore::create(&path).unwrap();
            store.insert(&Fact::new("a", "b", "c")).unwrap();
        }

        let reopened = SqliteFactStore::open(&path).unwrap();
        assert_eq!(reopened.fact_count().unwrap(), 1);
    }

    #[test]
    fn test_open_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteFactStore::open(dir.path().join("absent.db"))
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::OpenFailed { .. }));
    }

    #[test]
    fn test_create_on_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteFactStore::create(dir.path()).err().unwrap();
        assert!(matches!(err, StorageError::Initialization { .. }));
    }
}

use crate::error::LangResult;
use crate::i18n::LanguageId;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub type ObjectId = i64;
pub type GroupId = i64;

/// One row of the `translations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRow {
    pub group_id: GroupId,
    pub language_id: LanguageId,
    pub object_type: String,
    pub object_id: ObjectId,
}

impl TranslationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            group_id: row.get(0)?,
            language_id: row.get(1)?,
            object_type: row.get(2)?,
            object_id: row.get(3)?,
        })
    }
}

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and make sure every table exists
    pub fn open(database_path: &str) -> LangResult<Self> {
        let conn = Connection::open(database_path)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, used by tests and one-shot tools
    pub fn open_in_memory() -> LangResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> LangResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS options (
                name TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS translations (
                group_id INTEGER NOT NULL,
                language_id INTEGER NOT NULL,
                object_type TEXT NOT NULL DEFAULT 'post',
                object_id INTEGER NOT NULL,
                UNIQUE (object_type, object_id),
                UNIQUE (group_id, language_id)
            );
            CREATE INDEX IF NOT EXISTS translations_group_id ON translations (group_id);
            CREATE INDEX IF NOT EXISTS translations_object_id ON translations (object_id);

            CREATE TABLE IF NOT EXISTS localizations (
                language_id INTEGER NOT NULL,
                object_id INTEGER NOT NULL,
                field_key TEXT NOT NULL,
                localized_value TEXT NOT NULL,
                UNIQUE (language_id, object_id, field_key)
            );",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock leaves SQLite itself consistent
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run read-only or single-statement work against the connection
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> LangResult<T>,
    ) -> LangResult<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction; it is committed only if `f` succeeds
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> LangResult<T>,
    ) -> LangResult<T> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ==================== Options ====================

    pub fn get_option(&self, name: &str) -> LangResult<Option<String>> {
        self.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM options WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn set_option(&self, name: &str, value: &str) -> LangResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO options (name, value) VALUES (?1, ?2)
                 ON CONFLICT (name) DO UPDATE SET value = excluded.value",
                params![name, value],
            )?;
            Ok(())
        })
    }

    // ==================== Localized field values ====================

    pub fn get_localized_value(
        &self,
        language_id: LanguageId,
        object_id: ObjectId,
        field_key: &str,
    ) -> LangResult<Option<String>> {
        self.with_connection(|conn| {
            Ok(conn
                .query_row(
                    "SELECT localized_value FROM localizations
                     WHERE language_id = ?1 AND object_id = ?2 AND field_key = ?3",
                    params![language_id, object_id, field_key],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn set_localized_value(
        &self,
        language_id: LanguageId,
        object_id: ObjectId,
        field_key: &str,
        value: &str,
    ) -> LangResult<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO localizations (language_id, object_id, field_key, localized_value)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (language_id, object_id, field_key)
                 DO UPDATE SET localized_value = excluded.localized_value",
                params![language_id, object_id, field_key, value],
            )?;
            Ok(())
        })
    }

    pub fn delete_localized_value(
        &self,
        language_id: LanguageId,
        object_id: ObjectId,
        field_key: &str,
    ) -> LangResult<bool> {
        self.with_connection(|conn| {
            let rows = conn.execute(
                "DELETE FROM localizations
                 WHERE language_id = ?1 AND object_id = ?2 AND field_key = ?3",
                params![language_id, object_id, field_key],
            )?;
            Ok(rows > 0)
        })
    }

    pub fn delete_localized_values_for_language(&self, language_id: LanguageId) -> LangResult<usize> {
        self.with_connection(|conn| {
            Ok(conn.execute(
                "DELETE FROM localizations WHERE language_id = ?1",
                params![language_id],
            )?)
        })
    }
}

/// Statements on the `translations` table.
///
/// They take a bare connection so that callers can compose several of them inside
/// one [`Database::transaction`].
pub mod translations {
    use super::*;

    const COLUMNS: &str = "group_id, language_id, object_type, object_id";

    pub fn find_by_object(
        conn: &Connection,
        object_type: &str,
        object_id: ObjectId,
    ) -> LangResult<Option<TranslationRow>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM translations WHERE object_type = ?1 AND object_id = ?2"
                ),
                params![object_type, object_id],
                TranslationRow::from_row,
            )
            .optional()?)
    }

    pub fn find_by_group(conn: &Connection, group_id: GroupId) -> LangResult<Vec<TranslationRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM translations WHERE group_id = ?1 ORDER BY language_id"
        ))?;
        let rows = stmt
            .query_map(params![group_id], TranslationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn find_in_slot(
        conn: &Connection,
        group_id: GroupId,
        language_id: LanguageId,
    ) -> LangResult<Option<TranslationRow>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM translations WHERE group_id = ?1 AND language_id = ?2"
                ),
                params![group_id, language_id],
                TranslationRow::from_row,
            )
            .optional()?)
    }

    pub fn find_by_language(
        conn: &Connection,
        language_id: LanguageId,
    ) -> LangResult<Vec<TranslationRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM translations WHERE language_id = ?1"
        ))?;
        let rows = stmt
            .query_map(params![language_id], TranslationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// `MAX(group_id) + 1`, starting at 1 on an empty table
    pub fn next_group_id(conn: &Connection) -> LangResult<GroupId> {
        let max: Option<GroupId> =
            conn.query_row("SELECT MAX(group_id) FROM translations", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Place an object into a slot, inserting its row or moving the existing one
    pub fn upsert(conn: &Connection, row: &TranslationRow) -> LangResult<()> {
        conn.execute(
            "INSERT INTO translations (group_id, language_id, object_type, object_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (object_type, object_id)
             DO UPDATE SET group_id = excluded.group_id, language_id = excluded.language_id",
            params![row.group_id, row.language_id, row.object_type, row.object_id],
        )?;
        Ok(())
    }

    pub fn delete_object(conn: &Connection, object_type: &str, object_id: ObjectId) -> LangResult<usize> {
        Ok(conn.execute(
            "DELETE FROM translations WHERE object_type = ?1 AND object_id = ?2",
            params![object_type, object_id],
        )?)
    }

    pub fn delete_language(conn: &Connection, language_id: LanguageId) -> LangResult<usize> {
        Ok(conn.execute(
            "DELETE FROM translations WHERE language_id = ?1",
            params![language_id],
        )?)
    }

    pub fn count_by_language(
        conn: &Connection,
        object_type: &str,
    ) -> LangResult<BTreeMap<LanguageId, usize>> {
        let mut stmt = conn.prepare(
            "SELECT language_id, COUNT(*) FROM translations
             WHERE object_type = ?1 GROUP BY language_id",
        )?;
        let counts = stmt
            .query_map(params![object_type], |row| {
                Ok((row.get::<_, LanguageId>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    /// Every row, ordered by group then language. Used by integrity checks.
    pub fn all(conn: &Connection) -> LangResult<Vec<TranslationRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM translations ORDER BY group_id, language_id"
        ))?;
        let rows = stmt
            .query_map([], TranslationRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

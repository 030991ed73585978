use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use parking_lot::Mutex;
use chrono::Utc;
use tracing::{info, debug, error, warn};

use crate::error::AppError;
use crate::models::{ImportSummary, Library, NewWord, WordEntry, MASTER_LIBRARY_NAME};

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS libraries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        is_master INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        word TEXT NOT NULL UNIQUE,
        meaning TEXT NOT NULL,
        pronunciation TEXT,
        example TEXT,
        difficulty TEXT NOT NULL DEFAULT 'medium',
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS library_words (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        library_id INTEGER NOT NULL REFERENCES libraries(id) ON DELETE CASCADE,
        word_id INTEGER NOT NULL REFERENCES words(id),
        is_learned INTEGER NOT NULL DEFAULT 0,
        learned_at TEXT,
        added_at TEXT NOT NULL,
        UNIQUE(library_id, word_id)
    );
    CREATE INDEX IF NOT EXISTS idx_library_words_library ON library_words(library_id);
";

const LIBRARY_SELECT: &str = "
    SELECT l.id, l.name, l.description, l.is_master, l.created_at,
           COUNT(lw.id), COALESCE(SUM(lw.is_learned), 0)
    FROM libraries l
    LEFT JOIN library_words lw ON lw.library_id = l.id";

const WORD_SELECT: &str = "
    SELECT w.id, w.word, w.meaning, w.pronunciation, w.example, w.difficulty,
           lw.is_learned, lw.learned_at, lw.added_at
    FROM library_words lw
    JOIN words w ON w.id = lw.word_id";

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn clean_library_fields<'a>(name: &'a str, description: Option<&'a str>) -> Result<(&'a str, Option<&'a str>), AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Library name is required".to_string()));
    }
    Ok((name, description.map(str::trim).filter(|d| !d.is_empty())))
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn library_from_row(row: &Row<'_>) -> rusqlite::Result<Library> {
    let word_count: i64 = row.get(5)?;
    let learned_count: i64 = row.get(6)?;
    Ok(Library {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_master: row.get(3)?,
        created_at: row.get(4)?,
        word_count,
        learned_count,
        unlearned_count: word_count - learned_count,
    })
}

fn word_from_row(row: &Row<'_>) -> rusqlite::Result<WordEntry> {
    Ok(WordEntry {
        word_id: row.get(0)?,
        word: row.get(1)?,
        meaning: row.get(2)?,
        pronunciation: row.get(3)?,
        example: row.get(4)?,
        difficulty: row.get(5)?,
        is_learned: row.get(6)?,
        learned_at: row.get(7)?,
        added_at: row.get(8)?,
    })
}

/// SQLite-backed libraries and words. One master library holds every word
/// imported into any other library.
pub struct WordStore {
    conn: Mutex<Connection>,
}

impl WordStore {
    pub fn open(path: Option<&str>) -> Result<Self, AppError> {
        let conn = match path {
            Some(path) => {
                info!("Opening word store at {}", path);
                Connection::open(path)
            }
            None => {
                info!("Opening in-memory word store");
                Connection::open_in_memory()
            }
        }
        .map_err(|e| {
            error!("Failed to open database: {}", e);
            AppError::DatabaseError(e.to_string())
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL).map_err(|e| {
            error!("Failed to create schema: {}", e);
            AppError::DatabaseError(e.to_string())
        })?;

        let master: Option<i64> = conn
            .query_row("SELECT id FROM libraries WHERE is_master = 1", [], |row| row.get(0))
            .optional()?;
        if master.is_none() {
            conn.execute(
                "INSERT INTO libraries (name, description, is_master, created_at) VALUES (?1, ?2, 1, ?3)",
                params![MASTER_LIBRARY_NAME, "Every word from all of your libraries", now()],
            )?;
            debug!("Created master library");
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::open(None)
    }

    pub fn create_library(&self, name: &str, description: Option<&str>) -> Result<Library, AppError> {
        let (name, description) = clean_library_fields(name, description)?;

        let id = {
            let conn = self.conn.lock();
            Self::ensure_unique_name(&conn, name, None)?;
            conn.execute(
                "INSERT INTO libraries (name, description, is_master, created_at) VALUES (?1, ?2, 0, ?3)",
                params![name, description, now()],
            )?;
            conn.last_insert_rowid()
        };
        info!("Created library {} ({})", id, name);
        self.get_library(id)
    }

    /// Renames a library and replaces its description. The master library
    /// cannot be modified.
    pub fn update_library(&self, library_id: i64, name: &str, description: Option<&str>) -> Result<Library, AppError> {
        let (name, description) = clean_library_fields(name, description)?;

        {
            let conn = self.conn.lock();
            let library = Self::find_library(&conn, library_id)?
                .ok_or_else(|| AppError::NotFound(format!("Library {} not found", library_id)))?;
            if library.is_master {
                return Err(AppError::InvalidInput("Cannot modify master library".to_string()));
            }
            Self::ensure_unique_name(&conn, name, Some(library_id))?;
            conn.execute(
                "UPDATE libraries SET name = ?1, description = ?2 WHERE id = ?3",
                params![name, description, library_id],
            )?;
        }
        info!("Updated library {} ({})", library_id, name);
        self.get_library(library_id)
    }

    /// Deletes a library and its word links. Words stay in the master library.
    pub fn delete_library(&self, library_id: i64) -> Result<(), AppError> {
        let conn = self.conn.lock();
        let library = Self::find_library(&conn, library_id)?
            .ok_or_else(|| AppError::NotFound(format!("Library {} not found", library_id)))?;
        if library.is_master {
            warn!("Refused to delete master library {}", library_id);
            return Err(AppError::InvalidInput("Cannot delete master library".to_string()));
        }

        conn.execute("DELETE FROM libraries WHERE id = ?1", params![library_id])?;
        info!("Deleted library {} ({}) with {} word links", library_id, library.name, library.word_count);
        Ok(())
    }

    fn ensure_unique_name(conn: &Connection, name: &str, except: Option<i64>) -> Result<(), AppError> {
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM libraries WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
                params![name, except],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(_) => Err(AppError::Conflict("Library with this name already exists".to_string())),
            None => Ok(()),
        }
    }

    pub fn list_libraries(&self) -> Result<Vec<Library>, AppError> {
        let conn = self.conn.lock();
        let sql = format!("{} GROUP BY l.id ORDER BY l.is_master DESC, l.id", LIBRARY_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let libraries = stmt.query_map([], library_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(libraries)
    }

    pub fn get_library(&self, library_id: i64) -> Result<Library, AppError> {
        let conn = self.conn.lock();
        Self::find_library(&conn, library_id)?
            .ok_or_else(|| AppError::NotFound(format!("Library {} not found", library_id)))
    }

    fn find_library(conn: &Connection, library_id: i64) -> Result<Option<Library>, AppError> {
        let sql = format!("{} WHERE l.id = ?1 GROUP BY l.id", LIBRARY_SELECT);
        Ok(conn.query_row(&sql, params![library_id], library_from_row).optional()?)
    }

    /// Words in a library ordered by text. `search` matches case-insensitively
    /// anywhere in the word, meaning or example.
    pub fn list_words(&self, library_id: i64, learned: Option<bool>, search: Option<&str>) -> Result<Vec<WordEntry>, AppError> {
        let conn = self.conn.lock();
        if Self::find_library(&conn, library_id)?.is_none() {
            return Err(AppError::NotFound(format!("Library {} not found", library_id)));
        }

        let sql = format!(
            "{} WHERE lw.library_id = ?1 AND (?2 IS NULL OR lw.is_learned = ?2)
                AND (?3 IS NULL
                     OR w.word LIKE ?3 ESCAPE '\\'
                     OR w.meaning LIKE ?3 ESCAPE '\\'
                     OR w.example LIKE ?3 ESCAPE '\\')
             ORDER BY w.word",
            WORD_SELECT
        );
        let pattern = search.map(str::trim).filter(|s| !s.is_empty()).map(like_pattern);
        let mut stmt = conn.prepare(&sql)?;
        let words = stmt.query_map(params![library_id, learned, pattern], word_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Library {} returned {} words", library_id, words.len());
        Ok(words)
    }

    pub fn set_learned(&self, library_id: i64, word_id: i64, learned: bool) -> Result<WordEntry, AppError> {
        let conn = self.conn.lock();
        let learned_at = if learned { Some(now()) } else { None };
        let updated = conn.execute(
            "UPDATE library_words SET is_learned = ?1, learned_at = ?2 WHERE library_id = ?3 AND word_id = ?4",
            params![learned, learned_at, library_id, word_id],
        )?;
        if updated == 0 {
            warn!("Word {} is not in library {}", word_id, library_id);
            return Err(AppError::NotFound(format!(
                "Word {} not found in library {}", word_id, library_id
            )));
        }

        let sql = format!("{} WHERE lw.library_id = ?1 AND lw.word_id = ?2", WORD_SELECT);
        Ok(conn.query_row(&sql, params![library_id, word_id], word_from_row)?)
    }

    /// Commits parsed rows to a library in one transaction. Words are shared
    /// across libraries by their text; a word already in the target library
    /// is skipped.
    pub fn import_words(&self, library_id: i64, words: &[NewWord]) -> Result<ImportSummary, AppError> {
        let mut conn = self.conn.lock();
        let library = Self::find_library(&conn, library_id)?
            .ok_or_else(|| AppError::NotFound(format!("Library {} not found", library_id)))?;

        let tx = conn.transaction()?;
        let master_id: i64 = tx.query_row(
            "SELECT id FROM libraries WHERE is_master = 1", [], |row| row.get(0),
        )?;

        let mut summary = ImportSummary::default();
        for word in words {
            let existing: Option<i64> = tx
                .query_row("SELECT id FROM words WHERE word = ?1", params![word.word], |row| row.get(0))
                .optional()?;

            let word_id = match existing {
                Some(id) if Self::is_linked(&tx, library_id, id)? => {
                    debug!("Row {}: '{}' is already in library {}", word.row_number, word.word, library_id);
                    summary.words_skipped += 1;
                    continue;
                }
                Some(id) => id,
                None => {
                    tx.execute(
                        "INSERT INTO words (word, meaning, pronunciation, example, difficulty, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![word.word, word.meaning, word.pronunciation, word.example, word.difficulty, now()],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            Self::link(&tx, library_id, word_id)?;
            if !library.is_master {
                Self::link(&tx, master_id, word_id)?;
            }
            summary.words_added += 1;
        }

        tx.commit().map_err(|e| {
            error!("Failed to commit import into library {}: {}", library_id, e);
            AppError::DatabaseError(e.to_string())
        })?;

        info!(
            "Imported into library {}: {} added, {} skipped",
            library_id, summary.words_added, summary.words_skipped
        );
        Ok(summary)
    }

    fn is_linked(tx: &Transaction<'_>, library_id: i64, word_id: i64) -> Result<bool, AppError> {
        let found: Option<i64> = tx
            .query_row(
                "SELECT id FROM library_words WHERE library_id = ?1 AND word_id = ?2",
                params![library_id, word_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn link(tx: &Transaction<'_>, library_id: i64, word_id: i64) -> Result<(), AppError> {
        tx.execute(
            "INSERT OR IGNORE INTO library_words (library_id, word_id, is_learned, added_at) VALUES (?1, ?2, 0, ?3)",
            params![library_id, word_id, now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_DIFFICULTY;

    fn new_word(row_number: usize, word: &str, meaning: &str) -> NewWord {
        NewWord {
            row_number,
            word: word.to_string(),
            meaning: meaning.to_string(),
            pronunciation: None,
            example: None,
            difficulty: DEFAULT_DIFFICULTY.to_string(),
        }
    }

    fn master(store: &WordStore) -> Library {
        store.list_libraries().unwrap().into_iter().find(|l| l.is_master).unwrap()
    }

    #[test]
    fn test_open_creates_single_master_library() {
        let store = WordStore::open_in_memory().unwrap();
        let libraries = store.list_libraries().unwrap();
        assert_eq!(libraries.len(), 1);
        assert!(libraries[0].is_master);
        assert_eq!(libraries[0].name, MASTER_LIBRARY_NAME);
    }

    #[test]
    fn test_create_library_requires_name() {
        let store = WordStore::open_in_memory().unwrap();
        assert!(matches!(store.create_library("   ", None), Err(AppError::InvalidInput(_))));
        let library = store.create_library("  GRE  ", Some("")).unwrap();
        assert_eq!(library.name, "GRE");
        assert_eq!(library.description, None);
        assert_eq!(library.word_count, 0);
    }

    #[test]
    fn test_get_missing_library() {
        let store = WordStore::open_in_memory().unwrap();
        assert!(matches!(store.get_library(999), Err(AppError::NotFound(_))));
        assert!(matches!(store.list_words(999, None, None), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_import_links_words_to_master() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        let summary = store.import_words(library.id, &[
            new_word(2, "abate", "to lessen"),
            new_word(3, "laconic", "using few words"),
        ]).unwrap();

        assert_eq!(summary.words_added, 2);
        assert_eq!(summary.words_skipped, 0);
        assert_eq!(store.get_library(library.id).unwrap().word_count, 2);
        assert_eq!(master(&store).word_count, 2);
    }

    #[test]
    fn test_reimport_skips_words_already_in_library() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        store.import_words(library.id, &[new_word(2, "abate", "to lessen")]).unwrap();
        let summary = store.import_words(library.id, &[
            new_word(2, "abate", "to reduce"),
            new_word(3, "abate", "again"),
        ]).unwrap();

        assert_eq!(summary.words_added, 0);
        assert_eq!(summary.words_skipped, 2);
        let words = store.list_words(library.id, None, None).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].meaning, "to lessen");
    }

    #[test]
    fn test_existing_word_is_shared_between_libraries() {
        let store = WordStore::open_in_memory().unwrap();
        let first = store.create_library("First", None).unwrap();
        let second = store.create_library("Second", None).unwrap();
        store.import_words(first.id, &[new_word(2, "abate", "to lessen")]).unwrap();
        let summary = store.import_words(second.id, &[new_word(2, "abate", "ignored")]).unwrap();

        assert_eq!(summary.words_added, 1);
        let first_words = store.list_words(first.id, None, None).unwrap();
        let second_words = store.list_words(second.id, None, None).unwrap();
        assert_eq!(first_words[0].word_id, second_words[0].word_id);
        assert_eq!(master(&store).word_count, 1);
    }

    #[test]
    fn test_import_into_master_directly() {
        let store = WordStore::open_in_memory().unwrap();
        let master_id = master(&store).id;
        let summary = store.import_words(master_id, &[new_word(2, "abate", "to lessen")]).unwrap();
        assert_eq!(summary.words_added, 1);
        assert_eq!(master(&store).word_count, 1);
    }

    #[test]
    fn test_set_learned_updates_counts_and_filters() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        store.import_words(library.id, &[
            new_word(2, "abate", "to lessen"),
            new_word(3, "laconic", "using few words"),
        ]).unwrap();
        let abate = store.list_words(library.id, None, None).unwrap()
            .into_iter().find(|w| w.word == "abate").unwrap();

        let entry = store.set_learned(library.id, abate.word_id, true).unwrap();
        assert!(entry.is_learned);
        assert!(entry.learned_at.is_some());

        let library = store.get_library(library.id).unwrap();
        assert_eq!(library.learned_count, 1);
        assert_eq!(library.unlearned_count, 1);

        let learned = store.list_words(library.id, Some(true), None).unwrap();
        assert_eq!(learned.len(), 1);
        assert_eq!(learned[0].word, "abate");
        let unlearned = store.list_words(library.id, Some(false), None).unwrap();
        assert_eq!(unlearned[0].word, "laconic");

        let entry = store.set_learned(library.id, abate.word_id, false).unwrap();
        assert!(!entry.is_learned);
        assert!(entry.learned_at.is_none());
    }

    #[test]
    fn test_set_learned_missing_word() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        assert!(matches!(store.set_learned(library.id, 42, true), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_create_library_rejects_duplicate_name() {
        let store = WordStore::open_in_memory().unwrap();
        store.create_library("GRE", None).unwrap();
        assert!(matches!(store.create_library(" GRE ", None), Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_update_library() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", Some("old")).unwrap();
        store.create_library("SAT", None).unwrap();

        let updated = store.update_library(library.id, "GRE Verbal", None).unwrap();
        assert_eq!(updated.name, "GRE Verbal");
        assert_eq!(updated.description, None);

        // keeping the same name is not a conflict
        assert!(store.update_library(library.id, "GRE Verbal", Some("kept")).is_ok());
        assert!(matches!(store.update_library(library.id, "SAT", None), Err(AppError::Conflict(_))));
        assert!(matches!(store.update_library(library.id, "  ", None), Err(AppError::InvalidInput(_))));
        assert!(matches!(store.update_library(999, "X", None), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_master_library_cannot_be_modified_or_deleted() {
        let store = WordStore::open_in_memory().unwrap();
        let master_id = master(&store).id;
        assert!(matches!(store.update_library(master_id, "Mine", None), Err(AppError::InvalidInput(_))));
        assert!(matches!(store.delete_library(master_id), Err(AppError::InvalidInput(_))));
        assert_eq!(master(&store).name, MASTER_LIBRARY_NAME);
    }

    #[test]
    fn test_delete_library_removes_links_but_keeps_master_words() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        store.import_words(library.id, &[
            new_word(2, "abate", "to lessen"),
            new_word(3, "laconic", "using few words"),
        ]).unwrap();

        store.delete_library(library.id).unwrap();

        assert!(matches!(store.get_library(library.id), Err(AppError::NotFound(_))));
        let links: i64 = store.conn.lock()
            .query_row("SELECT COUNT(*) FROM library_words WHERE library_id = ?1", params![library.id], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
        assert_eq!(master(&store).word_count, 2);
        assert!(matches!(store.delete_library(library.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_list_words_search() {
        let store = WordStore::open_in_memory().unwrap();
        let library = store.create_library("GRE", None).unwrap();
        let mut laconic = new_word(3, "laconic", "using few words");
        laconic.example = Some("His LACONIC reply, 100% terse".to_string());
        store.import_words(library.id, &[
            new_word(2, "abate", "to lessen"),
            laconic,
            new_word(4, "loquacious", "talkative"),
        ]).unwrap();

        let words = |search: &str| -> Vec<String> {
            store.list_words(library.id, None, Some(search)).unwrap()
                .into_iter().map(|w| w.word).collect()
        };

        assert_eq!(words("LESS"), vec!["abate"]);
        assert_eq!(words("terse"), vec!["laconic"]);
        assert_eq!(words("la"), vec!["laconic"]);
        assert_eq!(words("100%"), vec!["laconic"]);
        assert_eq!(words("_"), Vec::<String>::new());
        assert_eq!(words("  ").len(), 3);
        assert_eq!(store.list_words(library.id, Some(true), Some("abate")).unwrap().len(), 0);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("5%_x"), "%5\\%\\_x%");
    }
}

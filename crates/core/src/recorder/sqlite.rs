//! SQLite-backed result recorder.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{
    build_report, CollectionRecord, PersistenceError, ProfileRecord, ProfileRef, ProfileUpsert,
    RecorderStats, ReportRow, ResultRecorder,
};

const PROFILE_COLUMNS: &str = "id, natural_key, name, raw_proxy, profile_path, browser_type, browser_version, note, is_done, created_at, updated_at";

const COLLECTION_COLUMNS: &str = "id, profile_id, name, link, item_count, created_at, updated_at";

pub struct SqliteRecorder {
    conn: Mutex<Connection>,
}

impl SqliteRecorder {
    /// Opens (or creates) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory recorder (useful for testing).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PersistenceError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                natural_key TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                raw_proxy TEXT,
                profile_path TEXT,
                browser_type TEXT,
                browser_version TEXT,
                note TEXT,
                is_done INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS collections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_id INTEGER NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                link TEXT NOT NULL,
                item_count INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(profile_id, name)
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_is_done ON profiles(is_done);
            CREATE INDEX IF NOT EXISTS idx_collections_profile ON collections(profile_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|e| PersistenceError::Database(format!("connection lock poisoned: {}", e)))
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<ProfileRecord> {
        let created_at: String = row.get(9)?;
        let updated_at: String = row.get(10)?;
        Ok(ProfileRecord {
            id: row.get(0)?,
            natural_key: row.get(1)?,
            name: row.get(2)?,
            raw_proxy: row.get(3)?,
            profile_path: row.get(4)?,
            browser_type: row.get(5)?,
            browser_version: row.get(6)?,
            note: row.get(7)?,
            is_done: row.get(8)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn row_to_collection(row: &rusqlite::Row) -> rusqlite::Result<CollectionRecord> {
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(CollectionRecord {
            id: row.get(0)?,
            profile_id: row.get(1)?,
            name: row.get(2)?,
            link: row.get(3)?,
            item_count: row.get(4)?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
        })
    }

    fn collections_of(conn: &Connection, profile_id: i64) -> Result<Vec<CollectionRecord>, PersistenceError> {
        let sql = format!(
            "SELECT {} FROM collections WHERE profile_id = ? ORDER BY id",
            COLLECTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![profile_id], Self::row_to_collection)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl ResultRecorder for SqliteRecorder {
    fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<ProfileRef, PersistenceError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();

        let id: i64 = conn.query_row(
            r#"
            INSERT INTO profiles (natural_key, name, raw_proxy, profile_path, browser_type, browser_version, note, created_at, updated_at)
            VALUES (?1, COALESCE(?2, ?1), ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(natural_key) DO UPDATE SET
                name = COALESCE(?2, profiles.name),
                raw_proxy = COALESCE(?3, profiles.raw_proxy),
                profile_path = COALESCE(?4, profiles.profile_path),
                browser_type = COALESCE(?5, profiles.browser_type),
                browser_version = COALESCE(?6, profiles.browser_version),
                note = COALESCE(?7, profiles.note),
                updated_at = ?8
            RETURNING id
            "#,
            params![
                profile.natural_key,
                profile.name,
                profile.raw_proxy,
                profile.profile_path,
                profile.browser_type,
                profile.browser_version,
                profile.note,
                now,
            ],
            |row| row.get(0),
        )?;

        Ok(ProfileRef(id))
    }

    fn mark_done(&self, profile: ProfileRef) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE profiles SET is_done = 1, updated_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), profile.0],
        )?;
        if changed == 0 {
            return Err(PersistenceError::ProfileNotFound(profile.0));
        }
        Ok(())
    }

    fn upsert_collection(
        &self,
        profile: ProfileRef,
        name: &str,
        link: &str,
        item_count: Option<u32>,
    ) -> Result<CollectionRecord, PersistenceError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let sql = format!(
            r#"
            INSERT INTO collections (profile_id, name, link, item_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(profile_id, name) DO UPDATE SET
                link = excluded.link,
                item_count = excluded.item_count,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            COLLECTION_COLUMNS
        );

        conn.query_row(
            &sql,
            params![profile.0, name, link, item_count, now],
            Self::row_to_collection,
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                PersistenceError::ProfileNotFound(profile.0)
            }
            other => other.into(),
        })
    }

    fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, PersistenceError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS);
        conn.query_row(&sql, params![id], Self::row_to_profile)
            .optional()
            .map_err(Into::into)
    }

    fn find_profile(&self, natural_key: &str) -> Result<Option<ProfileRecord>, PersistenceError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM profiles WHERE natural_key = ?", PROFILE_COLUMNS);
        conn.query_row(&sql, params![natural_key], Self::row_to_profile)
            .optional()
            .map_err(Into::into)
    }

    fn list_collections(&self, profile: ProfileRef) -> Result<Vec<CollectionRecord>, PersistenceError> {
        let conn = self.conn()?;
        Self::collections_of(&conn, profile.0)
    }

    fn report(&self) -> Result<Vec<ReportRow>, PersistenceError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM profiles WHERE is_done = 1 ORDER BY id",
            PROFILE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let profiles = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut grouped = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let collections = Self::collections_of(&conn, profile.id)?;
            grouped.push((profile, collections));
        }
        Ok(build_report(&grouped))
    }

    fn stats(&self) -> Result<RecorderStats, PersistenceError> {
        let conn = self.conn()?;
        let (total, done): (u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_done), 0) FROM profiles",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let total_collections: u64 =
            conn.query_row("SELECT COUNT(*) FROM collections", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT browser_type, COUNT(*) FROM profiles \
             WHERE browser_type IS NOT NULL AND browser_type != '' \
             GROUP BY browser_type",
        )?;
        let browser_types = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<Result<_, _>>()?;

        Ok(RecorderStats {
            total_profiles: total,
            done_profiles: done,
            pending_profiles: total - done,
            total_collections,
            browser_types,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobSpec, ProfileMetadata};
    use crate::recorder::record_run;

    fn upsert(key: &str, name: Option<&str>) -> ProfileUpsert {
        ProfileUpsert {
            natural_key: key.to_string(),
            name: name.map(str::to_string),
            ..ProfileUpsert::default()
        }
    }

    #[test]
    fn test_upsert_profile_is_idempotent() {
        let recorder = SqliteRecorder::in_memory().unwrap();

        let first = recorder.upsert_profile(&upsert("gpm-1", Some("Account 1"))).unwrap();
        let second = recorder
            .upsert_profile(&ProfileUpsert {
                browser_type: Some("chromium".into()),
                ..upsert("gpm-1", Some("Renamed"))
            })
            .unwrap();

        assert_eq!(first, second);
        let profile = recorder.find_profile("gpm-1").unwrap().unwrap();
        assert_eq!(profile.name, "Renamed");
        assert_eq!(profile.browser_type.as_deref(), Some("chromium"));
        assert_eq!(recorder.stats().unwrap().total_profiles, 1);
    }

    #[test]
    fn test_upsert_profile_keeps_fields_not_given() {
        let recorder = SqliteRecorder::in_memory().unwrap();
        recorder
            .upsert_profile(&ProfileUpsert {
                note: Some("vip".into()),
                ..upsert("gpm-1", Some("Account 1"))
            })
            .unwrap();
        recorder.upsert_profile(&upsert("gpm-1", None)).unwrap();

        let profile = recorder.find_profile("gpm-1").unwrap().unwrap();
        assert_eq!(profile.name, "Account 1");
        assert_eq!(profile.note.as_deref(), Some("vip"));
    }

    #[test]
    fn test_new_profile_name_defaults_to_key() {
        let recorder = SqliteRecorder::in_memory().unwrap();
        let profile = recorder.upsert_profile(&upsert("gpm-9", None)).unwrap();
        let stored = recorder.get_profile(profile.0).unwrap().unwrap();
        assert_eq!(stored.name, "gpm-9");
        assert!(!stored.is_done);
    }

    #[test]
    fn test_upsert_collection_updates_in_place() {
        let recorder = SqliteRecorder::in_memory().unwrap();
        let profile = recorder.upsert_profile(&upsert("gpm-1", None)).unwrap();

        let first = recorder
            .upsert_collection(profile, "lofi autoplay", "https://x/playlist?list=A", Some(80))
            .unwrap();
        let second = recorder
            .upsert_collection(profile, "lofi autoplay", "https://x/playlist?list=B", None)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.link, "https://x/playlist?list=B");
        assert_eq!(second.item_count, None);
        assert_eq!(recorder.list_collections(profile).unwrap().len(), 1);
    }

    #[test]
    fn test_collection_for_missing_profile() {
        let recorder = SqliteRecorder::in_memory().unwrap();
        let err = recorder
            .upsert_collection(ProfileRef(999), "x", "y", None)
            .unwrap_err();
        assert!(matches!(err, PersistenceError::ProfileNotFound(999)));
        assert!(matches!(
            recorder.mark_done(ProfileRef(999)),
            Err(PersistenceError::ProfileNotFound(999))
        ));
    }

    #[test]
    fn test_record_run_and_report() {
        let recorder = SqliteRecorder::in_memory().unwrap();

        let job = JobSpec::new("gpm-1", "lofi").with_metadata(ProfileMetadata {
            name: Some("Account 1".into()),
            ..ProfileMetadata::default()
        });
        record_run(&recorder, &job, "lofi autoplay", "https://x/playlist?list=A", Some(120)).unwrap();
        record_run(&recorder, &job, "jazz autoplay", "https://x/playlist?list=B", None).unwrap();

        // Imported but never processed: not in the report.
        recorder.upsert_profile(&upsert("gpm-2", Some("Idle"))).unwrap();

        // Done profile with no collection.
        let bare = recorder.upsert_profile(&upsert("gpm-3", Some("Bare"))).unwrap();
        recorder.mark_done(bare).unwrap();

        let rows = recorder.report().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].profile_name, "Account 1");
        assert_eq!(rows[1].collection_name, "jazz autoplay");
        assert_eq!(rows[2].natural_key, "gpm-3");
        assert_eq!(rows[2].link, "");

        let stats = recorder.stats().unwrap();
        assert_eq!(stats.total_profiles, 3);
        assert_eq!(stats.done_profiles, 2);
        assert_eq!(stats.pending_profiles, 1);
        assert_eq!(stats.total_collections, 2);
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.db");
        {
            let recorder = SqliteRecorder::new(&path).unwrap();
            recorder
                .upsert_profile(&ProfileUpsert {
                    browser_type: Some("chromium".into()),
                    ..upsert("gpm-1", Some("A"))
                })
                .unwrap();
        }
        let recorder = SqliteRecorder::new(&path).unwrap();
        let stats = recorder.stats().unwrap();
        assert_eq!(stats.total_profiles, 1);
        assert_eq!(stats.browser_types.get("chromium"), Some(&1));
    }

    #[test]
    fn test_build_report_dedups_name_link_pairs() {
        let now = Utc::now();
        let profile = ProfileRecord {
            id: 1,
            natural_key: "k".into(),
            name: "n".into(),
            raw_proxy: None,
            profile_path: None,
            browser_type: None,
            browser_version: None,
            note: None,
            is_done: true,
            created_at: now,
            updated_at: now,
        };
        let collection = |id: i64, name: &str, link: &str| CollectionRecord {
            id,
            profile_id: 1,
            name: name.into(),
            link: link.into(),
            item_count: None,
            created_at: now,
            updated_at: now,
        };
        let rows = build_report(&[(
            profile,
            vec![
                collection(1, "a", "L1"),
                collection(2, "a", "L1"),
                collection(3, "a", "L2"),
            ],
        )]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].link, "L2");
        assert_eq!(rows[1].index, 2);
    }
}

//! Mock result recorder for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::recorder::{
    CollectionRecord, PersistenceError, ProfileRecord, ProfileRef, ProfileUpsert, RecorderStats,
    ReportRow, ResultRecorder, SqliteRecorder,
};

/// In-memory recorder that can be told to fail every write.
///
/// Reads and writes go to a private in-memory SQLite database so the
/// upsert semantics match production.
pub struct MockRecorder {
    inner: SqliteRecorder,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self {
            inner: SqliteRecorder::in_memory().expect("in-memory database"),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make every following write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write calls seen, failed ones included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> Result<(), PersistenceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Database("mock write failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultRecorder for MockRecorder {
    fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<ProfileRef, PersistenceError> {
        self.check_write()?;
        self.inner.upsert_profile(profile)
    }

    fn mark_done(&self, profile: ProfileRef) -> Result<(), PersistenceError> {
        self.check_write()?;
        self.inner.mark_done(profile)
    }

    fn upsert_collection(
        &self,
        profile: ProfileRef,
        name: &str,
        link: &str,
        item_count: Option<u32>,
    ) -> Result<CollectionRecord, PersistenceError> {
        self.check_write()?;
        self.inner.upsert_collection(profile, name, link, item_count)
    }

    fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, PersistenceError> {
        self.inner.get_profile(id)
    }

    fn find_profile(&self, natural_key: &str) -> Result<Option<ProfileRecord>, PersistenceError> {
        self.inner.find_profile(natural_key)
    }

    fn list_collections(&self, profile: ProfileRef) -> Result<Vec<CollectionRecord>, PersistenceError> {
        self.inner.list_collections(profile)
    }

    fn report(&self) -> Result<Vec<ReportRow>, PersistenceError> {
        self.inner.report()
    }

    fn stats(&self) -> Result<RecorderStats, PersistenceError> {
        self.inner.stats()
    }
}

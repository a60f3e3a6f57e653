//! Result recorder trait and types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::job::JobSpec;
use crate::session::ControllerProfile;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(i64),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        PersistenceError::Database(e.to_string())
    }
}

/// Row id of a stored profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileRef(pub i64);

/// Attributes written by [`ResultRecorder::upsert_profile`].
///
/// `None` fields leave the stored value untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpsert {
    pub natural_key: String,
    /// Defaults to the natural key when a new profile is created.
    pub name: Option<String>,
    pub raw_proxy: Option<String>,
    pub profile_path: Option<String>,
    pub browser_type: Option<String>,
    pub browser_version: Option<String>,
    pub note: Option<String>,
}

impl ProfileUpsert {
    pub fn from_job(job: &JobSpec) -> Self {
        let meta = &job.metadata;
        Self {
            natural_key: job.resource_key.clone(),
            name: meta.name.clone(),
            raw_proxy: meta.raw_proxy.clone(),
            profile_path: meta.profile_path.clone(),
            browser_type: meta.browser_type.clone(),
            browser_version: meta.browser_version.clone(),
            note: meta.note.clone(),
        }
    }

    /// The controller's listing is authoritative: a field it omits is
    /// written as an empty string instead of keeping the stored value.
    pub fn from_controller(profile: &ControllerProfile) -> Self {
        let given = |field: &Option<String>| Some(field.clone().unwrap_or_default());
        Self {
            natural_key: profile.id.clone(),
            name: Some(profile.name.clone()),
            raw_proxy: given(&profile.raw_proxy),
            profile_path: given(&profile.profile_path),
            browser_type: given(&profile.browser_type),
            browser_version: given(&profile.browser_version),
            note: given(&profile.note),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    pub id: i64,
    pub natural_key: String,
    pub name: String,
    pub raw_proxy: Option<String>,
    pub profile_path: Option<String>,
    pub browser_type: Option<String>,
    pub browser_version: Option<String>,
    pub note: Option<String>,
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn profile_ref(&self) -> ProfileRef {
        ProfileRef(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRecord {
    pub id: i64,
    pub profile_id: i64,
    pub name: String,
    pub link: String,
    /// Items loaded when the collection was created; `None` when unknown.
    pub item_count: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One line of the done-profiles report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// 1-based line number.
    pub index: usize,
    pub natural_key: String,
    pub profile_name: String,
    pub collection_name: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStats {
    pub total_profiles: u64,
    pub done_profiles: u64,
    pub pending_profiles: u64,
    pub total_collections: u64,
    /// Profile count per browser type, blank types excluded.
    pub browser_types: BTreeMap<String, u64>,
}

/// Storage for profiles and the collections built for them.
pub trait ResultRecorder: Send + Sync {
    /// Inserts or updates a profile by natural key.
    fn upsert_profile(&self, profile: &ProfileUpsert) -> Result<ProfileRef, PersistenceError>;

    fn mark_done(&self, profile: ProfileRef) -> Result<(), PersistenceError>;

    /// Inserts or updates the collection named `name` of `profile`.
    fn upsert_collection(
        &self,
        profile: ProfileRef,
        name: &str,
        link: &str,
        item_count: Option<u32>,
    ) -> Result<CollectionRecord, PersistenceError>;

    fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, PersistenceError>;

    fn find_profile(&self, natural_key: &str) -> Result<Option<ProfileRecord>, PersistenceError>;

    fn list_collections(&self, profile: ProfileRef) -> Result<Vec<CollectionRecord>, PersistenceError>;

    /// Done profiles with their distinct collections, in profile id order.
    fn report(&self) -> Result<Vec<ReportRow>, PersistenceError>;

    fn stats(&self) -> Result<RecorderStats, PersistenceError>;
}

/// Writes a successful run: profile upsert, done flag, collection upsert.
pub fn record_run(
    recorder: &dyn ResultRecorder,
    job: &JobSpec,
    collection_name: &str,
    link: &str,
    item_count: Option<u32>,
) -> Result<CollectionRecord, PersistenceError> {
    let profile = recorder.upsert_profile(&ProfileUpsert::from_job(job))?;
    recorder.mark_done(profile)?;
    recorder.upsert_collection(profile, collection_name, link, item_count)
}

/// Flattens done profiles and their collections into report rows.
///
/// Collections repeating an earlier (name, link) pair of the same profile
/// are dropped; a profile without collections still gets one row.
pub fn build_report(profiles: &[(ProfileRecord, Vec<CollectionRecord>)]) -> Vec<ReportRow> {
    let mut rows = Vec::new();
    for (profile, collections) in profiles {
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<&CollectionRecord> = collections
            .iter()
            .filter(|c| seen.insert((c.name.as_str(), c.link.as_str())))
            .collect();

        if unique.is_empty() {
            rows.push(ReportRow {
                index: rows.len() + 1,
                natural_key: profile.natural_key.clone(),
                profile_name: profile.name.clone(),
                collection_name: String::new(),
                link: String::new(),
            });
            continue;
        }
        for collection in unique {
            rows.push(ReportRow {
                index: rows.len() + 1,
                natural_key: profile.natural_key.clone(),
                profile_name: profile.name.clone(),
                collection_name: collection.name.clone(),
                link: collection.link.clone(),
            });
        }
    }
    rows
}

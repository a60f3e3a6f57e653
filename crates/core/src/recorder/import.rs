//! Import of controller profiles into the recorder.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::session::{RemoteControlError, SessionController};

use super::types::{PersistenceError, ProfileUpsert, ResultRecorder};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not list controller profiles: {0}")]
    Controller(#[from] RemoteControlError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Upserts every profile the controller lists. Existing profiles (same
/// natural key) are updated and counted separately from new ones.
pub async fn import_profiles(
    controller: &dyn SessionController,
    recorder: &dyn ResultRecorder,
) -> Result<ImportSummary, ImportError> {
    let profiles = controller.list_profiles().await?;

    let mut summary = ImportSummary::default();
    for profile in profiles.iter().filter(|p| !p.id.trim().is_empty()) {
        let existed = recorder.find_profile(&profile.id)?.is_some();
        recorder.upsert_profile(&ProfileUpsert::from_controller(profile))?;
        if existed {
            summary.updated += 1;
        } else {
            summary.created += 1;
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        "imported controller profiles"
    );
    Ok(summary)
}

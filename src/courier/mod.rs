use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

pub mod database;
pub mod edit_message;
mod entities;
pub mod error;
pub mod live_location;
pub mod proximity;
pub mod state_manager;
pub mod store;
pub mod transport;
pub mod types;
pub mod update_stream;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_utils;

use crate::init_tracing;

use database::Database;
use error::{CourierError, Result};
use state_manager::StateManager;
use store::MessageStore;
use transport::Transport;
use upload::MediaUploader;

/// Progress reported as soon as a media upload starts, so progress
/// indicators visibly move before the first real chunk is acknowledged.
pub const DEFAULT_UPLOAD_PROGRESS_FLOOR: f32 = 0.027;

/// Upper bound for [`EditConfig::stale_reference_retries`].
pub const MAX_STALE_REFERENCE_RETRIES: u32 = 1;

/// Tuning for the edit pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct EditConfig {
    /// Lower bound applied to every upload progress value.
    pub upload_progress_floor: f32,

    /// Extra attempts, each with a forced reupload, after the server rejects
    /// a stale media file reference.
    pub stale_reference_retries: u32,
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            upload_progress_floor: DEFAULT_UPLOAD_PROGRESS_FLOOR,
            stale_reference_retries: 1,
        }
    }
}

impl EditConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.upload_progress_floor) {
            return Err(CourierError::Configuration(format!(
                "upload_progress_floor must be in [0, 1), got {}",
                self.upload_progress_floor
            )));
        }
        if self.stale_reference_retries > MAX_STALE_REFERENCE_RETRIES {
            return Err(CourierError::Configuration(format!(
                "stale_reference_retries must be at most {}, got {}",
                MAX_STALE_REFERENCE_RETRIES, self.stale_reference_retries
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CourierConfig {
    /// Directory for application data
    pub data_dir: PathBuf,

    /// Directory for application logs
    pub logs_dir: PathBuf,

    pub edit: EditConfig,
}

impl CourierConfig {
    pub fn new(data_dir: &Path, logs_dir: &Path) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };

        Self {
            data_dir: data_dir.join(env_suffix),
            logs_dir: logs_dir.join(env_suffix),
            edit: EditConfig::default(),
        }
    }

    pub fn with_edit_config(mut self, edit: EditConfig) -> Self {
        self.edit = edit;
        self
    }
}

/// Coordinates message edits against the backend and the local store.
///
/// Every collaborator is passed in explicitly; clones share them.
#[derive(Clone)]
pub struct Courier {
    edit_config: EditConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn MessageStore>,
    uploader: Arc<dyn MediaUploader>,
    state_manager: Arc<dyn StateManager>,
}

impl std::fmt::Debug for Courier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Courier")
            .field("edit_config", &self.edit_config)
            .field("transport", &"<REDACTED>")
            .field("store", &"<REDACTED>")
            .field("uploader", &"<REDACTED>")
            .field("state_manager", &"<REDACTED>")
            .finish()
    }
}

impl Courier {
    pub fn new(
        edit_config: EditConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn MessageStore>,
        uploader: Arc<dyn MediaUploader>,
        state_manager: Arc<dyn StateManager>,
    ) -> Self {
        Self {
            edit_config,
            transport,
            store,
            uploader,
            state_manager,
        }
    }

    /// Sets up directories, logging and the SQLite store, then builds a
    /// [`Courier`] on top of them.
    ///
    /// # Errors
    ///
    /// Fails if the edit configuration is invalid, the directories cannot be
    /// created, or the database cannot be opened and migrated.
    pub async fn initialize(
        config: CourierConfig,
        transport: Arc<dyn Transport>,
        uploader: Arc<dyn MediaUploader>,
        state_manager: Arc<dyn StateManager>,
    ) -> Result<Self> {
        config.edit.validate()?;

        let data_dir = &config.data_dir;
        let logs_dir = &config.logs_dir;

        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))
            .map_err(CourierError::from)?;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(CourierError::from)?;

        init_tracing(logs_dir);

        tracing::debug!(target: "courier::initialize", "Logging initialized in directory: {:?}", logs_dir);

        let database = Arc::new(Database::new(data_dir.join("courier.sqlite")).await?);

        Ok(Self::new(
            config.edit,
            transport,
            database,
            uploader,
            state_manager,
        ))
    }

    pub fn edit_config(&self) -> &EditConfig {
        &self.edit_config
    }
}

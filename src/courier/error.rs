use thiserror::Error;

use super::database::DatabaseError;
use super::store::StoreError;

pub type Result<T> = core::result::Result<T, CourierError>;

#[derive(Error, Debug)]
pub enum CourierError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Why an edit was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMessageError {
    #[error("Failed to edit message")]
    Generic,

    #[error("Editing is restricted in this chat")]
    Restricted,

    #[error("Message text is too long")]
    TextTooLong,
}

/// Outcome of a single edit attempt that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditAttemptError {
    Edit(EditMessageError),
    /// The server rejected a media file reference; a forced reupload may fix it.
    InvalidReference,
}

impl From<EditMessageError> for EditAttemptError {
    fn from(err: EditMessageError) -> Self {
        EditAttemptError::Edit(err)
    }
}

impl From<EditAttemptError> for EditMessageError {
    fn from(err: EditAttemptError) -> Self {
        match err {
            EditAttemptError::Edit(err) => err,
            EditAttemptError::InvalidReference => EditMessageError::Generic,
        }
    }
}

impl From<StoreError> for EditAttemptError {
    fn from(err: StoreError) -> Self {
        tracing::error!(
            target: "courier::edit_message",
            "Store access failed during edit: {}",
            err
        );
        EditAttemptError::Edit(EditMessageError::Generic)
    }
}

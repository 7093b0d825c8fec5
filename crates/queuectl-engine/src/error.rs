use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("invalid job payload: {0}")]
    BadPayload(String),

    #[error("job id already exists: {0}")]
    Duplicate(String),

    #[error("unknown job state: {0}")]
    BadState(String),

    #[error("job {0} is not in the dead-letter queue")]
    NotDead(String),

    #[error("no such job: {0}")]
    NoSuchJob(String),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueueError {
    /// User mistakes exit the CLI with code 1; everything else is an
    /// internal failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::BadPayload(_)
                | Self::Duplicate(_)
                | Self::BadState(_)
                | Self::NotDead(_)
                | Self::NoSuchJob(_)
        )
    }
}

use relaunch_core::{FeedError, UpdateError};
use relaunch_platform::AppPathsError;
use thiserror::Error;

use crate::single_instance::AcquireError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown argument \"{0}\" (usage: relaunch [--check-once | --install-now])")]
    UnknownArgument(String),

    #[error("failed to resolve application paths: {0}")]
    Paths(#[from] AppPathsError),

    #[error("failed to {action}: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Instance(#[from] AcquireError),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("update feed unavailable: {0}")]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl AppError {
    pub fn io(action: &'static str, source: std::io::Error) -> Self {
        Self::Io { action, source }
    }
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("version \"{raw}\" is not comparable")]
    NotComparable { raw: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown update channel \"{value}\" (expected alpha, beta, rc or latest)")]
pub struct ChannelParseError {
    pub value: String,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

/// Failures reported by an [`UpdateFeedClient`](crate::UpdateFeedClient).
///
/// `Clone` so a single in-flight check can hand the same outcome to every
/// coalesced caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Network error during {operation} ({stage}): {details}")]
    Network {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error("Update feed returned HTTP {status}{body_snippet}")]
    HttpStatus { status: u16, body_snippet: String },

    #[error("Invalid feed configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No update has been found to download")]
    NoPendingUpdate,

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("{context}: {details}")]
    Platform {
        context: &'static str,
        details: String,
    },
}

impl FeedError {
    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Network {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Network {
            operation,
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn network_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_parse(operation, error.to_string())
    }

    pub fn platform(context: &'static str, details: impl Into<String>) -> Self {
        Self::Platform {
            context,
            details: details.into(),
        }
    }
}

impl From<std::io::Error> for FeedError {
    fn from(err: std::io::Error) -> Self {
        FeedError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("Update feed rejected configuration: {0}")]
    Configuration(#[source] FeedError),

    #[error("Invalid update state transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("No update is available to download")]
    NoUpdateAvailable,

    #[error("No downloaded update is ready to install")]
    NotReady,

    #[error("Update download failed: {0}")]
    Download(#[source] FeedError),

    #[error("Update install failed: {0}")]
    Install(#[source] FeedError),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request did not complete within the client timeout.
    #[error("timeout fetching {path}")]
    Timeout { path: String },

    /// Connection refused, reset, bad TLS, unreadable body...
    #[error("error fetching {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error ({0})")]
    HttpStatus(u16),

    /// The panel kept answering with its default page after relogin.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Another session stayed open after the reset-and-retry path.
    #[error("session already open: too many retries")]
    SessionConflict,

    #[error("login failed: wrong credentials")]
    InvalidCredentials,

    #[error("login failed: max attempt count reached")]
    MaxLoginAttemptsReached,

    #[error("login failed: wrong code")]
    InvalidCode,

    #[error("command failed: unknown parameter")]
    UnknownCommandParameter,

    /// Error page without a readable error code.
    #[error("unknown error: no error code on error page")]
    MissingErrorCode,

    #[error("command failed: unknown error code {0}")]
    UnknownErrorCode(String),

    #[error("couldn't detect the panel type")]
    DetectionFailed,

    #[error("panel temporarily unavailable, please retry later")]
    TemporarilyUnavailable,

    #[error("challenge not found: {0}")]
    ChallengeNotFound(String),

    #[error("no panel variant selected")]
    VariantNotSelected,

    /// The active variant has no such page (e.g. no version page).
    #[error("page not available: {0}")]
    UnsupportedPage(String),

    #[error("no credentials configured")]
    MissingCredentials,

    #[error("invalid zone: {0}")]
    InvalidZone(u8),

    #[error("parse error: {0}")]
    Parse(String),

    /// The HTTP client itself could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may simply try again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. }
                | Error::Transport { .. }
                | Error::HttpStatus(_)
                | Error::TemporarilyUnavailable
                | Error::SessionConflict
                | Error::NotAuthenticated
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

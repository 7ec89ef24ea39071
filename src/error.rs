use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),
    #[error("Couldn't build selector: {0}")]
    InvalidSelector(String),
    #[error("Couldn't parse release date '{0}'")]
    ParseDate(String),

    #[error("Couldn't discover novel at {url}: {reason}")]
    Discovery { url: String, reason: String },
    #[error("Couldn't retrieve chapter '{chapter}' from {link}: {reason}")]
    Retrieval {
        chapter: String,
        link: String,
        reason: String,
    },
    #[error("Fetching {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Text can't be represented in {0}")]
    Encoding(&'static str),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),
    #[error("Worker pool was closed while tasks were waiting.")]
    RuntimeSemaphore(#[from] tokio::sync::AcquireError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Zip Error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Wraps any failure that happened while reading the novel's source pages.
    pub(crate) fn discovery(url: &str, err: impl std::fmt::Display) -> Self {
        Error::Discovery {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    /// The novel source was unreachable or unparseable.
    pub fn is_discovery(&self) -> bool {
        matches!(self, Error::Discovery { .. })
    }

    /// One or more chapters couldn't be fetched.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Error::Retrieval { .. })
    }
}

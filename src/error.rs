use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported lighting system: {0}")]
    UnsupportedSystem(String),

    #[error("no lighting system configured")]
    NotConfigured,

    #[error("lighting controller not ready")]
    NotReady,

    #[error("not authenticated with lighting system")]
    NotAuthenticated,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("http status {status} from {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    #[error("service discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("pairing timed out after {0}s")]
    PairingTimeout(u64),

    #[error("hardware error: {0}")]
    Hardware(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

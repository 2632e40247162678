/// All errors the client can surface. Blocked moves are not errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Missing page data: {0}")]
    MissingDom(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

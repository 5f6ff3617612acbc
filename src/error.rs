use thiserror::Error;

/// Why a request to the judge server produced no usable snapshot.
///
/// The screens render every variant the same way: log it, keep the last
/// snapshot, show a one-line notice.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No response at all: connect, DNS, timeout or a broken body stream.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A response arrived with a non-success status.
    #[error("server answered {status}{}", format_detail(.detail))]
    Status {
        status: reqwest::StatusCode,
        detail: Option<String>,
    },

    /// The body was not the JSON shape we asked for.
    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request URL could not be built.
    #[error("invalid request url: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err)
    }
}

fn format_detail(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

/// Failure to persist the selection state file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

use thiserror::Error;

/// Recoverable failures of a single unit of work (one region, one query).
///
/// Batch runners catch these, log them and move on; only session loss in the
/// resolver is allowed to end a batch.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("request for region {region} failed: {source}")]
    Fetch {
        region: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("region {region} returned status {status}")]
    Status {
        region: String,
        status: reqwest::StatusCode,
    },

    #[error("region {region} returned a malformed body: {message}")]
    Decode { region: String, message: String },

    #[error("browser session lost while resolving {0:?}")]
    Session(String),
}

/// Result alias carrying the engine [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine API.
///
/// Playback itself never fails: a blocked audio output is retried in the
/// background and redundant transport calls are no-ops.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

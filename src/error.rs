use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("The selector you are trying to scrape for is missing. Selector: {0}")]
    ParseMissingSelector(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Browser Error: {0:#}")]
    Browser(#[from] anyhow::Error),
    #[error("No visible rows matched selector: {0}")]
    RowsNotVisible(String),

    #[error("Csv Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed record for {date}: {reason}")]
    MalformedRecord { date: String, reason: String },
}

impl Error {
    /// Failures of a single browser session. Another attempt with a fresh
    /// browser may succeed, so these count against the retry budget instead
    /// of aborting the run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Browser(_) | Error::RowsNotVisible(_))
    }
}

impl From<csv::IntoInnerError<csv::Writer<Vec<u8>>>> for Error {
    fn from(value: csv::IntoInnerError<csv::Writer<Vec<u8>>>) -> Self {
        Error::Io(value.into_error())
    }
}

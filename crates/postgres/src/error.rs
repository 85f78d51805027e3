use thiserror::Error;

/// Crate-specific error enum.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// [bb8::RunError]
    #[error(transparent)]
    Pool(#[from] bb8::RunError<tokio_postgres::Error>),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [tokio_postgres::Error]
    #[error(transparent)]
    TokioPostgres(#[from] tokio_postgres::Error),
}

impl From<Error> for flyfoto::Error {
    fn from(err: Error) -> flyfoto::Error {
        flyfoto::Error::backend(err)
    }
}

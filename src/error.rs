use thiserror::Error;

/// Errors fall into two kinds. `InvalidArgument` is a usage error: the call
/// is rejected and the structure is left unchanged. `Defect` means an
/// internal consistency check failed mid-operation; the structure must be
/// assumed corrupt and callers should not try to recover.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("structural defect: {0}")]
    Defect(String),
}

impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn defect(msg: impl Into<String>) -> Self {
        Error::Defect(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

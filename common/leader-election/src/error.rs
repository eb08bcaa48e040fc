use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("leader service is shut down")]
    ServiceShutDown,

    #[error("leader service handle is already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, Error>;

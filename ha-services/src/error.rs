use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("high availability services are shut down")]
    ShutDown,

    #[error("{message}: {source}")]
    ResourceClose {
        message: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error(transparent)]
    LeaderElection(#[from] leader_election::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub(crate) fn resource_close(message: &'static str, source: Error) -> Self {
        Self::ResourceClose {
            message,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

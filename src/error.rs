use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("parse error: {message}")]
    Parse { message: String },
    #[error("unbound symbol: {name}")]
    UnboundSymbol { name: String },
    #[error("arity error: {message}")]
    Arity { message: String },
    #[error("evaluation error: {message}")]
    Evaluation { message: String },
    #[error("evaluation depth limit of {limit} exceeded")]
    DepthExceeded { limit: usize },
    #[error("file system error: {0}")]
    Filesystem(#[from] FsError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("path \"{0}\" does not exist")]
    PathNotFound(String),
    #[error("\"{0}\" already exists")]
    AlreadyExists(String),
    #[error("\"{0}\" is a directory")]
    IsDirectory(String),
    #[error("file \"{0}\" does not exist")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn parse_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Parse {
        message: message.into(),
    })
}

pub fn runtime_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Evaluation {
        message: message.into(),
    })
}

pub fn arity_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Arity {
        message: message.into(),
    })
}

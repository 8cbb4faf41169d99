use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("inproc endpoint {0:?} is already registered")]
    AlreadyRegistered(&'static str),
    #[error("inproc endpoint not found")]
    NotFound,
    #[error("peer end of the inproc channel was dropped")]
    Disconnected,
}

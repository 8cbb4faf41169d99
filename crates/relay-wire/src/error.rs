use thiserror::Error;

/// Errors surfaced at the `relay-wire` boundary: malformed frames, bad
/// codec input. Transport and spooler I/O errors live in their own crates'
/// error enums and are not wrapped here.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("endpoint list entry is empty")]
    EmptyEndpoint,
    #[error("unknown mode {0:?}")]
    UnknownMode(String),
    #[error("codec error: {0}")]
    Codec(#[from] std::io::Error),
}

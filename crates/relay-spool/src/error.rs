use thiserror::Error;

/// Failure kinds surfaced by [`crate::Spooler`] (spec §4.1 "Failure
/// semantics"). Write failures are logged by the caller and treated as a
/// loss signal; read format errors abort the current replay session but
/// never the relay loop itself (spec §7).
#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("dump path must be non-empty")]
    EmptyPath,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't acquire exclusive lock on dump file")]
    Lock,
    #[error("short write: wrote {wrote} of {expected} bytes")]
    ShortWrite { wrote: usize, expected: usize },
    #[error("bad record magic")]
    BadMagic,
    #[error("truncated record (short read within a record)")]
    ShortRecord,
    #[error("zero-length record mid-stream")]
    ZeroLengthRecord,
}

use thiserror::Error;

/// Errors surfaced while assembling or driving a relay pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("endpoint error: {0}")]
    Endpoint(#[from] relay_net::EndpointError),

    #[error("spool error: {0}")]
    Spool(#[from] relay_spool::SpoolError),

    #[error("wire error: {0}")]
    Wire(#[from] relay_wire::WireError),

    #[error("{mode} requires a {field} endpoint")]
    MissingEndpoint { mode: relay_wire::Mode, field: &'static str },

    #[error("unknown mode {0:?}")]
    UnknownMode(String),

    #[error("unknown dump type: {0}")]
    DumpType(#[from] relay_spool::UnknownDumpFormat),

    #[error("config error: {0}")]
    Config(#[from] relay_config::ConfigError),

    #[error("inproc error: {0}")]
    Inproc(#[from] relay_comm::CommError),
}

use std::path::PathBuf;

use clap::Parser;

/// `relay-server`'s CLI surface (spec §6 "CLI surface (server)"). Field
/// names intentionally keep the `snake_case` long-option spelling from the
/// original `option.c`/`option.h` (`client_frontendpoint`, not
/// `client-frontendpoint`) since that's the documented flag spelling.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "relay-server", about = "durable pub/sub/push-pull relay dataplane")]
pub struct ServerArgs {
    /// client | publish | subscribe | client-publish | publish-subscribe |
    /// client-subscribe | stand-alone (plus the aliases publish-client,
    /// subscribe-publish, subscribe-client).
    #[arg(long = "mode")]
    pub mode: Option<String>,

    #[arg(long = "client_frontendpoint")]
    pub client_frontendpoint: Option<String>,
    #[arg(long = "client_backendpoints")]
    pub client_backendpoints: Option<String>,
    #[arg(long = "client_dumpfile")]
    pub client_dumpfile: Option<String>,
    #[arg(long = "client_dumptype")]
    pub client_dumptype: Option<String>,

    #[arg(long = "publish_frontendpoint")]
    pub publish_frontendpoint: Option<String>,
    #[arg(long = "publish_backendpoint")]
    pub publish_backendpoint: Option<String>,
    #[arg(long = "publish_key")]
    pub publish_key: Option<String>,
    #[arg(long = "publish_sendkey")]
    pub publish_sendkey: bool,

    #[arg(long = "subscribe_frontendpoints")]
    pub subscribe_frontendpoints: Option<String>,
    #[arg(long = "subscribe_backendpoint")]
    pub subscribe_backendpoint: Option<String>,
    #[arg(long = "subscribe_key")]
    pub subscribe_key: Option<String>,
    #[arg(long = "subscribe_dropkey")]
    pub subscribe_dropkey: bool,
    #[arg(long = "subscribe_dumpfile")]
    pub subscribe_dumpfile: Option<String>,
    #[arg(long = "subscribe_dumptype")]
    pub subscribe_dumptype: Option<String>,

    /// Compression codec injected into the relay loop (spec §9 design note
    /// 5: runtime-selected, not a compile-time `#[cfg]`). Not part of the
    /// original CLI surface named in spec §6; an ambient addition so the
    /// compile-time toggle the spec documents has a runtime equivalent.
    #[arg(long = "compression", value_parser = ["identity", "zstd"])]
    pub compression: Option<String>,
    #[arg(long = "zstd_level")]
    pub zstd_level: Option<i32>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Print build info and exit.
    #[arg(long = "info")]
    pub info: bool,
    #[arg(long = "syslog")]
    pub syslog: bool,
    #[arg(long = "verbose")]
    pub verbose: bool,
}

/// `relay-worker`'s CLI surface (spec §6 "CLI surface (worker)").
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-worker", about = "spawns a child process per relayed message")]
pub struct WorkerArgs {
    #[arg(short = 'e', long = "endpoint", default_value = "tcp://127.0.0.1:5560")]
    pub endpoint: String,

    #[arg(short = 'c', long = "command")]
    pub command: Option<String>,

    #[arg(short = 't', long = "thread", default_value_t = 1)]
    pub thread: usize,

    #[arg(short = 's', long = "syslog")]
    pub syslog: bool,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Forwarded verbatim as the child process's argument vector (after
    /// `command`).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// `relay-sender`'s CLI surface: a trivial producer tool (spec §1 names it
/// as an out-of-scope collaborator), grounded on the original `app_client.c`.
#[derive(Parser, Debug, Clone)]
#[command(name = "relay-sender", about = "sends one multi-frame message to a relay ingress")]
pub struct SenderArgs {
    #[arg(short = 'e', long = "endpoint", default_value = "tcp://127.0.0.1:5557")]
    pub endpoint: String,

    /// Input file, or "stdin" to read one message per line.
    #[arg(short = 'f', long = "filename")]
    pub filename: Option<String>,

    /// Number of trailing ARGS to send as extra leading frames of each
    /// message, when reading from a file.
    #[arg(short = 'm', long = "multipart", default_value_t = 0)]
    pub multipart: usize,

    #[arg(short = 's', long = "syslog")]
    pub syslog: bool,

    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Frame payloads to send as one message, when `--filename` isn't given.
    pub frames: Vec<String>,
}

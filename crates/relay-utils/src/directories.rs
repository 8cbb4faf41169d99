use std::path::PathBuf;

use directories::BaseDirs;
use tracing::warn;

/// `$XDG_DATA_HOME/<app_name>` (or platform equivalent), falling back to
/// `/tmp/<app_name>` when the base directories can't be resolved (e.g. no
/// `$HOME`, common in minimal containers).
pub fn local_share_dir<S: AsRef<str>>(app_name: S) -> PathBuf {
    let Some(base_dirs) = BaseDirs::new() else {
        warn!("couldn't find base dirs, storing data in /tmp/<app_name>");
        return PathBuf::from(format!("/tmp/{}", app_name.as_ref()));
    };
    base_dirs.data_dir().join(app_name.as_ref())
}

/// Default directory for dump spooler files when `--client_dumpfile`/
/// `--subscribe_dumpfile` is a bare filename rather than a path.
pub fn dump_dir<S: AsRef<str>>(app_name: S) -> PathBuf {
    local_share_dir(app_name).join("dump")
}

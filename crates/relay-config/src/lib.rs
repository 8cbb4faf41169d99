mod cli;
mod error;

use std::path::Path;

use serde::Deserialize;

pub use cli::{SenderArgs, ServerArgs, WorkerArgs};
pub use error::ConfigError;

/// Merged server configuration: CLI flags win, a `--config=FILE` YAML
/// document fills anything the CLI left unset, and hardcoded defaults fill
/// whatever's still missing after that.
///
/// Mirrors `zlmb_option_t` from the original `option.h`/`option.c`: every
/// field there is "first write wins" (`_option_strdup` only assigns into a
/// `NULL` slot), with `client_backendpoints` and `subscribe_frontendpoints`
/// the two fields that accumulate via comma-join (`_option_append`) instead
/// of overwrite.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    pub mode: Option<String>,

    pub client_frontendpoint: Option<String>,
    pub client_backendpoints: Option<String>,
    pub client_dumpfile: Option<String>,
    pub client_dumptype: Option<String>,

    pub publish_frontendpoint: Option<String>,
    pub publish_backendpoint: Option<String>,
    pub publish_key: Option<String>,
    pub publish_sendkey: bool,

    pub subscribe_frontendpoints: Option<String>,
    pub subscribe_backendpoint: Option<String>,
    pub subscribe_key: Option<String>,
    pub subscribe_dropkey: bool,
    pub subscribe_dumpfile: Option<String>,
    pub subscribe_dumptype: Option<String>,

    pub compression: Option<String>,
    pub zstd_level: Option<i32>,

    pub syslog: bool,
    pub verbose: bool,
}

/// A YAML scalar or sequence of scalars, deserialized into a single
/// comma-joined string so it merges into `RelayConfig`'s fields the same
/// way repeated `_option_append` calls would in the original YAML walk
/// (`zlmb_option_load_file` recurses sequence nodes item by item).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn joined(self) -> String {
        match self {
            StringOrList::One(s) => s,
            StringOrList::Many(items) => items.join(","),
        }
    }
}

/// The subset of `RelayConfig`'s fields a YAML config file may set. Matches
/// `option.c`'s recognized top-level keys; `mode` and `*_dumptype` are read
/// as plain scalars.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawYaml {
    mode: Option<String>,

    client_frontendpoint: Option<String>,
    client_backendpoints: Option<StringOrList>,
    client_dumpfile: Option<String>,
    client_dumptype: Option<String>,

    publish_frontendpoint: Option<String>,
    publish_backendpoint: Option<String>,
    publish_key: Option<String>,
    publish_sendkey: Option<bool>,

    subscribe_frontendpoints: Option<StringOrList>,
    subscribe_backendpoint: Option<String>,
    subscribe_key: Option<String>,
    subscribe_dropkey: Option<bool>,
    subscribe_dumpfile: Option<String>,
    subscribe_dumptype: Option<String>,

    compression: Option<String>,
    zstd_level: Option<i32>,

    syslog: Option<bool>,
    verbose: Option<bool>,
}

/// Default dump-file locations when neither the CLI nor the config file set
/// one. The original's `ZLMB_DEFAULT_CLIENT_DUMP_FILE`/
/// `ZLMB_DEFAULT_SUBSCRIBE_DUMP_FILE` constants weren't in the retrieved
/// header files; these substitutes live under `relay_utils::directories::dump_dir`
/// instead of a path relative to the working directory.
fn default_client_dumpfile() -> String {
    relay_utils::directories::dump_dir("relay")
        .join("client.dump")
        .to_string_lossy()
        .into_owned()
}

fn default_subscribe_dumpfile() -> String {
    relay_utils::directories::dump_dir("relay")
        .join("subscribe.dump")
        .to_string_lossy()
        .into_owned()
}

impl RelayConfig {
    /// Builds a `RelayConfig` from parsed CLI args, reading and merging
    /// `args.config` (if set) before falling back to defaults. CLI values
    /// always win; a config file fills whatever the CLI left `None`;
    /// defaults fill whatever's still `None` after that.
    pub fn load(args: &ServerArgs) -> Result<Self, ConfigError> {
        let mut cfg = RelayConfig {
            mode: args.mode.clone(),
            client_frontendpoint: args.client_frontendpoint.clone(),
            client_backendpoints: args.client_backendpoints.clone(),
            client_dumpfile: args.client_dumpfile.clone(),
            client_dumptype: args.client_dumptype.clone(),
            publish_frontendpoint: args.publish_frontendpoint.clone(),
            publish_backendpoint: args.publish_backendpoint.clone(),
            publish_key: args.publish_key.clone(),
            publish_sendkey: args.publish_sendkey,
            subscribe_frontendpoints: args.subscribe_frontendpoints.clone(),
            subscribe_backendpoint: args.subscribe_backendpoint.clone(),
            subscribe_key: args.subscribe_key.clone(),
            subscribe_dropkey: args.subscribe_dropkey,
            subscribe_dumpfile: args.subscribe_dumpfile.clone(),
            subscribe_dumptype: args.subscribe_dumptype.clone(),
            compression: args.compression.clone(),
            zstd_level: args.zstd_level,
            syslog: args.syslog,
            verbose: args.verbose,
        };

        if let Some(path) = &args.config {
            let raw = read_yaml(path)?;
            cfg.merge_yaml(raw);
        }

        cfg.client_dumpfile.get_or_insert_with(default_client_dumpfile);
        cfg.subscribe_dumpfile.get_or_insert_with(default_subscribe_dumpfile);
        cfg.compression.get_or_insert_with(|| "identity".to_owned());
        cfg.zstd_level.get_or_insert(3);

        Ok(cfg)
    }

    fn merge_yaml(&mut self, raw: RawYaml) {
        merge_scalar(&mut self.mode, raw.mode);
        merge_scalar(&mut self.client_frontendpoint, raw.client_frontendpoint);
        merge_list(&mut self.client_backendpoints, raw.client_backendpoints);
        merge_scalar(&mut self.client_dumpfile, raw.client_dumpfile);
        merge_scalar(&mut self.client_dumptype, raw.client_dumptype);
        merge_scalar(&mut self.publish_frontendpoint, raw.publish_frontendpoint);
        merge_scalar(&mut self.publish_backendpoint, raw.publish_backendpoint);
        merge_scalar(&mut self.publish_key, raw.publish_key);
        merge_list(&mut self.subscribe_frontendpoints, raw.subscribe_frontendpoints);
        merge_scalar(&mut self.subscribe_backendpoint, raw.subscribe_backendpoint);
        merge_scalar(&mut self.subscribe_key, raw.subscribe_key);
        merge_scalar(&mut self.subscribe_dumpfile, raw.subscribe_dumpfile);
        merge_scalar(&mut self.subscribe_dumptype, raw.subscribe_dumptype);
        merge_scalar(&mut self.compression, raw.compression);
        if self.zstd_level.is_none() {
            self.zstd_level = raw.zstd_level;
        }

        if !self.publish_sendkey {
            self.publish_sendkey = raw.publish_sendkey.unwrap_or(false);
        }
        if !self.subscribe_dropkey {
            self.subscribe_dropkey = raw.subscribe_dropkey.unwrap_or(false);
        }
        if !self.syslog {
            self.syslog = raw.syslog.unwrap_or(false);
        }
        if !self.verbose {
            self.verbose = raw.verbose.unwrap_or(false);
        }
    }
}

fn merge_scalar(slot: &mut Option<String>, incoming: Option<String>) {
    if slot.is_none() {
        *slot = incoming;
    }
}

/// Comma-join accumulation: a CLI-supplied value is extended with the
/// config file's entries rather than replaced, matching `_option_append`.
fn merge_list(slot: &mut Option<String>, incoming: Option<StringOrList>) {
    let Some(incoming) = incoming else { return };
    let joined = incoming.joined();
    match slot {
        Some(existing) if !existing.is_empty() => {
            existing.push(',');
            existing.push_str(&joined);
        }
        _ => *slot = Some(joined),
    }
}

fn read_yaml(path: &Path) -> Result<RawYaml, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ServerArgs {
        ServerArgs {
            mode: None,
            client_frontendpoint: None,
            client_backendpoints: None,
            client_dumpfile: None,
            client_dumptype: None,
            publish_frontendpoint: None,
            publish_backendpoint: None,
            publish_key: None,
            publish_sendkey: false,
            subscribe_frontendpoints: None,
            subscribe_backendpoint: None,
            subscribe_key: None,
            subscribe_dropkey: false,
            subscribe_dumpfile: None,
            subscribe_dumptype: None,
            compression: None,
            zstd_level: None,
            config: None,
            info: false,
            syslog: false,
            verbose: false,
        }
    }

    fn write_yaml(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn cli_value_wins_over_yaml_for_scalars() {
        let mut a = args();
        a.mode = Some("publish".to_owned());
        let yaml = write_yaml("mode: subscribe\n");
        a.config = Some(yaml.path().to_path_buf());

        let cfg = RelayConfig::load(&a).unwrap();
        assert_eq!(cfg.mode.as_deref(), Some("publish"));
    }

    #[test]
    fn yaml_fills_scalars_the_cli_left_unset() {
        let mut a = args();
        let yaml = write_yaml("mode: subscribe\nsubscribe_backendpoint: tcp://127.0.0.1:5560\n");
        a.config = Some(yaml.path().to_path_buf());

        let cfg = RelayConfig::load(&a).unwrap();
        assert_eq!(cfg.mode.as_deref(), Some("subscribe"));
        assert_eq!(cfg.subscribe_backendpoint.as_deref(), Some("tcp://127.0.0.1:5560"));
    }

    #[test]
    fn list_fields_accumulate_cli_then_yaml() {
        let mut a = args();
        a.client_backendpoints = Some("tcp://a:1".to_owned());
        let yaml = write_yaml("client_backendpoints:\n  - tcp://b:2\n  - tcp://c:3\n");
        a.config = Some(yaml.path().to_path_buf());

        let cfg = RelayConfig::load(&a).unwrap();
        assert_eq!(cfg.client_backendpoints.as_deref(), Some("tcp://a:1,tcp://b:2,tcp://c:3"));
    }

    #[test]
    fn yaml_scalar_is_accepted_for_list_fields_too() {
        let mut a = args();
        let yaml = write_yaml("subscribe_frontendpoints: tcp://a:1\n");
        a.config = Some(yaml.path().to_path_buf());

        let cfg = RelayConfig::load(&a).unwrap();
        assert_eq!(cfg.subscribe_frontendpoints.as_deref(), Some("tcp://a:1"));
    }

    #[test]
    fn defaults_fill_dumpfile_and_compression_when_nothing_else_set() {
        let cfg = RelayConfig::load(&args()).unwrap();
        assert!(cfg.client_dumpfile.is_some());
        assert!(cfg.subscribe_dumpfile.is_some());
        assert_eq!(cfg.compression.as_deref(), Some("identity"));
        assert_eq!(cfg.zstd_level, Some(3));
    }

    #[test]
    fn bool_flags_are_or_combined_across_cli_and_yaml() {
        let mut a = args();
        let yaml = write_yaml("subscribe_dropkey: true\n");
        a.config = Some(yaml.path().to_path_buf());

        let cfg = RelayConfig::load(&a).unwrap();
        assert!(cfg.subscribe_dropkey);
    }
}

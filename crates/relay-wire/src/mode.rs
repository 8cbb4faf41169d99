use std::str::FromStr;

use strum::{Display, EnumString};

/// The seven broker topologies, see `relay-core::orchestrator` for how each
/// is assembled from front/back sockets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    Client,
    Publish,
    Subscribe,
    ClientPublish,
    PublishSubscribe,
    ClientSubscribe,
    StandAlone,
}

impl Mode {
    /// Parses `--mode`, accepting the aliases `publish-client`,
    /// `subscribe-publish`, `subscribe-client` as named in spec section 6.
    pub fn parse_with_aliases(s: &str) -> Result<Self, strum::ParseError> {
        match s {
            "publish-client" => Ok(Mode::ClientPublish),
            "subscribe-publish" => Ok(Mode::PublishSubscribe),
            "subscribe-client" => Ok(Mode::ClientSubscribe),
            other => Mode::from_str(other),
        }
    }

    pub fn has_dump(self) -> bool {
        matches!(
            self,
            Mode::Client
                | Mode::Subscribe
                | Mode::PublishSubscribe
                | Mode::ClientSubscribe
                | Mode::StandAlone
        )
    }

    pub fn has_client_front(self) -> bool {
        matches!(self, Mode::Client | Mode::ClientSubscribe)
    }

    pub fn has_subscribe_front(self) -> bool {
        matches!(self, Mode::Subscribe | Mode::ClientSubscribe)
    }

    pub fn has_publish_back(self) -> bool {
        matches!(self, Mode::Publish | Mode::ClientPublish)
    }

    /// Whether the back-end is a multi-endpoint push egress group (as
    /// opposed to a single bound push/pub socket).
    pub fn has_egress_group(self) -> bool {
        matches!(self, Mode::Client | Mode::ClientSubscribe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_roundtrip() {
        for m in [
            Mode::Client,
            Mode::Publish,
            Mode::Subscribe,
            Mode::ClientPublish,
            Mode::PublishSubscribe,
            Mode::ClientSubscribe,
            Mode::StandAlone,
        ] {
            let s = m.to_string();
            assert_eq!(Mode::parse_with_aliases(&s).unwrap(), m);
        }
    }

    #[test]
    fn aliases_map_to_canonical_modes() {
        assert_eq!(Mode::parse_with_aliases("publish-client").unwrap(), Mode::ClientPublish);
        assert_eq!(Mode::parse_with_aliases("subscribe-publish").unwrap(), Mode::PublishSubscribe);
        assert_eq!(Mode::parse_with_aliases("subscribe-client").unwrap(), Mode::ClientSubscribe);
    }

    #[test]
    fn unknown_mode_errors() {
        assert!(Mode::parse_with_aliases("bogus").is_err());
    }
}

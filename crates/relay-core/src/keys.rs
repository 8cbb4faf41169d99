use relay_wire::Codec;

/// A publish key prepended as a synthetic first frame ahead of every
/// forwarded message in PUBLISH-shaped pipelines. Compressed once at
/// construction (rather than on every send) since the key never changes
/// for the lifetime of a pipeline.
pub struct PublishKey {
    bytes: Vec<u8>,
}

impl PublishKey {
    pub fn new(key: &str, codec: Option<&dyn Codec>) -> Self {
        let raw = key.as_bytes().to_vec();
        let bytes = match codec {
            Some(codec) => codec.compress(&raw).unwrap_or(raw),
            None => raw,
        };
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A subscribe-side topic filter. The real wire format has no server-side
/// topic filtering (unlike a native PUB/SUB socket), so it is emulated here:
/// the first frame of every message is compared against `key` with a
/// `starts_with` match, and messages that don't match are dropped whole.
/// When `drop_key` is set, a matching first frame is consumed rather than
/// forwarded, mirroring a real SUB socket's `ZMQ_SUBSCRIBE` envelope
/// stripping.
pub struct SubscribeKey {
    pub key: Vec<u8>,
    pub drop_key: bool,
}

impl SubscribeKey {
    pub fn new(key: &str, drop_key: bool, codec: Option<&dyn Codec>) -> Self {
        let raw = key.as_bytes().to_vec();
        let key = match codec {
            Some(codec) => codec.compress(&raw).unwrap_or(raw),
            None => raw,
        };
        Self { key, drop_key }
    }

    pub fn matches(&self, first_frame: &[u8]) -> bool {
        self.key.is_empty() || first_frame.starts_with(&self.key)
    }
}
